//! Audit records for authorization decisions
//!
//! The engine hands one [`AuditEntry`] per evaluated action to an optional
//! [`AuditSink`]. Sinks must not block; a sink error is logged by the engine
//! and never changes the decision.
//!
//! Provided sinks:
//! - [`TracingAuditSink`] - structured `tracing` events under `authz::audit`
//! - [`InMemoryAuditSink`] - bounded buffer, queryable by principal
//! - [`ChannelAuditSink`] - forwards entries to a tokio channel

use crate::error::{AuthzError, Result};
use crate::types::Effect;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

/// Default capacity of [`InMemoryAuditSink`]
pub const DEFAULT_AUDIT_CAPACITY: usize = 10_000;

/// Audit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry ID
    pub id: Uuid,

    /// Principal who made the request
    pub principal_id: String,

    /// Kind of the resource being accessed
    pub resource_kind: String,

    /// Resource being accessed
    pub resource_id: String,

    /// Action being performed
    pub action: String,

    /// Decision for the action
    pub effect: Effect,

    /// Decision time
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        principal_id: impl Into<String>,
        resource_kind: impl Into<String>,
        resource_id: impl Into<String>,
        action: impl Into<String>,
        effect: Effect,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            principal_id: principal_id.into(),
            resource_kind: resource_kind.into(),
            resource_id: resource_id.into(),
            action: action.into(),
            effect,
            timestamp: Utc::now(),
        }
    }
}

/// Destination for audit entries
pub trait AuditSink: Send + Sync {
    /// Record one entry
    fn record(&self, entry: &AuditEntry) -> Result<()>;
}

/// Emits each entry as an `info` event with target `authz::audit`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: &AuditEntry) -> Result<()> {
        info!(
            target: "authz::audit",
            id = %entry.id,
            principal = %entry.principal_id,
            kind = %entry.resource_kind,
            resource = %entry.resource_id,
            action = %entry.action,
            effect = %entry.effect,
            timestamp = %entry.timestamp.to_rfc3339(),
            "authorization decision"
        );
        Ok(())
    }
}

/// Bounded in-memory audit buffer; the oldest entries are evicted first
#[derive(Debug)]
pub struct InMemoryAuditSink {
    buffer: RwLock<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_AUDIT_CAPACITY)
    }

    /// Create a sink keeping at most `capacity` entries (at least one)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: RwLock::new(VecDeque::with_capacity(capacity.min(DEFAULT_AUDIT_CAPACITY))),
            capacity,
        }
    }

    /// All buffered entries, oldest first
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.buffer.read().iter().cloned().collect()
    }

    /// Most recent entries for a principal, newest first
    pub fn query_by_principal(&self, principal_id: &str, limit: usize) -> Vec<AuditEntry> {
        self.buffer
            .read()
            .iter()
            .rev()
            .filter(|entry| entry.principal_id == principal_id)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> AuditStats {
        let buffer = self.buffer.read();
        let allowed = buffer.iter().filter(|entry| entry.effect.is_allow()).count();

        AuditStats {
            total_decisions: buffer.len(),
            allowed_decisions: allowed,
            denied_decisions: buffer.len() - allowed,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.read().is_empty()
    }

    pub fn clear(&self) {
        self.buffer.write().clear();
    }
}

impl Default for InMemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, entry: &AuditEntry) -> Result<()> {
        let mut buffer = self.buffer.write();
        if buffer.len() >= self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(entry.clone());
        Ok(())
    }
}

/// Audit statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditStats {
    pub total_decisions: usize,
    pub allowed_decisions: usize,
    pub denied_decisions: usize,
}

/// Forwards entries over an unbounded tokio channel
///
/// Sending never blocks, so the sink can be used from synchronous decision
/// calls while a task drains the receiver.
#[derive(Debug, Clone)]
pub struct ChannelAuditSink {
    sender: mpsc::UnboundedSender<AuditEntry>,
}

impl ChannelAuditSink {
    /// Create a sink and the receiver draining it
    pub fn unbounded() -> (Self, mpsc::UnboundedReceiver<AuditEntry>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn from_sender(sender: mpsc::UnboundedSender<AuditEntry>) -> Self {
        Self { sender }
    }
}

impl AuditSink for ChannelAuditSink {
    fn record(&self, entry: &AuditEntry) -> Result<()> {
        self.sender
            .send(entry.clone())
            .map_err(|_| AuthzError::Audit("audit receiver dropped".to_string()))
    }
}
