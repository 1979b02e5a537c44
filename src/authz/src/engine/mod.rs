//! Decision orchestration
//!
//! Routes requests to the resource policy for their kind, resolves the
//! derived roles the policy imports, and aggregates effects, with optional
//! audit logging and metrics.

pub mod audit;
pub mod decision;
pub mod metrics;

pub use audit::{AuditEntry, AuditSink, AuditStats, ChannelAuditSink, InMemoryAuditSink, TracingAuditSink};
pub use decision::{
    ActionOutcome, CheckResourcesRequest, CheckResourcesResponse, EffectFormat, ResourceCheck,
    ResourceResult,
};
pub use metrics::{EngineMetrics, MetricsCollector};

use crate::condition::EvalContext;
use crate::derived_roles::DerivedRoleSet;
use crate::error::{AuthzError, Result};
use crate::policy::ResourcePolicy;
use crate::types::{Effect, Principal, Resource};
use rayon::prelude::*;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Default batch size from which `check_resources` evaluates in parallel
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 16;

/// Policy engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Record decisions through the tracing audit sink when no sink is injected
    pub enable_audit: bool,

    /// Enable metrics collection
    pub enable_metrics: bool,

    /// Batch size from which resources are evaluated on the rayon pool
    pub parallel_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_audit: false,
            enable_metrics: false,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl EngineConfig {
    /// Read configuration from `AUTHZ_*` environment variables
    ///
    /// Unset or unparsable variables keep their default value.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration from `AUTHZ_*` keys through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let flag = |name: &str| lookup(name).as_deref().and_then(parse_flag);

        Self {
            enable_audit: flag("AUTHZ_ENABLE_AUDIT").unwrap_or(defaults.enable_audit),
            enable_metrics: flag("AUTHZ_ENABLE_METRICS").unwrap_or(defaults.enable_metrics),
            parallel_threshold: lookup("AUTHZ_PARALLEL_THRESHOLD")
                .and_then(|value| value.trim().parse().ok())
                .unwrap_or(defaults.parallel_threshold),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Main policy engine
///
/// # Architecture
///
/// ```text
/// Request → policy by kind → imported derived roles → context
///             ↓                                          ↓
///        unknown kind: deny              ResourcePolicy::evaluate → effects
///                                                        ↓
///                                         [Audit Sink]  [Metrics]
/// ```
///
/// Registries are fixed at construction, so the engine is `Send + Sync` and
/// can be shared across threads without locking.
pub struct PolicyEngine {
    /// Resource kind → policy
    policies: HashMap<String, ResourcePolicy>,

    /// Set name → derived role set
    derived_roles: HashMap<String, DerivedRoleSet>,

    /// Optional audit sink
    audit_sink: Option<Arc<dyn AuditSink>>,

    /// Optional metrics collector
    metrics: Option<Arc<MetricsCollector>>,

    config: EngineConfig,
}

impl PolicyEngine {
    /// Build an engine with the default configuration
    ///
    /// Every policy and derived role set is validated; the first invalid
    /// entity aborts construction. Later entries replace earlier ones with
    /// the same kind or set name.
    pub fn new(
        policies: impl IntoIterator<Item = ResourcePolicy>,
        derived_role_sets: impl IntoIterator<Item = DerivedRoleSet>,
    ) -> Result<Self> {
        Self::with_config(EngineConfig::default(), policies, derived_role_sets)
    }

    /// Build an engine with an explicit configuration
    pub fn with_config(
        config: EngineConfig,
        policies: impl IntoIterator<Item = ResourcePolicy>,
        derived_role_sets: impl IntoIterator<Item = DerivedRoleSet>,
    ) -> Result<Self> {
        let mut policy_registry = HashMap::new();
        for policy in policies {
            policy.validate()?;
            if policy_registry.contains_key(&policy.kind) {
                debug!(kind = %policy.kind, "Replacing resource policy with later definition");
            }
            policy_registry.insert(policy.kind.clone(), policy);
        }

        let mut role_registry = HashMap::new();
        for set in derived_role_sets {
            set.validate()?;
            if role_registry.contains_key(&set.name) {
                debug!(set = %set.name, "Replacing derived role set with later definition");
            }
            role_registry.insert(set.name.clone(), set);
        }

        let audit_sink: Option<Arc<dyn AuditSink>> = if config.enable_audit {
            Some(Arc::new(TracingAuditSink))
        } else {
            None
        };

        let metrics = if config.enable_metrics {
            Some(Arc::new(MetricsCollector::new()))
        } else {
            None
        };

        info!(
            "PolicyEngine initialized with policies={}, derived_role_sets={}, audit={}, metrics={}",
            policy_registry.len(),
            role_registry.len(),
            audit_sink.is_some(),
            metrics.is_some()
        );

        Ok(Self {
            policies: policy_registry,
            derived_roles: role_registry,
            audit_sink,
            metrics,
            config,
        })
    }

    /// Install an audit sink, replacing the configured one
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = Some(sink);
        self
    }

    /// Install a shared metrics collector
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Policy registered for a resource kind
    pub fn policy(&self, kind: &str) -> Option<&ResourcePolicy> {
        self.policies.get(kind)
    }

    /// Derived role set registered under a name
    pub fn derived_role_set(&self, name: &str) -> Option<&DerivedRoleSet> {
        self.derived_roles.get(name)
    }

    /// Registered resource kinds, sorted
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<_> = self.policies.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Derived roles the principal holds for the resource under its policy
    ///
    /// Empty when no policy exists for the resource kind.
    pub fn derived_roles_for(&self, principal: &Principal, resource: &Resource) -> BTreeSet<String> {
        match self.policies.get(&resource.kind) {
            Some(policy) => self.resolve_derived_roles(policy, &EvalContext::new(principal, resource)),
            None => BTreeSet::new(),
        }
    }

    /// Whether the principal may perform the action on the resource
    pub fn is_allowed(&self, principal: &Principal, resource: &Resource, action: &str) -> bool {
        let start = Instant::now();
        let actions = [action.to_string()];
        let effects = self.decide(principal, resource, &actions);
        self.record_latency(start);

        effects.get(action).map_or(false, |effect| effect.is_allow())
    }

    /// Decide every requested action on every resource
    ///
    /// Results follow request order. Resources whose kind has no policy
    /// yield a deny for each action.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::InvalidInput`] if the request has no resources
    /// or an entry has no actions.
    pub fn check_resources(
        &self,
        request: &CheckResourcesRequest,
        format: EffectFormat,
    ) -> Result<CheckResourcesResponse> {
        if request.resources.is_empty() {
            return Err(AuthzError::InvalidInput(
                "Request must list at least one resource".to_string(),
            ));
        }

        if let Some(entry) = request.resources.iter().find(|entry| entry.actions.is_empty()) {
            return Err(AuthzError::InvalidInput(format!(
                "Resource '{}' must list at least one action",
                entry.resource.id
            )));
        }

        let start = Instant::now();
        let principal = &request.principal;
        let check = |entry: &ResourceCheck| {
            let effects = self.decide(principal, &entry.resource, &entry.actions);
            ResourceResult::new(entry.resource.to_ref(), effects, format)
        };

        let results = if request.resources.len() >= self.config.parallel_threshold {
            debug!(resources = request.resources.len(), "Evaluating batch in parallel");
            request.resources.par_iter().map(check).collect()
        } else {
            request.resources.iter().map(check).collect()
        };

        self.record_latency(start);
        Ok(CheckResourcesResponse { results })
    }

    /// Get engine metrics
    pub fn get_metrics(&self) -> Option<EngineMetrics> {
        self.metrics.as_ref().map(|metrics| metrics.get_metrics())
    }

    fn decide(
        &self,
        principal: &Principal,
        resource: &Resource,
        actions: &[String],
    ) -> BTreeMap<String, Effect> {
        debug!(
            "Decision request: principal={}, kind={}, resource={}, actions={:?}",
            principal.id, resource.kind, resource.id, actions
        );

        let effects = match self.policies.get(&resource.kind) {
            Some(policy) => {
                let base = EvalContext::new(principal, resource);
                let derived = self.resolve_derived_roles(policy, &base);
                debug!("Derived roles: {:?}", derived);
                policy.check(base, actions, &derived)
            }
            None => {
                debug!(
                    principal = %principal.id,
                    "{}, denying",
                    AuthzError::UnknownResourceKind(resource.kind.clone())
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_unknown_kind();
                }
                actions
                    .iter()
                    .map(|action| (action.clone(), Effect::Deny))
                    .collect()
            }
        };

        if let Some(metrics) = &self.metrics {
            let allowed = effects.values().filter(|effect| effect.is_allow()).count();
            metrics.record_request(allowed, effects.len() - allowed);
        }

        self.audit(principal, resource, &effects);
        effects
    }

    fn resolve_derived_roles(&self, policy: &ResourcePolicy, base: &EvalContext<'_>) -> BTreeSet<String> {
        let mut derived = BTreeSet::new();

        for name in &policy.import_derived_roles {
            match self.derived_roles.get(name) {
                Some(set) => derived.extend(set.get(base)),
                None => debug!(
                    kind = %policy.kind,
                    "{}",
                    AuthzError::UnresolvedReference(format!("derived role set '{}'", name))
                ),
            }
        }

        derived
    }

    fn audit(&self, principal: &Principal, resource: &Resource, effects: &BTreeMap<String, Effect>) {
        let Some(sink) = &self.audit_sink else {
            return;
        };

        for (action, effect) in effects {
            let entry = AuditEntry::new(
                principal.id.as_str(),
                resource.kind.as_str(),
                resource.id.as_str(),
                action.as_str(),
                *effect,
            );

            if let Err(e) = sink.record(&entry) {
                warn!("Audit sink failed, decision unaffected: {}", e);
            }
        }
    }

    fn record_latency(&self, start: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.record_latency(start.elapsed());
        }
    }
}

impl std::fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyEngine")
            .field("kinds", &self.kinds())
            .field("derived_role_sets", &self.derived_roles.len())
            .field("audit", &self.audit_sink.is_some())
            .field("metrics", &self.metrics.is_some())
            .field("config", &self.config)
            .finish()
    }
}
