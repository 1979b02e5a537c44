//! Batched decision request and response types

use crate::types::{Effect, Principal, Resource, ResourceRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One principal checked against several resources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResourcesRequest {
    /// Principal making the request
    pub principal: Principal,

    /// Resources and the actions requested on each
    pub resources: Vec<ResourceCheck>,
}

impl CheckResourcesRequest {
    pub fn new(principal: Principal) -> Self {
        Self {
            principal,
            resources: Vec::new(),
        }
    }

    /// Add a resource with the actions to check on it
    pub fn with_resource<I, S>(mut self, resource: Resource, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resources.push(ResourceCheck::new(resource, actions));
        self
    }
}

/// Resource entry of a batched request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceCheck {
    pub resource: Resource,
    pub actions: Vec<String>,
}

impl ResourceCheck {
    pub fn new<I, S>(resource: Resource, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            resource,
            actions: actions.into_iter().map(Into::into).collect(),
        }
    }
}

/// How action outcomes are reported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectFormat {
    /// `EFFECT_ALLOW` / `EFFECT_DENY`
    #[default]
    Effect,
    /// `true` / `false`
    Boolean,
}

/// Outcome of one action in the requested format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionOutcome {
    Effect(Effect),
    Bool(bool),
}

impl ActionOutcome {
    pub fn from_effect(effect: Effect, format: EffectFormat) -> Self {
        match format {
            EffectFormat::Effect => Self::Effect(effect),
            EffectFormat::Boolean => Self::Bool(effect.is_allow()),
        }
    }

    /// Whether the outcome grants the action
    pub fn is_allowed(&self) -> bool {
        match self {
            Self::Effect(effect) => effect.is_allow(),
            Self::Bool(allowed) => *allowed,
        }
    }
}

impl From<Effect> for ActionOutcome {
    fn from(effect: Effect) -> Self {
        Self::Effect(effect)
    }
}

impl From<bool> for ActionOutcome {
    fn from(allowed: bool) -> Self {
        Self::Bool(allowed)
    }
}

/// Per-resource result of a batched request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceResult {
    /// Resource identity, echoed from the request
    pub resource: ResourceRef,

    /// Outcome per requested action
    pub actions: BTreeMap<String, ActionOutcome>,
}

impl ResourceResult {
    pub fn new(
        resource: ResourceRef,
        effects: BTreeMap<String, Effect>,
        format: EffectFormat,
    ) -> Self {
        Self {
            resource,
            actions: effects
                .into_iter()
                .map(|(action, effect)| (action, ActionOutcome::from_effect(effect, format)))
                .collect(),
        }
    }

    /// Outcome for an action, if it was requested
    pub fn outcome(&self, action: &str) -> Option<ActionOutcome> {
        self.actions.get(action).copied()
    }

    pub fn is_allowed(&self, action: &str) -> bool {
        self.outcome(action).map_or(false, |outcome| outcome.is_allowed())
    }
}

/// Response to a batched request, in request order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckResourcesResponse {
    pub results: Vec<ResourceResult>,
}

impl CheckResourcesResponse {
    /// First result for a resource id
    pub fn result_for(&self, resource_id: &str) -> Option<&ResourceResult> {
        self.results.iter().find(|result| result.resource.id == resource_id)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
