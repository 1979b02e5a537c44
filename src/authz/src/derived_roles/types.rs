//! Derived role definitions

use crate::condition::{ConditionNode, EvalContext};
use crate::error::{AuthzError, Result};
use std::collections::BTreeSet;

/// Derived role definition
///
/// A derived role is granted at evaluation time when:
/// 1. Parent roles - the principal holds AT LEAST ONE of them
/// 2. Condition - the condition tree is fulfilled for the request
#[derive(Debug, Clone)]
pub struct DerivedRoleDefinition {
    /// Derived role name (e.g., "OWNER")
    pub name: String,

    /// Parent roles, any of which qualifies the principal
    pub parent_roles: BTreeSet<String>,

    /// Condition that must hold for the role to apply
    pub condition: ConditionNode,
}

impl DerivedRoleDefinition {
    /// Create a new derived role definition
    pub fn new<I, S>(name: impl Into<String>, parent_roles: I, condition: ConditionNode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            parent_roles: parent_roles.into_iter().map(Into::into).collect(),
            condition,
        }
    }

    /// Validate the derived role definition
    pub fn validate(&self) -> Result<()> {
        // Name must be non-empty
        if self.name.is_empty() {
            return Err(AuthzError::MalformedDefinition(
                "Derived role name cannot be empty".to_string(),
            ));
        }

        // Must have at least one parent role
        if self.parent_roles.is_empty() {
            return Err(AuthzError::MalformedDefinition(format!(
                "Derived role '{}' must have at least one parent role",
                self.name
            )));
        }

        if self.parent_roles.iter().any(String::is_empty) {
            return Err(AuthzError::MalformedDefinition(format!(
                "Derived role '{}' has empty parent role",
                self.name
            )));
        }

        self.condition.validate().map_err(|e| {
            AuthzError::MalformedDefinition(format!("Derived role '{}': {}", self.name, e))
        })
    }

    /// Check whether the role applies for the context
    ///
    /// Parent role membership is checked first; the condition is only
    /// evaluated for qualifying principals.
    pub fn matches(&self, ctx: &EvalContext<'_>) -> bool {
        let principal = ctx.principal();
        if !self.parent_roles.iter().any(|role| principal.has_role(role)) {
            return false;
        }

        self.condition.is_fulfilled(ctx)
    }
}
