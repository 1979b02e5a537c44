//! Policy rules

use crate::condition::{ConditionNode, EvalContext};
use crate::error::{AuthzError, Result};
use crate::types::{Effect, ALL_ACTIONS};
use std::collections::BTreeSet;

/// Which roles a rule applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleMatch {
    /// Statically assigned principal roles (`"*"` matches every principal)
    Roles(BTreeSet<String>),
    /// Derived role names resolved from the policy's imports
    DerivedRoles(BTreeSet<String>),
}

impl RoleMatch {
    /// Role names of the gate
    pub fn names(&self) -> &BTreeSet<String> {
        match self {
            RoleMatch::Roles(names) | RoleMatch::DerivedRoles(names) => names,
        }
    }
}

/// A single rule of a resource policy
///
/// Rules are assembled with [`Rule::allow`] / [`Rule::deny`] followed by
/// exactly one of [`RuleBuilder::with_roles`] or
/// [`RuleBuilder::with_derived_roles`], so every rule carries a single role
/// gate.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Actions covered by the rule (may contain `"*"`)
    pub actions: BTreeSet<String>,

    /// Effect contributed when the rule applies
    pub effect: Effect,

    /// Roles gating the rule
    pub role_match: RoleMatch,

    /// Optional condition
    pub condition: Option<ConditionNode>,
}

/// A rule whose role gate has not been chosen yet
#[derive(Debug, Clone)]
#[must_use = "a rule needs a role gate: call with_roles or with_derived_roles"]
pub struct RuleBuilder {
    actions: BTreeSet<String>,
    effect: Effect,
}

impl RuleBuilder {
    /// Gate the rule on static principal roles
    pub fn with_roles<I, S>(self, roles: I) -> Rule
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.gated(RoleMatch::Roles(roles.into_iter().map(Into::into).collect()))
    }

    /// Gate the rule on derived roles
    pub fn with_derived_roles<I, S>(self, roles: I) -> Rule
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.gated(RoleMatch::DerivedRoles(roles.into_iter().map(Into::into).collect()))
    }

    pub fn gated(self, role_match: RoleMatch) -> Rule {
        Rule {
            actions: self.actions,
            effect: self.effect,
            role_match,
            condition: None,
        }
    }
}

impl Rule {
    /// Create an unconditional rule
    pub fn new<I, S>(actions: I, effect: Effect, role_match: RoleMatch) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::builder(actions, effect).gated(role_match)
    }

    fn builder<I, S>(actions: I, effect: Effect) -> RuleBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RuleBuilder {
            actions: actions.into_iter().map(Into::into).collect(),
            effect,
        }
    }

    /// Start an allowing rule
    pub fn allow<I, S>(actions: I) -> RuleBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::builder(actions, Effect::Allow)
    }

    /// Start a denying rule
    pub fn deny<I, S>(actions: I) -> RuleBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::builder(actions, Effect::Deny)
    }

    /// Attach a condition
    pub fn with_condition(mut self, condition: ConditionNode) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Validate the rule definition
    pub fn validate(&self) -> Result<()> {
        if self.actions.is_empty() {
            return Err(AuthzError::MalformedDefinition(
                "Rule must cover at least one action".to_string(),
            ));
        }

        if self.actions.iter().any(String::is_empty) {
            return Err(AuthzError::MalformedDefinition(
                "Rule has empty action name".to_string(),
            ));
        }

        if self.role_match.names().is_empty() {
            return Err(AuthzError::MalformedDefinition(format!(
                "Rule for actions {:?} has an empty role list",
                self.actions
            )));
        }

        if let Some(condition) = &self.condition {
            condition.validate()?;
        }

        Ok(())
    }

    /// Whether the rule covers the action, directly or through `"*"`
    pub fn covers(&self, action: &str) -> bool {
        self.actions.contains(action) || self.actions.contains(ALL_ACTIONS)
    }

    /// Whether the rule's role gate admits the request
    pub fn admits(&self, ctx: &EvalContext<'_>, derived_roles: &BTreeSet<String>) -> bool {
        match &self.role_match {
            RoleMatch::Roles(roles) => ctx.principal().has_any_role(roles),
            RoleMatch::DerivedRoles(roles) => roles.iter().any(|role| derived_roles.contains(role)),
        }
    }

    /// Effect contributed by an admitted rule, if any
    ///
    /// An unconditional or fulfilled rule contributes its own effect. An
    /// allowing rule whose condition fails contributes an explicit deny; a
    /// denying rule whose condition fails contributes nothing.
    pub fn contribution(&self, ctx: &EvalContext<'_>) -> Option<Effect> {
        match &self.condition {
            None => Some(self.effect),
            Some(condition) if condition.is_fulfilled(ctx) => Some(self.effect),
            Some(_) => match self.effect {
                Effect::Allow => Some(Effect::Deny),
                Effect::Deny => None,
            },
        }
    }
}
