//! Resource policies
//!
//! A [`ResourcePolicy`] holds the rules for one resource kind and aggregates
//! per-action effects:
//!
//! 1. Rules covering the action (directly or through `"*"`) are scanned
//! 2. Rules whose role gate rejects the principal are skipped unevaluated
//! 3. Admitted rules contribute an effect (see [`Rule::contribution`])
//! 4. Any deny wins, otherwise any allow wins, otherwise the action is denied
//!
//! The result never depends on rule order.

pub mod rule;

pub use rule::{RoleMatch, Rule, RuleBuilder};

use crate::condition::EvalContext;
use crate::error::{AuthzError, Result};
use crate::types::Effect;
use crate::variables::{self, Constants, Variables};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

/// Version assigned to policies that do not declare one
pub const DEFAULT_VERSION: &str = "default";

/// Rules governing one resource kind
#[derive(Debug, Clone)]
pub struct ResourcePolicy {
    /// Resource kind this policy applies to (e.g., "expense")
    pub kind: String,

    /// Policy version label
    pub version: String,

    /// Rules, in definition order
    pub rules: Vec<Rule>,

    /// Constants visible to rule conditions
    pub constants: Constants,

    /// Variables visible to rule conditions
    pub variables: Variables,

    /// Names of the derived role sets this policy draws on
    pub import_derived_roles: Vec<String>,
}

impl ResourcePolicy {
    /// Create an empty policy for a resource kind
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            version: DEFAULT_VERSION.to_string(),
            rules: Vec::new(),
            constants: Constants::default(),
            variables: Variables::new(),
            import_derived_roles: Vec::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_rules(mut self, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.rules.extend(rules);
        self
    }

    pub fn with_constants(mut self, constants: Constants) -> Self {
        self.constants = constants;
        self
    }

    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    /// Import a derived role set by name
    pub fn with_import(mut self, set_name: impl Into<String>) -> Self {
        self.import_derived_roles.push(set_name.into());
        self
    }

    pub fn with_imports<I, S>(mut self, set_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.import_derived_roles
            .extend(set_names.into_iter().map(Into::into));
        self
    }

    /// Validate the policy and all of its rules
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::MalformedDefinition`] if the kind is empty, the
    /// policy has no rules, an import name is empty or a rule is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.kind.is_empty() {
            return Err(AuthzError::MalformedDefinition(
                "Resource policy kind cannot be empty".to_string(),
            ));
        }

        if self.rules.is_empty() {
            return Err(AuthzError::MalformedDefinition(format!(
                "Resource policy '{}' must have at least one rule",
                self.kind
            )));
        }

        if self.import_derived_roles.iter().any(String::is_empty) {
            return Err(AuthzError::MalformedDefinition(format!(
                "Resource policy '{}' imports a derived role set with an empty name",
                self.kind
            )));
        }

        for (index, rule) in self.rules.iter().enumerate() {
            rule.validate().map_err(|e| {
                AuthzError::MalformedDefinition(format!(
                    "Resource policy '{}', rule {}: {}",
                    self.kind, index, e
                ))
            })?;
        }

        Ok(())
    }

    /// Layer the policy's constants and variables onto a base context
    pub fn populate<'a>(&self, base: EvalContext<'a>) -> EvalContext<'a> {
        variables::populate(base, &self.constants, &self.variables)
    }

    /// Effect per requested action
    ///
    /// `ctx` must already carry the policy's constants and variables (see
    /// [`populate`](Self::populate)). Duplicate actions collapse into one key.
    pub fn evaluate(
        &self,
        ctx: &EvalContext<'_>,
        actions: &[String],
        derived_roles: &BTreeSet<String>,
    ) -> BTreeMap<String, Effect> {
        let mut seen = HashSet::new();

        actions
            .iter()
            .filter(|action| seen.insert(action.as_str()))
            .map(|action| (action.clone(), self.evaluate_action(ctx, action, derived_roles)))
            .collect()
    }

    /// Populate `base` and evaluate the actions
    pub fn check(
        &self,
        base: EvalContext<'_>,
        actions: &[String],
        derived_roles: &BTreeSet<String>,
    ) -> BTreeMap<String, Effect> {
        let ctx = self.populate(base);
        self.evaluate(&ctx, actions, derived_roles)
    }

    /// Whether a single action is allowed
    pub fn is_allowed(
        &self,
        base: EvalContext<'_>,
        action: &str,
        derived_roles: &BTreeSet<String>,
    ) -> bool {
        let ctx = self.populate(base);
        self.evaluate_action(&ctx, action, derived_roles).is_allow()
    }

    fn evaluate_action(
        &self,
        ctx: &EvalContext<'_>,
        action: &str,
        derived_roles: &BTreeSet<String>,
    ) -> Effect {
        let action_ctx = ctx.for_action(action);
        let mut allowed = false;

        for rule in self.rules.iter().filter(|rule| rule.covers(action)) {
            if !rule.admits(&action_ctx, derived_roles) {
                continue;
            }

            match rule.contribution(&action_ctx) {
                Some(Effect::Deny) => {
                    debug!(kind = %self.kind, action, "Deny rule matched");
                    return Effect::Deny;
                }
                Some(Effect::Allow) => allowed = true,
                None => {}
            }
        }

        if allowed {
            Effect::Allow
        } else {
            Effect::Deny
        }
    }
}
