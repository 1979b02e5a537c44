//! Derived role sets
//!
//! A [`DerivedRoleSet`] is a named group of derived role definitions that
//! policies import by name. It carries its own constants and variables,
//! which are layered onto the request context before any definition is
//! checked.
//!
//! # Example
//!
//! ```rust
//! use abac_authz::condition::{ConditionNode, EvalContext};
//! use abac_authz::derived_roles::{DerivedRoleDefinition, DerivedRoleSet};
//! use abac_authz::{Principal, Resource};
//!
//! let roles = DerivedRoleSet::new("common_roles").with_definition(DerivedRoleDefinition::new(
//!     "OWNER",
//!     ["USER"],
//!     ConditionNode::predicate(|ctx| ctx.r().attr_str("ownerId") == Some(ctx.p().id.as_str())),
//! ));
//! roles.validate().unwrap();
//!
//! let sally = Principal::new("sally").with_role("USER");
//! let expense = Resource::new("expense", "expense1").with_attr("ownerId", "sally");
//!
//! let derived = roles.get(&EvalContext::new(&sally, &expense));
//! assert!(derived.contains("OWNER"));
//! ```

use super::types::DerivedRoleDefinition;
use crate::condition::EvalContext;
use crate::error::{AuthzError, Result};
use crate::variables::{self, Constants, Variables};
use std::collections::{BTreeSet, HashSet};

/// Named set of derived role definitions
#[derive(Debug, Clone)]
pub struct DerivedRoleSet {
    /// Set name, referenced by a policy's imports
    pub name: String,

    /// Human readable description
    pub description: Option<String>,

    /// Constants visible to the definitions' conditions
    pub constants: Constants,

    /// Variables visible to the definitions' conditions
    pub variables: Variables,

    /// Definitions, evaluated independently
    pub definitions: Vec<DerivedRoleDefinition>,
}

impl DerivedRoleSet {
    /// Create an empty derived role set
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            constants: Constants::default(),
            variables: Variables::new(),
            definitions: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
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

    pub fn with_definition(mut self, definition: DerivedRoleDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    pub fn with_definitions(mut self, definitions: impl IntoIterator<Item = DerivedRoleDefinition>) -> Self {
        self.definitions.extend(definitions);
        self
    }

    /// Validate the set and every definition in it
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::MalformedDefinition`] if:
    /// - The set name is empty
    /// - The set has no definitions
    /// - A definition is invalid
    ///
    /// Several definitions may share a name; the role is derived when any
    /// of them matches.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(AuthzError::MalformedDefinition(
                "Derived role set name cannot be empty".to_string(),
            ));
        }

        if self.definitions.is_empty() {
            return Err(AuthzError::MalformedDefinition(format!(
                "Derived role set '{}' must have at least one definition",
                self.name
            )));
        }

        self.definitions.iter().try_for_each(DerivedRoleDefinition::validate)
    }

    /// Names of the derived roles defined by this set, in definition order
    pub fn role_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.definitions
            .iter()
            .filter(|d| seen.insert(d.name.as_str()))
            .map(|d| d.name.clone())
            .collect()
    }

    /// Derived roles that apply to the request
    ///
    /// The set's constants and variables are layered onto a copy of `ctx`;
    /// the caller's context is left untouched.
    pub fn get(&self, ctx: &EvalContext<'_>) -> BTreeSet<String> {
        let scoped = variables::populate(ctx.clone(), &self.constants, &self.variables);

        self.definitions
            .iter()
            .filter(|definition| definition.matches(&scoped))
            .map(|definition| definition.name.clone())
            .collect()
    }
}
