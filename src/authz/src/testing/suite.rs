//! Declarative policy test suites

use super::fixtures::{Fixtures, PrincipalFixture, ResourceFixture};
use crate::engine::ActionOutcome;
use crate::error::{AuthzError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Fixture names and actions a test case exercises
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestInput {
    pub principals: Vec<String>,
    pub resources: Vec<String>,
    pub actions: Vec<String>,
}

/// Expected outcomes for one principal/resource pair
///
/// Outcomes accept both `EFFECT_*` tags and booleans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpectedResult {
    pub principal: String,
    pub resource: String,
    pub actions: BTreeMap<String, ActionOutcome>,
}

impl ExpectedResult {
    pub fn new(principal: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            resource: resource.into(),
            actions: BTreeMap::new(),
        }
    }

    /// Expect an action outcome
    pub fn with_action(mut self, action: impl Into<String>, outcome: impl Into<ActionOutcome>) -> Self {
        self.actions.insert(action.into(), outcome.into());
        self
    }
}

/// Named test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestCase {
    pub name: String,
    pub input: TestInput,
    pub expected: Vec<ExpectedResult>,
}

impl TestCase {
    /// Validate the case shape
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::InvalidInput`] if a list is empty or an
    /// expected action is not among the input actions.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(AuthzError::InvalidInput("Test case name cannot be empty".to_string()));
        }

        let lists = [
            ("principals", self.input.principals.is_empty()),
            ("resources", self.input.resources.is_empty()),
            ("actions", self.input.actions.is_empty()),
            ("expected", self.expected.is_empty()),
        ];
        if let Some((field, _)) = lists.iter().find(|(_, empty)| *empty) {
            return Err(AuthzError::InvalidInput(format!(
                "Test case '{}' must list at least one entry in {}",
                self.name, field
            )));
        }

        let input_actions: BTreeSet<&str> = self.input.actions.iter().map(String::as_str).collect();
        for item in &self.expected {
            if item.actions.is_empty() {
                return Err(AuthzError::InvalidInput(format!(
                    "Test case '{}': no expected actions for principal '{}' on resource '{}'",
                    self.name, item.principal, item.resource
                )));
            }

            if let Some(action) = item.actions.keys().find(|a| !input_actions.contains(a.as_str())) {
                return Err(AuthzError::InvalidInput(format!(
                    "Test case '{}': action \"{}\" in expected is not present in input actions",
                    self.name, action
                )));
            }
        }

        Ok(())
    }
}

/// Suite of test cases with the fixtures they reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestSuite {
    pub name: String,
    pub principals: Vec<PrincipalFixture>,
    pub resources: Vec<ResourceFixture>,
    pub tests: Vec<TestCase>,
}

impl TestSuite {
    /// Parse and validate a suite from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let suite: Self =
            serde_json::from_str(json).map_err(|e| AuthzError::InvalidInput(e.to_string()))?;
        suite.validate()?;
        Ok(suite)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(AuthzError::InvalidInput("Suite name cannot be empty".to_string()));
        }

        if self.principals.is_empty() || self.resources.is_empty() || self.tests.is_empty() {
            return Err(AuthzError::InvalidInput(format!(
                "Suite '{}' must define principals, resources and tests",
                self.name
            )));
        }

        self.tests.iter().try_for_each(TestCase::validate)
    }

    /// The suite's own fixtures
    pub fn fixtures(&self) -> Fixtures {
        let mut fixtures = Fixtures::new();
        fixtures.add_principals(&self.principals);
        fixtures.add_resources(&self.resources);
        fixtures
    }
}
