//! Named principal and resource fixtures

use crate::error::{AuthzError, Result};
use crate::types::{Principal, Resource};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Principal registered under a fixture name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrincipalFixture {
    pub name: String,
    #[serde(flatten)]
    pub principal: Principal,
}

impl PrincipalFixture {
    pub fn new(name: impl Into<String>, principal: Principal) -> Self {
        Self {
            name: name.into(),
            principal,
        }
    }
}

/// Resource registered under a fixture name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceFixture {
    pub name: String,
    #[serde(flatten)]
    pub resource: Resource,
}

impl ResourceFixture {
    pub fn new(name: impl Into<String>, resource: Resource) -> Self {
        Self {
            name: name.into(),
            resource,
        }
    }
}

/// Fixture lookup tables; later registrations replace earlier ones
#[derive(Debug, Clone, Default)]
pub struct Fixtures {
    principals: HashMap<String, Principal>,
    resources: HashMap<String, Resource>,
}

impl Fixtures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_principal(mut self, name: impl Into<String>, principal: Principal) -> Self {
        self.principals.insert(name.into(), principal);
        self
    }

    pub fn with_resource(mut self, name: impl Into<String>, resource: Resource) -> Self {
        self.resources.insert(name.into(), resource);
        self
    }

    /// Add every principal fixture
    pub fn add_principals<'a>(&mut self, fixtures: impl IntoIterator<Item = &'a PrincipalFixture>) {
        for fixture in fixtures {
            self.principals.insert(fixture.name.clone(), fixture.principal.clone());
        }
    }

    /// Add every resource fixture
    pub fn add_resources<'a>(&mut self, fixtures: impl IntoIterator<Item = &'a ResourceFixture>) {
        for fixture in fixtures {
            self.resources.insert(fixture.name.clone(), fixture.resource.clone());
        }
    }

    /// Merge another fixture set into this one
    pub fn merge(&mut self, other: &Fixtures) {
        self.principals
            .extend(other.principals.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.resources
            .extend(other.resources.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Principal fixture by name
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::InvalidInput`] for an unknown name.
    pub fn principal(&self, name: &str) -> Result<&Principal> {
        self.principals
            .get(name)
            .ok_or_else(|| AuthzError::InvalidInput(format!("Principal fixture '{}' not found", name)))
    }

    /// Resource fixture by name
    pub fn resource(&self, name: &str) -> Result<&Resource> {
        self.resources
            .get(name)
            .ok_or_else(|| AuthzError::InvalidInput(format!("Resource fixture '{}' not found", name)))
    }

    pub fn principal_count(&self) -> usize {
        self.principals.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }
}
