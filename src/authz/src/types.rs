//! Core authorization types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Wildcard matching every action of a rule, or every principal role
pub const ALL_ACTIONS: &str = "*";

/// Attribute map carried by principals, resources, constants and variables
pub type Attributes = HashMap<String, Value>;

/// Principal (the actor requesting an action)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Principal identifier (e.g., "sally")
    pub id: String,

    /// Statically assigned roles
    pub roles: BTreeSet<String>,

    /// Additional attributes (e.g., department, region)
    #[serde(default)]
    pub attr: Attributes,
}

impl Principal {
    /// Create a new principal without roles or attributes
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: BTreeSet::new(),
            attr: Attributes::new(),
        }
    }

    /// Add a role to the principal
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Add several roles to the principal
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    /// Add an attribute to the principal
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attr.insert(key.into(), value.into());
        self
    }

    /// Whether the principal holds the given role
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Whether the principal holds at least one of the given roles.
    ///
    /// A `"*"` entry matches every principal.
    pub fn has_any_role(&self, roles: &BTreeSet<String>) -> bool {
        roles
            .iter()
            .any(|role| role == ALL_ACTIONS || self.roles.contains(role))
    }

    /// Look up an attribute
    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attr.get(key)
    }

    /// Look up a string attribute
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attr.get(key).and_then(Value::as_str)
    }
}

/// Resource being accessed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource identifier (e.g., "expense1")
    pub id: String,

    /// Resource kind, used to select the policy (e.g., "expense")
    pub kind: String,

    /// Additional attributes (e.g., ownerId, status)
    #[serde(default)]
    pub attr: Attributes,
}

impl Resource {
    /// Create a new resource of the given kind
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            attr: Attributes::new(),
        }
    }

    /// Add an attribute to the resource
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attr.insert(key.into(), value.into());
        self
    }

    /// Look up an attribute
    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attr.get(key)
    }

    /// Look up a string attribute
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attr.get(key).and_then(Value::as_str)
    }

    /// Identity of the resource without its attributes
    pub fn to_ref(&self) -> ResourceRef {
        ResourceRef {
            id: self.id.clone(),
            kind: self.kind.clone(),
        }
    }
}

/// Resource identity echoed back in batched results
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub id: String,
    pub kind: String,
}

/// Outcome of a rule or of the aggregation for one action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    /// Allow the action
    #[serde(rename = "EFFECT_ALLOW", alias = "Allow")]
    Allow,
    /// Deny the action
    #[serde(rename = "EFFECT_DENY", alias = "Deny")]
    Deny,
}

impl Effect {
    /// Whether this is [`Effect::Allow`]
    pub fn is_allow(self) -> bool {
        matches!(self, Effect::Allow)
    }

    /// Textual tag of the effect
    pub fn as_str(self) -> &'static str {
        match self {
            Effect::Allow => "EFFECT_ALLOW",
            Effect::Deny => "EFFECT_DENY",
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_principal_creation() {
        let principal = Principal::new("sally")
            .with_role("USER")
            .with_attr("department", "SALES")
            .with_attr("region", "EMEA");

        assert_eq!(principal.id, "sally");
        assert!(principal.has_role("USER"));
        assert!(!principal.has_role("ADMIN"));
        assert_eq!(principal.attr_str("department"), Some("SALES"));
    }

    #[test]
    fn test_has_any_role() {
        let principal = Principal::new("derek").with_roles(["USER", "MANAGER"]);

        let managers: BTreeSet<String> = ["MANAGER".to_string()].into();
        let admins: BTreeSet<String> = ["ADMIN".to_string()].into();
        let anyone: BTreeSet<String> = [ALL_ACTIONS.to_string()].into();

        assert!(principal.has_any_role(&managers));
        assert!(!principal.has_any_role(&admins));
        assert!(principal.has_any_role(&anyone));
    }

    #[test]
    fn test_resource_creation() {
        let resource = Resource::new("expense", "expense1")
            .with_attr("ownerId", "sally")
            .with_attr("amount", 500);

        assert_eq!(resource.kind, "expense");
        assert_eq!(resource.attr_str("ownerId"), Some("sally"));
        assert_eq!(resource.attr("amount"), Some(&json!(500)));

        let reference = resource.to_ref();
        assert_eq!(reference.id, "expense1");
        assert_eq!(reference.kind, "expense");
    }

    #[test]
    fn test_effect_serialization() {
        assert_eq!(serde_json::to_value(Effect::Allow).unwrap(), json!("EFFECT_ALLOW"));
        assert_eq!(serde_json::to_value(Effect::Deny).unwrap(), json!("EFFECT_DENY"));

        let parsed: Effect = serde_json::from_value(json!("Allow")).unwrap();
        assert_eq!(parsed, Effect::Allow);
        assert_eq!(Effect::Deny.to_string(), "EFFECT_DENY");
    }

    #[test]
    fn test_principal_deserialization() {
        let principal: Principal = serde_json::from_value(json!({
            "id": "ian",
            "roles": ["ADMIN"],
            "attr": { "department": "IT" }
        }))
        .unwrap();

        assert!(principal.has_role("ADMIN"));
        assert_eq!(principal.attr_str("department"), Some("IT"));
    }
}
