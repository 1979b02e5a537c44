//! JSON policy documents
//!
//! Resource policies and derived role sets can be declared as JSON
//! documents. Conditions and variables refer to functions by name; the
//! names are resolved through a caller-populated [`FunctionRegistry`].
//!
//! ```json
//! {
//!   "apiVersion": "v1",
//!   "resourcePolicy": {
//!     "version": "default",
//!     "resource": "expense",
//!     "importDerivedRoles": ["common_roles"],
//!     "rules": [
//!       {
//!         "actions": ["update"],
//!         "effect": "EFFECT_ALLOW",
//!         "derivedRoles": ["OWNER"],
//!         "condition": { "match": { "all": [{ "expr": "isOpen" }] } }
//!       }
//!     ]
//!   }
//! }
//! ```
//!
//! A match expression is either `{"expr": "<predicate>"}` or one of
//! `{"any": [...]}`, `{"all": [...]}` and `{"none": [...]}`.

use crate::condition::{ConditionNode, EvalContext, Predicate};
use crate::derived_roles::{DerivedRoleDefinition, DerivedRoleSet};
use crate::error::{AuthzError, Result};
use crate::policy::{ResourcePolicy, RoleMatch, Rule, DEFAULT_VERSION};
use crate::types::{Attributes, Effect};
use crate::variables::{Constants, VariableFn, Variables};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// The only document API version understood by this engine
pub const API_VERSION: &str = "v1";

/// Named predicates and variable functions referenced by documents
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    predicates: HashMap<String, Arc<dyn Predicate>>,
    variables: HashMap<String, Arc<dyn VariableFn>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a predicate, replacing any previous one with the same name
    pub fn with_predicate<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&EvalContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.register_predicate(name, Arc::new(predicate));
        self
    }

    /// Register a variable function, replacing any previous one with the same name
    pub fn with_variable<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&EvalContext<'_>) -> Value + Send + Sync + 'static,
    {
        self.register_variable(name, Arc::new(function));
        self
    }

    pub fn register_predicate(&mut self, name: impl Into<String>, predicate: Arc<dyn Predicate>) {
        self.predicates.insert(name.into(), predicate);
    }

    pub fn register_variable(&mut self, name: impl Into<String>, function: Arc<dyn VariableFn>) {
        self.variables.insert(name.into(), function);
    }

    /// Look up a predicate
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::UnresolvedReference`] if no predicate is registered
    /// under `name`.
    pub fn predicate(&self, name: &str) -> Result<Arc<dyn Predicate>> {
        self.predicates
            .get(name)
            .cloned()
            .ok_or_else(|| AuthzError::UnresolvedReference(format!("predicate '{}'", name)))
    }

    /// Look up a variable function
    pub fn variable(&self, name: &str) -> Result<Arc<dyn VariableFn>> {
        self.variables
            .get(name)
            .cloned()
            .ok_or_else(|| AuthzError::UnresolvedReference(format!("variable function '{}'", name)))
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut predicates: Vec<_> = self.predicates.keys().collect();
        let mut variables: Vec<_> = self.variables.keys().collect();
        predicates.sort();
        variables.sort();

        f.debug_struct("FunctionRegistry")
            .field("predicates", &predicates)
            .field("variables", &variables)
            .finish()
    }
}

/// Resource policy document
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PolicyDocument {
    pub api_version: String,
    pub resource_policy: ResourcePolicySpec,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResourcePolicySpec {
    #[serde(default)]
    pub version: Option<String>,
    pub resource: String,
    pub rules: Vec<RuleSpec>,
    #[serde(default)]
    pub constants: Attributes,
    /// Variable name → registered function name
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub import_derived_roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RuleSpec {
    pub actions: Vec<String>,
    pub effect: Effect,
    #[serde(default)]
    pub roles: Option<Vec<String>>,
    #[serde(default)]
    pub derived_roles: Option<Vec<String>>,
    #[serde(default)]
    pub condition: Option<ConditionSpec>,
}

/// Derived role set document
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DerivedRolesDocument {
    pub api_version: String,
    pub derived_roles: DerivedRolesSpec,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DerivedRolesSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub constants: Attributes,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    pub definitions: Vec<DefinitionSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DefinitionSpec {
    pub name: String,
    pub parent_roles: Vec<String>,
    pub condition: ConditionSpec,
}

/// `{"match": <expr>}`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionSpec {
    #[serde(rename = "match")]
    pub match_expr: MatchExpr,
}

/// Match expression tree with named predicates at the leaves
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchExpr {
    Expr(String),
    Any(Vec<MatchExpr>),
    All(Vec<MatchExpr>),
    None(Vec<MatchExpr>),
}

impl MatchExpr {
    /// Resolve predicate names into a condition tree
    pub fn resolve(&self, registry: &FunctionRegistry) -> Result<ConditionNode> {
        let resolve_all = |children: &[MatchExpr]| {
            children
                .iter()
                .map(|child| child.resolve(registry))
                .collect::<Result<Vec<_>>>()
        };

        Ok(match self {
            Self::Expr(name) => ConditionNode::from_predicate(registry.predicate(name)?),
            Self::Any(children) => ConditionNode::Any(resolve_all(children)?),
            Self::All(children) => ConditionNode::All(resolve_all(children)?),
            Self::None(children) => ConditionNode::None(resolve_all(children)?),
        })
    }
}

impl PolicyDocument {
    /// Build and validate the resource policy
    pub fn into_policy(self, registry: &FunctionRegistry) -> Result<ResourcePolicy> {
        let spec = self.resource_policy;

        let rules = spec
            .rules
            .into_iter()
            .enumerate()
            .map(|(index, rule)| rule.into_rule(&spec.resource, index, registry))
            .collect::<Result<Vec<_>>>()?;

        let policy = ResourcePolicy::new(spec.resource)
            .with_version(spec.version.unwrap_or_else(|| DEFAULT_VERSION.to_string()))
            .with_rules(rules)
            .with_constants(Constants::new(spec.constants))
            .with_variables(resolve_variables(&spec.variables, registry)?)
            .with_imports(spec.import_derived_roles);

        policy.validate()?;
        Ok(policy)
    }
}

impl RuleSpec {
    fn into_rule(self, kind: &str, index: usize, registry: &FunctionRegistry) -> Result<Rule> {
        let role_match = match (self.roles, self.derived_roles) {
            (Some(roles), None) => RoleMatch::Roles(roles.into_iter().collect()),
            (None, Some(derived)) => RoleMatch::DerivedRoles(derived.into_iter().collect()),
            (roles, _) => {
                let problem = if roles.is_some() {
                    "roles and derivedRoles cannot be specified together"
                } else {
                    "roles or derivedRoles must be specified"
                };
                return Err(AuthzError::MalformedDefinition(format!(
                    "Resource policy '{}', rule {}: {}",
                    kind, index, problem
                )));
            }
        };

        let mut rule = Rule::new(self.actions, self.effect, role_match);
        rule.condition = self
            .condition
            .map(|condition| condition.match_expr.resolve(registry))
            .transpose()?;
        Ok(rule)
    }
}

impl DerivedRolesDocument {
    /// Build and validate the derived role set
    pub fn into_set(self, registry: &FunctionRegistry) -> Result<DerivedRoleSet> {
        let spec = self.derived_roles;

        let definitions = spec
            .definitions
            .into_iter()
            .map(|definition| -> Result<DerivedRoleDefinition> {
                let condition = definition.condition.match_expr.resolve(registry)?;
                Ok(DerivedRoleDefinition::new(definition.name, definition.parent_roles, condition))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut set = DerivedRoleSet::new(spec.name)
            .with_constants(Constants::new(spec.constants))
            .with_variables(resolve_variables(&spec.variables, registry)?)
            .with_definitions(definitions);
        set.description = spec.description;

        set.validate()?;
        Ok(set)
    }
}

fn resolve_variables(names: &BTreeMap<String, String>, registry: &FunctionRegistry) -> Result<Variables> {
    names
        .iter()
        .try_fold(Variables::new(), |variables, (name, function)| -> Result<Variables> {
            Ok(variables.with_function(name.as_str(), registry.variable(function)?))
        })
}

/// Parse a resource policy document
///
/// # Errors
///
/// - [`AuthzError::Serialization`] if the input is not JSON
/// - [`AuthzError::UnknownPolicyVersion`] if `apiVersion` is not `"v1"`
/// - [`AuthzError::MalformedDefinition`] for unknown fields, unknown
///   combinators or structural violations
/// - [`AuthzError::UnresolvedReference`] for unregistered function names
pub fn parse_policy(json: &str, registry: &FunctionRegistry) -> Result<ResourcePolicy> {
    let document: PolicyDocument = parse_document(json)?;
    let policy = document.into_policy(registry)?;
    debug!(kind = %policy.kind, rules = policy.rules.len(), "Loaded resource policy document");
    Ok(policy)
}

/// Parse a derived role set document
pub fn parse_derived_roles(json: &str, registry: &FunctionRegistry) -> Result<DerivedRoleSet> {
    let document: DerivedRolesDocument = parse_document(json)?;
    let set = document.into_set(registry)?;
    debug!(set = %set.name, definitions = set.definitions.len(), "Loaded derived roles document");
    Ok(set)
}

fn parse_document<T: DeserializeOwned>(json: &str) -> Result<T> {
    let value: Value = serde_json::from_str(json)?;

    match value.get("apiVersion") {
        Some(Value::String(version)) if version == API_VERSION => {}
        Some(Value::String(version)) => {
            return Err(AuthzError::UnknownPolicyVersion(version.clone()));
        }
        Some(other) => {
            return Err(AuthzError::UnknownPolicyVersion(other.to_string()));
        }
        None => {
            return Err(AuthzError::MalformedDefinition(
                "Document is missing apiVersion".to_string(),
            ));
        }
    }

    serde_json::from_value(value).map_err(|e| AuthzError::MalformedDefinition(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Principal, Resource};
    use serde_json::json;

    fn registry() -> FunctionRegistry {
        FunctionRegistry::new()
            .with_predicate("isOpen", |ctx| ctx.r().attr_str("status") == Some("OPEN"))
            .with_predicate("isOwner", |ctx| ctx.r().attr_str("ownerId") == Some(ctx.p().id.as_str()))
            .with_variable("amount", |ctx| ctx.r().attr("amount").cloned().unwrap_or(Value::Null))
    }

    #[test]
    fn test_match_expr_shapes() {
        let expr: MatchExpr = serde_json::from_value(json!({
            "any": [{"expr": "isOpen"}, {"none": [{"expr": "isOwner"}]}]
        }))
        .unwrap();

        let condition = expr.resolve(&registry()).unwrap();
        assert!(matches!(condition, ConditionNode::Any(ref children) if children.len() == 2));

        let unknown = serde_json::from_value::<MatchExpr>(json!({"some": []}));
        assert!(unknown.is_err());
    }

    #[test]
    fn test_unresolved_predicate() {
        let expr = MatchExpr::Expr("missing".to_string());
        assert!(matches!(
            expr.resolve(&registry()),
            Err(AuthzError::UnresolvedReference(_))
        ));
    }

    #[test]
    fn test_policy_document_roundtrip() {
        let json = json!({
            "apiVersion": "v1",
            "resourcePolicy": {
                "resource": "expense",
                "constants": {"limit": 10000},
                "variables": {"amount": "amount"},
                "rules": [{
                    "actions": ["update"],
                    "effect": "EFFECT_ALLOW",
                    "roles": ["USER"],
                    "condition": {"match": {"all": [{"expr": "isOwner"}, {"expr": "isOpen"}]}}
                }]
            }
        })
        .to_string();

        let policy = parse_policy(&json, &registry()).unwrap();
        assert_eq!(policy.kind, "expense");
        assert_eq!(policy.version, DEFAULT_VERSION);
        assert_eq!(policy.constants.len(), 1);
        assert_eq!(policy.variables.names().collect::<Vec<_>>(), vec!["amount"]);

        let sally = Principal::new("sally").with_role("USER");
        let open = Resource::new("expense", "expense1")
            .with_attr("ownerId", "sally")
            .with_attr("status", "OPEN");
        assert!(policy.is_allowed(EvalContext::new(&sally, &open), "update", &Default::default()));
    }
}
