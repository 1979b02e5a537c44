//! Evaluation context handed to predicates and variable functions

use crate::types::{Attributes, Principal, Resource};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Context containing everything visible during condition evaluation
///
/// The context borrows the request's principal and resource and is layered
/// by copy: [`with_constants`](Self::with_constants) and
/// [`with_variables`](Self::with_variables) consume the context and return an
/// extended one, so a base context can be cloned and scoped independently
/// for each policy and derived role set.
///
/// Every part is reachable through a descriptive accessor and a short alias
/// (`principal`/`p`, `resource`/`r`, `constants`/`c`, `variables`/`v`). The
/// aliases return the very same data.
#[derive(Debug, Clone)]
pub struct EvalContext<'a> {
    principal: &'a Principal,
    resource: &'a Resource,
    constants: Option<Arc<Attributes>>,
    variables: Option<Arc<Attributes>>,
    action: Option<&'a str>,
}

impl<'a> EvalContext<'a> {
    /// Create a base context for a principal/resource pair
    pub fn new(principal: &'a Principal, resource: &'a Resource) -> Self {
        Self {
            principal,
            resource,
            constants: None,
            variables: None,
            action: None,
        }
    }

    /// Attach a constants map, replacing any previous one
    pub fn with_constants(mut self, constants: Arc<Attributes>) -> Self {
        self.constants = Some(constants);
        self
    }

    /// Attach computed variables, replacing any previous ones
    pub fn with_variables(mut self, variables: Attributes) -> Self {
        self.variables = Some(Arc::new(variables));
        self
    }

    /// Context narrowed to the action whose rules are being evaluated
    pub fn for_action<'b>(&'b self, action: &'b str) -> EvalContext<'b> {
        EvalContext {
            principal: self.principal,
            resource: self.resource,
            constants: self.constants.clone(),
            variables: self.variables.clone(),
            action: Some(action),
        }
    }

    pub fn principal(&self) -> &'a Principal {
        self.principal
    }

    /// Alias of [`principal`](Self::principal)
    pub fn p(&self) -> &'a Principal {
        self.principal
    }

    pub fn resource(&self) -> &'a Resource {
        self.resource
    }

    /// Alias of [`resource`](Self::resource)
    pub fn r(&self) -> &'a Resource {
        self.resource
    }

    /// Constants of the policy or derived role set in scope
    pub fn constants(&self) -> Option<&Attributes> {
        self.constants.as_deref()
    }

    /// Alias of [`constants`](Self::constants)
    pub fn c(&self) -> Option<&Attributes> {
        self.constants()
    }

    /// Variables computed for the policy or derived role set in scope
    pub fn variables(&self) -> Option<&Attributes> {
        self.variables.as_deref()
    }

    /// Alias of [`variables`](Self::variables)
    pub fn v(&self) -> Option<&Attributes> {
        self.variables()
    }

    /// Look up a single constant
    pub fn constant(&self, name: &str) -> Option<&Value> {
        self.constants().and_then(|c| c.get(name))
    }

    /// Look up a single variable
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables().and_then(|v| v.get(name))
    }

    /// Action under consideration, if a rule is being evaluated
    pub fn action(&self) -> Option<&str> {
        self.action
    }

    /// Render the context as a JSON object with both descriptive and short keys
    pub fn to_value(&self) -> Value {
        let principal = serde_json::to_value(self.principal).unwrap_or(Value::Null);
        let resource = serde_json::to_value(self.resource).unwrap_or(Value::Null);
        let constants = Self::attributes_value(self.constants());
        let variables = Self::attributes_value(self.variables());

        let mut vars = Map::new();
        vars.insert("P".to_string(), principal.clone());
        vars.insert("principal".to_string(), principal);
        vars.insert("R".to_string(), resource.clone());
        vars.insert("resource".to_string(), resource);
        vars.insert("C".to_string(), constants.clone());
        vars.insert("constants".to_string(), constants);
        vars.insert("V".to_string(), variables.clone());
        vars.insert("variables".to_string(), variables);
        if let Some(action) = self.action {
            vars.insert("action".to_string(), Value::String(action.to_string()));
        }

        Value::Object(vars)
    }

    fn attributes_value(attributes: Option<&Attributes>) -> Value {
        match attributes {
            Some(map) => Value::Object(map.clone().into_iter().collect()),
            None => Value::Null,
        }
    }
}
