//! Constants and variables scoped to a policy or derived role set
//!
//! Both are resolved into the [`EvalContext`] before conditions run:
//! constants are static, variables are functions of the context (which
//! already carries the scope's constants when they are computed).

use crate::condition::EvalContext;
use crate::types::Attributes;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Static key/value map, identical for every evaluation
#[derive(Debug, Clone, Default)]
pub struct Constants {
    values: Arc<Attributes>,
}

impl Constants {
    pub fn new(values: Attributes) -> Self {
        Self {
            values: Arc::new(values),
        }
    }

    /// Add a constant
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        Arc::make_mut(&mut self.values).insert(name.into(), value.into());
        self
    }

    /// The constants map; the same shared map on every call
    pub fn resolve(&self) -> Arc<Attributes> {
        Arc::clone(&self.values)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

impl From<Attributes> for Constants {
    fn from(values: Attributes) -> Self {
        Self::new(values)
    }
}

/// Function computing a variable value from the context
///
/// Implemented for every `Fn(&EvalContext) -> Value + Send + Sync`.
pub trait VariableFn: Send + Sync {
    fn compute(&self, ctx: &EvalContext<'_>) -> Value;
}

impl<F> VariableFn for F
where
    F: Fn(&EvalContext<'_>) -> Value + Send + Sync,
{
    fn compute(&self, ctx: &EvalContext<'_>) -> Value {
        self(ctx)
    }
}

/// Named derived values
#[derive(Clone, Default)]
pub struct Variables {
    definitions: BTreeMap<String, Arc<dyn VariableFn>>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable computed by a closure
    pub fn with<F>(self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&EvalContext<'_>) -> Value + Send + Sync + 'static,
    {
        self.with_function(name, Arc::new(function))
    }

    /// Add a variable computed by a shared function
    pub fn with_function(mut self, name: impl Into<String>, function: Arc<dyn VariableFn>) -> Self {
        self.definitions.insert(name.into(), function);
        self
    }

    /// Evaluate every variable against the context
    pub fn resolve(&self, ctx: &EvalContext<'_>) -> Attributes {
        self.definitions
            .iter()
            .map(|(name, function)| (name.clone(), function.compute(ctx)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Variable names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }
}

impl fmt::Debug for Variables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.definitions.keys()).finish()
    }
}

/// Layer constants, then variables computed over them, onto a context
pub(crate) fn populate<'a>(
    ctx: EvalContext<'a>,
    constants: &Constants,
    variables: &Variables,
) -> EvalContext<'a> {
    let ctx = if constants.is_empty() {
        ctx
    } else {
        ctx.with_constants(constants.resolve())
    };

    if variables.is_empty() {
        return ctx;
    }

    let values = variables.resolve(&ctx);
    ctx.with_variables(values)
}
