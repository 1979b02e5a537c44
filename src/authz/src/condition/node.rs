//! Boolean condition trees

use super::context::EvalContext;
use crate::error::{AuthzError, Result};
use std::fmt;
use std::sync::Arc;

/// Caller-supplied boolean check over an evaluation context
///
/// Implemented for every `Fn(&EvalContext) -> bool + Send + Sync`, so plain
/// closures can be used directly. The engine only ever calls through this
/// trait; a panicking predicate propagates to the caller.
pub trait Predicate: Send + Sync {
    /// Evaluate the predicate against the context
    fn evaluate(&self, ctx: &EvalContext<'_>) -> bool;
}

impl<F> Predicate for F
where
    F: Fn(&EvalContext<'_>) -> bool + Send + Sync,
{
    fn evaluate(&self, ctx: &EvalContext<'_>) -> bool {
        self(ctx)
    }
}

/// Condition expression tree
///
/// Combinators hold at least one child; [`validate`](Self::validate) rejects
/// empty lists and is run whenever a rule or derived role is validated.
#[derive(Clone)]
pub enum ConditionNode {
    /// Single predicate
    Predicate(Arc<dyn Predicate>),
    /// True if at least one child is true
    Any(Vec<ConditionNode>),
    /// True if every child is true
    All(Vec<ConditionNode>),
    /// True if no child is true
    None(Vec<ConditionNode>),
}

impl ConditionNode {
    /// Wrap a closure as a predicate node
    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&EvalContext<'_>) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(predicate))
    }

    /// Wrap a shared predicate as a node
    pub fn from_predicate(predicate: Arc<dyn Predicate>) -> Self {
        Self::Predicate(predicate)
    }

    pub fn any(children: impl IntoIterator<Item = ConditionNode>) -> Self {
        Self::Any(children.into_iter().collect())
    }

    pub fn all(children: impl IntoIterator<Item = ConditionNode>) -> Self {
        Self::All(children.into_iter().collect())
    }

    pub fn none(children: impl IntoIterator<Item = ConditionNode>) -> Self {
        Self::None(children.into_iter().collect())
    }

    /// Check the tree shape: every combinator must have children
    pub fn validate(&self) -> Result<()> {
        let (kind, children) = match self {
            Self::Predicate(_) => return Ok(()),
            Self::Any(children) => ("any", children),
            Self::All(children) => ("all", children),
            Self::None(children) => ("none", children),
        };

        if children.is_empty() {
            return Err(AuthzError::MalformedCondition(format!(
                "`{}` requires at least one condition",
                kind
            )));
        }

        children.iter().try_for_each(ConditionNode::validate)
    }

    /// Evaluate the tree against a context
    ///
    /// Combinators short-circuit; nothing is memoized.
    pub fn is_fulfilled(&self, ctx: &EvalContext<'_>) -> bool {
        match self {
            Self::Predicate(predicate) => predicate.evaluate(ctx),
            Self::Any(children) => children.iter().any(|child| child.is_fulfilled(ctx)),
            Self::All(children) => children.iter().all(|child| child.is_fulfilled(ctx)),
            Self::None(children) => !children.iter().any(|child| child.is_fulfilled(ctx)),
        }
    }
}

impl fmt::Debug for ConditionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Predicate(_) => f.write_str("Predicate(..)"),
            Self::Any(children) => f.debug_tuple("Any").field(children).finish(),
            Self::All(children) => f.debug_tuple("All").field(children).finish(),
            Self::None(children) => f.debug_tuple("None").field(children).finish(),
        }
    }
}
