//! Condition evaluation
//!
//! Conditions are trees of caller-supplied predicates combined with
//! `any`, `all` and `none`. They gate rules and derived role definitions and
//! are evaluated against an [`EvalContext`].
//!
//! # Example
//!
//! ```rust
//! use abac_authz::condition::{ConditionNode, EvalContext};
//! use abac_authz::{Principal, Resource};
//!
//! let open_and_owned = ConditionNode::all([
//!     ConditionNode::predicate(|ctx| ctx.r().attr_str("status") == Some("OPEN")),
//!     ConditionNode::predicate(|ctx| ctx.r().attr_str("ownerId") == Some(ctx.p().id.as_str())),
//! ]);
//! open_and_owned.validate().unwrap();
//!
//! let sally = Principal::new("sally").with_role("USER");
//! let expense = Resource::new("expense", "expense1")
//!     .with_attr("status", "OPEN")
//!     .with_attr("ownerId", "sally");
//!
//! assert!(open_and_owned.is_fulfilled(&EvalContext::new(&sally, &expense)));
//! ```

pub mod context;
pub mod node;


pub use context::EvalContext;
pub use node::{ConditionNode, Predicate};
