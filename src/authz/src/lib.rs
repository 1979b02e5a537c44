//! # ABAC Authorization Engine
//!
//! Attribute-based access control decisions over declarative resource
//! policies and dynamically derived roles.
//!
//! ## Features
//!
//! - **Condition trees** of caller-supplied predicates with `any`/`all`/`none`
//! - **Derived roles** computed per request from roles and attributes
//! - **Deny-override** aggregation with default deny
//! - **Batched checks** over many resources, parallelized with rayon
//! - **Audit sinks** and Prometheus-style metrics
//! - **JSON documents** for policies, derived roles and test suites
//!
//! ## Example
//!
//! ```rust
//! use abac_authz::condition::ConditionNode;
//! use abac_authz::derived_roles::{DerivedRoleDefinition, DerivedRoleSet};
//! use abac_authz::policy::{ResourcePolicy, Rule};
//! use abac_authz::{PolicyEngine, Principal, Resource};
//!
//! let common_roles = DerivedRoleSet::new("common_roles").with_definition(
//!     DerivedRoleDefinition::new(
//!         "OWNER",
//!         ["USER"],
//!         ConditionNode::predicate(|ctx| ctx.r().attr_str("ownerId") == Some(ctx.p().id.as_str())),
//!     ),
//! );
//!
//! let expense_policy = ResourcePolicy::new("expense")
//!     .with_import("common_roles")
//!     .with_rule(Rule::allow(["view"]).with_derived_roles(["OWNER"]))
//!     .with_rule(Rule::allow(["*"]).with_roles(["ADMIN"]));
//!
//! let engine = PolicyEngine::new([expense_policy], [common_roles]).unwrap();
//!
//! let sally = Principal::new("sally").with_role("USER");
//! let expense = Resource::new("expense", "expense1").with_attr("ownerId", "sally");
//!
//! assert!(engine.is_allowed(&sally, &expense, "view"));
//! assert!(!engine.is_allowed(&sally, &expense, "delete"));
//! ```

pub mod condition;
pub mod derived_roles;
pub mod engine;
pub mod error;
pub mod loader;
pub mod policy;
pub mod testing;
pub mod types;
pub mod variables;

// Re-export commonly used types
pub use condition::{ConditionNode, EvalContext, Predicate};
pub use derived_roles::{DerivedRoleDefinition, DerivedRoleSet};
pub use engine::{
    ActionOutcome, AuditEntry, AuditSink, CheckResourcesRequest, CheckResourcesResponse,
    EffectFormat, EngineConfig, MetricsCollector, PolicyEngine, ResourceCheck, ResourceResult,
};
pub use error::{AuthzError, Result};
pub use loader::{parse_derived_roles, parse_policy, FunctionRegistry};
pub use policy::{ResourcePolicy, RoleMatch, Rule, RuleBuilder};
pub use types::{Attributes, Effect, Principal, Resource, ResourceRef, ALL_ACTIONS};
pub use variables::{Constants, VariableFn, Variables};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
