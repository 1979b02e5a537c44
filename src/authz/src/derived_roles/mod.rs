//! Derived roles module
//!
//! Derived roles are computed per request from the principal's static roles
//! and the request attributes. Policies import whole [`DerivedRoleSet`]s by
//! name and gate rules on the derived role names.
//!
//! # Features
//!
//! - **OR Logic**: Holding any one parent role qualifies the principal
//! - **Conditions**: Each definition is gated by a condition tree
//! - **Scoped Bindings**: Each set layers its own constants and variables
//! - **Role Gating First**: Conditions never run for unqualified principals

pub mod resolver;
pub mod types;


pub use resolver::DerivedRoleSet;
pub use types::DerivedRoleDefinition;
