//! Error types for the authorization engine

use thiserror::Error;

/// Authorization engine errors
///
/// Most variants are raised while building policies, derived role sets or
/// suites. Decision calls never fail on missing data: unknown resource kinds
/// and unknown derived role imports are logged and resolve to a deny.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// A policy, rule or derived role definition violates a structural invariant
    #[error("Malformed definition: {0}")]
    MalformedDefinition(String),

    /// A condition tree is malformed (e.g. an empty combinator list)
    #[error("Malformed condition: {0}")]
    MalformedCondition(String),

    /// Document declares an API version this engine does not understand
    #[error("Unsupported API version: {0}")]
    UnknownPolicyVersion(String),

    /// A named function or derived role set could not be found
    #[error("Unresolved reference: {0}")]
    UnresolvedReference(String),

    /// No policy is registered for a resource kind
    #[error("Unknown resource kind: {0}")]
    UnknownResourceKind(String),

    /// Invalid request or suite input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Audit sink failed to record an entry
    #[error("Audit error: {0}")]
    Audit(String),
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;
