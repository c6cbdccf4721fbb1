//! Governance error types

use thiserror::Error;

/// Failures reported by a policy store backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unknown ruleset: {0}")]
    UnknownRuleset(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl From<deadpool_postgres::PoolError> for StoreError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        StoreError::Backend(format!("Database pool error: {}", e))
    }
}

/// Errors surfaced by the policy manager
#[derive(Error, Debug)]
pub enum GovernanceError {
    #[error("{0}")]
    InvalidPolicyAction(String),

    #[error("Policy not found: {0}")]
    PolicyNotFound(String),

    #[error("Policy already exists: {0}")]
    PolicyAlreadyExists(String),

    #[error("Unknown ruleset: {0}")]
    UnknownRuleset(String),

    #[error("Governance store failure: {0}")]
    StoreFailure(#[source] StoreError),
}

impl From<StoreError> for GovernanceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(msg) => GovernanceError::PolicyAlreadyExists(msg),
            StoreError::UnknownRuleset(id) => GovernanceError::UnknownRuleset(id),
            other => GovernanceError::StoreFailure(other),
        }
    }
}

/// Result type for governance operations
pub type GovernanceResult<T> = Result<T, GovernanceError>;
