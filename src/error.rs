//! Error handling module
//!
//! Maps governance and configuration failures onto HTTP responses.

use crate::governance::GovernanceError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Governance(#[from] GovernanceError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String, Option<String>) {
        match self {
            AppError::Governance(GovernanceError::InvalidPolicyAction(msg)) => (
                StatusCode::BAD_REQUEST,
                "INVALID_POLICY_ACTION",
                msg.clone(),
                None,
            ),
            AppError::Governance(GovernanceError::PolicyNotFound(id)) => (
                StatusCode::NOT_FOUND,
                "POLICY_NOT_FOUND",
                format!("Governance policy {} not found", id),
                None,
            ),
            AppError::Governance(GovernanceError::PolicyAlreadyExists(msg)) => (
                StatusCode::CONFLICT,
                "POLICY_ALREADY_EXISTS",
                msg.clone(),
                None,
            ),
            AppError::Governance(GovernanceError::UnknownRuleset(id)) => (
                StatusCode::BAD_REQUEST,
                "UNKNOWN_RULESET",
                format!("Ruleset {} does not exist", id),
                None,
            ),
            AppError::Governance(e @ GovernanceError::StoreFailure(_)) => {
                error!("Governance store failure: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "GOVERNANCE_STORE_ERROR",
                    "A governance store error occurred".to_string(),
                    Some(e.to_string()),
                )
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                None,
            ),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                msg.clone(),
                None,
            ),
            AppError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                    Some(msg.clone()),
                )
            }
            AppError::Config(msg) => {
                error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIG_ERROR",
                    "A configuration error occurred".to_string(),
                    Some(msg.clone()),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = self.parts();

        let body = Json(ErrorResponse {
            success: false,
            message,
            error: details,
            code: Some(error_code.to_string()),
        });

        (status, body).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, AppError>;

/// Helper function to create a validation error
pub fn validation_error(msg: impl Into<String>) -> AppError {
    AppError::Validation(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governance::StoreError;

    #[test]
    fn test_governance_status_codes() {
        let cases = [
            (GovernanceError::InvalidPolicyAction("no".into()), StatusCode::BAD_REQUEST),
            (GovernanceError::PolicyNotFound("p1".into()), StatusCode::NOT_FOUND),
            (GovernanceError::PolicyAlreadyExists("dup".into()), StatusCode::CONFLICT),
            (GovernanceError::UnknownRuleset("rs-9".into()), StatusCode::BAD_REQUEST),
            (
                GovernanceError::StoreFailure(StoreError::Backend("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn test_store_conflict_becomes_already_exists() {
        let err: GovernanceError = StoreError::Conflict("name taken".into()).into();
        assert!(matches!(err, GovernanceError::PolicyAlreadyExists(_)));
    }

    #[test]
    fn test_unknown_ruleset_is_a_client_error() {
        let err: GovernanceError = StoreError::UnknownRuleset("rs-9".into()).into();
        assert!(matches!(err, GovernanceError::UnknownRuleset(ref id) if id == "rs-9"));

        let backend: GovernanceError = StoreError::Backend("down".into()).into();
        assert!(matches!(backend, GovernanceError::StoreFailure(_)));
    }
}
