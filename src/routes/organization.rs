//! Caller organization extraction
//!
//! The organization is resolved upstream (gateway / auth layer) and forwarded
//! in a header. It is trusted as-is.

use crate::error::AppError;
use axum::{extract::FromRequestParts, http::request::Parts};

pub const ORGANIZATION_HEADER: &str = "x-organization";

/// Organization the request acts on behalf of
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Organization(pub String);

impl<S> FromRequestParts<S> for Organization
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let organization = parts
            .headers
            .get(ORGANIZATION_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|org| !org.is_empty())
            .ok_or_else(|| AppError::BadRequest("Missing X-Organization header".to_string()))?;

        Ok(Organization(organization.to_string()))
    }
}
