//! Governance policy route handlers

use crate::error::{validation_error, ApiResult};
use crate::governance::{GovernancePolicy, GovernancePolicyList, Ruleset};
use crate::models::{
    BlockingCheckResponse, BlockingQuery, PolicyRef, PolicyRequest, StateQuery, SuccessResponse,
};
use crate::routes::organization::Organization;
use crate::state::SharedState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::debug;
use validator::Validate;

/// Create a governance policy
pub async fn create_policy(
    State(state): State<SharedState>,
    Organization(org): Organization,
    Json(payload): Json<PolicyRequest>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<GovernancePolicy>>)> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let policy = state.policies.create(&org, payload.into()).await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data(
            format!("Policy '{}' created successfully", policy.name),
            policy,
        )),
    ))
}

/// List all policies of the caller's organization
pub async fn list_policies(
    State(state): State<SharedState>,
    Organization(org): Organization,
) -> ApiResult<Json<SuccessResponse<GovernancePolicyList>>> {
    let list = state.policies.list(&org).await?;
    Ok(Json(SuccessResponse::with_data(
        format!("Found {} policies", list.count),
        list,
    )))
}

/// Get a single policy
pub async fn get_policy(
    State(state): State<SharedState>,
    Path(policy_id): Path<String>,
) -> ApiResult<Json<SuccessResponse<GovernancePolicy>>> {
    let policy = state.policies.get_by_id(&policy_id).await?;
    Ok(Json(SuccessResponse::with_data("Policy retrieved", policy)))
}

/// Replace a policy
pub async fn update_policy(
    State(state): State<SharedState>,
    Organization(org): Organization,
    Path(policy_id): Path<String>,
    Json(payload): Json<PolicyRequest>,
) -> ApiResult<Json<SuccessResponse<GovernancePolicy>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let policy = state.policies.update(&policy_id, &org, payload.into()).await?;
    Ok(Json(SuccessResponse::with_data(
        format!("Policy '{}' updated successfully", policy.name),
        policy,
    )))
}

/// Delete a policy
pub async fn delete_policy(
    State(state): State<SharedState>,
    Organization(org): Organization,
    Path(policy_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.policies.delete(&policy_id, &org).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Rulesets attached to a policy
pub async fn policy_rulesets(
    State(state): State<SharedState>,
    Path(policy_id): Path<String>,
) -> ApiResult<Json<SuccessResponse<Vec<Ruleset>>>> {
    let rulesets = state.policies.rulesets_of(&policy_id).await?;
    Ok(Json(SuccessResponse::with_data(
        format!("Found {} rulesets", rulesets.len()),
        rulesets,
    )))
}

/// Whether a policy blocks the given lifecycle state
pub async fn blocking_check(
    State(state): State<SharedState>,
    Path(policy_id): Path<String>,
    Query(query): Query<BlockingQuery>,
) -> ApiResult<Json<SuccessResponse<BlockingCheckResponse>>> {
    let blocking = state
        .policies
        .is_blocking_action_present(&policy_id, query.state)
        .await?;
    debug!("Policy {} blocking on {}: {}", policy_id, query.state, blocking);

    Ok(Json(SuccessResponse::with_data(
        "Blocking check completed",
        BlockingCheckResponse {
            policy_id,
            state: query.state,
            blocking,
        },
    )))
}

/// Policies carrying a label, optionally narrowed to a lifecycle state
pub async fn policies_by_label(
    State(state): State<SharedState>,
    Organization(org): Organization,
    Path(label): Path<String>,
    Query(query): Query<StateQuery>,
) -> ApiResult<Json<SuccessResponse<Vec<PolicyRef>>>> {
    // Stored labels are trimmed
    let label = label.trim();
    if label.is_empty() {
        return Err(validation_error("Label must not be blank"));
    }

    let policies = match query.state {
        Some(s) => PolicyRef::from_ids(
            state.policies.policies_by_label_and_state(label, s, &org).await?,
        ),
        None => PolicyRef::from_map(state.policies.policies_by_label(label, &org).await?),
    };
    Ok(Json(SuccessResponse::with_data(
        format!("Found {} policies for label '{}'", policies.len(), label),
        policies,
    )))
}

/// Organization-wide (unlabeled) policies, optionally narrowed to a lifecycle state
pub async fn organization_policies(
    State(state): State<SharedState>,
    Organization(org): Organization,
    Query(query): Query<StateQuery>,
) -> ApiResult<Json<SuccessResponse<Vec<PolicyRef>>>> {
    let policies = match query.state {
        Some(s) => PolicyRef::from_ids(state.policies.org_wide_policies_by_state(s, &org).await?),
        None => PolicyRef::from_map(state.policies.org_wide_policies(&org).await?),
    };
    Ok(Json(SuccessResponse::with_data(
        format!("Found {} organization-wide policies", policies.len()),
        policies,
    )))
}
