//! Governance policy DTOs

use crate::governance::{GovernableState, GovernanceAction, GovernancePolicy};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request body for creating or replacing a policy.
///
/// Any `id` sent by the client is ignored; ids are assigned server side.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRequest {
    #[validate(custom(function = "validate_name"))]
    pub name: String,

    #[validate(length(max = 1024, message = "Description must be at most 1024 characters"))]
    #[serde(default)]
    pub description: Option<String>,

    #[validate(custom(function = "validate_labels"))]
    #[serde(default)]
    pub labels: Vec<String>,

    #[serde(default)]
    pub actions: Vec<GovernanceAction>,

    #[serde(default)]
    pub ruleset_ids: Vec<String>,
}

impl From<PolicyRequest> for GovernancePolicy {
    fn from(req: PolicyRequest) -> Self {
        GovernancePolicy {
            id: String::new(),
            name: req.name.trim().to_string(),
            description: req.description,
            labels: req.labels.iter().map(|l| l.trim().to_string()).collect(),
            actions: req.actions,
            ruleset_ids: req.ruleset_ids.iter().map(|r| r.trim().to_string()).collect(),
        }
    }
}

/// Names are stored trimmed, so the bounds apply to the trimmed text
fn validate_name(name: &str) -> Result<(), validator::ValidationError> {
    let len = name.trim().chars().count();
    if !(1..=256).contains(&len) {
        let mut err = validator::ValidationError::new("name_length");
        err.message = Some("Policy name must be between 1 and 256 characters".into());
        return Err(err);
    }
    Ok(())
}

/// Labels must carry text
fn validate_labels(labels: &[String]) -> Result<(), validator::ValidationError> {
    if labels.iter().any(|l| l.trim().is_empty()) {
        let mut err = validator::ValidationError::new("blank_label");
        err.message = Some("Labels must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Optional lifecycle state filter
#[derive(Debug, Deserialize)]
pub struct StateQuery {
    pub state: Option<GovernableState>,
}

/// Lifecycle state for the blocking check
#[derive(Debug, Deserialize)]
pub struct BlockingQuery {
    pub state: GovernableState,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockingCheckResponse {
    pub policy_id: String,
    pub state: GovernableState,
    pub blocking: bool,
}

/// A policy reference as returned by label and organization queries
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PolicyRef {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl PolicyRef {
    pub fn from_map(map: std::collections::BTreeMap<String, String>) -> Vec<Self> {
        map.into_iter()
            .map(|(id, name)| PolicyRef { id, name: Some(name) })
            .collect()
    }

    pub fn from_ids(ids: Vec<String>) -> Vec<Self> {
        ids.into_iter().map(|id| PolicyRef { id, name: None }).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ignores_client_id_and_trims_labels() {
        let req: PolicyRequest = serde_json::from_str(
            r#"{"id":"mine","name":" pci ","labels":[" finance "],"rulesetIds":["rs-1"],
                "actions":[{"type":"BLOCK","governableState":"API_PUBLISH","ruleSeverity":"ERROR"}]}"#,
        )
        .unwrap();
        assert!(req.validate().is_ok());

        let policy: GovernancePolicy = req.into();
        assert!(policy.id.is_empty());
        assert_eq!(policy.name, "pci");
        assert!(policy.has_label("finance"));
        assert_eq!(policy.ruleset_ids, vec!["rs-1".to_string()]);
    }

    #[test]
    fn test_blank_label_and_empty_name_are_rejected() {
        let req: PolicyRequest = serde_json::from_str(r#"{"name":"p","labels":["  "]}"#).unwrap();
        assert!(req.validate().is_err());

        let req: PolicyRequest = serde_json::from_str(r#"{"name":""}"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_name_bounds_apply_after_trimming() {
        let req: PolicyRequest = serde_json::from_str(r#"{"name":"   "}"#).unwrap();
        assert!(req.validate().is_err());

        let padded = format!("  {}  ", "n".repeat(256));
        let req: PolicyRequest = serde_json::from_value(serde_json::json!({ "name": padded })).unwrap();
        assert!(req.validate().is_ok());

        let req: PolicyRequest =
            serde_json::from_value(serde_json::json!({ "name": "n".repeat(257) })).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_unknown_state_is_a_parse_error() {
        let result = serde_json::from_str::<PolicyRequest>(
            r#"{"name":"p","actions":[{"type":"BLOCK","governableState":"API_RETIRE","ruleSeverity":"ERROR"}]}"#,
        );
        assert!(result.is_err());
    }
}
