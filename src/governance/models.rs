//! Governance policy domain model
//!
//! Policies, the actions they fire at each lifecycle point, and the rulesets
//! they reference.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

/// What a policy does when its rulesets are violated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GovernanceActionType {
    /// Stop the lifecycle transition
    Block,
    /// Let the transition through and report the violations
    Notify,
}

/// Lifecycle points of an API at which governance is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GovernableState {
    ApiCreate,
    ApiUpdate,
    ApiDeploy,
    ApiPublish,
}

impl GovernableState {
    pub const ALL: [GovernableState; 4] = [
        GovernableState::ApiCreate,
        GovernableState::ApiUpdate,
        GovernableState::ApiDeploy,
        GovernableState::ApiPublish,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GovernableState::ApiCreate => "API_CREATE",
            GovernableState::ApiUpdate => "API_UPDATE",
            GovernableState::ApiDeploy => "API_DEPLOY",
            GovernableState::ApiPublish => "API_PUBLISH",
        }
    }
}

/// Severity of the rule violation an action reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleSeverity {
    Error,
    Warn,
    Info,
}

impl GovernanceActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GovernanceActionType::Block => "BLOCK",
            GovernanceActionType::Notify => "NOTIFY",
        }
    }
}

impl RuleSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleSeverity::Error => "ERROR",
            RuleSeverity::Warn => "WARN",
            RuleSeverity::Info => "INFO",
        }
    }
}

impl fmt::Display for GovernanceActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for GovernableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for RuleSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a stored or user-supplied enum value is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for GovernanceActionType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BLOCK" => Ok(GovernanceActionType::Block),
            "NOTIFY" => Ok(GovernanceActionType::Notify),
            other => Err(UnknownVariant { kind: "action type", value: other.to_string() }),
        }
    }
}

impl FromStr for GovernableState {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GovernableState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| UnknownVariant { kind: "governable state", value: s.to_string() })
    }
}

impl FromStr for RuleSeverity {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ERROR" => Ok(RuleSeverity::Error),
            "WARN" => Ok(RuleSeverity::Warn),
            "INFO" => Ok(RuleSeverity::Info),
            other => Err(UnknownVariant { kind: "rule severity", value: other.to_string() }),
        }
    }
}

/// A single action a policy fires at one governable state
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernanceAction {
    #[serde(rename = "type")]
    pub action_type: GovernanceActionType,
    pub governable_state: GovernableState,
    pub rule_severity: RuleSeverity,
}

impl GovernanceAction {
    pub fn is_blocking_for(&self, state: GovernableState) -> bool {
        self.action_type == GovernanceActionType::Block && self.governable_state == state
    }
}

#[cfg(test)]
impl GovernanceAction {
    pub fn new(
        action_type: GovernanceActionType,
        governable_state: GovernableState,
        rule_severity: RuleSeverity,
    ) -> Self {
        Self { action_type, governable_state, rule_severity }
    }

    pub fn block(state: GovernableState) -> Self {
        Self::new(GovernanceActionType::Block, state, RuleSeverity::Error)
    }

    pub fn notify(state: GovernableState) -> Self {
        Self::new(GovernanceActionType::Notify, state, RuleSeverity::Warn)
    }
}

/// A governance policy owned by an organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernancePolicy {
    /// Assigned by the policy manager on creation
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Empty means the policy applies to the whole organization
    #[serde(default)]
    pub labels: BTreeSet<String>,
    #[serde(default)]
    pub actions: Vec<GovernanceAction>,
    #[serde(default)]
    pub ruleset_ids: Vec<String>,
}

impl GovernancePolicy {
    /// Policies without labels govern every API in the organization
    pub fn is_organization_wide(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    /// Whether any action of this policy is attached to `state`
    pub fn applies_to_state(&self, state: GovernableState) -> bool {
        self.actions.iter().any(|a| a.governable_state == state)
    }

    /// Drop repeated ruleset ids, keeping the first occurrence of each
    pub fn dedup_ruleset_ids(&mut self) {
        let mut seen = HashSet::new();
        self.ruleset_ids.retain(|id| seen.insert(id.clone()));
    }
}

#[cfg(test)]
impl GovernancePolicy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            description: None,
            labels: BTreeSet::new(),
            actions: Vec::new(),
            ruleset_ids: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.insert(label.into());
        self
    }

    pub fn with_action(mut self, action: GovernanceAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_ruleset(mut self, ruleset_id: impl Into<String>) -> Self {
        self.ruleset_ids.push(ruleset_id.into());
        self
    }
}

/// An externally managed rule bundle referenced by policies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ruleset {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[cfg(test)]
impl Ruleset {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into(), description: None }
    }
}

/// Organization scoped listing of policies
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernancePolicyList {
    pub count: usize,
    pub list: Vec<GovernancePolicy>,
}

impl From<Vec<GovernancePolicy>> for GovernancePolicyList {
    fn from(list: Vec<GovernancePolicy>) -> Self {
        Self { count: list.len(), list }
    }
}
