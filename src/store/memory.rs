//! In-memory policy store
//!
//! Thread-safe map backed store. Used when no database is configured and as
//! the test double for the policy manager.

use crate::governance::{GovernableState, GovernanceAction, GovernancePolicy, Ruleset, StoreError};
use crate::store::{PolicyStore, StoreResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

struct StoredPolicy {
    organization: String,
    policy: GovernancePolicy,
}

#[derive(Default)]
struct Inner {
    policies: HashMap<String, StoredPolicy>,
    rulesets: HashMap<String, Ruleset>,
}

impl Inner {
    fn in_org<'a>(&'a self, organization: &'a str) -> impl Iterator<Item = &'a GovernancePolicy> + 'a {
        self.policies
            .values()
            .filter(move |s| s.organization == organization)
            .map(|s| &s.policy)
    }

    fn check_name_free(&self, organization: &str, name: &str, except_id: Option<&str>) -> StoreResult<()> {
        let taken = self
            .in_org(organization)
            .any(|p| p.name == name && Some(p.id.as_str()) != except_id);
        if taken {
            return Err(StoreError::Conflict(format!(
                "Policy with name '{}' already exists in organization {}",
                name, organization
            )));
        }
        Ok(())
    }

    fn check_rulesets_known(&self, policy: &GovernancePolicy) -> StoreResult<()> {
        match policy.ruleset_ids.iter().find(|id| !self.rulesets.contains_key(*id)) {
            Some(missing) => Err(StoreError::UnknownRuleset(missing.clone())),
            None => Ok(()),
        }
    }
}

fn sorted_ids<'a>(policies: impl Iterator<Item = &'a GovernancePolicy>) -> Vec<String> {
    let mut ids: Vec<String> = policies.map(|p| p.id.clone()).collect();
    ids.sort();
    ids
}

fn id_name_map<'a>(policies: impl Iterator<Item = &'a GovernancePolicy>) -> BTreeMap<String, String> {
    policies.map(|p| (p.id.clone(), p.name.clone())).collect()
}

/// Policy store holding everything in process memory
pub struct InMemoryPolicyStore {
    inner: RwLock<Inner>,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

#[cfg(test)]
impl InMemoryPolicyStore {
    /// Create a store with a pre-populated ruleset catalog
    pub fn with_rulesets(rulesets: impl IntoIterator<Item = Ruleset>) -> Self {
        let inner = Inner {
            policies: HashMap::new(),
            rulesets: rulesets.into_iter().map(|r| (r.id.clone(), r)).collect(),
        };
        Self {
            inner: RwLock::new(inner),
        }
    }

    /// Number of stored policies across all organizations
    pub async fn policy_count(&self) -> usize {
        self.inner.read().await.policies.len()
    }
}

impl Default for InMemoryPolicyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn create_policy(
        &self,
        organization: &str,
        policy: &GovernancePolicy,
    ) -> StoreResult<GovernancePolicy> {
        let mut inner = self.inner.write().await;
        if inner.policies.contains_key(&policy.id) {
            return Err(StoreError::Conflict(format!("Policy id {} is already in use", policy.id)));
        }
        inner.check_name_free(organization, &policy.name, None)?;
        inner.check_rulesets_known(policy)?;

        inner.policies.insert(
            policy.id.clone(),
            StoredPolicy {
                organization: organization.to_string(),
                policy: policy.clone(),
            },
        );
        Ok(policy.clone())
    }

    async fn get_policy_by_id(&self, policy_id: &str) -> StoreResult<Option<GovernancePolicy>> {
        let inner = self.inner.read().await;
        Ok(inner.policies.get(policy_id).map(|s| s.policy.clone()))
    }

    async fn update_policy(
        &self,
        policy_id: &str,
        organization: &str,
        policy: &GovernancePolicy,
    ) -> StoreResult<Option<GovernancePolicy>> {
        let mut inner = self.inner.write().await;
        let exists = inner
            .policies
            .get(policy_id)
            .map_or(false, |s| s.organization == organization);
        if !exists {
            return Ok(None);
        }
        inner.check_name_free(organization, &policy.name, Some(policy_id))?;
        inner.check_rulesets_known(policy)?;

        let mut replacement = policy.clone();
        replacement.id = policy_id.to_string();
        inner.policies.insert(
            policy_id.to_string(),
            StoredPolicy {
                organization: organization.to_string(),
                policy: replacement.clone(),
            },
        );
        Ok(Some(replacement))
    }

    async fn delete_policy(&self, policy_id: &str, organization: &str) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        let owned = inner
            .policies
            .get(policy_id)
            .map_or(false, |s| s.organization == organization);
        if owned {
            inner.policies.remove(policy_id);
        }
        Ok(owned)
    }

    async fn list_policies(&self, organization: &str) -> StoreResult<Vec<GovernancePolicy>> {
        let inner = self.inner.read().await;
        let mut list: Vec<GovernancePolicy> = inner.in_org(organization).cloned().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(list)
    }

    async fn upsert_ruleset(&self, ruleset: &Ruleset) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        debug!("Registering ruleset {}", ruleset.id);
        inner.rulesets.insert(ruleset.id.clone(), ruleset.clone());
        Ok(())
    }

    async fn get_rulesets_by_policy_id(&self, policy_id: &str) -> StoreResult<Vec<Ruleset>> {
        let inner = self.inner.read().await;
        let Some(stored) = inner.policies.get(policy_id) else {
            return Ok(Vec::new());
        };
        Ok(stored
            .policy
            .ruleset_ids
            .iter()
            .filter_map(|id| inner.rulesets.get(id).cloned())
            .collect())
    }

    async fn get_actions_by_policy_id(&self, policy_id: &str) -> StoreResult<Vec<GovernanceAction>> {
        let inner = self.inner.read().await;
        Ok(inner
            .policies
            .get(policy_id)
            .map(|s| s.policy.actions.clone())
            .unwrap_or_default())
    }

    async fn get_policies_by_label(
        &self,
        label: &str,
        organization: &str,
    ) -> StoreResult<BTreeMap<String, String>> {
        let inner = self.inner.read().await;
        Ok(id_name_map(inner.in_org(organization).filter(|p| p.has_label(label))))
    }

    async fn get_policies_without_labels(
        &self,
        organization: &str,
    ) -> StoreResult<BTreeMap<String, String>> {
        let inner = self.inner.read().await;
        Ok(id_name_map(inner.in_org(organization).filter(|p| p.is_organization_wide())))
    }

    async fn get_policies_by_label_and_state(
        &self,
        label: &str,
        state: GovernableState,
        organization: &str,
    ) -> StoreResult<Vec<String>> {
        let inner = self.inner.read().await;
        Ok(sorted_ids(
            inner
                .in_org(organization)
                .filter(|p| p.has_label(label) && p.applies_to_state(state)),
        ))
    }

    async fn get_policies_without_labels_by_state(
        &self,
        state: GovernableState,
        organization: &str,
    ) -> StoreResult<Vec<String>> {
        let inner = self.inner.read().await;
        Ok(sorted_ids(
            inner
                .in_org(organization)
                .filter(|p| p.is_organization_wide() && p.applies_to_state(state)),
        ))
    }
}
