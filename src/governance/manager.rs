//! Policy manager
//!
//! Orchestrates policy CRUD and governance queries. Mutations are checked
//! against the policy invariants before anything reaches the store; reads go
//! straight to the store.

use crate::governance::error::{GovernanceError, GovernanceResult};
use crate::governance::id::{IdGenerator, UuidGenerator};
use crate::governance::invariants::check_restricted_blocking_actions;
use crate::governance::models::{
    GovernableState, GovernancePolicy, GovernancePolicyList, Ruleset,
};
use crate::store::PolicyStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Entry point for all governance policy operations
#[derive(Clone)]
pub struct PolicyManager {
    store: Arc<dyn PolicyStore>,
    ids: Arc<dyn IdGenerator>,
}

impl PolicyManager {
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self::with_id_generator(store, Arc::new(UuidGenerator))
    }

    pub fn with_id_generator(store: Arc<dyn PolicyStore>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { store, ids }
    }

    /// Create a policy under a freshly generated id
    pub async fn create(
        &self,
        organization: &str,
        mut policy: GovernancePolicy,
    ) -> GovernanceResult<GovernancePolicy> {
        policy.id = self.ids.generate();
        policy.dedup_ruleset_ids();
        if let Err(e) = check_restricted_blocking_actions(&policy.actions) {
            warn!("Rejected policy '{}' for {}: {}", policy.name, organization, e);
            return Err(e);
        }

        let created = self.store.create_policy(organization, &policy).await?;
        info!("Created governance policy {} ({}) for {}", created.id, created.name, organization);
        Ok(created)
    }

    /// Replace an existing policy, keeping its id
    pub async fn update(
        &self,
        policy_id: &str,
        organization: &str,
        mut policy: GovernancePolicy,
    ) -> GovernanceResult<GovernancePolicy> {
        policy.dedup_ruleset_ids();
        if let Err(e) = check_restricted_blocking_actions(&policy.actions) {
            warn!("Rejected update of policy {} for {}: {}", policy_id, organization, e);
            return Err(e);
        }

        let updated = self
            .store
            .update_policy(policy_id, organization, &policy)
            .await?
            .ok_or_else(|| GovernanceError::PolicyNotFound(policy_id.to_string()))?;
        info!("Updated governance policy {} for {}", policy_id, organization);
        Ok(updated)
    }

    pub async fn get_by_id(&self, policy_id: &str) -> GovernanceResult<GovernancePolicy> {
        self.store
            .get_policy_by_id(policy_id)
            .await?
            .ok_or_else(|| GovernanceError::PolicyNotFound(policy_id.to_string()))
    }

    /// Delete a policy. Unknown ids are not an error.
    pub async fn delete(&self, policy_id: &str, organization: &str) -> GovernanceResult<()> {
        if self.store.delete_policy(policy_id, organization).await? {
            info!("Deleted governance policy {} for {}", policy_id, organization);
        } else {
            debug!("Delete of policy {} for {} matched nothing", policy_id, organization);
        }
        Ok(())
    }

    pub async fn list(&self, organization: &str) -> GovernanceResult<GovernancePolicyList> {
        Ok(self.store.list_policies(organization).await?.into())
    }

    /// Make rulesets available for policies to reference, replacing any
    /// catalog entry with the same id
    pub async fn register_rulesets(&self, rulesets: &[Ruleset]) -> GovernanceResult<usize> {
        for ruleset in rulesets {
            self.store.upsert_ruleset(ruleset).await?;
        }
        info!("Registered {} governance rulesets", rulesets.len());
        Ok(rulesets.len())
    }

    pub async fn rulesets_of(&self, policy_id: &str) -> GovernanceResult<Vec<Ruleset>> {
        Ok(self.store.get_rulesets_by_policy_id(policy_id).await?)
    }

    /// Policy id -> name for every policy tagged with `label`
    pub async fn policies_by_label(
        &self,
        label: &str,
        organization: &str,
    ) -> GovernanceResult<BTreeMap<String, String>> {
        Ok(self.store.get_policies_by_label(label, organization).await?)
    }

    /// Policy id -> name for every policy that carries no label
    pub async fn org_wide_policies(
        &self,
        organization: &str,
    ) -> GovernanceResult<BTreeMap<String, String>> {
        Ok(self.store.get_policies_without_labels(organization).await?)
    }

    pub async fn policies_by_label_and_state(
        &self,
        label: &str,
        state: GovernableState,
        organization: &str,
    ) -> GovernanceResult<Vec<String>> {
        Ok(self
            .store
            .get_policies_by_label_and_state(label, state, organization)
            .await?)
    }

    pub async fn org_wide_policies_by_state(
        &self,
        state: GovernableState,
        organization: &str,
    ) -> GovernanceResult<Vec<String>> {
        Ok(self
            .store
            .get_policies_without_labels_by_state(state, organization)
            .await?)
    }

    /// Whether the policy blocks the transition into `state`
    pub async fn is_blocking_action_present(
        &self,
        policy_id: &str,
        state: GovernableState,
    ) -> GovernanceResult<bool> {
        let actions = self.store.get_actions_by_policy_id(policy_id).await?;
        Ok(actions.iter().any(|a| a.is_blocking_for(state)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governance::models::{GovernanceAction, Ruleset};
    use crate::governance::StoreError;
    use crate::store::{InMemoryPolicyStore, StoreResult};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts mutating calls before delegating to the in-memory store
    struct CountingStore {
        inner: InMemoryPolicyStore,
        writes: AtomicUsize,
    }

    impl CountingStore {
        fn new(inner: InMemoryPolicyStore) -> Self {
            Self { inner, writes: AtomicUsize::new(0) }
        }

        fn writes(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PolicyStore for CountingStore {
        async fn create_policy(&self, org: &str, p: &GovernancePolicy) -> StoreResult<GovernancePolicy> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.create_policy(org, p).await
        }
        async fn get_policy_by_id(&self, id: &str) -> StoreResult<Option<GovernancePolicy>> {
            self.inner.get_policy_by_id(id).await
        }
        async fn update_policy(
            &self,
            id: &str,
            org: &str,
            p: &GovernancePolicy,
        ) -> StoreResult<Option<GovernancePolicy>> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.update_policy(id, org, p).await
        }
        async fn delete_policy(&self, id: &str, org: &str) -> StoreResult<bool> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.delete_policy(id, org).await
        }
        async fn list_policies(&self, org: &str) -> StoreResult<Vec<GovernancePolicy>> {
            self.inner.list_policies(org).await
        }
        async fn upsert_ruleset(&self, r: &Ruleset) -> StoreResult<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.upsert_ruleset(r).await
        }
        async fn get_rulesets_by_policy_id(&self, id: &str) -> StoreResult<Vec<Ruleset>> {
            self.inner.get_rulesets_by_policy_id(id).await
        }
        async fn get_actions_by_policy_id(&self, id: &str) -> StoreResult<Vec<GovernanceAction>> {
            self.inner.get_actions_by_policy_id(id).await
        }
        async fn get_policies_by_label(&self, l: &str, org: &str) -> StoreResult<BTreeMap<String, String>> {
            self.inner.get_policies_by_label(l, org).await
        }
        async fn get_policies_without_labels(&self, org: &str) -> StoreResult<BTreeMap<String, String>> {
            self.inner.get_policies_without_labels(org).await
        }
        async fn get_policies_by_label_and_state(
            &self,
            l: &str,
            s: GovernableState,
            org: &str,
        ) -> StoreResult<Vec<String>> {
            self.inner.get_policies_by_label_and_state(l, s, org).await
        }
        async fn get_policies_without_labels_by_state(
            &self,
            s: GovernableState,
            org: &str,
        ) -> StoreResult<Vec<String>> {
            self.inner.get_policies_without_labels_by_state(s, org).await
        }
    }

    /// Store whose backend is always down
    struct FailingStore;

    #[async_trait]
    impl PolicyStore for FailingStore {
        async fn create_policy(&self, _: &str, _: &GovernancePolicy) -> StoreResult<GovernancePolicy> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn get_policy_by_id(&self, _: &str) -> StoreResult<Option<GovernancePolicy>> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn update_policy(&self, _: &str, _: &str, _: &GovernancePolicy) -> StoreResult<Option<GovernancePolicy>> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn delete_policy(&self, _: &str, _: &str) -> StoreResult<bool> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn list_policies(&self, _: &str) -> StoreResult<Vec<GovernancePolicy>> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn upsert_ruleset(&self, _: &Ruleset) -> StoreResult<()> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn get_rulesets_by_policy_id(&self, _: &str) -> StoreResult<Vec<Ruleset>> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn get_actions_by_policy_id(&self, _: &str) -> StoreResult<Vec<GovernanceAction>> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn get_policies_by_label(&self, _: &str, _: &str) -> StoreResult<BTreeMap<String, String>> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn get_policies_without_labels(&self, _: &str) -> StoreResult<BTreeMap<String, String>> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn get_policies_by_label_and_state(&self, _: &str, _: GovernableState, _: &str) -> StoreResult<Vec<String>> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn get_policies_without_labels_by_state(&self, _: GovernableState, _: &str) -> StoreResult<Vec<String>> {
            Err(StoreError::Backend("connection refused".into()))
        }
    }

    fn setup() -> (PolicyManager, Arc<CountingStore>) {
        let store = Arc::new(CountingStore::new(InMemoryPolicyStore::with_rulesets([
            Ruleset::new("rs-owasp", "OWASP Top 10"),
            Ruleset::new("rs-style", "API Style Guide"),
        ])));
        (PolicyManager::new(store.clone()), store)
    }

    fn publish_blocker() -> GovernancePolicy {
        GovernancePolicy::new("publish-blocker")
            .with_action(GovernanceAction::block(GovernableState::ApiPublish))
    }

    #[tokio::test]
    async fn test_create_with_forbidden_block_persists_nothing() {
        let (manager, store) = setup();
        for state in [GovernableState::ApiCreate, GovernableState::ApiUpdate] {
            let policy = GovernancePolicy::new("bad")
                .with_action(GovernanceAction::notify(GovernableState::ApiDeploy))
                .with_action(GovernanceAction::block(state));
            let result = manager.create("orgA", policy).await;
            assert!(matches!(result, Err(GovernanceError::InvalidPolicyAction(_))));
        }
        assert_eq!(store.writes(), 0);
        assert_eq!(store.inner.policy_count().await, 0);
    }

    #[tokio::test]
    async fn test_update_with_forbidden_block_persists_nothing() {
        let (manager, store) = setup();
        let created = manager.create("orgA", publish_blocker()).await.unwrap();

        let edited = publish_blocker().with_action(GovernanceAction::block(GovernableState::ApiUpdate));
        let result = manager.update(&created.id, "orgA", edited).await;
        assert!(matches!(result, Err(GovernanceError::InvalidPolicyAction(_))));
        assert_eq!(store.writes(), 1);
        assert_eq!(manager.get_by_id(&created.id).await.unwrap(), created);
    }

    #[tokio::test]
    async fn test_created_ids_are_fresh_and_client_ids_ignored() {
        let (manager, _) = setup();
        let mut ids = HashSet::new();
        for i in 0..20 {
            let mut policy = GovernancePolicy::new(format!("policy-{}", i));
            policy.id = "client-chosen".to_string();
            let created = manager.create("orgA", policy).await.unwrap();
            assert!(!created.id.is_empty());
            assert_ne!(created.id, "client-chosen");
            assert!(ids.insert(created.id));
        }
    }

    #[tokio::test]
    async fn test_create_then_get_round_trips() {
        let (manager, _) = setup();
        let input = GovernancePolicy {
            id: String::new(),
            name: "design-review".to_string(),
            description: Some("Style and security checks".to_string()),
            labels: ["finance".to_string(), "payments".to_string()].into_iter().collect(),
            actions: vec![
                GovernanceAction::notify(GovernableState::ApiCreate),
                GovernanceAction::block(GovernableState::ApiDeploy),
            ],
            ruleset_ids: vec!["rs-style".to_string(), "rs-owasp".to_string()],
        };

        let created = manager.create("orgA", input.clone()).await.unwrap();
        let fetched = manager.get_by_id(&created.id).await.unwrap();

        assert_eq!(fetched.id, created.id);
        assert_eq!(GovernancePolicy { id: String::new(), ..fetched }, input);
        assert_eq!(
            manager.rulesets_of(&created.id).await.unwrap(),
            vec![
                Ruleset::new("rs-style", "API Style Guide"),
                Ruleset::new("rs-owasp", "OWASP Top 10"),
            ]
        );
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let (manager, _) = setup();
        assert!(matches!(
            manager.get_by_id("missing").await,
            Err(GovernanceError::PolicyNotFound(id)) if id == "missing"
        ));
    }

    #[tokio::test]
    async fn test_update_preserves_id() {
        let (manager, _) = setup();
        let created = manager.create("orgA", publish_blocker()).await.unwrap();

        let mut replacement = GovernancePolicy::new("publish-notifier")
            .with_action(GovernanceAction::notify(GovernableState::ApiPublish));
        replacement.id = "something-else".to_string();
        let updated = manager.update(&created.id, "orgA", replacement).await.unwrap();

        assert_eq!(updated.id, created.id);
        let fetched = manager.get_by_id(&created.id).await.unwrap();
        assert_eq!(fetched.name, "publish-notifier");
        assert!(!manager
            .is_blocking_action_present(&created.id, GovernableState::ApiPublish)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_update_unknown_or_foreign_is_not_found() {
        let (manager, _) = setup();
        let created = manager.create("orgA", publish_blocker()).await.unwrap();

        assert!(matches!(
            manager.update("missing", "orgA", publish_blocker()).await,
            Err(GovernanceError::PolicyNotFound(_))
        ));
        assert!(matches!(
            manager.update(&created.id, "orgB", publish_blocker()).await,
            Err(GovernanceError::PolicyNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_then_get_is_not_found() {
        let (manager, _) = setup();
        let created = manager.create("orgA", publish_blocker()).await.unwrap();

        manager.delete(&created.id, "orgA").await.unwrap();
        assert!(matches!(
            manager.get_by_id(&created.id).await,
            Err(GovernanceError::PolicyNotFound(_))
        ));
        // second delete is a no-op
        manager.delete(&created.id, "orgA").await.unwrap();
        assert!(manager.rulesets_of(&created.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blocking_action_scenario() {
        let (manager, _) = setup();
        let created = manager.create("orgA", publish_blocker()).await.unwrap();

        assert!(manager
            .is_blocking_action_present(&created.id, GovernableState::ApiPublish)
            .await
            .unwrap());
        assert!(!manager
            .is_blocking_action_present(&created.id, GovernableState::ApiCreate)
            .await
            .unwrap());
        assert!(!manager
            .is_blocking_action_present(&created.id, GovernableState::ApiDeploy)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_blocking_requires_block_type() {
        let (manager, _) = setup();
        let empty = manager.create("orgA", GovernancePolicy::new("empty")).await.unwrap();
        let notifier = manager
            .create(
                "orgA",
                GovernancePolicy::new("notifier")
                    .with_action(GovernanceAction::notify(GovernableState::ApiPublish)),
            )
            .await
            .unwrap();

        for state in GovernableState::ALL {
            assert!(!manager.is_blocking_action_present(&empty.id, state).await.unwrap());
            assert!(!manager.is_blocking_action_present(&notifier.id, state).await.unwrap());
        }
        assert!(!manager
            .is_blocking_action_present("missing", GovernableState::ApiPublish)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_label_and_org_wide_partitioning() {
        let (manager, _) = setup();
        let labeled = manager
            .create(
                "orgA",
                GovernancePolicy::new("finance-only")
                    .with_label("finance")
                    .with_action(GovernanceAction::block(GovernableState::ApiPublish)),
            )
            .await
            .unwrap();
        let org_wide = manager
            .create(
                "orgA",
                GovernancePolicy::new("everyone")
                    .with_action(GovernanceAction::notify(GovernableState::ApiPublish)),
            )
            .await
            .unwrap();

        assert_eq!(
            manager.org_wide_policies("orgA").await.unwrap(),
            BTreeMap::from([(org_wide.id.clone(), "everyone".to_string())])
        );
        assert_eq!(
            manager.policies_by_label("finance", "orgA").await.unwrap(),
            BTreeMap::from([(labeled.id.clone(), "finance-only".to_string())])
        );
        assert_eq!(
            manager
                .policies_by_label_and_state("finance", GovernableState::ApiPublish, "orgA")
                .await
                .unwrap(),
            vec![labeled.id.clone()]
        );
        assert_eq!(
            manager
                .org_wide_policies_by_state(GovernableState::ApiPublish, "orgA")
                .await
                .unwrap(),
            vec![org_wide.id.clone()]
        );
        assert!(manager
            .org_wide_policies_by_state(GovernableState::ApiDeploy, "orgA")
            .await
            .unwrap()
            .is_empty());
        assert!(manager.policies_by_label("finance", "orgB").await.unwrap().is_empty());
        assert!(manager.org_wide_policies("orgB").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_is_org_scoped() {
        let (manager, _) = setup();
        manager.create("orgA", GovernancePolicy::new("b")).await.unwrap();
        manager.create("orgA", GovernancePolicy::new("a")).await.unwrap();
        manager.create("orgB", GovernancePolicy::new("c")).await.unwrap();

        let list = manager.list("orgA").await.unwrap();
        assert_eq!(list.count, 2);
        let names: Vec<&str> = list.list.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(manager.list("orgC").await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn test_duplicate_name_is_already_exists() {
        let (manager, _) = setup();
        manager.create("orgA", publish_blocker()).await.unwrap();
        assert!(matches!(
            manager.create("orgA", publish_blocker()).await,
            Err(GovernanceError::PolicyAlreadyExists(_))
        ));
        assert!(manager.create("orgB", publish_blocker()).await.is_ok());
    }

    #[tokio::test]
    async fn test_store_failures_propagate() {
        let manager = PolicyManager::new(Arc::new(FailingStore));
        assert!(matches!(
            manager.get_by_id("x").await,
            Err(GovernanceError::StoreFailure(_))
        ));
        assert!(matches!(
            manager.is_blocking_action_present("x", GovernableState::ApiPublish).await,
            Err(GovernanceError::StoreFailure(_))
        ));
        // invalid input is still reported before the store is reached
        let bad = GovernancePolicy::new("bad").with_action(GovernanceAction::block(GovernableState::ApiCreate));
        assert!(matches!(
            manager.create("orgA", bad).await,
            Err(GovernanceError::InvalidPolicyAction(_))
        ));
    }

    #[tokio::test]
    async fn test_repeated_ruleset_ids_are_stored_once() {
        let (manager, _) = setup();
        let policy = publish_blocker()
            .with_ruleset("rs-owasp")
            .with_ruleset("rs-style")
            .with_ruleset("rs-owasp");
        let created = manager.create("orgA", policy).await.unwrap();
        assert_eq!(created.ruleset_ids, vec!["rs-owasp".to_string(), "rs-style".to_string()]);

        let replacement = publish_blocker().with_ruleset("rs-style").with_ruleset("rs-style");
        let updated = manager.update(&created.id, "orgA", replacement).await.unwrap();
        assert_eq!(updated.ruleset_ids, vec!["rs-style".to_string()]);
        assert_eq!(
            manager.rulesets_of(&created.id).await.unwrap(),
            vec![Ruleset::new("rs-style", "API Style Guide")]
        );
    }

    #[tokio::test]
    async fn test_unknown_ruleset_is_reported_as_such() {
        let (manager, store) = setup();
        let policy = publish_blocker().with_ruleset("rs-missing");
        assert!(matches!(
            manager.create("orgA", policy).await,
            Err(GovernanceError::UnknownRuleset(id)) if id == "rs-missing"
        ));
        assert_eq!(store.inner.policy_count().await, 0);
    }

    #[tokio::test]
    async fn test_registered_rulesets_become_referencable() {
        let (manager, store) = setup();
        let policy = publish_blocker().with_ruleset("rs-pii");
        assert!(manager.create("orgA", policy.clone()).await.is_err());

        let registered = manager
            .register_rulesets(&[Ruleset::new("rs-pii", "PII Exposure")])
            .await
            .unwrap();
        assert_eq!(registered, 1);
        assert_eq!(store.writes(), 2);

        let created = manager.create("orgA", policy).await.unwrap();
        assert_eq!(
            manager.rulesets_of(&created.id).await.unwrap(),
            vec![Ruleset::new("rs-pii", "PII Exposure")]
        );
    }

    #[tokio::test]
    async fn test_injected_id_generator() {
        struct Sequential(AtomicUsize);
        impl IdGenerator for Sequential {
            fn generate(&self) -> String {
                format!("policy-{}", self.0.fetch_add(1, Ordering::SeqCst))
            }
        }

        let manager = PolicyManager::with_id_generator(
            Arc::new(InMemoryPolicyStore::new()),
            Arc::new(Sequential(AtomicUsize::new(1))),
        );
        let first = manager.create("orgA", GovernancePolicy::new("one")).await.unwrap();
        let second = manager.create("orgA", GovernancePolicy::new("two")).await.unwrap();
        assert_eq!(first.id, "policy-1");
        assert_eq!(second.id, "policy-2");
    }
}
