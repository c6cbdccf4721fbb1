//! Policy store
//!
//! Durable CRUD and indexed queries over governance policies. The policy
//! manager only ever talks to the [`PolicyStore`] trait, so backends can be
//! swapped (in-memory for tests and local runs, PostgreSQL for production).

mod memory;
mod postgres;

pub use memory::InMemoryPolicyStore;
pub use postgres::PgPolicyStore;

use crate::governance::{GovernableState, GovernanceAction, GovernancePolicy, Ruleset, StoreError};
use async_trait::async_trait;
use std::collections::BTreeMap;

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence boundary for governance policies.
///
/// Every mutating call is a single-policy unit of work. Queries keyed by
/// organization never return policies of another organization.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    // ── Policies ──

    async fn create_policy(&self, organization: &str, policy: &GovernancePolicy)
        -> StoreResult<GovernancePolicy>;
    async fn get_policy_by_id(&self, policy_id: &str) -> StoreResult<Option<GovernancePolicy>>;
    /// Returns `None` when no policy with this id exists in `organization`.
    async fn update_policy(
        &self,
        policy_id: &str,
        organization: &str,
        policy: &GovernancePolicy,
    ) -> StoreResult<Option<GovernancePolicy>>;
    /// Returns whether a policy was removed.
    async fn delete_policy(&self, policy_id: &str, organization: &str) -> StoreResult<bool>;
    async fn list_policies(&self, organization: &str) -> StoreResult<Vec<GovernancePolicy>>;

    // ── Ruleset catalog ──

    /// Insert a ruleset or replace the catalog entry with the same id.
    async fn upsert_ruleset(&self, ruleset: &Ruleset) -> StoreResult<()>;

    // ── Associations ──

    async fn get_rulesets_by_policy_id(&self, policy_id: &str) -> StoreResult<Vec<Ruleset>>;
    async fn get_actions_by_policy_id(&self, policy_id: &str) -> StoreResult<Vec<GovernanceAction>>;

    // ── Label and state indexes ──

    async fn get_policies_by_label(&self, label: &str, organization: &str)
        -> StoreResult<BTreeMap<String, String>>;
    async fn get_policies_without_labels(&self, organization: &str)
        -> StoreResult<BTreeMap<String, String>>;
    async fn get_policies_by_label_and_state(
        &self,
        label: &str,
        state: GovernableState,
        organization: &str,
    ) -> StoreResult<Vec<String>>;
    async fn get_policies_without_labels_by_state(
        &self,
        state: GovernableState,
        organization: &str,
    ) -> StoreResult<Vec<String>>;
}
