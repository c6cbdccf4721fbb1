//! PostgreSQL policy store
//!
//! Policies live in `governance_policy`; labels, actions and ruleset
//! associations are child tables cascading on policy deletion. Every
//! mutation runs in a single transaction.

use crate::db::queries::*;
use crate::governance::{
    GovernableState, GovernanceAction, GovernancePolicy, Ruleset, StoreError,
};
use crate::store::{PolicyStore, StoreResult};
use async_trait::async_trait;
use deadpool_postgres::Pool;
use std::collections::BTreeMap;
use std::str::FromStr;
use tokio_postgres::error::SqlState;
use tokio_postgres::{GenericClient, Row};
use tracing::{debug, info};

impl From<tokio_postgres::Error> for StoreError {
    fn from(e: tokio_postgres::Error) -> Self {
        match e.as_db_error() {
            Some(db) => classify_db_error(
                db.code(),
                db.constraint(),
                db.detail().unwrap_or_else(|| db.message()),
            ),
            None => StoreError::Backend(e.to_string()),
        }
    }
}

/// Only the constraints the schema names map to client errors
fn classify_db_error(code: &SqlState, constraint: Option<&str>, message: &str) -> StoreError {
    if *code == SqlState::UNIQUE_VIOLATION && constraint == Some(POLICY_NAME_CONSTRAINT) {
        StoreError::Conflict(message.to_string())
    } else if *code == SqlState::FOREIGN_KEY_VIOLATION && constraint == Some(RULESET_FK_CONSTRAINT) {
        StoreError::UnknownRuleset(message.to_string())
    } else {
        StoreError::Backend(format!("{} ({})", message, code.code()))
    }
}

fn parse_column<T>(row: &Row, column: &str) -> StoreResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = row.get(column);
    raw.parse::<T>()
        .map_err(|e| StoreError::Backend(format!("Corrupt {} column: {}", column, e)))
}

fn action_from_row(row: &Row) -> StoreResult<GovernanceAction> {
    Ok(GovernanceAction {
        action_type: parse_column(row, "action_type")?,
        governable_state: parse_column(row, "governable_state")?,
        rule_severity: parse_column(row, "rule_severity")?,
    })
}

/// Policy store backed by PostgreSQL
pub struct PgPolicyStore {
    pool: Pool,
}

impl PgPolicyStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create the governance tables if they don't exist
    pub async fn init_schema(&self) -> StoreResult<()> {
        let client = self.pool.get().await?;
        for ddl in [
            CREATE_POLICY_TABLE,
            CREATE_LABEL_TABLE,
            CREATE_ACTION_TABLE,
            CREATE_RULESET_TABLE,
            CREATE_POLICY_RULESET_TABLE,
        ] {
            client.execute(ddl, &[]).await?;
        }
        for index in CREATE_INDEXES {
            client.execute(index, &[]).await?;
        }
        info!("Governance tables initialized");
        Ok(())
    }

    async fn insert_children<C: GenericClient + Sync>(
        client: &C,
        policy_id: &str,
        policy: &GovernancePolicy,
    ) -> StoreResult<()> {
        for label in &policy.labels {
            client.execute(INSERT_LABEL, &[&policy_id, label]).await?;
        }
        for (position, action) in policy.actions.iter().enumerate() {
            let position = position as i32;
            client
                .execute(
                    INSERT_ACTION,
                    &[
                        &policy_id,
                        &position,
                        &action.action_type.as_str(),
                        &action.governable_state.as_str(),
                        &action.rule_severity.as_str(),
                    ],
                )
                .await?;
        }
        for (position, ruleset_id) in policy.ruleset_ids.iter().enumerate() {
            let position = position as i32;
            client
                .execute(INSERT_POLICY_RULESET, &[&policy_id, ruleset_id, &position])
                .await
                .map_err(|e| match StoreError::from(e) {
                    StoreError::UnknownRuleset(_) => StoreError::UnknownRuleset(ruleset_id.clone()),
                    other => other,
                })?;
        }
        Ok(())
    }

    /// Load labels, actions and ruleset ids for a policy row
    async fn hydrate<C: GenericClient + Sync>(client: &C, row: &Row) -> StoreResult<GovernancePolicy> {
        let id: String = row.get("id");

        let labels = client
            .query(GET_LABELS, &[&id])
            .await?
            .iter()
            .map(|r| r.get::<_, String>("label"))
            .collect();

        let actions = client
            .query(GET_ACTIONS, &[&id])
            .await?
            .iter()
            .map(action_from_row)
            .collect::<StoreResult<Vec<_>>>()?;

        let ruleset_ids = client
            .query(GET_RULESET_IDS, &[&id])
            .await?
            .iter()
            .map(|r| r.get::<_, String>("ruleset_id"))
            .collect();

        Ok(GovernancePolicy {
            id,
            name: row.get("name"),
            description: row.get("description"),
            labels,
            actions,
            ruleset_ids,
        })
    }
}

#[async_trait]
impl PolicyStore for PgPolicyStore {
    async fn create_policy(
        &self,
        organization: &str,
        policy: &GovernancePolicy,
    ) -> StoreResult<GovernancePolicy> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        tx.execute(
            INSERT_POLICY,
            &[&policy.id, &organization, &policy.name, &policy.description],
        )
        .await?;
        Self::insert_children(&*tx, &policy.id, policy).await?;
        tx.commit().await?;

        debug!("Stored policy {} for organization {}", policy.id, organization);
        Ok(policy.clone())
    }

    async fn get_policy_by_id(&self, policy_id: &str) -> StoreResult<Option<GovernancePolicy>> {
        let client = self.pool.get().await?;
        match client.query_opt(GET_POLICY_BY_ID, &[&policy_id]).await? {
            Some(row) => Ok(Some(Self::hydrate(&**client, &row).await?)),
            None => Ok(None),
        }
    }

    async fn update_policy(
        &self,
        policy_id: &str,
        organization: &str,
        policy: &GovernancePolicy,
    ) -> StoreResult<Option<GovernancePolicy>> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let updated = tx
            .execute(
                UPDATE_POLICY,
                &[&policy.name, &policy.description, &policy_id, &organization],
            )
            .await?;
        if updated == 0 {
            // Dropping the transaction rolls it back
            return Ok(None);
        }

        tx.execute(DELETE_LABELS, &[&policy_id]).await?;
        tx.execute(DELETE_ACTIONS, &[&policy_id]).await?;
        tx.execute(DELETE_POLICY_RULESETS, &[&policy_id]).await?;
        Self::insert_children(&*tx, policy_id, policy).await?;
        tx.commit().await?;

        let mut replacement = policy.clone();
        replacement.id = policy_id.to_string();
        Ok(Some(replacement))
    }

    async fn delete_policy(&self, policy_id: &str, organization: &str) -> StoreResult<bool> {
        let client = self.pool.get().await?;
        let removed = client.execute(DELETE_POLICY, &[&policy_id, &organization]).await?;
        Ok(removed > 0)
    }

    async fn list_policies(&self, organization: &str) -> StoreResult<Vec<GovernancePolicy>> {
        let client = self.pool.get().await?;
        let rows = client.query(LIST_POLICIES, &[&organization]).await?;
        let mut policies = Vec::with_capacity(rows.len());
        for row in &rows {
            policies.push(Self::hydrate(&**client, row).await?);
        }
        Ok(policies)
    }

    async fn upsert_ruleset(&self, ruleset: &Ruleset) -> StoreResult<()> {
        let client = self.pool.get().await?;
        client
            .execute(UPSERT_RULESET, &[&ruleset.id, &ruleset.name, &ruleset.description])
            .await?;
        debug!("Upserted ruleset {}", ruleset.id);
        Ok(())
    }

    async fn get_rulesets_by_policy_id(&self, policy_id: &str) -> StoreResult<Vec<Ruleset>> {
        let client = self.pool.get().await?;
        let rows = client.query(GET_RULESETS, &[&policy_id]).await?;
        Ok(rows
            .iter()
            .map(|r| Ruleset {
                id: r.get("id"),
                name: r.get("name"),
                description: r.get("description"),
            })
            .collect())
    }

    async fn get_actions_by_policy_id(&self, policy_id: &str) -> StoreResult<Vec<GovernanceAction>> {
        let client = self.pool.get().await?;
        client
            .query(GET_ACTIONS, &[&policy_id])
            .await?
            .iter()
            .map(action_from_row)
            .collect()
    }

    async fn get_policies_by_label(
        &self,
        label: &str,
        organization: &str,
    ) -> StoreResult<BTreeMap<String, String>> {
        let client = self.pool.get().await?;
        let rows = client.query(GET_POLICIES_BY_LABEL, &[&label, &organization]).await?;
        Ok(rows.iter().map(|r| (r.get("id"), r.get("name"))).collect())
    }

    async fn get_policies_without_labels(
        &self,
        organization: &str,
    ) -> StoreResult<BTreeMap<String, String>> {
        let client = self.pool.get().await?;
        let rows = client.query(GET_POLICIES_WITHOUT_LABELS, &[&organization]).await?;
        Ok(rows.iter().map(|r| (r.get("id"), r.get("name"))).collect())
    }

    async fn get_policies_by_label_and_state(
        &self,
        label: &str,
        state: GovernableState,
        organization: &str,
    ) -> StoreResult<Vec<String>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                GET_POLICIES_BY_LABEL_AND_STATE,
                &[&label, &state.as_str(), &organization],
            )
            .await?;
        Ok(rows.iter().map(|r| r.get("id")).collect())
    }

    async fn get_policies_without_labels_by_state(
        &self,
        state: GovernableState,
        organization: &str,
    ) -> StoreResult<Vec<String>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(GET_POLICIES_WITHOUT_LABELS_BY_STATE, &[&state.as_str(), &organization])
            .await?;
        Ok(rows.iter().map(|r| r.get("id")).collect())
    }
}
