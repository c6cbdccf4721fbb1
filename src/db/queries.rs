//! SQL query constants
//!
//! Contains all SQL used by the PostgreSQL policy store.

// ==================== Schema ====================

/// Per-organization policy name uniqueness
pub const POLICY_NAME_CONSTRAINT: &str = "governance_policy_organization_name_key";

/// Policy to ruleset reference
pub const RULESET_FK_CONSTRAINT: &str = "governance_policy_ruleset_ruleset_id_fkey";

pub const CREATE_POLICY_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS governance_policy (
        id VARCHAR(64) PRIMARY KEY,
        organization VARCHAR(255) NOT NULL,
        name VARCHAR(256) NOT NULL,
        description TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
        CONSTRAINT governance_policy_organization_name_key UNIQUE (organization, name)
    )
"#;

pub const CREATE_LABEL_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS governance_policy_label (
        policy_id VARCHAR(64) NOT NULL REFERENCES governance_policy(id) ON DELETE CASCADE,
        label VARCHAR(255) NOT NULL,
        PRIMARY KEY (policy_id, label)
    )
"#;

pub const CREATE_ACTION_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS governance_policy_action (
        policy_id VARCHAR(64) NOT NULL REFERENCES governance_policy(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        action_type VARCHAR(20) NOT NULL,
        governable_state VARCHAR(30) NOT NULL,
        rule_severity VARCHAR(10) NOT NULL,
        PRIMARY KEY (policy_id, position)
    )
"#;

pub const CREATE_RULESET_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS governance_ruleset (
        id VARCHAR(64) PRIMARY KEY,
        name VARCHAR(256) NOT NULL,
        description TEXT
    )
"#;

pub const CREATE_POLICY_RULESET_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS governance_policy_ruleset (
        policy_id VARCHAR(64) NOT NULL REFERENCES governance_policy(id) ON DELETE CASCADE,
        ruleset_id VARCHAR(64) NOT NULL,
        position INTEGER NOT NULL,
        PRIMARY KEY (policy_id, ruleset_id),
        CONSTRAINT governance_policy_ruleset_ruleset_id_fkey
            FOREIGN KEY (ruleset_id) REFERENCES governance_ruleset(id)
    )
"#;

pub const CREATE_INDEXES: [&str; 3] = [
    "CREATE INDEX IF NOT EXISTS idx_governance_policy_org ON governance_policy(organization)",
    "CREATE INDEX IF NOT EXISTS idx_governance_policy_label_label ON governance_policy_label(label)",
    "CREATE INDEX IF NOT EXISTS idx_governance_policy_action_state ON governance_policy_action(governable_state)",
];

// ==================== Policies ====================

pub const INSERT_POLICY: &str = r#"
    INSERT INTO governance_policy (id, organization, name, description)
    VALUES ($1, $2, $3, $4)
"#;

pub const GET_POLICY_BY_ID: &str = r#"
    SELECT id, name, description
    FROM governance_policy
    WHERE id = $1
"#;

pub const UPDATE_POLICY: &str = r#"
    UPDATE governance_policy
    SET name = $1, description = $2, updated_at = CURRENT_TIMESTAMP
    WHERE id = $3 AND organization = $4
"#;

pub const DELETE_POLICY: &str = r#"
    DELETE FROM governance_policy
    WHERE id = $1 AND organization = $2
"#;

pub const LIST_POLICIES: &str = r#"
    SELECT id, name, description
    FROM governance_policy
    WHERE organization = $1
    ORDER BY name, id
"#;

// ==================== Rulesets ====================

pub const UPSERT_RULESET: &str = r#"
    INSERT INTO governance_ruleset (id, name, description)
    VALUES ($1, $2, $3)
    ON CONFLICT (id) DO UPDATE
    SET name = EXCLUDED.name, description = EXCLUDED.description
"#;

// ==================== Child rows ====================

pub const INSERT_LABEL: &str =
    "INSERT INTO governance_policy_label (policy_id, label) VALUES ($1, $2)";

pub const INSERT_ACTION: &str = r#"
    INSERT INTO governance_policy_action (policy_id, position, action_type, governable_state, rule_severity)
    VALUES ($1, $2, $3, $4, $5)
"#;

pub const INSERT_POLICY_RULESET: &str =
    "INSERT INTO governance_policy_ruleset (policy_id, ruleset_id, position) VALUES ($1, $2, $3)";

pub const DELETE_LABELS: &str = "DELETE FROM governance_policy_label WHERE policy_id = $1";
pub const DELETE_ACTIONS: &str = "DELETE FROM governance_policy_action WHERE policy_id = $1";
pub const DELETE_POLICY_RULESETS: &str = "DELETE FROM governance_policy_ruleset WHERE policy_id = $1";

pub const GET_LABELS: &str =
    "SELECT label FROM governance_policy_label WHERE policy_id = $1 ORDER BY label";

pub const GET_ACTIONS: &str = r#"
    SELECT action_type, governable_state, rule_severity
    FROM governance_policy_action
    WHERE policy_id = $1
    ORDER BY position
"#;

pub const GET_RULESET_IDS: &str =
    "SELECT ruleset_id FROM governance_policy_ruleset WHERE policy_id = $1 ORDER BY position";

pub const GET_RULESETS: &str = r#"
    SELECT r.id, r.name, r.description
    FROM governance_policy_ruleset pr
    JOIN governance_ruleset r ON r.id = pr.ruleset_id
    WHERE pr.policy_id = $1
    ORDER BY pr.position
"#;

// ==================== Label and state indexes ====================

pub const GET_POLICIES_BY_LABEL: &str = r#"
    SELECT p.id, p.name
    FROM governance_policy p
    JOIN governance_policy_label l ON l.policy_id = p.id
    WHERE l.label = $1 AND p.organization = $2
"#;

pub const GET_POLICIES_WITHOUT_LABELS: &str = r#"
    SELECT p.id, p.name
    FROM governance_policy p
    WHERE p.organization = $1
        AND NOT EXISTS (SELECT 1 FROM governance_policy_label l WHERE l.policy_id = p.id)
"#;

pub const GET_POLICIES_BY_LABEL_AND_STATE: &str = r#"
    SELECT DISTINCT p.id
    FROM governance_policy p
    JOIN governance_policy_label l ON l.policy_id = p.id
    JOIN governance_policy_action a ON a.policy_id = p.id
    WHERE l.label = $1 AND a.governable_state = $2 AND p.organization = $3
    ORDER BY p.id
"#;

pub const GET_POLICIES_WITHOUT_LABELS_BY_STATE: &str = r#"
    SELECT DISTINCT p.id
    FROM governance_policy p
    JOIN governance_policy_action a ON a.policy_id = p.id
    WHERE a.governable_state = $1 AND p.organization = $2
        AND NOT EXISTS (SELECT 1 FROM governance_policy_label l WHERE l.policy_id = p.id)
    ORDER BY p.id
"#;
