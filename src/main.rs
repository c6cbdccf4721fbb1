//! Governance Policy API
//!
//! Decides which governance actions (block, notify) fire when an API moves
//! through its lifecycle (create, update, deploy, publish), scoped to an
//! organization and optional labels.
//!
//! - Policies are validated before they are stored: no policy may block API
//!   create or update.
//! - Label and organization-wide queries resolve which policies apply to an
//!   API at a given lifecycle state.
//! - Policies live in memory by default, or in PostgreSQL when
//!   `POLICY_STORE=postgres`.
//! - The ruleset catalog policies may reference is loaded from
//!   `RULESETS_FILE` at startup.

mod config;
mod db;
mod error;
mod governance;
mod models;
mod routes;
mod state;
mod store;

use crate::config::{Settings, StoreBackend};
use crate::governance::Ruleset;
use crate::routes::create_router;
use crate::state::AppState;
use crate::store::{InMemoryPolicyStore, PgPolicyStore, PolicyStore};
use anyhow::Context;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for structured logging
    init_tracing();

    info!("🚀 Starting Governance Policy API...");

    // Load configuration
    let settings = Settings::load()?;
    info!("📋 Configuration loaded successfully");

    let store = init_store(&settings).await?;
    let state = Arc::new(AppState::new(store));
    match &settings.rulesets_file {
        Some(path) => seed_rulesets(&state, path).await?,
        None => warn!("⚠️  RULESETS_FILE not set - policies can only reference rulesets already in the store"),
    }

    // Build the router
    let app = create_router(state, &settings);

    // Create socket address
    let addr = SocketAddr::from((settings.server.host, settings.server.port));

    info!("🌐 Server listening on http://{}", addr);
    info!("");
    info!("📚 API Endpoints:");
    info!("   GET    /governance/policies                          - List policies");
    info!("   POST   /governance/policies                          - Create policy");
    info!("   GET    /governance/policies/{{id}}                     - Get policy");
    info!("   PUT    /governance/policies/{{id}}                     - Update policy");
    info!("   DELETE /governance/policies/{{id}}                     - Delete policy");
    info!("   GET    /governance/policies/{{id}}/rulesets            - Policy rulesets");
    info!("   GET    /governance/policies/{{id}}/blocking?state=     - Blocking check");
    info!("   GET    /governance/labels/{{label}}/policies[?state=]  - Policies by label");
    info!("   GET    /governance/organization-policies[?state=]    - Organization-wide policies");
    info!("");

    // Create TCP listener and serve
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,governance_policy_api=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

/// Build the configured policy store backend
async fn init_store(settings: &Settings) -> anyhow::Result<Arc<dyn PolicyStore>> {
    match (settings.store, &settings.database) {
        (StoreBackend::Postgres, Some(db_config)) => {
            let pool = db::create_pool(db_config).await?;
            let store = PgPolicyStore::new(pool);
            store.init_schema().await?;
            info!("✅ Using PostgreSQL policy store");
            Ok(Arc::new(store))
        }
        (StoreBackend::Postgres, None) => {
            Err(anyhow::anyhow!("POLICY_STORE=postgres but no database configuration was loaded"))
        }
        (StoreBackend::Memory, _) => {
            warn!("⚠️  Using in-memory policy store - policies are lost on restart");
            Ok(Arc::new(InMemoryPolicyStore::new()))
        }
    }
}

/// Register the ruleset catalog from a JSON array file
async fn seed_rulesets(state: &AppState, path: &Path) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read ruleset catalog {}", path.display()))?;
    let rulesets: Vec<Ruleset> = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid ruleset catalog {}", path.display()))?;

    let count = state.policies.register_rulesets(&rulesets).await?;
    info!("📚 Loaded {} rulesets from {}", count, path.display());
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}
