//! Application state management
//!
//! Contains shared state accessible across all handlers.

use crate::governance::PolicyManager;
use crate::store::PolicyStore;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    /// Governance policy engine over the configured store
    pub policies: PolicyManager,
}

impl AppState {
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self {
            policies: PolicyManager::new(store),
        }
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
