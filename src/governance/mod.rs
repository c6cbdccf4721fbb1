//! Governance module - the policy engine
//!
//! Policy model, the blocking-action invariant and the policy manager that
//! answers "which policies apply" and "does this policy block" queries.

mod error;
mod id;
mod invariants;
mod manager;
mod models;

pub use error::{GovernanceError, StoreError};
pub use manager::PolicyManager;
pub use models::*;
