//! Policy invariants
//!
//! Blocking an API at create or update time would make the API impossible to
//! create in the first place, so no policy may carry such an action.

use crate::governance::error::{GovernanceError, GovernanceResult};
use crate::governance::models::{GovernableState, GovernanceAction, GovernanceActionType};

pub const RESTRICTED_BLOCKING_MESSAGE: &str =
    "Creating policies with blocking actions for API create/update is not allowed. Please update the policy";

/// States on which a BLOCK action is never accepted
const NON_BLOCKABLE_STATES: [GovernableState; 2] =
    [GovernableState::ApiCreate, GovernableState::ApiUpdate];

fn is_restricted(action: &GovernanceAction) -> bool {
    action.action_type == GovernanceActionType::Block
        && NON_BLOCKABLE_STATES.contains(&action.governable_state)
}

/// Reject action sets that block API create or update.
///
/// The first offending action in input order is reported.
pub fn check_restricted_blocking_actions(actions: &[GovernanceAction]) -> GovernanceResult<()> {
    match actions.iter().find(|a| is_restricted(a)) {
        Some(action) => Err(GovernanceError::InvalidPolicyAction(format!(
            "{} (found {} on {})",
            RESTRICTED_BLOCKING_MESSAGE, action.action_type, action.governable_state
        ))),
        None => Ok(()),
    }
}
