//! Approval routing rules.
//!
//! A workflow is an ordered list of steps, each owned by a role. A request
//! starts at step 1 and moves forward on approval; any rejection ends it.

use crate::error::CoreError;
use crate::roles::{self, ROLE_ADMIN};

/// Request type routed for disbursement schedules.
pub const REQUEST_TYPE_DISBURSEMENT: &str = "disbursement";

pub const DECISION_APPROVE: &str = "approve";
pub const DECISION_REJECT: &str = "reject";

/// Longest allowed workflow.
pub const MAX_WORKFLOW_STEPS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approve => DECISION_APPROVE,
            Self::Reject => DECISION_REJECT,
        }
    }
}

/// Where a request goes after a decision on its current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Advance { next_step: i32 },
    Approved,
    Rejected,
}

/// Compute the outcome of `decision` on `current_step` (1-based) of a
/// workflow with `total_steps` steps.
pub fn advance(current_step: i32, total_steps: i32, decision: Decision) -> StepOutcome {
    match decision {
        Decision::Reject => StepOutcome::Rejected,
        Decision::Approve if current_step >= total_steps => StepOutcome::Approved,
        Decision::Approve => StepOutcome::Advance {
            next_step: current_step + 1,
        },
    }
}

/// The caller must hold the step's role. Admins may act on any step.
pub fn check_step_role(step_role: &str, caller_role: &str) -> Result<(), CoreError> {
    if caller_role == step_role || caller_role == ROLE_ADMIN {
        Ok(())
    } else {
        Err(CoreError::Forbidden(format!(
            "This step requires the {} role",
            roles::role_label(step_role)
        )))
    }
}

/// Validate the ordered role list of a new workflow.
pub fn validate_step_roles(step_roles: &[String]) -> Result<(), CoreError> {
    if step_roles.is_empty() {
        return Err(CoreError::Validation(
            "A workflow needs at least one step".into(),
        ));
    }
    if step_roles.len() > MAX_WORKFLOW_STEPS {
        return Err(CoreError::Validation(format!(
            "A workflow may have at most {MAX_WORKFLOW_STEPS} steps"
        )));
    }
    if let Some(bad) = step_roles.iter().find(|r| !roles::is_known_role(r)) {
        return Err(CoreError::Validation(format!("Unknown role '{bad}'")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn approve_moves_to_next_step() {
        assert_eq!(
            advance(1, 2, Decision::Approve),
            StepOutcome::Advance { next_step: 2 }
        );
    }

    #[test]
    fn approve_on_last_step_approves() {
        assert_eq!(advance(2, 2, Decision::Approve), StepOutcome::Approved);
    }

    #[test]
    fn reject_ends_on_any_step() {
        assert_eq!(advance(1, 3, Decision::Reject), StepOutcome::Rejected);
        assert_eq!(advance(3, 3, Decision::Reject), StepOutcome::Rejected);
    }

    #[test]
    fn wrong_role_is_forbidden() {
        assert_matches!(
            check_step_role("scholarship_officer", "hr"),
            Err(CoreError::Forbidden(_))
        );
        assert!(check_step_role("scholarship_officer", "scholarship_officer").is_ok());
        assert!(check_step_role("scholarship_officer", "admin").is_ok());
    }

    #[test]
    fn step_roles_validation() {
        assert!(validate_step_roles(&[]).is_err());
        assert!(validate_step_roles(&["hr".into(), "ghost".into()]).is_err());
        assert!(validate_step_roles(&["scholarship_officer".into(), "admin".into()]).is_ok());
    }
}
