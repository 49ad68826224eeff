use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::flows::{ActionKind, Stage};

pub const MISSING_REMARKS_MESSAGE: &str = "Remarks are mandatory for this action";
pub const ACTION_FAILED_MESSAGE: &str = "Action failed";

/// Body of a transition request. Construction enforces the justification rule,
/// so a value of this type is always safe to send.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

impl ActionRequest {
    pub fn new(action: ActionKind, remarks: Option<&str>) -> Result<Self, DomainError> {
        let remarks = remarks.map(str::trim).filter(|text| !text.is_empty()).map(str::to_owned);
        if action.requires_justification() && remarks.is_none() {
            return Err(DomainError::MissingJustification { action });
        }
        Ok(Self { action, remarks })
    }

    pub fn approve() -> Self {
        Self { action: ActionKind::Approve, remarks: None }
    }
}

pub fn confirmation_prompt(stage: Stage, action: ActionKind) -> &'static str {
    match (stage, action) {
        (Stage::Approval, ActionKind::Approve) => "Approve this request?",
        (Stage::Validation, ActionKind::Approve) => "Validate this request?",
        (_, ActionKind::Reject) => "Reject this request?",
        (_, ActionKind::Return) => "Return this request for correction?",
    }
}
