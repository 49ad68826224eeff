use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::function::RequestFunction;
use crate::errors::DomainError;
use crate::flows::engine::resubmission_target;
use crate::flows::states::{ActionKind, Stage, TransitionOutcome};

/// Function-specific form values keyed by schema field name.
pub type RequestFields = BTreeMap<String, String>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub i64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RequestId {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .map(RequestId)
            .ok_or_else(|| DomainError::InvariantViolation(format!("invalid request id `{value}`")))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    #[serde(alias = "PENDING_FOR_APPROVAL")]
    Submitted,
    Approved,
    Rejected,
    ReturnedForCorrection,
    Validated,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "SUBMITTED",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::ReturnedForCorrection => "RETURNED_FOR_CORRECTION",
            Self::Validated => "VALIDATED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Validated)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "SUBMITTED" | "PENDING_FOR_APPROVAL" => Ok(Self::Submitted),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            "RETURNED_FOR_CORRECTION" => Ok(Self::ReturnedForCorrection),
            "VALIDATED" => Ok(Self::Validated),
            other => Err(DomainError::InvariantViolation(format!("unknown request status `{other}`"))),
        }
    }
}

/// Outcome recorded by the validation stage, tracked apart from `status`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    Validated,
    Rejected,
    ReturnedForCorrection,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validated => "VALIDATED",
            Self::Rejected => "REJECTED",
            Self::ReturnedForCorrection => "RETURNED_FOR_CORRECTION",
        }
    }
}

impl FromStr for ValidationStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "VALIDATED" => Ok(Self::Validated),
            "REJECTED" => Ok(Self::Rejected),
            "RETURNED_FOR_CORRECTION" => Ok(Self::ReturnedForCorrection),
            other => Err(DomainError::InvariantViolation(format!(
                "unknown validation status `{other}`"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub function: RequestFunction,
    pub status: RequestStatus,
    #[serde(alias = "created_by")]
    pub owner: String,
    pub approver: Option<String>,
    pub validated_by: Option<String>,
    #[serde(alias = "remarks")]
    pub reason_for_return: Option<String>,
    pub submission_date: DateTime<Utc>,
    #[serde(alias = "last_modified")]
    pub modified_date: DateTime<Utc>,
    pub validation_status: Option<ValidationStatus>,
    #[serde(default)]
    pub returned_by: Option<Stage>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub fields: RequestFields,
}

impl Request {
    /// A freshly submitted request, pending approval.
    pub fn submitted(
        id: RequestId,
        function: RequestFunction,
        owner: impl Into<String>,
        fields: RequestFields,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            function,
            status: RequestStatus::Submitted,
            owner: owner.into(),
            approver: None,
            validated_by: None,
            reason_for_return: None,
            submission_date: at,
            modified_date: at,
            validation_status: None,
            returned_by: None,
            created_at: at,
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Only a request returned for correction can be edited and resubmitted.
    pub fn offers_resubmission(&self) -> bool {
        self.status == RequestStatus::ReturnedForCorrection
    }

    /// Records a backend-authorized transition on this record.
    pub fn apply_transition(
        &mut self,
        outcome: &TransitionOutcome,
        actor: &str,
        remarks: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if outcome.from != self.status {
            return Err(DomainError::InvariantViolation(format!(
                "transition expected request {} in {} but found {}",
                self.id, outcome.from, self.status
            )));
        }

        self.status = outcome.to;
        match outcome.stage {
            Stage::Approval => self.approver = Some(actor.to_string()),
            Stage::Validation => {
                self.validated_by = Some(actor.to_string());
                self.validation_status = outcome.validation_status;
            }
        }

        if let Some(remarks) = remarks.map(str::trim).filter(|remarks| !remarks.is_empty()) {
            self.reason_for_return = Some(remarks.to_string());
        }
        self.returned_by = (outcome.action == ActionKind::Return).then_some(outcome.stage);
        self.modified_date = at;
        Ok(())
    }

    /// Update-in-place resubmission: replaces the editable fields and re-enters approval.
    pub fn resubmit(&mut self, fields: RequestFields, at: DateTime<Utc>) -> Result<(), DomainError> {
        self.status = resubmission_target(&self.status)?;
        self.fields = fields;
        self.approver = None;
        self.validated_by = None;
        self.validation_status = None;
        self.returned_by = None;
        self.submission_date = at;
        self.modified_date = at;
        Ok(())
    }
}
