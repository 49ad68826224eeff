use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::request::{RequestStatus, ValidationStatus};
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Approval,
    Validation,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approval => "approval",
            Self::Validation => "validation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "approval" => Ok(Self::Approval),
            "validation" => Ok(Self::Validation),
            other => Err(DomainError::InvariantViolation(format!("unknown stage `{other}`"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    Approve,
    Reject,
    Return,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "APPROVE",
            Self::Reject => "REJECT",
            Self::Return => "RETURN",
        }
    }

    pub fn requires_justification(&self) -> bool {
        matches!(self, Self::Reject | Self::Return)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "APPROVE" | "VALIDATE" => Ok(Self::Approve),
            "REJECT" => Ok(Self::Reject),
            "RETURN" | "RETURN_FOR_CORRECTION" => Ok(Self::Return),
            _ => Err(DomainError::UnknownAction(value.trim().to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub stage: Stage,
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub action: ActionKind,
    pub validation_status: Option<ValidationStatus>,
}
