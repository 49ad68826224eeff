use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::request::{RequestStatus, ValidationStatus};
use crate::flows::states::{ActionKind, Stage, TransitionOutcome};

/// Transition table for one decision stage. Executed by the backend of record.
pub trait StageDefinition {
    fn stage(&self) -> Stage;
    fn pending_status(&self) -> RequestStatus;
    fn transition(
        &self,
        current: &RequestStatus,
        action: &ActionKind,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

impl<S> StageDefinition for &S
where
    S: StageDefinition + ?Sized,
{
    fn stage(&self) -> Stage {
        (**self).stage()
    }

    fn pending_status(&self) -> RequestStatus {
        (**self).pending_status()
    }

    fn transition(
        &self,
        current: &RequestStatus,
        action: &ActionKind,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        (**self).transition(current, action)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ApprovalStage;

impl StageDefinition for ApprovalStage {
    fn stage(&self) -> Stage {
        Stage::Approval
    }

    fn pending_status(&self) -> RequestStatus {
        RequestStatus::Submitted
    }

    fn transition(
        &self,
        current: &RequestStatus,
        action: &ActionKind,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        let to = match (current, action) {
            (RequestStatus::Submitted, ActionKind::Approve) => RequestStatus::Approved,
            (RequestStatus::Submitted, ActionKind::Reject) => RequestStatus::Rejected,
            (RequestStatus::Submitted, ActionKind::Return) => RequestStatus::ReturnedForCorrection,
            _ => return Err(not_pending(self.stage(), current, action)),
        };

        Ok(TransitionOutcome {
            stage: self.stage(),
            from: *current,
            to,
            action: *action,
            validation_status: None,
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct ValidationStage;

impl StageDefinition for ValidationStage {
    fn stage(&self) -> Stage {
        Stage::Validation
    }

    fn pending_status(&self) -> RequestStatus {
        RequestStatus::Approved
    }

    fn transition(
        &self,
        current: &RequestStatus,
        action: &ActionKind,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        let (to, validation_status) = match (current, action) {
            (RequestStatus::Approved, ActionKind::Approve) => {
                (RequestStatus::Validated, ValidationStatus::Validated)
            }
            (RequestStatus::Approved, ActionKind::Reject) => {
                (RequestStatus::Rejected, ValidationStatus::Rejected)
            }
            (RequestStatus::Approved, ActionKind::Return) => {
                (RequestStatus::ReturnedForCorrection, ValidationStatus::ReturnedForCorrection)
            }
            _ => return Err(not_pending(self.stage(), current, action)),
        };

        Ok(TransitionOutcome {
            stage: self.stage(),
            from: *current,
            to,
            action: *action,
            validation_status: Some(validation_status),
        })
    }
}

static APPROVAL_STAGE: ApprovalStage = ApprovalStage;
static VALIDATION_STAGE: ValidationStage = ValidationStage;

pub fn definition(stage: Stage) -> &'static dyn StageDefinition {
    match stage {
        Stage::Approval => &APPROVAL_STAGE,
        Stage::Validation => &VALIDATION_STAGE,
    }
}

/// Status a record enters when its owner resubmits it in place.
pub fn resubmission_target(current: &RequestStatus) -> Result<RequestStatus, FlowTransitionError> {
    match current {
        RequestStatus::ReturnedForCorrection => Ok(RequestStatus::Submitted),
        other => Err(FlowTransitionError::ResubmitNotAllowed { status: *other }),
    }
}

pub struct LifecycleEngine<S> {
    stage: S,
}

impl<S> LifecycleEngine<S>
where
    S: StageDefinition,
{
    pub fn new(stage: S) -> Self {
        Self { stage }
    }

    pub fn stage(&self) -> Stage {
        self.stage.stage()
    }

    pub fn pending_status(&self) -> RequestStatus {
        self.stage.pending_status()
    }

    pub fn apply(
        &self,
        current: &RequestStatus,
        action: &ActionKind,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.stage.transition(current, action)
    }

    pub fn apply_with_audit<A>(
        &self,
        current: &RequestStatus,
        action: &ActionKind,
        sink: &A,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>
    where
        A: AuditSink + ?Sized,
    {
        let result = self.apply(current, action);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        audit.request_id,
                        audit.correlation_id.clone(),
                        "lifecycle.transition_applied",
                        AuditCategory::Lifecycle,
                        audit.actor.clone(),
                        AuditOutcome::Success,
                    )
                    .with_metadata("stage", outcome.stage.as_str())
                    .with_metadata("from", outcome.from.as_str())
                    .with_metadata("to", outcome.to.as_str())
                    .with_metadata("action", outcome.action.as_str()),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        audit.request_id,
                        audit.correlation_id.clone(),
                        "lifecycle.transition_rejected",
                        AuditCategory::Lifecycle,
                        audit.actor.clone(),
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("request in {status} is not pending in the {stage} queue (action {action})")]
    NotPending { stage: Stage, status: RequestStatus, action: ActionKind },
    #[error("request in {status} cannot be resubmitted; only returned requests can")]
    ResubmitNotAllowed { status: RequestStatus },
}

fn not_pending(stage: Stage, status: &RequestStatus, action: &ActionKind) -> FlowTransitionError {
    FlowTransitionError::NotPending { stage, status: *status, action: *action }
}
