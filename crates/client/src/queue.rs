//! A live view over one queue: list state, in-flight actions, and reconciliation
//! with the backend's answer.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing::{debug, info, warn};

use reqflow_core::actions::{
    confirmation_prompt, ActionRequest, ACTION_FAILED_MESSAGE, MISSING_REMARKS_MESSAGE,
};
use reqflow_core::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink, NoopAuditSink};
use reqflow_core::domain::function::FunctionFilter;
use reqflow_core::domain::queue::QueueKind;
use reqflow_core::domain::request::{Request, RequestId};
use reqflow_core::errors::{ApplicationError, DomainError};
use reqflow_core::flows::ActionKind;

use crate::backend::{Backend, BackendError};
use crate::confirm::{ConfirmIntent, Confirmation};

/// How the most recent list fetch ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    Loaded { count: usize },
    Failed { reason: String },
    DiscardedStale,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("Remarks are mandatory for this action ({action})")]
    MissingJustification { action: ActionKind },
    #[error("{queue} is a read-only view")]
    ReadOnlyQueue { queue: QueueKind },
    #[error("request {id} is not pending in this view")]
    NotPending { id: RequestId },
    #[error("an action on request {id} is already in flight")]
    InFlight { id: RequestId },
    #[error("Action failed: {0}")]
    Backend(#[from] BackendError),
}

impl ActionError {
    /// Text for the blocking alert shown to the user.
    pub fn alert(&self) -> &'static str {
        match self {
            Self::MissingJustification { .. } => MISSING_REMARKS_MESSAGE,
            _ => ACTION_FAILED_MESSAGE,
        }
    }
}

impl From<ActionError> for ApplicationError {
    fn from(value: ActionError) -> Self {
        match value {
            ActionError::MissingJustification { action } => {
                DomainError::MissingJustification { action }.into()
            }
            ActionError::ReadOnlyQueue { queue } => {
                Self::Forbidden(format!("{queue} is a read-only view"))
            }
            ActionError::NotPending { id } | ActionError::InFlight { id } => {
                Self::NotFound(format!("request {id} is not pending here"))
            }
            ActionError::Backend(error) => error.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionOutcome {
    Applied(Request),
    Cancelled,
}

#[derive(Default)]
struct ViewState {
    requests: Vec<Request>,
    filter: FunctionFilter,
    generation: u64,
    loading: bool,
    in_flight: HashSet<RequestId>,
    /// Rows acted on in this view, keyed by the generation current when the
    /// action succeeded. Snapshots from that generation or older predate it.
    settled: HashMap<RequestId, u64>,
    last_fetch: Option<FetchOutcome>,
}

pub struct QueueView<B> {
    backend: B,
    queue: QueueKind,
    viewer: String,
    audit: Arc<dyn AuditSink>,
    state: Mutex<ViewState>,
}

impl<B> QueueView<B>
where
    B: Backend,
{
    pub fn new(backend: B, queue: QueueKind, viewer: impl Into<String>) -> Self {
        Self {
            backend,
            queue,
            viewer: viewer.into(),
            audit: Arc::new(NoopAuditSink),
            state: Mutex::new(ViewState::default()),
        }
    }

    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    pub fn queue(&self) -> QueueKind {
        self.queue
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn requests(&self) -> Vec<Request> {
        self.lock().requests.clone()
    }

    pub fn filter(&self) -> FunctionFilter {
        self.lock().filter
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    pub fn is_in_flight(&self, id: RequestId) -> bool {
        self.lock().in_flight.contains(&id)
    }

    pub fn last_fetch(&self) -> Option<FetchOutcome> {
        self.lock().last_fetch.clone()
    }

    /// Shown whenever the listing is empty, including after a failed fetch.
    pub fn empty_message(&self) -> &'static str {
        self.queue.empty_message()
    }

    /// Replaces the listing with the backend's snapshot for `filter`.
    pub async fn refresh(&self, filter: FunctionFilter) -> Vec<Request> {
        self.fetch(filter).await;
        self.requests()
    }

    pub async fn fetch(&self, filter: FunctionFilter) -> FetchOutcome {
        let generation = {
            let mut state = self.lock();
            state.generation += 1;
            state.loading = true;
            state.generation
        };
        let audit = AuditContext::for_actor(&self.viewer);

        let result = self.backend.list(self.queue, filter).await;

        let outcome = {
            let mut state = self.lock();
            if state.generation != generation {
                None
            } else {
                state.loading = false;
                state.filter = filter;
                let outcome = match result {
                    Ok(mut requests) => {
                        let settled = std::mem::take(&mut state.settled);
                        requests.retain(|request| {
                            settled.get(&request.id).map_or(true, |acted_at| generation > *acted_at)
                        });
                        let count = requests.len();
                        state.requests = requests;
                        FetchOutcome::Loaded { count }
                    }
                    Err(error) => {
                        state.requests.clear();
                        FetchOutcome::Failed { reason: error.to_string() }
                    }
                };
                state.last_fetch = Some(outcome.clone());
                Some(outcome)
            }
        };

        let Some(outcome) = outcome else {
            debug!(
                event_name = "queue.fetch.discarded",
                correlation_id = %audit.correlation_id,
                queue = %self.queue,
                generation,
                "discarding superseded queue response"
            );
            self.audit.emit(
                audit
                    .event("queue.fetch_discarded", AuditCategory::Queue, AuditOutcome::Rejected)
                    .with_metadata("queue", self.queue.key())
                    .with_metadata("generation", generation.to_string()),
            );
            return FetchOutcome::DiscardedStale;
        };

        match &outcome {
            FetchOutcome::Loaded { count } => {
                info!(
                    event_name = "queue.fetch.succeeded",
                    correlation_id = %audit.correlation_id,
                    queue = %self.queue,
                    filter = %filter,
                    count,
                    "queue loaded"
                );
                self.audit.emit(
                    audit
                        .event("queue.fetch_succeeded", AuditCategory::Queue, AuditOutcome::Success)
                        .with_metadata("queue", self.queue.key())
                        .with_metadata("filter", filter.to_string())
                        .with_metadata("count", count.to_string()),
                );
            }
            FetchOutcome::Failed { reason } => {
                warn!(
                    event_name = "queue.fetch.failed",
                    correlation_id = %audit.correlation_id,
                    queue = %self.queue,
                    filter = %filter,
                    reason = %reason,
                    "queue fetch failed; showing empty listing"
                );
                self.audit.emit(
                    audit
                        .event("queue.fetch_failed", AuditCategory::Queue, AuditOutcome::Failed)
                        .with_metadata("queue", self.queue.key())
                        .with_metadata("filter", filter.to_string())
                        .with_metadata("reason", reason.clone()),
                );
            }
            FetchOutcome::DiscardedStale => {}
        }
        outcome
    }

    /// Prompt for `action`, or `ReadOnlyQueue` when this view takes no decisions.
    pub fn prompt(&self, action: ActionKind) -> Result<&'static str, ActionError> {
        self.queue
            .stage()
            .map(|stage| confirmation_prompt(stage, action))
            .ok_or(ActionError::ReadOnlyQueue { queue: self.queue })
    }

    pub fn confirm_intent(
        &self,
        action: ActionKind,
        confirm: &dyn ConfirmIntent,
    ) -> Result<Confirmation, ActionError> {
        Ok(confirm.confirm(self.prompt(action)?))
    }

    /// Checks the justification, asks for confirmation, then submits.
    pub async fn confirm_and_submit(
        &self,
        id: RequestId,
        action: ActionKind,
        remarks: Option<&str>,
        confirm: &dyn ConfirmIntent,
    ) -> Result<ActionOutcome, ActionError> {
        let audit = AuditContext::for_actor(&self.viewer).with_request(id);
        let body = self.checked_body(action, remarks, &audit)?;

        if self.confirm_intent(action, confirm)? == Confirmation::Cancelled {
            info!(
                event_name = "action.submit.cancelled",
                correlation_id = %audit.correlation_id,
                queue = %self.queue,
                request_id = %id,
                action = %action,
                "action cancelled at confirmation"
            );
            self.audit.emit(
                audit
                    .event("action.cancelled", AuditCategory::Action, AuditOutcome::Rejected)
                    .with_metadata("queue", self.queue.key())
                    .with_metadata("action", action.as_str()),
            );
            return Ok(ActionOutcome::Cancelled);
        }

        self.submit_checked(id, body, &audit).await.map(ActionOutcome::Applied)
    }

    /// Submits one decision. The request must be pending in this view and not
    /// already in flight; on success it leaves the local listing.
    pub async fn submit_action(
        &self,
        id: RequestId,
        action: ActionKind,
        remarks: Option<&str>,
    ) -> Result<Request, ActionError> {
        let audit = AuditContext::for_actor(&self.viewer).with_request(id);
        let body = self.checked_body(action, remarks, &audit)?;
        self.submit_checked(id, body, &audit).await
    }

    fn checked_body(
        &self,
        action: ActionKind,
        remarks: Option<&str>,
        audit: &AuditContext,
    ) -> Result<ActionRequest, ActionError> {
        if !self.queue.is_actionable() {
            return Err(ActionError::ReadOnlyQueue { queue: self.queue });
        }

        ActionRequest::new(action, remarks).map_err(|_| {
            warn!(
                event_name = "action.submit.blocked",
                correlation_id = %audit.correlation_id,
                queue = %self.queue,
                action = %action,
                "justification missing; nothing sent"
            );
            self.audit.emit(
                audit
                    .event(
                        "action.justification_missing",
                        AuditCategory::Action,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("queue", self.queue.key())
                    .with_metadata("action", action.as_str()),
            );
            ActionError::MissingJustification { action }
        })
    }

    async fn submit_checked(
        &self,
        id: RequestId,
        body: ActionRequest,
        audit: &AuditContext,
    ) -> Result<Request, ActionError> {
        let _guard = InFlightGuard::acquire(&self.state, id)?;

        let result = self.backend.submit_action(self.queue, id, &body).await;
        match result {
            Ok(updated) => {
                {
                    let mut state = self.lock();
                    state.requests.retain(|request| request.id != id);
                    let generation = state.generation;
                    state.settled.insert(id, generation);
                }
                info!(
                    event_name = "action.submit.applied",
                    correlation_id = %audit.correlation_id,
                    queue = %self.queue,
                    request_id = %id,
                    action = %body.action,
                    status = %updated.status,
                    "action applied"
                );
                self.audit.emit(
                    audit
                        .event("action.applied", AuditCategory::Action, AuditOutcome::Success)
                        .with_metadata("queue", self.queue.key())
                        .with_metadata("action", body.action.as_str())
                        .with_metadata("status", updated.status.as_str()),
                );
                Ok(updated)
            }
            Err(error) => {
                warn!(
                    event_name = "action.submit.failed",
                    correlation_id = %audit.correlation_id,
                    queue = %self.queue,
                    request_id = %id,
                    action = %body.action,
                    error_kind = error.kind(),
                    error = %error,
                    "action failed; request left in view"
                );
                self.audit.emit(
                    audit
                        .event("action.failed", AuditCategory::Action, AuditOutcome::Failed)
                        .with_metadata("queue", self.queue.key())
                        .with_metadata("action", body.action.as_str())
                        .with_metadata("reason", error.to_string()),
                );
                Err(ActionError::Backend(error))
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, ViewState> {
        lock_state(&self.state)
    }
}

fn lock_state(state: &Mutex<ViewState>) -> MutexGuard<'_, ViewState> {
    match state.lock() {
        Ok(state) => state,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Marks one row busy for the lifetime of a submission, including when the
/// submitting future is dropped.
struct InFlightGuard<'a> {
    state: &'a Mutex<ViewState>,
    id: RequestId,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(state: &'a Mutex<ViewState>, id: RequestId) -> Result<Self, ActionError> {
        let mut locked = lock_state(state);
        if !locked.requests.iter().any(|request| request.id == id) {
            return Err(ActionError::NotPending { id });
        }
        if !locked.in_flight.insert(id) {
            return Err(ActionError::InFlight { id });
        }
        Ok(Self { state, id })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        lock_state(self.state).in_flight.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use reqflow_core::audit::InMemoryAuditSink;
    use reqflow_core::domain::function::{FunctionFilter, RequestFunction};
    use reqflow_core::domain::queue::QueueKind;
    use reqflow_core::domain::request::{RequestFields, RequestId};
    use reqflow_core::domain::user::Role;
    use reqflow_core::flows::ActionKind;

    use super::{ActionError, FetchOutcome, QueueView};
    use crate::memory::InMemoryBackend;

    #[tokio::test]
    async fn read_only_views_take_no_actions() {
        let store = InMemoryBackend::new();
        let view = QueueView::new(
            store.as_user("s@demo.com", Role::Submitter),
            QueueKind::MyRequests,
            "s@demo.com",
        );

        let error = view
            .submit_action(RequestId(1), ActionKind::Approve, None)
            .await
            .expect_err("read-only");
        assert_eq!(error, ActionError::ReadOnlyQueue { queue: QueueKind::MyRequests });
        assert_eq!(store.action_calls(), 0);
    }

    #[tokio::test]
    async fn unknown_rows_are_not_sent() {
        let store = InMemoryBackend::new();
        let view = QueueView::new(
            store.as_user("a@demo.com", Role::Approver),
            QueueKind::Approval,
            "a@demo.com",
        );
        view.refresh(FunctionFilter::All).await;

        let error = view
            .submit_action(RequestId(42), ActionKind::Approve, None)
            .await
            .expect_err("not in view");
        assert_eq!(error, ActionError::NotPending { id: RequestId(42) });
        assert_eq!(store.action_calls(), 0);
    }

    #[tokio::test]
    async fn loading_flag_clears_after_fetch() {
        let store = InMemoryBackend::new();
        store.seed(RequestFunction::PartCodeModification, "s@demo.com", RequestFields::new());
        let sink = InMemoryAuditSink::default();
        let view = QueueView::new(
            store.as_user("a@demo.com", Role::Approver),
            QueueKind::Approval,
            "a@demo.com",
        )
        .with_audit(Arc::new(sink.clone()));

        assert!(!view.is_loading());
        assert_eq!(view.fetch(FunctionFilter::All).await, FetchOutcome::Loaded { count: 1 });
        assert!(!view.is_loading());
        assert_eq!(sink.event_types(), vec!["queue.fetch_succeeded".to_owned()]);
        assert_eq!(sink.events()[0].metadata.get("count").map(String::as_str), Some("1"));
    }

    #[test]
    fn alerts_distinguish_missing_remarks_from_failures() {
        assert_eq!(
            ActionError::MissingJustification { action: ActionKind::Reject }.alert(),
            "Remarks are mandatory for this action"
        );
        assert_eq!(ActionError::InFlight { id: RequestId(1) }.alert(), "Action failed");
    }
}
