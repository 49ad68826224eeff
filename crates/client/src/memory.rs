//! In-process backend with the same rules as the reference server. Used by tests
//! and by offline demos of the queue views.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use secrecy::ExposeSecret;
use tokio::sync::Notify;

use reqflow_core::actions::ActionRequest;
use reqflow_core::domain::function::{FunctionFilter, RequestFunction};
use reqflow_core::domain::queue::{is_visible, QueueKind};
use reqflow_core::domain::request::{Request, RequestFields, RequestId};
use reqflow_core::domain::user::Role;
use reqflow_core::flows::{definition, LifecycleEngine};
use reqflow_core::forms::FormSchema;
use reqflow_core::wire::LoginResponse;

use crate::backend::{Backend, BackendError, Credentials};

#[derive(Default)]
struct State {
    requests: BTreeMap<RequestId, Request>,
    accounts: HashMap<String, (String, Role)>,
    last_id: i64,
    issued_tokens: u64,
    fail_lists: bool,
    fail_actions: bool,
    list_calls: usize,
    action_calls: usize,
    list_gate: Option<Arc<Notify>>,
}

/// Shared in-memory store viewed through one acting user.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<State>>,
    actor: Option<(String, Role)>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle on the same store acting as `email`.
    pub fn as_user(&self, email: &str, role: Role) -> Self {
        Self { state: Arc::clone(&self.state), actor: Some((email.to_owned(), role)) }
    }

    pub fn add_account(&self, email: &str, password: &str, role: Role) {
        self.lock().accounts.insert(email.to_ascii_lowercase(), (password.to_owned(), role));
    }

    /// Stores a new SUBMITTED request owned by `owner` and returns it.
    pub fn seed(&self, function: RequestFunction, owner: &str, fields: RequestFields) -> Request {
        let mut state = self.lock();
        state.last_id += 1;
        let at = Utc::now() + Duration::milliseconds(state.last_id);
        let request = Request::submitted(RequestId(state.last_id), function, owner, fields, at);
        state.requests.insert(request.id, request.clone());
        request
    }

    /// Inserts or overwrites a record as-is.
    pub fn put(&self, request: Request) {
        let mut state = self.lock();
        state.last_id = state.last_id.max(request.id.0);
        state.requests.insert(request.id, request);
    }

    pub fn get(&self, id: RequestId) -> Option<Request> {
        self.lock().requests.get(&id).cloned()
    }

    pub fn fail_lists(&self, fail: bool) {
        self.lock().fail_lists = fail;
    }

    pub fn fail_actions(&self, fail: bool) {
        self.lock().fail_actions = fail;
    }

    pub fn list_calls(&self) -> usize {
        self.lock().list_calls
    }

    pub fn action_calls(&self) -> usize {
        self.lock().action_calls
    }

    /// Holds the next list call after it has taken its snapshot, until the
    /// returned handle is notified.
    pub fn gate_next_list(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.lock().list_gate = Some(Arc::clone(&gate));
        gate
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn actor(&self) -> Result<(&str, Role), BackendError> {
        self.actor
            .as_ref()
            .map(|(email, role)| (email.as_str(), *role))
            .ok_or_else(|| BackendError::Unauthorized("no session".to_owned()))
    }
}

fn status(status: u16, message: impl Into<String>) -> BackendError {
    BackendError::Status { status, message: message.into() }
}

fn forbidden(queue: QueueKind) -> BackendError {
    status(403, format!("{} role required", queue.required_role().map_or("any", |r| r.as_str())))
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, BackendError> {
        let mut state = self.lock();
        let email = credentials.email.trim().to_ascii_lowercase();
        let role = match state.accounts.get(&email) {
            Some((password, role)) if password == credentials.password.expose_secret() => *role,
            _ => return Err(BackendError::Unauthorized("Invalid credentials".to_owned())),
        };
        state.issued_tokens += 1;
        Ok(LoginResponse {
            token: format!("memory-token-{}", state.issued_tokens),
            email,
            role,
            expires_at: Utc::now() + Duration::hours(1),
        })
    }

    async fn logout(&self) -> Result<(), BackendError> {
        self.actor().map(|_| ())
    }

    async fn list(
        &self,
        queue: QueueKind,
        filter: FunctionFilter,
    ) -> Result<Vec<Request>, BackendError> {
        let (email, role) = self.actor()?;
        let (snapshot, gate) = {
            let mut state = self.lock();
            state.list_calls += 1;
            let gate = state.list_gate.take();
            let snapshot = if state.fail_lists {
                Err(status(503, "listing unavailable"))
            } else if !role.can_read(queue) {
                Err(forbidden(queue))
            } else {
                let mut rows: Vec<Request> = state
                    .requests
                    .values()
                    .filter(|request| queue.admits(request, email))
                    .filter(|request| filter.matches(request.function))
                    .cloned()
                    .collect();
                if queue.is_actionable() {
                    rows.sort_by(|a, b| {
                        b.submission_date.cmp(&a.submission_date).then(b.id.cmp(&a.id))
                    });
                } else {
                    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
                }
                Ok(rows)
            };
            (snapshot, gate)
        };

        if let Some(gate) = gate {
            gate.notified().await;
        }
        snapshot
    }

    async fn submit_action(
        &self,
        queue: QueueKind,
        id: RequestId,
        action: &ActionRequest,
    ) -> Result<Request, BackendError> {
        let (email, role) = self.actor()?;
        let mut state = self.lock();
        state.action_calls += 1;
        if state.fail_actions {
            return Err(status(503, "action service unavailable"));
        }

        let stage = queue.stage().ok_or_else(|| status(405, format!("{queue} is read-only")))?;
        if !role.can_read(queue) {
            return Err(forbidden(queue));
        }
        let checked = ActionRequest::new(action.action, action.remarks.as_deref())
            .map_err(|_| status(400, "Remarks required"))?;

        let request =
            state.requests.get_mut(&id).ok_or_else(|| status(404, format!("request {id}")))?;
        let outcome = LifecycleEngine::new(definition(stage))
            .apply(&request.status, &checked.action)
            .map_err(|error| status(409, error.to_string()))?;
        request
            .apply_transition(&outcome, email, checked.remarks.as_deref(), Utc::now())
            .map_err(|error| status(409, error.to_string()))?;
        Ok(request.clone())
    }

    async fn fetch_request(&self, id: RequestId) -> Result<Request, BackendError> {
        let (email, role) = self.actor()?;
        let state = self.lock();
        let request = state.requests.get(&id).ok_or_else(|| status(404, format!("request {id}")))?;
        if is_visible(request, email, role) {
            Ok(request.clone())
        } else {
            Err(status(403, format!("request {id} is not visible to {email}")))
        }
    }

    async fn replace_request(
        &self,
        id: RequestId,
        fields: &RequestFields,
    ) -> Result<Request, BackendError> {
        let (email, _) = self.actor()?;
        let mut state = self.lock();
        let request =
            state.requests.get_mut(&id).ok_or_else(|| status(404, format!("request {id}")))?;
        if !request.owner.eq_ignore_ascii_case(email) {
            return Err(status(403, "only the owner can resubmit"));
        }
        let fields = FormSchema::for_function(request.function)
            .and_then(|schema| schema.validate(fields))
            .map_err(|error| status(400, error.to_string()))?;
        request.resubmit(fields, Utc::now()).map_err(|error| status(409, error.to_string()))?;
        Ok(request.clone())
    }

    async fn create_request(
        &self,
        function: RequestFunction,
        fields: &RequestFields,
    ) -> Result<Request, BackendError> {
        let (email, _) = self.actor()?;
        let fields = FormSchema::for_function(function)
            .and_then(|schema| schema.validate(fields))
            .map_err(|error| status(400, error.to_string()))?;
        let email = email.to_owned();
        Ok(self.seed(function, &email, fields))
    }
}
