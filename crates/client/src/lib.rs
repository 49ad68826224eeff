//! Request lifecycle client: queue views, decisions, resubmission, and the
//! session that authenticates them.

pub mod backend;
pub mod confirm;
pub mod http;
pub mod memory;
pub mod queue;
pub mod resubmit;
pub mod session;
pub mod submit;
pub mod views;

pub use backend::{Backend, BackendError, Credentials};
pub use confirm::{AssumeYes, ConfirmIntent, Confirmation};
pub use http::HttpBackend;
pub use memory::InMemoryBackend;
pub use queue::{ActionError, ActionOutcome, FetchOutcome, QueueView};
pub use resubmit::{ResubmissionDraft, ResubmitError};
pub use session::{SessionContext, SessionError, SessionStore};
pub use submit::{create_request, SubmitError};
pub use views::{Column, TableView};
