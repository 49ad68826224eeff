pub mod actions;
pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod forms;
pub mod wire;

pub use actions::{
    confirmation_prompt, ActionRequest, ACTION_FAILED_MESSAGE, MISSING_REMARKS_MESSAGE,
};
pub use audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink,
    NoopAuditSink,
};
pub use domain::function::{FunctionFilter, RequestFunction};
pub use domain::queue::QueueKind;
pub use domain::request::{Request, RequestFields, RequestId, RequestStatus, ValidationStatus};
pub use domain::user::{Role, UserAccount};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{ActionKind, FlowTransitionError, LifecycleEngine, Stage, TransitionOutcome};
pub use forms::{FieldKind, FieldProblem, FieldSpec, FormError, FormSchema, SelectOption};
