use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use reqflow_core::domain::function::{FunctionFilter, RequestFunction};
use reqflow_core::domain::queue::QueueKind;
use reqflow_core::domain::request::{Request, RequestFields, RequestId, RequestStatus};
use reqflow_core::domain::user::UserAccount;

pub mod memory;
pub mod request;
pub mod user;

pub use memory::{InMemoryRequestRepository, InMemoryUserRepository};
pub use request::SqlRequestRepository;
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListOrder {
    SubmissionDateDesc,
    CreatedAtDesc,
}

/// Selection for a listing. Built from a queue so membership is decided in one place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestQuery {
    pub statuses: Vec<RequestStatus>,
    pub owner: Option<String>,
    pub function: FunctionFilter,
    pub order: ListOrder,
}

impl RequestQuery {
    pub fn for_queue(queue: QueueKind, viewer: &str, function: FunctionFilter) -> Self {
        let (statuses, owner, order) = match queue {
            QueueKind::Approval => {
                (vec![RequestStatus::Submitted], None, ListOrder::SubmissionDateDesc)
            }
            QueueKind::Validation => {
                (vec![RequestStatus::Approved], None, ListOrder::SubmissionDateDesc)
            }
            QueueKind::ApprovedHistory => (
                vec![RequestStatus::Approved, RequestStatus::Validated],
                None,
                ListOrder::CreatedAtDesc,
            ),
            QueueKind::ValidatedHistory => {
                (vec![RequestStatus::Validated], None, ListOrder::CreatedAtDesc)
            }
            QueueKind::MyRequests => (Vec::new(), Some(viewer.to_owned()), ListOrder::CreatedAtDesc),
        };
        Self { statuses, owner, function, order }
    }

    pub fn matches(&self, request: &Request) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&request.status))
            && self.owner.as_deref().map_or(true, |owner| request.owner.eq_ignore_ascii_case(owner))
            && self.function.matches(request.function)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewRequest {
    pub function: RequestFunction,
    pub owner: String,
    pub fields: RequestFields,
    pub submitted_at: DateTime<Utc>,
}

#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn find_by_id(&self, id: RequestId) -> Result<Option<Request>, RepositoryError>;
    async fn list(&self, query: &RequestQuery) -> Result<Vec<Request>, RepositoryError>;
    /// Inserts a submitted request and returns it with its assigned id.
    async fn insert(&self, new: NewRequest) -> Result<Request, RepositoryError>;
    /// Writes `request` only if the stored status still equals `expected`.
    /// Returns `false` when another writer moved the record first.
    async fn update_if_status(
        &self,
        request: &Request,
        expected: RequestStatus,
    ) -> Result<bool, RepositoryError>;
    async fn count(&self) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, RepositoryError>;
    async fn save(&self, user: UserAccount) -> Result<(), RepositoryError>;
    async fn list(&self) -> Result<Vec<UserAccount>, RepositoryError>;
}

pub(crate) fn sort_requests(requests: &mut [Request], order: ListOrder) {
    match order {
        ListOrder::SubmissionDateDesc => requests.sort_by(|a, b| {
            b.submission_date.cmp(&a.submission_date).then_with(|| b.id.cmp(&a.id))
        }),
        ListOrder::CreatedAtDesc => {
            requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)))
        }
    }
}
