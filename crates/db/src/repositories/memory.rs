use std::collections::{BTreeMap, HashMap};

use tokio::sync::RwLock;

use reqflow_core::domain::request::{Request, RequestId, RequestStatus};
use reqflow_core::domain::user::UserAccount;

use super::{
    sort_requests, NewRequest, RepositoryError, RequestQuery, RequestRepository, UserRepository,
};

#[derive(Default)]
pub struct InMemoryRequestRepository {
    requests: RwLock<BTreeMap<RequestId, Request>>,
}

impl InMemoryRequestRepository {
    /// Stores `request` as-is, keeping its id. Used to stage fixtures.
    pub async fn put(&self, request: Request) {
        self.requests.write().await.insert(request.id, request);
    }
}

#[async_trait::async_trait]
impl RequestRepository for InMemoryRequestRepository {
    async fn find_by_id(&self, id: RequestId) -> Result<Option<Request>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(requests.get(&id).cloned())
    }

    async fn list(&self, query: &RequestQuery) -> Result<Vec<Request>, RepositoryError> {
        let requests = self.requests.read().await;
        let mut matching =
            requests.values().filter(|request| query.matches(request)).cloned().collect::<Vec<_>>();
        sort_requests(&mut matching, query.order);
        Ok(matching)
    }

    async fn insert(&self, new: NewRequest) -> Result<Request, RepositoryError> {
        let mut requests = self.requests.write().await;
        let next_id = requests.keys().next_back().map_or(1, |id| id.0 + 1);
        let request = Request::submitted(
            RequestId(next_id),
            new.function,
            new.owner,
            new.fields,
            new.submitted_at,
        );
        requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn update_if_status(
        &self,
        request: &Request,
        expected: RequestStatus,
    ) -> Result<bool, RepositoryError> {
        let mut requests = self.requests.write().await;
        match requests.get_mut(&request.id) {
            Some(stored) if stored.status == expected => {
                *stored = request.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(self.requests.read().await.len() as u64)
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, UserAccount>>,
}

#[async_trait::async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.get(&email.trim().to_ascii_lowercase()).cloned())
    }

    async fn save(&self, user: UserAccount) -> Result<(), RepositoryError> {
        let mut users = self.users.write().await;
        users.insert(user.email.to_ascii_lowercase(), user);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<UserAccount>, RepositoryError> {
        let users = self.users.read().await;
        let mut all = users.values().cloned().collect::<Vec<_>>();
        all.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use reqflow_core::domain::function::{FunctionFilter, RequestFunction};
    use reqflow_core::domain::queue::QueueKind;
    use reqflow_core::domain::request::{RequestFields, RequestStatus};

    use crate::repositories::{
        InMemoryRequestRepository, NewRequest, RequestQuery, RequestRepository,
    };

    #[tokio::test]
    async fn in_memory_request_repo_assigns_sequential_ids() {
        let repo = InMemoryRequestRepository::default();
        let now = Utc::now();
        let first = repo
            .insert(NewRequest {
                function: RequestFunction::PartCodeModification,
                owner: "sub@demo.com".to_owned(),
                fields: RequestFields::new(),
                submitted_at: now,
            })
            .await
            .expect("insert");
        let second = repo
            .insert(NewRequest {
                function: RequestFunction::PartCodeModification,
                owner: "sub@demo.com".to_owned(),
                fields: RequestFields::new(),
                submitted_at: now + Duration::seconds(1),
            })
            .await
            .expect("insert");

        assert_eq!(second.id.0, first.id.0 + 1);
        let listed = repo
            .list(&RequestQuery::for_queue(QueueKind::Approval, "x", FunctionFilter::All))
            .await
            .expect("list");
        assert_eq!(listed.iter().map(|r| r.id).collect::<Vec<_>>(), vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn conditional_update_checks_the_stored_status() {
        let repo = InMemoryRequestRepository::default();
        let mut request = repo
            .insert(NewRequest {
                function: RequestFunction::PartCodeModification,
                owner: "sub@demo.com".to_owned(),
                fields: RequestFields::new(),
                submitted_at: Utc::now(),
            })
            .await
            .expect("insert");

        request.status = RequestStatus::Approved;
        assert!(!repo.update_if_status(&request, RequestStatus::Approved).await.expect("update"));
        assert!(repo.update_if_status(&request, RequestStatus::Submitted).await.expect("update"));
        let stored = repo.find_by_id(request.id).await.expect("find").expect("exists");
        assert_eq!(stored.status, RequestStatus::Approved);
    }
}
