use std::sync::Arc;

use chrono::Duration;

use reqflow_core::audit::{AuditSink, NoopAuditSink};
use reqflow_core::config::MAX_TOKEN_TTL_SECS;
use reqflow_db::repositories::{
    RequestRepository, SqlRequestRepository, SqlUserRepository, UserRepository,
};
use reqflow_db::DbPool;

use crate::auth::TokenRegistry;

#[derive(Clone)]
pub struct AppState {
    pub requests: Arc<dyn RequestRepository>,
    pub users: Arc<dyn UserRepository>,
    pub tokens: TokenRegistry,
    pub token_ttl: Duration,
    pub audit: Arc<dyn AuditSink>,
}

impl AppState {
    pub fn new(
        requests: Arc<dyn RequestRepository>,
        users: Arc<dyn UserRepository>,
        token_ttl_secs: u64,
    ) -> Self {
        Self {
            requests,
            users,
            tokens: TokenRegistry::default(),
            token_ttl: Duration::seconds(token_ttl_secs.min(MAX_TOKEN_TTL_SECS) as i64),
            audit: Arc::new(NoopAuditSink),
        }
    }

    pub fn from_pool(pool: DbPool, token_ttl_secs: u64) -> Self {
        Self::new(
            Arc::new(SqlRequestRepository::new(pool.clone())),
            Arc::new(SqlUserRepository::new(pool)),
            token_ttl_secs,
        )
    }

    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }
}
