//! Bearer-token sessions for the REST surface.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use reqflow_core::domain::user::Role;
use reqflow_core::errors::ApplicationError;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grant {
    pub email: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

/// Opaque tokens issued at login. Expired entries are swept on every issue
/// and dropped on lookup.
#[derive(Clone, Default)]
pub struct TokenRegistry {
    grants: Arc<RwLock<HashMap<String, Grant>>>,
}

impl TokenRegistry {
    pub async fn issue(
        &self,
        email: &str,
        role: Role,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> (String, Grant) {
        let token = Uuid::new_v4().simple().to_string();
        let grant = Grant { email: email.to_owned(), role, expires_at: now + ttl };
        let mut grants = self.grants.write().await;
        grants.retain(|_, existing| now < existing.expires_at);
        grants.insert(token.clone(), grant.clone());
        (token, grant)
    }

    pub async fn resolve(&self, token: &str, now: DateTime<Utc>) -> Option<Grant> {
        let grant = self.grants.read().await.get(token).cloned()?;
        if now < grant.expires_at {
            return Some(grant);
        }
        self.grants.write().await.remove(token);
        None
    }

    pub async fn revoke(&self, token: &str) -> bool {
        self.grants.write().await.remove(token).is_some()
    }

    pub async fn stored_grants(&self) -> usize {
        self.grants.read().await.len()
    }
}

/// Caller resolved from `Authorization: Bearer <token>`.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub email: String,
    pub role: Role,
    pub token: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| unauthenticated("Missing Authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| unauthenticated("Expected: Bearer <token>"))?;

        let grant = state
            .tokens
            .resolve(token, Utc::now())
            .await
            .ok_or_else(|| unauthenticated("Invalid or expired token"))?;

        Ok(AuthUser { email: grant.email, role: grant.role, token: token.to_owned() })
    }
}

fn unauthenticated(message: &str) -> ApiError {
    ApiError::from(ApplicationError::Unauthenticated(message.to_owned()))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use reqflow_core::domain::user::Role;

    use super::TokenRegistry;

    #[tokio::test]
    async fn tokens_resolve_until_expiry_or_revocation() {
        let registry = TokenRegistry::default();
        let now = Utc::now();
        let (token, grant) =
            registry.issue("approver@demo.com", Role::Approver, Duration::minutes(5), now).await;

        assert_eq!(registry.resolve(&token, now).await, Some(grant));
        assert_eq!(registry.resolve(&token, now + Duration::minutes(6)).await, None);
        assert_eq!(registry.resolve(&token, now).await, None, "expired tokens are dropped");

        let (token, _) =
            registry.issue("approver@demo.com", Role::Approver, Duration::minutes(5), now).await;
        assert!(registry.revoke(&token).await);
        assert!(!registry.revoke(&token).await);
        assert_eq!(registry.resolve(&token, now).await, None);
    }

    #[tokio::test]
    async fn issuing_sweeps_grants_that_were_never_presented_again() {
        let registry = TokenRegistry::default();
        let now = Utc::now();
        for _ in 0..3 {
            registry.issue("approver@demo.com", Role::Approver, Duration::minutes(5), now).await;
        }
        assert_eq!(registry.stored_grants().await, 3);

        let later = now + Duration::minutes(10);
        let (token, _) =
            registry.issue("validator@demo.com", Role::Validator, Duration::minutes(5), later).await;
        assert_eq!(registry.stored_grants().await, 1);
        assert!(registry.resolve(&token, later).await.is_some());
    }
}
