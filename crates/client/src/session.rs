//! Session state: created once at login, persisted between invocations, torn
//! down at logout.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use reqflow_core::domain::user::Role;
use reqflow_core::wire::LoginResponse;

use crate::backend::{Backend, BackendError, Credentials};

#[derive(Clone, Debug)]
pub struct SessionContext {
    pub email: String,
    pub role: Role,
    pub token: SecretString,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionContext {
    pub fn from_grant(grant: LoginResponse, issued_at: DateTime<Utc>) -> Self {
        Self {
            email: grant.email,
            role: grant.role,
            token: SecretString::from(grant.token),
            issued_at,
            expires_at: grant.expires_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no active session; run `reqflow login` first")]
    Missing,
    #[error("session for {email} expired at {expired_at}; log in again")]
    Expired { email: String, expired_at: DateTime<Utc> },
    #[error("session store `{path}` could not be accessed: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("session store `{path}` is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// On-disk shape. The token is only exposed at this boundary.
#[derive(Serialize, Deserialize)]
struct StoredSession {
    email: String,
    role: Role,
    token: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<SessionContext>, SessionError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(SessionError::Io { path: self.path.clone(), source }),
        };

        let stored: StoredSession = serde_json::from_str(&raw).map_err(|error| {
            SessionError::Corrupt { path: self.path.clone(), message: error.to_string() }
        })?;
        Ok(Some(SessionContext {
            email: stored.email,
            role: stored.role,
            token: SecretString::from(stored.token),
            issued_at: stored.issued_at,
            expires_at: stored.expires_at,
        }))
    }

    pub fn save(&self, session: &SessionContext) -> Result<(), SessionError> {
        let io_error = |source| SessionError::Io { path: self.path.clone(), source };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let stored = StoredSession {
            email: session.email.clone(),
            role: session.role,
            token: session.token.expose_secret().to_owned(),
            issued_at: session.issued_at,
            expires_at: session.expires_at,
        };
        let json = serde_json::to_string_pretty(&stored).map_err(|error| {
            SessionError::Corrupt { path: self.path.clone(), message: error.to_string() }
        })?;
        write_owner_only(&self.path, json.as_bytes()).map_err(io_error)
    }

    /// The single check every authenticated command runs before touching the backend.
    pub fn require_active(&self, now: DateTime<Utc>) -> Result<SessionContext, SessionError> {
        let session = self.load()?.ok_or(SessionError::Missing)?;
        if session.is_expired(now) {
            return Err(SessionError::Expired {
                email: session.email,
                expired_at: session.expires_at,
            });
        }
        Ok(session)
    }

    pub fn clear(&self) -> Result<bool, SessionError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(SessionError::Io { path: self.path.clone(), source }),
        }
    }
}

/// Exchanges credentials for a token and persists the resulting session.
pub async fn login<B>(
    backend: &B,
    credentials: &Credentials,
    store: &SessionStore,
) -> Result<SessionContext, SessionError>
where
    B: Backend + ?Sized,
{
    let grant = backend.login(credentials).await?;
    let session = SessionContext::from_grant(grant, Utc::now());
    store.save(&session)?;
    info!(
        event_name = "session.login.succeeded",
        email = %session.email,
        role = %session.role,
        expires_at = %session.expires_at,
        "session established"
    );
    Ok(session)
}

/// Revokes the token on the backend when possible and always clears the local store.
pub async fn logout<B>(backend: &B, store: &SessionStore) -> Result<bool, SessionError>
where
    B: Backend + ?Sized,
{
    if let Err(error) = backend.logout().await {
        warn!(
            event_name = "session.logout.revoke_failed",
            error = %error,
            "token revocation failed; clearing local session anyway"
        );
    }
    let cleared = store.clear()?;
    info!(event_name = "session.logout.completed", cleared, "session cleared");
    Ok(cleared)
}

/// The file holds a bearer token, so on unix it is readable by its owner only,
/// including when an older, wider-mode file is overwritten.
fn write_owner_only(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(contents)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use secrecy::{ExposeSecret, SecretString};
    use tempfile::TempDir;

    use reqflow_core::domain::user::Role;

    use super::{SessionContext, SessionError, SessionStore};

    fn session(expires_in: Duration) -> SessionContext {
        let now = Utc::now();
        SessionContext {
            email: "approver@demo.com".to_owned(),
            role: Role::Approver,
            token: SecretString::from("tok-123".to_owned()),
            issued_at: now,
            expires_at: now + expires_in,
        }
    }

    #[test]
    fn missing_store_requires_login() {
        let dir = TempDir::new().expect("tempdir");
        let store = SessionStore::new(dir.path().join("session.json"));

        assert!(matches!(store.require_active(Utc::now()), Err(SessionError::Missing)));
        assert!(!store.clear().expect("clear"));
    }

    #[test]
    fn saved_session_round_trips_and_clears() {
        let dir = TempDir::new().expect("tempdir");
        let store = SessionStore::new(dir.path().join("nested").join("session.json"));
        store.save(&session(Duration::hours(1))).expect("save");

        let active = store.require_active(Utc::now()).expect("active");
        assert_eq!(active.email, "approver@demo.com");
        assert_eq!(active.role, Role::Approver);
        assert_eq!(active.token.expose_secret(), "tok-123");

        assert!(store.clear().expect("clear"));
        assert!(matches!(store.require_active(Utc::now()), Err(SessionError::Missing)));
    }

    #[test]
    fn expired_session_is_refused() {
        let dir = TempDir::new().expect("tempdir");
        let store = SessionStore::new(dir.path().join("session.json"));
        store.save(&session(Duration::minutes(5))).expect("save");

        let later = Utc::now() + Duration::minutes(10);
        assert!(matches!(store.require_active(later), Err(SessionError::Expired { .. })));
    }

    #[test]
    fn token_is_redacted_in_debug_output() {
        let rendered = format!("{:?}", session(Duration::hours(1)));
        assert!(!rendered.contains("tok-123"));
    }

    #[test]
    fn corrupt_store_is_reported() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").expect("write");

        assert!(matches!(SessionStore::new(path).load(), Err(SessionError::Corrupt { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn stored_token_is_readable_by_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{}").expect("write");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).expect("chmod");

        SessionStore::new(&path).save(&session(Duration::hours(1))).expect("save");

        let mode = std::fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
