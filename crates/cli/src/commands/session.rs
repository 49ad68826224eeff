use chrono::Utc;
use reqflow_client::session::{login, logout};
use reqflow_client::{Credentials, HttpBackend, SessionContext, SessionError, SessionStore};
use reqflow_core::config::AppConfig;
use serde_json::json;

use crate::commands::{backend_failure, load_config, runtime, CommandResult};

pub fn run_login(email: &str, password: &str) -> CommandResult {
    let config = match load_config("login") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("login") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let backend = match HttpBackend::from_config(&config.backend) {
        Ok(backend) => backend,
        Err(error) => return backend_failure("login", &error),
    };
    let store = SessionStore::new(&config.session.store_path);
    let credentials = Credentials::new(email.trim(), password);

    match runtime.block_on(login(&backend, &credentials, &store)) {
        Ok(session) => CommandResult::success_with(
            "login",
            format!("signed in as {} ({})", session.email, session.role),
            Some(describe(&session)),
        ),
        Err(SessionError::Backend(error)) => backend_failure("login", &error),
        Err(error) => session_failure("login", &error),
    }
}

pub fn run_logout() -> CommandResult {
    let config = match load_config("logout") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let store = SessionStore::new(&config.session.store_path);
    let session = match store.load() {
        Ok(Some(session)) => session,
        Ok(None) => return CommandResult::success("logout", "no session to clear"),
        Err(error) => return session_failure("logout", &error),
    };
    let runtime = match runtime("logout") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };
    let backend = match HttpBackend::from_config(&config.backend) {
        Ok(backend) => backend.with_token(session.token.clone()),
        Err(error) => return backend_failure("logout", &error),
    };

    match runtime.block_on(logout(&backend, &store)) {
        Ok(_) => CommandResult::success("logout", format!("signed out {}", session.email)),
        Err(error) => session_failure("logout", &error),
    }
}

pub fn run_whoami() -> CommandResult {
    let config = match load_config("whoami") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    match SessionStore::new(&config.session.store_path).require_active(Utc::now()) {
        Ok(session) => CommandResult::success_with(
            "whoami",
            format!("{} ({})", session.email, session.role),
            Some(describe(&session)),
        ),
        Err(error) => session_failure("whoami", &error),
    }
}

/// Backend carrying the stored token, plus the session it came from.
pub(crate) fn signed_in(
    command: &str,
    config: &AppConfig,
) -> Result<(HttpBackend, SessionContext), CommandResult> {
    let session = SessionStore::new(&config.session.store_path)
        .require_active(Utc::now())
        .map_err(|error| session_failure(command, &error))?;
    let backend = HttpBackend::from_config(&config.backend)
        .map_err(|error| backend_failure(command, &error))?
        .with_token(session.token.clone());
    Ok((backend, session))
}

fn session_failure(command: &str, error: &SessionError) -> CommandResult {
    let error_class = match error {
        SessionError::Missing => "session_missing",
        SessionError::Expired { .. } => "session_expired",
        SessionError::Io { .. } | SessionError::Corrupt { .. } => "session_store",
        SessionError::Backend(error) => return backend_failure(command, error),
    };
    CommandResult::failure(command, error_class, error.to_string(), 4)
}

fn describe(session: &SessionContext) -> serde_json::Value {
    json!({
        "email": session.email,
        "role": session.role,
        "issued_at": session.issued_at,
        "expires_at": session.expires_at,
    })
}
