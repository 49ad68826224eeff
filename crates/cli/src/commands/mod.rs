pub mod act;
pub mod config;
pub mod doctor;
pub mod migrate;
pub mod queue;
pub mod request;
pub mod seed;
pub mod session;

use reqflow_client::BackendError;
use reqflow_core::config::{AppConfig, LoadOptions};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with(command, message, None)
    }

    pub fn success_with(command: &str, message: impl Into<String>, data: Option<Value>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Puts human-readable text above the JSON payload, which stays the last line.
    pub fn with_preamble(mut self, text: &str) -> Self {
        let text = text.trim_end();
        if !text.is_empty() {
            self.output = format!("{text}\n{}", self.output);
        }
        self
    }

    /// The JSON outcome, always on the last line of the output.
    pub fn payload(&self) -> &str {
        self.output.lines().last().unwrap_or_default()
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn load_config(command: &str) -> Result<AppConfig, CommandResult> {
    AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })
}

pub(crate) fn runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

pub(crate) fn invalid_input(command: &str, message: impl Into<String>) -> CommandResult {
    CommandResult::failure(command, "invalid_input", message, 6)
}

/// Maps a backend answer onto an error class and exit code.
pub(crate) fn backend_failure(command: &str, error: &BackendError) -> CommandResult {
    let (error_class, exit_code) = match error {
        BackendError::Unauthorized(_) => ("unauthorized", 4),
        BackendError::Status { status: 400, .. } => ("invalid_input", 6),
        BackendError::Status { status: 403 | 404, .. } => ("not_permitted", 7),
        BackendError::Status { status: 409, .. } => ("conflict", 8),
        BackendError::Status { .. } | BackendError::Transport(_) | BackendError::Decode(_) => {
            ("backend_unavailable", 5)
        }
    };
    CommandResult::failure(command, error_class, error.to_string(), exit_code)
}

#[cfg(test)]
mod tests {
    use reqflow_client::BackendError;
    use serde_json::{json, Value};

    use super::{backend_failure, CommandResult};

    #[test]
    fn preamble_keeps_the_payload_on_the_last_line() {
        let result = CommandResult::success_with("queue", "2 requests", Some(json!({"count": 2})))
            .with_preamble("Approve Requests\nID  Plant\n");

        let payload: Value = serde_json::from_str(result.payload()).expect("json payload");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["data"]["count"], 2);
        assert!(result.output.starts_with("Approve Requests"));
    }

    #[test]
    fn conflicts_and_auth_failures_have_distinct_exit_codes() {
        let conflict = backend_failure(
            "act",
            &BackendError::Status { status: 409, message: "not pending".to_owned() },
        );
        let unauthorized = backend_failure("act", &BackendError::Unauthorized("expired".into()));
        let offline = backend_failure("act", &BackendError::Transport("refused".into()));

        assert_eq!(conflict.exit_code, 8);
        assert_eq!(unauthorized.exit_code, 4);
        assert_eq!(offline.exit_code, 5);
        let payload: Value = serde_json::from_str(conflict.payload()).expect("json payload");
        assert_eq!(payload["error_class"], "conflict");
    }
}
