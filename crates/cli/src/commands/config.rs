use std::env;
use std::fs;
use std::path::Path;

use reqflow_core::config::{resolve_config_path, AppConfig};
use serde_json::{Map, Value as JsonValue};
use toml::Value;

use crate::commands::{load_config, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("config") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    let mut data = Map::new();
    for (key, value, env_key) in entries(&config) {
        let source =
            field_source(key, env_key, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(format!("- {key} = {value} (source: {source})"));
        data.insert(key.to_owned(), serde_json::json!({ "value": value, "source": source }));
    }

    CommandResult::success_with("config", "effective configuration", Some(JsonValue::Object(data)))
        .with_preamble(&lines.join("\n"))
}

fn entries(config: &AppConfig) -> Vec<(&'static str, String, &'static str)> {
    let api_token = if config.backend.api_token.is_some() { "<redacted>" } else { "<unset>" };
    vec![
        ("backend.base_url", config.backend.base_url.clone(), "REQFLOW_BACKEND_URL"),
        (
            "backend.timeout_secs",
            config.backend.timeout_secs.to_string(),
            "REQFLOW_BACKEND_TIMEOUT_SECS",
        ),
        ("backend.api_token", api_token.to_string(), "REQFLOW_BACKEND_TOKEN"),
        (
            "session.store_path",
            config.session.store_path.display().to_string(),
            "REQFLOW_SESSION_STORE_PATH",
        ),
        ("server.bind_address", config.server.bind_address.clone(), "REQFLOW_SERVER_BIND_ADDRESS"),
        ("server.port", config.server.port.to_string(), "REQFLOW_SERVER_PORT"),
        (
            "server.token_ttl_secs",
            config.server.token_ttl_secs.to_string(),
            "REQFLOW_SERVER_TOKEN_TTL_SECS",
        ),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            "REQFLOW_SERVER_GRACEFUL_SHUTDOWN_SECS",
        ),
        ("database.url", config.database.url.clone(), "REQFLOW_DATABASE_URL"),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            "REQFLOW_DATABASE_MAX_CONNECTIONS",
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            "REQFLOW_DATABASE_TIMEOUT_SECS",
        ),
        ("logging.level", config.logging.level.clone(), "REQFLOW_LOGGING_LEVEL"),
        ("logging.format", format!("{:?}", config.logging.format), "REQFLOW_LOGGING_FORMAT"),
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::{contains_path, field_source};

    #[test]
    fn file_values_are_attributed_to_the_file() {
        let doc: toml::Value = "[server]\nport = 9000\n".parse().expect("toml");
        assert!(contains_path(&doc, "server.port"));
        assert!(!contains_path(&doc, "server.bind_address"));

        let source = field_source(
            "server.port",
            "REQFLOW_TEST_UNSET_PORT",
            Some(&doc),
            Some(std::path::Path::new("reqflow.toml")),
        );
        assert_eq!(source, "file (reqflow.toml)");
        assert_eq!(
            field_source("server.bind_address", "REQFLOW_TEST_UNSET_BIND", Some(&doc), None),
            "default"
        );
    }
}
