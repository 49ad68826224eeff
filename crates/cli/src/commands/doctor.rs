use std::time::Duration;

use chrono::Utc;
use reqflow_client::{SessionError, SessionStore};
use reqflow_core::config::{AppConfig, LoadOptions};
use reqflow_db::connect_with_config;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_session(&config));
            match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => {
                    checks.push(runtime.block_on(check_database_connectivity(&config)));
                    checks.push(runtime.block_on(check_backend_health(&config)));
                }
                Err(error) => {
                    for name in ["database_connectivity", "backend_health"] {
                        checks.push(DoctorCheck {
                            name,
                            status: CheckStatus::Fail,
                            details: format!("failed to initialize async runtime: {error}"),
                        });
                    }
                }
            }
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["session", "database_connectivity", "backend_health"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let any_failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_session(config: &AppConfig) -> DoctorCheck {
    let store = SessionStore::new(&config.session.store_path);
    match store.require_active(Utc::now()) {
        Ok(session) => DoctorCheck {
            name: "session",
            status: CheckStatus::Pass,
            details: format!("signed in as {} until {}", session.email, session.expires_at),
        },
        Err(error @ (SessionError::Missing | SessionError::Expired { .. })) => DoctorCheck {
            name: "session",
            status: CheckStatus::Skipped,
            details: error.to_string(),
        },
        Err(error) => {
            DoctorCheck { name: "session", status: CheckStatus::Fail, details: error.to_string() }
        }
    }
}

async fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    match connect_with_config(&config.database).await {
        Ok(pool) => {
            pool.close().await;
            DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Pass,
                details: format!("connected using `{}`", config.database.url),
            }
        }
        Err(error) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Fail,
            details: format!("failed to connect to database: {error}"),
        },
    }
}

async fn check_backend_health(config: &AppConfig) -> DoctorCheck {
    let url = format!("{}/health", config.backend.base_url.trim_end_matches('/'));
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(config.backend.timeout_secs))
        .build()
    {
        Ok(client) => client,
        Err(error) => {
            return DoctorCheck {
                name: "backend_health",
                status: CheckStatus::Fail,
                details: format!("failed to build HTTP client: {error}"),
            };
        }
    };

    match client.get(&url).send().await {
        Ok(response) if response.status().is_success() => DoctorCheck {
            name: "backend_health",
            status: CheckStatus::Pass,
            details: format!("`{url}` answered {}", response.status()),
        },
        Ok(response) => DoctorCheck {
            name: "backend_health",
            status: CheckStatus::Fail,
            details: format!("`{url}` answered {}", response.status()),
        },
        Err(error) => DoctorCheck {
            name: "backend_health",
            status: CheckStatus::Fail,
            details: format!("`{url}` unreachable: {error}"),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
