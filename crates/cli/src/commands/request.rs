use reqflow_client::{create_request, Backend, ResubmissionDraft, ResubmitError, SubmitError};
use reqflow_core::domain::function::RequestFunction;
use reqflow_core::domain::request::{Request, RequestFields, RequestId};

use crate::commands::session::signed_in;
use crate::commands::{backend_failure, invalid_input, load_config, runtime, CommandResult};

/// Splits `name=value` assignments. The value may itself contain `=`.
pub fn parse_assignments(assignments: &[String]) -> Result<Vec<(String, String)>, String> {
    assignments
        .iter()
        .map(|assignment| match assignment.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => {
                Ok((name.trim().to_owned(), value.to_owned()))
            }
            _ => Err(format!("expected `field=value`, got `{assignment}`")),
        })
        .collect()
}

pub fn run_show(id: &str) -> CommandResult {
    let id = match id.parse::<RequestId>() {
        Ok(id) => id,
        Err(error) => return invalid_input("show", error.to_string()),
    };
    let config = match load_config("show") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let (backend, _) = match signed_in("show", &config) {
        Ok(signed_in) => signed_in,
        Err(failure) => return failure,
    };
    let runtime = match runtime("show") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    match runtime.block_on(backend.fetch_request(id)) {
        Ok(request) => CommandResult::success_with(
            "show",
            format!("request {id} is {}", request.status),
            serde_json::to_value(&request).ok(),
        )
        .with_preamble(&render_detail(&request)),
        Err(error) => backend_failure("show", &error),
    }
}

pub fn run_resubmit(id: &str, assignments: &[String]) -> CommandResult {
    let id = match id.parse::<RequestId>() {
        Ok(id) => id,
        Err(error) => return invalid_input("resubmit", error.to_string()),
    };
    let assignments = match parse_assignments(assignments) {
        Ok(assignments) => assignments,
        Err(message) => return invalid_input("resubmit", message),
    };
    let config = match load_config("resubmit") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let (backend, session) = match signed_in("resubmit", &config) {
        Ok(signed_in) => signed_in,
        Err(failure) => return failure,
    };
    let runtime = match runtime("resubmit") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let request = backend.fetch_request(id).await?;
        let mut draft = ResubmissionDraft::open(&request, &session.email)?;
        for (name, value) in assignments {
            draft.set(&name, value)?;
        }
        draft.resubmit(&backend).await
    });

    match result {
        Ok(request) => CommandResult::success_with(
            "resubmit",
            format!("request {id} resubmitted for approval"),
            serde_json::to_value(&request).ok(),
        ),
        Err(ResubmitError::Backend(error)) => backend_failure("resubmit", &error),
        Err(error @ ResubmitError::Form(_)) => invalid_input("resubmit", error.to_string()),
        Err(error) => CommandResult::failure("resubmit", "not_resubmittable", error.to_string(), 7),
    }
}

pub fn run_submit(function: &str, assignments: &[String]) -> CommandResult {
    let function = match function.parse::<RequestFunction>() {
        Ok(function) => function,
        Err(error) => return invalid_input("submit", error.to_string()),
    };
    let fields: RequestFields = match parse_assignments(assignments) {
        Ok(assignments) => assignments.into_iter().collect(),
        Err(message) => return invalid_input("submit", message),
    };
    let config = match load_config("submit") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let (backend, _) = match signed_in("submit", &config) {
        Ok(signed_in) => signed_in,
        Err(failure) => return failure,
    };
    let runtime = match runtime("submit") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    match runtime.block_on(create_request(&backend, function, &fields)) {
        Ok(request) => CommandResult::success_with(
            "submit",
            format!("request {} submitted for approval", request.id),
            serde_json::to_value(&request).ok(),
        ),
        Err(SubmitError::Form(error)) => invalid_input("submit", error.to_string()),
        Err(SubmitError::Backend(error)) => backend_failure("submit", &error),
    }
}

fn render_detail(request: &Request) -> String {
    let mut lines = vec![
        format!("Request {} ({})", request.id, request.function.label()),
        format!("  status: {}", request.status),
        format!("  owner: {}", request.owner),
        format!("  submitted: {}", request.submission_date.format("%Y-%m-%d %H:%M")),
    ];
    if let Some(approver) = &request.approver {
        lines.push(format!("  approver: {approver}"));
    }
    if let Some(validator) = &request.validated_by {
        lines.push(format!("  validated by: {validator}"));
    }
    if let Some(reason) = &request.reason_for_return {
        lines.push(format!("  remarks: {reason}"));
    }
    lines.extend(request.fields.iter().map(|(name, value)| format!("  {name} = {value}")));
    lines.join("\n")
}
