use std::io::{self, BufRead, Write};

use reqflow_client::{
    ActionError, ActionOutcome, ConfirmIntent, Confirmation, FetchOutcome, QueueView,
};
use reqflow_core::actions::{ActionRequest, MISSING_REMARKS_MESSAGE};
use reqflow_core::domain::function::FunctionFilter;
use reqflow_core::domain::queue::QueueKind;
use reqflow_core::domain::request::RequestId;
use reqflow_core::flows::ActionKind;
use serde_json::json;

use crate::commands::session::signed_in;
use crate::commands::{backend_failure, invalid_input, load_config, runtime, CommandResult};

/// Asks on stderr and reads the answer from stdin. Anything but `y`/`yes` cancels.
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalConfirm;

impl ConfirmIntent for TerminalConfirm {
    fn confirm(&self, prompt: &str) -> Confirmation {
        let mut stderr = io::stderr();
        if write!(stderr, "{prompt} [y/N] ").and_then(|()| stderr.flush()).is_err() {
            return Confirmation::Cancelled;
        }
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return Confirmation::Cancelled;
        }
        Confirmation::from(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
    }
}

pub fn run(
    queue: &str,
    id: &str,
    action: &str,
    remarks: Option<&str>,
    confirm: &dyn ConfirmIntent,
) -> CommandResult {
    let queue = match queue.parse::<QueueKind>() {
        Ok(queue) if queue.is_actionable() => queue,
        Ok(queue) => return invalid_input("act", format!("{queue} is a read-only view")),
        Err(error) => return invalid_input("act", error.to_string()),
    };
    let id = match id.parse::<RequestId>() {
        Ok(id) => id,
        Err(error) => return invalid_input("act", error.to_string()),
    };
    let action = match action.parse::<ActionKind>() {
        Ok(action) => action,
        Err(error) => return invalid_input("act", error.to_string()),
    };
    if ActionRequest::new(action, remarks).is_err() {
        return invalid_input("act", MISSING_REMARKS_MESSAGE);
    }

    let config = match load_config("act") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let (backend, session) = match signed_in("act", &config) {
        Ok(signed_in) => signed_in,
        Err(failure) => return failure,
    };
    let runtime = match runtime("act") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let view = QueueView::new(backend, queue, session.email);
    if let FetchOutcome::Failed { reason } = runtime.block_on(view.fetch(FunctionFilter::All)) {
        return CommandResult::failure(
            "act",
            "backend_unavailable",
            format!("could not load {}: {reason}", queue.title()),
            5,
        );
    }

    match runtime.block_on(view.confirm_and_submit(id, action, remarks, confirm)) {
        Ok(ActionOutcome::Applied(request)) => CommandResult::success_with(
            "act",
            format!("request {id} is now {}", request.status),
            serde_json::to_value(&request).ok(),
        ),
        Ok(ActionOutcome::Cancelled) => CommandResult::success_with(
            "act",
            "cancelled; nothing was sent",
            Some(json!({ "cancelled": true })),
        ),
        Err(ActionError::Backend(error)) => backend_failure("act", &error),
        Err(error @ ActionError::NotPending { .. }) => {
            CommandResult::failure("act", "not_pending", error.to_string(), 8)
        }
        Err(error) => CommandResult::failure("act", "action_rejected", error.to_string(), 6),
    }
}
