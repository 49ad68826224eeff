use reqflow_client::{FetchOutcome, QueueView, TableView};
use reqflow_core::domain::function::FunctionFilter;
use reqflow_core::domain::queue::QueueKind;
use serde_json::json;

use crate::commands::session::signed_in;
use crate::commands::{invalid_input, load_config, runtime, CommandResult};

pub fn run(queue: &str, function: Option<&str>) -> CommandResult {
    let queue = match queue.parse::<QueueKind>() {
        Ok(queue) => queue,
        Err(error) => return invalid_input("queue", error.to_string()),
    };
    let filter = match function.unwrap_or_default().parse::<FunctionFilter>() {
        Ok(filter) => filter,
        Err(error) => return invalid_input("queue", error.to_string()),
    };

    let config = match load_config("queue") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let (backend, session) = match signed_in("queue", &config) {
        Ok(signed_in) => signed_in,
        Err(failure) => return failure,
    };
    let runtime = match runtime("queue") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let view = QueueView::new(backend, queue, session.email);
    match runtime.block_on(view.fetch(filter)) {
        FetchOutcome::Loaded { count } => {
            let requests = view.requests();
            let table = TableView::build(queue, &requests);
            let ids: Vec<i64> = requests.iter().map(|request| request.id.0).collect();
            CommandResult::success_with(
                "queue",
                format!("{count} request(s) in {}", queue.title()),
                Some(json!({
                    "queue": queue.key(),
                    "function": filter.to_string(),
                    "count": count,
                    "ids": ids,
                })),
            )
            .with_preamble(&table.render())
        }
        FetchOutcome::Failed { reason } => CommandResult::failure(
            "queue",
            "backend_unavailable",
            format!("could not load {}: {reason}", queue.title()),
            5,
        ),
        FetchOutcome::DiscardedStale => CommandResult::failure(
            "queue",
            "stale_response",
            "listing was superseded by a newer fetch",
            5,
        ),
    }
}
