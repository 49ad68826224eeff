//! Reference backend for the request lifecycle: REST routes over the sqlite store.

pub mod api;
pub mod auth;
pub mod bootstrap;
pub mod error;
pub mod health;
pub mod state;

use std::future::{Future, IntoFuture};
use std::time::Duration;

use axum::Router;
use reqflow_db::DbPool;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub use bootstrap::{bootstrap, bootstrap_with_config, Application, BootstrapError};
pub use state::AppState;

/// Lifecycle routes plus `/health`.
pub fn router(state: AppState, db_pool: DbPool) -> Router {
    api::router(state).merge(health::router(db_pool))
}

/// Serves `router` until `shutdown` resolves, then drains in-flight requests
/// for at most `grace`.
pub async fn serve<F>(
    listener: TcpListener,
    router: Router,
    shutdown: F,
    grace: Duration,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = listener.local_addr()?;
    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "reference backend listening"
    );

    let (drain_tx, drain_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        shutdown.await;
        info!(
            event_name = "system.server.stopping",
            correlation_id = "shutdown",
            "draining in-flight requests"
        );
        let _ = drain_tx.send(());
    });

    let drained = async move {
        if drain_rx.await.is_ok() {
            tokio::time::sleep(grace).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = server.into_future() => result,
        () = drained => {
            warn!(
                event_name = "system.server.drain_timeout",
                correlation_id = "shutdown",
                grace_secs = grace.as_secs(),
                "graceful shutdown timed out"
            );
            Ok(())
        }
    }
}
