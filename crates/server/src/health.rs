use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tracing::warn;

use reqflow_core::wire::HealthResponse;
use reqflow_db::DbPool;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&state.db_pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthResponse { status: "ready".to_owned(), database: "ready".to_owned() }),
        ),
        Err(error) => {
            warn!(event_name = "system.health.degraded", error = %error, "database check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded".to_owned(),
                    database: format!("query failed: {error}"),
                }),
            )
        }
    }
}
