//! REST surface of the reference backend.
//!
//! - `POST /login/`, `POST /logout/`
//! - `GET  <queue path>?function=` for each queue kind
//! - `POST <pending queue path>{id}/action/`
//! - `GET | PUT /api/requests/{id}/`
//! - `POST /api/create-requests/`

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use reqflow_core::actions::ActionRequest;
use reqflow_core::audit::AuditContext;
use reqflow_core::domain::function::FunctionFilter;
use reqflow_core::domain::queue::{is_visible, QueueKind};
use reqflow_core::domain::request::{Request, RequestId, RequestStatus};
use reqflow_core::errors::ApplicationError;
use reqflow_core::flows::{definition, LifecycleEngine};
use reqflow_core::forms::FormSchema;
use reqflow_core::wire::{CreateRequestBody, LoginBody, LoginResponse, ReplaceFieldsBody};
use reqflow_db::password::{verify_decoy, verify_password};
use reqflow_db::repositories::{NewRequest, RequestQuery};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub const REMARKS_REQUIRED: &str = "Remarks required";

#[derive(Debug, Default, Deserialize)]
pub struct FilterQuery {
    pub function: Option<String>,
}

pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/login/", post(login))
        .route("/logout/", post(logout))
        .route("/api/requests/{id}/", get(fetch_request).put(replace_request))
        .route("/api/create-requests/", post(create_request));

    for queue in QueueKind::ALL {
        router = router.route(
            queue.path(),
            get(move |state: State<AppState>, user: AuthUser, query: Query<FilterQuery>| {
                list_queue(queue, state, user, query)
            }),
        );
        if queue.is_actionable() {
            let action_path = format!("{}{{id}}/action/", queue.path());
            router = router.route(
                &action_path,
                post(
                    move |state: State<AppState>,
                          user: AuthUser,
                          id: Path<i64>,
                          body: Json<ActionRequest>| {
                        submit_action(queue, state, user, id, body)
                    },
                ),
            );
        }
    }

    router.with_state(state)
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> ApiResult<Json<LoginResponse>> {
    let invalid = || ApiError::from(ApplicationError::Unauthenticated("Invalid credentials".into()));

    let Some(account) = state.users.find_by_email(body.email.trim()).await? else {
        verify_decoy(&body.password);
        warn!(event_name = "api.login.rejected", "login rejected for unknown account");
        return Err(invalid());
    };
    let verified = verify_password(&body.password, &account.password_hash).unwrap_or(false);
    if !account.active || !verified {
        warn!(event_name = "api.login.rejected", email = %account.email, "login rejected");
        return Err(invalid());
    }

    let (token, grant) =
        state.tokens.issue(&account.email, account.role, state.token_ttl, Utc::now()).await;
    info!(
        event_name = "api.login.succeeded",
        email = %grant.email,
        role = %grant.role,
        "session token issued"
    );
    Ok(Json(LoginResponse {
        token,
        email: grant.email,
        role: grant.role,
        expires_at: grant.expires_at,
    }))
}

async fn logout(State(state): State<AppState>, user: AuthUser) -> StatusCode {
    state.tokens.revoke(&user.token).await;
    info!(event_name = "api.logout.succeeded", email = %user.email, "session token revoked");
    StatusCode::NO_CONTENT
}

async fn list_queue(
    queue: QueueKind,
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<FilterQuery>,
) -> ApiResult<Json<Vec<Request>>> {
    if !user.role.can_read(queue) {
        return Err(role_required(queue));
    }
    let filter = query.function.as_deref().unwrap_or("").parse::<FunctionFilter>()?;

    let requests =
        state.requests.list(&RequestQuery::for_queue(queue, &user.email, filter)).await?;
    Ok(Json(requests))
}

async fn submit_action(
    queue: QueueKind,
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<ActionRequest>,
) -> ApiResult<Json<Request>> {
    let Some(stage) = queue.stage() else {
        return Err(ApiError::forbidden(format!("{queue} is a read-only view")));
    };
    if !user.role.can_read(queue) {
        return Err(role_required(queue));
    }
    let action = ActionRequest::new(body.action, body.remarks.as_deref())
        .map_err(|_| ApiError::BadRequest(REMARKS_REQUIRED.to_owned()))?;

    let id = RequestId(id);
    let mut request =
        state.requests.find_by_id(id).await?.ok_or_else(|| ApiError::not_found(format!("request {id}")))?;
    let expected = request.status;

    let audit = AuditContext::for_actor(&user.email).with_request(id);
    let outcome = LifecycleEngine::new(definition(stage)).apply_with_audit(
        &expected,
        &action.action,
        state.audit.as_ref(),
        &audit,
    )?;
    request.apply_transition(&outcome, &user.email, action.remarks.as_deref(), Utc::now())?;

    if !state.requests.update_if_status(&request, expected).await? {
        return Err(ApiError::conflict(format!("request {id} was decided by someone else")));
    }

    info!(
        event_name = "api.action.applied",
        correlation_id = %audit.correlation_id,
        request_id = %id,
        queue = %queue,
        action = %outcome.action,
        from = %outcome.from,
        to = %outcome.to,
        actor = %user.email,
        "transition applied"
    );
    Ok(Json(request))
}

async fn fetch_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Request>> {
    let id = RequestId(id);
    let request =
        state.requests.find_by_id(id).await?.ok_or_else(|| ApiError::not_found(format!("request {id}")))?;
    if !is_visible(&request, &user.email, user.role) {
        return Err(ApiError::forbidden(format!("request {id} is not visible to you")));
    }
    Ok(Json(request))
}

async fn replace_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<ReplaceFieldsBody>,
) -> ApiResult<Json<Request>> {
    let id = RequestId(id);
    let mut request =
        state.requests.find_by_id(id).await?.ok_or_else(|| ApiError::not_found(format!("request {id}")))?;
    if !request.owner.eq_ignore_ascii_case(&user.email) {
        return Err(ApiError::forbidden("only the owner can resubmit a request"));
    }

    let fields = FormSchema::for_function(request.function)?.validate(&body.fields)?;
    request.resubmit(fields, Utc::now())?;

    if !state.requests.update_if_status(&request, RequestStatus::ReturnedForCorrection).await? {
        return Err(ApiError::conflict(format!("request {id} is no longer returned")));
    }

    info!(
        event_name = "api.request.resubmitted",
        request_id = %id,
        owner = %user.email,
        "request resubmitted in place"
    );
    Ok(Json(request))
}

async fn create_request(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateRequestBody>,
) -> ApiResult<(StatusCode, Json<Request>)> {
    let fields = FormSchema::for_function(body.function)?.validate(&body.fields)?;
    let request = state
        .requests
        .insert(NewRequest {
            function: body.function,
            owner: user.email.clone(),
            fields,
            submitted_at: Utc::now(),
        })
        .await?;

    info!(
        event_name = "api.request.created",
        request_id = %request.id,
        function = %request.function,
        owner = %user.email,
        "request created"
    );
    Ok((StatusCode::CREATED, Json(request)))
}

fn role_required(queue: QueueKind) -> ApiError {
    let role = queue.required_role().map_or("signed-in", |role| role.as_str());
    ApiError::forbidden(format!("{role} role required for {queue}"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request as HttpRequest, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use reqflow_core::audit::InMemoryAuditSink;
    use reqflow_db::fixtures::DEMO_PASSWORD;
    use reqflow_db::repositories::{InMemoryRequestRepository, InMemoryUserRepository};
    use reqflow_db::DemoSeedDataset;

    use super::router;
    use crate::state::AppState;

    async fn app() -> (Router, InMemoryAuditSink) {
        let requests = Arc::new(InMemoryRequestRepository::default());
        let users = Arc::new(InMemoryUserRepository::default());
        DemoSeedDataset::load_into(users.as_ref(), requests.as_ref()).await.expect("seed");
        let sink = InMemoryAuditSink::default();
        let state = AppState::new(requests, users, 3600).with_audit(Arc::new(sink.clone()));
        (router(state), sink)
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = HttpRequest::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    async fn login(app: &Router, email: &str) -> String {
        let (status, body) = call(
            app,
            Method::POST,
            "/login/",
            None,
            Some(json!({ "email": email, "password": DEMO_PASSWORD })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().expect("token").to_owned()
    }

    fn first_id(listing: &Value) -> i64 {
        listing[0]["id"].as_i64().expect("id")
    }

    #[tokio::test]
    async fn api_requires_a_bearer_token() {
        let (app, _) = app().await;
        let (status, body) = call(&app, Method::GET, "/api/my-requests/", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHORIZED");

        let (status, _) =
            call(&app, Method::GET, "/api/my-requests/", Some("not-a-token"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let (app, _) = app().await;
        let (status, body) = call(
            &app,
            Method::POST,
            "/login/",
            None,
            Some(json!({ "email": "approver@demo.com", "password": "nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid credentials");
    }

    #[tokio::test]
    async fn unknown_account_gets_the_same_rejection_as_a_wrong_password() {
        let (app, _) = app().await;
        let (status, body) = call(
            &app,
            Method::POST,
            "/login/",
            None,
            Some(json!({ "email": "nobody@demo.com", "password": "demo-password" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid credentials");
        assert_eq!(body["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn pending_queues_are_role_gated() {
        let (app, _) = app().await;
        let submitter = login(&app, "submitter@demo.com").await;
        let (status, body) =
            call(&app, Method::GET, "/api/approve-requests/", Some(&submitter), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "FORBIDDEN");

        let approver = login(&app, "approver@demo.com").await;
        let (status, body) =
            call(&app, Method::GET, "/api/approve-requests/", Some(&approver), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn function_filter_narrows_and_unknown_keys_are_rejected() {
        let (app, _) = app().await;
        let approver = login(&app, "approver@demo.com").await;

        let (_, vendors) = call(
            &app,
            Method::GET,
            "/api/approve-requests/?function=vendor-master",
            Some(&approver),
            None,
        )
        .await;
        assert_eq!(vendors.as_array().map(Vec::len), Some(1));

        let (_, all) =
            call(&app, Method::GET, "/api/approve-requests/?function=all", Some(&approver), None)
                .await;
        assert_eq!(all.as_array().map(Vec::len), Some(3));

        let (status, _) = call(
            &app,
            Method::GET,
            "/api/approve-requests/?function=coffee",
            Some(&approver),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn return_requires_remarks_and_records_the_reason() {
        let (app, sink) = app().await;
        let approver = login(&app, "approver@demo.com").await;
        let (_, pending) =
            call(&app, Method::GET, "/api/approve-requests/", Some(&approver), None).await;
        let id = first_id(&pending);
        let path = format!("/api/approve-requests/{id}/action/");

        let (status, body) = call(
            &app,
            Method::POST,
            &path,
            Some(&approver),
            Some(json!({ "action": "RETURN", "remarks": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Remarks required");

        let (status, body) = call(
            &app,
            Method::POST,
            &path,
            Some(&approver),
            Some(json!({ "action": "RETURN", "remarks": "fix field X" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "RETURNED_FOR_CORRECTION");
        assert_eq!(body["reason_for_return"], "fix field X");
        assert_eq!(body["approver"], "approver@demo.com");
        assert!(sink.event_types().contains(&"lifecycle.transition_applied".to_owned()));

        let (status, body) = call(
            &app,
            Method::POST,
            &path,
            Some(&approver),
            Some(json!({ "action": "APPROVE" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn validator_cannot_act_on_the_approval_queue() {
        let (app, _) = app().await;
        let validator = login(&app, "validator@demo.com").await;
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/approve-requests/1/action/",
            Some(&validator),
            Some(json!({ "action": "APPROVE" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn owner_resubmits_a_returned_request_in_place() {
        let (app, _) = app().await;
        let submitter = login(&app, "submitter@demo.com").await;
        let (_, mine) = call(&app, Method::GET, "/api/my-requests/", Some(&submitter), None).await;
        let returned = mine
            .as_array()
            .and_then(|rows| rows.iter().find(|row| row["status"] == "RETURNED_FOR_CORRECTION"))
            .cloned()
            .expect("seeded returned request");
        let id = returned["id"].as_i64().expect("id");
        let path = format!("/api/requests/{id}/");

        let mut fields = returned["fields"].clone();
        fields["hsn_code"] = json!("8302");
        let (status, body) =
            call(&app, Method::PUT, &path, Some(&submitter), Some(json!({ "fields": fields })))
                .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["id"], id);
        assert_eq!(body["status"], "SUBMITTED");
        assert_eq!(body["approver"], Value::Null);
        assert_eq!(body["fields"]["hsn_code"], "8302");

        let (status, _) =
            call(&app, Method::PUT, &path, Some(&submitter), Some(json!({ "fields": fields })))
                .await;
        assert_eq!(status, StatusCode::CONFLICT, "only returned requests can be resubmitted");

        let approver = login(&app, "approver@demo.com").await;
        let (status, _) =
            call(&app, Method::PUT, &path, Some(&approver), Some(json!({ "fields": fields })))
                .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn created_requests_enter_the_approval_queue() {
        let (app, _) = app().await;
        let submitter = login(&app, "submitter@demo.com").await;
        let body = json!({
            "function": "part-code-modification",
            "fields": {
                "plant": "BP04",
                "sap_part_code": "P-9",
                "new_material_description": "Nut M6",
                "receiving_plant": "BP04",
                "remarks": "New nut",
            }
        });
        let (status, created) =
            call(&app, Method::POST, "/api/create-requests/", Some(&submitter), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "SUBMITTED");
        assert_eq!(created["owner"], "submitter@demo.com");

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/create-requests/",
            Some(&submitter),
            Some(json!({ "function": "part-code-modification", "fields": { "plant": "ZZ" } })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let approver = login(&app, "approver@demo.com").await;
        let (_, pending) =
            call(&app, Method::GET, "/api/approve-requests/", Some(&approver), None).await;
        assert_eq!(first_id(&pending), created["id"].as_i64().expect("id"));
    }

    #[tokio::test]
    async fn logout_revokes_the_token() {
        let (app, _) = app().await;
        let token = login(&app, "validator@demo.com").await;
        let (status, _) = call(&app, Method::POST, "/logout/", Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) =
            call(&app, Method::GET, "/api/validation-requests/", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
