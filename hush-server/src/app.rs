use crate::middleware::{HushState, log_exchange};
use axum::{
    Form, Json, Router,
    extract::Path,
    http::{HeaderMap, StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use bytes::Bytes;
use hush_core::ExchangeOverride;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Demo application. Every route is logged except the `/quiet` group, which
/// is mounted with logging switched off.
pub fn build_app(state: HushState) -> Router {
    let quiet = Router::new()
        .route("/quiet/ping", get(ping))
        .layer(middleware::from_fn_with_state(
            state.with_override(ExchangeOverride::disabled()),
            log_exchange,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/echo", post(echo))
        .route("/login", post(login))
        .route("/form", post(form))
        .route("/users/{id}", get(get_user))
        .route("/fail", get(fail))
        .layer(middleware::from_fn_with_state(state, log_exchange))
        .merge(quiet)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Returns the request body unchanged, with the same content type.
async fn echo(headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    ([(header::CONTENT_TYPE, content_type)], body)
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

async fn login(Json(body): Json<LoginRequest>) -> impl IntoResponse {
    if body.password.is_empty() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "password required" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "user": body.username,
            "token": uuid::Uuid::new_v4().to_string(),
        })),
    )
}

async fn form(Form(fields): Form<BTreeMap<String, String>>) -> Json<Value> {
    Json(json!({ "received": fields.keys().collect::<Vec<_>>() }))
}

async fn get_user(Path(id): Path<u64>) -> Json<Value> {
    Json(json!({ "id": id, "name": format!("user-{id}") }))
}

async fn fail() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "something broke")
}

async fn ping() -> &'static str {
    "pong"
}
