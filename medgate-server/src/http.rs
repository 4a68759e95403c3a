//! Medgate HTTP REST API
//!
//! Axum-based HTTP server exposing the OTP and session operations. Runs
//! alongside the Unix socket IPC server when enabled.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to a
//! pure inner function. The inner functions are directly testable without
//! axum dispatch machinery.
//!
//! Endpoints:
//! - GET  /health                  — health check with DB status
//! - GET  /version                 — server version info
//! - POST /otp/request             — issue an OTP challenge for a patient
//! - POST /otp/verify              — verify a code, record an access grant
//! - POST /sessions                — open a chat session
//! - POST /sessions/:id/messages   — post a message, get the assistant reply
//! - POST /sessions/:id/close      — end the session and summarize it
//! - GET  /sessions/:id/summary    — fetch the stored summary

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use uuid::Uuid;

use medgate_core::MedgateError;

use crate::state::AppContext;
use crate::subsystems::{messages, otp, sessions, summarize};

/// Build the Axum router with all endpoints
pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/otp/request", post(request_otp_handler))
        .route("/otp/verify", post(verify_otp_handler))
        .route("/sessions", post(open_session_handler))
        .route("/sessions/:id/messages", post(post_message_handler))
        .route("/sessions/:id/close", post(close_session_handler))
        .route("/sessions/:id/summary", get(session_summary_handler))
        .with_state(ctx)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    ctx: Arc<AppContext>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", ctx.config.http.host, ctx.config.http.port);

    let app = build_router(ctx);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Medgate HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RequestOtpBody {
    pub requester_id: Uuid,
    pub national_code: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpBody {
    pub requester_id: Uuid,
    pub national_code: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct OpenSessionBody {
    pub requester_id: Uuid,
    pub patient_id: Uuid,
    pub purpose: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PostMessageBody {
    pub requester_id: Uuid,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct CloseSessionBody {
    pub requester_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub requester_id: Uuid,
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Map a domain error onto an HTTP status code.
pub fn status_for(error: &MedgateError) -> StatusCode {
    match error {
        MedgateError::AccessDenied => StatusCode::FORBIDDEN,
        MedgateError::NotFound(_) => StatusCode::NOT_FOUND,
        MedgateError::InvalidState(_) | MedgateError::AlreadySummarized => StatusCode::CONFLICT,
        MedgateError::Upstream(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_body(error: &MedgateError) -> serde_json::Value {
    serde_json::json!({
        "status": "error",
        "error": error.to_string(),
        "error_kind": error.kind(),
    })
}

/// Inner health check — queries DB and returns (status_code, json_body).
pub async fn health_inner(ctx: &AppContext) -> (StatusCode, serde_json::Value) {
    let pg_ver = match medgate_core::db::health_check(&ctx.pool).await {
        Ok(v) => v,
        Err(e) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                serde_json::json!({
                    "status": "unhealthy",
                    "error": e.to_string(),
                }),
            );
        }
    };

    (
        StatusCode::OK,
        serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "postgresql": pg_ver,
            "socket": ctx.config.service.socket_path,
        }),
    )
}

/// Inner version — returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "medgate/1",
    })
}

pub async fn request_otp_inner(
    ctx: &AppContext,
    body: RequestOtpBody,
) -> (StatusCode, serde_json::Value) {
    if body.national_code.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            serde_json::json!({
                "status": "error",
                "error": "national_code field is required",
            }),
        );
    }

    match otp::request_otp(
        &ctx.pool,
        &ctx.config,
        ctx.collaborators.notifier.as_ref(),
        &body.national_code,
    )
    .await
    {
        Ok(issued) => (
            StatusCode::OK,
            serde_json::json!({
                "message": "otp_sent",
                "patient_id": issued.patient_id,
                "delivered": issued.delivered,
                "expires_at": issued.expires_at,
            }),
        ),
        Err(e) => (status_for(&e), error_body(&e)),
    }
}

pub async fn verify_otp_inner(
    ctx: &AppContext,
    body: VerifyOtpBody,
) -> (StatusCode, serde_json::Value) {
    match otp::verify_otp(&ctx.pool, body.requester_id, &body.national_code, &body.code).await {
        Ok(patient_id) => (
            StatusCode::OK,
            serde_json::json!({
                "message": "access_granted",
                "patient_id": patient_id,
            }),
        ),
        Err(e) => (status_for(&e), error_body(&e)),
    }
}

pub async fn open_session_inner(
    ctx: &AppContext,
    body: OpenSessionBody,
) -> (StatusCode, serde_json::Value) {
    match sessions::open_session(
        &ctx.pool,
        &ctx.config,
        body.requester_id,
        body.patient_id,
        body.purpose,
    )
    .await
    {
        Ok(session) => (
            StatusCode::CREATED,
            serde_json::json!({
                "session_id": session.id,
                "started_at": session.started_at,
            }),
        ),
        Err(e) => (status_for(&e), error_body(&e)),
    }
}

pub async fn post_message_inner(
    ctx: &AppContext,
    session_id: Uuid,
    body: PostMessageBody,
) -> (StatusCode, serde_json::Value) {
    if body.content.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            serde_json::json!({
                "status": "error",
                "error": "content field is required",
            }),
        );
    }

    match messages::post_message(
        &ctx.pool,
        &ctx.config,
        ctx.collaborators.moderator.as_ref(),
        ctx.collaborators.assistant.as_ref(),
        &ctx.locks,
        session_id,
        body.requester_id,
        body.content,
    )
    .await
    {
        Ok(reply) => (
            StatusCode::OK,
            serde_json::json!({ "assistant_reply": reply }),
        ),
        Err(e) => (status_for(&e), error_body(&e)),
    }
}

pub async fn close_session_inner(
    ctx: &AppContext,
    session_id: Uuid,
    body: CloseSessionBody,
) -> (StatusCode, serde_json::Value) {
    match sessions::close_session(
        &ctx.pool,
        ctx.collaborators.summarizer.as_ref(),
        &ctx.locks,
        session_id,
        body.requester_id,
    )
    .await
    {
        Ok(summary) => (
            StatusCode::OK,
            serde_json::json!({
                "message": "session_closed",
                "summary": summary,
            }),
        ),
        Err(e) => (status_for(&e), error_body(&e)),
    }
}

pub async fn session_summary_inner(
    ctx: &AppContext,
    session_id: Uuid,
    requester_id: Uuid,
) -> (StatusCode, serde_json::Value) {
    match summarize::get_session_summary(&ctx.pool, session_id, requester_id).await {
        Ok(summary) => match serde_json::to_value(&summary) {
            Ok(value) => (StatusCode::OK, value),
            Err(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "status": "error", "error": e.to_string() }),
            ),
        },
        Err(e) => (status_for(&e), error_body(&e)),
    }
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    let (status, body) = health_inner(&ctx).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn request_otp_handler(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<RequestOtpBody>,
) -> impl IntoResponse {
    let (status, body) = request_otp_inner(&ctx, body).await;
    (status, Json(body))
}

pub async fn verify_otp_handler(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<VerifyOtpBody>,
) -> impl IntoResponse {
    let (status, body) = verify_otp_inner(&ctx, body).await;
    (status, Json(body))
}

pub async fn open_session_handler(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<OpenSessionBody>,
) -> impl IntoResponse {
    let (status, body) = open_session_inner(&ctx, body).await;
    (status, Json(body))
}

pub async fn post_message_handler(
    State(ctx): State<Arc<AppContext>>,
    Path(session_id): Path<Uuid>,
    Json(body): Json<PostMessageBody>,
) -> impl IntoResponse {
    let (status, body) = post_message_inner(&ctx, session_id, body).await;
    (status, Json(body))
}

pub async fn close_session_handler(
    State(ctx): State<Arc<AppContext>>,
    Path(session_id): Path<Uuid>,
    Json(body): Json<CloseSessionBody>,
) -> impl IntoResponse {
    let (status, body) = close_session_inner(&ctx, session_id, body).await;
    (status, Json(body))
}

pub async fn session_summary_handler(
    State(ctx): State<Arc<AppContext>>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<SummaryQuery>,
) -> impl IntoResponse {
    let (status, body) = session_summary_inner(&ctx, session_id, query.requester_id).await;
    (status, Json(body))
}

// ============================================================================
// Unit Tests — pure pieces only; DB-backed paths live in tests/
// ============================================================================
