use medgate_core::ipc::{MedgateRequest, MedgateResponse};
use medgate_core::MedgateError;

use crate::state::AppContext;
use crate::subsystems::{messages, otp, sessions, summarize};

pub async fn handle_request(request: MedgateRequest, ctx: &AppContext) -> MedgateResponse {
    match request {
        MedgateRequest::Ping => MedgateResponse::pong(),
        MedgateRequest::Health => match medgate_core::db::health_check(&ctx.pool).await {
            Ok(pg_ver) => MedgateResponse::ok(serde_json::json!({
                "postgresql": pg_ver,
                "status": "healthy"
            })),
            Err(e) => MedgateResponse::err(format!("DB Health Check failed: {}", e)),
        },
        MedgateRequest::RequestOtp {
            requester_id,
            national_code,
        } => {
            tracing::debug!(requester_id = %requester_id, "OTP requested");
            match otp::request_otp(
                &ctx.pool,
                &ctx.config,
                ctx.collaborators.notifier.as_ref(),
                &national_code,
            )
            .await
            {
                Ok(issued) => MedgateResponse::ok(serde_json::json!({
                    "message": "otp_sent",
                    "patient_id": issued.patient_id,
                    "delivered": issued.delivered,
                    "expires_at": issued.expires_at,
                })),
                Err(e) => error_response(e),
            }
        }
        MedgateRequest::VerifyOtp {
            requester_id,
            national_code,
            code,
        } => match otp::verify_otp(&ctx.pool, requester_id, &national_code, &code).await {
            Ok(patient_id) => MedgateResponse::ok(serde_json::json!({
                "message": "access_granted",
                "patient_id": patient_id,
            })),
            Err(e) => error_response(e),
        },
        MedgateRequest::OpenSession {
            requester_id,
            patient_id,
            purpose,
        } => {
            match sessions::open_session(&ctx.pool, &ctx.config, requester_id, patient_id, purpose)
                .await
            {
                Ok(session) => MedgateResponse::ok(serde_json::json!({
                    "session_id": session.id,
                    "started_at": session.started_at,
                })),
                Err(e) => error_response(e),
            }
        }
        MedgateRequest::PostMessage {
            requester_id,
            session_id,
            content,
        } => {
            match messages::post_message(
                &ctx.pool,
                &ctx.config,
                ctx.collaborators.moderator.as_ref(),
                ctx.collaborators.assistant.as_ref(),
                &ctx.locks,
                session_id,
                requester_id,
                content,
            )
            .await
            {
                Ok(reply) => MedgateResponse::ok(serde_json::json!({
                    "assistant_reply": reply,
                })),
                Err(e) => error_response(e),
            }
        }
        MedgateRequest::CloseSession {
            requester_id,
            session_id,
        } => {
            match sessions::close_session(
                &ctx.pool,
                ctx.collaborators.summarizer.as_ref(),
                &ctx.locks,
                session_id,
                requester_id,
            )
            .await
            {
                Ok(summary) => MedgateResponse::ok(serde_json::json!({
                    "message": "session_closed",
                    "summary": summary,
                })),
                Err(e) => error_response(e),
            }
        }
        MedgateRequest::GetSessionSummary {
            requester_id,
            session_id,
        } => match summarize::get_session_summary(&ctx.pool, session_id, requester_id).await {
            Ok(summary) => match serde_json::to_value(&summary) {
                Ok(value) => MedgateResponse::ok(value),
                Err(e) => MedgateResponse::err(format!("Failed to serialize summary: {}", e)),
            },
            Err(e) => error_response(e),
        },
    }
}

fn error_response(e: MedgateError) -> MedgateResponse {
    MedgateResponse::err_kind(e.to_string(), e.kind())
}
