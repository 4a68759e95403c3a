//! Session state machine: Created (momentary) → Active → Ended.
//!
//! State is carried by `ended_at`; the transition to Ended is a conditional
//! UPDATE so that exactly one of two concurrent close calls wins.

use medgate_core::collaborators::Summarizer;
use medgate_core::models::{ChatSession, SessionSummary};
use medgate_core::{MedgateConfig, MedgateError};
use sqlx::PgPool;
use uuid::Uuid;

use crate::state::SessionLocks;

pub async fn load_session(pool: &PgPool, session_id: Uuid) -> Result<ChatSession, MedgateError> {
    sqlx::query_as::<_, ChatSession>(
        "SELECT id, owner_id, patient_id, purpose, started_at, ended_at \
         FROM chat_sessions WHERE id = $1",
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await?
    .ok_or(MedgateError::NotFound("session"))
}

/// Open a session. A patient acting on themself needs no grant; any other
/// requester must hold at least one access grant for the patient. With
/// `session.single_active` set, a second Active session for the same
/// (requester, patient) pair is rejected.
pub async fn open_session(
    pool: &PgPool,
    config: &MedgateConfig,
    requester_id: Uuid,
    patient_id: Uuid,
    purpose: Option<String>,
) -> Result<ChatSession, MedgateError> {
    let patient = super::access::find_patient(pool, patient_id).await?;

    let self_access = patient.user_id == requester_id;
    if !self_access && !super::access::has_access(pool, requester_id, patient.id).await? {
        return Err(MedgateError::AccessDenied);
    }

    if config.session.single_active {
        let (already_active,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM chat_sessions \
             WHERE owner_id = $1 AND patient_id = $2 AND ended_at IS NULL)",
        )
        .bind(requester_id)
        .bind(patient.id)
        .fetch_one(pool)
        .await?;

        if already_active {
            return Err(MedgateError::InvalidState(
                "an active session for this patient already exists".to_string(),
            ));
        }
    }

    let session = sqlx::query_as::<_, ChatSession>(
        "INSERT INTO chat_sessions (id, owner_id, patient_id, purpose) \
         VALUES ($1, $2, $3, $4) \
         RETURNING id, owner_id, patient_id, purpose, started_at, ended_at",
    )
    .bind(Uuid::new_v4())
    .bind(requester_id)
    .bind(patient.id)
    .bind(purpose)
    .fetch_one(pool)
    .await?;

    tracing::info!(
        session_id = %session.id,
        owner_id = %requester_id,
        patient_id = %patient.id,
        self_access,
        "Opened chat session"
    );

    Ok(session)
}

/// Close a session and synchronously produce its summary. Exactly-once: the
/// conditional UPDATE on `ended_at` makes the loser of a concurrent close
/// race fail with `InvalidState`. The summary is guaranteed to exist once
/// this returns Ok.
pub async fn close_session(
    pool: &PgPool,
    summarizer: &dyn Summarizer,
    locks: &SessionLocks,
    session_id: Uuid,
    caller_id: Uuid,
) -> Result<SessionSummary, MedgateError> {
    let session = load_session(pool, session_id).await?;
    if session.owner_id != caller_id {
        return Err(MedgateError::AccessDenied);
    }

    // Hold the session write lock so an in-flight post_message either
    // completes its message pair before the transition or observes Ended.
    let lock = locks.lock_for(session_id).await;
    let _guard = lock.lock().await;

    let updated = sqlx::query(
        "UPDATE chat_sessions SET ended_at = now() WHERE id = $1 AND ended_at IS NULL",
    )
    .bind(session_id)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(MedgateError::InvalidState(
            "session has already ended".to_string(),
        ));
    }

    let summary = super::summarize::summarize_session(pool, summarizer, session_id).await?;

    locks.release(session_id).await;

    tracing::info!(session_id = %session_id, "Closed and summarized session");

    Ok(summary)
}
