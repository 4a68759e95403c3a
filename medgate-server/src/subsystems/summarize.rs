//! Summarizer trigger — runs once per session, from `close_session`.
//!
//! An empty transcript short-circuits to an empty summary without calling the
//! collaborator. A collaborator failure or a malformed payload degrades to a
//! placeholder summary rather than blocking close; the unique constraint on
//! `session_id` turns a second summarization attempt into `AlreadySummarized`.

use medgate_core::collaborators::{Summarizer, TranscriptEntry};
use medgate_core::models::SessionSummary;
use medgate_core::MedgateError;
use sqlx::PgPool;
use uuid::Uuid;

pub async fn summarize_session(
    pool: &PgPool,
    summarizer: &dyn Summarizer,
    session_id: Uuid,
) -> Result<SessionSummary, MedgateError> {
    let (exists,): (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM session_summaries WHERE session_id = $1)")
            .bind(session_id)
            .fetch_one(pool)
            .await?;
    if exists {
        return Err(MedgateError::AlreadySummarized);
    }

    let transcript: Vec<TranscriptEntry> = sqlx::query_as::<_, (String, String)>(
        "SELECT role, content FROM chat_messages WHERE session_id = $1 ORDER BY seq",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|(role, content)| TranscriptEntry { role, content })
    .collect();

    let (text_summary, payload, tokens_used) = if transcript.is_empty() {
        // Nothing to condense; skip the collaborator call entirely.
        (String::new(), serde_json::json!({}), 0)
    } else {
        match summarizer.summarize(&transcript).await {
            Ok(value) => extract_summary(value),
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    error = %e,
                    "Summarization degraded — storing placeholder summary"
                );
                degraded_summary(&e.to_string())
            }
        }
    };

    let summary = sqlx::query_as::<_, SessionSummary>(
        "INSERT INTO session_summaries (id, session_id, text_summary, payload, tokens_used) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING id, session_id, text_summary, payload, tokens_used, generated_at",
    )
    .bind(Uuid::new_v4())
    .bind(session_id)
    .bind(&text_summary)
    .bind(&payload)
    .bind(tokens_used)
    .fetch_one(pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => MedgateError::AlreadySummarized,
        _ => MedgateError::Database(e),
    })?;

    Ok(summary)
}

/// Pull `text_summary` and `token_count` out of the collaborator payload,
/// tolerating missing fields. The payload itself is preserved verbatim.
fn extract_summary(value: serde_json::Value) -> (String, serde_json::Value, i32) {
    let text = value
        .get("text_summary")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let tokens = value
        .get("token_count")
        .and_then(|v| v.as_i64())
        .unwrap_or(0) as i32;
    (text, value, tokens)
}

fn degraded_summary(error: &str) -> (String, serde_json::Value, i32) {
    (
        String::new(),
        serde_json::json!({ "degraded": true, "error": error }),
        0,
    )
}

/// Fetch a stored summary. Readable by the session owner, the patient
/// themself, or any requester holding a grant for the patient.
pub async fn get_session_summary(
    pool: &PgPool,
    session_id: Uuid,
    requester_id: Uuid,
) -> Result<SessionSummary, MedgateError> {
    let session = super::sessions::load_session(pool, session_id).await?;
    let patient = super::access::find_patient(pool, session.patient_id).await?;

    let allowed = session.owner_id == requester_id
        || patient.user_id == requester_id
        || super::access::has_access(pool, requester_id, patient.id).await?;
    if !allowed {
        return Err(MedgateError::AccessDenied);
    }

    sqlx::query_as::<_, SessionSummary>(
        "SELECT id, session_id, text_summary, payload, tokens_used, generated_at \
         FROM session_summaries WHERE session_id = $1",
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await?
    .ok_or(MedgateError::NotFound("session summary"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_reads_expected_fields_and_keeps_payload() {
        let value = serde_json::json!({
            "text_summary": "patient reported mild fever",
            "token_count": 87,
            "follow_up": ["hydration"]
        });
        let (text, payload, tokens) = extract_summary(value);
        assert_eq!(text, "patient reported mild fever");
        assert_eq!(tokens, 87);
        assert_eq!(payload["follow_up"][0], "hydration");
    }

    #[test]
    fn extract_tolerates_missing_fields() {
        let value = serde_json::json!({ "unexpected": true });
        let (text, payload, tokens) = extract_summary(value);
        assert!(text.is_empty());
        assert_eq!(tokens, 0);
        assert_eq!(payload["unexpected"], true);
    }

    #[test]
    fn extract_ignores_wrongly_typed_fields() {
        let value = serde_json::json!({ "text_summary": 5, "token_count": "many" });
        let (text, _payload, tokens) = extract_summary(value);
        assert!(text.is_empty());
        assert_eq!(tokens, 0);
    }

    #[test]
    fn degraded_summary_marks_failure() {
        let (text, payload, tokens) = degraded_summary("boom");
        assert!(text.is_empty());
        assert_eq!(tokens, 0);
        assert_eq!(payload["degraded"], true);
        assert_eq!(payload["error"], "boom");
    }
}
