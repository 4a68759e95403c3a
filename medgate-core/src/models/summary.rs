use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The stored summary of an ended session. At most one row per session; the
/// unique constraint on `session_id` is what makes double summarization fail.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SessionSummary {
    pub id: Uuid,
    pub session_id: Uuid,
    pub text_summary: String,
    pub payload: serde_json::Value,
    pub tokens_used: i32,
    pub generated_at: DateTime<Utc>,
}
