use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Active,
    Ended,
}

/// A chat session between an owner-requester and a patient. State is carried
/// by `ended_at`: unset means Active, set means Ended (terminal).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatSession {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub patient_id: Uuid,
    pub purpose: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ChatSession {
    pub fn state(&self) -> SessionState {
        if self.ended_at.is_some() {
            SessionState::Ended
        } else {
            SessionState::Active
        }
    }

    pub fn is_ended(&self) -> bool {
        self.state() == SessionState::Ended
    }
}
