use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An access grant: the requester may read the patient's data. Append-only;
/// each successful OTP verification adds a row, and rows are never revoked.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccessGrant {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub patient_id: Uuid,
    pub granted_at: DateTime<Utc>,
}
