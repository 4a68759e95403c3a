use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A patient record. `user_id` is the identity the patient authenticates
/// with; a requester whose id equals it is the patient acting on themself.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Patient {
    pub id: Uuid,
    pub user_id: Uuid,
    pub national_code: String,
    pub phone_number: String,
    pub created_at: DateTime<Utc>,
}
