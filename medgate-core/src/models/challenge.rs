use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::otp;

/// An issued OTP challenge. Only the SHA-256 digest of the code is stored;
/// rows are append-only and superseded by newer challenges for the same
/// patient rather than mutated.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OtpChallenge {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub code_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl OtpChallenge {
    /// True iff the candidate hashes to the stored digest and the challenge
    /// has not expired at `now`.
    pub fn accepts(&self, candidate: &str, now: DateTime<Utc>) -> bool {
        now < self.expires_at && otp::hash_code(candidate) == self.code_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn challenge_for(code: &str, ttl_minutes: i64) -> (OtpChallenge, DateTime<Utc>) {
        let now = Utc::now();
        let challenge = OtpChallenge {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            code_hash: otp::hash_code(code),
            created_at: now,
            expires_at: now + Duration::minutes(ttl_minutes),
        };
        (challenge, now)
    }

    #[test]
    fn accepts_matching_code_before_expiry() {
        let (challenge, now) = challenge_for("123456", 10);
        assert!(challenge.accepts("123456", now));
    }

    #[test]
    fn rejects_wrong_code() {
        let (challenge, now) = challenge_for("123456", 10);
        assert!(!challenge.accepts("000000", now));
    }

    #[test]
    fn rejects_expired_code() {
        let (challenge, now) = challenge_for("123456", 10);
        let later = now + Duration::minutes(11);
        assert!(!challenge.accepts("123456", later));
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let (challenge, now) = challenge_for("123456", 10);
        let at_expiry = now + Duration::minutes(10);
        assert!(!challenge.accepts("123456", at_expiry));
    }
}
