//! OTP challenge manager — issuance and verification.
//!
//! Challenges are append-only: issuing never invalidates earlier rows, but
//! verification only ever consults the newest challenge for the patient, so
//! older codes become unverifiable the moment a new one is issued.

use chrono::{DateTime, Duration, Utc};
use medgate_core::collaborators::Notifier;
use medgate_core::models::OtpChallenge;
use medgate_core::{otp, MedgateConfig, MedgateError};
use sqlx::PgPool;
use uuid::Uuid;

/// Result of issuing a challenge. The raw code is returned for out-of-band
/// delivery only and is never persisted.
#[derive(Debug)]
pub struct IssuedOtp {
    pub patient_id: Uuid,
    pub raw_code: String,
    pub expires_at: DateTime<Utc>,
    pub delivered: bool,
}

/// Issue a fresh challenge for the patient with the given national code and
/// dispatch the raw code over SMS. Delivery failure does not invalidate the
/// challenge — the code stays verifiable and the caller may resend.
pub async fn request_otp(
    pool: &PgPool,
    config: &MedgateConfig,
    notifier: &dyn Notifier,
    national_code: &str,
) -> Result<IssuedOtp, MedgateError> {
    let patient = super::access::find_patient_by_national_code(pool, national_code).await?;

    let raw_code = otp::generate_code(config.otp.code_length);
    let expires_at = Utc::now() + Duration::minutes(config.otp.ttl_minutes);

    sqlx::query(
        "INSERT INTO otp_challenges (id, patient_id, code_hash, expires_at) VALUES ($1, $2, $3, $4)",
    )
    .bind(Uuid::new_v4())
    .bind(patient.id)
    .bind(otp::hash_code(&raw_code))
    .bind(expires_at)
    .execute(pool)
    .await?;

    let text = config.otp.message_template.replace("{code}", &raw_code);
    let delivered = notifier.send(&patient.phone_number, &text).await;

    tracing::info!(
        patient_id = %patient.id,
        delivered,
        backend = notifier.name(),
        "Issued OTP challenge"
    );

    Ok(IssuedOtp {
        patient_id: patient.id,
        raw_code,
        expires_at,
        delivered,
    })
}

/// Verify a candidate code against the patient's newest challenge. On
/// success, appends an access grant for (requester, patient) and returns the
/// patient id. Failure is side-effect free: a wrong or expired code never
/// grants access, regardless of any grants the requester already holds.
pub async fn verify_otp(
    pool: &PgPool,
    requester_id: Uuid,
    national_code: &str,
    code: &str,
) -> Result<Uuid, MedgateError> {
    let patient = super::access::find_patient_by_national_code(pool, national_code).await?;

    let challenge = sqlx::query_as::<_, OtpChallenge>(
        "SELECT id, patient_id, code_hash, created_at, expires_at \
         FROM otp_challenges WHERE patient_id = $1 \
         ORDER BY created_at DESC LIMIT 1",
    )
    .bind(patient.id)
    .fetch_optional(pool)
    .await?
    .ok_or(MedgateError::NotFound("otp challenge"))?;

    if !challenge.accepts(code, Utc::now()) {
        tracing::info!(
            requester_id = %requester_id,
            patient_id = %patient.id,
            "OTP verification failed"
        );
        return Err(MedgateError::AccessDenied);
    }

    super::access::record_grant(pool, requester_id, patient.id).await?;

    tracing::info!(
        requester_id = %requester_id,
        patient_id = %patient.id,
        "OTP verified, access granted"
    );

    Ok(patient.id)
}
