//! Access ledger — append-only (requester, patient) grants.
//!
//! A grant row existing for the exact pair is the sole access predicate.
//! Grants are never revoked or expired; self-access bypasses the ledger
//! entirely and is enforced by the session subsystem.

use medgate_core::models::Patient;
use medgate_core::MedgateError;
use sqlx::PgPool;
use uuid::Uuid;

/// Present-time existence check: at least one grant row for the pair.
pub async fn has_access(
    pool: &PgPool,
    requester_id: Uuid,
    patient_id: Uuid,
) -> Result<bool, MedgateError> {
    let row: (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM access_grants WHERE requester_id = $1 AND patient_id = $2)",
    )
    .bind(requester_id)
    .bind(patient_id)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

/// Append a grant row. Duplicates are allowed: each successful verification
/// adds one.
pub async fn record_grant(
    pool: &PgPool,
    requester_id: Uuid,
    patient_id: Uuid,
) -> Result<(), MedgateError> {
    sqlx::query(
        "INSERT INTO access_grants (id, requester_id, patient_id) VALUES ($1, $2, $3)",
    )
    .bind(Uuid::new_v4())
    .bind(requester_id)
    .bind(patient_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_patient(pool: &PgPool, patient_id: Uuid) -> Result<Patient, MedgateError> {
    sqlx::query_as::<_, Patient>(
        "SELECT id, user_id, national_code, phone_number, created_at FROM patients WHERE id = $1",
    )
    .bind(patient_id)
    .fetch_optional(pool)
    .await?
    .ok_or(MedgateError::NotFound("patient"))
}

pub async fn find_patient_by_national_code(
    pool: &PgPool,
    national_code: &str,
) -> Result<Patient, MedgateError> {
    sqlx::query_as::<_, Patient>(
        "SELECT id, user_id, national_code, phone_number, created_at FROM patients WHERE national_code = $1",
    )
    .bind(national_code)
    .fetch_optional(pool)
    .await?
    .ok_or(MedgateError::NotFound("patient"))
}
