use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MedgateRequest {
    Ping,
    Health,
    RequestOtp {
        requester_id: Uuid,
        national_code: String,
    },
    VerifyOtp {
        requester_id: Uuid,
        national_code: String,
        code: String,
    },
    OpenSession {
        requester_id: Uuid,
        patient_id: Uuid,
        purpose: Option<String>,
    },
    PostMessage {
        requester_id: Uuid,
        session_id: Uuid,
        content: String,
    },
    CloseSession {
        requester_id: Uuid,
        session_id: Uuid,
    },
    GetSessionSummary {
        requester_id: Uuid,
        session_id: Uuid,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MedgateResponse {
    pub status: String,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub error_kind: Option<String>,
    pub version: String,
}

impl MedgateResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            status: "ok".to_string(),
            data: Some(data),
            error: None,
            error_kind: None,
            version: "0.1.0".to_string(),
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(msg.into()),
            error_kind: None,
            version: "0.1.0".to_string(),
        }
    }

    pub fn err_kind(msg: impl Into<String>, kind: &'static str) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(msg.into()),
            error_kind: Some(kind.to_string()),
            version: "0.1.0".to_string(),
        }
    }

    pub fn pong() -> Self {
        Self::ok(serde_json::json!({"pong": true}))
    }
}
