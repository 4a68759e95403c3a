//! Collaborator capability traits.
//!
//! The core never talks to a concrete moderation, assistant, summarization or
//! SMS backend directly — each is a trait object injected into the subsystems,
//! so tests can substitute deterministic fakes without touching the component
//! logic. Production wiring lives in `talkbot` and `sms`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::MedgateError;

/// Errors from collaborator transports. Converted into
/// `MedgateError::Upstream` at the component boundary.
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing API key")]
    MissingApiKey,

    #[error("All {attempts} retry attempts failed")]
    RetryExhausted { attempts: usize },

    #[error("Call timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

impl From<CollaboratorError> for MedgateError {
    fn from(e: CollaboratorError) -> Self {
        MedgateError::Upstream(e.to_string())
    }
}

/// One entry of a session transcript, ordered oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: String,
    pub content: String,
}

/// Screens message content for disallowed material.
#[async_trait]
pub trait Moderator: Send + Sync {
    /// Returns true iff the text is flagged.
    async fn check(&self, text: &str) -> Result<bool, CollaboratorError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Produces the automated reply to a requester message.
#[async_trait]
pub trait Assistant: Send + Sync {
    async fn reply(&self, message: &str) -> Result<String, CollaboratorError>;

    fn name(&self) -> &str;
}

/// Condenses a full transcript into a structured summary payload.
///
/// Returns the raw payload; the summarizer trigger is responsible for
/// tolerant extraction of `text_summary` / `token_count` and for degrading
/// gracefully when the structure is off.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        transcript: &[TranscriptEntry],
    ) -> Result<serde_json::Value, CollaboratorError>;

    fn name(&self) -> &str;
}

/// Delivers the OTP code out of band. Fail-soft: delivery failure returns
/// `false` and the already-created challenge stays verifiable.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, destination: &str, text: &str) -> bool;

    fn name(&self) -> &str;
}
