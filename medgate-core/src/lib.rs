pub mod collaborators;
pub mod config;
pub mod db;
pub mod error;
pub mod ipc;
pub mod models;
pub mod otp;
pub mod sms;
pub mod talkbot;

pub use collaborators::{
    Assistant, CollaboratorError, Moderator, Notifier, Summarizer, TranscriptEntry,
};
pub use config::MedgateConfig;
pub use error::MedgateError;
pub use sms::KavenegarClient;
pub use talkbot::{TalkbotClient, TalkbotClientConfig};
