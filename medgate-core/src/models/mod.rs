pub mod access;
pub mod challenge;
pub mod message;
pub mod patient;
pub mod session;
pub mod summary;

pub use access::AccessGrant;
pub use challenge::OtpChallenge;
pub use message::{ChatMessage, MessageRole};
pub use patient::Patient;
pub use session::{ChatSession, SessionState};
pub use summary::SessionSummary;
