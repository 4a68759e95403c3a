pub mod access;
pub mod messages;
pub mod otp;
pub mod sessions;
pub mod summarize;
