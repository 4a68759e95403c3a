//! medgate-cli — HTTP frontend for the Medgate chat service
//!
//! Exercises the REST API from the command line: request and verify OTP
//! codes, open sessions, post messages, close sessions, fetch summaries.
//!
//! # Subcommands
//! - `request-otp <national-code>`          — issue an OTP for a patient
//! - `verify-otp <national-code> <code>`    — verify a code, gain access
//! - `open <patient-id> [--purpose <text>]` — open a chat session
//! - `post <session-id> <content>`          — post a message, print the reply
//! - `close <session-id>`                   — end the session and summarize
//! - `summary <session-id>`                 — fetch the stored summary
//! - `status`                               — show server health

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8770";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "medgate-cli",
    version,
    about = "Medgate OTP-gated medical chat — command line client"
)]
struct Cli {
    /// Medgate HTTP server URL (overrides MEDGATE_HTTP_URL env var)
    #[arg(long, env = "MEDGATE_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    /// Requester identity (UUID) sent with every call
    #[arg(long, env = "MEDGATE_REQUESTER_ID")]
    requester: Option<String>,

    /// Print raw JSON responses instead of human-readable output
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Issue an OTP challenge for the patient with this national code
    RequestOtp {
        national_code: String,
    },

    /// Verify an OTP code and record an access grant
    VerifyOtp {
        national_code: String,
        code: String,
    },

    /// Open a chat session with a patient
    Open {
        patient_id: String,

        /// Free-text purpose of the session
        #[arg(long)]
        purpose: Option<String>,
    },

    /// Post a message into a session and print the assistant reply
    Post {
        session_id: String,
        content: String,
    },

    /// Close a session; prints the generated summary
    Close {
        session_id: String,
    },

    /// Fetch the stored summary of an ended session
    Summary {
        session_id: String,
    },

    /// Show Medgate server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SummaryResponse {
    pub session_id: String,
    pub text_summary: String,
    pub payload: serde_json::Value,
    pub tokens_used: i64,
    pub generated_at: Option<String>,
}

// ============================================================================
// Output formatting
// ============================================================================

/// Human-readable rendering of a stored summary.
pub fn format_summary(summary: &SummaryResponse) -> String {
    let mut out = String::new();
    out.push_str(&format!("Session: {}\n", summary.session_id));
    if summary.text_summary.is_empty() {
        out.push_str("Summary: (empty)\n");
    } else {
        out.push_str(&format!("Summary: {}\n", summary.text_summary));
    }
    out.push_str(&format!("Tokens:  {}\n", summary.tokens_used));
    if let Some(generated_at) = &summary.generated_at {
        out.push_str(&format!("At:      {}\n", generated_at));
    }
    if summary.payload.get("degraded").and_then(|v| v.as_bool()) == Some(true) {
        out.push_str("Note:    summarization degraded — payload holds the error\n");
    }
    out
}

/// Extract a one-line error description from an API error body.
pub fn format_error(status: u16, body: &serde_json::Value) -> String {
    let detail = body["error"].as_str().unwrap_or("unknown error");
    match body["error_kind"].as_str() {
        Some(kind) => format!("HTTP {} ({}): {}", status, kind, detail),
        None => format!("HTTP {}: {}", status, detail),
    }
}

// ============================================================================
// HTTP client calls
// ============================================================================

struct Api {
    client: reqwest::blocking::Client,
    server: String,
    requester: Option<String>,
    json: bool,
}

impl Api {
    fn new(server: String, requester: Option<String>, json: bool) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            server,
            requester,
            json,
        })
    }

    fn requester(&self) -> String {
        match &self.requester {
            Some(r) => r.clone(),
            None => {
                eprintln!("medgate-cli: --requester (or MEDGATE_REQUESTER_ID) is required");
                std::process::exit(2);
            }
        }
    }

    fn post(&self, path: &str, body: serde_json::Value) -> (u16, serde_json::Value) {
        let url = format!("{}{}", self.server, path);
        let resp = self.client.post(&url).json(&body).send();
        Self::read(resp, &url)
    }

    fn get(&self, path: &str) -> (u16, serde_json::Value) {
        let url = format!("{}{}", self.server, path);
        let resp = self.client.get(&url).send();
        Self::read(resp, &url)
    }

    fn read(
        resp: Result<reqwest::blocking::Response, reqwest::Error>,
        url: &str,
    ) -> (u16, serde_json::Value) {
        let resp = match resp {
            Ok(r) => r,
            Err(e) => {
                eprintln!("medgate-cli: connection failed to {}: {}", url, e);
                std::process::exit(1);
            }
        };
        let status = resp.status().as_u16();
        let body: serde_json::Value = resp.json().unwrap_or_default();
        (status, body)
    }

    /// Print the response; exit non-zero on API errors.
    fn finish(&self, status: u16, body: serde_json::Value, render: impl Fn(&serde_json::Value)) {
        if self.json {
            match serde_json::to_string_pretty(&body) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("medgate-cli: failed to serialize response: {}", e);
                    std::process::exit(1);
                }
            }
            if !(200..300).contains(&status) {
                std::process::exit(1);
            }
            return;
        }

        if (200..300).contains(&status) {
            render(&body);
        } else {
            eprintln!("medgate-cli: {}", format_error(status, &body));
            std::process::exit(1);
        }
    }
}

// ============================================================================
// Main
// ============================================================================

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();
    let api = Api::new(server, cli.requester, cli.json)?;

    match cli.command {
        Commands::RequestOtp { national_code } => {
            let (status, body) = api.post(
                "/otp/request",
                serde_json::json!({
                    "requester_id": api.requester(),
                    "national_code": national_code,
                }),
            );
            api.finish(status, body, |b| {
                println!("OTP sent to patient {}", b["patient_id"].as_str().unwrap_or("?"));
                if b["delivered"] == false {
                    println!("Warning: SMS delivery failed — the code is still valid, resend later");
                }
            });
        }
        Commands::VerifyOtp {
            national_code,
            code,
        } => {
            let (status, body) = api.post(
                "/otp/verify",
                serde_json::json!({
                    "requester_id": api.requester(),
                    "national_code": national_code,
                    "code": code,
                }),
            );
            api.finish(status, body, |b| {
                println!(
                    "Access granted to patient {}",
                    b["patient_id"].as_str().unwrap_or("?")
                );
            });
        }
        Commands::Open { patient_id, purpose } => {
            let (status, body) = api.post(
                "/sessions",
                serde_json::json!({
                    "requester_id": api.requester(),
                    "patient_id": patient_id,
                    "purpose": purpose,
                }),
            );
            api.finish(status, body, |b| {
                println!("Session opened: {}", b["session_id"].as_str().unwrap_or("?"));
            });
        }
        Commands::Post {
            session_id,
            content,
        } => {
            let (status, body) = api.post(
                &format!("/sessions/{}/messages", session_id),
                serde_json::json!({
                    "requester_id": api.requester(),
                    "content": content,
                }),
            );
            api.finish(status, body, |b| {
                println!("{}", b["assistant_reply"].as_str().unwrap_or(""));
            });
        }
        Commands::Close { session_id } => {
            let (status, body) = api.post(
                &format!("/sessions/{}/close", session_id),
                serde_json::json!({
                    "requester_id": api.requester(),
                }),
            );
            api.finish(status, body, |b| {
                println!("Session closed.");
                if let Ok(summary) =
                    serde_json::from_value::<SummaryResponse>(b["summary"].clone())
                {
                    print!("{}", format_summary(&summary));
                }
            });
        }
        Commands::Summary { session_id } => {
            let (status, body) = api.get(&format!(
                "/sessions/{}/summary?requester_id={}",
                session_id,
                api.requester()
            ));
            api.finish(status, body, |b| {
                match serde_json::from_value::<SummaryResponse>(b.clone()) {
                    Ok(summary) => print!("{}", format_summary(&summary)),
                    Err(_) => println!("{}", b),
                }
            });
        }
        Commands::Status => {
            let (status, body) = api.get("/health");
            api.finish(status, body, |b| {
                println!("Medgate server: {}", b["status"].as_str().unwrap_or("unknown"));
                println!("Version:        {}", b["version"].as_str().unwrap_or("?"));
                println!("PostgreSQL:     {}", b["postgresql"].as_str().unwrap_or("?"));
                println!("Socket:         {}", b["socket"].as_str().unwrap_or("?"));
            });
        }
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_summary(text: &str, tokens: i64, payload: serde_json::Value) -> SummaryResponse {
        SummaryResponse {
            session_id: "7b5c24ab-1234-5678-9abc-def012345678".to_string(),
            text_summary: text.to_string(),
            payload,
            tokens_used: tokens,
            generated_at: Some("2026-08-01T10:00:00Z".to_string()),
        }
    }

    #[test]
    fn test_format_summary_plain() {
        let out = format_summary(&mock_summary(
            "patient reported headaches",
            42,
            serde_json::json!({}),
        ));
        assert!(out.contains("Summary: patient reported headaches"));
        assert!(out.contains("Tokens:  42"));
        assert!(out.contains("Session: 7b5c24ab"));
        assert!(!out.contains("degraded"));
    }

    #[test]
    fn test_format_summary_empty_text() {
        let out = format_summary(&mock_summary("", 0, serde_json::json!({})));
        assert!(out.contains("Summary: (empty)"));
    }

    #[test]
    fn test_format_summary_marks_degraded_payload() {
        let out = format_summary(&mock_summary(
            "",
            0,
            serde_json::json!({ "degraded": true, "error": "boom" }),
        ));
        assert!(out.contains("summarization degraded"));
    }

    #[test]
    fn test_format_error_with_kind() {
        let body = serde_json::json!({
            "error": "access denied",
            "error_kind": "access_denied",
        });
        assert_eq!(
            format_error(403, &body),
            "HTTP 403 (access_denied): access denied"
        );
    }

    #[test]
    fn test_format_error_without_kind() {
        let body = serde_json::json!({ "error": "nope" });
        assert_eq!(format_error(500, &body), "HTTP 500: nope");
    }

    #[test]
    fn test_format_error_with_empty_body() {
        let body = serde_json::json!({});
        assert_eq!(format_error(502, &body), "HTTP 502: unknown error");
    }
}
