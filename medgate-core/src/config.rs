use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct MedgateConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub otp: OtpConfig,
    #[serde(default)]
    pub moderation: ModerationConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub talkbot: TalkbotConfig,
    #[serde(default)]
    pub sms: SmsConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub socket_path: String,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OtpConfig {
    pub code_length: u32,
    pub ttl_minutes: i64,
    pub message_template: String,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            code_length: 6,
            ttl_minutes: 10,
            message_template: "Your access code: {code}".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModerationConfig {
    /// When true, a failed or timed-out moderation call rejects the message
    /// instead of letting it through unmoderated.
    pub fail_closed: bool,
    pub placeholder: String,
    pub timeout_seconds: u64,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            fail_closed: false,
            placeholder: "[message removed: inappropriate language]".to_string(),
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// When true, a requester may hold at most one Active session per patient.
    pub single_active: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            single_active: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TalkbotConfig {
    pub base_url: String,
    pub chat_model: String,
    pub summary_model: String,
    pub timeout_seconds: u64,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for TalkbotConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.talkbot.ir/v1".to_string(),
            chat_model: "o3-mini".to_string(),
            summary_model: "o3-mini".to_string(),
            timeout_seconds: 30,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SmsConfig {
    pub base_url: String,
    pub sender: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.kavenegar.com/v1".to_string(),
            sender: None,
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8770,
        }
    }
}

impl MedgateConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        s.try_deserialize()
    }
}
