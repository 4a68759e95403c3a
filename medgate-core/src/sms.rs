//! Kavenegar SMS client — OTP code delivery.
//!
//! Delivery is fail-soft: any transport or API failure is logged and reported
//! as `false`. The challenge created before the send stays verifiable either
//! way; resending is the caller's concern.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::collaborators::{CollaboratorError, Notifier};
use crate::config::SmsConfig;

#[derive(Debug, Clone)]
pub struct KavenegarClient {
    client: Client,
    base_url: String,
    api_key: String,
    sender: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KavenegarResponse {
    #[serde(rename = "return")]
    ret: Option<KavenegarReturn>,
}

#[derive(Debug, Deserialize)]
struct KavenegarReturn {
    status: i64,
}

impl KavenegarClient {
    pub fn new(config: &SmsConfig) -> Result<Self, CollaboratorError> {
        let api_key = std::env::var("KAVENEGAR_API_KEY").unwrap_or_default();
        Self::with_base_url(config, api_key, config.base_url.clone())
    }

    pub fn with_base_url(
        config: &SmsConfig,
        api_key: String,
        base_url: String,
    ) -> Result<Self, CollaboratorError> {
        if api_key.is_empty() {
            return Err(CollaboratorError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key,
            sender: config.sender.clone(),
        })
    }

    async fn send_once(&self, phone: &str, text: &str) -> Result<bool, CollaboratorError> {
        let url = format!("{}/{}/sms/send.json", self.base_url, self.api_key);

        let mut params = vec![("receptor", phone), ("message", text)];
        if let Some(sender) = self.sender.as_deref() {
            params.push(("sender", sender));
        }

        let response = self.client.post(&url).form(&params).send().await?;

        if !response.status().is_success() {
            let code = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Api { code, message });
        }

        let body: KavenegarResponse = response.json().await?;
        Ok(body.ret.map(|r| r.status == 200).unwrap_or(false))
    }
}

#[async_trait]
impl Notifier for KavenegarClient {
    async fn send(&self, destination: &str, text: &str) -> bool {
        match self.send_once(destination, text).await {
            Ok(delivered) => {
                if !delivered {
                    tracing::warn!(destination, "SMS gateway reported non-success status");
                }
                delivered
            }
            Err(e) => {
                tracing::warn!(destination, error = %e, "SMS delivery failed");
                false
            }
        }
    }

    fn name(&self) -> &str {
        "kavenegar"
    }
}

// ============================================================================
// TESTS
// ============================================================================
