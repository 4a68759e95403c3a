//! TalkBot API client.
//!
//! Implements the `Moderator`, `Assistant` and `Summarizer` capabilities on
//! top of the TalkBot HTTP API:
//! - `/chat/completions` — assistant replies and transcript summarization
//! - `/analysis/profanity` — content moderation
//!
//! Request bodies are signed with HMAC-SHA256 (`X-Sign` header) when a
//! signing secret is configured.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use crate::collaborators::{
    Assistant, CollaboratorError, Moderator, Summarizer, TranscriptEntry,
};
use crate::config::TalkbotConfig;

type HmacSha256 = Hmac<Sha256>;

/// TalkBot client configuration.
#[derive(Debug, Clone)]
pub struct TalkbotClientConfig {
    pub api_key: String,
    pub sign_secret: Option<String>,
    pub chat_model: String,
    pub summary_model: String,
    pub timeout_seconds: u64,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl TalkbotClientConfig {
    /// Build from the `[talkbot]` config section. The API key and signing
    /// secret come from the environment when not passed explicitly.
    pub fn new(api_key: Option<String>, settings: &TalkbotConfig) -> Self {
        let api_key = api_key
            .or_else(|| std::env::var("TALKBOT_API_KEY").ok())
            .unwrap_or_default();
        let sign_secret = std::env::var("TALKBOT_SIGN_SECRET")
            .ok()
            .filter(|s| !s.is_empty());

        Self {
            api_key,
            sign_secret,
            chat_model: settings.chat_model.clone(),
            summary_model: settings.summary_model.clone(),
            timeout_seconds: settings.timeout_seconds,
            max_retries: settings.max_retries,
            retry_delay_ms: settings.retry_delay_ms,
        }
    }
}

// ============================================================================
// Wire structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [TranscriptEntry],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Debug, Serialize)]
struct ProfanityRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct TalkbotErrorResponse {
    error: Option<TalkbotErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct TalkbotErrorDetail {
    code: u16,
    message: String,
}

// ============================================================================
// TalkbotClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct TalkbotClient {
    client: Client,
    config: TalkbotClientConfig,
    base_url: String,
}

impl TalkbotClient {
    pub fn new(config: TalkbotClientConfig) -> Result<Self, CollaboratorError> {
        Self::with_base_url(config, "https://api.talkbot.ir/v1".to_string())
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(
        config: TalkbotClientConfig,
        base_url: String,
    ) -> Result<Self, CollaboratorError> {
        if config.api_key.is_empty() {
            return Err(CollaboratorError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    fn sign(&self, body: &str) -> Option<String> {
        let secret = self.config.sign_secret.as_deref()?;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(body.as_bytes());
        Some(BASE64.encode(mac.finalize().into_bytes()))
    }

    /// POST a signed JSON body and return the raw response.
    async fn post_signed(
        &self,
        path: &str,
        body: &str,
    ) -> Result<reqwest::Response, CollaboratorError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json");

        if let Some(signature) = self.sign(body) {
            request = request.header("X-Sign", signature);
        }

        let response = request.body(body.to_string()).send().await?;
        Ok(response)
    }

    async fn read_api_error(response: reqwest::Response) -> CollaboratorError {
        let status = response.status();
        let error_body = response.text().await.unwrap_or_default();
        let error_detail = serde_json::from_str::<TalkbotErrorResponse>(&error_body)
            .ok()
            .and_then(|e| e.error);

        let (code, message) = error_detail
            .map(|e| (e.code, e.message))
            .unwrap_or((status.as_u16(), error_body));

        tracing::error!(code = code, message = %message, "TalkBot API error");

        CollaboratorError::Api { code, message }
    }

    /// Chat completion with retry. Returns the first choice's content.
    pub async fn chat(
        &self,
        model: &str,
        messages: &[TranscriptEntry],
    ) -> Result<String, CollaboratorError> {
        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);

        let result = Retry::spawn(retry_strategy, || self.chat_once(model, messages)).await;

        match result {
            Ok(content) => Ok(content),
            Err(e) => {
                tracing::error!(
                    attempts = self.config.max_retries,
                    error = %e,
                    "All chat retry attempts failed"
                );
                Err(CollaboratorError::RetryExhausted {
                    attempts: self.config.max_retries,
                })
            }
        }
    }

    async fn chat_once(
        &self,
        model: &str,
        messages: &[TranscriptEntry],
    ) -> Result<String, CollaboratorError> {
        let body = serde_json::to_string(&ChatRequest { model, messages })?;
        let response = self.post_signed("/chat/completions", &body).await?;

        if !response.status().is_success() {
            return Err(Self::read_api_error(response).await);
        }

        let chat_response: ChatResponse = response.json().await?;
        let content = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                CollaboratorError::InvalidResponse("chat response has no choices".to_string())
            })?;

        Ok(content)
    }

    /// Profanity check. Single attempt — moderation sits on the latency path
    /// of every posted message, and the caller applies its own timeout and
    /// fail-open/fail-closed policy.
    pub async fn profanity(&self, text: &str) -> Result<bool, CollaboratorError> {
        let body = serde_json::to_string(&ProfanityRequest { text })?;
        let response = self.post_signed("/analysis/profanity", &body).await?;

        if !response.status().is_success() {
            return Err(Self::read_api_error(response).await);
        }

        // The API has shipped both shapes: {"contains_profanity": bool} and a
        // bare boolean body.
        let value: serde_json::Value = response.json().await?;
        let flagged = match &value {
            serde_json::Value::Bool(b) => *b,
            serde_json::Value::Object(map) => map
                .get("contains_profanity")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            _ => false,
        };

        Ok(flagged)
    }
}

#[async_trait]
impl Moderator for TalkbotClient {
    async fn check(&self, text: &str) -> Result<bool, CollaboratorError> {
        self.profanity(text).await
    }

    fn name(&self) -> &str {
        "talkbot-profanity"
    }
}

#[async_trait]
impl Assistant for TalkbotClient {
    async fn reply(&self, message: &str) -> Result<String, CollaboratorError> {
        let messages = [TranscriptEntry {
            role: "user".to_string(),
            content: message.to_string(),
        }];
        self.chat(&self.config.chat_model, &messages).await
    }

    fn name(&self) -> &str {
        "talkbot-chat"
    }
}

#[async_trait]
impl Summarizer for TalkbotClient {
    async fn summarize(
        &self,
        transcript: &[TranscriptEntry],
    ) -> Result<serde_json::Value, CollaboratorError> {
        let content = self.chat(&self.config.summary_model, transcript).await?;

        serde_json::from_str(&content).map_err(|_| {
            CollaboratorError::InvalidResponse(
                "summary content is not a JSON payload".to_string(),
            )
        })
    }

    fn name(&self) -> &str {
        "talkbot-summarizer"
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(api_key: &str) -> TalkbotClientConfig {
        TalkbotClientConfig {
            api_key: api_key.to_string(),
            sign_secret: None,
            chat_model: "o3-mini".to_string(),
            summary_model: "o3-mini".to_string(),
            timeout_seconds: 30,
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }

    fn chat_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": content } }
            ]
        })
    }

    #[tokio::test]
    async fn test_chat_posts_model_and_messages() {
        let mock_server = MockServer::start().await;
        let client = TalkbotClient::with_base_url(test_config("test-api-key"), mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-api-key"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({
                "model": "o3-mini",
                "messages": [{ "role": "user", "content": "hello" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("hi there")))
            .mount(&mock_server)
            .await;

        let messages = [TranscriptEntry {
            role: "user".to_string(),
            content: "hello".to_string(),
        }];
        let result = client.chat("o3-mini", &messages).await;

        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result.err());
        assert_eq!(result.unwrap(), "hi there");
    }

    #[tokio::test]
    async fn test_chat_sends_signature_when_secret_configured() {
        let mock_server = MockServer::start().await;
        let mut config = test_config("test-api-key");
        config.sign_secret = Some("topsecret".to_string());
        let client = TalkbotClient::with_base_url(config, mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header_exists("x-sign"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("ok")))
            .mount(&mock_server)
            .await;

        let messages = [TranscriptEntry {
            role: "user".to_string(),
            content: "hello".to_string(),
        }];
        let result = client.chat("o3-mini", &messages).await;
        assert!(result.is_ok(), "Signed request should succeed: {:?}", result.err());
    }

    #[tokio::test]
    async fn test_chat_returns_error_on_api_500() {
        let mock_server = MockServer::start().await;
        let client = TalkbotClient::with_base_url(test_config("test-api-key"), mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": { "code": 500, "message": "Internal server error" }
            })))
            .mount(&mock_server)
            .await;

        let messages = [TranscriptEntry {
            role: "user".to_string(),
            content: "hello".to_string(),
        }];
        let result = client.chat("o3-mini", &messages).await;

        assert!(result.is_err(), "Expected error on 500 response");
        match result {
            Err(CollaboratorError::RetryExhausted { attempts }) => {
                assert_eq!(attempts, 3, "Expected 3 retry attempts");
            }
            _ => panic!("Expected RetryExhausted error"),
        }
    }

    #[tokio::test]
    async fn test_chat_retries_on_429_then_succeeds() {
        let mock_server = MockServer::start().await;
        let client = TalkbotClient::with_base_url(test_config("test-api-key"), mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": { "code": 429, "message": "Rate limit exceeded" }
            })))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("recovered")))
            .mount(&mock_server)
            .await;

        let messages = [TranscriptEntry {
            role: "user".to_string(),
            content: "hello".to_string(),
        }];
        let result = client.chat("o3-mini", &messages).await;

        assert!(result.is_ok(), "Expected success after retry");
        assert_eq!(result.unwrap(), "recovered");
    }

    #[tokio::test]
    async fn test_client_fails_with_missing_api_key() {
        let result = TalkbotClient::new(test_config(""));

        assert!(result.is_err(), "Expected error with missing API key");
        match result {
            Err(CollaboratorError::MissingApiKey) => {}
            _ => panic!("Expected MissingApiKey error"),
        }
    }

    #[tokio::test]
    async fn test_profanity_object_response() {
        let mock_server = MockServer::start().await;
        let client = TalkbotClient::with_base_url(test_config("test-api-key"), mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("POST"))
            .and(path("/analysis/profanity"))
            .and(body_json(serde_json::json!({ "text": "rude words" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "contains_profanity": true
            })))
            .mount(&mock_server)
            .await;

        let flagged = client.profanity("rude words").await.unwrap();
        assert!(flagged);
    }

    #[tokio::test]
    async fn test_profanity_bare_bool_response() {
        let mock_server = MockServer::start().await;
        let client = TalkbotClient::with_base_url(test_config("test-api-key"), mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("POST"))
            .and(path("/analysis/profanity"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!(false)))
            .mount(&mock_server)
            .await;

        let flagged = client.profanity("fine text").await.unwrap();
        assert!(!flagged);
    }

    #[tokio::test]
    async fn test_profanity_missing_field_defaults_to_clean() {
        let mock_server = MockServer::start().await;
        let client = TalkbotClient::with_base_url(test_config("test-api-key"), mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("POST"))
            .and(path("/analysis/profanity"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "something_else": 1
            })))
            .mount(&mock_server)
            .await;

        let flagged = client.profanity("text").await.unwrap();
        assert!(!flagged);
    }

    #[tokio::test]
    async fn test_profanity_propagates_api_error() {
        let mock_server = MockServer::start().await;
        let client = TalkbotClient::with_base_url(test_config("test-api-key"), mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("POST"))
            .and(path("/analysis/profanity"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "error": { "code": 503, "message": "unavailable" }
            })))
            .mount(&mock_server)
            .await;

        let result = client.profanity("text").await;
        match result {
            Err(CollaboratorError::Api { code, .. }) => assert_eq!(code, 503),
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    // --- trait impls ---

    #[tokio::test]
    async fn test_assistant_trait_wraps_single_user_turn() {
        let mock_server = MockServer::start().await;
        let assistant: Box<dyn Assistant> = Box::new(
            TalkbotClient::with_base_url(test_config("test-api-key"), mock_server.uri()).unwrap(),
        );

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_json(serde_json::json!({
                "model": "o3-mini",
                "messages": [{ "role": "user", "content": "I have a headache" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("Drink water")))
            .mount(&mock_server)
            .await;

        let reply = assistant.reply("I have a headache").await.unwrap();
        assert_eq!(reply, "Drink water");
        assert_eq!(assistant.name(), "talkbot-chat");
    }

    #[tokio::test]
    async fn test_summarizer_parses_json_content() {
        let mock_server = MockServer::start().await;
        let summarizer: Box<dyn Summarizer> = Box::new(
            TalkbotClient::with_base_url(test_config("test-api-key"), mock_server.uri()).unwrap(),
        );

        let payload = r#"{"text_summary":"patient reported headaches","token_count":42,"topics":["headache"]}"#;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(payload)))
            .mount(&mock_server)
            .await;

        let transcript = [
            TranscriptEntry {
                role: "requester".to_string(),
                content: "I keep getting headaches".to_string(),
            },
            TranscriptEntry {
                role: "assistant".to_string(),
                content: "How often?".to_string(),
            },
        ];
        let value = summarizer.summarize(&transcript).await.unwrap();
        assert_eq!(value["text_summary"], "patient reported headaches");
        assert_eq!(value["token_count"], 42);
        assert_eq!(value["topics"][0], "headache");
    }

    #[tokio::test]
    async fn test_summarizer_rejects_non_json_content() {
        let mock_server = MockServer::start().await;
        let summarizer: Box<dyn Summarizer> = Box::new(
            TalkbotClient::with_base_url(test_config("test-api-key"), mock_server.uri()).unwrap(),
        );

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(chat_body("plain prose, not JSON")),
            )
            .mount(&mock_server)
            .await;

        let transcript = [TranscriptEntry {
            role: "requester".to_string(),
            content: "hello".to_string(),
        }];
        let result = summarizer.summarize(&transcript).await;
        match result {
            Err(CollaboratorError::InvalidResponse(_)) => {}
            other => panic!("Expected InvalidResponse, got {:?}", other),
        }
    }
}
