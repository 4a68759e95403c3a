use std::collections::HashMap;
use std::sync::Arc;

use medgate_core::collaborators::{Assistant, Moderator, Notifier, Summarizer};
use medgate_core::{KavenegarClient, MedgateConfig, TalkbotClient, TalkbotClientConfig};
use sqlx::PgPool;
use tokio::sync::Mutex;
use uuid::Uuid;

/// The collaborator set injected into the subsystems. Tests swap in
/// deterministic fakes; production wiring comes from `from_config`.
#[derive(Clone)]
pub struct Collaborators {
    pub moderator: Arc<dyn Moderator>,
    pub assistant: Arc<dyn Assistant>,
    pub summarizer: Arc<dyn Summarizer>,
    pub notifier: Arc<dyn Notifier>,
}

impl Collaborators {
    /// Production wiring: TalkBot for moderation, replies and summarization,
    /// Kavenegar for OTP delivery.
    pub fn from_config(config: &MedgateConfig) -> anyhow::Result<Self> {
        let talkbot = Arc::new(TalkbotClient::with_base_url(
            TalkbotClientConfig::new(None, &config.talkbot),
            config.talkbot.base_url.clone(),
        )?);
        let notifier = Arc::new(KavenegarClient::new(&config.sms)?);

        Ok(Self {
            moderator: talkbot.clone(),
            assistant: talkbot.clone(),
            summarizer: talkbot,
            notifier,
        })
    }
}

/// Per-session write locks. The message pipeline holds a session's lock
/// across the requester/assistant message pair so concurrent posts to the
/// same session cannot interleave; close takes the same lock before ending
/// the session.
#[derive(Default)]
pub struct SessionLocks {
    inner: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock_for(&self, session_id: Uuid) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().await;
        map.entry(session_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the map entry for an ended session. In-flight holders keep their
    /// Arc; they re-check session state under the lock anyway.
    pub async fn release(&self, session_id: Uuid) {
        let mut map = self.inner.lock().await;
        map.remove(&session_id);
    }
}

/// Everything a request handler needs.
#[derive(Clone)]
pub struct AppContext {
    pub pool: PgPool,
    pub config: MedgateConfig,
    pub collaborators: Collaborators,
    pub locks: Arc<SessionLocks>,
}

impl AppContext {
    pub fn new(pool: PgPool, config: MedgateConfig, collaborators: Collaborators) -> Self {
        Self {
            pool,
            config,
            collaborators,
            locks: Arc::new(SessionLocks::new()),
        }
    }
}
