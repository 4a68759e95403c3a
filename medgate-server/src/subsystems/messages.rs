//! Message pipeline: moderate → persist requester message → assistant reply
//! → persist assistant message.
//!
//! The requester message always commits before the assistant call starts, so
//! a transcript read mid-flight never shows a reply without its prompt. The
//! per-session lock serializes whole pairs: two concurrent posts to one
//! session produce two ordered requester/assistant pairs, never interleaved.

use std::time::Duration;

use medgate_core::collaborators::{Assistant, Moderator};
use medgate_core::config::ModerationConfig;
use medgate_core::models::MessageRole;
use medgate_core::{MedgateConfig, MedgateError};
use sqlx::PgPool;
use uuid::Uuid;

use crate::state::SessionLocks;

pub async fn post_message(
    pool: &PgPool,
    config: &MedgateConfig,
    moderator: &dyn Moderator,
    assistant: &dyn Assistant,
    locks: &SessionLocks,
    session_id: Uuid,
    caller_id: Uuid,
    content: String,
) -> Result<String, MedgateError> {
    // Cheap rejection before taking the lock; ownership cannot change, state
    // is re-checked under the lock.
    let session = super::sessions::load_session(pool, session_id).await?;
    if session.owner_id != caller_id {
        return Err(MedgateError::AccessDenied);
    }
    if session.is_ended() {
        return Err(MedgateError::InvalidState(
            "session has ended".to_string(),
        ));
    }

    let lock = locks.lock_for(session_id).await;
    let _guard = lock.lock().await;

    // A concurrent close may have won the race for the lock.
    let session = super::sessions::load_session(pool, session_id).await?;
    if session.is_ended() {
        return Err(MedgateError::InvalidState(
            "session has ended".to_string(),
        ));
    }

    let content = moderate(&config.moderation, moderator, content).await?;

    // Step 1 of the ordering contract: the requester message commits here,
    // before the assistant is ever called.
    insert_message(pool, session_id, MessageRole::Requester, &content).await?;

    let reply = assistant.reply(&content).await.map_err(|e| {
        tracing::warn!(session_id = %session_id, error = %e, "Assistant call failed");
        MedgateError::from(e)
    })?;

    insert_message(pool, session_id, MessageRole::Assistant, &reply).await?;

    Ok(reply)
}

async fn insert_message(
    pool: &PgPool,
    session_id: Uuid,
    role: MessageRole,
    content: &str,
) -> Result<(), MedgateError> {
    sqlx::query("INSERT INTO chat_messages (id, session_id, role, content) VALUES ($1, $2, $3, $4)")
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(role.as_str())
        .bind(content)
        .execute(pool)
        .await?;
    Ok(())
}

/// Run content through moderation. Flagged content is replaced by the
/// configured placeholder — the original text is discarded, not marked.
/// A failed or timed-out check follows the `fail_closed` policy: reject the
/// request, or pass the text through unmoderated (the default).
pub async fn moderate(
    config: &ModerationConfig,
    moderator: &dyn Moderator,
    content: String,
) -> Result<String, MedgateError> {
    let deadline = Duration::from_secs(config.timeout_seconds);

    let verdict = tokio::time::timeout(deadline, moderator.check(&content)).await;

    match verdict {
        Ok(Ok(true)) => Ok(config.placeholder.clone()),
        Ok(Ok(false)) => Ok(content),
        Ok(Err(e)) => {
            if config.fail_closed {
                Err(MedgateError::Upstream(format!(
                    "moderation unavailable: {}",
                    e
                )))
            } else {
                tracing::warn!(error = %e, "Moderation failed, passing content through unmoderated");
                Ok(content)
            }
        }
        Err(_) => {
            if config.fail_closed {
                Err(MedgateError::Upstream(format!(
                    "moderation timed out after {}s",
                    config.timeout_seconds
                )))
            } else {
                tracing::warn!(
                    timeout_seconds = config.timeout_seconds,
                    "Moderation timed out, passing content through unmoderated"
                );
                Ok(content)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use medgate_core::collaborators::CollaboratorError;

    struct FixedModerator(bool);

    #[async_trait]
    impl Moderator for FixedModerator {
        async fn check(&self, _text: &str) -> Result<bool, CollaboratorError> {
            Ok(self.0)
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct FailingModerator;

    #[async_trait]
    impl Moderator for FailingModerator {
        async fn check(&self, _text: &str) -> Result<bool, CollaboratorError> {
            Err(CollaboratorError::Api {
                code: 503,
                message: "down".to_string(),
            })
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    struct HangingModerator;

    #[async_trait]
    impl Moderator for HangingModerator {
        async fn check(&self, _text: &str) -> Result<bool, CollaboratorError> {
            // Longer than any test timeout; the pipeline must cut it off.
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(false)
        }

        fn name(&self) -> &str {
            "hanging"
        }
    }

    fn moderation_config(fail_closed: bool) -> ModerationConfig {
        ModerationConfig {
            fail_closed,
            placeholder: "[removed]".to_string(),
            timeout_seconds: 0,
        }
    }

    #[tokio::test]
    async fn flagged_content_is_replaced_by_placeholder() {
        let mut config = moderation_config(false);
        config.timeout_seconds = 5;
        let result = moderate(&config, &FixedModerator(true), "bad words".to_string())
            .await
            .unwrap();
        assert_eq!(result, "[removed]");
    }

    #[tokio::test]
    async fn clean_content_passes_verbatim() {
        let mut config = moderation_config(false);
        config.timeout_seconds = 5;
        let result = moderate(&config, &FixedModerator(false), "hello doctor".to_string())
            .await
            .unwrap();
        assert_eq!(result, "hello doctor");
    }

    #[tokio::test]
    async fn transport_failure_fails_open_by_default() {
        let mut config = moderation_config(false);
        config.timeout_seconds = 5;
        let result = moderate(&config, &FailingModerator, "hello".to_string())
            .await
            .unwrap();
        assert_eq!(result, "hello");
    }

    #[tokio::test]
    async fn transport_failure_fails_closed_when_configured() {
        let mut config = moderation_config(true);
        config.timeout_seconds = 5;
        let result = moderate(&config, &FailingModerator, "hello".to_string()).await;
        match result {
            Err(MedgateError::Upstream(_)) => {}
            other => panic!("Expected Upstream error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn hanging_moderator_is_cut_off() {
        // timeout_seconds = 0 expires immediately; fail-open lets the text through
        let config = moderation_config(false);
        let result = moderate(&config, &HangingModerator, "hello".to_string())
            .await
            .unwrap();
        assert_eq!(result, "hello");
    }

    #[tokio::test]
    async fn hanging_moderator_rejects_when_fail_closed() {
        let config = moderation_config(true);
        let result = moderate(&config, &HangingModerator, "hello".to_string()).await;
        match result {
            Err(MedgateError::Upstream(msg)) => assert!(msg.contains("timed out")),
            other => panic!("Expected Upstream error, got {:?}", other),
        }
    }
}
