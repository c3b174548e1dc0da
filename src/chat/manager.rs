//! Conversation session manager
//!
//! One chat turn appends exactly two messages (user + assistant) and
//! persists them together, so no half-turn ever reaches disk. Provider
//! failure is absorbed into the local fallback and never fails the request.

use super::provider::ChatProvider;
use super::responder::LocalResponder;
use super::types::*;
use crate::access::ensure_owner;
use crate::config::ChatConfig;
use crate::error::{Error, Result};
use crate::store::RecordStore;
use std::sync::Arc;
use std::time::Duration;

/// Manages chat sessions and the provider/fallback reply pipeline
pub struct ChatManager {
    store: Arc<RecordStore<ChatSession>>,
    provider: Option<Arc<dyn ChatProvider>>,
    responder: LocalResponder,
    config: ChatConfig,
}

impl ChatManager {
    pub fn new(
        store: Arc<RecordStore<ChatSession>>,
        provider: Option<Arc<dyn ChatProvider>>,
        config: ChatConfig,
    ) -> Self {
        Self {
            store,
            provider,
            responder: LocalResponder::new(),
            config,
        }
    }

    /// Handle one chat turn
    ///
    /// Resolves or creates the session, appends the user message, obtains a
    /// reply (remote provider, or local responder when the provider is
    /// absent or fails), appends the assistant message and persists both
    /// together. An unresolvable `session_id` creates a fresh session when
    /// `create_if_absent` is set; a session owned by someone else is always
    /// `NotFound`.
    pub async fn send_message(
        &self,
        owner: &str,
        session_id: Option<&str>,
        text: &str,
        language: &str,
        create_if_absent: bool,
    ) -> Result<SendMessageResponse> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Validation("message text must not be empty".to_string()));
        }

        let session = self.resolve_session(owner, session_id, create_if_absent).await?;

        // Bounded trailing window of already-persisted history
        let window = self.config.history_window;
        let start = session.messages.len().saturating_sub(window);
        let history = &session.messages[start..];

        let (reply, source) = self.resolve_reply(language, history, text).await;

        let now = now_millis();
        let user_message = ChatMessage {
            role: MessageRole::User,
            content: text.to_string(),
            timestamp: now,
            metadata: None,
        };
        let assistant_message = ChatMessage {
            role: MessageRole::Assistant,
            content: reply.clone(),
            timestamp: now,
            metadata: Some(MessageMetadata { source }),
        };

        let default_title = derive_title(text);
        let updated = self
            .store
            .update_by_id(&session.id, |s| {
                s.messages.push(user_message);
                s.messages.push(assistant_message);
                s.updated_at = now;
                if s.title.is_none() {
                    s.title = Some(default_title);
                }
            })
            .await?;

        tracing::debug!(
            session_id = %updated.id,
            source = ?source,
            messages = updated.messages.len(),
            "Chat turn completed"
        );

        Ok(SendMessageResponse {
            session_id: updated.id,
            reply,
            source,
        })
    }

    /// List the caller's sessions, most recently active first
    pub async fn list_sessions(&self, owner: &str) -> Vec<SessionSummary> {
        self.store
            .find_many(
                |s| s.owner == owner,
                |a, b| b.updated_at.cmp(&a.updated_at),
                0,
                usize::MAX,
            )
            .await
            .iter()
            .map(SessionSummary::from)
            .collect()
    }

    /// Fetch a session owned by the caller
    pub async fn get_session(&self, owner: &str, id: &str) -> Result<ChatSession> {
        let session = self
            .store
            .find_by_id(id)
            .await
            .ok_or_else(|| Error::NotFound(format!("session {} not found", id)))?;
        ensure_owner(owner, &session, "session", id)?;
        Ok(session)
    }

    /// Delete a session owned by the caller
    pub async fn delete_session(&self, owner: &str, id: &str) -> Result<()> {
        // Ownership check before the destructive step
        self.get_session(owner, id).await?;
        self.store.delete_by_id(id).await;
        tracing::info!(session_id = %id, "Deleted chat session");
        Ok(())
    }

    /// Rename a session owned by the caller
    pub async fn rename_session(&self, owner: &str, id: &str, title: &str) -> Result<ChatSession> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::Validation("title must not be empty".to_string()));
        }
        self.get_session(owner, id).await?;
        let title = title.to_string();
        self.store.update_by_id(id, |s| s.title = Some(title)).await
    }

    async fn resolve_session(
        &self,
        owner: &str,
        session_id: Option<&str>,
        create_if_absent: bool,
    ) -> Result<ChatSession> {
        if let Some(id) = session_id {
            match self.store.find_by_id(id).await {
                Some(session) => {
                    ensure_owner(owner, &session, "session", id)?;
                    return Ok(session);
                }
                None if !create_if_absent => {
                    return Err(Error::NotFound(format!("session {} not found", id)));
                }
                None => {
                    tracing::debug!(session_id = %id, "Session id did not resolve, creating new");
                }
            }
        }

        let now = now_millis();
        let session = ChatSession {
            id: format!("chat-{}", uuid::Uuid::new_v4()),
            owner: owner.to_string(),
            title: None,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.store.create(session).await
    }

    async fn resolve_reply(
        &self,
        language: &str,
        history: &[ChatMessage],
        text: &str,
    ) -> (String, ResponseSource) {
        let Some(provider) = &self.provider else {
            return (self.responder.reply(text), ResponseSource::Local);
        };

        let system_prompt = format!("{} Respond in language: {}.", self.config.persona, language);
        let timeout = Duration::from_secs(self.config.timeout_secs);

        match tokio::time::timeout(timeout, provider.complete(&system_prompt, history, text)).await
        {
            Ok(Ok(reply)) => (reply, ResponseSource::Provider),
            Ok(Err(e)) => {
                tracing::warn!("Chat provider failed, using local responder: {}", e);
                (self.responder.reply(text), ResponseSource::Local)
            }
            Err(_) => {
                tracing::warn!("Chat provider timed out, using local responder");
                (self.responder.reply(text), ResponseSource::Local)
            }
        }
    }
}

/// Default session title derived from the first message
fn derive_title(text: &str) -> String {
    const MAX: usize = 48;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(MAX).collect();
        format!("{}…", truncated.trim_end())
    }
}

fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}
