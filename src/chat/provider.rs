//! Remote chat-provider capability
//!
//! The manager only sees the [`ChatProvider`] trait. The bundled
//! implementation speaks the OpenAI-compatible chat-completions wire format
//! over `reqwest`; it is constructed only when an API key is configured, so
//! "provider absent" is represented as `Option<Arc<dyn ChatProvider>>` and
//! never invoked.

use super::types::{ChatMessage, MessageRole};
use crate::config::ChatConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Chat provider capability consumed by the session manager
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Complete a conversation turn, returning the assistant reply text
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        new_message: &str,
    ) -> Result<String>;
}

/// OpenAI-compatible HTTP chat provider
pub struct HttpChatProvider {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl HttpChatProvider {
    /// Build a provider from config; returns `None` when no key is configured
    pub fn from_config(config: &ChatConfig) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .ok()?;

        Some(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        })
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[async_trait]
impl ChatProvider for HttpChatProvider {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        new_message: &str,
    ) -> Result<String> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(WireMessage {
            role: "system",
            content: system_prompt,
        });
        for msg in history {
            messages.push(WireMessage {
                role: match msg.role {
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                },
                content: &msg.content,
            });
        }
        messages.push(WireMessage {
            role: "user",
            content: new_message,
        });

        let url = format!("{}/chat/completions", self.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&CompletionRequest {
                model: &self.model,
                messages,
            })
            .send()
            .await
            .map_err(|e| Error::Capability(format!("chat provider request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Capability(format!(
                "chat provider returned {}",
                response.status()
            )));
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Capability(format!("invalid chat provider response: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Capability("chat provider returned no choices".to_string()))
    }
}
