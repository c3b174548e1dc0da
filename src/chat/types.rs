//! Wire and record types for the advisory chat
//!
//! All types use camelCase JSON serialization.

use crate::access::Owned;
use crate::store::StoredRecord;
use serde::{Deserialize, Serialize};

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Where an assistant reply came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    /// Remote chat provider
    Provider,
    /// Local keyword-matched fallback
    Local,
}

/// A single message within a session
///
/// Messages are append-only: once stored they are never reordered or edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

/// Metadata attached to assistant messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    pub source: ResponseSource,
}

/// A chat session owned by a single user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl StoredRecord for ChatSession {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Owned for ChatSession {
    fn owner(&self) -> &str {
        &self.owner
    }
}

/// Request body for POST /api/v1/chat/message
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    pub text: String,
    #[serde(default = "default_language")]
    pub language: String,
    /// When true (the default, matching historical behavior), a session id
    /// that does not resolve creates a fresh session instead of failing.
    #[serde(default = "default_true")]
    pub create_if_absent: bool,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_true() -> bool {
    true
}

/// Response body for POST /api/v1/chat/message
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub session_id: String,
    pub reply: String,
    pub source: ResponseSource,
}

/// Request body for renaming a session
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameSessionRequest {
    pub title: String,
}

/// Summary row for session listings (messages elided)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub message_count: usize,
    pub created_at: u64,
    pub updated_at: u64,
}

impl From<&ChatSession> for SessionSummary {
    fn from(session: &ChatSession) -> Self {
        Self {
            id: session.id.clone(),
            title: session.title.clone(),
            message_count: session.messages.len(),
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}
