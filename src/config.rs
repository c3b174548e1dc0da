//! CropSense configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main CropSense configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CropSenseConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Binary and record storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Crop classifier configuration
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Chat provider and fallback configuration
    #[serde(default)]
    pub chat: ChatConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Allowed CORS origins (empty = allow any)
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 18420,
            cors_origins: Vec::new(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory for records and uploaded binaries
    pub base_dir: PathBuf,

    /// Maximum accepted upload size in bytes
    pub max_upload_bytes: usize,

    /// Accepted image content types for uploads
    pub accepted_content_types: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            max_upload_bytes: 10 * 1024 * 1024,
            accepted_content_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/webp".to_string(),
            ],
        }
    }
}

/// Classifier capability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Timeout for a single classification call, in seconds
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

/// Chat provider configuration
///
/// When `api_key` is absent the remote provider is never invoked and every
/// reply comes from the local responder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// API key for the chat provider (None = provider absent)
    pub api_key: Option<String>,

    /// Base URL of the chat-completions API
    pub api_base: String,

    /// Model identifier sent to the provider
    pub model: String,

    /// Maximum number of trailing history messages sent per request
    pub history_window: usize,

    /// Timeout for a single provider call, in seconds
    pub timeout_secs: u64,

    /// Assistant persona prepended as the system instruction
    pub persona: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            history_window: 10,
            timeout_secs: 30,
            persona: "You are an experienced agronomist helping smallholder farmers. \
                      Give practical, concise advice about crops, soil, pests, \
                      irrigation and weather."
                .to_string(),
        }
    }
}

/// Default base directory (~/.cropsense)
fn default_base_dir() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cropsense")
}
