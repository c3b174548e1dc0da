//! Advisory chat: sessions, remote provider, local fallback

pub mod handler;
pub mod manager;
pub mod provider;
pub mod responder;
pub mod types;

pub use handler::{chat_router, ChatState};
pub use manager::ChatManager;
pub use provider::{ChatProvider, HttpChatProvider};
pub use responder::LocalResponder;
pub use types::{ChatMessage, ChatSession, MessageRole, ResponseSource};
