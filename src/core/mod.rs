//! Core client types: identifiers, domain model, errors and configuration.

pub mod config;
pub mod errors;
pub mod ids;
pub mod model;

pub use config::ClientConfig;
pub use errors::{ApiError, ApiResult, ChatError, ChatResult, StorageError, StorageResult};
pub use ids::{ConversationId, UserId};
pub use model::{
    Conversation, DEFAULT_CONVERSATION_TITLE, FileInfo, FileType, Message, Sender, Session,
    UserIdentity,
};
