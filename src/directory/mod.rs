//! Conversation directory: the ordered conversation list and its selection.

pub mod conversations;

pub use conversations::{ConversationDirectory, FetchTicket, RenameOutcome};
