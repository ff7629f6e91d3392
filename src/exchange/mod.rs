//! Message exchange: optimistic send, attachment upload and reply reconciliation.

pub mod composer;
pub mod message_exchange;

pub use composer::Composer;
pub use message_exchange::{MessageExchange, SendOutcome};
