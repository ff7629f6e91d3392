//! Remote chat backend access.
//!
//! `ChatApi` has one method per REST operation the client consumes. It
//! returns the loose wire payloads from [`wire`]; callers normalise them into
//! domain types so that default-filling lives in one place.

pub mod attachment;
pub mod http_client;
pub mod wire;

#[cfg(test)]
pub(crate) mod mock;

pub use attachment::Attachment;
pub use http_client::HttpChatApi;
pub use wire::{
    AuthReply, ConversationPayload, Credentials, MessagePayload, SendRequest, UploadPayload,
};

use std::future::Future;
use std::pin::Pin;

use crate::core::errors::ApiResult;
use crate::core::ids::ConversationId;

/// Boxed future type for API operations.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The REST surface of the chat backend.
pub trait ChatApi: Send + Sync {
    /// `POST /auth/login`.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    fn login(&self, credentials: Credentials) -> ApiFuture<'_, ApiResult<AuthReply>>;

    /// `POST /auth/register`.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    fn register(&self, credentials: Credentials) -> ApiFuture<'_, ApiResult<AuthReply>>;

    /// `GET /chat/conversations`, in server order.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    fn list_conversations(&self) -> ApiFuture<'_, ApiResult<Vec<ConversationPayload>>>;

    /// `GET /chat/conversations/{id}`, including messages.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    fn get_conversation(&self, id: ConversationId)
    -> ApiFuture<'_, ApiResult<ConversationPayload>>;

    /// `POST /chat/conversations`.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    fn create_conversation(&self, title: &str) -> ApiFuture<'_, ApiResult<ConversationPayload>>;

    /// `PUT /chat/conversations/{id}`.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    fn rename_conversation(
        &self,
        id: ConversationId,
        title: &str,
    ) -> ApiFuture<'_, ApiResult<ConversationPayload>>;

    /// `DELETE /chat/conversations/{id}`.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    fn delete_conversation(&self, id: ConversationId) -> ApiFuture<'_, ApiResult<()>>;

    /// `POST /chat/message`.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    fn send_message(&self, request: SendRequest) -> ApiFuture<'_, ApiResult<MessagePayload>>;

    /// `POST /files/upload` as multipart.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    fn upload_file(&self, attachment: Attachment) -> ApiFuture<'_, ApiResult<UploadPayload>>;
}
