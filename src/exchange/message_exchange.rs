//! Sending a message and reconciling the reply into the conversation log.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use dashmap::DashSet;

use crate::api::{Attachment, ChatApi, SendRequest};
use crate::core::errors::{ChatError, ChatResult};
use crate::core::ids::ConversationId;
use crate::core::model::{FileInfo, Message};
use crate::directory::ConversationDirectory;

use super::composer::Composer;

const SEND_FAILED_PREFIX: &str = "Sorry, there was an error sending your message. ";

/// How a send ended once it got past the local guards.
#[derive(Debug)]
pub enum SendOutcome {
    /// The reply was appended after the user's message.
    Replied(Message),
    /// A failure was handled; an error notice was appended unless the
    /// session was rejected.
    Failed(ChatError),
}

impl SendOutcome {
    /// Whether a reply was received.
    #[must_use]
    pub const fn is_replied(&self) -> bool {
        matches!(self, Self::Replied(_))
    }
}

/// Marks a conversation as awaiting a reply; asks for input focus on drop.
struct SendGuard<'a> {
    exchange: &'a MessageExchange,
    id: ConversationId,
}

impl Drop for SendGuard<'_> {
    fn drop(&mut self) {
        self.exchange.in_flight.remove(&self.id);
        self.exchange.composer().focus_requested = true;
        tracing::debug!("conversation {} idle", self.id);
    }
}

/// Drives `Idle -> Sending -> Idle` for each conversation.
pub struct MessageExchange {
    api: Arc<dyn ChatApi>,
    directory: Arc<ConversationDirectory>,
    composer: Mutex<Composer>,
    in_flight: DashSet<ConversationId>,
    max_upload_bytes: u64,
}

impl MessageExchange {
    /// Create an exchange appending into `directory`.
    #[must_use]
    pub fn new(
        api: Arc<dyn ChatApi>,
        directory: Arc<ConversationDirectory>,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            api,
            directory,
            composer: Mutex::new(Composer::default()),
            in_flight: DashSet::new(),
            max_upload_bytes,
        }
    }

    fn composer(&self) -> MutexGuard<'_, Composer> {
        self.composer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the composer text.
    pub fn set_input(&self, text: impl Into<String>) {
        self.composer().input = text.into();
    }

    /// Stage a file for the next send.
    pub fn stage_attachment(&self, attachment: Attachment) {
        tracing::debug!("staged {attachment:?}");
        self.composer().attachment = Some(attachment);
    }

    /// Unstage the file.
    pub fn clear_attachment(&self) {
        self.composer().attachment = None;
    }

    /// Snapshot of the composer.
    #[must_use]
    pub fn composer_snapshot(&self) -> Composer {
        self.composer().clone()
    }

    /// Consume a pending focus request.
    #[must_use]
    pub fn take_focus_request(&self) -> bool {
        std::mem::take(&mut self.composer().focus_requested)
    }

    /// Whether a send is awaiting a reply in `id`.
    #[must_use]
    pub fn is_sending(&self, id: ConversationId) -> bool {
        self.in_flight.contains(&id)
    }

    /// Send whatever the composer holds.
    ///
    /// The composer is emptied as soon as the send starts, so text typed
    /// while awaiting the reply is kept for the next send.
    ///
    /// # Errors
    /// See [`MessageExchange::send_message`].
    pub async fn submit(&self, id: ConversationId) -> ChatResult<SendOutcome> {
        let Composer {
            input, attachment, ..
        } = self.composer_snapshot();
        let guard = self.begin(id, &input, attachment.as_ref()).await?;
        self.composer().clear();
        self.deliver(&guard, &input, attachment).await
    }

    /// Send `text` (and an optional attachment) to conversation `id`.
    ///
    /// The user's message is appended before any network call and is never
    /// removed. Upload and send failures append one error notice and come
    /// back as [`SendOutcome::Failed`].
    ///
    /// # Errors
    /// Returns `EmptyInput` for blank text without attachment,
    /// `UnknownConversation` if `id` is not in the directory, and
    /// `SendInFlight` while a previous send to `id` is awaiting its reply.
    /// None of these touch any state.
    pub async fn send_message(
        &self,
        id: ConversationId,
        text: &str,
        attachment: Option<Attachment>,
    ) -> ChatResult<SendOutcome> {
        let guard = self.begin(id, text, attachment.as_ref()).await?;
        self.deliver(&guard, text, attachment).await
    }

    /// Local checks, then mark `id` as sending.
    async fn begin(
        &self,
        id: ConversationId,
        text: &str,
        attachment: Option<&Attachment>,
    ) -> ChatResult<SendGuard<'_>> {
        if text.trim().is_empty() && attachment.is_none() {
            return Err(ChatError::EmptyInput);
        }
        if !self.directory.contains(id).await {
            return Err(ChatError::UnknownConversation(id));
        }
        if !self.in_flight.insert(id) {
            return Err(ChatError::SendInFlight(id));
        }
        tracing::debug!("conversation {id} sending");
        Ok(SendGuard { exchange: self, id })
    }

    async fn deliver(
        &self,
        guard: &SendGuard<'_>,
        text: &str,
        attachment: Option<Attachment>,
    ) -> ChatResult<SendOutcome> {
        let id = guard.id;
        self.directory
            .append_message(id, Message::user(text, None))
            .await?;

        let file_info = match attachment {
            Some(attachment) => match self.upload(&attachment).await {
                Ok(info) => Some(info),
                Err(err) => {
                    if !err.is_auth_rejected() {
                        let detail = match &err {
                            ChatError::AttachmentRejected(reason) => reason.clone(),
                            ChatError::Upload(api) => api.user_message(),
                            other => other.to_string(),
                        };
                        let notice = format!(
                            "Sorry, your attachment \"{}\" could not be uploaded, so the message was not sent. {detail}",
                            attachment.file_name()
                        );
                        self.append_notice(id, notice).await;
                    }
                    return Ok(SendOutcome::Failed(err));
                }
            },
            None => None,
        };

        let request = SendRequest {
            message: text.to_string(),
            conversation_id: id,
            file_info,
        };
        match self.api.send_message(request).await {
            Ok(payload) => {
                let reply = payload.into_message(Utc::now());
                if let Err(err) = self.directory.append_message(id, reply.clone()).await {
                    tracing::warn!("reply arrived for a removed conversation: {err}");
                }
                Ok(SendOutcome::Replied(reply))
            }
            Err(err) => {
                tracing::error!("failed to send message to {id}: {err}");
                if !err.is_auth_rejected() {
                    let notice = format!("{SEND_FAILED_PREFIX}{}", err.user_message());
                    self.append_notice(id, notice).await;
                }
                Ok(SendOutcome::Failed(err.into()))
            }
        }
    }

    async fn upload(&self, attachment: &Attachment) -> ChatResult<FileInfo> {
        attachment
            .check_size(self.max_upload_bytes)
            .map_err(ChatError::AttachmentRejected)?;

        let payload = self
            .api
            .upload_file(attachment.clone())
            .await
            .map_err(ChatError::Upload)?;
        payload
            .into_file_info(attachment)
            .map_err(ChatError::Upload)
    }

    async fn append_notice(&self, id: ConversationId, text: String) {
        if let Err(err) = self
            .directory
            .append_message(id, Message::error_notice(text))
            .await
        {
            tracing::warn!("could not append error notice: {err}");
        }
    }
}
