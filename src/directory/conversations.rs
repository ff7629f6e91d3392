//! In-memory conversation set kept in sync with the backend.
//!
//! The selection is always absent or a member of the set. Message fetches
//! are keyed by a [`FetchTicket`] carrying the selection generation at issue
//! time; a result whose ticket is no longer the outstanding one is dropped.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::api::ChatApi;
use crate::core::errors::{ApiError, ChatError, ChatResult};
use crate::core::ids::ConversationId;
use crate::core::model::{Conversation, DEFAULT_CONVERSATION_TITLE, Message};

const LIST_FAILED: &str = "Failed to load conversations";
const CREATE_FAILED: &str = "Failed to create new conversation";
const DELETE_FAILED: &str = "Failed to delete conversation";
const RENAME_FAILED: &str = "Failed to update conversation title";
const LOAD_FAILED: &str = "Failed to load conversation messages. Please try again.";

/// Identifies one message fetch for the selected conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchTicket {
    id: ConversationId,
    generation: u64,
}

impl FetchTicket {
    /// Conversation the fetch is for.
    #[must_use]
    pub const fn conversation_id(&self) -> ConversationId {
        self.id
    }
}

/// Result of a rename request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenameOutcome {
    /// Empty or identical title; nothing was sent.
    Unchanged,
    /// Title applied locally and sent to the server.
    Renamed,
}

#[derive(Debug, Default)]
struct DirectoryState {
    conversations: Vec<Conversation>,
    selected: Option<ConversationId>,
    generation: u64,
    pending: Option<FetchTicket>,
    last_error: Option<String>,
}

impl DirectoryState {
    fn find(&self, id: ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    fn find_mut(&mut self, id: ConversationId) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    /// Move the selection, bumping the generation when it actually changes.
    fn set_selected(&mut self, id: Option<ConversationId>) -> Option<FetchTicket> {
        if self.selected != id {
            self.generation = self.generation.wrapping_add(1);
            self.selected = id;
            self.pending = None;
            tracing::debug!("selected conversation {id:?} (generation {})", self.generation);
        }

        let needs_fetch = id
            .and_then(|id| self.find(id))
            .is_some_and(|c| !c.is_loaded());
        if !needs_fetch {
            self.pending = None;
            return None;
        }
        if self.pending.is_none() {
            self.pending = id.map(|id| FetchTicket {
                id,
                generation: self.generation,
            });
        }
        self.pending
    }

    fn select_first(&mut self) -> Option<FetchTicket> {
        let first = self.conversations.first().map(|c| c.id);
        self.set_selected(first)
    }

    fn fail(&mut self, banner: &str, err: &ApiError) {
        if err.is_auth_rejected() {
            return;
        }
        tracing::error!("{banner}: {err}");
        self.last_error = Some(banner.to_string());
    }
}

/// Ordered conversations for the current session plus the selection pointer.
///
/// State lives behind a lock that is never held across a remote call, so
/// every operation observes the directory as of its own resumption point.
pub struct ConversationDirectory {
    api: Arc<dyn ChatApi>,
    state: RwLock<DirectoryState>,
}

impl ConversationDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new(api: Arc<dyn ChatApi>) -> Self {
        Self {
            api,
            state: RwLock::new(DirectoryState::default()),
        }
    }

    /// Fetch all conversations, in server order, replacing the local set.
    ///
    /// Logs already fetched are kept when the listing omits them. If nothing
    /// is selected, or the selection vanished, the first entry is selected.
    ///
    /// # Errors
    /// Returns an error if the listing fails; local state is unchanged.
    pub async fn list(&self) -> ChatResult<()> {
        let payloads = match self.api.list_conversations().await {
            Ok(payloads) => payloads,
            Err(err) => {
                self.state.write().await.fail(LIST_FAILED, &err);
                return Err(err.into());
            }
        };

        let now = Utc::now();
        let mut state = self.state.write().await;
        let mut fresh: Vec<Conversation> = payloads
            .into_iter()
            .filter_map(|payload| match payload.into_conversation(now) {
                Ok(conversation) => Some(conversation),
                Err(err) => {
                    tracing::warn!("skipping conversation entry: {err}");
                    None
                }
            })
            .collect();

        for conversation in &mut fresh {
            if conversation.messages.is_none() {
                conversation.messages = state
                    .find(conversation.id)
                    .and_then(|known| known.messages.clone());
            }
        }

        tracing::info!("loaded {} conversations", fresh.len());
        state.conversations = fresh;
        state.last_error = None;

        let selection_valid = state
            .selected
            .is_some_and(|id| state.find(id).is_some());
        if selection_valid {
            let selected = state.selected;
            state.set_selected(selected);
        } else {
            state.select_first();
        }
        Ok(())
    }

    /// Create a conversation, put it first and select it.
    ///
    /// A missing or blank title becomes the default title.
    ///
    /// # Errors
    /// Returns an error if the server call fails; local state is unchanged.
    pub async fn create(&self, title: Option<&str>) -> ChatResult<ConversationId> {
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_CONVERSATION_TITLE);

        let result = self
            .api
            .create_conversation(title)
            .await
            .and_then(|payload| payload.into_conversation(Utc::now()));
        let mut conversation = match result {
            Ok(conversation) => conversation,
            Err(err) => {
                self.state.write().await.fail(CREATE_FAILED, &err);
                return Err(err.into());
            }
        };
        if conversation.title.is_empty() {
            conversation.title = title.to_string();
        }
        conversation.messages.get_or_insert_with(Vec::new);

        let id = conversation.id;
        let mut state = self.state.write().await;
        state.conversations.retain(|c| c.id != id);
        state.conversations.insert(0, conversation);
        state.set_selected(Some(id));
        state.last_error = None;
        tracing::info!("created conversation {id}");
        Ok(id)
    }

    /// Rename a conversation.
    ///
    /// The trimmed title is applied locally before the server call and is
    /// kept even when that call fails.
    ///
    /// # Errors
    /// Returns an error if the conversation is unknown or the server call fails.
    pub async fn rename(&self, id: ConversationId, new_title: &str) -> ChatResult<RenameOutcome> {
        let new_title = new_title.trim();
        {
            let mut state = self.state.write().await;
            let conversation = state
                .find_mut(id)
                .ok_or(ChatError::UnknownConversation(id))?;
            if new_title.is_empty() || conversation.title == new_title {
                tracing::debug!("rename of {id} skipped, title unchanged");
                return Ok(RenameOutcome::Unchanged);
            }
            conversation.title = new_title.to_string();
        }

        let result = self
            .api
            .rename_conversation(id, new_title)
            .await
            .and_then(|payload| payload.into_conversation(Utc::now()));

        let mut state = self.state.write().await;
        match result {
            Ok(updated) => {
                if let Some(conversation) = state.find_mut(id) {
                    if !updated.title.is_empty() {
                        conversation.title = updated.title;
                    }
                    if updated.updated_at.is_some() {
                        conversation.updated_at = updated.updated_at;
                    }
                }
                state.last_error = None;
                Ok(RenameOutcome::Renamed)
            }
            Err(err) => {
                state.fail(RENAME_FAILED, &err);
                Err(err.into())
            }
        }
    }

    /// Delete a conversation on the server, then locally.
    ///
    /// Deleting the selected conversation selects the new first entry, or
    /// clears the selection when none remain.
    ///
    /// # Errors
    /// Returns an error if the conversation is unknown or the server call fails.
    pub async fn delete(&self, id: ConversationId) -> ChatResult<()> {
        if !self.contains(id).await {
            return Err(ChatError::UnknownConversation(id));
        }

        if let Err(err) = self.api.delete_conversation(id).await {
            self.state.write().await.fail(DELETE_FAILED, &err);
            return Err(err.into());
        }

        let mut state = self.state.write().await;
        state.conversations.retain(|c| c.id != id);
        if state.selected == Some(id) {
            state.select_first();
        }
        state.last_error = None;
        tracing::info!("deleted conversation {id}");
        Ok(())
    }

    /// Point the selection at `id` (or nothing). Does not fetch.
    ///
    /// Returns the ticket for the message fetch the new selection needs, if any.
    ///
    /// # Errors
    /// Returns `UnknownConversation` if `id` is not in the directory.
    pub async fn select(&self, id: Option<ConversationId>) -> ChatResult<Option<FetchTicket>> {
        let mut state = self.state.write().await;
        if let Some(id) = id {
            if state.find(id).is_none() {
                return Err(ChatError::UnknownConversation(id));
            }
        }
        Ok(state.set_selected(id))
    }

    /// The outstanding message fetch for the selection, if any.
    pub async fn pending_fetch(&self) -> Option<FetchTicket> {
        self.state.read().await.pending
    }

    /// Fetch messages for `ticket` and apply them if it is still outstanding.
    ///
    /// Messages appended locally while the fetch was in flight are kept
    /// after the fetched ones. Returns whether the result was applied.
    ///
    /// # Errors
    /// Returns an error if the fetch fails while the ticket is still current.
    pub async fn load_messages(&self, ticket: FetchTicket) -> ChatResult<bool> {
        let result = self
            .api
            .get_conversation(ticket.id)
            .await
            .and_then(|payload| payload.into_conversation(Utc::now()));

        let mut state = self.state.write().await;
        if state.pending != Some(ticket) {
            tracing::debug!(
                "discarding stale messages for {} (generation {})",
                ticket.id,
                ticket.generation
            );
            return Ok(false);
        }
        state.pending = None;

        let fetched = match result {
            Ok(fetched) => fetched,
            Err(err) => {
                state.fail(LOAD_FAILED, &err);
                return Err(err.into());
            }
        };

        let Some(conversation) = state.find_mut(ticket.id) else {
            return Ok(false);
        };
        let mut messages = fetched.messages.unwrap_or_default();
        let local = conversation.messages.take().unwrap_or_default();
        tracing::debug!(
            "loaded {} messages for {} ({} local)",
            messages.len(),
            ticket.id,
            local.len()
        );
        messages.extend(local);
        conversation.messages = Some(messages);
        if !fetched.title.is_empty() {
            conversation.title = fetched.title;
        }
        state.last_error = None;
        Ok(true)
    }

    /// Run the outstanding fetch, if any.
    ///
    /// # Errors
    /// Returns an error if the fetch fails.
    pub async fn load_pending(&self) -> ChatResult<bool> {
        match self.pending_fetch().await {
            Some(ticket) => self.load_messages(ticket).await,
            None => Ok(false),
        }
    }

    /// Select `id` and fetch its messages if they are not loaded yet.
    ///
    /// # Errors
    /// Returns an error if `id` is unknown or the fetch fails.
    pub async fn activate(&self, id: Option<ConversationId>) -> ChatResult<()> {
        if let Some(ticket) = self.select(id).await? {
            self.load_messages(ticket).await?;
        }
        Ok(())
    }

    /// Append a message to a conversation's log.
    ///
    /// # Errors
    /// Returns `UnknownConversation` if `id` is not in the directory.
    pub async fn append_message(&self, id: ConversationId, message: Message) -> ChatResult<()> {
        let mut state = self.state.write().await;
        let conversation = state
            .find_mut(id)
            .ok_or(ChatError::UnknownConversation(id))?;
        conversation.push_message(message);
        Ok(())
    }

    /// Snapshot of all conversations, in display order.
    pub async fn conversations(&self) -> Vec<Conversation> {
        self.state.read().await.conversations.clone()
    }

    /// Snapshot of one conversation.
    pub async fn conversation(&self, id: ConversationId) -> Option<Conversation> {
        self.state.read().await.find(id).cloned()
    }

    /// Whether `id` is in the directory.
    pub async fn contains(&self, id: ConversationId) -> bool {
        self.state.read().await.find(id).is_some()
    }

    /// Selected conversation id.
    pub async fn selected_id(&self) -> Option<ConversationId> {
        self.state.read().await.selected
    }

    /// Snapshot of the selected conversation.
    pub async fn selected(&self) -> Option<Conversation> {
        let state = self.state.read().await;
        state.selected.and_then(|id| state.find(id)).cloned()
    }

    /// Messages of `id`, empty when unknown or unloaded.
    pub async fn messages(&self, id: ConversationId) -> Vec<Message> {
        self.state
            .read()
            .await
            .find(id)
            .map(|c| c.messages().to_vec())
            .unwrap_or_default()
    }

    /// Inline error banner from the last failed action.
    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }

    /// Dismiss the error banner.
    pub async fn clear_error(&self) {
        self.state.write().await.last_error = None;
    }

    /// Forget everything, e.g. after sign-out. Outstanding fetches become stale.
    pub async fn reset(&self) {
        let mut state = self.state.write().await;
        let generation = state.generation.wrapping_add(1);
        *state = DirectoryState {
            generation,
            ..DirectoryState::default()
        };
        tracing::debug!("directory reset");
    }
}
