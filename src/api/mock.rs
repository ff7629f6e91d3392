//! Scripted in-process [`ChatApi`] for tests.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::json;
use tokio::sync::oneshot;

use crate::api::{
    ApiFuture, Attachment, AuthReply, ChatApi, ConversationPayload, Credentials, MessagePayload,
    SendRequest, UploadPayload,
};
use crate::core::errors::{ApiError, ApiResult};
use crate::core::ids::ConversationId;
use crate::session::AuthGate;

/// One recorded call.
#[derive(Clone, Debug, PartialEq)]
pub enum MockCall {
    Login(String),
    Register(String),
    ListConversations,
    GetConversation(ConversationId),
    CreateConversation(String),
    RenameConversation(ConversationId, String),
    DeleteConversation(ConversationId),
    SendMessage(SendRequest),
    UploadFile(String),
}

#[derive(Default)]
struct Script {
    login: VecDeque<ApiResult<AuthReply>>,
    register: VecDeque<ApiResult<AuthReply>>,
    list: VecDeque<ApiResult<Vec<ConversationPayload>>>,
    get: VecDeque<ApiResult<ConversationPayload>>,
    create: VecDeque<ApiResult<ConversationPayload>>,
    rename: VecDeque<ApiResult<ConversationPayload>>,
    delete: VecDeque<ApiResult<()>>,
    send: VecDeque<ApiResult<MessagePayload>>,
    upload: VecDeque<ApiResult<UploadPayload>>,
    get_holds: VecDeque<oneshot::Receiver<()>>,
    send_holds: VecDeque<oneshot::Receiver<()>>,
    calls: Vec<MockCall>,
}

/// Results are consumed in call order; an unscripted call fails as unreachable.
#[derive(Default)]
pub struct MockChatApi {
    script: Mutex<Script>,
    gate: Option<AuthGate>,
}

/// Conversation payload without messages.
pub fn conversation(id: i64, title: &str) -> ConversationPayload {
    ConversationPayload {
        id: Some(id),
        title: Some(title.to_string()),
        ..ConversationPayload::default()
    }
}

/// Conversation payload with `(sender, text)` messages.
pub fn conversation_with(id: i64, title: &str, messages: &[(&str, &str)]) -> ConversationPayload {
    ConversationPayload {
        messages: Some(
            messages
                .iter()
                .enumerate()
                .map(|(i, (sender, text))| {
                    json!({ "sender": sender, "text": text, "timestamp": 1_700_000_000_000_i64 + i as i64 })
                })
                .collect(),
        ),
        ..conversation(id, title)
    }
}

impl MockChatApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route scripted `AuthRejected` results through `gate`, as the HTTP client does.
    pub fn with_gate(mut self, gate: AuthGate) -> Self {
        self.gate = Some(gate);
        self
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push_login(&self, result: ApiResult<AuthReply>) {
        self.script().login.push_back(result);
    }

    pub fn push_register(&self, result: ApiResult<AuthReply>) {
        self.script().register.push_back(result);
    }

    pub fn push_list(&self, result: ApiResult<Vec<ConversationPayload>>) {
        self.script().list.push_back(result);
    }

    pub fn push_get(&self, result: ApiResult<ConversationPayload>) {
        self.script().get.push_back(result);
    }

    pub fn push_create(&self, result: ApiResult<ConversationPayload>) {
        self.script().create.push_back(result);
    }

    pub fn push_rename(&self, result: ApiResult<ConversationPayload>) {
        self.script().rename.push_back(result);
    }

    pub fn push_delete(&self, result: ApiResult<()>) {
        self.script().delete.push_back(result);
    }

    pub fn push_send(&self, result: ApiResult<MessagePayload>) {
        self.script().send.push_back(result);
    }

    pub fn push_upload(&self, result: ApiResult<UploadPayload>) {
        self.script().upload.push_back(result);
    }

    /// Hold the next `get_conversation` until the returned sender fires or drops.
    pub fn hold_next_get(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.script().get_holds.push_back(rx);
        tx
    }

    /// Hold the next `send_message` until the returned sender fires or drops.
    pub fn hold_next_send(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.script().send_holds.push_back(rx);
        tx
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.script().calls.clone()
    }

    pub fn sent_requests(&self) -> Vec<SendRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                MockCall::SendMessage(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: MockCall) {
        self.script().calls.push(call);
    }

    async fn finish<T>(&self, result: Option<ApiResult<T>>) -> ApiResult<T> {
        let result =
            result.unwrap_or_else(|| Err(ApiError::NetworkUnreachable("unscripted call".to_string())));
        if matches!(result, Err(ApiError::AuthRejected { .. })) {
            if let Some(gate) = &self.gate {
                gate.reject().await;
            }
        }
        result
    }
}

impl ChatApi for MockChatApi {
    fn login(&self, credentials: Credentials) -> ApiFuture<'_, ApiResult<AuthReply>> {
        self.record(MockCall::Login(credentials.username));
        let result = self.script().login.pop_front();
        Box::pin(self.finish(result))
    }

    fn register(&self, credentials: Credentials) -> ApiFuture<'_, ApiResult<AuthReply>> {
        self.record(MockCall::Register(credentials.username));
        let result = self.script().register.pop_front();
        Box::pin(self.finish(result))
    }

    fn list_conversations(&self) -> ApiFuture<'_, ApiResult<Vec<ConversationPayload>>> {
        self.record(MockCall::ListConversations);
        let result = self.script().list.pop_front();
        Box::pin(self.finish(result))
    }

    fn get_conversation(
        &self,
        id: ConversationId,
    ) -> ApiFuture<'_, ApiResult<ConversationPayload>> {
        self.record(MockCall::GetConversation(id));
        let (result, hold) = {
            let mut script = self.script();
            (script.get.pop_front(), script.get_holds.pop_front())
        };
        Box::pin(async move {
            if let Some(hold) = hold {
                let _ = hold.await;
            }
            self.finish(result).await
        })
    }

    fn create_conversation(&self, title: &str) -> ApiFuture<'_, ApiResult<ConversationPayload>> {
        self.record(MockCall::CreateConversation(title.to_string()));
        let result = self.script().create.pop_front();
        Box::pin(self.finish(result))
    }

    fn rename_conversation(
        &self,
        id: ConversationId,
        title: &str,
    ) -> ApiFuture<'_, ApiResult<ConversationPayload>> {
        self.record(MockCall::RenameConversation(id, title.to_string()));
        let result = self.script().rename.pop_front();
        Box::pin(self.finish(result))
    }

    fn delete_conversation(&self, id: ConversationId) -> ApiFuture<'_, ApiResult<()>> {
        self.record(MockCall::DeleteConversation(id));
        let result = self.script().delete.pop_front();
        Box::pin(self.finish(result))
    }

    fn send_message(&self, request: SendRequest) -> ApiFuture<'_, ApiResult<MessagePayload>> {
        self.record(MockCall::SendMessage(request));
        let (result, hold) = {
            let mut script = self.script();
            (script.send.pop_front(), script.send_holds.pop_front())
        };
        Box::pin(async move {
            if let Some(hold) = hold {
                let _ = hold.await;
            }
            self.finish(result).await
        })
    }

    fn upload_file(&self, attachment: Attachment) -> ApiFuture<'_, ApiResult<UploadPayload>> {
        self.record(MockCall::UploadFile(attachment.file_name().to_string()));
        let result = self.script().upload.pop_front();
        Box::pin(self.finish(result))
    }
}
