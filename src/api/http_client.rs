//! `reqwest`-backed implementation of [`ChatApi`].

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use url::Url;

use crate::api::{
    ApiFuture, Attachment, AuthReply, ChatApi, ConversationPayload, Credentials, MessagePayload,
    SendRequest, UploadPayload,
};
use crate::core::config::ClientConfig;
use crate::core::errors::{ApiError, ApiResult, ChatError, ChatResult};
use crate::core::ids::ConversationId;
use crate::session::AuthGate;

/// Error body shape used by the backend.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// HTTP client for the chat backend.
///
/// Every request carries the bearer token currently in durable storage, and
/// every 401 goes through the [`AuthGate`] before surfacing as
/// [`ApiError::AuthRejected`].
pub struct HttpChatApi {
    client: reqwest::Client,
    base_url: Url,
    gate: AuthGate,
}

impl HttpChatApi {
    /// Build a client from configuration.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot be created.
    pub fn new(config: &ClientConfig, gate: AuthGate) -> ChatResult<Self> {
        let base_url = config.base_url()?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .gzip(true)
            .build()
            .map_err(|e| ChatError::InvalidConfig(format!("Failed to build HTTP client: {e}")))?;

        tracing::info!("chat API at {base_url}");
        Ok(Self {
            client,
            base_url,
            gate,
        })
    }

    fn request(&self, method: Method, path: &str) -> ApiResult<RequestBuilder> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ApiError::Request(e.to_string()))?;
        tracing::debug!("{method} {url}");
        Ok(self.client.request(method, url))
    }

    /// Attach the credential, send, and map failure statuses.
    async fn execute(&self, request: RequestBuilder) -> ApiResult<Response> {
        let request = match self.gate.bearer_token().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(|e| {
            let err = ApiError::from(e);
            tracing::warn!("request failed: {err}");
            err
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = Self::error_message(response).await;
        if status == StatusCode::UNAUTHORIZED {
            self.gate.reject().await;
            return Err(ApiError::AuthRejected { message });
        }
        tracing::warn!("server returned {status}: {message:?}");
        Err(ApiError::server(status, message))
    }

    /// `message` field of a failure body, if any.
    async fn error_message(response: Response) -> Option<String> {
        response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message)
            .filter(|message| !message.trim().is_empty())
    }

    /// Decode a success body, falling back to the default payload when it is
    /// empty or not the expected JSON.
    async fn read_lenient<T>(response: Response, what: &str) -> ApiResult<T>
    where
        T: DeserializeOwned + Default,
    {
        let body = response.bytes().await?;
        if body.is_empty() {
            tracing::warn!("empty {what} body");
            return Ok(T::default());
        }
        match serde_json::from_slice(&body) {
            Ok(value) => Ok(value),
            Err(err) => {
                tracing::warn!("unreadable {what} body: {err}");
                Ok(T::default())
            }
        }
    }

    async fn authenticate(&self, path: &str, credentials: Credentials) -> ApiResult<AuthReply> {
        let request = self.request(Method::POST, path)?.json(&credentials);
        let response = self.execute(request).await?;
        Self::read_lenient(response, "auth").await
    }
}

impl ChatApi for HttpChatApi {
    fn login(&self, credentials: Credentials) -> ApiFuture<'_, ApiResult<AuthReply>> {
        Box::pin(async move { self.authenticate("auth/login", credentials).await })
    }

    fn register(&self, credentials: Credentials) -> ApiFuture<'_, ApiResult<AuthReply>> {
        Box::pin(async move { self.authenticate("auth/register", credentials).await })
    }

    fn list_conversations(&self) -> ApiFuture<'_, ApiResult<Vec<ConversationPayload>>> {
        Box::pin(async move {
            let response = self
                .execute(self.request(Method::GET, "chat/conversations")?)
                .await?;
            let body: Value = response.json().await?;
            let Value::Array(entries) = body else {
                return Err(ApiError::MalformedResponse(
                    "conversation list is not an array".to_string(),
                ));
            };

            Ok(entries
                .into_iter()
                .filter_map(|entry| match serde_json::from_value(entry) {
                    Ok(payload) => Some(payload),
                    Err(err) => {
                        tracing::warn!("skipping undecodable conversation: {err}");
                        None
                    }
                })
                .collect())
        })
    }

    fn get_conversation(
        &self,
        id: ConversationId,
    ) -> ApiFuture<'_, ApiResult<ConversationPayload>> {
        Box::pin(async move {
            let path = format!("chat/conversations/{id}");
            let response = self.execute(self.request(Method::GET, &path)?).await?;
            Self::read_lenient(response, "conversation").await
        })
    }

    fn create_conversation(&self, title: &str) -> ApiFuture<'_, ApiResult<ConversationPayload>> {
        let body = json!({ "title": title });
        Box::pin(async move {
            let request = self
                .request(Method::POST, "chat/conversations")?
                .json(&body);
            let response = self.execute(request).await?;
            Self::read_lenient(response, "conversation").await
        })
    }

    fn rename_conversation(
        &self,
        id: ConversationId,
        title: &str,
    ) -> ApiFuture<'_, ApiResult<ConversationPayload>> {
        let body = json!({ "title": title });
        Box::pin(async move {
            let path = format!("chat/conversations/{id}");
            let request = self.request(Method::PUT, &path)?.json(&body);
            let response = self.execute(request).await?;
            Self::read_lenient(response, "conversation").await
        })
    }

    fn delete_conversation(&self, id: ConversationId) -> ApiFuture<'_, ApiResult<()>> {
        Box::pin(async move {
            let path = format!("chat/conversations/{id}");
            self.execute(self.request(Method::DELETE, &path)?).await?;
            Ok(())
        })
    }

    fn send_message(&self, request: SendRequest) -> ApiFuture<'_, ApiResult<MessagePayload>> {
        Box::pin(async move {
            let builder = self.request(Method::POST, "chat/message")?.json(&request);
            let response = self.execute(builder).await?;
            Self::read_lenient(response, "message").await
        })
    }

    fn upload_file(&self, attachment: Attachment) -> ApiFuture<'_, ApiResult<UploadPayload>> {
        Box::pin(async move {
            let part = reqwest::multipart::Part::bytes(attachment.bytes().to_vec())
                .file_name(attachment.file_name().to_string())
                .mime_str(attachment.content_type())?;
            let form = reqwest::multipart::Form::new().part("file", part);

            tracing::info!(
                "uploading {} ({} bytes)",
                attachment.file_name(),
                attachment.size()
            );
            let request = self.request(Method::POST, "files/upload")?.multipart(form);
            let response = self.execute(request).await?;
            Self::read_lenient(response, "upload").await
        })
    }
}
