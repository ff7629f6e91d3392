//! Wire payloads exchanged with the chat backend.
//!
//! Response payloads are deliberately loose: every field is optional and
//! unknown fields are ignored. Each payload has a conversion into the strict
//! domain type that fills defaults explicitly and logs what it had to patch.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::attachment::Attachment;
use crate::core::errors::{ApiError, ApiResult};
use crate::core::ids::{ConversationId, UserId};
use crate::core::model::{Conversation, FileInfo, FileType, Message, Sender, Session, UserIdentity};

/// Body used when a reply carries no usable text.
pub const EMPTY_REPLY_TEXT: &str = "No response received";

/// Username/password pair for the auth endpoints.
#[derive(Clone, Serialize)]
pub struct Credentials {
    /// Login name.
    pub username: String,
    /// Plain password, only ever sent over the wire.
    pub password: String,
}

impl Credentials {
    /// Build credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Response of `/auth/login` and `/auth/register`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthReply {
    /// Bearer credential.
    pub token: Option<String>,
    /// Canonical username.
    pub username: Option<String>,
    /// Server user id.
    pub user_id: Option<i64>,
}

impl AuthReply {
    /// Turn the reply into a session.
    ///
    /// # Errors
    /// Returns `MalformedResponse` if the token or user id is missing.
    pub fn into_session(self, requested_username: &str) -> ApiResult<Session> {
        let token = self
            .token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ApiError::MalformedResponse("auth reply without token".to_string()))?;
        let user_id = self
            .user_id
            .ok_or_else(|| ApiError::MalformedResponse("auth reply without userId".to_string()))?;
        let username = self.username.unwrap_or_else(|| {
            tracing::warn!("auth reply without username, keeping the submitted one");
            requested_username.to_string()
        });

        Ok(Session {
            user: UserIdentity {
                id: UserId::new(user_id),
                username,
            },
            token,
        })
    }
}

/// Body of `POST /chat/message`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    /// Message text.
    pub message: String,
    /// Target conversation.
    pub conversation_id: ConversationId,
    /// Uploaded attachment, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_info: Option<FileInfo>,
}

/// A chat message as the server sends it, either as a send reply or inside
/// a conversation's history.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MessagePayload {
    /// Body, as the client-facing field name.
    pub message: Option<String>,
    /// Body, as the backend's own field name.
    pub text: Option<String>,
    /// `user` or `bot`.
    pub sender: Option<String>,
    /// ISO-8601 string, epoch millis, or a date-time component array.
    pub timestamp: Option<Value>,
    /// Attachment descriptor.
    pub file_info: Option<UploadPayload>,
}

impl MessagePayload {
    /// Payload carrying only a body, as a bare reply would.
    #[must_use]
    pub fn with_message(text: impl Into<String>) -> Self {
        Self {
            message: Some(text.into()),
            ..Self::default()
        }
    }

    /// Normalise into a message: sender defaults to bot, timestamp to `now`.
    #[must_use]
    pub fn into_message(self, now: DateTime<Utc>) -> Message {
        let text = self
            .message
            .filter(|m| !m.is_empty())
            .or_else(|| self.text.filter(|t| !t.is_empty()))
            .unwrap_or_else(|| {
                tracing::warn!("message payload without body, using placeholder");
                EMPTY_REPLY_TEXT.to_string()
            });

        let sender = match self.sender.as_deref() {
            None => Sender::Bot,
            Some(raw) => raw.parse().unwrap_or_else(|unknown| {
                tracing::warn!("unknown sender {unknown:?}, treating as bot");
                Sender::Bot
            }),
        };

        let timestamp = match self.timestamp.as_ref() {
            None | Some(Value::Null) => now,
            Some(raw) => parse_timestamp(raw).unwrap_or_else(|| {
                tracing::warn!("unparsable timestamp {raw}, using current time");
                now
            }),
        };

        let file_info = self.file_info.and_then(|info| info.into_known_file_info());

        Message {
            text,
            sender,
            timestamp,
            is_error: false,
            file_info,
        }
    }
}

/// A conversation as the server sends it.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConversationPayload {
    /// Server id.
    pub id: Option<i64>,
    /// Display title.
    pub title: Option<String>,
    /// Raw message entries, decoded one by one.
    pub messages: Option<Vec<Value>>,
    /// Creation time.
    pub created_at: Option<Value>,
    /// Last update time.
    pub updated_at: Option<Value>,
}

impl ConversationPayload {
    /// Normalise into a conversation.
    ///
    /// A missing title becomes empty and undecodable message entries are
    /// skipped; an absent `messages` field leaves the log unloaded.
    ///
    /// # Errors
    /// Returns `MalformedResponse` if the id is missing.
    pub fn into_conversation(self, now: DateTime<Utc>) -> ApiResult<Conversation> {
        let id = self
            .id
            .map(ConversationId::new)
            .ok_or_else(|| ApiError::MalformedResponse("conversation without id".to_string()))?;

        let messages = self.messages.map(|entries| {
            entries
                .into_iter()
                .filter_map(|entry| match serde_json::from_value::<MessagePayload>(entry) {
                    Ok(payload) => Some(payload.into_message(now)),
                    Err(err) => {
                        tracing::warn!("skipping undecodable message in conversation {id}: {err}");
                        None
                    }
                })
                .collect()
        });

        Ok(Conversation {
            id,
            title: self.title.unwrap_or_default(),
            messages,
            created_at: self.created_at.as_ref().and_then(parse_timestamp),
            updated_at: self.updated_at.as_ref().and_then(parse_timestamp),
        })
    }
}

/// Response of `POST /files/upload`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UploadPayload {
    /// Download URL.
    pub url: Option<String>,
    /// Name on the user's machine.
    pub original_file_name: Option<String>,
    /// Size in bytes.
    pub size: Option<u64>,
    /// MIME type.
    pub content_type: Option<String>,
    /// Stored name.
    pub file_name: Option<String>,
}

impl UploadPayload {
    /// Combine with the uploaded attachment, which supplies any missing metadata.
    ///
    /// # Errors
    /// Returns `MalformedResponse` if the server did not return a URL.
    pub fn into_file_info(self, attachment: &Attachment) -> ApiResult<FileInfo> {
        let url = self
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ApiError::MalformedResponse("upload reply without url".to_string()))?;
        let original_file_name = self
            .original_file_name
            .unwrap_or_else(|| attachment.file_name().to_string());
        let content_type = self
            .content_type
            .unwrap_or_else(|| attachment.content_type().to_string());

        Ok(FileInfo {
            file_type: FileType::categorize(Some(&content_type), &original_file_name),
            original_file_name,
            size: self.size.unwrap_or_else(|| attachment.size()),
            content_type,
            url,
            file_name: self.file_name,
        })
    }

    fn into_known_file_info(self) -> Option<FileInfo> {
        let url = self.url?;
        let original_file_name = self.original_file_name.unwrap_or_default();
        Some(FileInfo {
            file_type: FileType::categorize(self.content_type.as_deref(), &original_file_name),
            original_file_name,
            size: self.size.unwrap_or(0),
            content_type: self.content_type.unwrap_or_default(),
            url,
            file_name: self.file_name,
        })
    }
}

/// Parse the timestamp shapes the backend is known to emit.
#[must_use]
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            }),
        Value::Number(millis) => millis.as_i64().and_then(DateTime::from_timestamp_millis),
        Value::Array(parts) => {
            let parts: Vec<i64> = parts.iter().map(Value::as_i64).collect::<Option<_>>()?;
            let [year, month, day, hour, minute, rest @ ..] = parts.as_slice() else {
                return None;
            };
            let second = rest.first().copied().unwrap_or(0);
            let nano = rest.get(1).copied().unwrap_or(0);
            let date = NaiveDate::from_ymd_opt(
                i32::try_from(*year).ok()?,
                u32::try_from(*month).ok()?,
                u32::try_from(*day).ok()?,
            )?;
            let naive = date.and_hms_nano_opt(
                u32::try_from(*hour).ok()?,
                u32::try_from(*minute).ok()?,
                u32::try_from(second).ok()?,
                u32::try_from(nano).ok()?,
            )?;
            Some(naive.and_utc())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_reply_defaults_sender_and_timestamp() {
        let payload: MessagePayload =
            serde_json::from_value(json!({ "message": "Try Portugal" })).unwrap();
        let message = payload.into_message(fixed_now());

        assert_eq!(message.text, "Try Portugal");
        assert_eq!(message.sender, Sender::Bot);
        assert_eq!(message.timestamp, fixed_now());
        assert!(!message.is_error);
    }

    #[test]
    fn test_reply_prefers_message_then_text() {
        let payload: MessagePayload =
            serde_json::from_value(json!({ "message": "", "text": "from text", "sender": "user" }))
                .unwrap();
        let message = payload.into_message(fixed_now());
        assert_eq!(message.text, "from text");
        assert_eq!(message.sender, Sender::User);

        let empty = MessagePayload::default().into_message(fixed_now());
        assert_eq!(empty.text, EMPTY_REPLY_TEXT);
    }

    #[test]
    fn test_timestamp_shapes() {
        let expected = Utc.with_ymd_and_hms(2024, 4, 1, 10, 30, 5).unwrap();

        assert_eq!(parse_timestamp(&json!("2024-04-01T10:30:05Z")), Some(expected));
        assert_eq!(parse_timestamp(&json!("2024-04-01T12:30:05+02:00")), Some(expected));
        assert_eq!(parse_timestamp(&json!("2024-04-01T10:30:05")), Some(expected));
        assert_eq!(parse_timestamp(&json!([2024, 4, 1, 10, 30, 5])), Some(expected));
        assert_eq!(
            parse_timestamp(&json!(expected.timestamp_millis())),
            Some(expected)
        );
        assert_eq!(parse_timestamp(&json!("yesterday")), None);
        assert_eq!(parse_timestamp(&json!([2024, 13])), None);
    }

    #[test]
    fn test_unparsable_timestamp_falls_back_to_now() {
        let payload: MessagePayload =
            serde_json::from_value(json!({ "text": "hi", "timestamp": "soon" })).unwrap();
        assert_eq!(payload.into_message(fixed_now()).timestamp, fixed_now());
    }

    #[test]
    fn test_conversation_payload_skips_bad_messages() {
        let payload: ConversationPayload = serde_json::from_value(json!({
            "id": 9,
            "title": "Trip Planning",
            "messages": [
                { "text": "hello", "sender": "user", "timestamp": "2024-04-01T10:00:00" },
                "not a message",
                { "text": "hi there", "sender": "bot" }
            ],
            "createdAt": "2024-04-01T09:00:00"
        }))
        .unwrap();

        let conversation = payload.into_conversation(fixed_now()).unwrap();
        assert_eq!(conversation.id, ConversationId::new(9));
        assert_eq!(conversation.messages().len(), 2);
        assert_eq!(conversation.messages()[0].sender, Sender::User);
        assert!(conversation.created_at.is_some());
    }

    #[test]
    fn test_conversation_without_messages_stays_unloaded() {
        let payload: ConversationPayload =
            serde_json::from_value(json!({ "id": 1, "title": "x" })).unwrap();
        assert!(!payload.into_conversation(fixed_now()).unwrap().is_loaded());

        let no_id: ConversationPayload = serde_json::from_value(json!({ "title": "x" })).unwrap();
        assert!(matches!(
            no_id.into_conversation(fixed_now()),
            Err(ApiError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_auth_reply_into_session() {
        let reply: AuthReply = serde_json::from_value(
            json!({ "token": "tok", "username": "ada", "userId": 4 }),
        )
        .unwrap();
        let session = reply.into_session("ignored").unwrap();
        assert_eq!(session.token, "tok");
        assert_eq!(session.user.id, UserId::new(4));
        assert_eq!(session.user.username, "ada");

        let missing_token: AuthReply = serde_json::from_value(json!({ "userId": 4 })).unwrap();
        assert!(missing_token.into_session("ada").is_err());
    }

    #[test]
    fn test_upload_payload_fills_from_attachment() {
        let attachment = Attachment::new("photo.png", vec![1, 2, 3], None);
        let payload: UploadPayload =
            serde_json::from_value(json!({ "url": "/api/files/abc.png" })).unwrap();

        let info = payload.into_file_info(&attachment).unwrap();
        assert_eq!(info.original_file_name, "photo.png");
        assert_eq!(info.size, 3);
        assert_eq!(info.content_type, "image/png");
        assert_eq!(info.file_type, FileType::Image);

        let no_url = UploadPayload::default();
        assert!(no_url.into_file_info(&attachment).is_err());
    }

    #[test]
    fn test_send_request_shape() {
        let request = SendRequest {
            message: "hello".to_string(),
            conversation_id: ConversationId::new(3),
            file_info: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, json!({ "message": "hello", "conversationId": 3 }));
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let credentials = Credentials::new("ada", "hunter2");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("ada"));
        assert!(!debug.contains("hunter2"));
    }
}
