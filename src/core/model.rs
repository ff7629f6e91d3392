//! Domain types shared by the session, directory and exchange layers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::ids::{ConversationId, UserId};

/// Title given to conversations created without one.
pub const DEFAULT_CONVERSATION_TITLE: &str = "New Conversation";

/// Author of a message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    /// The signed-in user.
    User,
    /// The remote bot service.
    Bot,
}

impl Sender {
    /// Stable string form used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "bot",
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Sender {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "bot" => Ok(Self::Bot),
            _ => Err(value.to_string()),
        }
    }
}

/// Coarse attachment category, derived client-side.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    /// `image/*`.
    Image,
    /// `video/*`.
    Video,
    /// `audio/*`.
    Audio,
    /// Office formats, PDF and plain text.
    Document,
    /// Anything else.
    Other,
}

/// MIME prefixes that count as documents.
const DOCUMENT_MIME_PREFIXES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml",
    "text/",
];

impl FileType {
    /// Stable string form used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
            Self::Other => "other",
        }
    }

    /// Categorise by MIME type prefix.
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Self {
        let content_type = content_type.trim().to_ascii_lowercase();
        if content_type.starts_with("image/") {
            Self::Image
        } else if content_type.starts_with("video/") {
            Self::Video
        } else if content_type.starts_with("audio/") {
            Self::Audio
        } else if DOCUMENT_MIME_PREFIXES
            .iter()
            .any(|prefix| content_type.starts_with(prefix))
        {
            Self::Document
        } else {
            Self::Other
        }
    }

    /// Categorise by file extension, used when no content type is known.
    #[must_use]
    pub fn from_file_name(file_name: &str) -> Self {
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "jpg" | "jpeg" | "png" | "gif" | "svg" | "webp" => Self::Image,
            "mp4" | "webm" | "avi" | "mov" => Self::Video,
            "mp3" | "wav" | "ogg" => Self::Audio,
            "pdf" | "doc" | "docx" | "txt" | "rtf" | "xls" | "xlsx" | "csv" | "ppt" | "pptx" => {
                Self::Document
            }
            _ => Self::Other,
        }
    }

    /// Categorise with the content type when present, else the file name.
    #[must_use]
    pub fn categorize(content_type: Option<&str>, file_name: &str) -> Self {
        match content_type {
            Some(ct) if !ct.trim().is_empty() => Self::from_content_type(ct),
            _ => Self::from_file_name(file_name),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Descriptor of an uploaded attachment.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    /// Name of the file on the user's machine.
    pub original_file_name: String,
    /// Size in bytes.
    pub size: u64,
    /// MIME type reported for the upload.
    pub content_type: String,
    /// Derived category.
    pub file_type: FileType,
    /// Server-assigned download URL.
    pub url: String,
    /// Server-side stored name, when the server reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// A single entry of a conversation log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Markdown body.
    pub text: String,
    /// Author.
    pub sender: Sender,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Marks a locally synthesised failure notice.
    #[serde(default)]
    pub is_error: bool,
    /// Attachment descriptor, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_info: Option<FileInfo>,
}

impl Message {
    /// Build a user message stamped now.
    #[must_use]
    pub fn user(text: impl Into<String>, file_info: Option<FileInfo>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::User,
            timestamp: Utc::now(),
            is_error: false,
            file_info,
        }
    }

    /// Build a bot message.
    #[must_use]
    pub fn bot(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::Bot,
            timestamp,
            is_error: false,
            file_info: None,
        }
    }

    /// Build a local failure notice, shown as a bot bubble.
    #[must_use]
    pub fn error_notice(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::Bot,
            timestamp: Utc::now(),
            is_error: true,
            file_info: None,
        }
    }
}

/// A conversation as held by the directory.
#[derive(Clone, Debug, PartialEq)]
pub struct Conversation {
    /// Server-assigned identifier.
    pub id: ConversationId,
    /// Display title.
    pub title: String,
    /// Message log; `None` until fetched.
    pub messages: Option<Vec<Message>>,
    /// Creation time reported by the server.
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time reported by the server.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Conversation {
    /// Build a conversation with an unloaded message log.
    #[must_use]
    pub fn new(id: ConversationId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            messages: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Whether the message log has been fetched (or locally started).
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.messages.is_some()
    }

    /// Messages fetched so far, empty when unloaded.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        self.messages.as_deref().unwrap_or(&[])
    }

    /// Append to the log, starting it if it was unloaded.
    pub fn push_message(&mut self, message: Message) {
        self.messages.get_or_insert_with(Vec::new).push(message);
    }
}

/// Identity of the signed-in user, persisted under the `user` key.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Server user id.
    pub id: UserId,
    /// Login name.
    pub username: String,
}

/// An authenticated session. Identity and credential always travel together.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Session {
    /// Signed-in user.
    pub user: UserIdentity,
    /// Opaque bearer credential.
    pub token: String,
}
