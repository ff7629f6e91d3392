//! Pending input state of the message composer.

use crate::api::Attachment;

/// Text and attachment staged for the next send.
#[derive(Clone, Debug, Default)]
pub struct Composer {
    /// Text typed so far.
    pub input: String,
    /// File staged for upload.
    pub attachment: Option<Attachment>,
    /// Set when the input should regain focus; consumed by the front-end.
    pub focus_requested: bool,
}

impl Composer {
    /// Whether there is anything to send.
    #[must_use]
    pub fn has_content(&self) -> bool {
        !self.input.trim().is_empty() || self.attachment.is_some()
    }

    /// Drop staged input.
    pub fn clear(&mut self) {
        self.input.clear();
        self.attachment = None;
    }
}
