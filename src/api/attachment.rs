//! Files staged for upload alongside a message.

use std::fmt;
use std::io;
use std::path::Path;

/// An in-memory file waiting to be uploaded.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

impl Attachment {
    /// Build an attachment; the content type is guessed from the name when not given.
    #[must_use]
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>, content_type: Option<String>) -> Self {
        let file_name = file_name.into();
        let content_type = content_type.unwrap_or_else(|| {
            mime_guess::from_path(&file_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    /// Read a file from disk, refusing it before reading when it exceeds `max_bytes`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, or `InvalidInput` when it is too large.
    pub async fn from_path(path: impl AsRef<Path>, max_bytes: u64) -> io::Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map_or_else(|| "upload".to_string(), |n| n.to_string_lossy().into_owned());

        let size = tokio::fs::metadata(path).await?.len();
        if size > max_bytes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{file_name} is {size} bytes, the limit is {max_bytes} bytes"),
            ));
        }

        let bytes = tokio::fs::read(path).await?;
        Ok(Self::new(file_name, bytes, None))
    }

    /// File name as shown to the user.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// MIME type sent with the upload.
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Raw contents.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        u64::try_from(self.bytes.len()).unwrap_or(u64::MAX)
    }

    /// Check the attachment against the upload ceiling.
    ///
    /// # Errors
    /// Returns a human-readable reason when the file is empty or too large.
    pub fn check_size(&self, max_bytes: u64) -> Result<(), String> {
        if self.bytes.is_empty() {
            return Err(format!("{} is empty", self.file_name));
        }
        if self.size() > max_bytes {
            return Err(format!(
                "{} is {} bytes, the limit is {max_bytes} bytes",
                self.file_name,
                self.size()
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_guess() {
        assert_eq!(Attachment::new("a.pdf", vec![1], None).content_type(), "application/pdf");
        assert_eq!(
            Attachment::new("blob", vec![1], None).content_type(),
            "application/octet-stream"
        );
        assert_eq!(
            Attachment::new("a.pdf", vec![1], Some("text/plain".to_string())).content_type(),
            "text/plain"
        );
    }

    #[test]
    fn test_check_size() {
        assert!(Attachment::new("a.txt", vec![], None).check_size(10).is_err());
        assert!(Attachment::new("a.txt", vec![0; 11], None).check_size(10).is_err());
        assert!(Attachment::new("a.txt", vec![0; 10], None).check_size(10).is_ok());
    }

    #[tokio::test]
    async fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();

        let attachment = Attachment::from_path(&path, 1024).await.unwrap();
        assert_eq!(attachment.file_name(), "notes.txt");
        assert_eq!(attachment.size(), 5);
        assert_eq!(attachment.content_type(), "text/plain");
    }

    #[tokio::test]
    async fn test_from_path_refuses_oversized_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video.mp4");
        std::fs::write(&path, vec![0u8; 64]).unwrap();

        let err = Attachment::from_path(&path, 32).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(err.to_string().contains("video.mp4 is 64 bytes, the limit is 32 bytes"));
        assert!(Attachment::from_path(&path, 64).await.is_ok());
    }
}
