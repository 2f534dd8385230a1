use std::path::Path;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::warn;

/// Reads an image and returns it base64-encoded.
///
/// `None` means the image should be skipped; it never aborts a judgment.
#[async_trait]
pub trait ImageEncoder: Send + Sync {
    async fn encode_to_base64(&self, path: &Path) -> Option<String>;
}

/// Encodes images straight from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileImageEncoder;

#[async_trait]
impl ImageEncoder for FileImageEncoder {
    async fn encode_to_base64(&self, path: &Path) -> Option<String> {
        match tokio::fs::read(path).await {
            Ok(bytes) if bytes.is_empty() => {
                warn!(path = %path.display(), "image file is empty, skipping");
                None
            }
            Ok(bytes) => Some(STANDARD.encode(bytes)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read image, skipping");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn encodes_file_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"ABC").unwrap();
        assert_eq!(
            FileImageEncoder.encode_to_base64(file.path()).await.as_deref(),
            Some("QUJD")
        );
    }

    #[tokio::test]
    async fn missing_or_empty_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileImageEncoder
            .encode_to_base64(&dir.path().join("missing.jpg"))
            .await
            .is_none());

        let empty = tempfile::NamedTempFile::new().unwrap();
        assert!(FileImageEncoder.encode_to_base64(empty.path()).await.is_none());
    }
}
