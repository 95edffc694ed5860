//! File-backed frame source.
//!
//! The actual screen grab and JPEG encode happen in another process that
//! keeps overwriting one file; every capture simply re-reads it.

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use glance_core::{CaptureSettings, FrameSource};

pub struct FileFrameSource {
    path: PathBuf,
}

impl FileFrameSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl FrameSource for FileFrameSource {
    async fn capture(&self, settings: CaptureSettings) -> Option<Bytes> {
        match tokio::fs::read(&self.path).await {
            Ok(data) if !data.is_empty() => {
                debug!(
                    "read {} bytes from {} (quality {}, scale {})",
                    data.len(),
                    self.path.display(),
                    settings.quality,
                    settings.scale
                );
                Some(Bytes::from(data))
            }
            Ok(_) => None,
            Err(e) => {
                debug!("cannot read {}: {e}", self.path.display());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rereads_file_each_capture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.jpg");
        let source = FileFrameSource::new(&path);
        let settings = CaptureSettings::default();

        assert!(source.capture(settings).await.is_none());

        std::fs::write(&path, b"first").unwrap();
        assert_eq!(source.capture(settings).await.unwrap(), &b"first"[..]);

        std::fs::write(&path, b"second").unwrap();
        assert_eq!(source.capture(settings).await.unwrap(), &b"second"[..]);

        std::fs::write(&path, b"").unwrap();
        assert!(source.capture(settings).await.is_none());
    }
}
