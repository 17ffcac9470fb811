//! Artifact persister: encodes renders and writes them to the object store
//!
//! Storage errors are passed through as-is. Nothing here retries.

use std::sync::Arc;

use crate::artifact::{ArtifactKey, ArtifactKind, KeyClock};
use crate::pdf;
use crate::rendering::Bitmap;
use crate::storage::ObjectStore;
use crate::{CanvasSize, Result};

#[derive(Clone)]
pub struct ArtifactPersister {
    store: Arc<dyn ObjectStore>,
    clock: Arc<KeyClock>,
    canvas: CanvasSize,
}

impl ArtifactPersister {
    pub fn new(store: Arc<dyn ObjectStore>, canvas: CanvasSize) -> Self {
        Self {
            store,
            clock: Arc::new(KeyClock::new()),
            canvas,
        }
    }

    /// Wrap a full render in a single-page PDF and store it
    pub async fn persist_certificate(
        &self,
        design_id: &str,
        participant_id: &str,
        bitmap: &Bitmap,
    ) -> Result<ArtifactKey> {
        let document = pdf::single_page_document(bitmap, self.canvas)?;
        let key = self.clock.key(ArtifactKind::Certificate, design_id, participant_id);
        self.put(&key, ArtifactKind::Certificate, document).await?;
        Ok(key)
    }

    /// Store a preview-quality PNG of the bitmap as-is
    pub async fn persist_thumbnail(&self, design_id: &str, bitmap: &Bitmap) -> Result<ArtifactKey> {
        let png = bitmap.encode_png()?;
        let key = self.clock.key(ArtifactKind::Thumbnail, design_id, design_id);
        self.put(&key, ArtifactKind::Thumbnail, png).await?;
        Ok(key)
    }

    /// Store an assembled archive
    pub async fn persist_archive(&self, design_id: &str, bytes: Vec<u8>) -> Result<ArtifactKey> {
        let key = self.clock.key(ArtifactKind::Archive, design_id, design_id);
        self.put(&key, ArtifactKind::Archive, bytes).await?;
        Ok(key)
    }

    pub async fn download(&self, key: &ArtifactKey) -> Result<Vec<u8>> {
        Ok(self.store.get(key.as_str()).await?)
    }

    async fn put(&self, key: &ArtifactKey, kind: ArtifactKind, bytes: Vec<u8>) -> Result<()> {
        log::info!("Uploading {} ({} bytes) to {}", kind.prefix(), bytes.len(), key);
        self.store.put(key.as_str(), bytes, kind.content_type()).await?;
        Ok(())
    }
}
