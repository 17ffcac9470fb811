//! Archive assembly over previously persisted artifacts
//!
//! Members are downloaded one at a time and named by their full key. A member
//! that cannot be downloaded is logged and left out; the archive is uploaded
//! once, after the writer is finalized.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::artifact::ArtifactKey;
use crate::persist::ArtifactPersister;
use crate::{Error, Result};

/// Default deflate level for archive members
pub const DEFAULT_COMPRESSION_LEVEL: i64 = 9;

#[derive(Clone)]
pub struct ArchiveAssembler {
    persister: ArtifactPersister,
    compression_level: i64,
}

impl ArchiveAssembler {
    pub fn new(persister: ArtifactPersister) -> Self {
        Self {
            persister,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }

    pub fn with_compression_level(mut self, level: i64) -> Self {
        self.compression_level = level;
        self
    }

    /// Bundle `keys` into one zip stored under `target_id`'s folder
    pub async fn assemble(&self, target_id: &str, keys: &[ArtifactKey]) -> Result<ArtifactKey> {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(self.compression_level));
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        let mut members = 0usize;
        for key in keys {
            log::debug!("Downloading {} for archive", key);
            let bytes = match self.persister.download(key).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::error!("Failed to download {}, leaving it out of the archive: {}", key, e);
                    continue;
                }
            };
            zip.start_file(key.as_str(), options)?;
            zip.write_all(&bytes)
                .map_err(|e| Error::Archive(format!("writing {} failed: {}", key, e)))?;
            members += 1;
        }

        let buffer = zip.finish()?.into_inner();
        log::info!(
            "Archive built in memory: {} of {} member(s), {} bytes",
            members,
            keys.len(),
            buffer.len()
        );
        self.persister.persist_archive(target_id, buffer).await
    }
}
