//! Storage keys for persisted artifacts
//!
//! Every artifact lives under its design's folder:
//! `<designId>/<kind>_<id>_<timestamp>.<ext>`.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// One participant's page document
    Certificate,
    /// Preview bitmap of an unmodified design
    Thumbnail,
    /// Zip of a batch's certificates
    Archive,
}

impl ArtifactKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            ArtifactKind::Certificate => "certificate",
            ArtifactKind::Thumbnail => "thumbnail",
            ArtifactKind::Archive => "certificates",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Certificate => "pdf",
            ArtifactKind::Thumbnail => "png",
            ArtifactKind::Archive => "zip",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ArtifactKind::Certificate => "application/pdf",
            ArtifactKind::Thumbnail => "image/png",
            ArtifactKind::Archive => "application/zip",
        }
    }
}

/// Key of a persisted artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactKey(String);

impl ArtifactKey {
    pub fn compose(kind: ArtifactKind, design_id: &str, subject_id: &str, timestamp: i64) -> Self {
        Self(format!(
            "{}/{}_{}_{}.{}",
            design_id,
            kind.prefix(),
            subject_id,
            timestamp,
            kind.extension()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ArtifactKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-process source of key timestamps
///
/// Readings are Unix milliseconds, strictly increasing across calls even when
/// several keys are minted within the same millisecond or the wall clock
/// steps backwards.
#[derive(Debug, Default)]
pub struct KeyClock {
    last: AtomicI64,
}

impl KeyClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(prev + 1);
            match self
                .last
                .compare_exchange_weak(prev, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return candidate,
                Err(actual) => prev = actual,
            }
        }
    }

    pub fn key(&self, kind: ArtifactKind, design_id: &str, subject_id: &str) -> ArtifactKey {
        ArtifactKey::compose(kind, design_id, subject_id, self.next())
    }
}
