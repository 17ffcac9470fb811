//! Request and response types
//!
//! Field names on the wire follow the service's JSON payloads; the Rust side
//! uses the pipeline's own vocabulary.

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactKey;
use crate::scene::placeholder::FieldMap;
use crate::{Error, Result};

/// A reusable certificate design
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Design {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Scene graph serialized as JSON text
    #[serde(rename = "design")]
    pub scene_graph: String,
    #[serde(rename = "user_id", default)]
    pub owner_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    #[serde(rename = "certificate_id", default)]
    pub design_id: String,
    #[serde(default)]
    pub is_revoked: bool,
    #[serde(default)]
    pub data: FieldMap,
}

/// What happened to one participant
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success { artifact_key: ArtifactKey },
    SkippedRevoked,
    Failed { error: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn status(&self) -> Status {
        match self {
            Outcome::Success { .. } => Status::Success,
            Outcome::SkippedRevoked => Status::SkippedRevoked,
            Outcome::Failed { .. } => Status::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    SkippedRevoked,
    Error,
}

/// Ledger entry, serialized as `{participantId, status, filePath, error?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireOutcome", try_from = "WireOutcome")]
pub struct RenderOutcome {
    pub participant_id: String,
    pub outcome: Outcome,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireOutcome {
    participant_id: String,
    #[serde(default)]
    file_path: Option<ArtifactKey>,
    status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<RenderOutcome> for WireOutcome {
    fn from(entry: RenderOutcome) -> Self {
        let status = entry.outcome.status();
        let (file_path, error) = match entry.outcome {
            Outcome::Success { artifact_key } => (Some(artifact_key), None),
            Outcome::SkippedRevoked => (None, None),
            Outcome::Failed { error } => (None, Some(error)),
        };
        Self {
            participant_id: entry.participant_id,
            file_path,
            status,
            error,
        }
    }
}

impl TryFrom<WireOutcome> for RenderOutcome {
    type Error = String;

    fn try_from(wire: WireOutcome) -> std::result::Result<Self, Self::Error> {
        let outcome = match wire.status {
            Status::Success => Outcome::Success {
                artifact_key: wire
                    .file_path
                    .ok_or_else(|| "success entry without filePath".to_string())?,
            },
            Status::SkippedRevoked => Outcome::SkippedRevoked,
            Status::Error => Outcome::Failed {
                error: wire.error.unwrap_or_else(|| "Unknown error".to_string()),
            },
        };
        Ok(Self {
            participant_id: wire.participant_id,
            outcome,
        })
    }
}

pub const BATCH_COMPLETED_MESSAGE: &str = "Certificate generation completed";
pub const THUMBNAIL_MESSAGE: &str = "Thumbnail generated successfully";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub message: String,
    #[serde(rename = "results")]
    pub outcomes: Vec<RenderOutcome>,
    #[serde(rename = "zipFilePath", default, skip_serializing_if = "Option::is_none")]
    pub archive_key: Option<ArtifactKey>,
}

impl BatchResult {
    pub fn new(outcomes: Vec<RenderOutcome>, archive_key: Option<ArtifactKey>) -> Self {
        Self {
            message: BATCH_COMPLETED_MESSAGE.to_string(),
            outcomes,
            archive_key,
        }
    }

    /// `(succeeded, skipped, failed)`
    pub fn counts(&self) -> (usize, usize, usize) {
        self.outcomes
            .iter()
            .fold((0, 0, 0), |(ok, skipped, failed), entry| match entry.outcome {
                Outcome::Success { .. } => (ok + 1, skipped, failed),
                Outcome::SkippedRevoked => (ok, skipped + 1, failed),
                Outcome::Failed { .. } => (ok, skipped, failed + 1),
            })
    }
}

fn parse_request<'de, T: Deserialize<'de>>(body: &'de [u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| Error::MalformedRequest(e.to_string()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderRequest {
    #[serde(rename = "certificate")]
    pub design: Design,
    pub participants: Vec<Participant>,
}

impl RenderRequest {
    pub fn from_json(body: &[u8]) -> Result<Self> {
        parse_request(body)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailRequest {
    #[serde(rename = "certificate")]
    pub design: Design,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

impl ThumbnailRequest {
    pub fn from_json(body: &[u8]) -> Result<Self> {
        parse_request(body)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailResponse {
    pub message: String,
    pub thumbnail_path: ArtifactKey,
}

impl ThumbnailResponse {
    pub fn new(thumbnail_path: ArtifactKey) -> Self {
        Self {
            message: THUMBNAIL_MESSAGE.to_string(),
            thumbnail_path,
        }
    }
}

/// Top-level failure body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, cause: &Error) -> Self {
        Self {
            error: error.into(),
            details: cause.to_string(),
        }
    }
}
