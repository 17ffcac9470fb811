//! certrender
//!
//! Batch certificate rendering: a reusable design (a serialized canvas scene
//! graph with `PLACEHOLDER-<field>` nodes) plus a list of participants becomes
//! one PDF per non-revoked participant, bundled into a single zip archive.
//!
//! # Pipeline
//!
//! - **Substitution** ([`scene::placeholder`]): pure document rewrite injecting
//!   participant fields into placeholder nodes
//! - **Rendering** ([`rendering`]): loads a scene onto a fresh drawing surface
//!   and rasterizes it
//! - **Persisting** ([`persist`]): wraps the bitmap in a single-page PDF and
//!   writes it to an [`storage::ObjectStore`]
//! - **Orchestration** ([`batch`]): per-participant ledger with partial-failure
//!   bookkeeping
//! - **Archiving** ([`archive`]): streams persisted artifacts into one zip
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use certrender::{batch::BatchOrchestrator, storage::MemoryStorage, RenderConfig};
//!
//! # async fn run() -> certrender::Result<()> {
//! let store = Arc::new(MemoryStorage::new());
//! let orchestrator = BatchOrchestrator::with_canvas_renderer(RenderConfig::default(), store)?;
//! let body = br#"{"certificate": {"id": "c1", "name": "Course", "design": "{\"objects\":[]}", "user_id": "u1"},
//!                 "participants": [{"id": "p1", "certificate_id": "c1", "is_revoked": false, "data": {}}]}"#;
//! let result = orchestrator.handle_render(body).await?;
//! println!("{}", serde_json::to_string_pretty(&result).unwrap());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

pub mod error;
pub use error::{Error, Result};

pub mod archive;
pub mod artifact;
pub mod batch;
pub mod model;
pub mod pdf;
pub mod persist;
pub mod rendering;
pub mod scene;
pub mod storage;

pub use artifact::{ArtifactKey, ArtifactKind};
pub use model::{BatchResult, Design, Outcome, Participant, RenderOutcome};
pub use scene::SceneGraph;

/// Configuration for the rendering pipeline
///
/// Defaults match the designs produced by the editor: an 800×600 canvas,
/// 300×225 thumbnails, remote images allowed with a 10 second timeout and a
/// maximum-ratio zip compression.
///
/// # Examples
///
/// ```
/// let cfg = certrender::RenderConfig::default();
/// assert_eq!(cfg.canvas.width, 800);
/// assert_eq!(cfg.thumbnail.height, 225);
/// ```
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Logical canvas size of full renders
    pub canvas: CanvasSize,
    /// Default thumbnail bounds when a request names none
    pub thumbnail: CanvasSize,
    /// Timeout for fetching a single embedded image, in milliseconds
    pub image_timeout_ms: u64,
    /// Whether embedded images are loaded at all
    pub enable_images: bool,
    /// User agent sent when fetching remote images
    pub user_agent: String,
    /// Directory that relative image sources resolve against
    pub asset_root: Option<PathBuf>,
    /// Deflate level used for archive members (0-9)
    pub archive_compression_level: i64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            canvas: CanvasSize::default(),
            thumbnail: CanvasSize {
                width: 300,
                height: 225,
            },
            image_timeout_ms: 10_000,
            enable_images: true,
            user_agent: concat!("certrender/", env!("CARGO_PKG_VERSION")).to_string(),
            asset_root: None,
            archive_compression_level: 9,
        }
    }
}

impl RenderConfig {
    /// Reject settings the pipeline cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(Error::Config(format!(
                "canvas must be non-empty, got {}x{}",
                self.canvas.width, self.canvas.height
            )));
        }
        if !(0..=9).contains(&self.archive_compression_level) {
            return Err(Error::Config(format!(
                "archive compression level must be within 0..=9, got {}",
                self.archive_compression_level
            )));
        }
        Ok(())
    }
}

/// Canvas dimensions in logical units (one unit renders as one pixel at scale 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}
