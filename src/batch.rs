//! Batch orchestration
//!
//! Participants are processed strictly in order, one at a time. A failure is
//! recorded against the participant it belongs to and the batch moves on;
//! archive assembly failures only cost the archive key. The only error that
//! escapes a batch is a malformed request.

use std::sync::Arc;

use crate::archive::ArchiveAssembler;
use crate::artifact::ArtifactKey;
use crate::model::{
    BatchResult, Design, Outcome, Participant, RenderOutcome, RenderRequest, ThumbnailRequest,
    ThumbnailResponse,
};
use crate::persist::ArtifactPersister;
use crate::rendering::{CanvasRenderer, RenderSize, SceneRenderer};
use crate::scene::placeholder::{placeholder_fields, substitute};
use crate::scene::SceneGraph;
use crate::storage::ObjectStore;
use crate::{RenderConfig, Result};

pub struct BatchOrchestrator {
    renderer: Arc<dyn SceneRenderer>,
    persister: ArtifactPersister,
    assembler: ArchiveAssembler,
    config: RenderConfig,
}

impl BatchOrchestrator {
    pub fn new(renderer: Arc<dyn SceneRenderer>, store: Arc<dyn ObjectStore>, config: RenderConfig) -> Self {
        let persister = ArtifactPersister::new(store, config.canvas);
        let assembler =
            ArchiveAssembler::new(persister.clone()).with_compression_level(config.archive_compression_level);
        Self {
            renderer,
            persister,
            assembler,
            config,
        }
    }

    /// Orchestrator backed by the built-in [`CanvasRenderer`]
    pub fn with_canvas_renderer(config: RenderConfig, store: Arc<dyn ObjectStore>) -> Result<Self> {
        config.validate()?;
        let renderer = Arc::new(CanvasRenderer::new(&config)?);
        Ok(Self::new(renderer, store, config))
    }

    /// Render every participant and bundle the successes
    pub async fn run(&self, design: &Design, participants: &[Participant]) -> BatchResult {
        log::info!(
            "Rendering design {} for {} participant(s)",
            design.id,
            participants.len()
        );

        let mut outcomes = Vec::with_capacity(participants.len());
        let mut rendered: Vec<ArtifactKey> = Vec::new();

        for participant in participants {
            let outcome = if participant.is_revoked {
                log::debug!("Participant {} is revoked, skipping", participant.id);
                Outcome::SkippedRevoked
            } else {
                match self.render_one(design, participant).await {
                    Ok(key) => {
                        rendered.push(key.clone());
                        Outcome::Success { artifact_key: key }
                    }
                    Err(e) => {
                        log::error!("Certificate for participant {} failed: {}", participant.id, e);
                        Outcome::Failed { error: e.to_string() }
                    }
                }
            };
            outcomes.push(RenderOutcome {
                participant_id: participant.id.clone(),
                outcome,
            });
        }

        let archive_key = if rendered.is_empty() {
            None
        } else {
            match self.assembler.assemble(&design.id, &rendered).await {
                Ok(key) => Some(key),
                Err(e) => {
                    log::error!("Archive for design {} failed: {}", design.id, e);
                    None
                }
            }
        };

        let result = BatchResult::new(outcomes, archive_key);
        let (ok, skipped, failed) = result.counts();
        log::info!(
            "Batch for design {} done: {} succeeded, {} skipped, {} failed, archive: {}",
            design.id,
            ok,
            skipped,
            failed,
            result.archive_key.as_ref().map(ArtifactKey::as_str).unwrap_or("none")
        );
        result
    }

    /// Substitute, render and persist a single participant's certificate
    pub async fn render_one(&self, design: &Design, participant: &Participant) -> Result<ArtifactKey> {
        let scene = SceneGraph::parse(&design.scene_graph)?;

        let missing: Vec<String> = placeholder_fields(&scene)
            .into_iter()
            .filter(|f| !participant.data.contains_key(f))
            .collect();
        if !missing.is_empty() {
            log::debug!(
                "Participant {} has no value for {:?}, keeping design text",
                participant.id,
                missing
            );
        }

        let filled = substitute(&scene, &participant.data);
        let bitmap = self
            .renderer
            .render(&filled, RenderSize::full(self.config.canvas))
            .await?;
        self.persister
            .persist_certificate(&design.id, &participant.id, &bitmap)
            .await
    }

    /// Preview of the unmodified design, fitted inside `width`×`height`
    ///
    /// A missing or zero dimension falls back to the configured default.
    pub async fn render_thumbnail(
        &self,
        design: &Design,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Result<ArtifactKey> {
        let width = width.filter(|w| *w > 0).unwrap_or(self.config.thumbnail.width);
        let height = height.filter(|h| *h > 0).unwrap_or(self.config.thumbnail.height);
        let scene = SceneGraph::parse(&design.scene_graph)?;
        let size = RenderSize::thumbnail(self.config.canvas, width, height);
        log::info!(
            "Rendering thumbnail of design {} within {}x{} (scale {:.4})",
            design.id,
            width,
            height,
            size.scale
        );
        let bitmap = self.renderer.render(&scene, size).await?;
        self.persister.persist_thumbnail(&design.id, &bitmap).await
    }

    /// Handle a raw `{certificate, participants}` body
    pub async fn handle_render(&self, body: &[u8]) -> Result<BatchResult> {
        let request = RenderRequest::from_json(body)?;
        Ok(self.run(&request.design, &request.participants).await)
    }

    /// Handle a raw `{certificate, width?, height?}` body
    pub async fn handle_thumbnail(&self, body: &[u8]) -> Result<ThumbnailResponse> {
        let request = ThumbnailRequest::from_json(body)?;
        let key = self
            .render_thumbnail(&request.design, request.width, request.height)
            .await?;
        Ok(ThumbnailResponse::new(key))
    }
}
