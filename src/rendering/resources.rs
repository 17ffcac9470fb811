//! Embedded image loading
//!
//! Sources are resolved by scheme: `data:` URLs are decoded inline, `http(s)`
//! URLs are fetched (feature `remote-images`), `file:` URLs and relative paths
//! are read from disk. A failed source never fails the render; it is logged
//! and the image is left out.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use futures::future::join_all;
use image::RgbaImage;

use super::paint::ImageSet;
use crate::{Error, RenderConfig, Result};

/// Loads image sources referenced by a scene
#[derive(Debug, Clone)]
pub struct ResourceLoader {
    #[cfg(feature = "remote-images")]
    client: reqwest::Client,
    asset_root: Option<PathBuf>,
    timeout: Duration,
    enabled: bool,
}

impl ResourceLoader {
    pub fn new(config: &RenderConfig) -> Result<Self> {
        let timeout = Duration::from_millis(config.image_timeout_ms);

        #[cfg(feature = "remote-images")]
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            #[cfg(feature = "remote-images")]
            client,
            asset_root: config.asset_root.clone(),
            timeout,
            enabled: config.enable_images,
        })
    }

    /// Load every source concurrently; failures are logged and omitted
    pub async fn load_all(&self, sources: &[String]) -> ImageSet {
        if !self.enabled {
            if !sources.is_empty() {
                log::debug!("Images disabled, skipping {} source(s)", sources.len());
            }
            return ImageSet::new();
        }

        let loads = sources.iter().map(|src| async move { (src, self.load(src).await) });
        let mut images = ImageSet::new();
        for (src, res) in join_all(loads).await {
            match res {
                Ok(image) => {
                    images.insert(src.clone(), Arc::new(image));
                }
                Err(e) => log::warn!("Failed to load image {}: {}", abbreviate(src), e),
            }
        }
        images
    }

    /// Load and decode one source, bounded by the configured timeout
    pub async fn load(&self, src: &str) -> Result<RgbaImage> {
        let bytes = tokio::time::timeout(self.timeout, self.fetch(src))
            .await
            .map_err(|_| Error::RenderFailure(format!("timed out after {}ms", self.timeout.as_millis())))??;
        let decoded = image::load_from_memory(&bytes)?;
        Ok(decoded.to_rgba8())
    }

    async fn fetch(&self, src: &str) -> Result<Vec<u8>> {
        if let Some(rest) = src.strip_prefix("data:") {
            return decode_data_url(rest);
        }

        match url::Url::parse(src) {
            Ok(url) => match url.scheme() {
                "http" | "https" => self.fetch_remote(url).await,
                "file" => {
                    let path = url
                        .to_file_path()
                        .map_err(|_| Error::RenderFailure(format!("invalid file URL {}", src)))?;
                    read_file(&path).await
                }
                other => Err(Error::RenderFailure(format!("unsupported scheme `{}`", other))),
            },
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let root = self
                    .asset_root
                    .as_ref()
                    .ok_or_else(|| Error::RenderFailure("relative source without asset root".into()))?;
                let rel = Path::new(src);
                if rel.components().any(|c| !matches!(c, Component::Normal(_) | Component::CurDir)) {
                    return Err(Error::RenderFailure(format!("source escapes asset root: {}", src)));
                }
                read_file(&root.join(rel)).await
            }
            Err(e) => Err(Error::RenderFailure(format!("invalid source: {}", e))),
        }
    }

    #[cfg(feature = "remote-images")]
    async fn fetch_remote(&self, url: url::Url) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::RenderFailure(format!("fetch {} failed: {}", url, e)))?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::RenderFailure(format!("reading {} failed: {}", url, e)))?;
        Ok(bytes.to_vec())
    }

    #[cfg(not(feature = "remote-images"))]
    async fn fetch_remote(&self, url: url::Url) -> Result<Vec<u8>> {
        Err(Error::RenderFailure(format!(
            "remote images are not compiled in, cannot fetch {}",
            url
        )))
    }
}

async fn read_file(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| Error::RenderFailure(format!("reading {} failed: {}", path.display(), e)))
}

/// Decode the part of a data URL after `data:`
fn decode_data_url(rest: &str) -> Result<Vec<u8>> {
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::RenderFailure("data URL without payload".into()))?;
    if meta.ends_with(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| Error::RenderFailure(format!("bad base64 in data URL: {}", e)))
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

/// Keep data URLs out of the logs
fn abbreviate(src: &str) -> String {
    if src.len() > 96 {
        let cut = (0..=96).rev().find(|i| src.is_char_boundary(*i)).unwrap_or(0);
        format!("{}...", &src[..cut])
    } else {
        src.to_string()
    }
}
