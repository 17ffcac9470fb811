//! Image source fallback for formats the decoder cannot read
//!
//! The raster backend decodes PNG and JPEG only. WebP sources are pointed at a
//! sibling asset before loading: a `format=webp` query switches to
//! `format=png`, otherwise a `.webp` extension becomes `.jpg`. The rewrite is
//! best effort; if the alternate source is missing the image is simply not
//! drawn.

use serde_json::Value;

use super::{node_type, SceneGraph};

/// Alternate source for `src`, or `None` when it is already decodable
pub fn fallback_source(src: &str) -> Option<String> {
    if src.contains("format=webp") {
        Some(src.replacen("format=webp", "format=png", 1))
    } else if src.contains(".webp") {
        Some(src.replacen(".webp", ".jpg", 1))
    } else {
        None
    }
}

/// Rewrite undecodable image sources in place; returns how many changed
///
/// Idempotent: rewritten sources never match again.
pub fn rewrite_unsupported_images(scene: &mut SceneGraph) -> usize {
    let mut rewritten = 0;
    scene.for_each_node_mut(|node| {
        if node_type(node).as_deref() != Some("image") {
            return;
        }
        let Some(src) = node.get("src").and_then(Value::as_str) else {
            return;
        };
        if let Some(alt) = fallback_source(src) {
            log::info!("Unsupported image format, using fallback: {} -> {}", src, alt);
            node.insert("src".to_string(), Value::String(alt));
            rewritten += 1;
        }
    });
    rewritten
}
