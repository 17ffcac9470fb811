//! Paint commands derived from layout boxes

use std::collections::HashMap;
use std::sync::Arc;

use image::{Rgba, RgbaImage};

use super::layout::{ElementType, LayoutNode, Rect, TextAlign, TextBlock, GLYPH_ADVANCE};

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    SolidRect {
        rect: Rect,
        rgba: Rgba<u8>,
    },
    /// Filled ellipse inscribed in `rect`, or an outline of `ring` width
    Ellipse {
        rect: Rect,
        rgba: Rgba<u8>,
        ring: Option<f32>,
    },
    Line {
        from: (f32, f32),
        to: (f32, f32),
        width: f32,
        rgba: Rgba<u8>,
    },
    Image {
        rect: Rect,
        image: Arc<RgbaImage>,
        opacity: f32,
    },
}

/// Loaded images keyed by their (post-fallback) source
pub type ImageSet = HashMap<String, Arc<RgbaImage>>;

/// Parse a CSS-style color as written by the editor
///
/// Accepts `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(r,g,b)`, `rgba(r,g,b,a)` and a
/// handful of names. `transparent`, empty and unknown values yield `None`.
pub fn parse_color(s: &str) -> Option<Rgba<u8>> {
    let s = s.trim().to_ascii_lowercase();
    if let Some(hex) = s.strip_prefix('#') {
        let expand = |c: u8| c * 17;
        let nibble = |i: usize| u8::from_str_radix(hex.get(i..i + 1)?, 16).ok();
        let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        return match hex.len() {
            3 => Some(Rgba([expand(nibble(0)?), expand(nibble(1)?), expand(nibble(2)?), 255])),
            6 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, 255])),
            8 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
            _ => None,
        };
    }
    if let Some(args) = s
        .strip_prefix("rgba(")
        .or_else(|| s.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let parts: Vec<&str> = args.split(',').map(str::trim).collect();
        if parts.len() != 3 && parts.len() != 4 {
            return None;
        }
        let channel = |p: &str| p.parse::<f32>().ok().map(|v| v.clamp(0.0, 255.0).round() as u8);
        let alpha = match parts.get(3) {
            Some(a) => (a.parse::<f32>().ok()?.clamp(0.0, 1.0) * 255.0).round() as u8,
            None => 255,
        };
        return Some(Rgba([channel(parts[0])?, channel(parts[1])?, channel(parts[2])?, alpha]));
    }
    let named = match s.as_str() {
        "black" => [0, 0, 0],
        "white" => [255, 255, 255],
        "red" => [255, 0, 0],
        "green" => [0, 128, 0],
        "blue" => [0, 0, 255],
        "gray" | "grey" => [128, 128, 128],
        "gold" => [255, 215, 0],
        "navy" => [0, 0, 128],
        _ => return None,
    };
    Some(Rgba([named[0], named[1], named[2], 255]))
}

fn with_opacity(rgba: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    let Rgba([r, g, b, a]) = rgba;
    Rgba([r, g, b, (a as f32 * opacity).round() as u8])
}

/// Translate layout nodes into paint commands, in paint order
///
/// Image nodes whose source did not load are left out.
pub fn paint_nodes(nodes: &[LayoutNode], images: &ImageSet) -> Vec<PaintCommand> {
    let mut cmds = Vec::new();
    for node in nodes {
        let style = &node.style;
        let fill = style.fill.map(|c| with_opacity(c, style.opacity));
        let stroke = style
            .stroke
            .filter(|_| style.stroke_width > 0.0)
            .map(|c| with_opacity(c, style.opacity));

        match &node.elem_type {
            ElementType::Rect => {
                if let Some(rgba) = fill {
                    cmds.push(PaintCommand::SolidRect { rect: node.rect, rgba });
                }
                if let Some(rgba) = stroke {
                    outline(&mut cmds, node.rect, style.stroke_width, rgba);
                }
            }
            ElementType::Ellipse => {
                if let Some(rgba) = fill {
                    cmds.push(PaintCommand::Ellipse { rect: node.rect, rgba, ring: None });
                }
                if let Some(rgba) = stroke {
                    cmds.push(PaintCommand::Ellipse {
                        rect: node.rect,
                        rgba,
                        ring: Some(style.stroke_width),
                    });
                }
            }
            ElementType::Line { from, to } => {
                if let Some(rgba) = stroke {
                    cmds.push(PaintCommand::Line {
                        from: *from,
                        to: *to,
                        width: style.stroke_width,
                        rgba,
                    });
                }
            }
            ElementType::Text(block) => {
                if let Some(rgba) = fill {
                    glyphs(&mut cmds, node.rect, block, rgba);
                }
            }
            ElementType::Image { src } => match images.get(src) {
                Some(image) => cmds.push(PaintCommand::Image {
                    rect: node.rect,
                    image: Arc::clone(image),
                    opacity: style.opacity,
                }),
                None => log::debug!("Image {} not loaded, leaving it out", src),
            },
        }
    }
    cmds
}

/// Stroke centered on the rectangle's edges
fn outline(cmds: &mut Vec<PaintCommand>, r: Rect, w: f32, rgba: Rgba<u8>) {
    let (x0, y0) = (r.x - w / 2.0, r.y - w / 2.0);
    let (outer_w, outer_h) = (r.width + w, r.height + w);
    let edges = [
        Rect { x: x0, y: y0, width: outer_w, height: w },
        Rect { x: x0, y: y0 + outer_h - w, width: outer_w, height: w },
        Rect { x: x0, y: y0 + w, width: w, height: outer_h - 2.0 * w },
        Rect { x: x0 + outer_w - w, y: y0 + w, width: w, height: outer_h - 2.0 * w },
    ];
    for rect in edges {
        if rect.width > 0.0 && rect.height > 0.0 {
            cmds.push(PaintCommand::SolidRect { rect, rgba });
        }
    }
}

/// Block glyphs: one filled cell per visible character
fn glyphs(cmds: &mut Vec<PaintCommand>, r: Rect, block: &TextBlock, rgba: Rgba<u8>) {
    let fs = block.font_size;
    let advance = GLYPH_ADVANCE * fs;
    let line_advance = fs * block.line_height;
    for (row, line) in block.lines.iter().enumerate() {
        let line_width = line.chars().count() as f32 * advance;
        let start_x = match block.align {
            TextAlign::Left => r.x,
            TextAlign::Center => r.x + (r.width - line_width) / 2.0,
            TextAlign::Right => r.x + r.width - line_width,
        };
        let top = r.y + row as f32 * line_advance + 0.15 * fs;
        for (col, ch) in line.chars().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            cmds.push(PaintCommand::SolidRect {
                rect: Rect {
                    x: start_x + col as f32 * advance + 0.05 * fs,
                    y: top,
                    width: 0.5 * fs,
                    height: 0.7 * fs,
                },
                rgba,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::layout::Style;

    #[test]
    fn parse_color_formats() {
        assert_eq!(parse_color("#fff"), Some(Rgba([255, 255, 255, 255])));
        assert_eq!(parse_color("#1A2b3C"), Some(Rgba([0x1a, 0x2b, 0x3c, 255])));
        assert_eq!(parse_color("#00000080"), Some(Rgba([0, 0, 0, 0x80])));
        assert_eq!(parse_color("rgb(10, 20, 30)"), Some(Rgba([10, 20, 30, 255])));
        assert_eq!(parse_color("rgba(10,20,30,0.5)"), Some(Rgba([10, 20, 30, 128])));
        assert_eq!(parse_color("Gold"), Some(Rgba([255, 215, 0, 255])));
        assert_eq!(parse_color("transparent"), None);
        assert_eq!(parse_color("#12"), None);
        assert_eq!(parse_color(""), None);
    }

    fn text_node(text: &str, align: TextAlign) -> LayoutNode {
        LayoutNode {
            rect: Rect { x: 0.0, y: 0.0, width: 100.0, height: 12.0 },
            elem_type: ElementType::Text(TextBlock {
                lines: vec![text.to_string()],
                font_size: 10.0,
                line_height: 1.2,
                align,
            }),
            style: Style {
                fill: Some(Rgba([0, 0, 0, 255])),
                stroke: None,
                stroke_width: 1.0,
                opacity: 0.5,
            },
        }
    }

    #[test]
    fn text_becomes_one_cell_per_visible_char() {
        let cmds = paint_nodes(&[text_node("a b", TextAlign::Left)], &ImageSet::new());
        assert_eq!(cmds.len(), 2);
        match &cmds[0] {
            PaintCommand::SolidRect { rgba, .. } => assert_eq!(rgba.0[3], 128),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn right_aligned_text_ends_at_box_edge() {
        let cmds = paint_nodes(&[text_node("ab", TextAlign::Right)], &ImageSet::new());
        let PaintCommand::SolidRect { rect, .. } = &cmds[1] else { panic!("expected rect") };
        // last cell starts one advance before the right edge
        assert!((rect.x - (100.0 - 6.0 + 0.5)).abs() < 1e-4);
    }

    #[test]
    fn unloaded_images_are_left_out() {
        let node = LayoutNode {
            rect: Rect { x: 0.0, y: 0.0, width: 10.0, height: 10.0 },
            elem_type: ElementType::Image { src: "missing.png".into() },
            style: Style { fill: None, stroke: None, stroke_width: 0.0, opacity: 1.0 },
        };
        assert!(paint_nodes(&[node.clone()], &ImageSet::new()).is_empty());

        let mut images = ImageSet::new();
        images.insert("missing.png".into(), Arc::new(RgbaImage::new(2, 2)));
        assert_eq!(paint_nodes(&[node], &images).len(), 1);
    }
}
