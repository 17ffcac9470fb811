//! Layout of scene graph nodes into canvas-space boxes
//!
//! Coordinates follow the editor's conventions: `left`/`top` locate the node's
//! origin point (`originX`/`originY`), `width`/`height` are intrinsic and get
//! multiplied by `scaleX`/`scaleY`. Group members are positioned relative to
//! their group's center. Rotation (`angle`) is not applied.

use image::Rgba;
use serde_json::Value;

use super::paint::parse_color;
use crate::scene::{node_type, Node, SceneGraph};

/// Default font size of text nodes in the editor
pub const DEFAULT_FONT_SIZE: f32 = 40.0;
/// Default line height multiplier of text nodes in the editor
pub const DEFAULT_LINE_HEIGHT: f32 = 1.16;
/// Advance of one glyph cell relative to the font size
pub const GLYPH_ADVANCE: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub lines: Vec<String>,
    pub font_size: f32,
    pub line_height: f32,
    pub align: TextAlign,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementType {
    Rect,
    Ellipse,
    Line { from: (f32, f32), to: (f32, f32) },
    Text(TextBlock),
    Image { src: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    pub fill: Option<Rgba<u8>>,
    pub stroke: Option<Rgba<u8>>,
    pub stroke_width: f32,
    pub opacity: f32,
}

/// A drawable node: a canvas-space box, what to draw in it and how
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutNode {
    pub rect: Rect,
    pub elem_type: ElementType,
    pub style: Style,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    origin: (f32, f32),
    scale: (f32, f32),
    opacity: f32,
}

fn num(node: &Node, key: &str, default: f32) -> f32 {
    node.get(key).and_then(Value::as_f64).map(|v| v as f32).unwrap_or(default)
}

fn text_attr<'a>(node: &'a Node, key: &str) -> Option<&'a str> {
    node.get(key).and_then(Value::as_str)
}

/// Fill color: absent means the editor default (black), `null`/empty/
/// `transparent` means no fill.
fn fill_of(node: &Node) -> Option<Rgba<u8>> {
    match node.get("fill") {
        None => Some(Rgba([0, 0, 0, 255])),
        Some(Value::String(s)) => parse_color(s),
        Some(_) => None,
    }
}

/// Compute layout boxes for every visible node, in paint order
pub fn layout_scene(scene: &SceneGraph) -> Vec<LayoutNode> {
    let mut nodes = Vec::new();
    let root = Frame {
        origin: (0.0, 0.0),
        scale: (1.0, 1.0),
        opacity: 1.0,
    };
    layout_nodes(scene.nodes(), root, &mut nodes);
    nodes
}

/// Distinct image sources referenced by the layout, in paint order
pub fn image_sources(nodes: &[LayoutNode]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for node in nodes {
        if let ElementType::Image { src } = &node.elem_type {
            if !sources.contains(src) {
                sources.push(src.clone());
            }
        }
    }
    sources
}

fn layout_nodes(values: &[Value], frame: Frame, out: &mut Vec<LayoutNode>) {
    for value in values {
        let Value::Object(node) = value else { continue };
        if node.get("visible").and_then(Value::as_bool) == Some(false) {
            continue;
        }
        let Some(kind) = node_type(node) else {
            log::debug!("Skipping node without type");
            continue;
        };

        let scale = (
            num(node, "scaleX", 1.0) * frame.scale.0,
            num(node, "scaleY", 1.0) * frame.scale.1,
        );
        let opacity = num(node, "opacity", 1.0).clamp(0.0, 1.0) * frame.opacity;

        let (intrinsic_w, intrinsic_h, elem_type) = match kind.as_str() {
            "rect" => (num(node, "width", 0.0), num(node, "height", 0.0), ElementType::Rect),
            "circle" => {
                let r = num(node, "radius", 0.0);
                (num(node, "width", 2.0 * r), num(node, "height", 2.0 * r), ElementType::Ellipse)
            }
            "ellipse" => {
                let (rx, ry) = (num(node, "rx", 0.0), num(node, "ry", 0.0));
                (num(node, "width", 2.0 * rx), num(node, "height", 2.0 * ry), ElementType::Ellipse)
            }
            "line" => (
                num(node, "width", 0.0),
                num(node, "height", 0.0),
                // endpoints are filled in once the box is known
                ElementType::Line { from: (0.0, 0.0), to: (0.0, 0.0) },
            ),
            "text" | "i-text" | "itext" | "textbox" => {
                let block = text_block(node);
                let width = match num(node, "width", 0.0) {
                    w if w > 0.0 => w,
                    _ => widest_line(&block) as f32 * GLYPH_ADVANCE * block.font_size,
                };
                let height = block.lines.len().max(1) as f32 * block.font_size * block.line_height;
                (width, height, ElementType::Text(block))
            }
            "image" => match text_attr(node, "src") {
                Some(src) if !src.is_empty() => (
                    num(node, "width", 0.0),
                    num(node, "height", 0.0),
                    ElementType::Image { src: src.to_string() },
                ),
                _ => {
                    log::debug!("Skipping image node without src");
                    continue;
                }
            },
            "group" => {
                let rect = place(node, frame, num(node, "width", 0.0) * scale.0, num(node, "height", 0.0) * scale.1);
                let inner = Frame {
                    origin: rect.center(),
                    scale,
                    opacity,
                };
                if let Some(Value::Array(members)) = node.get("objects") {
                    layout_nodes(members, inner, out);
                }
                continue;
            }
            other => {
                log::debug!("Skipping unsupported node type `{}`", other);
                continue;
            }
        };

        let rect = place(node, frame, intrinsic_w * scale.0, intrinsic_h * scale.1);
        let elem_type = match elem_type {
            ElementType::Line { .. } => {
                let (cx, cy) = rect.center();
                ElementType::Line {
                    from: (cx + num(node, "x1", 0.0) * scale.0, cy + num(node, "y1", 0.0) * scale.1),
                    to: (cx + num(node, "x2", 0.0) * scale.0, cy + num(node, "y2", 0.0) * scale.1),
                }
            }
            ElementType::Text(mut block) => {
                block.font_size *= scale.1;
                ElementType::Text(block)
            }
            other => other,
        };

        let stroke = text_attr(node, "stroke").and_then(parse_color);
        let stroke_scale = (scale.0 + scale.1) / 2.0;
        let style = Style {
            fill: fill_of(node),
            stroke,
            stroke_width: num(node, "strokeWidth", 1.0) * stroke_scale,
            opacity,
        };

        out.push(LayoutNode { rect, elem_type, style });
    }
}

/// Resolve `left`/`top` against the origin point into a top-left box
fn place(node: &Node, frame: Frame, width: f32, height: f32) -> Rect {
    let left = frame.origin.0 + num(node, "left", 0.0) * frame.scale.0;
    let top = frame.origin.1 + num(node, "top", 0.0) * frame.scale.1;
    let x = match text_attr(node, "originX") {
        Some("center") => left - width / 2.0,
        Some("right") => left - width,
        _ => left,
    };
    let y = match text_attr(node, "originY") {
        Some("center") => top - height / 2.0,
        Some("bottom") => top - height,
        _ => top,
    };
    Rect { x, y, width, height }
}

fn text_block(node: &Node) -> TextBlock {
    let font_size = num(node, "fontSize", DEFAULT_FONT_SIZE);
    let line_height = num(node, "lineHeight", DEFAULT_LINE_HEIGHT);
    let align = match text_attr(node, "textAlign") {
        Some("center") | Some("justify-center") => TextAlign::Center,
        Some("right") | Some("justify-right") => TextAlign::Right,
        _ => TextAlign::Left,
    };
    let text = text_attr(node, "text").unwrap_or_default();

    // Only text boxes wrap; plain text keeps its explicit line breaks.
    let wrap_width = match node_type(node).as_deref() {
        Some("textbox") => Some(num(node, "width", 0.0)).filter(|w| *w > 0.0),
        _ => None,
    };
    let lines = match wrap_width {
        Some(w) => {
            let per_line = ((w / (GLYPH_ADVANCE * font_size) + 1e-3).floor() as usize).max(1);
            text.split('\n').flat_map(|l| wrap_line(l, per_line)).collect()
        }
        None => text.split('\n').map(str::to_string).collect(),
    };

    TextBlock {
        lines,
        font_size,
        line_height,
        align,
    }
}

fn wrap_line(line: &str, chars_per_line: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut cur = String::new();
    for word in line.split_whitespace() {
        if cur.chars().count() + word.chars().count() + 1 > chars_per_line && !cur.is_empty() {
            lines.push(cur);
            cur = word.to_string();
        } else {
            if !cur.is_empty() {
                cur.push(' ');
            }
            cur.push_str(word);
        }
    }
    lines.push(cur);
    lines
}

fn widest_line(block: &TextBlock) -> usize {
    block.lines.iter().map(|l| l.chars().count()).max().unwrap_or(0)
}
