//! Rasterizer: paint commands onto an RGBA surface

use image::{Pixel, Rgba, RgbaImage};

use super::layout::Rect;
use super::paint::PaintCommand;

/// A drawing surface for one render
///
/// Every render builds its own surface; nothing is shared between calls.
pub struct Surface {
    pixels: RgbaImage,
    scale: f32,
}

impl Surface {
    /// Surface of `width`×`height` pixels, mapping logical units by `scale`
    pub fn new(width: u32, height: u32, scale: f32, background: Option<Rgba<u8>>) -> Self {
        let fill = background.unwrap_or(Rgba([0, 0, 0, 0]));
        Self {
            pixels: RgbaImage::from_pixel(width, height, fill),
            scale,
        }
    }

    pub fn into_pixels(self) -> RgbaImage {
        self.pixels
    }

    /// Pixel range covered by `[start, start + len)` logical units on an axis
    fn span(&self, start: f32, len: f32, limit: u32) -> (u32, u32) {
        let lo = (start * self.scale).round().max(0.0);
        let hi = ((start + len) * self.scale).round().max(0.0);
        ((lo as u32).min(limit), (hi as u32).min(limit))
    }

    fn blend_at(&mut self, x: u32, y: u32, rgba: Rgba<u8>) {
        if x < self.pixels.width() && y < self.pixels.height() {
            self.pixels.get_pixel_mut(x, y).blend(&rgba);
        }
    }

    pub fn draw(&mut self, cmd: &PaintCommand) {
        match cmd {
            PaintCommand::SolidRect { rect, rgba } => self.fill_rect(*rect, *rgba),
            PaintCommand::Ellipse { rect, rgba, ring } => self.fill_ellipse(*rect, *rgba, *ring),
            PaintCommand::Line { from, to, width, rgba } => self.stroke_line(*from, *to, *width, *rgba),
            PaintCommand::Image { rect, image, opacity } => self.draw_image(*rect, image, *opacity),
        }
    }

    fn fill_rect(&mut self, rect: Rect, rgba: Rgba<u8>) {
        let (x0, x1) = self.span(rect.x, rect.width, self.pixels.width());
        let (y0, y1) = self.span(rect.y, rect.height, self.pixels.height());
        for y in y0..y1 {
            for x in x0..x1 {
                self.blend_at(x, y, rgba);
            }
        }
    }

    fn fill_ellipse(&mut self, rect: Rect, rgba: Rgba<u8>, ring: Option<f32>) {
        let half = ring.unwrap_or(0.0) / 2.0;
        let outer = Rect {
            x: rect.x - half,
            y: rect.y - half,
            width: rect.width + 2.0 * half,
            height: rect.height + 2.0 * half,
        };
        let (cx, cy) = rect.center();
        let (rx, ry) = (outer.width / 2.0, outer.height / 2.0);
        let (inner_rx, inner_ry) = (rect.width / 2.0 - half, rect.height / 2.0 - half);
        if rx <= 0.0 || ry <= 0.0 {
            return;
        }

        let (x0, x1) = self.span(outer.x, outer.width, self.pixels.width());
        let (y0, y1) = self.span(outer.y, outer.height, self.pixels.height());
        for y in y0..y1 {
            for x in x0..x1 {
                // pixel center back in logical units
                let lx = (x as f32 + 0.5) / self.scale - cx;
                let ly = (y as f32 + 0.5) / self.scale - cy;
                let inside_outer = (lx / rx).powi(2) + (ly / ry).powi(2) <= 1.0;
                let inside_inner = ring.is_some()
                    && inner_rx > 0.0
                    && inner_ry > 0.0
                    && (lx / inner_rx).powi(2) + (ly / inner_ry).powi(2) < 1.0;
                if inside_outer && !inside_inner {
                    self.blend_at(x, y, rgba);
                }
            }
        }
    }

    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), width: f32, rgba: Rgba<u8>) {
        let brush = (width * self.scale).max(1.0);
        let half = brush / 2.0;
        let (w, h) = self.pixels.dimensions();
        let bounds = (-half, -half, w as f32 + half, h as f32 + half);
        let start = (from.0 * self.scale, from.1 * self.scale);
        let end = (to.0 * self.scale, to.1 * self.scale);
        let Some((a, b)) = clip_segment(start, end, bounds) else {
            return;
        };

        let (dx, dy) = (b.0 - a.0, b.1 - a.1);
        let steps = dx.hypot(dy).ceil().max(1.0) as u32;
        let pixel = |v: f32, limit: u32| (v.round().max(0.0) as u32).min(limit);

        let mut covered = std::collections::HashSet::new();
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let (px, py) = (a.0 + dx * t, a.1 + dy * t);
            let (x0, x1) = (pixel(px - half, w), pixel(px + half, w));
            let (y0, y1) = (pixel(py - half, h), pixel(py + half, h));
            for y in y0..y1.max(y0 + 1).min(h) {
                for x in x0..x1.max(x0 + 1).min(w) {
                    // blend each pixel once so translucent lines stay even
                    if covered.insert((x, y)) {
                        self.blend_at(x, y, rgba);
                    }
                }
            }
        }
    }

    /// Nearest-neighbour scaling, evaluated only for pixels on the surface
    fn draw_image(&mut self, rect: Rect, image: &RgbaImage, opacity: f32) {
        let (src_w, src_h) = image.dimensions();
        let x0 = (rect.x * self.scale).round() as f64;
        let y0 = (rect.y * self.scale).round() as f64;
        let w = ((rect.x + rect.width) * self.scale).round() as f64 - x0;
        let h = ((rect.y + rect.height) * self.scale).round() as f64 - y0;
        if !(w > 0.0 && h > 0.0) || src_w == 0 || src_h == 0 {
            return;
        }

        let (surf_w, surf_h) = self.pixels.dimensions();
        let visible = |origin: f64, len: f64, limit: u32| {
            let lo = origin.max(0.0).min(limit as f64) as u32;
            let hi = (origin + len).max(0.0).min(limit as f64) as u32;
            lo..hi
        };

        for y in visible(y0, h, surf_h) {
            let sy = (((y as f64 + 0.5 - y0) / h * src_h as f64) as u32).min(src_h - 1);
            for x in visible(x0, w, surf_w) {
                let sx = (((x as f64 + 0.5 - x0) / w * src_w as f64) as u32).min(src_w - 1);
                let Rgba([r, g, b, a]) = *image.get_pixel(sx, sy);
                let a = (a as f32 * opacity).round() as u8;
                if a > 0 {
                    self.blend_at(x, y, Rgba([r, g, b, a]));
                }
            }
        }
    }
}

/// Clip segment `a`-`b` to `(min_x, min_y, max_x, max_y)` (Liang-Barsky)
fn clip_segment(
    a: (f32, f32),
    b: (f32, f32),
    (min_x, min_y, max_x, max_y): (f32, f32, f32, f32),
) -> Option<((f32, f32), (f32, f32))> {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let (mut t0, mut t1) = (0.0f32, 1.0f32);
    for (p, q) in [(-dx, a.0 - min_x), (dx, max_x - a.0), (-dy, a.1 - min_y), (dy, max_y - a.1)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }
    Some(((a.0 + t0 * dx, a.1 + t0 * dy), (a.0 + t1 * dx, a.1 + t1 * dy)))
}

/// Draw `commands` in order on a fresh surface
pub fn rasterize(
    commands: &[PaintCommand],
    width: u32,
    height: u32,
    scale: f32,
    background: Option<Rgba<u8>>,
) -> RgbaImage {
    let mut surface = Surface::new(width, height, scale, background);
    for cmd in commands {
        surface.draw(cmd);
    }
    surface.into_pixels()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    #[test]
    fn rasterize_fills_background_and_rect() {
        let cmds = [PaintCommand::SolidRect {
            rect: Rect { x: 2.0, y: 2.0, width: 4.0, height: 4.0 },
            rgba: RED,
        }];
        let img = rasterize(&cmds, 10, 10, 1.0, Some(WHITE));
        assert_eq!(img.dimensions(), (10, 10));
        assert_eq!(*img.get_pixel(0, 0), WHITE);
        assert_eq!(*img.get_pixel(3, 3), RED);
        assert_eq!(*img.get_pixel(6, 6), WHITE);
    }

    #[test]
    fn scale_maps_logical_units_to_pixels() {
        let cmds = [PaintCommand::SolidRect {
            rect: Rect { x: 40.0, y: 40.0, width: 40.0, height: 40.0 },
            rgba: RED,
        }];
        let img = rasterize(&cmds, 40, 30, 0.25, None);
        assert_eq!(*img.get_pixel(12, 12), RED);
        assert_eq!(img.get_pixel(5, 5).0[3], 0);
    }

    #[test]
    fn translucent_paint_blends_over_background() {
        let cmds = [PaintCommand::SolidRect {
            rect: Rect { x: 0.0, y: 0.0, width: 1.0, height: 1.0 },
            rgba: Rgba([0, 0, 0, 128]),
        }];
        let img = rasterize(&cmds, 1, 1, 1.0, Some(WHITE));
        let px = img.get_pixel(0, 0);
        assert!(px.0[0] > 100 && px.0[0] < 160, "got {:?}", px);
        assert_eq!(px.0[3], 255);
    }

    #[test]
    fn ellipse_ring_leaves_center_untouched() {
        let cmds = [PaintCommand::Ellipse {
            rect: Rect { x: 0.0, y: 0.0, width: 20.0, height: 20.0 },
            rgba: RED,
            ring: Some(2.0),
        }];
        let img = rasterize(&cmds, 22, 22, 1.0, Some(WHITE));
        assert_eq!(*img.get_pixel(10, 10), WHITE);
        assert_eq!(*img.get_pixel(10, 0), RED);
    }

    #[test]
    fn commands_outside_the_surface_are_clipped() {
        let cmds = [
            PaintCommand::SolidRect {
                rect: Rect { x: -50.0, y: -50.0, width: 500.0, height: 500.0 },
                rgba: RED,
            },
            PaintCommand::Line { from: (-10.0, 5.0), to: (100.0, 5.0), width: 2.0, rgba: WHITE },
        ];
        let img = rasterize(&cmds, 8, 8, 1.0, None);
        assert_eq!(*img.get_pixel(7, 7), RED);
        assert_eq!(*img.get_pixel(3, 5), WHITE);
    }

    #[test]
    fn oversized_image_boxes_only_sample_visible_pixels() {
        let src = Arc::new(RgbaImage::from_fn(2, 2, |x, _| if x == 0 { RED } else { WHITE }));
        let cmds = [PaintCommand::Image {
            rect: Rect { x: -10.0, y: -10.0, width: 80_000.0, height: 80_000.0 },
            image: src,
            opacity: 1.0,
        }];
        let img = rasterize(&cmds, 8, 8, 1.0, None);
        // the left source column covers the first 40_000 units
        assert_eq!(*img.get_pixel(0, 0), RED);
        assert_eq!(*img.get_pixel(7, 7), RED);
    }

    #[test]
    fn very_long_lines_are_clipped_to_the_surface() {
        let cmds = [PaintCommand::Line { from: (0.0, 4.0), to: (20_000_000.0, 4.0), width: 2.0, rgba: RED }];
        let img = rasterize(&cmds, 8, 8, 1.0, None);
        assert_eq!(*img.get_pixel(0, 4), RED);
        assert_eq!(*img.get_pixel(7, 4), RED);
        assert_eq!(img.get_pixel(4, 0).0[3], 0);
    }

    #[test]
    fn lines_entirely_off_the_surface_draw_nothing() {
        let cmds = [PaintCommand::Line { from: (-500.0, -5.0), to: (500.0, -5.0), width: 2.0, rgba: RED }];
        let img = rasterize(&cmds, 8, 8, 1.0, None);
        assert!(img.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn images_are_resized_into_their_box() {
        let src = Arc::new(RgbaImage::from_pixel(2, 2, RED));
        let cmds = [PaintCommand::Image {
            rect: Rect { x: 1.0, y: 1.0, width: 4.0, height: 4.0 },
            image: src,
            opacity: 1.0,
        }];
        let img = rasterize(&cmds, 6, 6, 1.0, Some(WHITE));
        assert_eq!(*img.get_pixel(0, 0), WHITE);
        assert_eq!(*img.get_pixel(2, 2), RED);
        assert_eq!(*img.get_pixel(4, 4), RED);
        assert_eq!(*img.get_pixel(5, 5), WHITE);
    }
}
