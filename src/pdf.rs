//! Single-page PDF wrapping of a rendered bitmap

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::Rgba;
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref};

use crate::rendering::Bitmap;
use crate::{CanvasSize, Error, Result};

/// Backdrop transparent render pixels are composited onto
pub const PAGE_BACKDROP: Rgba<u8> = Rgba([255, 255, 255, 255]);

const IMAGE_NAME: Name<'static> = Name(b"Im1");

/// Page size in points for `canvas`, landscape: the longer side is the width
pub fn landscape_page(canvas: CanvasSize) -> (f32, f32) {
    let (w, h) = (canvas.width as f32, canvas.height as f32);
    (w.max(h), w.min(h))
}

/// Lossless page image: flattened RGB samples, zlib-compressed at the best
/// level (the `FlateDecode` stream of the image XObject)
pub fn page_image_stream(bitmap: &Bitmap) -> Result<Vec<u8>> {
    let rgb = bitmap.flatten(PAGE_BACKDROP);
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(rgb.as_raw())
        .and_then(|_| encoder.finish())
        .map_err(|e| Error::RenderFailure(format!("compressing page image failed: {}", e)))
}

/// Build a one-page document showing `bitmap` at the canvas size, anchored
/// at the top-left corner (one point per canvas unit).
pub fn single_page_document(bitmap: &Bitmap, canvas: CanvasSize) -> Result<Vec<u8>> {
    if bitmap.width == 0 || bitmap.height == 0 {
        return Err(Error::RenderFailure("cannot embed an empty bitmap".into()));
    }
    let samples = page_image_stream(bitmap)?;

    let catalog_id = Ref::new(1);
    let page_tree_id = Ref::new(2);
    let page_id = Ref::new(3);
    let image_id = Ref::new(4);
    let content_id = Ref::new(5);

    let (page_w, page_h) = landscape_page(canvas);
    let (draw_w, draw_h) = (canvas.width as f32, canvas.height as f32);

    let mut pdf = Pdf::new();
    pdf.catalog(catalog_id).pages(page_tree_id);
    pdf.pages(page_tree_id).kids([page_id]).count(1);

    let mut page = pdf.page(page_id);
    page.media_box(Rect::new(0.0, 0.0, page_w, page_h));
    page.parent(page_tree_id);
    page.contents(content_id);
    page.resources().x_objects().pair(IMAGE_NAME, image_id);
    page.finish();

    let mut image = pdf.image_xobject(image_id, &samples);
    image.filter(Filter::FlateDecode);
    image.width(bitmap.width as i32);
    image.height(bitmap.height as i32);
    image.color_space().device_rgb();
    image.bits_per_component(8);
    image.finish();

    // image space is the unit square; PDF y grows upwards
    let mut content = Content::new();
    content.save_state();
    content.transform([draw_w, 0.0, 0.0, draw_h, 0.0, page_h - draw_h]);
    content.x_object(IMAGE_NAME);
    content.restore_state();
    pdf.stream(content_id, &content.finish());

    Ok(pdf.finish())
}
