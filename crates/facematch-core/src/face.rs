//! Face crop extraction and resizing ahead of the embedder.

use crate::types::BoundingBox;
use image::imageops::{self, FilterType};
use image::RgbImage;

/// Crop `region` out of `frame`.
///
/// The region is clamped to the frame first; degenerate regions yield `None`.
pub fn crop_face(frame: &RgbImage, region: &BoundingBox) -> Option<(BoundingBox, RgbImage)> {
    let clamped = region.clamp(frame.width(), frame.height())?;
    let crop = imageops::crop_imm(
        frame,
        clamped.x1 as u32,
        clamped.y1 as u32,
        clamped.width(),
        clamped.height(),
    )
    .to_image();
    Some((clamped, crop))
}

/// Resize a face crop to `size` x `size` with bilinear filtering.
///
/// Crops already at the target size are returned as-is.
pub fn prepare_face(face: &RgbImage, size: u32) -> RgbImage {
    if face.dimensions() == (size, size) {
        return face.clone();
    }
    imageops::resize(face, size, size, FilterType::Triangle)
}
