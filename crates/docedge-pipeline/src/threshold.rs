//! Fixed-level binarization.

use image::{DynamicImage, GrayImage};

use crate::frame::Frame;
use crate::types::ErrorKind;

/// Binarize a grayscale image.
///
/// Pixels with intensity strictly greater than `cutoff` become
/// `max_value`; every other pixel becomes `0`.
#[must_use = "returns the binary map"]
pub fn threshold(src: &GrayImage, cutoff: u8, max_value: u8) -> GrayImage {
    let mut binary = src.clone();
    for pixel in binary.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > cutoff { max_value } else { 0 };
    }
    binary
}

/// Binarize a frame, which must be single-channel.
///
/// # Errors
///
/// Returns [`ErrorKind::InvalidChannelCount`] if the frame has more than
/// one channel.
pub fn threshold_frame(src: &Frame, cutoff: u8, max_value: u8) -> Result<GrayImage, ErrorKind> {
    match src.as_dynamic() {
        DynamicImage::ImageLuma8(gray) => Ok(threshold(gray, cutoff, max_value)),
        _ => Err(ErrorKind::InvalidChannelCount {
            channels: src.channels(),
        }),
    }
}

/// Number of nonzero pixels in a binary map.
#[must_use]
pub fn foreground_count(binary: &GrayImage) -> usize {
    binary.pixels().filter(|p| p.0[0] != 0).count()
}
