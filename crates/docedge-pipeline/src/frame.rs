//! Input frames and grayscale conversion.
//!
//! A [`Frame`] is the pipeline's input (and the renderer's output): an
//! 8-bit image in one of four channel layouts. Frames come from raw
//! camera-style buffers, from an already decoded [`DynamicImage`], or
//! from encoded bytes (PNG, JPEG, BMP, WebP).

use image::{DynamicImage, GrayAlphaImage, GrayImage, Luma, RgbImage, RgbaImage};

use crate::types::{Dimensions, ErrorKind};

/// An 8-bit image frame with 1 (gray), 2 (gray + alpha), 3 (RGB) or
/// 4 (RGBA) channels.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    image: DynamicImage,
}

impl Frame {
    /// Build a frame from interleaved 8-bit pixel data, row-major.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::UnsupportedFormat`] if `channels` is not in
    /// `1..=4`, or [`ErrorKind::InvalidBuffer`] if `data.len()` differs
    /// from `width * height * channels`.
    pub fn from_raw(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<Self, ErrorKind> {
        if !(1..=4).contains(&channels) {
            return Err(ErrorKind::UnsupportedFormat { channels });
        }
        let expected = width as usize * height as usize * usize::from(channels);
        let actual = data.len();
        if actual != expected {
            return Err(ErrorKind::InvalidBuffer { expected, actual });
        }

        let image = match channels {
            1 => GrayImage::from_raw(width, height, data).map(DynamicImage::ImageLuma8),
            2 => GrayAlphaImage::from_raw(width, height, data).map(DynamicImage::ImageLumaA8),
            3 => RgbImage::from_raw(width, height, data).map(DynamicImage::ImageRgb8),
            _ => RgbaImage::from_raw(width, height, data).map(DynamicImage::ImageRgba8),
        };
        image
            .map(|image| Self { image })
            .ok_or(ErrorKind::InvalidBuffer { expected, actual })
    }

    /// Wrap a decoded image, converting higher bit depths to 8 bits per
    /// channel while keeping the gray/color and alpha layout.
    #[must_use]
    pub fn from_dynamic(image: DynamicImage) -> Self {
        let image = match image {
            DynamicImage::ImageLuma8(_)
            | DynamicImage::ImageLumaA8(_)
            | DynamicImage::ImageRgb8(_)
            | DynamicImage::ImageRgba8(_) => image,
            other => {
                let color = other.color();
                match (color.has_color(), color.has_alpha()) {
                    (false, false) => DynamicImage::ImageLuma8(other.to_luma8()),
                    (false, true) => DynamicImage::ImageLumaA8(other.to_luma_alpha8()),
                    (true, false) => DynamicImage::ImageRgb8(other.to_rgb8()),
                    (true, true) => DynamicImage::ImageRgba8(other.to_rgba8()),
                }
            }
        };
        Self { image }
    }

    /// Decode encoded image bytes into a frame.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::EmptyInput`] if `bytes` is empty, or
    /// [`ErrorKind::ImageDecode`] if the format is unrecognized or the
    /// data is corrupt.
    pub fn decode(bytes: &[u8]) -> Result<Self, ErrorKind> {
        if bytes.is_empty() {
            return Err(ErrorKind::EmptyInput);
        }
        let image = image::load_from_memory(bytes)?;
        Ok(Self::from_dynamic(image))
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Number of pixel rows (the height).
    #[must_use]
    pub fn rows(&self) -> u32 {
        self.height()
    }

    /// Number of pixel columns (the width).
    #[must_use]
    pub fn cols(&self) -> u32 {
        self.width()
    }

    /// Both dimensions.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width(),
            height: self.height(),
        }
    }

    /// Channels per pixel (1 to 4).
    #[must_use]
    pub fn channels(&self) -> u8 {
        self.image.color().channel_count()
    }

    /// Borrow the underlying image.
    #[must_use]
    pub const fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    /// Mutable access for drawing. Crate-private so the channel layout
    /// cannot be changed from outside.
    pub(crate) const fn as_dynamic_mut(&mut self) -> &mut DynamicImage {
        &mut self.image
    }

    /// Consume the frame, returning the underlying image.
    #[must_use]
    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }
}

impl From<DynamicImage> for Frame {
    fn from(image: DynamicImage) -> Self {
        Self::from_dynamic(image)
    }
}

impl From<GrayImage> for Frame {
    fn from(image: GrayImage) -> Self {
        Self {
            image: DynamicImage::ImageLuma8(image),
        }
    }
}

/// BT.601 luma: `0.299*R + 0.587*G + 0.114*B`, rounded.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn luma(r: u8, g: u8, b: u8) -> u8 {
    let weighted = 299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b);
    // At most 255_000, so the rounded quotient fits in u8.
    ((weighted + 500) / 1000) as u8
}

/// Convert a frame to a single-channel grayscale image.
///
/// Gray frames are copied as-is. RGB and RGBA frames use the BT.601
/// luma weights; alpha is ignored.
///
/// # Errors
///
/// Returns [`ErrorKind::UnsupportedFormat`] for frames whose channel
/// count is not 1, 3 or 4.
pub fn to_grayscale(frame: &Frame) -> Result<GrayImage, ErrorKind> {
    match &frame.image {
        DynamicImage::ImageLuma8(gray) => Ok(gray.clone()),
        DynamicImage::ImageRgb8(rgb) => Ok(GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
            let [r, g, b] = rgb.get_pixel(x, y).0;
            Luma([luma(r, g, b)])
        })),
        DynamicImage::ImageRgba8(rgba) => Ok(GrayImage::from_fn(
            rgba.width(),
            rgba.height(),
            |x, y| {
                let [r, g, b, _] = rgba.get_pixel(x, y).0;
                Luma([luma(r, g, b)])
            },
        )),
        other => Err(ErrorKind::UnsupportedFormat {
            channels: other.color().channel_count(),
        }),
    }
}
