//! Image loading and resizing into channel-first half-precision tensors.

use std::path::Path;

use half::f16;
use image::imageops::{self, FilterType};
use image::{ImageReader, RgbImage};
use ndarray::ArrayViewMut3;

use crate::config::ImageSize;
use crate::error::GridLabelError;
use crate::ir::ImageScale;

/// Opens an image and converts it to 8-bit RGB.
///
/// A missing or unreadable file is [`GridLabelError::Io`]; a file that
/// exists but cannot be decoded is [`GridLabelError::ImageDecode`].
pub fn load_rgb(path: &Path) -> Result<RgbImage, GridLabelError> {
    let reader = ImageReader::open(path)
        .map_err(GridLabelError::Io)?
        .with_guessed_format()
        .map_err(GridLabelError::Io)?;

    let image = reader
        .decode()
        .map_err(|source| GridLabelError::ImageDecode {
            path: path.to_path_buf(),
            source,
        })?;

    let rgb = image.to_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(GridLabelError::EmptyImage {
            path: path.to_path_buf(),
        });
    }
    Ok(rgb)
}

/// Resizes `image` to `target` with bilinear filtering.
///
/// Returns the resized image and the per-axis scale that maps this
/// image's original pixels onto the resized ones.
pub fn resize(image: &RgbImage, target: ImageSize) -> (RgbImage, ImageScale) {
    let scale = ImageScale::between(image.width(), image.height(), target.width, target.height);

    let resized = if image.width() == target.width && image.height() == target.height {
        image.clone()
    } else {
        imageops::resize(image, target.width, target.height, FilterType::Triangle)
    };

    (resized, scale)
}

/// Loads an image from disk and resizes it to `target`.
pub fn load_resized(path: &Path, target: ImageSize) -> Result<(RgbImage, ImageScale), GridLabelError> {
    let rgb = load_rgb(path)?;
    Ok(resize(&rgb, target))
}

/// Writes an RGB image into a `(3, height, width)` view, scaling
/// intensities to `[0, 1]`.
///
/// # Panics
/// Panics if the view's shape doesn't match the image.
pub fn write_chw(image: &RgbImage, mut out: ArrayViewMut3<'_, f16>) {
    let (height, width) = (image.height() as usize, image.width() as usize);
    assert_eq!(
        out.shape(),
        &[3, height, width],
        "tensor slot does not match image size"
    );

    for (x, y, pixel) in image.enumerate_pixels() {
        let (row, col) = (y as usize, x as usize);
        for channel in 0..3 {
            out[[channel, row, col]] = f16::from_f32(f32::from(pixel[channel]) / 255.0);
        }
    }
}
