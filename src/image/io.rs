//! Convenience helpers for loading images and saving disparity maps via
//! the `image` crate.
//!
//! Available when the `image-io` feature is enabled.

use std::path::Path;

use crate::disparity::DisparityMap;
use crate::raster::{ChannelType, ImageFormat, PixelBuffer, PixelLayout};
use crate::util::{StereoError, StereoResult};

/// Loads an image from disk and converts it to a single-plane grayscale
/// `u8` buffer.
pub fn load_gray_buffer<P: AsRef<Path>>(path: P) -> StereoResult<PixelBuffer> {
    let img = image::open(path)
        .map_err(|err| StereoError::ImageIo {
            reason: err.to_string(),
        })?
        .to_luma8();
    let format = ImageFormat::new(img.width(), img.height(), PixelLayout::Gray, ChannelType::U8);
    PixelBuffer::from_bytes(img.into_raw(), format)
}

/// Saves a disparity map as a grayscale visualization.
///
/// Valid horizontal offsets are normalized over their observed range into
/// [64, 255]; invalid pixels are black. Lossy by construction, meant for
/// eyeballing results and the per-level debug side channel.
pub fn save_disparity_image<P: AsRef<Path>>(map: &DisparityMap, path: P) -> StereoResult<()> {
    let mut min_h = f32::INFINITY;
    let mut max_h = f32::NEG_INFINITY;
    for d in map.data() {
        if let Some((h, _)) = d.offsets() {
            min_h = min_h.min(h);
            max_h = max_h.max(h);
        }
    }
    let span = (max_h - min_h).max(1e-6);

    let img = image::GrayImage::from_fn(map.width() as u32, map.height() as u32, |x, y| {
        match map.at(x as usize, y as usize).offsets() {
            Some((h, _)) => {
                let norm = (h - min_h) / span;
                image::Luma([(64.0 + norm * 191.0) as u8])
            }
            None => image::Luma([0u8]),
        }
    });
    img.save(path).map_err(|err| StereoError::ImageIo {
        reason: err.to_string(),
    })
}
