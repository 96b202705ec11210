//! Image decoding into a dense 8-bit pixel grid.
//!
//! The input image is decoded with the [`image`] crate
//! and normalized into one of two sample layouts:
//! 8-bit grayscale (one sample per pixel)
//! or 8-bit RGB (three interleaved samples per pixel).
//! Alpha channels are always dropped.
use std::path::{Path, PathBuf};

use image::DynamicImage;
use snafu::{ResultExt, Snafu};
use tracing::debug;

/// An error which may occur when loading the input image
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum LoadError {
    #[snafu(display("Could not decode image file '{}'", path.display()))]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// The sample layout to normalize the input image into.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
pub enum ColorMode {
    /// single channel 8-bit grayscale
    Monochrome,
    /// three channel 8-bit RGB, interleaved per pixel
    #[default]
    Rgb,
}

impl ColorMode {
    /// The number of samples per pixel in this layout.
    pub fn samples_per_pixel(self) -> u16 {
        match self {
            ColorMode::Monochrome => 1,
            ColorMode::Rgb => 3,
        }
    }
}

/// A decoded image, normalized to 8 bits per sample.
///
/// Samples are stored in row-major order.
/// In RGB mode, the three samples of each pixel are contiguous
/// (`R G B R G B ...`).
#[derive(Debug, Clone, PartialEq)]
pub struct SourceImage {
    columns: u32,
    rows: u32,
    mode: ColorMode,
    data: Vec<u8>,
}

impl SourceImage {
    /// Normalize an already decoded image into the given sample layout.
    pub fn from_dynamic_image(img: &DynamicImage, mode: ColorMode) -> Self {
        let data = match (mode, img) {
            (ColorMode::Monochrome, DynamicImage::ImageLuma8(gray)) => gray.as_raw().clone(),
            (ColorMode::Monochrome, img) => img
                .to_rgb8()
                .pixels()
                .map(|p| luminance(p.0))
                .collect(),
            (ColorMode::Rgb, img) => img.to_rgb8().into_raw(),
        };

        SourceImage {
            columns: img.width(),
            rows: img.height(),
            mode,
            data,
        }
    }

    /// The width of the image in pixels.
    pub fn columns(&self) -> u32 {
        self.columns
    }

    /// The height of the image in pixels.
    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn color_mode(&self) -> ColorMode {
        self.mode
    }

    pub fn samples_per_pixel(&self) -> u16 {
        self.mode.samples_per_pixel()
    }

    /// The raw sample buffer.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Take the raw sample buffer, discarding the image descriptor.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// Decode the image file at the given path
/// and normalize it into the given sample layout.
///
/// The file format is guessed from the file's contents and extension.
pub fn open_image<P>(path: P, mode: ColorMode) -> Result<SourceImage, LoadError>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let img = image::open(path).context(DecodeSnafu { path })?;

    debug!(
        "Decoded {}x{} {:?} image from {}",
        img.width(),
        img.height(),
        img.color(),
        path.display()
    );

    Ok(SourceImage::from_dynamic_image(&img, mode))
}

/// ITU-R BT.601 luma in 16.16 fixed point, rounded to nearest.
fn luminance([r, g, b]: [u8; 3]) -> u8 {
    ((19_595 * r as u32 + 38_470 * g as u32 + 7_471 * b as u32 + 0x8000) >> 16) as u8
}
