// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text enhancement pipeline — turns an arbitrary photo or scan into a clean,
// binarised, minimum-width raster that the recognition engine reads well.

use std::io::Cursor;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageFormat, ImageReader, Limits};
use textlift_core::error::{Result, TextliftError};
use tracing::{debug, info, instrument};

use super::filters;

/// CLAHE clip limit.
pub const CLAHE_CLIP_LIMIT: f32 = 2.0;
/// CLAHE tile grid (tiles per side).
pub const CLAHE_GRID: u32 = 8;
/// Bilateral neighbourhood diameter.
pub const BILATERAL_DIAMETER: u32 = 9;
/// Bilateral sigma for both intensity and spatial distance.
pub const BILATERAL_SIGMA: f32 = 75.0;
/// Adaptive threshold window size.
pub const THRESHOLD_BLOCK_SIZE: u32 = 31;
/// Offset subtracted from the local mean before thresholding.
pub const THRESHOLD_OFFSET: i32 = 15;
/// Enhanced images narrower than this are upscaled to it.
pub const MIN_WIDTH: u32 = 1200;
/// Largest raster, in pixels, the pipeline decodes or produces.
pub const MAX_PIXELS: u64 = 64 * 1024 * 1024;

/// A binarised single-channel image ready for text recognition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnhancedRaster {
    image: GrayImage,
}

impl EnhancedRaster {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Write the raster to `path` as PNG, regardless of the path's extension.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        self.image
            .save_with_format(path.as_ref(), ImageFormat::Png)
            .map_err(|err| {
                TextliftError::ImageError(format!(
                    "failed to write enhanced image {}: {}",
                    path.as_ref().display(),
                    err
                ))
            })?;
        debug!("Enhanced image written");
        Ok(())
    }
}

/// Enhances an image for OCR.
///
/// The pipeline always runs in the same order:
///
/// 1. Grayscale conversion
/// 2. Local contrast equalisation (CLAHE, 8x8 tiles, clip limit 2.0)
/// 3. Bilateral smoothing (diameter 9, sigma 75/75)
/// 4. Gaussian adaptive threshold (31x31 window, offset 15)
/// 5. 2x2 closing, then 2x2 opening
/// 6. Linear upscale to at least 1200 px wide, aspect ratio preserved
///
/// Every stage is deterministic, so the same input always yields the same
/// raster. Inputs whose decoded or upscaled size exceeds [`MAX_PIXELS`] are
/// rejected at construction, so `enhance` itself cannot fail.
pub struct TextEnhancer {
    /// Working buffer; grayscale from construction onwards.
    image: GrayImage,
}

impl TextEnhancer {
    // -- Construction ---------------------------------------------------------

    /// Decode raw image bytes (PNG, JPEG, TIFF, ...). The format is sniffed
    /// from the content, not from any filename.
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|err| TextliftError::Decode(err.to_string()))?;
        reader.limits(decode_limits());
        let image = reader
            .decode()
            .map_err(|err| TextliftError::Decode(err.to_string()))?;
        Self::from_dynamic(image)
    }

    /// Read and decode an image file.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_bytes(&data)
    }

    /// Wrap an already decoded image, converting it to grayscale.
    pub fn from_dynamic(image: DynamicImage) -> Result<Self> {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(TextliftError::Decode(format!(
                "image has no pixels ({}x{})",
                width, height
            )));
        }
        if width as u64 * height as u64 > MAX_PIXELS {
            return Err(TextliftError::Decode(format!(
                "image is {}x{}, above the {} pixel limit",
                width, height, MAX_PIXELS
            )));
        }
        let (out_w, out_h) = output_dimensions(width, height);
        if out_w as u64 * out_h as u64 > MAX_PIXELS {
            return Err(TextliftError::ImageError(format!(
                "{}x{} image would upscale to {}x{}, above the {} pixel limit",
                width, height, out_w, out_h, MAX_PIXELS
            )));
        }

        info!(width, height, "Image loaded for enhancement");
        Ok(Self {
            image: image.to_luma8(),
        })
    }

    // -- Pipeline -------------------------------------------------------------

    /// Run the full enhancement pipeline.
    #[instrument(skip_all)]
    pub fn enhance(self) -> EnhancedRaster {
        let image = self
            .equalize_local_contrast()
            .smooth()
            .binarize()
            .clean_up()
            .ensure_min_width()
            .image;

        info!(
            width = image.width(),
            height = image.height(),
            "Enhancement complete"
        );
        EnhancedRaster { image }
    }

    fn equalize_local_contrast(self) -> Self {
        let image = filters::clahe(&self.image, CLAHE_CLIP_LIMIT, CLAHE_GRID);
        debug!("CLAHE applied");
        Self { image }
    }

    fn smooth(self) -> Self {
        let image = filters::bilateral(
            &self.image,
            BILATERAL_DIAMETER,
            BILATERAL_SIGMA,
            BILATERAL_SIGMA,
        );
        debug!("Bilateral filter applied");
        Self { image }
    }

    fn binarize(self) -> Self {
        let image =
            filters::adaptive_threshold_gaussian(&self.image, THRESHOLD_BLOCK_SIZE, THRESHOLD_OFFSET);
        debug!("Adaptive threshold applied");
        Self { image }
    }

    /// Closing, then opening. The order is fixed.
    fn clean_up(self) -> Self {
        let closed = filters::close_2x2(&self.image);
        let image = filters::open_2x2(&closed);
        debug!("Morphological cleanup applied");
        Self { image }
    }

    fn ensure_min_width(self) -> Self {
        let (width, height) = self.image.dimensions();
        let (new_width, new_height) = output_dimensions(width, height);
        if new_width == width {
            return self;
        }

        debug!(
            from_w = width,
            from_h = height,
            to_w = new_width,
            to_h = new_height,
            "Upscaling to minimum width"
        );
        Self {
            image: imageops::resize(&self.image, new_width, new_height, FilterType::Triangle),
        }
    }
}

/// Decoder limits matching [`MAX_PIXELS`] at four bytes per pixel.
fn decode_limits() -> Limits {
    let mut limits = Limits::default();
    limits.max_alloc = Some(MAX_PIXELS * 4);
    limits
}

/// Size of the enhanced raster for a `width` x `height` input.
fn output_dimensions(width: u32, height: u32) -> (u32, u32) {
    if width >= MIN_WIDTH {
        (width, height)
    } else {
        (MIN_WIDTH, scaled_height(width, height, MIN_WIDTH))
    }
}

/// Height that keeps the aspect ratio when `width` is scaled to `target_width`.
/// Fractions are truncated; the result is never zero.
fn scaled_height(width: u32, height: u32, target_width: u32) -> u32 {
    let scaled = height as u64 * target_width as u64 / width as u64;
    scaled.clamp(1, u32::MAX as u64) as u32
}

/// Decode `data` and run the enhancement pipeline.
pub fn enhance_bytes(data: &[u8]) -> Result<EnhancedRaster> {
    Ok(TextEnhancer::from_bytes(data)?.enhance())
}

/// Read the image at `path` and run the enhancement pipeline.
pub fn enhance_file(path: impl AsRef<Path>) -> Result<EnhancedRaster> {
    Ok(TextEnhancer::open(path)?.enhance())
}

/// Run the enhancement pipeline on an already decoded image.
pub fn enhance_image(image: DynamicImage) -> Result<EnhancedRaster> {
    Ok(TextEnhancer::from_dynamic(image)?.enhance())
}
