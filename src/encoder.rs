//! Re-encodes an accepted image into the output file, stepping JPEG quality
//! down until the result fits the size budget.

use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::{FilterType, overlay};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, Rgba, RgbImage, RgbaImage};
use tracing::{debug, error, info, warn};

use crate::constants::{JPEG_QUALITY_FLOOR, JPEG_QUALITY_STEP, JPEG_START_QUALITY};
use crate::error::WallfetchError;
use crate::storage::atomic_write;

/// Output encodings.
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Lossy, quality-stepped
    Jpeg,
    /// Lossless, best compression
    Png,
}

impl OutputFormat {
    /// File extension for the format.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }

    /// Whether re-encoding at a lower quality can shrink the output.
    pub fn has_quality(self) -> bool {
        matches!(self, OutputFormat::Jpeg)
    }
}

/// The JPEG qualities tried, from `start` down to `floor` in `step`s.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct QualityLadder {
    /// First quality tried.
    pub start: u8,
    /// Decrement per step.
    pub step: u8,
    /// Lowest quality tried.
    pub floor: u8,
}

impl Default for QualityLadder {
    fn default() -> Self {
        Self {
            start: JPEG_START_QUALITY,
            step: JPEG_QUALITY_STEP,
            floor: JPEG_QUALITY_FLOOR,
        }
    }
}

impl QualityLadder {
    /// Every quality on the ladder, highest first.
    pub fn qualities(&self) -> Vec<u8> {
        let mut quality = self.start.clamp(1, 100);
        let mut out = vec![quality];
        while self.step > 0 && quality > self.floor {
            quality = quality.saturating_sub(self.step).max(self.floor).max(1);
            out.push(quality);
        }
        out
    }
}

/// One encode pass.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EncodeStep {
    /// JPEG quality used, `None` for PNG.
    pub quality: Option<u8>,
    /// Size this pass produced.
    pub size: usize,
    /// Size of the smallest encoding so far, which is what gets written.
    pub retained_size: usize,
}

/// What [compress] did.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EncodeReport {
    /// Every pass, in order.
    pub steps: Vec<EncodeStep>,
    /// Quality of the bytes written, `None` for PNG.
    pub quality: Option<u8>,
    /// Bytes written to the output path.
    pub size: usize,
    /// Whether the written size fits the budget.
    pub within_budget: bool,
}

/// Downscales to `(width, height)` with a Lanczos filter.
pub fn downscale(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    debug!(
        "Downscaling {}x{} to {}x{}",
        image.width(),
        image.height(),
        width,
        height
    );
    image.resize_exact(width, height, FilterType::Lanczos3)
}

/// Transparent areas end up this colour in JPEG output.
const JPEG_BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Composites any alpha channel over [JPEG_BACKGROUND].
pub fn flatten_alpha(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let mut canvas = RgbaImage::from_pixel(image.width(), image.height(), JPEG_BACKGROUND);
    overlay(&mut canvas, &image.to_rgba8(), 0, 0);
    DynamicImage::ImageRgba8(canvas).to_rgb8()
}

/// Encodes into memory. `quality` is ignored for PNG.
pub fn encode(
    image: &DynamicImage,
    format: OutputFormat,
    quality: Option<u8>,
) -> Result<Vec<u8>, WallfetchError> {
    let mut output = Vec::new();
    match format {
        OutputFormat::Jpeg => {
            let rgb = flatten_alpha(image);
            let quality = quality.unwrap_or(JPEG_START_QUALITY);
            JpegEncoder::new_with_quality(&mut output, quality).encode(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                ExtendedColorType::Rgb8,
            )?;
        }
        OutputFormat::Png => {
            let encoder =
                PngEncoder::new_with_quality(&mut output, CompressionType::Best, PngFilter::Adaptive);
            if image.color().has_alpha() {
                let rgba = image.to_rgba8();
                encoder.write_image(
                    rgba.as_raw(),
                    rgba.width(),
                    rgba.height(),
                    ExtendedColorType::Rgba8,
                )?;
            } else {
                let rgb = image.to_rgb8();
                encoder.write_image(
                    rgb.as_raw(),
                    rgb.width(),
                    rgb.height(),
                    ExtendedColorType::Rgb8,
                )?;
            }
        }
    }
    Ok(output)
}

/// Encodes `image` to `path`, lowering quality until it fits `size_budget_kb`
/// or the ladder's floor is reached. Only the final bytes hit the disk.
pub fn compress(
    image: &DynamicImage,
    path: &Path,
    format: OutputFormat,
    size_budget_kb: u64,
    ladder: &QualityLadder,
) -> Result<EncodeReport, WallfetchError> {
    let budget = usize::try_from(size_budget_kb.saturating_mul(1024)).unwrap_or(usize::MAX);
    let qualities: Vec<Option<u8>> = if format.has_quality() {
        ladder.qualities().into_iter().map(Some).collect()
    } else {
        vec![None]
    };

    let mut steps = Vec::with_capacity(qualities.len());
    let mut best: Option<(Option<u8>, Vec<u8>)> = None;
    for quality in qualities {
        let bytes = encode(image, format, quality)?;
        let size = bytes.len();
        if best
            .as_ref()
            .is_none_or(|(_, retained)| size <= retained.len())
        {
            best = Some((quality, bytes));
        }
        let retained_size = best.as_ref().map_or(size, |(_, retained)| retained.len());
        debug!(
            "Encoded {:?} at quality {:?}: {} bytes (budget {})",
            format, quality, size, budget
        );
        steps.push(EncodeStep {
            quality,
            size,
            retained_size,
        });
        if retained_size <= budget {
            break;
        }
    }

    let Some((quality, bytes)) = best else {
        return Err(WallfetchError::Encode("no encoding produced".to_string()));
    };
    let within_budget = bytes.len() <= budget;
    if !within_budget {
        warn!(
            "Output is {} KB, still over the {} KB budget at the quality floor",
            bytes.len() / 1024,
            size_budget_kb
        );
    }
    atomic_write(path, &bytes).map_err(|err| WallfetchError::Encode(err.to_string()))?;

    Ok(EncodeReport {
        steps,
        quality,
        size: bytes.len(),
        within_budget,
    })
}

/// [compress], collapsed to "did we end up with a non-empty output file".
pub fn encode_with_budget(
    image: &DynamicImage,
    path: &Path,
    format: OutputFormat,
    size_budget_kb: u64,
    ladder: &QualityLadder,
) -> bool {
    match compress(image, path, format, size_budget_kb, ladder) {
        Ok(report) => {
            info!(
                "Saved {} ({} KB, quality {:?})",
                path.display(),
                report.size / 1024,
                report.quality
            );
            std::fs::metadata(path)
                .map(|meta| meta.len() > 0)
                .unwrap_or(false)
        }
        Err(err) => {
            error!("Failed to write {}: {}", path.display(), err);
            false
        }
    }
}
