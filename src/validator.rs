//! Quality gates for downloaded images.
//!
//! Nothing in here touches the network or the filesystem: it looks at an
//! already-decoded image and decides whether it's usable as a wallpaper.

use std::fmt;

use image::{DynamicImage, GenericImageView};

use crate::constants::{MAX_ASPECT, MIN_ASPECT, MIN_HEIGHT, MIN_WIDTH, TARGET_WIDTH};

/// Resolution and aspect-ratio window an image must fit in.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationRules {
    /// Minimum width in pixels.
    pub min_width: u32,
    /// Minimum height in pixels.
    pub min_height: u32,
    /// Narrowest accepted width / height.
    pub min_aspect: f64,
    /// Widest accepted width / height.
    pub max_aspect: f64,
    /// Width oversized images are pre-downscaled to.
    pub target_width: u32,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            min_width: MIN_WIDTH,
            min_height: MIN_HEIGHT,
            min_aspect: MIN_ASPECT,
            max_aspect: MAX_ASPECT,
            target_width: TARGET_WIDTH,
        }
    }
}

/// Why an image didn't make the cut.
#[derive(Clone, Debug, PartialEq)]
pub enum RejectReason {
    /// Smaller than the minimum resolution
    TooSmall {
        /// image width
        width: u32,
        /// image height
        height: u32,
    },
    /// Width / height outside the accepted window
    AspectRatio {
        /// width / height
        ratio: f64,
    },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooSmall { width, height } => {
                write!(f, "resolution {width}x{height} is below the minimum")
            }
            Self::AspectRatio { ratio } => write!(f, "aspect ratio {ratio:.3} is out of range"),
        }
    }
}

impl std::error::Error for RejectReason {}

/// Outcome of [validate].
#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
    /// Usable, optionally after a downscale to `(width, height)`.
    Accept {
        /// Pre-downscale target, if the source is far larger than needed.
        resize: Option<(u32, u32)>,
    },
    /// Not usable.
    Reject(RejectReason),
}

impl Verdict {
    /// True for [Verdict::Accept].
    #[cfg(test)]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accept { .. })
    }
}

/// Coerces anything that isn't 8-bit RGB or RGBA into 8-bit RGB.
pub fn normalize_color(image: DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => image,
        other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

/// Checks dimensions against `rules`, short-circuiting on the first failure.
pub fn validate_dimensions(width: u32, height: u32, rules: &ValidationRules) -> Verdict {
    if width < rules.min_width || height < rules.min_height {
        return Verdict::Reject(RejectReason::TooSmall { width, height });
    }

    let ratio = f64::from(width) / f64::from(height);
    if !(rules.min_aspect..=rules.max_aspect).contains(&ratio) {
        return Verdict::Reject(RejectReason::AspectRatio { ratio });
    }

    let resize = if width > rules.target_width.saturating_mul(2) {
        let target_height = (f64::from(rules.target_width) / ratio).round() as u32;
        Some((rules.target_width, target_height.max(1)))
    } else {
        None
    };

    Verdict::Accept { resize }
}

/// Runs the quality gates on a decoded image.
pub fn validate(image: &DynamicImage, rules: &ValidationRules) -> Verdict {
    let (width, height) = image.dimensions();
    validate_dimensions(width, height, rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> ValidationRules {
        ValidationRules::default()
    }

    #[test]
    fn exact_full_hd_is_accepted() {
        assert_eq!(
            validate_dimensions(1920, 1080, &rules()),
            Verdict::Accept { resize: None }
        );
    }

    #[test]
    fn undersized_images_are_rejected_whatever_the_ratio() {
        for (w, h) in [(1919, 1080), (1920, 1079), (1280, 720), (1000, 500), (100, 100)] {
            assert_eq!(
                validate_dimensions(w, h, &rules()),
                Verdict::Reject(RejectReason::TooSmall {
                    width: w,
                    height: h
                }),
                "{w}x{h}"
            );
        }
    }

    #[test]
    fn ratio_outside_window_is_rejected() {
        for (w, h) in [(2000, 2000), (1920, 1440), (6000, 2000), (5400, 1080)] {
            let verdict = validate_dimensions(w, h, &rules());
            assert!(
                matches!(verdict, Verdict::Reject(RejectReason::AspectRatio { .. })),
                "{w}x{h} gave {verdict:?}"
            );
        }
    }

    #[test]
    fn ratio_bounds_are_inclusive() {
        assert!(validate_dimensions(2400, 1600, &rules()).is_accepted());
        assert!(validate_dimensions(2700, 1080, &rules()).is_accepted());
    }

    #[test]
    fn very_large_images_get_a_resize_target() {
        assert_eq!(
            validate_dimensions(3840, 2160, &rules()),
            Verdict::Accept { resize: None }
        );
        assert_eq!(
            validate_dimensions(3841, 2160, &rules()),
            Verdict::Accept {
                resize: Some((1920, 1080))
            }
        );
        assert_eq!(
            validate_dimensions(7680, 3200, &rules()),
            Verdict::Accept {
                resize: Some((1920, 800))
            }
        );
    }

    #[test]
    fn grayscale_is_normalized_not_rejected() {
        let gray = DynamicImage::ImageLuma8(image::GrayImage::new(1920, 1080));
        let normalized = normalize_color(gray);
        assert!(matches!(normalized, DynamicImage::ImageRgb8(_)));
        assert!(validate(&normalized, &rules()).is_accepted());

        let gray_alpha = DynamicImage::ImageLumaA8(image::GrayAlphaImage::new(4, 4));
        assert!(matches!(
            normalize_color(gray_alpha),
            DynamicImage::ImageRgba8(_)
        ));
    }
}
