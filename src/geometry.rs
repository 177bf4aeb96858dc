//! Pure crop and output-size math for the live estimate.
//!
//! All functions here are pure and testable without any I/O or images. The
//! remote service performs the real crop; these predict its geometry so the
//! client can show framing and final pixel size before a round trip completes.

use crate::catalog::Preset;
use crate::settings::{DEFAULT_TOP_BIAS, OutputFormat};
use serde::Serialize;

/// Aspect ratios closer than this are treated as already matching.
pub const RATIO_TOLERANCE: f64 = 0.001;

/// A crop rectangle in source pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl CropRect {
    /// The rectangle covering the whole image.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            w: width,
            h: height,
        }
    }

    pub fn is_full(&self, width: u32, height: u32) -> bool {
        *self == Self::full(width, height)
    }
}

/// Calculate the crop that gives `target_ratio` (width / height).
///
/// Images wider than the target are cropped horizontally and centered.
/// Taller images are cropped vertically, with `top_bias` choosing how much of
/// the spare height is removed from the top: 0 keeps the top edge, 1 keeps the
/// bottom edge.
///
/// # Examples
/// ```
/// # use headshot_studio::geometry::{compute_crop, CropRect};
/// // Square source to a 4:5 portrait: trim the sides evenly.
/// assert_eq!(
///     compute_crop(1000, 1000, 0.8, 0.2),
///     CropRect { x: 100, y: 0, w: 800, h: 1000 }
/// );
/// ```
pub fn compute_crop(width: u32, height: u32, target_ratio: f64, top_bias: f64) -> CropRect {
    let identity = CropRect::full(width, height);
    if width == 0 || height == 0 || !target_ratio.is_finite() || target_ratio <= 0.0 {
        return identity;
    }

    let current = width as f64 / height as f64;
    if (current - target_ratio).abs() < RATIO_TOLERANCE {
        return identity;
    }

    if current > target_ratio {
        // Too wide: keep full height, center horizontally
        let crop_w = ((height as f64 * target_ratio).floor() as u32).clamp(1, width);
        CropRect {
            x: (width - crop_w) / 2,
            y: 0,
            w: crop_w,
            h: height,
        }
    } else {
        // Too tall: keep full width, shift down by the bias
        let crop_h = ((width as f64 / target_ratio).floor() as u32).clamp(1, height);
        let spare = height - crop_h;
        let bias = if top_bias.is_finite() {
            top_bias.clamp(0.0, 1.0)
        } else {
            DEFAULT_TOP_BIAS
        };
        let y = ((spare as f64 * bias).floor() as u32).min(spare);
        CropRect {
            x: 0,
            y,
            w: width,
            h: crop_h,
        }
    }
}

/// Final output dimensions for a crop, given optional fixed output sides.
///
/// Both overrides win outright. With one override the other side follows the
/// crop's aspect ratio. With none the crop size is the output size. Zero
/// overrides are ignored. Every side is at least 1px.
pub fn estimate_output_size(
    crop: &CropRect,
    override_w: Option<u32>,
    override_h: Option<u32>,
) -> (u32, u32) {
    let override_w = override_w.filter(|&w| w > 0);
    let override_h = override_h.filter(|&h| h > 0);
    let aspect = crop.w.max(1) as f64 / crop.h.max(1) as f64;

    let (w, h) = match (override_w, override_h) {
        (Some(w), Some(h)) => (w as f64, h as f64),
        (Some(w), None) => (w as f64, w as f64 / aspect),
        (None, Some(h)) => (h as f64 * aspect, h as f64),
        (None, None) => (crop.w as f64, crop.h as f64),
    };
    (round_px(w), round_px(h))
}

fn round_px(value: f64) -> u32 {
    if !value.is_finite() {
        return 1;
    }
    (value.round().min(u32::MAX as f64) as u32).max(1)
}

/// Predicted result of processing a source with the current settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewEstimate {
    pub source: (u32, u32),
    pub crop: CropRect,
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
}

impl PreviewEstimate {
    pub fn compute(source: (u32, u32), preset: &Preset, top_bias: f64, format: OutputFormat) -> Self {
        let (src_w, src_h) = source;
        let crop = compute_crop(src_w, src_h, preset.ratio, top_bias);
        let (width, height) = estimate_output_size(&crop, preset.width, preset.height);
        Self {
            source,
            crop,
            width,
            height,
            format,
        }
    }

    /// True when the crop removes nothing from the source.
    pub fn is_uncropped(&self) -> bool {
        self.crop.is_full(self.source.0, self.source.1)
    }
}
