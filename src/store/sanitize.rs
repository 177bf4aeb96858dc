//! Decoding untrusted JSON into settings.
//!
//! Two entry points with different trust levels:
//!
//! - [`restore`] reads our own persisted snapshot. Each field is type-checked
//!   and assigned individually; anything missing or malformed keeps the prior
//!   value, and a blob that is not JSON at all changes nothing.
//! - [`sanitize_imported`] reads a file a user handed us. Only known fields
//!   survive and every value is validated or clamped. `topBias` and
//!   `jpegQuality` always resolve (falling back to the caller's defaults).
//!   The tonal tuple is left out entirely when no slider is present, so a
//!   style-only import adopts that style's values; a partial tuple is
//!   completed from the named style, or from the caller's defaults.

use super::ImportError;
use crate::catalog::Catalog;
use crate::settings::{
    AdjustmentField, Adjustments, BackgroundMode, MAX_JPEG_QUALITY, MAX_KEY_LEN,
    MIN_JPEG_QUALITY, OutputFormat, Settings, SettingsPatch, StyleKey, normalize_hex,
};
use serde::Serialize;
use serde_json::{Map, Value};

/// Persisted form of the live settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsSnapshot {
    pub remove_bg: bool,
    pub background: BackgroundMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_hex: Option<String>,
    pub preset: String,
    pub top_bias: f64,
    pub format: OutputFormat,
    pub jpeg_quality: u8,
    pub auto_update: bool,
    pub style: StyleKey,
    pub use_case: Option<String>,
    #[serde(flatten)]
    pub adjustments: Adjustments,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_adjustments: Option<Adjustments>,
}

impl SettingsSnapshot {
    pub fn capture(settings: &Settings, manual_stash: Option<&Adjustments>) -> Self {
        Self {
            remove_bg: settings.remove_bg,
            background: settings.background,
            background_hex: settings.background_hex.clone(),
            preset: settings.preset.clone(),
            top_bias: settings.top_bias,
            format: settings.format,
            jpeg_quality: settings.jpeg_quality,
            auto_update: settings.auto_update,
            style: settings.style.clone(),
            use_case: settings.use_case.clone(),
            adjustments: settings.adjustments,
            manual_adjustments: manual_stash.copied(),
        }
    }
}

/// Settings plus the manual stash recovered from a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Restored {
    pub settings: Settings,
    pub manual_stash: Option<Adjustments>,
}

// =============================================================================
// Field readers
// =============================================================================

fn read_bool(obj: &Map<String, Value>, key: &str) -> Option<bool> {
    obj.get(key).and_then(Value::as_bool)
}

fn read_number(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    obj.get(key)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
}

fn read_str<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

/// Short, non-empty, lowercased key.
fn read_key(obj: &Map<String, Value>, key: &str) -> Option<String> {
    let value = read_str(obj, key)?.trim().to_ascii_lowercase();
    (!value.is_empty() && value.len() <= MAX_KEY_LEN).then_some(value)
}

fn read_quality(obj: &Map<String, Value>, key: &str) -> Option<u8> {
    read_number(obj, key).map(|q| {
        q.round()
            .clamp(MIN_JPEG_QUALITY as f64, MAX_JPEG_QUALITY as f64) as u8
    })
}

fn has_adjustments(obj: &Map<String, Value>) -> bool {
    AdjustmentField::ALL
        .iter()
        .any(|field| read_number(obj, field.key()).is_some())
}

fn read_adjustments(obj: &Map<String, Value>, fallback: &Adjustments) -> Adjustments {
    let mut out = *fallback;
    for field in AdjustmentField::ALL {
        if let Some(value) = read_number(obj, field.key()) {
            out.set(field, field.clamp(value));
        }
    }
    out
}

// =============================================================================
// Imports
// =============================================================================

/// Validate an untrusted settings object.
///
/// `defaults` supplies `topBias` and `jpegQuality` when the import omits them
/// or gives them the wrong type. Adjustments are `None` unless at least one
/// slider is present; missing sliders then come from the style the import
/// names (if `catalog` knows it), else from `defaults`.
pub fn sanitize_imported(
    raw: &Value,
    defaults: &Settings,
    catalog: &Catalog,
) -> Result<SettingsPatch, ImportError> {
    let obj = raw.as_object().ok_or(ImportError::NotAnObject)?;
    let style = read_key(obj, "style").map(StyleKey::from);
    let adjustments = has_adjustments(obj).then(|| {
        let base = style
            .as_ref()
            .and_then(|key| catalog.style_for(key))
            .map(|known| known.adjustments)
            .unwrap_or(defaults.adjustments);
        read_adjustments(obj, &base)
    });

    Ok(SettingsPatch {
        remove_bg: read_bool(obj, "removeBg"),
        background: read_str(obj, "background").and_then(BackgroundMode::parse),
        background_hex: read_str(obj, "backgroundHex").and_then(normalize_hex),
        preset: read_key(obj, "preset"),
        top_bias: Some(
            read_number(obj, "topBias")
                .map(|v| v.clamp(0.0, 1.0))
                .unwrap_or(defaults.top_bias),
        ),
        format: read_str(obj, "format").and_then(OutputFormat::parse),
        jpeg_quality: Some(read_quality(obj, "jpegQuality").unwrap_or(defaults.jpeg_quality)),
        auto_update: read_bool(obj, "autoUpdate"),
        style,
        adjustments,
    })
}

// =============================================================================
// Restore
// =============================================================================

/// Rebuild settings from a persisted snapshot, keeping `prior` values for
/// anything missing or invalid.
pub fn restore(text: &str, prior: &Settings, catalog: &Catalog) -> Restored {
    let unchanged = Restored {
        settings: prior.clone(),
        manual_stash: None,
    };
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return unchanged;
    };
    let Some(obj) = value.as_object() else {
        return unchanged;
    };

    let mut settings = prior.clone();
    if let Some(v) = read_bool(obj, "removeBg") {
        settings.remove_bg = v;
    }
    if let Some(mode) = read_str(obj, "background").and_then(BackgroundMode::parse) {
        settings.background = mode;
    }
    if let Some(hex) = read_str(obj, "backgroundHex").and_then(normalize_hex) {
        settings.background_hex = Some(hex);
    }
    if let Some(preset) = read_key(obj, "preset").filter(|p| catalog.preset(p).is_some()) {
        settings.preset = preset;
    }
    if let Some(v) = read_number(obj, "topBias") {
        settings.top_bias = v.clamp(0.0, 1.0);
    }
    if let Some(format) = read_str(obj, "format").and_then(OutputFormat::parse) {
        settings.format = format;
    }
    if let Some(q) = read_quality(obj, "jpegQuality") {
        settings.jpeg_quality = q;
    }
    if let Some(v) = read_bool(obj, "autoUpdate") {
        settings.auto_update = v;
    }
    if let Some(style) = read_key(obj, "style") {
        settings.style = StyleKey::from(style);
    }
    match obj.get("useCase") {
        None => {}
        Some(Value::Null) => settings.use_case = None,
        Some(_) => {
            settings.use_case = read_key(obj, "useCase").filter(|k| catalog.use_case(k).is_some());
        }
    }
    settings.adjustments = read_adjustments(obj, &prior.adjustments);

    if settings.background == BackgroundMode::Custom && settings.background_hex.is_none() {
        settings.background = prior.background;
    }
    settings.enforce_compatible_options();

    let manual_stash = obj
        .get("manualAdjustments")
        .and_then(Value::as_object)
        .map(|stash| read_adjustments(stash, &settings.adjustments));

    Restored {
        settings,
        manual_stash,
    }
}
