//! The live editable configuration and the edits that mutate it.
//!
//! [`Settings`] is the single authoritative Configuration value owned by a
//! [`Session`](crate::session::Session). Every other component receives it by
//! reference for the duration of one event; none of them keeps a private copy
//! except as an explicit snapshot captured for a deferred request.
//!
//! ## Compatibility rule
//!
//! A transparent background only makes sense when the background is actually
//! removed and the output format carries an alpha channel. Every mutation path
//! runs [`Settings::enforce_compatible_options`], so `transparent` always
//! implies `remove_bg == true` and `format == png`.
//!
//! ## Named edits
//!
//! Input controls are addressed by a fixed set of field names (`removeBg`,
//! `background`, `brightness`, ...). [`Edit::parse`] turns a `(field, value)`
//! pair into a typed [`Edit`]; that lookup is the only dynamic dispatch.

use crate::catalog::Catalog;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const DEFAULT_PRESET: &str = "portrait-4x5";
pub const DEFAULT_STYLE: &str = "classic";
pub const DEFAULT_TOP_BIAS: f64 = 0.2;
pub const DEFAULT_JPEG_QUALITY: u8 = 92;
pub const MIN_JPEG_QUALITY: u8 = 60;
pub const MAX_JPEG_QUALITY: u8 = 100;

/// Longest preset or style key accepted from edits and imports.
pub const MAX_KEY_LEN: usize = 64;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditError {
    #[error("Unknown setting: {0}")]
    UnknownField(String),
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

// =============================================================================
// Enumerations
// =============================================================================

/// Background fill applied behind the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundMode {
    White,
    Light,
    Blue,
    Gray,
    Custom,
    Transparent,
}

impl BackgroundMode {
    pub const ALL: [BackgroundMode; 6] = [
        BackgroundMode::White,
        BackgroundMode::Light,
        BackgroundMode::Blue,
        BackgroundMode::Gray,
        BackgroundMode::Custom,
        BackgroundMode::Transparent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BackgroundMode::White => "white",
            BackgroundMode::Light => "light",
            BackgroundMode::Blue => "blue",
            BackgroundMode::Gray => "gray",
            BackgroundMode::Custom => "custom",
            BackgroundMode::Transparent => "transparent",
        }
    }

    /// Case-insensitive parse; `grey` is accepted as an alias.
    pub fn parse(value: &str) -> Option<Self> {
        let key = value.trim().to_ascii_lowercase();
        if key == "grey" {
            return Some(BackgroundMode::Gray);
        }
        Self::ALL.into_iter().find(|mode| mode.as_str() == key)
    }
}

impl fmt::Display for BackgroundMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Export format. JPEG is the lossy one and has no alpha channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Jpeg,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "png" => Some(OutputFormat::Png),
            "jpeg" | "jpg" => Some(OutputFormat::Jpeg),
            _ => None,
        }
    }

    pub fn is_lossy(self) -> bool {
        self == OutputFormat::Jpeg
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The active style selection: either a named catalog style or `manual`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StyleKey {
    Manual,
    Named(String),
}

impl StyleKey {
    pub const MANUAL: &'static str = "manual";

    pub fn named(key: impl Into<String>) -> Self {
        StyleKey::from(key.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            StyleKey::Manual => Self::MANUAL,
            StyleKey::Named(key) => key,
        }
    }

    pub fn is_manual(&self) -> bool {
        matches!(self, StyleKey::Manual)
    }
}

impl From<String> for StyleKey {
    fn from(value: String) -> Self {
        let key = value.trim().to_ascii_lowercase();
        if key.is_empty() || key == Self::MANUAL {
            StyleKey::Manual
        } else {
            StyleKey::Named(key)
        }
    }
}

impl From<StyleKey> for String {
    fn from(value: StyleKey) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for StyleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Adjustments
// =============================================================================

/// One of the five tonal adjustment sliders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdjustmentField {
    Brightness,
    Contrast,
    Color,
    Sharpness,
    Soften,
}

impl AdjustmentField {
    pub const ALL: [AdjustmentField; 5] = [
        AdjustmentField::Brightness,
        AdjustmentField::Contrast,
        AdjustmentField::Color,
        AdjustmentField::Sharpness,
        AdjustmentField::Soften,
    ];

    pub fn key(self) -> &'static str {
        match self {
            AdjustmentField::Brightness => "brightness",
            AdjustmentField::Contrast => "contrast",
            AdjustmentField::Color => "color",
            AdjustmentField::Sharpness => "sharpness",
            AdjustmentField::Soften => "soften",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.key() == key)
    }

    /// Accepted range, matching what the service clamps to.
    pub fn range(self) -> (f64, f64) {
        match self {
            AdjustmentField::Brightness | AdjustmentField::Contrast | AdjustmentField::Color => {
                (0.5, 1.5)
            }
            AdjustmentField::Sharpness => (0.5, 1.8),
            AdjustmentField::Soften => (0.0, 1.0),
        }
    }

    pub fn neutral(self) -> f64 {
        match self {
            AdjustmentField::Soften => 0.0,
            _ => 1.0,
        }
    }

    pub fn clamp(self, value: f64) -> f64 {
        let (min, max) = self.range();
        value.clamp(min, max)
    }
}

/// The adjustment 5-tuple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Adjustments {
    pub brightness: f64,
    pub contrast: f64,
    pub color: f64,
    pub sharpness: f64,
    pub soften: f64,
}

impl Adjustments {
    /// No-op values: every enhancement factor at 1, no softening.
    pub const NEUTRAL: Adjustments = Adjustments {
        brightness: 1.0,
        contrast: 1.0,
        color: 1.0,
        sharpness: 1.0,
        soften: 0.0,
    };

    pub fn get(&self, field: AdjustmentField) -> f64 {
        match field {
            AdjustmentField::Brightness => self.brightness,
            AdjustmentField::Contrast => self.contrast,
            AdjustmentField::Color => self.color,
            AdjustmentField::Sharpness => self.sharpness,
            AdjustmentField::Soften => self.soften,
        }
    }

    pub fn set(&mut self, field: AdjustmentField, value: f64) {
        let slot = match field {
            AdjustmentField::Brightness => &mut self.brightness,
            AdjustmentField::Contrast => &mut self.contrast,
            AdjustmentField::Color => &mut self.color,
            AdjustmentField::Sharpness => &mut self.sharpness,
            AdjustmentField::Soften => &mut self.soften,
        };
        *slot = value;
    }

    /// True when every field is within `tolerance` of `other`.
    pub fn matches(&self, other: &Adjustments, tolerance: f64) -> bool {
        AdjustmentField::ALL
            .into_iter()
            .all(|field| (self.get(field) - other.get(field)).abs() <= tolerance)
    }

    /// Copy with every field clamped into its range. Non-finite fields fall
    /// back to the matching field of `fallback`.
    pub fn sanitized(&self, fallback: &Adjustments) -> Adjustments {
        let mut out = *fallback;
        for field in AdjustmentField::ALL {
            let value = self.get(field);
            if value.is_finite() {
                out.set(field, field.clamp(value));
            }
        }
        out
    }
}

impl Default for Adjustments {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

// =============================================================================
// Settings
// =============================================================================

/// The full set of current editable options.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub remove_bg: bool,
    pub background: BackgroundMode,
    /// Normalized `#rrggbb`; only sent when `background == Custom`.
    pub background_hex: Option<String>,
    pub preset: String,
    /// Vertical anchor of a height-limited crop: 0 = top, 1 = bottom.
    pub top_bias: f64,
    pub format: OutputFormat,
    /// JPEG quality in [60, 100]; ignored for PNG.
    pub jpeg_quality: u8,
    pub auto_update: bool,
    pub style: StyleKey,
    pub use_case: Option<String>,
    pub adjustments: Adjustments,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            remove_bg: false,
            background: BackgroundMode::White,
            background_hex: None,
            preset: DEFAULT_PRESET.to_string(),
            top_bias: DEFAULT_TOP_BIAS,
            format: OutputFormat::Png,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            auto_update: true,
            style: StyleKey::named(DEFAULT_STYLE),
            use_case: None,
            // Matches the built-in "classic" style so the default is not drifted.
            adjustments: Adjustments {
                brightness: 1.05,
                contrast: 1.05,
                color: 1.0,
                sharpness: 1.1,
                soften: 0.0,
            },
        }
    }
}

impl Settings {
    /// Apply the transparent-background rule. Returns true if anything changed.
    pub fn enforce_compatible_options(&mut self) -> bool {
        if self.background != BackgroundMode::Transparent {
            return false;
        }
        let mut changed = false;
        if !self.remove_bg {
            self.remove_bg = true;
            changed = true;
        }
        if self.format.is_lossy() {
            self.format = OutputFormat::Png;
            changed = true;
        }
        changed
    }

    pub fn set_background(&mut self, mode: BackgroundMode) {
        self.background = mode;
        self.enforce_compatible_options();
    }

    pub fn set_format(&mut self, format: OutputFormat) {
        self.format = format;
        self.enforce_compatible_options();
    }

    pub fn set_remove_bg(&mut self, remove_bg: bool) {
        self.remove_bg = remove_bg;
        self.enforce_compatible_options();
    }

    /// Apply a simple field edit. Style, use-case and adjustment edits need the
    /// style reconciler and are handled by the session; they are ignored here.
    pub fn apply_field_edit(&mut self, edit: &Edit) {
        match edit {
            Edit::RemoveBg(value) => self.set_remove_bg(*value),
            Edit::Background(mode) => self.set_background(*mode),
            Edit::BackgroundHex(hex) => {
                self.background_hex = Some(hex.clone());
                self.set_background(BackgroundMode::Custom);
            }
            Edit::Preset(key) => self.preset = key.clone(),
            Edit::TopBias(value) => self.top_bias = value.clamp(0.0, 1.0),
            Edit::Format(format) => self.set_format(*format),
            Edit::JpegQuality(value) => {
                self.jpeg_quality = (*value).clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
            }
            Edit::AutoUpdate(value) => self.auto_update = *value,
            Edit::Adjustment(..) | Edit::Style(_) | Edit::UseCase(_) => {}
        }
    }

    /// Overlay the non-style fields present in `patch`.
    ///
    /// Preset keys unknown to `catalog` are skipped so an imported profile can
    /// never select a crop the service would reject.
    pub fn apply_patch(&mut self, patch: &SettingsPatch, catalog: &Catalog) {
        if let Some(value) = patch.remove_bg {
            self.remove_bg = value;
        }
        if let Some(mode) = patch.background {
            self.background = mode;
        }
        if let Some(hex) = &patch.background_hex {
            self.background_hex = Some(hex.clone());
        }
        if let Some(preset) = &patch.preset
            && catalog.preset(preset).is_some()
        {
            self.preset = preset.clone();
        }
        if let Some(value) = patch.top_bias {
            self.top_bias = value.clamp(0.0, 1.0);
        }
        if let Some(format) = patch.format {
            self.format = format;
        }
        if let Some(quality) = patch.jpeg_quality {
            self.jpeg_quality = quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY);
        }
        if let Some(value) = patch.auto_update {
            self.auto_update = value;
        }
        if let Some(adjustments) = &patch.adjustments {
            self.adjustments = adjustments.sanitized(&self.adjustments);
        }
        if self.background == BackgroundMode::Custom && self.background_hex.is_none() {
            self.background = BackgroundMode::White;
        }
        self.enforce_compatible_options();
    }

    /// Request fields as the service expects them: booleans as `"true"` /
    /// `"false"`, numbers as decimal text. `style` is omitted while manual so
    /// the service uses the explicit adjustment values.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("remove_bg", self.remove_bg.to_string()),
            ("background", self.background.as_str().to_string()),
        ];
        if self.background == BackgroundMode::Custom
            && let Some(hex) = &self.background_hex
        {
            fields.push(("background_hex", hex.clone()));
        }
        fields.push(("preset", self.preset.clone()));
        if let StyleKey::Named(key) = &self.style {
            fields.push(("style", key.clone()));
        }
        fields.push(("top_bias", self.top_bias.to_string()));
        for field in AdjustmentField::ALL {
            fields.push((field.key(), self.adjustments.get(field).to_string()));
        }
        fields.push(("jpeg_quality", self.jpeg_quality.to_string()));
        fields.push(("format", self.format.as_str().to_string()));
        fields
    }
}

/// A subset of [`Settings`]: every field optional.
///
/// Used for profile contents, use-case overrides and sanitized imports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_bg: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<BackgroundMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_hex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_bias: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<OutputFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jpeg_quality: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_update: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleKey>,
    #[serde(default, flatten, skip_serializing_if = "Option::is_none")]
    pub adjustments: Option<Adjustments>,
}

impl SettingsPatch {
    /// Full patch capturing every field of `settings` (used when saving).
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            remove_bg: Some(settings.remove_bg),
            background: Some(settings.background),
            background_hex: settings.background_hex.clone(),
            preset: Some(settings.preset.clone()),
            top_bias: Some(settings.top_bias),
            format: Some(settings.format),
            jpeg_quality: Some(settings.jpeg_quality),
            auto_update: None,
            style: Some(settings.style.clone()),
            adjustments: Some(settings.adjustments),
        }
    }
}

/// Normalize a user supplied hex color to `#rrggbb`.
///
/// Accepts `#abc`, `abc`, `#aabbcc` and `aabbcc` in any case.
pub fn normalize_hex(value: &str) -> Option<String> {
    let raw = value.trim();
    let raw = raw.strip_prefix('#').unwrap_or(raw);
    let expanded: String = match raw.len() {
        3 => raw.chars().flat_map(|c| [c, c]).collect(),
        6 => raw.to_string(),
        _ => return None,
    };
    if !expanded.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("#{}", expanded.to_ascii_lowercase()))
}

// =============================================================================
// Edits
// =============================================================================

/// A single user edit to one named control.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    RemoveBg(bool),
    Background(BackgroundMode),
    BackgroundHex(String),
    Preset(String),
    TopBias(f64),
    Format(OutputFormat),
    JpegQuality(u8),
    AutoUpdate(bool),
    Adjustment(AdjustmentField, f64),
    Style(StyleKey),
    UseCase(String),
}

impl Edit {
    /// Field names accepted by [`Edit::parse`].
    pub const FIELDS: [&'static str; 15] = [
        "removeBg",
        "background",
        "backgroundHex",
        "preset",
        "topBias",
        "format",
        "jpegQuality",
        "autoUpdate",
        "brightness",
        "contrast",
        "color",
        "sharpness",
        "soften",
        "style",
        "useCase",
    ];

    /// Look up a control by name and parse its textual value.
    pub fn parse(field: &str, value: &str) -> Result<Edit, EditError> {
        let value = value.trim();
        let invalid = |field: &'static str| EditError::InvalidValue {
            field,
            value: value.to_string(),
        };
        match field {
            "removeBg" => parse_bool(value).map(Edit::RemoveBg).ok_or_else(|| invalid("removeBg")),
            "background" => BackgroundMode::parse(value)
                .map(Edit::Background)
                .ok_or_else(|| invalid("background")),
            "backgroundHex" => normalize_hex(value)
                .map(Edit::BackgroundHex)
                .ok_or_else(|| invalid("backgroundHex")),
            "preset" => parse_key(value)
                .map(Edit::Preset)
                .ok_or_else(|| invalid("preset")),
            "topBias" => parse_finite(value)
                .map(Edit::TopBias)
                .ok_or_else(|| invalid("topBias")),
            "format" => OutputFormat::parse(value)
                .map(Edit::Format)
                .ok_or_else(|| invalid("format")),
            "jpegQuality" => parse_finite(value)
                .map(|q| Edit::JpegQuality(q.round().clamp(0.0, 255.0) as u8))
                .ok_or_else(|| invalid("jpegQuality")),
            "autoUpdate" => parse_bool(value)
                .map(Edit::AutoUpdate)
                .ok_or_else(|| invalid("autoUpdate")),
            "style" => parse_key(value)
                .map(|key| Edit::Style(StyleKey::from(key)))
                .ok_or_else(|| invalid("style")),
            "useCase" => parse_key(value)
                .map(Edit::UseCase)
                .ok_or_else(|| invalid("useCase")),
            other => match AdjustmentField::from_key(other) {
                Some(adjustment) => parse_finite(value)
                    .map(|v| Edit::Adjustment(adjustment, v))
                    .ok_or_else(|| invalid(adjustment.key())),
                None => Err(EditError::UnknownField(other.to_string())),
            },
        }
    }

    /// Parse a `field=value` pair as given on the command line.
    pub fn parse_assignment(assignment: &str) -> Result<Edit, EditError> {
        match assignment.split_once('=') {
            Some((field, value)) => Edit::parse(field.trim(), value),
            None => Err(EditError::UnknownField(assignment.to_string())),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_finite(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_key(value: &str) -> Option<String> {
    let key = value.trim().to_ascii_lowercase();
    (!key.is_empty() && key.len() <= MAX_KEY_LEN).then_some(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Compatibility rule
    // =========================================================================

    #[test]
    fn transparent_forces_remove_bg() {
        let mut settings = Settings::default();
        settings.remove_bg = false;
        settings.set_background(BackgroundMode::Transparent);
        assert!(settings.remove_bg);
    }

    #[test]
    fn transparent_switches_jpeg_to_png() {
        let mut settings = Settings::default();
        settings.set_format(OutputFormat::Jpeg);
        settings.set_background(BackgroundMode::Transparent);
        assert_eq!(settings.format, OutputFormat::Png);
    }

    #[test]
    fn choosing_jpeg_while_transparent_is_reverted() {
        let mut settings = Settings::default();
        settings.set_background(BackgroundMode::Transparent);
        settings.set_format(OutputFormat::Jpeg);
        assert_eq!(settings.format, OutputFormat::Png);
    }

    #[test]
    fn disabling_remove_bg_while_transparent_is_reverted() {
        let mut settings = Settings::default();
        settings.set_background(BackgroundMode::Transparent);
        settings.set_remove_bg(false);
        assert!(settings.remove_bg);
    }

    #[test]
    fn opaque_background_leaves_format_alone() {
        let mut settings = Settings::default();
        settings.set_format(OutputFormat::Jpeg);
        settings.set_background(BackgroundMode::Blue);
        assert_eq!(settings.format, OutputFormat::Jpeg);
        assert!(!settings.remove_bg);
    }

    // =========================================================================
    // Form fields
    // =========================================================================

    fn field<'a>(fields: &'a [(&'static str, String)], name: &str) -> Option<&'a str> {
        fields
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn form_fields_encode_booleans_and_numbers_as_text() {
        let settings = Settings::default();
        let fields = settings.form_fields();
        assert_eq!(field(&fields, "remove_bg"), Some("false"));
        assert_eq!(field(&fields, "top_bias"), Some("0.2"));
        assert_eq!(field(&fields, "jpeg_quality"), Some("92"));
        assert_eq!(field(&fields, "brightness"), Some("1.05"));
        assert_eq!(field(&fields, "soften"), Some("0"));
        assert_eq!(field(&fields, "format"), Some("png"));
        assert_eq!(field(&fields, "style"), Some("classic"));
    }

    #[test]
    fn form_fields_omit_style_when_manual() {
        let mut settings = Settings::default();
        settings.style = StyleKey::Manual;
        assert_eq!(field(&settings.form_fields(), "style"), None);
    }

    #[test]
    fn form_fields_include_hex_only_for_custom() {
        let mut settings = Settings::default();
        settings.background_hex = Some("#112233".into());
        assert_eq!(field(&settings.form_fields(), "background_hex"), None);
        settings.background = BackgroundMode::Custom;
        assert_eq!(
            field(&settings.form_fields(), "background_hex"),
            Some("#112233")
        );
    }

    // =========================================================================
    // Parsing
    // =========================================================================

    #[test]
    fn normalize_hex_variants() {
        assert_eq!(normalize_hex("#ABC"), Some("#aabbcc".into()));
        assert_eq!(normalize_hex("a1b2c3"), Some("#a1b2c3".into()));
        assert_eq!(normalize_hex("#12"), None);
        assert_eq!(normalize_hex("#zzzzzz"), None);
    }

    #[test]
    fn style_key_manual_aliases() {
        assert_eq!(StyleKey::from("Manual".to_string()), StyleKey::Manual);
        assert_eq!(StyleKey::from(String::new()), StyleKey::Manual);
        assert_eq!(
            StyleKey::from(" Studio ".to_string()),
            StyleKey::Named("studio".into())
        );
    }

    #[test]
    fn edit_parse_by_field_name() {
        assert_eq!(Edit::parse("removeBg", "yes"), Ok(Edit::RemoveBg(true)));
        assert_eq!(
            Edit::parse("background", "Grey"),
            Ok(Edit::Background(BackgroundMode::Gray))
        );
        assert_eq!(
            Edit::parse("format", "jpg"),
            Ok(Edit::Format(OutputFormat::Jpeg))
        );
        assert_eq!(
            Edit::parse("sharpness", "1.3"),
            Ok(Edit::Adjustment(AdjustmentField::Sharpness, 1.3))
        );
        assert_eq!(Edit::parse("style", "manual"), Ok(Edit::Style(StyleKey::Manual)));
    }

    #[test]
    fn edit_parse_rejects_unknown_field() {
        assert!(matches!(
            Edit::parse("saturation", "1"),
            Err(EditError::UnknownField(_))
        ));
    }

    #[test]
    fn edit_parse_rejects_non_finite_numbers() {
        assert!(Edit::parse("topBias", "NaN").is_err());
        assert!(Edit::parse("brightness", "inf").is_err());
    }

    #[test]
    fn parse_assignment_splits_on_first_equals() {
        assert_eq!(
            Edit::parse_assignment("backgroundHex=#fff"),
            Ok(Edit::BackgroundHex("#ffffff".into()))
        );
        assert!(Edit::parse_assignment("format").is_err());
    }

    #[test]
    fn every_listed_field_is_recognized() {
        for name in Edit::FIELDS {
            let result = Edit::parse(name, "zz-not-a-value");
            assert!(
                !matches!(result, Err(EditError::UnknownField(_))),
                "{name} should be a known field"
            );
        }
    }

    #[test]
    fn sanitized_adjustments_clamp_and_replace_non_finite() {
        let wild = Adjustments {
            brightness: 9.0,
            contrast: f64::NAN,
            color: 0.1,
            sharpness: 1.2,
            soften: -1.0,
        };
        let clean = wild.sanitized(&Adjustments::NEUTRAL);
        assert_eq!(clean.brightness, 1.5);
        assert_eq!(clean.contrast, 1.0);
        assert_eq!(clean.color, 0.5);
        assert_eq!(clean.sharpness, 1.2);
        assert_eq!(clean.soften, 0.0);
    }

    #[test]
    fn patch_skips_unknown_preset() {
        let catalog = Catalog::builtin();
        let mut settings = Settings::default();
        let patch = SettingsPatch {
            preset: Some("billboard".into()),
            top_bias: Some(0.7),
            ..Default::default()
        };
        settings.apply_patch(&patch, &catalog);
        assert_eq!(settings.preset, DEFAULT_PRESET);
        assert_eq!(settings.top_bias, 0.7);
    }

    #[test]
    fn patch_custom_without_hex_falls_back_to_white() {
        let catalog = Catalog::builtin();
        let mut settings = Settings::default();
        let patch = SettingsPatch {
            background: Some(BackgroundMode::Custom),
            ..Default::default()
        };
        settings.apply_patch(&patch, &catalog);
        assert_eq!(settings.background, BackgroundMode::White);
    }
}
