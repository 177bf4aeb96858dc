//! Crop presets, tonal styles and use-cases.
//!
//! The built-in catalog mirrors what the processing service ships so the
//! client can estimate geometry and reconcile styles before (or without) a
//! network round trip. When the service answers `GET /api/presets`, its lists
//! replace the built-in presets and styles; use-cases are always local.

use crate::settings::{
    Adjustments, BackgroundMode, OutputFormat, SettingsPatch, StyleKey,
};
use serde::{Deserialize, Serialize};

/// A crop preset: target aspect ratio plus optional fixed output size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub key: String,
    pub name: String,
    pub ratio: f64,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// A named adjustment 5-tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Style {
    pub key: String,
    pub name: String,
    #[serde(flatten)]
    pub adjustments: Adjustments,
}

/// A named bundle of setting overrides plus a style, e.g. "LinkedIn".
#[derive(Debug, Clone, PartialEq)]
pub struct UseCase {
    pub key: String,
    pub name: String,
    pub style: StyleKey,
    pub overrides: SettingsPatch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    presets: Vec<Preset>,
    styles: Vec<Style>,
    use_cases: Vec<UseCase>,
}

/// Body of `GET /api/presets`.
#[derive(Debug, Deserialize)]
pub struct CatalogResponse {
    #[serde(default)]
    pub presets: Vec<Preset>,
    #[serde(default)]
    pub styles: Vec<Style>,
}

fn preset(key: &str, name: &str, ratio: f64, size: Option<u32>) -> Preset {
    Preset {
        key: key.to_string(),
        name: name.to_string(),
        ratio,
        width: size,
        height: size,
    }
}

fn style(key: &str, values: [f64; 5]) -> Style {
    let [brightness, contrast, color, sharpness, soften] = values;
    Style {
        key: key.to_string(),
        name: title_case(key),
        adjustments: Adjustments {
            brightness,
            contrast,
            color,
            sharpness,
            soften,
        },
    }
}

/// Display name derived from a key: `"soft-light"` → `"Soft Light"`.
pub fn title_case(key: &str) -> String {
    key.split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn builtin_presets() -> Vec<Preset> {
    vec![
        preset("square", "Square", 1.0, None),
        preset("portrait-4x5", "Portrait 4x5", 4.0 / 5.0, None),
        preset("portrait-3x4", "Portrait 3x4", 3.0 / 4.0, None),
        preset("portrait-2x3", "Portrait 2x3", 2.0 / 3.0, None),
        preset("portrait-5x7", "Portrait 5x7", 5.0 / 7.0, None),
        preset("landscape-4x3", "Landscape 4x3", 4.0 / 3.0, None),
        preset("landscape-16x9", "Landscape 16x9", 16.0 / 9.0, None),
        preset("vertical-9x16", "Vertical 9x16", 9.0 / 16.0, None),
        preset("passport-2x2", "Passport 2x2", 1.0, Some(600)),
    ]
}

fn builtin_styles() -> Vec<Style> {
    vec![
        style("classic", [1.05, 1.05, 1.0, 1.1, 0.0]),
        style("studio", [1.08, 1.1, 1.02, 1.2, 0.05]),
        style("warm", [1.08, 1.0, 1.08, 1.05, 0.08]),
        style("crisp", [1.02, 1.12, 0.98, 1.3, 0.0]),
    ]
}

fn builtin_use_cases() -> Vec<UseCase> {
    vec![
        UseCase {
            key: "linkedin".into(),
            name: "LinkedIn".into(),
            style: StyleKey::named("studio"),
            overrides: SettingsPatch {
                remove_bg: Some(true),
                background: Some(BackgroundMode::Light),
                preset: Some("square".into()),
                top_bias: Some(0.2),
                format: Some(OutputFormat::Jpeg),
                jpeg_quality: Some(92),
                ..Default::default()
            },
        },
        UseCase {
            key: "passport".into(),
            name: "Passport".into(),
            style: StyleKey::named("crisp"),
            overrides: SettingsPatch {
                remove_bg: Some(true),
                background: Some(BackgroundMode::White),
                preset: Some("passport-2x2".into()),
                top_bias: Some(0.35),
                format: Some(OutputFormat::Jpeg),
                jpeg_quality: Some(95),
                ..Default::default()
            },
        },
        UseCase {
            key: "resume".into(),
            name: "Resume".into(),
            style: StyleKey::named("classic"),
            overrides: SettingsPatch {
                remove_bg: Some(true),
                background: Some(BackgroundMode::Light),
                preset: Some("portrait-4x5".into()),
                top_bias: Some(0.2),
                format: Some(OutputFormat::Png),
                ..Default::default()
            },
        },
        UseCase {
            key: "team-page".into(),
            name: "Team page".into(),
            style: StyleKey::named("studio"),
            overrides: SettingsPatch {
                remove_bg: Some(true),
                background: Some(BackgroundMode::Gray),
                preset: Some("portrait-3x4".into()),
                top_bias: Some(0.25),
                format: Some(OutputFormat::Png),
                ..Default::default()
            },
        },
        UseCase {
            key: "social".into(),
            name: "Social profile".into(),
            style: StyleKey::named("warm"),
            overrides: SettingsPatch {
                remove_bg: Some(false),
                preset: Some("square".into()),
                top_bias: Some(0.15),
                format: Some(OutputFormat::Jpeg),
                jpeg_quality: Some(90),
                ..Default::default()
            },
        },
    ]
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Catalog {
    pub fn builtin() -> Self {
        Self {
            presets: builtin_presets(),
            styles: builtin_styles(),
            use_cases: builtin_use_cases(),
        }
    }

    /// Replace presets and styles with the service's lists. An empty list in
    /// the response keeps the corresponding built-in list.
    pub fn with_service(mut self, response: CatalogResponse) -> Self {
        let presets: Vec<Preset> = response
            .presets
            .into_iter()
            .filter(|p| p.ratio.is_finite() && p.ratio > 0.0)
            .collect();
        if !presets.is_empty() {
            self.presets = presets;
        }
        if !response.styles.is_empty() {
            self.styles = response.styles;
        }
        self
    }

    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    pub fn styles(&self) -> &[Style] {
        &self.styles
    }

    pub fn use_cases(&self) -> &[UseCase] {
        &self.use_cases
    }

    pub fn preset(&self, key: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.key == key)
    }

    pub fn style(&self, key: &str) -> Option<&Style> {
        self.styles.iter().find(|s| s.key == key)
    }

    /// Resolve a style key. `manual` never resolves.
    pub fn style_for(&self, key: &StyleKey) -> Option<&Style> {
        match key {
            StyleKey::Manual => None,
            StyleKey::Named(name) => self.style(name),
        }
    }

    pub fn use_case(&self, key: &str) -> Option<&UseCase> {
        self.use_cases.iter().find(|u| u.key == key)
    }

    /// Display name for a preset key, falling back to the key itself.
    pub fn preset_name<'a>(&'a self, key: &'a str) -> &'a str {
        self.preset(key).map(|p| p.name.as_str()).unwrap_or(key)
    }
}
