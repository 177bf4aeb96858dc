//! CLI output formatting for every command.
//!
//! # Display Contract
//!
//! Every entity (preset, profile, batch file) gets a header line with a
//! positional index and its human name, followed by indented context lines.
//! Keys and file paths are context, never the headline:
//!
//! ```text
//! 001 LinkedIn
//!     Square · JPEG q92 · style studio
//!     Id: 6f1c…
//! ```
//!
//! ## crop
//!
//! ```text
//! Portrait 4x5 (portrait-4x5)
//!     Source: 1000 × 1000
//!     Crop: 800 × 1000 at (100, 0)
//!     Output: 800 × 1000 png
//! ```
//!
//! ## check
//!
//! ```text
//! Accepted 2 images (3 MB)
//!     001 a.jpg (1 MB)
//!     002 b.png (2 MB)
//! Skipped 1 non-image file.
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::batch::{BatchFile, BatchLimits, BatchSelection, format_mb};
use crate::catalog::{Catalog, Preset};
use crate::geometry::PreviewEstimate;
use crate::remote::{BatchArchive, OutputMeta, ServiceHealth};
use crate::settings::{AdjustmentField, OutputFormat, Settings, SettingsPatch};
use crate::store::{MergeSummary, Profile};
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

fn format_quality(format: OutputFormat, quality: Option<u8>) -> String {
    match (format, quality) {
        (OutputFormat::Jpeg, Some(q)) => format!("JPEG q{q}"),
        (format, _) => format.as_str().to_uppercase(),
    }
}

/// One-line description of a stored patch.
fn patch_line(patch: &SettingsPatch, catalog: &Catalog) -> String {
    let mut parts = Vec::new();
    if let Some(preset) = &patch.preset {
        parts.push(catalog.preset_name(preset).to_string());
    }
    if let Some(format) = patch.format {
        parts.push(format_quality(format, patch.jpeg_quality));
    }
    if let Some(background) = patch.background {
        parts.push(format!("{} background", background.as_str()));
    }
    if let Some(style) = &patch.style {
        parts.push(format!("style {style}"));
    }
    if parts.is_empty() {
        "(no settings)".to_string()
    } else {
        parts.join(" · ")
    }
}

// ============================================================================
// crop
// ============================================================================

/// Format a preview estimate.
///
/// ```text
/// Passport 2x2 (passport-2x2)
///     Source: 800 × 1000
///     Crop: 800 × 800 at (0, 70)
///     Output: 600 × 600 jpeg
/// ```
pub fn format_estimate(preset: &Preset, estimate: &PreviewEstimate) -> Vec<String> {
    let (sw, sh) = estimate.source;
    let crop = &estimate.crop;
    let mut lines = vec![
        format!("{} ({})", preset.name, preset.key),
        format!("{}Source: {} × {}", indent(1), sw, sh),
    ];
    if estimate.is_uncropped() {
        lines.push(format!("{}Crop: none", indent(1)));
    } else {
        lines.push(format!(
            "{}Crop: {} × {} at ({}, {})",
            indent(1),
            crop.w,
            crop.h,
            crop.x,
            crop.y
        ));
    }
    lines.push(format!(
        "{}Output: {} × {} {}",
        indent(1),
        estimate.width,
        estimate.height,
        estimate.format.as_str()
    ));
    lines
}

pub fn print_estimate(preset: &Preset, estimate: &PreviewEstimate) {
    print_lines(format_estimate(preset, estimate));
}

// ============================================================================
// check
// ============================================================================

/// Format a batch selection: accepted files, then the consolidated skip
/// message.
pub fn format_batch_selection(selection: &BatchSelection<BatchFile>, limits: &BatchLimits) -> Vec<String> {
    let count = selection.accepted.len();
    let mut lines = vec![format!(
        "Accepted {} image{} ({})",
        count,
        if count == 1 { "" } else { "s" },
        format_mb(selection.total_bytes())
    )];
    for (i, file) in selection.accepted.iter().enumerate() {
        let name = file
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file.path.display().to_string());
        lines.push(format!(
            "{}{} {} ({})",
            indent(1),
            format_index(i + 1),
            name,
            format_mb(file.size)
        ));
    }
    if let Some(summary) = selection.summary(limits) {
        lines.push(summary);
    }
    lines
}

pub fn print_batch_selection(selection: &BatchSelection<BatchFile>, limits: &BatchLimits) {
    print_lines(format_batch_selection(selection, limits));
}

// ============================================================================
// process / batch
// ============================================================================

/// Format the settings a request was sent with.
pub fn format_settings(settings: &Settings, catalog: &Catalog) -> Vec<String> {
    let mut lines = vec![
        format!(
            "{} · {}",
            catalog.preset_name(&settings.preset),
            format_quality(settings.format, Some(settings.jpeg_quality))
        ),
        format!(
            "{}Background: {}{}",
            indent(1),
            settings.background.as_str(),
            settings
                .background_hex
                .as_deref()
                .filter(|_| settings.background == crate::settings::BackgroundMode::Custom)
                .map(|hex| format!(" {hex}"))
                .unwrap_or_default()
        ),
        format!(
            "{}Remove background: {}",
            indent(1),
            if settings.remove_bg { "yes" } else { "no" }
        ),
        format!("{}Top bias: {:.2}", indent(1), settings.top_bias),
        format!("{}Style: {}", indent(1), settings.style),
    ];
    let adjustments: Vec<String> = AdjustmentField::ALL
        .iter()
        .map(|f| format!("{} {:.2}", f.key(), settings.adjustments.get(*f)))
        .collect();
    lines.push(format!("{}Adjustments: {}", indent(1), adjustments.join(", ")));
    if let Some(use_case) = settings.use_case.as_deref().and_then(|k| catalog.use_case(k)) {
        lines.push(format!("{}Use case: {}", indent(1), use_case.name));
    }
    lines
}

pub fn print_settings(settings: &Settings, catalog: &Catalog) {
    print_lines(format_settings(settings, catalog));
}

/// Format the result of a single-image call.
///
/// ```text
/// Wrote me-headshot.png
///     800 × 1000 png, 182.4 KB in 640 ms
/// ```
pub fn format_process_result(meta: &OutputMeta, written: &Path, len: usize) -> Vec<String> {
    let mut lines = vec![format!("Wrote {}", written.display())];
    let mut detail = Vec::new();
    if let (Some(w), Some(h)) = (meta.width, meta.height) {
        detail.push(match &meta.format {
            Some(format) => format!("{w} × {h} {format}"),
            None => format!("{w} × {h}"),
        });
    }
    let bytes = meta.bytes.unwrap_or(len as u64);
    detail.push(format!("{:.1} KB", bytes as f64 / 1024.0));
    let mut line = detail.join(", ");
    if let Some(ms) = meta.processing_ms {
        line.push_str(&format!(" in {ms} ms"));
    }
    lines.push(format!("{}{}", indent(1), line));
    lines
}

pub fn print_process_result(meta: &OutputMeta, written: &Path, len: usize) {
    print_lines(format_process_result(meta, written, len));
}

pub fn format_batch_result(archive: &BatchArchive, written: &Path) -> Vec<String> {
    vec![
        format!("Wrote {}", written.display()),
        format!(
            "{}{} succeeded, {} failed",
            indent(1),
            archive.succeeded,
            archive.failed
        ),
    ]
}

pub fn print_batch_result(archive: &BatchArchive, written: &Path) {
    print_lines(format_batch_result(archive, written));
}

// ============================================================================
// profiles
// ============================================================================

/// Format the saved profiles, newest first.
pub fn format_profiles(profiles: &[Profile], catalog: &Catalog) -> Vec<String> {
    if profiles.is_empty() {
        return vec!["No saved profiles".to_string()];
    }
    let mut lines = Vec::new();
    for (i, profile) in profiles.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), profile.name));
        lines.push(format!("{}{}", indent(1), patch_line(&profile.settings, catalog)));
        lines.push(format!("{}Id: {}", indent(1), profile.id));
    }
    lines
}

pub fn print_profiles(profiles: &[Profile], catalog: &Catalog) {
    print_lines(format_profiles(profiles, catalog));
}

pub fn format_merge_summary(summary: &MergeSummary) -> String {
    let mut line = format!(
        "Imported {} profile{}",
        summary.added,
        if summary.added == 1 { "" } else { "s" }
    );
    let mut notes = Vec::new();
    if summary.renamed > 0 {
        notes.push(format!("{} renamed", summary.renamed));
    }
    if summary.overwritten > 0 {
        notes.push(format!("{} overwritten", summary.overwritten));
    }
    if !notes.is_empty() {
        line.push_str(&format!(" ({})", notes.join(", ")));
    }
    line
}

// ============================================================================
// catalog / health
// ============================================================================

pub fn format_catalog(catalog: &Catalog) -> Vec<String> {
    let mut lines = vec!["Presets".to_string()];
    for (i, preset) in catalog.presets().iter().enumerate() {
        let size = match (preset.width, preset.height) {
            (Some(w), Some(h)) => format!(", {w} × {h}"),
            (Some(w), None) => format!(", {w} wide"),
            (None, Some(h)) => format!(", {h} tall"),
            (None, None) => String::new(),
        };
        lines.push(format!(
            "{} {} ({}, ratio {:.3}{})",
            format_index(i + 1),
            preset.name,
            preset.key,
            preset.ratio,
            size
        ));
    }

    lines.push(String::new());
    lines.push("Styles".to_string());
    for (i, style) in catalog.styles().iter().enumerate() {
        let values: Vec<String> = AdjustmentField::ALL
            .iter()
            .map(|f| format!("{:.2}", style.adjustments.get(*f)))
            .collect();
        lines.push(format!("{} {} ({})", format_index(i + 1), style.name, style.key));
        lines.push(format!("{}{}", indent(1), values.join(" / ")));
    }

    lines.push(String::new());
    lines.push("Use cases".to_string());
    for (i, use_case) in catalog.use_cases().iter().enumerate() {
        lines.push(format!("{} {} ({})", format_index(i + 1), use_case.name, use_case.key));
        lines.push(format!("{}{}", indent(1), patch_line(&use_case.overrides, catalog)));
        lines.push(format!("{}Style: {}", indent(1), use_case.style));
    }
    lines
}

pub fn print_catalog(catalog: &Catalog) {
    print_lines(format_catalog(catalog));
}

pub fn format_health(health: &ServiceHealth) -> Vec<String> {
    let mut header = format!("Service: {}", if health.is_ok() { "ok" } else { "unavailable" });
    if let Some(version) = &health.version {
        header.push_str(&format!(" (v{version})"));
    }
    let mut lines = vec![header];
    let limits = &health.limits;
    if let Some(bytes) = limits.max_upload_bytes {
        lines.push(format!("{}Max upload: {}", indent(1), format_mb(bytes)));
    }
    if let Some(count) = limits.max_batch_images {
        lines.push(format!("{}Max batch images: {}", indent(1), count));
    }
    if let Some(bytes) = limits.max_batch_total_bytes {
        lines.push(format!("{}Max batch total: {}", indent(1), format_mb(bytes)));
    }
    if let Some(features) = health.features.as_object() {
        let enabled: Vec<&str> = features
            .iter()
            .filter(|(_, v)| v.as_bool() == Some(true))
            .map(|(k, _)| k.as_str())
            .collect();
        if !enabled.is_empty() {
            lines.push(format!("{}Features: {}", indent(1), enabled.join(", ")));
        }
    }
    lines
}

pub fn print_health(health: &ServiceHealth) {
    print_lines(format_health(health));
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::StyleKey;
    use std::path::PathBuf;

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(1234), "1234");
    }

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    // =========================================================================
    // crop
    // =========================================================================

    #[test]
    fn estimate_lines() {
        let catalog = Catalog::builtin();
        let preset = catalog.preset("portrait-4x5").unwrap();
        let estimate = PreviewEstimate::compute((1000, 1000), preset, 0.2, OutputFormat::Png);
        assert_eq!(
            format_estimate(preset, &estimate),
            vec![
                "Portrait 4x5 (portrait-4x5)",
                "    Source: 1000 × 1000",
                "    Crop: 800 × 1000 at (100, 0)",
                "    Output: 800 × 1000 png",
            ]
        );
    }

    #[test]
    fn estimate_uncropped() {
        let catalog = Catalog::builtin();
        let preset = catalog.preset("square").unwrap();
        let estimate = PreviewEstimate::compute((500, 500), preset, 0.2, OutputFormat::Jpeg);
        let lines = format_estimate(preset, &estimate);
        assert_eq!(lines[2], "    Crop: none");
    }

    // =========================================================================
    // check
    // =========================================================================

    #[test]
    fn batch_selection_lists_accepted_and_summary() {
        const MB: u64 = 1024 * 1024;
        let file = |name: &str, size: u64, ct: Option<&str>| BatchFile {
            path: PathBuf::from("/photos").join(name),
            size,
            content_type: ct.map(str::to_string),
        };
        let limits = BatchLimits::default();
        let selection = crate::batch::validate(
            vec![
                file("a.jpg", MB, Some("image/jpeg")),
                file("notes.txt", 10, Some("text/plain")),
                file("b.png", 2 * MB, Some("image/png")),
            ],
            &limits,
        );
        assert_eq!(
            format_batch_selection(&selection, &limits),
            vec![
                "Accepted 2 images (3 MB)",
                "    001 a.jpg (1 MB)",
                "    002 b.png (2 MB)",
                "Skipped 1 non-image file.",
            ]
        );
    }

    // =========================================================================
    // profiles
    // =========================================================================

    #[test]
    fn profiles_empty() {
        assert_eq!(format_profiles(&[], &Catalog::builtin()), vec!["No saved profiles"]);
    }

    #[test]
    fn profile_lines() {
        let profile = Profile {
            id: "abc".into(),
            name: "LinkedIn".into(),
            created_at: 0,
            settings: SettingsPatch {
                preset: Some("square".into()),
                format: Some(OutputFormat::Jpeg),
                jpeg_quality: Some(92),
                style: Some(StyleKey::named("studio")),
                ..Default::default()
            },
        };
        assert_eq!(
            format_profiles(&[profile], &Catalog::builtin()),
            vec![
                "001 LinkedIn",
                "    Square · JPEG q92 · style studio",
                "    Id: abc",
            ]
        );
    }

    #[test]
    fn merge_summary_wording() {
        let summary = MergeSummary {
            added: 1,
            overwritten: 0,
            renamed: 1,
        };
        assert_eq!(format_merge_summary(&summary), "Imported 1 profile (1 renamed)");
        let summary = MergeSummary {
            added: 0,
            overwritten: 2,
            renamed: 0,
        };
        assert_eq!(format_merge_summary(&summary), "Imported 0 profiles (2 overwritten)");
    }

    // =========================================================================
    // process / health
    // =========================================================================

    #[test]
    fn process_result_with_meta() {
        let meta = OutputMeta {
            width: Some(800),
            height: Some(1000),
            format: Some("png".into()),
            bytes: Some(2048),
            processing_ms: Some(640),
        };
        assert_eq!(
            format_process_result(&meta, Path::new("out/me.png"), 0),
            vec!["Wrote out/me.png", "    800 × 1000 png, 2.0 KB in 640 ms"]
        );
    }

    #[test]
    fn process_result_without_meta_uses_body_length() {
        let lines = format_process_result(&OutputMeta::default(), Path::new("me.png"), 512);
        assert_eq!(lines[1], "    0.5 KB");
    }

    #[test]
    fn health_lines() {
        let health: ServiceHealth = serde_json::from_str(
            r#"{"status": "ok", "version": "1.2.0",
                "limits": {"max_upload_bytes": 12582912, "max_batch_images": 24},
                "features": {"remove_bg": true, "face_detect": false}}"#,
        )
        .unwrap();
        assert_eq!(
            format_health(&health),
            vec![
                "Service: ok (v1.2.0)",
                "    Max upload: 12 MB",
                "    Max batch images: 24",
                "    Features: remove_bg",
            ]
        );
    }

    #[test]
    fn catalog_has_three_sections() {
        let lines = format_catalog(&Catalog::builtin());
        assert_eq!(lines[0], "Presets");
        assert!(lines.contains(&"Styles".to_string()));
        assert!(lines.contains(&"Use cases".to_string()));
        assert!(lines.contains(&"001 Square (square, ratio 1.000)".to_string()));
    }
}
