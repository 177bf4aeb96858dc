//! Profile names and output file names.
//!
//! ## Profile names
//!
//! Names are cleaned before they are stored: surrounding whitespace trimmed,
//! inner runs of whitespace collapsed to one space, and the result cut to
//! [`MAX_PROFILE_NAME`] characters. Uniqueness is case-insensitive, so
//! `"LinkedIn"` and `"linkedin"` collide.
//!
//! On collision a numeric suffix is tried: `"LinkedIn (2)"`, `"LinkedIn (3)"`,
//! ... up to [`MAX_SUFFIX_ATTEMPTS`] attempts, then a timestamp suffix. The
//! base is shortened so the suffixed name still fits the length limit.
//!
//! ## Output names
//!
//! Files written by the CLI reuse the source stem, restricted to characters
//! that are safe on every filesystem:
//! - `My Photo!.heic` → `My-Photo.png`
//! - `../../etc/passwd` → `passwd.png`

use crate::catalog::Catalog;
use crate::settings::{OutputFormat, Settings};
use std::path::Path;

pub const MAX_PROFILE_NAME: usize = 48;
pub const MAX_SUFFIX_ATTEMPTS: u32 = 50;
pub const MAX_STEM_LEN: usize = 80;

/// Trim, collapse whitespace, cap the length. `None` if nothing is left.
pub fn clean_profile_name(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let capped: String = collapsed.chars().take(MAX_PROFILE_NAME).collect();
    let trimmed = capped.trim_end();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Case-insensitive name equality.
pub fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// `base` followed by `suffix`, shortening `base` so the total fits.
fn with_suffix(base: &str, suffix: &str) -> String {
    let room = MAX_PROFILE_NAME.saturating_sub(suffix.chars().count());
    let head: String = base.chars().take(room).collect();
    format!("{}{}", head.trim_end(), suffix)
}

/// Find a free variant of `base`.
///
/// Returns the name and whether it had to be changed.
pub fn disambiguate<F>(base: &str, taken: F, now_ms: u64) -> (String, bool)
where
    F: Fn(&str) -> bool,
{
    if !taken(base) {
        return (base.to_string(), false);
    }
    for n in 2..(2 + MAX_SUFFIX_ATTEMPTS) {
        let candidate = with_suffix(base, &format!(" ({n})"));
        if !taken(&candidate) {
            return (candidate, true);
        }
    }
    (with_suffix(base, &format!(" ({now_ms})")), true)
}

/// Name used when the user saves without typing one: the active use-case's
/// name, else the preset name and format, e.g. `"Portrait 4x5 PNG"`.
pub fn default_profile_name(settings: &Settings, catalog: &Catalog) -> String {
    if let Some(use_case) = settings
        .use_case
        .as_deref()
        .and_then(|key| catalog.use_case(key))
    {
        return use_case.name.clone();
    }
    format!(
        "{} {}",
        catalog.preset_name(&settings.preset),
        settings.format.as_str().to_uppercase()
    )
}

/// Filesystem-safe stem: ASCII alphanumerics and `-_.` kept, anything else
/// becomes `-`, leading and trailing `.`/`-` stripped, capped at 80 chars.
pub fn safe_stem(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let mapped: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let squeezed = squeeze_dashes(&mapped);
    let trimmed = squeezed.trim_matches(|c| c == '.' || c == '-');
    let capped: String = trimmed.chars().take(MAX_STEM_LEN).collect();
    if capped.is_empty() {
        "image".to_string()
    } else {
        capped
    }
}

fn squeeze_dashes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }
    out
}

/// Output file name for a processed source image.
pub fn output_file_name(source_name: &str, format: OutputFormat) -> String {
    format!("{}.{}", safe_stem(source_name), format.extension())
}
