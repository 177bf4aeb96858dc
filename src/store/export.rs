//! Export documents and their delivery.
//!
//! Exports are bundle-shaped JSON, so a single exported preset can be merged
//! like any other bundle. Delivery tries the clipboard first and falls back to
//! writing a file.

use super::profiles::{APP_TAG, BUNDLE_VERSION, Profile};
use crate::settings::SettingsPatch;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct BundleDocument<'a> {
    app: &'static str,
    version: u32,
    profiles: Vec<BundleDocumentEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct BundleDocumentEntry<'a> {
    name: &'a str,
    settings: &'a SettingsPatch,
}

fn render(entries: Vec<BundleDocumentEntry<'_>>) -> String {
    let doc = BundleDocument {
        app: APP_TAG,
        version: BUNDLE_VERSION,
        profiles: entries,
    };
    serde_json::to_string_pretty(&doc).unwrap_or_default()
}

/// A one-entry bundle for the given settings.
pub fn preset_document(name: &str, settings: &SettingsPatch) -> String {
    render(vec![BundleDocumentEntry { name, settings }])
}

/// A bundle containing every profile, newest first.
pub fn bundle_document(profiles: &[Profile]) -> String {
    render(
        profiles
            .iter()
            .map(|p| BundleDocumentEntry {
                name: &p.name,
                settings: &p.settings,
            })
            .collect(),
    )
}

/// Where exported text can go.
pub trait ExportSink {
    /// Put text on the clipboard. Returns false if unavailable.
    fn copy_text(&mut self, text: &str) -> bool;
    /// Save text as a file. Returns the written location.
    fn download(&mut self, filename: &str, text: &str) -> std::io::Result<PathBuf>;
}

/// Which path delivered an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Copied,
    Downloaded(PathBuf),
}

impl fmt::Display for ExportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportOutcome::Copied => write!(f, "Copied to clipboard."),
            ExportOutcome::Downloaded(path) => write!(f, "Saved {}.", path.display()),
        }
    }
}

/// Clipboard first, then a file.
pub fn deliver(
    sink: &mut dyn ExportSink,
    filename: &str,
    text: &str,
) -> std::io::Result<ExportOutcome> {
    if sink.copy_text(text) {
        debug!(bytes = text.len(), "export copied to clipboard");
        return Ok(ExportOutcome::Copied);
    }
    warn!("clipboard unavailable, saving export as a file");
    sink.download(filename, text).map(ExportOutcome::Downloaded)
}

/// Sink that skips the clipboard and writes straight into a directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ExportSink for DirectorySink {
    fn copy_text(&mut self, _text: &str) -> bool {
        false
    }

    fn download(&mut self, filename: &str, text: &str) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(filename);
        std::fs::write(&path, text)?;
        Ok(path)
    }
}

/// System clipboard with a directory fallback.
pub struct ClipboardSink {
    fallback: DirectorySink,
}

impl ClipboardSink {
    pub fn new(fallback_dir: impl Into<PathBuf>) -> Self {
        Self {
            fallback: DirectorySink::new(fallback_dir),
        }
    }
}

impl ExportSink for ClipboardSink {
    fn copy_text(&mut self, text: &str) -> bool {
        match arboard::Clipboard::new().and_then(|mut cb| cb.set_text(text.to_owned())) {
            Ok(()) => true,
            Err(err) => {
                debug!(error = %err, "clipboard write failed");
                false
            }
        }
    }

    fn download(&mut self, filename: &str, text: &str) -> std::io::Result<PathBuf> {
        self.fallback.download(filename, text)
    }
}
