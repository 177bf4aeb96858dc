//! Batch file selection against upload limits.
//!
//! Every candidate lands in exactly one bucket, decided in input order:
//!
//! 1. **oversize**: larger than the per-file limit
//! 2. **wrong type**: no content type, or not `image/*`
//! 3. **over budget**: would push the running accepted total past the
//!    aggregate limit (later, smaller files may still fit)
//! 4. **accepted**
//!
//! The accepted list is then cut to the maximum image count; files cut here
//! are reported as truncated rather than rejected.

use crate::config::LimitsConfig;
use image::ImageFormat;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Limits applied to a batch selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_file_bytes: u64,
    pub max_images: usize,
    pub max_total_bytes: u64,
}

impl From<&LimitsConfig> for BatchLimits {
    fn from(limits: &LimitsConfig) -> Self {
        Self {
            max_file_bytes: limits.max_upload_bytes,
            max_images: limits.max_batch_images,
            max_total_bytes: limits.max_batch_total_bytes,
        }
    }
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self::from(&LimitsConfig::default())
    }
}

/// Anything that can be checked against [`BatchLimits`].
pub trait BatchCandidate {
    fn byte_size(&self) -> u64;
    fn content_type(&self) -> Option<&str>;
}

/// A file on disk, described without reading its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFile {
    pub path: PathBuf,
    pub size: u64,
    pub content_type: Option<String>,
}

impl BatchFile {
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            size: metadata.len(),
            content_type: content_type_for_path(path).map(str::to_string),
        })
    }
}

impl<T: BatchCandidate + ?Sized> BatchCandidate for Arc<T> {
    fn byte_size(&self) -> u64 {
        (**self).byte_size()
    }

    fn content_type(&self) -> Option<&str> {
        (**self).content_type()
    }
}

impl BatchCandidate for BatchFile {
    fn byte_size(&self) -> u64 {
        self.size
    }

    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }
}

/// Guess a MIME type from the file extension.
pub fn content_type_for_path(path: &Path) -> Option<&'static str> {
    ImageFormat::from_path(path)
        .ok()
        .map(|format| format.to_mime_type())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSelection<T> {
    pub accepted: Vec<T>,
    pub oversize: usize,
    pub wrong_type: usize,
    pub over_budget: usize,
    pub truncated: usize,
}

impl<T> BatchSelection<T> {
    pub fn rejected(&self) -> usize {
        self.oversize + self.wrong_type + self.over_budget
    }

    pub fn total_bytes(&self) -> u64
    where
        T: BatchCandidate,
    {
        self.accepted.iter().map(BatchCandidate::byte_size).sum()
    }

    /// One consolidated message describing everything that was left out, or
    /// `None` if the whole selection was accepted.
    pub fn summary(&self, limits: &BatchLimits) -> Option<String> {
        let mut parts = Vec::new();
        if self.oversize > 0 {
            parts.push(format!(
                "{} over {}",
                plural(self.oversize, "file"),
                format_mb(limits.max_file_bytes)
            ));
        }
        if self.wrong_type > 0 {
            parts.push(plural(self.wrong_type, "non-image file"));
        }
        if self.over_budget > 0 {
            parts.push(format!(
                "{} past the {} batch total",
                plural(self.over_budget, "file"),
                format_mb(limits.max_total_bytes)
            ));
        }

        let mut sentences = Vec::new();
        if !parts.is_empty() {
            sentences.push(format!("Skipped {}.", parts.join(", ")));
        }
        if self.truncated > 0 {
            sentences.push(format!(
                "Only the first {} were kept ({} more not included).",
                plural(limits.max_images, "image"),
                self.truncated
            ));
        }
        (!sentences.is_empty()).then(|| sentences.join(" "))
    }
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// Whole megabytes (MiB) when exact, otherwise one decimal.
pub fn format_mb(bytes: u64) -> String {
    const MB: u64 = 1024 * 1024;
    if bytes % MB == 0 {
        format!("{} MB", bytes / MB)
    } else {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    }
}

/// Partition candidates against `limits`.
pub fn validate<T, I>(files: I, limits: &BatchLimits) -> BatchSelection<T>
where
    T: BatchCandidate,
    I: IntoIterator<Item = T>,
{
    let mut selection = BatchSelection {
        accepted: Vec::new(),
        oversize: 0,
        wrong_type: 0,
        over_budget: 0,
        truncated: 0,
    };
    let mut total: u64 = 0;

    for file in files {
        let size = file.byte_size();
        let is_image = file
            .content_type()
            .is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("image/"));

        if size > limits.max_file_bytes {
            selection.oversize += 1;
        } else if !is_image {
            selection.wrong_type += 1;
        } else if total.saturating_add(size) > limits.max_total_bytes {
            selection.over_budget += 1;
        } else {
            total += size;
            selection.accepted.push(file);
        }
    }

    if selection.accepted.len() > limits.max_images {
        selection.truncated = selection.accepted.len() - limits.max_images;
        selection.accepted.truncate(limits.max_images);
    }
    selection
}

/// Expand command-line paths into candidate files.
///
/// Files are kept as given. Directories are walked recursively in name order,
/// skipping hidden entries.
pub fn collect_candidates(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let walker = WalkDir::new(path)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));
            for entry in walker.filter_map(|e| e.ok()) {
                if entry.file_type().is_file() {
                    files.push(entry.into_path());
                }
            }
        } else {
            files.push(path.clone());
        }
    }
    files
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}
