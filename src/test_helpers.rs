//! Shared test utilities.
//!
//! Small constructors for service payloads plus a recording export sink, so
//! unit tests can exercise scheduling and persistence logic without touching
//! the network, the clipboard or the filesystem.
//!
//! The scripted processing service lives next to the trait it implements, in
//! `remote::tests::MockService`.

use crate::remote::{BatchArchive, DEFAULT_ARCHIVE_NAME, OutputMeta, ProcessedImage, SourceImage};
use crate::store::ExportSink;
use std::path::{Path, PathBuf};

// =========================================================================
// Payloads
// =========================================================================

/// A processed result whose body is `len` bytes.
pub fn processed(len: usize) -> ProcessedImage {
    ProcessedImage {
        bytes: vec![0xAB; len],
        content_type: Some("image/png".into()),
        meta: OutputMeta {
            width: Some(800),
            height: Some(1000),
            format: Some("png".into()),
            bytes: Some(len as u64),
            processing_ms: Some(42),
        },
    }
}

/// A small in-memory source with known dimensions. The content type follows
/// the extension.
pub fn source_image(name: &str, width: u32, height: u32) -> SourceImage {
    let content_type = crate::batch::content_type_for_path(Path::new(name)).map(str::to_string);
    SourceImage {
        file_name: name.to_string(),
        content_type,
        bytes: vec![0; 16],
        dimensions: Some((width, height)),
    }
}

pub fn archive(succeeded: u32, failed: u32) -> BatchArchive {
    BatchArchive {
        bytes: b"PK\x05\x06".to_vec(),
        succeeded,
        failed,
        filename: DEFAULT_ARCHIVE_NAME.to_string(),
    }
}

// =========================================================================
// Export sink
// =========================================================================

/// Records every copy and download instead of performing it.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub clipboard_ok: bool,
    pub copied: Vec<String>,
    pub downloads: Vec<(String, String)>,
}

impl RecordingSink {
    pub fn with_clipboard(clipboard_ok: bool) -> Self {
        Self {
            clipboard_ok,
            ..Self::default()
        }
    }
}

impl ExportSink for RecordingSink {
    fn copy_text(&mut self, text: &str) -> bool {
        if self.clipboard_ok {
            self.copied.push(text.to_string());
        }
        self.clipboard_ok
    }

    fn download(&mut self, filename: &str, text: &str) -> std::io::Result<PathBuf> {
        self.downloads.push((filename.to_string(), text.to_string()));
        Ok(PathBuf::from(filename))
    }
}
