//! Remote collaborators: the processing and catalog services.
//!
//! The [`ProcessingService`] and [`CatalogService`] traits are the only way
//! the core talks to the network. The production implementation is
//! [`HttpService`], a blocking `reqwest` client. Tests substitute
//! [`tests::MockService`], which records every call without doing I/O.
//!
//! ## Wire contract
//!
//! | Call | Endpoint | Success body | Metadata |
//! |------|----------|--------------|----------|
//! | process | `POST /api/process` (multipart) | image bytes | `x-output-*`, `x-processing-ms` |
//! | batch | `POST /api/batch` (multipart, repeated `images`) | zip archive | `x-batch-succeeded`, `x-batch-failed`, `content-disposition` |
//! | catalog | `GET /api/presets` | `{presets, styles}` | |
//! | health | `GET /api/health` | `{status, limits, features}` | |
//!
//! Failures carry `{"detail": "..."}`; that text is what the user sees.

use crate::batch::{BatchCandidate, content_type_for_path};
use crate::catalog::{Catalog, CatalogResponse};
use crate::scheduler::{BatchRequest, CancellationToken, ProcessRequest};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Message shown when a failure carries no usable detail.
pub const FALLBACK_MESSAGE: &str = "Processing failed.";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("Request cancelled")]
    Cancelled,
    #[error("Service rejected request ({status})")]
    Rejected { status: u16, message: Option<String> },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ServiceError {
    /// The one line a user should see for this failure.
    pub fn user_message(&self) -> String {
        self.user_message_or(FALLBACK_MESSAGE)
    }

    pub fn user_message_or(&self, fallback: &str) -> String {
        match self {
            ServiceError::Rejected {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.trim().to_string(),
            ServiceError::Transport(detail) if !detail.trim().is_empty() => {
                format!("{fallback} ({})", detail.trim())
            }
            _ => fallback.to_string(),
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::Transport(err.to_string())
    }
}

// =============================================================================
// Payload types
// =============================================================================

/// A source image chosen by the user.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceImage {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    /// Pixel size when the header could be decoded locally.
    pub dimensions: Option<(u32, u32)>,
}

impl SourceImage {
    /// Read a file, sniffing dimensions from its header.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let dimensions = image::ImageReader::new(std::io::Cursor::new(&bytes))
            .with_guessed_format()
            .ok()
            .and_then(|reader| reader.into_dimensions().ok());
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "image".to_string());
        Ok(Self {
            file_name,
            content_type: content_type_for_path(path).map(str::to_string),
            bytes,
            dimensions,
        })
    }
}

impl BatchCandidate for SourceImage {
    fn byte_size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }
}

/// Metadata headers returned with a processed image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputMeta {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<String>,
    pub bytes: Option<u64>,
    pub processing_ms: Option<u64>,
}

impl OutputMeta {
    /// Build from a header lookup. Missing or unparsable headers are `None`.
    pub fn from_headers<'a, F>(header: F) -> Self
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let number = |name: &str| header(name).and_then(|v| v.trim().parse::<u64>().ok());
        Self {
            width: number("x-output-width").and_then(|v| u32::try_from(v).ok()),
            height: number("x-output-height").and_then(|v| u32::try_from(v).ok()),
            format: header("x-output-format")
                .map(|v| v.trim().to_ascii_lowercase())
                .filter(|v| !v.is_empty()),
            bytes: number("x-output-bytes"),
            processing_ms: number("x-processing-ms"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub meta: OutputMeta,
}

/// Zip archive produced by a batch call.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchArchive {
    pub bytes: Vec<u8>,
    pub succeeded: u32,
    pub failed: u32,
    pub filename: String,
}

pub const DEFAULT_ARCHIVE_NAME: &str = "headshots.zip";

/// Service health and the limits it advertises.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ServiceHealth {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub limits: HealthLimits,
    #[serde(default)]
    pub features: serde_json::Value,
}

impl ServiceHealth {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HealthLimits {
    #[serde(default)]
    pub max_upload_bytes: Option<u64>,
    #[serde(default)]
    pub max_batch_images: Option<usize>,
    #[serde(default)]
    pub max_batch_total_bytes: Option<u64>,
}

// =============================================================================
// Response helpers
// =============================================================================

#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Extract the human-readable `detail` from an error body.
///
/// Accepts a plain string, or a list of validation errors whose first `msg`
/// is used.
pub fn error_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let text = match parsed.detail {
        serde_json::Value::String(text) => text,
        serde_json::Value::Array(items) => items
            .first()
            .and_then(|item| item.get("msg"))
            .and_then(|msg| msg.as_str())
            .map(str::to_string)?,
        _ => return None,
    };
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// Filename from a `content-disposition` header value.
pub fn disposition_filename(value: &str) -> Option<String> {
    value.split(';').map(str::trim).find_map(|part| {
        let (key, raw) = part.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let name = raw.trim().trim_matches('"');
        let name = Path::new(name).file_name()?.to_string_lossy().to_string();
        (!name.is_empty()).then_some(name)
    })
}

// =============================================================================
// Service traits
// =============================================================================

/// Single-image and batch processing.
///
/// Implementations should check the token before and after any blocking step
/// and return [`ServiceError::Cancelled`] once it is set.
pub trait ProcessingService {
    fn process(
        &self,
        request: &ProcessRequest,
        token: &CancellationToken,
    ) -> Result<ProcessedImage, ServiceError>;

    fn process_batch(
        &self,
        request: &BatchRequest,
        token: &CancellationToken,
    ) -> Result<BatchArchive, ServiceError>;
}

/// Read-only service metadata.
pub trait CatalogService {
    fn catalog(&self) -> Result<Catalog, ServiceError>;
    fn health(&self) -> Result<ServiceHealth, ServiceError>;
}

// =============================================================================
// HTTP adapter
// =============================================================================

pub struct HttpService {
    client: Client,
    base_url: String,
}

impl HttpService {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn form(fields: Vec<(&'static str, String)>) -> Form {
        fields
            .into_iter()
            .fold(Form::new(), |form, (name, value)| form.text(name, value))
    }

    fn image_part(image: &SourceImage) -> Result<Part, ServiceError> {
        let part = Part::bytes(image.bytes.clone()).file_name(image.file_name.clone());
        match &image.content_type {
            Some(mime) => Ok(part.mime_str(mime)?),
            None => Ok(part),
        }
    }

    /// Turn a non-success response into [`ServiceError::Rejected`].
    fn check(response: Response) -> Result<Response, ServiceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        let message = error_detail(&body);
        warn!(status = status.as_u16(), detail = ?message, "service rejected request");
        Err(ServiceError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ServiceError> {
        let response = Self::check(self.client.get(self.url(path)).send()?)?;
        let body = response.text()?;
        serde_json::from_str(&body).map_err(|e| ServiceError::InvalidResponse(e.to_string()))
    }
}

fn ensure_live(token: &CancellationToken) -> Result<(), ServiceError> {
    if token.is_cancelled() {
        Err(ServiceError::Cancelled)
    } else {
        Ok(())
    }
}

fn header_str<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

impl ProcessingService for HttpService {
    fn process(
        &self,
        request: &ProcessRequest,
        token: &CancellationToken,
    ) -> Result<ProcessedImage, ServiceError> {
        ensure_live(token)?;
        let form = Self::form(request.fields()).part("image", Self::image_part(&request.image)?);
        debug!(url = %self.url("/api/process"), "posting process request");
        let response = self
            .client
            .post(self.url("/api/process"))
            .multipart(form)
            .send()?;
        ensure_live(token)?;

        let response = Self::check(response)?;
        let meta = OutputMeta::from_headers(|name| header_str(&response, name));
        let content_type = header_str(&response, "content-type").map(str::to_string);
        let bytes = response.bytes()?.to_vec();
        ensure_live(token)?;

        if bytes.is_empty() {
            return Err(ServiceError::InvalidResponse("empty image body".into()));
        }
        Ok(ProcessedImage {
            bytes,
            content_type,
            meta,
        })
    }

    fn process_batch(
        &self,
        request: &BatchRequest,
        token: &CancellationToken,
    ) -> Result<BatchArchive, ServiceError> {
        ensure_live(token)?;
        let mut form = Self::form(request.fields());
        for image in &request.images {
            form = form.part("images", Self::image_part(image)?);
        }
        let response = self
            .client
            .post(self.url("/api/batch"))
            .multipart(form)
            .send()?;
        ensure_live(token)?;

        let response = Self::check(response)?;
        let count = |name: &str| {
            header_str(&response, name)
                .and_then(|v| v.trim().parse::<u32>().ok())
                .unwrap_or(0)
        };
        let succeeded = count("x-batch-succeeded");
        let failed = count("x-batch-failed");
        let filename = header_str(&response, "content-disposition")
            .and_then(disposition_filename)
            .unwrap_or_else(|| DEFAULT_ARCHIVE_NAME.to_string());
        let bytes = response.bytes()?.to_vec();
        ensure_live(token)?;

        Ok(BatchArchive {
            bytes,
            succeeded,
            failed,
            filename,
        })
    }
}

impl CatalogService for HttpService {
    fn catalog(&self) -> Result<Catalog, ServiceError> {
        let response: CatalogResponse = self.get_json("/api/presets")?;
        Ok(Catalog::builtin().with_service(response))
    }

    fn health(&self) -> Result<ServiceHealth, ServiceError> {
        self.get_json("/api/health")
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Mock service that records calls and replays scripted outcomes.
    /// Unscripted calls succeed with a small fixed payload.
    #[derive(Default)]
    pub struct MockService {
        pub process_results: Mutex<VecDeque<Result<ProcessedImage, ServiceError>>>,
        pub batch_results: Mutex<VecDeque<Result<BatchArchive, ServiceError>>>,
        pub operations: Mutex<Vec<RecordedCall>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedCall {
        Process {
            file: String,
            fields: Vec<(&'static str, String)>,
        },
        Batch {
            files: Vec<String>,
        },
    }

    impl MockService {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_process_results(results: Vec<Result<ProcessedImage, ServiceError>>) -> Self {
            Self {
                process_results: Mutex::new(results.into()),
                ..Self::default()
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedCall> {
            self.operations.lock().unwrap().clone()
        }
    }

    impl ProcessingService for MockService {
        fn process(
            &self,
            request: &ProcessRequest,
            token: &CancellationToken,
        ) -> Result<ProcessedImage, ServiceError> {
            self.operations.lock().unwrap().push(RecordedCall::Process {
                file: request.image.file_name.clone(),
                fields: request.fields(),
            });
            ensure_live(token)?;
            self.process_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(crate::test_helpers::processed(4)))
        }

        fn process_batch(
            &self,
            request: &BatchRequest,
            token: &CancellationToken,
        ) -> Result<BatchArchive, ServiceError> {
            self.operations.lock().unwrap().push(RecordedCall::Batch {
                files: request.images.iter().map(|i| i.file_name.clone()).collect(),
            });
            ensure_live(token)?;
            self.batch_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(crate::test_helpers::archive(request.images.len() as u32, 0)))
        }
    }

    // =========================================================================
    // Error messages
    // =========================================================================

    #[test]
    fn user_message_prefers_detail() {
        let err = ServiceError::Rejected {
            status: 413,
            message: Some("File too large. Max 12MB.".into()),
        };
        assert_eq!(err.user_message(), "File too large. Max 12MB.");
    }

    #[test]
    fn user_message_falls_back() {
        assert_eq!(
            ServiceError::Transport("connection refused".into()).user_message(),
            "Processing failed. (connection refused)"
        );
        assert_eq!(
            ServiceError::InvalidResponse("bad header".into()).user_message(),
            FALLBACK_MESSAGE
        );
        let blank = ServiceError::Rejected {
            status: 500,
            message: Some("  ".into()),
        };
        assert_eq!(blank.user_message(), FALLBACK_MESSAGE);
    }

    #[test]
    fn error_detail_string_and_list() {
        assert_eq!(
            error_detail(r#"{"detail": "Unknown crop preset."}"#),
            Some("Unknown crop preset.".into())
        );
        assert_eq!(
            error_detail(r#"{"detail": [{"loc": ["body"], "msg": "field required"}]}"#),
            Some("field required".into())
        );
        assert_eq!(error_detail("<html>502</html>"), None);
        assert_eq!(error_detail(r#"{"detail": 5}"#), None);
    }

    // =========================================================================
    // Header parsing
    // =========================================================================

    #[test]
    fn output_meta_from_headers() {
        let headers = [
            ("x-output-width", "600"),
            ("x-output-height", "750"),
            ("x-output-format", "PNG"),
            ("x-output-bytes", "12345"),
            ("x-processing-ms", "88"),
        ];
        let meta = OutputMeta::from_headers(|name| {
            headers.iter().find(|(k, _)| *k == name).map(|(_, v)| *v)
        });
        assert_eq!(meta.width, Some(600));
        assert_eq!(meta.height, Some(750));
        assert_eq!(meta.format.as_deref(), Some("png"));
        assert_eq!(meta.bytes, Some(12345));
        assert_eq!(meta.processing_ms, Some(88));
    }

    #[test]
    fn output_meta_ignores_garbage() {
        let meta = OutputMeta::from_headers(|name| match name {
            "x-output-width" => Some("wide"),
            _ => None,
        });
        assert_eq!(meta, OutputMeta::default());
    }

    #[test]
    fn disposition_filename_variants() {
        assert_eq!(
            disposition_filename(r#"attachment; filename="headshots-3.zip""#),
            Some("headshots-3.zip".into())
        );
        assert_eq!(
            disposition_filename("attachment; filename=out.zip"),
            Some("out.zip".into())
        );
        assert_eq!(
            disposition_filename(r#"attachment; filename="../../etc/passwd""#),
            Some("passwd".into())
        );
        assert_eq!(disposition_filename("inline"), None);
    }

    #[test]
    fn health_parses_partial_body() {
        let health: ServiceHealth = serde_json::from_str(
            r#"{"status": "ok", "limits": {"max_upload_bytes": 1048576}}"#,
        )
        .unwrap();
        assert!(health.is_ok());
        assert_eq!(health.limits.max_upload_bytes, Some(1_048_576));
        assert_eq!(health.limits.max_batch_images, None);
    }

    // =========================================================================
    // Mock service
    // =========================================================================

    #[test]
    fn mock_records_process_fields() {
        let service = MockService::new();
        let request = ProcessRequest {
            image: std::sync::Arc::new(crate::test_helpers::source_image("me.png", 4, 4)),
            settings: crate::settings::Settings::default(),
        };
        let mut flight = crate::scheduler::SingleFlight::new();
        let token = flight.begin();
        service.process(&request, &token).unwrap();

        let ops = service.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RecordedCall::Process { file, .. } if file == "me.png"));
    }

    #[test]
    fn mock_honors_cancelled_token() {
        let service = MockService::new();
        let request = ProcessRequest {
            image: std::sync::Arc::new(crate::test_helpers::source_image("me.png", 4, 4)),
            settings: crate::settings::Settings::default(),
        };
        let mut flight = crate::scheduler::SingleFlight::new();
        let token = flight.begin();
        flight.cancel();
        assert_eq!(
            service.process(&request, &token),
            Err(ServiceError::Cancelled)
        );
    }
}
