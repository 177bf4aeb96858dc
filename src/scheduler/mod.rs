//! Request scheduling: when to call the service and which results to keep.
//!
//! Three independent channels, all driven by explicit `now` timestamps:
//!
//! | Channel | Debounce | Staleness guard |
//! |---------|----------|-----------------|
//! | [`ProcessingChannel`] | trailing, 300 by default | cancellation token |
//! | [`EstimateChannel`] | trailing, 200 by default | sequence number |
//! | [`BatchChannel`] | none | cancellation token |
//!
//! The scheduler never performs I/O. [`RequestScheduler::poll`] returns the
//! work that became due; the caller executes it and reports back through the
//! channel's `complete` method with the token id or sequence number it was
//! handed.

pub mod debounce;
pub mod estimate;
pub mod history;
pub mod processing;
pub mod token;

pub use debounce::Debounce;
pub use estimate::{EstimateChannel, EstimateRequest, StampedEstimate};
pub use history::{HistoryEntry, PreviewHandle, PreviewHistory, PreviewPool};
pub use processing::{ProcessRequest, ProcessingChannel};
pub use token::{CancellationToken, SingleFlight};

use crate::config::TimingConfig;
use crate::remote::{BatchArchive, ServiceError, SourceImage};
use crate::settings::Settings;
use std::sync::Arc;
use tracing::{debug, info};

/// A call handed to the executor together with its cancel token.
#[derive(Debug, Clone)]
pub struct Dispatch<R> {
    pub token: CancellationToken,
    pub request: R,
}

impl<R> Dispatch<R> {
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// What happened to a finished call.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion<T> {
    /// The active call succeeded.
    Applied(T),
    /// The active call failed; carries the message to show.
    Failed(String),
    /// The call was cancelled. Never shown.
    Cancelled,
    /// A superseded call finished late. Ignored.
    Stale,
}

/// Images plus settings snapshot for one batch call.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub images: Vec<Arc<SourceImage>>,
    pub settings: Settings,
}

impl BatchRequest {
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        self.settings.form_fields()
    }
}

/// Single-flight batch channel, independent of single-image processing.
#[derive(Debug, Default)]
pub struct BatchChannel {
    flight: SingleFlight,
}

impl BatchChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, request: BatchRequest) -> Dispatch<BatchRequest> {
        let token = self.flight.begin();
        info!(token = token.id(), images = request.images.len(), "dispatching batch");
        Dispatch { token, request }
    }

    pub fn complete(
        &mut self,
        token_id: u64,
        outcome: Result<BatchArchive, ServiceError>,
    ) -> Completion<BatchArchive> {
        let current = self.flight.finish(token_id);
        match outcome {
            Err(ServiceError::Cancelled) => Completion::Cancelled,
            _ if !current => Completion::Stale,
            Ok(archive) => Completion::Applied(archive),
            Err(err) => Completion::Failed(err.user_message_or("Batch processing failed.")),
        }
    }

    pub fn cancel(&mut self) {
        if self.flight.cancel() {
            debug!("batch cancelled");
        }
    }

    pub fn is_loading(&self) -> bool {
        self.flight.is_loading()
    }
}

/// Work that became due during a poll.
#[derive(Debug, Clone)]
pub enum ScheduledWork {
    Process(Dispatch<ProcessRequest>),
    Estimate(StampedEstimate),
}

#[derive(Debug)]
pub struct RequestScheduler {
    pub processing: ProcessingChannel,
    pub estimate: EstimateChannel,
    pub batch: BatchChannel,
}

impl RequestScheduler {
    pub fn new(timing: &TimingConfig) -> Self {
        Self {
            processing: ProcessingChannel::new(timing.process_debounce_ms),
            estimate: EstimateChannel::new(timing.estimate_debounce_ms),
            batch: BatchChannel::new(),
        }
    }

    /// Collect everything whose debounce window has elapsed by `now`.
    pub fn poll(&mut self, now: u64) -> Vec<ScheduledWork> {
        let mut work = Vec::new();
        if let Some(stamped) = self.estimate.poll(now) {
            work.push(ScheduledWork::Estimate(stamped));
        }
        if let Some(dispatch) = self.processing.poll(now) {
            work.push(ScheduledWork::Process(dispatch));
        }
        work
    }

    /// Earliest pending timer deadline across the debounced channels.
    pub fn next_deadline(&self) -> Option<u64> {
        [self.processing.next_deadline(), self.estimate.next_deadline()]
            .into_iter()
            .flatten()
            .min()
    }

    /// Cancel everything outstanding on every channel.
    pub fn cancel_all(&mut self) {
        self.processing.cancel();
        self.estimate.cancel();
        self.batch.cancel();
    }
}
