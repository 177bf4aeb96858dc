//! Debounced single-flight channel for single-image processing.
//!
//! Requests arriving within the debounce window collapse into one dispatch
//! that carries the most recent snapshot. Dispatching cancels whatever call is
//! still running, so only the newest request can ever produce a visible result.

use super::debounce::Debounce;
use super::token::SingleFlight;
use super::{Completion, Dispatch};
use crate::remote::{ProcessedImage, ServiceError, SourceImage};
use crate::settings::Settings;
use std::sync::Arc;
use tracing::{debug, info};

/// Everything a processing call needs, captured when the request was made.
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub image: Arc<SourceImage>,
    pub settings: Settings,
}

impl ProcessRequest {
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        self.settings.form_fields()
    }
}

#[derive(Debug)]
pub struct ProcessingChannel {
    timer: Debounce,
    pending: Option<ProcessRequest>,
    flight: SingleFlight,
}

impl ProcessingChannel {
    pub fn new(window: u64) -> Self {
        Self {
            timer: Debounce::new(window),
            pending: None,
            flight: SingleFlight::new(),
        }
    }

    /// Queue a request. Ignored while auto-update is off unless `force`.
    ///
    /// Returns true if the timer was (re)armed.
    pub fn request(&mut self, now: u64, request: ProcessRequest, force: bool) -> bool {
        if !request.settings.auto_update && !force {
            debug!("auto-update off, processing request ignored");
            return false;
        }
        self.pending = Some(request);
        self.timer.arm(now);
        true
    }

    /// Dispatch the pending request if its quiet window has elapsed.
    pub fn poll(&mut self, now: u64) -> Option<Dispatch<ProcessRequest>> {
        if !self.timer.fire(now) {
            return None;
        }
        let request = self.pending.take()?;
        Some(self.dispatch(request))
    }

    /// Dispatch immediately, bypassing (and clearing) the debounce window.
    pub fn dispatch_now(&mut self, request: ProcessRequest) -> Dispatch<ProcessRequest> {
        self.timer.cancel();
        self.pending = None;
        self.dispatch(request)
    }

    fn dispatch(&mut self, request: ProcessRequest) -> Dispatch<ProcessRequest> {
        let token = self.flight.begin();
        info!(
            token = token.id(),
            file = %request.image.file_name,
            preset = %request.settings.preset,
            "dispatching processing request"
        );
        Dispatch { token, request }
    }

    /// Resolve the call identified by `token_id`.
    pub fn complete(
        &mut self,
        token_id: u64,
        outcome: Result<ProcessedImage, ServiceError>,
    ) -> Completion<ProcessedImage> {
        let current = self.flight.finish(token_id);
        match outcome {
            Err(ServiceError::Cancelled) => Completion::Cancelled,
            _ if !current => {
                debug!(token = token_id, "discarding stale processing result");
                Completion::Stale
            }
            Ok(image) => Completion::Applied(image),
            Err(err) => Completion::Failed(err.user_message()),
        }
    }

    /// Abort any in-flight call and drop any pending request. Idempotent.
    pub fn cancel(&mut self) {
        self.timer.cancel();
        self.pending = None;
        if self.flight.cancel() {
            debug!("processing cancelled");
        }
    }

    pub fn is_loading(&self) -> bool {
        self.flight.is_loading()
    }

    pub fn is_pending(&self) -> bool {
        self.timer.is_armed()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.timer.deadline()
    }

    pub fn active_token(&self) -> Option<u64> {
        self.flight.active_id()
    }
}
