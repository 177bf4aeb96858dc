//! Sequence-stamped channel for preview estimates.
//!
//! Estimates are cheap and never cancelled. Each firing bumps a monotonic
//! counter and stamps its request; a completion is accepted only while its
//! stamp is still the newest one issued.

use super::debounce::Debounce;
use crate::catalog::Preset;
use crate::geometry::PreviewEstimate;
use crate::settings::OutputFormat;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct EstimateRequest {
    pub source: (u32, u32),
    pub preset: Preset,
    pub top_bias: f64,
    pub format: OutputFormat,
}

impl EstimateRequest {
    pub fn compute(&self) -> PreviewEstimate {
        PreviewEstimate::compute(self.source, &self.preset, self.top_bias, self.format)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StampedEstimate {
    pub seq: u64,
    pub request: EstimateRequest,
}

#[derive(Debug)]
pub struct EstimateChannel {
    timer: Debounce,
    pending: Option<EstimateRequest>,
    seq: u64,
}

impl EstimateChannel {
    pub fn new(window: u64) -> Self {
        Self {
            timer: Debounce::new(window),
            pending: None,
            seq: 0,
        }
    }

    pub fn request(&mut self, now: u64, request: EstimateRequest) {
        self.pending = Some(request);
        self.timer.arm(now);
    }

    pub fn poll(&mut self, now: u64) -> Option<StampedEstimate> {
        if !self.timer.fire(now) {
            return None;
        }
        let request = self.pending.take()?;
        self.seq += 1;
        Some(StampedEstimate {
            seq: self.seq,
            request,
        })
    }

    /// Accept an estimate only if `seq` is the newest stamp.
    pub fn complete(&self, seq: u64, estimate: PreviewEstimate) -> Option<PreviewEstimate> {
        if seq == self.seq {
            Some(estimate)
        } else {
            debug!(seq, current = self.seq, "discarding out-of-order estimate");
            None
        }
    }

    /// Drop any pending request and invalidate outstanding stamps.
    pub fn cancel(&mut self) {
        self.timer.cancel();
        self.pending = None;
        self.seq += 1;
    }

    pub fn current_seq(&self) -> u64 {
        self.seq
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.timer.deadline()
    }
}
