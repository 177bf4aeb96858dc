//! Cancellation tokens and the single-flight slot.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancel flag for one remote call.
///
/// The scheduler keeps one clone; the adapter executing the call keeps
/// another and checks [`is_cancelled`](Self::is_cancelled) between steps.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    id: u64,
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    fn new(id: u64) -> Self {
        Self {
            id,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl PartialEq for CancellationToken {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CancellationToken {}

/// At most one active call. Starting a new one cancels the old one.
#[derive(Debug, Default)]
pub struct SingleFlight {
    next_id: u64,
    active: Option<CancellationToken>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel and drop any active token, then issue a fresh one.
    pub fn begin(&mut self) -> CancellationToken {
        if let Some(previous) = self.active.take() {
            previous.cancel();
        }
        self.next_id += 1;
        let token = CancellationToken::new(self.next_id);
        self.active = Some(token.clone());
        token
    }

    /// Mark the call with `id` finished. Returns true only if it was the
    /// active one; stale ids leave the slot untouched.
    pub fn finish(&mut self, id: u64) -> bool {
        match &self.active {
            Some(token) if token.id() == id => {
                self.active = None;
                true
            }
            _ => false,
        }
    }

    /// Abort the active call, if any. Idempotent.
    pub fn cancel(&mut self) -> bool {
        match self.active.take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_id(&self) -> Option<u64> {
        self.active.as_ref().map(CancellationToken::id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_cancels_previous() {
        let mut flight = SingleFlight::new();
        let first = flight.begin();
        let second = flight.begin();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert_eq!(flight.active_id(), Some(second.id()));
    }

    #[test]
    fn finish_ignores_stale_ids() {
        let mut flight = SingleFlight::new();
        let first = flight.begin();
        let second = flight.begin();
        assert!(!flight.finish(first.id()));
        assert!(flight.is_loading());
        assert!(flight.finish(second.id()));
        assert!(!flight.is_loading());
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut flight = SingleFlight::new();
        let token = flight.begin();
        assert!(flight.cancel());
        assert!(token.is_cancelled());
        assert!(!flight.cancel());
        assert!(!flight.is_loading());
    }

    #[test]
    fn clones_share_the_flag() {
        let mut flight = SingleFlight::new();
        let token = flight.begin();
        let adapter_copy = token.clone();
        flight.cancel();
        assert!(adapter_copy.is_cancelled());
    }
}
