//! Bounded history of processed previews.
//!
//! Each successful result becomes a [`PreviewHandle`] behind an `Arc`. The
//! live preview binding and the history entry share the handle; the handle's
//! `Drop` is the single place a preview resource is released, so an entry
//! evicted while still displayed stays alive until the display lets go.

use crate::remote::{OutputMeta, ProcessedImage};
use crate::settings::Settings;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

pub const DEFAULT_HISTORY_LEN: usize = 3;

/// A processed image kept for display.
#[derive(Debug)]
pub struct PreviewHandle {
    id: u64,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub meta: OutputMeta,
    live: Arc<AtomicUsize>,
}

impl PreviewHandle {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        debug!(preview = self.id, "preview released");
    }
}

/// Issues preview handles and counts how many are still alive.
#[derive(Debug, Default)]
pub struct PreviewPool {
    next_id: u64,
    live: Arc<AtomicUsize>,
}

impl PreviewPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&mut self, image: ProcessedImage) -> Arc<PreviewHandle> {
        self.next_id += 1;
        self.live.fetch_add(1, Ordering::SeqCst);
        Arc::new(PreviewHandle {
            id: self.next_id,
            bytes: image.bytes,
            content_type: image.content_type,
            meta: image.meta,
            live: Arc::clone(&self.live),
        })
    }

    /// Number of handles not yet dropped.
    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub preview: Arc<PreviewHandle>,
    pub settings: Settings,
    pub completed_at: u64,
}

#[derive(Debug)]
pub struct PreviewHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl Default for PreviewHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}

impl PreviewHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Add the newest entry, evicting from the old end past capacity.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push_front(entry);
        while self.entries.len() > self.capacity {
            if let Some(evicted) = self.entries.pop_back() {
                debug!(preview = evicted.preview.id(), "history entry evicted");
            }
        }
    }

    /// Entries newest first.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
