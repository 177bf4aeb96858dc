//! Single-slot transient notices.
//!
//! At most one message is visible. Showing a new one replaces the old and
//! restarts the expiry clock.

use tracing::debug;

pub const DEFAULT_NOTICE_MS: u64 = 6_500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub expires_at: u64,
}

#[derive(Debug, Clone)]
pub struct Notifier {
    duration: u64,
    current: Option<Notice>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_NOTICE_MS)
    }
}

impl Notifier {
    pub fn new(duration: u64) -> Self {
        Self {
            duration,
            current: None,
        }
    }

    /// Show `message`, replacing whatever is visible. Blank messages are ignored.
    pub fn show(&mut self, now: u64, message: impl Into<String>) {
        let message = message.into();
        if message.trim().is_empty() {
            return;
        }
        debug!(%message, "notice");
        self.current = Some(Notice {
            message,
            expires_at: now.saturating_add(self.duration),
        });
    }

    pub fn dismiss(&mut self) {
        self.current = None;
    }

    /// Visible message at `now`, if any.
    pub fn current(&self, now: u64) -> Option<&str> {
        self.current
            .as_ref()
            .filter(|notice| now < notice.expires_at)
            .map(|notice| notice.message.as_str())
    }

    /// Drop an expired notice. Returns true if one was removed.
    pub fn poll(&mut self, now: u64) -> bool {
        if self.current.as_ref().is_some_and(|n| now >= n.expires_at) {
            self.current = None;
            return true;
        }
        false
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.current.as_ref().map(|n| n.expires_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_expires() {
        let mut notifier = Notifier::default();
        notifier.show(1_000, "Choose a photo first.");
        assert_eq!(notifier.current(7_499), Some("Choose a photo first."));
        assert_eq!(notifier.current(7_500), None);
        assert!(notifier.poll(7_500));
        assert_eq!(notifier.next_deadline(), None);
    }

    #[test]
    fn new_notice_replaces_and_resets_clock() {
        let mut notifier = Notifier::new(100);
        notifier.show(0, "first");
        notifier.show(90, "second");
        assert_eq!(notifier.current(150), Some("second"));
        assert_eq!(notifier.next_deadline(), Some(190));
    }

    #[test]
    fn blank_messages_are_ignored() {
        let mut notifier = Notifier::new(100);
        notifier.show(0, "kept");
        notifier.show(10, "   ");
        assert_eq!(notifier.current(20), Some("kept"));
    }

    #[test]
    fn dismiss_clears() {
        let mut notifier = Notifier::new(100);
        notifier.show(0, "bye");
        notifier.dismiss();
        assert_eq!(notifier.current(1), None);
        assert!(!notifier.poll(1_000));
    }
}
