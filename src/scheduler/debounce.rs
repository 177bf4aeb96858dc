//! Trailing-edge debounce timer driven by explicit time.
//!
//! Nothing here sleeps or reads a clock. The owner arms the timer with the
//! current time on every event and asks [`Debounce::fire`] whether the quiet
//! window has elapsed whenever it gets a chance to run.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Debounce {
    window: u64,
    deadline: Option<u64>,
}

impl Debounce {
    pub fn new(window: u64) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn window(&self) -> u64 {
        self.window
    }

    /// (Re)start the window at `now`. Any earlier deadline is discarded.
    pub fn arm(&mut self, now: u64) {
        self.deadline = Some(now.saturating_add(self.window));
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }

    /// Consume the deadline if it has passed. Fires at most once per arm.
    pub fn fire(&mut self, now: u64) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
