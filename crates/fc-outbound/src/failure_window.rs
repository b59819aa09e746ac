//! Sliding window of recent send failures.
//!
//! Pruned to the last 5 minutes before every retry decision so a burst of
//! failures long ago doesn't keep halting retries for unrelated jobs.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub struct FailureWindow {
    timestamps: Mutex<VecDeque<Instant>>,
    window: Duration,
}

impl FailureWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            timestamps: Mutex::new(VecDeque::new()),
            window,
        }
    }

    fn prune_locked(&self, timestamps: &mut VecDeque<Instant>) {
        let cutoff = Instant::now().checked_sub(self.window);
        if let Some(cutoff) = cutoff {
            while matches!(timestamps.front(), Some(t) if *t < cutoff) {
                timestamps.pop_front();
            }
        }
    }

    pub fn record(&self) {
        let mut timestamps = self.timestamps.lock();
        self.prune_locked(&mut timestamps);
        timestamps.push_back(Instant::now());
    }

    pub fn len(&self) -> usize {
        let mut timestamps = self.timestamps.lock();
        self.prune_locked(&mut timestamps);
        timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_pruned_after_the_window_elapses() {
        let window = FailureWindow::new(Duration::from_millis(20));
        window.record();
        window.record();
        assert_eq!(window.len(), 2);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(window.len(), 0);
    }
}
