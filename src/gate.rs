//! Process-wide request rate gate.
//!
//! Bounds outbound request issuance to at most `occurrences` within any
//! sliding window of `time_unit`. Waiters are served in arrival order.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::trace;

/// Sliding-window rate gate shared by all fetch tasks.
#[derive(Debug)]
pub struct RateGate {
    occurrences: usize,
    time_unit: Duration,
    /// Issue times of the most recent permits, oldest first.
    issued: Mutex<VecDeque<Instant>>,
}

impl RateGate {
    /// Create a gate allowing `occurrences` permits per `time_unit`.
    ///
    /// A zero `occurrences` is treated as one.
    pub fn new(occurrences: usize, time_unit: Duration) -> Self {
        let occurrences = occurrences.max(1);
        Self {
            occurrences,
            time_unit,
            issued: Mutex::new(VecDeque::with_capacity(occurrences)),
        }
    }

    /// Permits per time unit.
    pub fn occurrences(&self) -> usize {
        self.occurrences
    }

    /// Length of the sliding window.
    pub fn time_unit(&self) -> Duration {
        self.time_unit
    }

    /// Wait until a permit is available, then consume it.
    ///
    /// Returns the instant the permit was issued.
    ///
    /// The lock is held across the sleep so permits go out strictly in
    /// the order callers arrived (tokio's mutex is FIFO).
    pub async fn wait_to_proceed(&self) -> Instant {
        let mut issued = self.issued.lock().await;

        if issued.len() >= self.occurrences {
            if let Some(&oldest) = issued.front() {
                let ready_at = oldest + self.time_unit;
                let now = Instant::now();
                if ready_at > now {
                    trace!("Rate gate full, waiting {:?}", ready_at.duration_since(now));
                    sleep_until(ready_at).await;
                }
            }
        }

        let now = Instant::now();
        while let Some(&front) = issued.front() {
            if now.duration_since(front) >= self.time_unit {
                issued.pop_front();
            } else {
                break;
            }
        }
        issued.push_back(now);
        now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_burst_within_capacity_is_immediate() {
        let gate = RateGate::new(5, Duration::from_secs(10));
        let start = Instant::now();
        for _ in 0..5 {
            gate.wait_to_proceed().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_excess_requests_wait_for_window() {
        let gate = RateGate::new(2, Duration::from_millis(200));
        let start = Instant::now();
        for _ in 0..5 {
            gate.wait_to_proceed().await;
        }
        // Permits 3-4 wait one window, permit 5 waits a second one.
        assert!(start.elapsed() >= Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_concurrent_issuance_never_exceeds_rate() {
        let occurrences = 3;
        let window = Duration::from_millis(100);
        let gate = Arc::new(RateGate::new(occurrences, window));

        let handles: Vec<_> = (0..12)
            .map(|_| {
                let gate = Arc::clone(&gate);
                tokio::spawn(async move { gate.wait_to_proceed().await })
            })
            .collect();

        let mut stamps = Vec::new();
        for handle in handles {
            stamps.push(tokio_test::assert_ok!(handle.await));
        }
        stamps.sort();

        // Any occurrences+1 consecutive permits must span at least one window.
        for run in stamps.windows(occurrences + 1) {
            let span = run[occurrences].duration_since(run[0]);
            assert!(span >= window, "window violated: {:?}", span);
        }
    }

    #[test]
    fn test_zero_occurrences_clamped() {
        let gate = RateGate::new(0, Duration::from_secs(1));
        assert_eq!(gate.occurrences(), 1);
        assert_eq!(gate.time_unit(), Duration::from_secs(1));
    }
}
