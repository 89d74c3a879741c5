//! Coarse completion reporting shared by all fetch tasks.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

/// Percentage step between progress log lines.
const LOG_STEP_PERCENT: usize = 5;

/// Counts completed companies and logs every 5%.
#[derive(Debug)]
pub struct Progress {
    total: usize,
    completed: AtomicUsize,
    /// Highest step already logged.
    logged_step: AtomicUsize,
    bar: Option<ProgressBar>,
}

impl Progress {
    pub fn new(total: usize, show_bar: bool) -> Self {
        let bar = show_bar.then(|| {
            let pb = ProgressBar::new(total as u64);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        });

        Self {
            total,
            completed: AtomicUsize::new(0),
            logged_step: AtomicUsize::new(0),
            bar,
        }
    }

    /// Record one finished company. Returns the running count.
    pub fn complete_one(&self) -> usize {
        let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(ref bar) = self.bar {
            bar.inc(1);
        }

        if self.total > 0 {
            let step = done * (100 / LOG_STEP_PERCENT) / self.total;
            let previous = self.logged_step.fetch_max(step, Ordering::SeqCst);
            if step > previous {
                info!(
                    "{}% complete ({}/{})",
                    step * LOG_STEP_PERCENT,
                    done,
                    self.total
                );
            }
        }

        done
    }

    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counts_every_completion() {
        let progress = Progress::new(40, false);
        for expected in 1..=40 {
            assert_eq!(progress.complete_one(), expected);
        }
        assert_eq!(progress.completed.load(Ordering::SeqCst), 40);
        assert_eq!(progress.logged_step.load(Ordering::SeqCst), 20);
    }

    #[tokio::test]
    async fn test_concurrent_completions() {
        let progress = Arc::new(Progress::new(200, false));
        let handles: Vec<_> = (0..200)
            .map(|_| {
                let progress = Arc::clone(&progress);
                tokio::spawn(async move { progress.complete_one() })
            })
            .collect();
        futures::future::join_all(handles).await;
        assert_eq!(progress.completed.load(Ordering::SeqCst), 200);
        progress.finish();
    }

    #[test]
    fn test_zero_total_does_not_divide() {
        let progress = Progress::new(0, false);
        assert_eq!(progress.complete_one(), 1);
    }
}
