use crate::queue::QueueError;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(250);

/// Debounces board refreshes. Note change events arrive in bursts (a sync
/// run touches many notes back to back); rebuilding the board for each one
/// wastes store reads, so only the latest request within the window runs.
///
/// Each request bumps a generation counter and then sleeps for the window.
/// Whoever wakes up with a stale generation resolves to `Aborted`; the
/// newest request runs its task. No timer tasks are spawned, so the
/// scheduler works on any runtime that provides `tokio::time`.
pub struct RefreshScheduler {
    window: Duration,
    generation: AtomicU64,
}

impl RefreshScheduler {
    pub fn new(window: Duration) -> Self {
        RefreshScheduler {
            window,
            generation: AtomicU64::new(0),
        }
    }

    /// Schedule `task` to run after the debounce window, unless a newer
    /// request arrives first.
    pub fn debounce<'a, F>(&'a self, task: F) -> impl Future<Output = Result<(), QueueError>> + 'a
    where
        F: Future<Output = ()> + 'a,
    {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            tokio::time::sleep(self.window).await;
            if self.generation.load(Ordering::SeqCst) != generation {
                log::trace!(target: "kanri.refresh", "refresh generation {} superseded", generation);
                return Err(QueueError::Aborted);
            }
            task.await;
            Ok(())
        }
    }
}

impl Default for RefreshScheduler {
    fn default() -> Self {
        RefreshScheduler::new(DEFAULT_DEBOUNCE_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_burst_runs_only_the_latest_request() {
        let scheduler = RefreshScheduler::new(Duration::from_millis(20));
        let runs = Arc::new(AtomicUsize::new(0));

        let count = |label: usize| {
            let runs = runs.clone();
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                assert_eq!(label, 3, "only the newest request may run");
            }
        };

        let first = scheduler.debounce(count(1));
        let second = scheduler.debounce(count(2));
        let third = scheduler.debounce(count(3));
        let (r1, r2, r3) = tokio::join!(first, second, third);

        assert_eq!(r1, Err(QueueError::Aborted));
        assert_eq!(r2, Err(QueueError::Aborted));
        assert_eq!(r3, Ok(()));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_spaced_requests_both_run() {
        let scheduler = RefreshScheduler::new(Duration::from_millis(5));
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let runs = runs.clone();
            let result = scheduler
                .debounce(async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                })
                .await;
            assert_eq!(result, Ok(()));
        }
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
