use std::collections::BTreeSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::watch;

/// Single-flight action queue.
///
/// Actions mutate shared note state, so at most one runs at a time and they
/// run in the order they were enqueued. Tickets are handed out synchronously
/// in `enqueue`, which makes enqueue order the execution order even when the
/// returned futures are awaited from different tasks.
///
/// `cancel_pending` aborts every action that has not started yet; the one in
/// flight always runs to completion. Aborted actions resolve to
/// [`QueueError::Aborted`], which callers treat as an outcome rather than a
/// failure.

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("superseded before it could run")]
    Aborted,
}

pub struct ActionQueue {
    next_ticket: AtomicU64,
    cancel_below: AtomicU64,
    /// Next ticket allowed to start. Ticket n runs once every ticket below
    /// n has settled (finished, aborted, or been dropped).
    admit: watch::Sender<u64>,
    settled: Mutex<BTreeSet<u64>>,
}

impl ActionQueue {
    pub fn new() -> Self {
        let (admit, _) = watch::channel(0);
        ActionQueue {
            next_ticket: AtomicU64::new(0),
            cancel_below: AtomicU64::new(0),
            admit,
            settled: Mutex::new(BTreeSet::new()),
        }
    }

    /// Enqueue a task. The returned future resolves with the task's output
    /// once every earlier ticket has settled, or with `Aborted` when
    /// `cancel_pending` ran before the task started. Dropping the returned
    /// future gives up the ticket without running the task.
    pub fn enqueue<'a, F, T>(&'a self, task: F) -> impl Future<Output = Result<T, QueueError>> + 'a
    where
        F: Future<Output = T> + 'a,
    {
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
        let turn = Turn { queue: self, ticket };
        let mut admitted = self.admit.subscribe();

        async move {
            let _turn = turn;
            while *admitted.borrow_and_update() < ticket {
                if admitted.changed().await.is_err() {
                    return Err(QueueError::Aborted);
                }
            }
            if ticket < self.cancel_below.load(Ordering::SeqCst) {
                log::debug!(target: "kanri.queue", "ticket {} aborted before start", ticket);
                return Err(QueueError::Aborted);
            }
            Ok(task.await)
        }
    }

    /// Abort every queued task that has not started. The in-flight task, if
    /// any, is unaffected.
    pub fn cancel_pending(&self) {
        let horizon = self.next_ticket.load(Ordering::SeqCst);
        self.cancel_below.fetch_max(horizon, Ordering::SeqCst);
        log::debug!(target: "kanri.queue", "cancelled queued actions below ticket {}", horizon);
    }

    /// Wait until everything enqueued so far has settled.
    pub async fn drained(&self) {
        let _ = self.enqueue(async {}).await;
    }

    fn settle(&self, ticket: u64) {
        let mut settled = self.settled.lock().unwrap();
        settled.insert(ticket);
        self.admit.send_modify(|admit| {
            while settled.remove(admit) {
                *admit += 1;
            }
        });
    }
}

impl Default for ActionQueue {
    fn default() -> Self {
        ActionQueue::new()
    }
}

/// Settles its ticket when dropped, so a completed, aborted, or discarded
/// slot never blocks the tickets behind it.
struct Turn<'a> {
    queue: &'a ActionQueue,
    ticket: u64,
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        self.queue.settle(self.ticket);
    }
}
