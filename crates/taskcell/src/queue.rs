#![forbid(unsafe_code)]

//! Strict-FIFO serialization of units of work onto one background worker.
//!
//! [`SerialTaskQueue`] accepts submissions from a confined caller and runs
//! them one at a time, in submission order, on a dedicated worker thread.
//! A unit of work is a zero-argument closure producing an `R`, paired with
//! a completion continuation consuming that `R`. New units may be
//! submitted while earlier ones are still running.
//!
//! # Invariants
//!
//! 1. At most one entry is executing at any instant (the busy flag).
//! 2. Entries start in exact FIFO submission order.
//! 3. An entry's continuation resolves (or is abandoned on failure)
//!    before the next entry's work begins.
//! 4. A failing entry never stalls the queue: panics and result-wait
//!    timeouts are caught, logged, and skipped.
//!
//! # Failure Modes
//!
//! Failures inside a unit of work are reported through `tracing` only and
//! never reach the submitting caller. A caller that needs to know a unit
//! failed encodes that in `R` and inspects it in the continuation.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Bound on the internal wait for a unit of work's result.
pub const DEFAULT_RESULT_WAIT: Duration = Duration::from_secs(5);

type Work<R> = Box<dyn FnOnce() -> R + Send>;
type OnDone<R> = Box<dyn FnOnce(R) + Send>;
type Job = Box<dyn FnOnce() + Send>;

/// One scheduling entry: a unit of work plus its completion continuation.
struct Entry<R> {
    work: Work<R>,
    on_done: OnDone<R>,
}

/// Messages sent to the worker thread.
enum WorkerMsg {
    /// Run a job on the worker.
    Run(Job),
    /// Exit the worker loop. Jobs already enqueued run first.
    Shutdown,
}

/// State shared between the submission path and the worker-side
/// completion step. These are the only two call sites that touch the
/// backlog and the busy flag.
struct Shared<R> {
    backlog: Mutex<VecDeque<Entry<R>>>,
    /// True while one entry's work/completion pair is in flight.
    busy: AtomicBool,
    worker: mpsc::Sender<WorkerMsg>,
    result_wait: Duration,
}

impl<R: Send + 'static> Shared<R> {
    /// Start the head of the backlog unless an entry is already in flight.
    ///
    /// Called from both trigger points: submission (owner thread) and the
    /// completion step (worker thread). The swap on `busy` guarantees the
    /// two never start entries concurrently.
    fn try_start(self: &Arc<Self>) {
        loop {
            if self
                .busy
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }

            let entry = self
                .backlog
                .lock()
                .expect("backlog mutex poisoned")
                .pop_front();

            match entry {
                Some(entry) => {
                    self.dispatch(entry);
                    return;
                }
                None => {
                    self.busy.store(false, Ordering::Release);
                    // A submission may have landed between the pop and the
                    // store; re-check so that entry is not stranded.
                    if self
                        .backlog
                        .lock()
                        .expect("backlog mutex poisoned")
                        .is_empty()
                    {
                        return;
                    }
                }
            }
        }
    }

    /// Hand one entry to the worker: the work job, then the completion
    /// step. The completion step clears `busy` and pulls the next entry.
    fn dispatch(self: &Arc<Self>, entry: Entry<R>) {
        let Entry { work, on_done } = entry;
        let (result_tx, result_rx) = mpsc::channel();

        let work_job: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(work));
            // Receiver is gone only mid-shutdown.
            let _ = result_tx.send(outcome);
        });

        let shared = Arc::clone(self);
        let completion_job: Job = Box::new(move || {
            match result_rx.recv_timeout(shared.result_wait) {
                Ok(Ok(result)) => {
                    if let Err(payload) =
                        panic::catch_unwind(AssertUnwindSafe(move || on_done(result)))
                    {
                        tracing::error!(
                            cause = panic_message(payload.as_ref()),
                            "completion continuation panicked; continuing with next entry"
                        );
                    }
                }
                Ok(Err(payload)) => {
                    tracing::error!(
                        cause = panic_message(payload.as_ref()),
                        "unit of work panicked; continuation skipped"
                    );
                }
                Err(RecvTimeoutError::Timeout) => {
                    tracing::error!(
                        wait = ?shared.result_wait,
                        "unit of work produced no result within the bound; continuation skipped"
                    );
                }
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::error!("unit of work dropped without a result; continuation skipped");
                }
            }
            shared.busy.store(false, Ordering::Release);
            shared.try_start();
        });

        // Both jobs go through the same FIFO channel, so the pair stays
        // adjacent and ordered on the worker.
        if self.worker.send(WorkerMsg::Run(work_job)).is_err() {
            tracing::warn!("submission after shutdown; entry dropped");
            self.busy.store(false, Ordering::Release);
            return;
        }
        let _ = self.worker.send(WorkerMsg::Run(completion_job));
    }
}

/// Strict-FIFO task queue over one background worker thread.
///
/// Submissions are expected from a single confined caller, typically the
/// thread that created the queue. The backlog/flag pair is nevertheless
/// safe under the submission/completion race inherent to the design, so
/// concurrent submitters do not corrupt the queue; their relative order is
/// simply whatever the backlog sees.
///
/// ```
/// use taskcell::SerialTaskQueue;
///
/// let queue = SerialTaskQueue::new();
/// queue.submit_then(|| 2 + 2, |sum| assert_eq!(sum, 4));
/// queue.shutdown();
/// ```
pub struct SerialTaskQueue<R> {
    shared: Arc<Shared<R>>,
    handle: Option<JoinHandle<()>>,
}

impl<R: Send + 'static> SerialTaskQueue<R> {
    /// Create a queue with the default result wait.
    #[must_use]
    pub fn new() -> Self {
        Self::with_result_wait(DEFAULT_RESULT_WAIT)
    }

    /// Create a queue with a custom bound on the internal wait for each
    /// unit of work's result.
    #[must_use]
    pub fn with_result_wait(result_wait: Duration) -> Self {
        let (tx, rx) = mpsc::channel::<WorkerMsg>();
        let handle = thread::Builder::new()
            .name("taskcell-worker".into())
            .spawn(move || worker_loop(rx))
            .expect("failed to spawn worker thread");

        Self {
            shared: Arc::new(Shared {
                backlog: Mutex::new(VecDeque::new()),
                busy: AtomicBool::new(false),
                worker: tx,
                result_wait,
            }),
            handle: Some(handle),
        }
    }

    /// Submit a unit of work with a no-op completion continuation.
    pub fn submit(&self, work: impl FnOnce() -> R + Send + 'static) {
        self.submit_then(work, |_| {});
    }

    /// Submit a unit of work and a continuation for its result.
    ///
    /// Returns immediately. The work runs exactly once on the worker; the
    /// continuation receives the result exactly once, after the work
    /// finishes within the configured bound. For submissions A then B,
    /// A's continuation has fully returned before B's work begins.
    pub fn submit_then(
        &self,
        work: impl FnOnce() -> R + Send + 'static,
        on_done: impl FnOnce(R) + Send + 'static,
    ) {
        self.shared
            .backlog
            .lock()
            .expect("backlog mutex poisoned")
            .push_back(Entry {
                work: Box::new(work),
                on_done: Box::new(on_done),
            });
        self.shared.try_start();
    }

    /// Stop the worker. Jobs already handed to the worker run first;
    /// backlog entries not yet started are abandoned.
    pub fn shutdown(mut self) {
        // Consume self so no further submissions are possible. Take the
        // handle before Drop runs so we join exactly once.
        let _ = self.shared.worker.send(WorkerMsg::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl<R: Send + 'static> Default for SerialTaskQueue<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Drop for SerialTaskQueue<R> {
    fn drop(&mut self) {
        // Best-effort shutdown if the caller forgot to call shutdown().
        let _ = self.shared.worker.send(WorkerMsg::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// The worker's main loop. Runs jobs in arrival order until shutdown.
fn worker_loop(rx: mpsc::Receiver<WorkerMsg>) {
    loop {
        match rx.recv() {
            Ok(WorkerMsg::Run(job)) => job(),
            Ok(WorkerMsg::Shutdown) | Err(_) => return,
        }
    }
}

/// Best-effort extraction of a panic payload's message.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Submit a sentinel entry and block until the queue reaches it.
    fn drain(queue: &SerialTaskQueue<i32>) {
        let (reached_tx, reached_rx) = mpsc::channel();
        queue.submit(move || {
            let _ = reached_tx.send(());
            0
        });
        reached_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("queue did not drain");
    }

    #[test]
    fn fifo_order_with_uneven_delays() {
        let queue = SerialTaskQueue::new();
        let collected = Arc::new(Mutex::new(Vec::new()));

        for i in 0..10 {
            let collected = Arc::clone(&collected);
            queue.submit_then(
                move || {
                    // Force some thread switching to make the test realistic.
                    thread::sleep(Duration::from_millis(((i * 7) % 13) as u64));
                    i
                },
                move |result| collected.lock().unwrap().push(result),
            );
        }
        drain(&queue);

        let expected: Vec<i32> = (0..10).collect();
        assert_eq!(*collected.lock().unwrap(), expected);
    }

    #[test]
    fn no_loss_under_many_quick_tasks() {
        let queue = SerialTaskQueue::new();
        let collected = Arc::new(Mutex::new(Vec::new()));

        for i in 0..100 {
            let collected = Arc::clone(&collected);
            queue.submit_then(move || i, move |result| collected.lock().unwrap().push(result));
        }
        drain(&queue);

        assert_eq!(collected.lock().unwrap().len(), 100);
    }

    #[test]
    fn continuation_resolves_before_next_work_begins() {
        let queue = SerialTaskQueue::new();
        let events = Arc::new(Mutex::new(Vec::new()));

        for label in ["a", "b", "c"] {
            let work_events = Arc::clone(&events);
            let done_events = Arc::clone(&events);
            queue.submit_then(
                move || {
                    work_events.lock().unwrap().push(format!("work-{label}"));
                    0
                },
                move |_| done_events.lock().unwrap().push(format!("done-{label}")),
            );
        }
        drain(&queue);

        assert_eq!(
            *events.lock().unwrap(),
            vec!["work-a", "done-a", "work-b", "done-b", "work-c", "done-c"]
        );
    }

    #[test]
    fn panicking_work_skips_continuation_and_not_the_queue() {
        let queue = SerialTaskQueue::new();
        let collected = Arc::new(Mutex::new(Vec::new()));

        let poisoned = Arc::clone(&collected);
        queue.submit_then(
            || panic!("boom"),
            move |result| poisoned.lock().unwrap().push(result),
        );

        let healthy = Arc::clone(&collected);
        queue.submit_then(move || 42, move |result| healthy.lock().unwrap().push(result));
        drain(&queue);

        // The failed unit's continuation never ran; the next unit did.
        assert_eq!(*collected.lock().unwrap(), vec![42]);
    }

    #[test]
    fn panicking_continuation_does_not_stall_the_queue() {
        let queue = SerialTaskQueue::new();
        let collected = Arc::new(Mutex::new(Vec::new()));

        queue.submit_then(|| 1, |_| panic!("continuation boom"));

        let healthy = Arc::clone(&collected);
        queue.submit_then(move || 2, move |result| healthy.lock().unwrap().push(result));
        drain(&queue);

        assert_eq!(*collected.lock().unwrap(), vec![2]);
    }

    #[test]
    fn submit_without_continuation_still_runs_work() {
        let queue = SerialTaskQueue::new();
        let ran = Arc::new(Mutex::new(false));

        let flag = Arc::clone(&ran);
        queue.submit(move || {
            *flag.lock().unwrap() = true;
            0
        });
        drain(&queue);

        assert!(*ran.lock().unwrap());
    }

    #[test]
    fn shutdown_joins_cleanly() {
        let queue = SerialTaskQueue::new();
        queue.submit(|| 1);
        queue.shutdown();
    }

    #[test]
    fn drop_triggers_shutdown() {
        let queue = SerialTaskQueue::new();
        queue.submit(|| 1);
        // Drop without calling shutdown() — must not hang or panic.
        drop(queue);
    }

    #[test]
    fn custom_result_wait_is_honored_on_the_happy_path() {
        let queue = SerialTaskQueue::with_result_wait(Duration::from_millis(250));
        let collected = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&collected);
        queue.submit_then(move || 7, move |result| sink.lock().unwrap().push(result));
        drain(&queue);

        assert_eq!(*collected.lock().unwrap(), vec![7]);
    }
}
