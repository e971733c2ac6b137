#![forbid(unsafe_code)]

//! Controller-facing action layer.
//!
//! [`Controller`] gives the confined caller a uniform way to mutate
//! observable cells asynchronously while preserving the single-worker
//! ordering guarantee: every named action becomes one queued unit of
//! work. The model `M` is the application's state container, composed of
//! [`ObservableCell`]s; it is shared with the worker, hence
//! `M: Send + Sync`.
//!
//! # Invariants
//!
//! 1. Actions execute in strict submission order, one at a time.
//! 2. A single queued unit applies all of its cell writes; a failing unit
//!    produces none of its continuation side effects.
//! 3. `await_completion` resolves only after every previously queued unit
//!    has drained.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crate::error::{ActionError, Result};
use crate::queue::SerialTaskQueue;
use crate::reactive::ObservableCell;

/// Bound on [`Controller::await_completion`].
pub const AWAIT_COMPLETION_WAIT: Duration = Duration::from_secs(5);

/// Lifecycle of the lazily-created action queue.
enum QueueSlot<M> {
    /// No submission yet; the queue does not exist.
    Idle,
    /// Live queue carrying the shared model as its result type.
    Running(SerialTaskQueue<Arc<M>>),
    /// Shut down; further submissions are dropped.
    Down,
}

/// The action surface over a state container `M`.
///
/// Application controllers embed one of these and expose one named method
/// per user-facing action. All mutation of the model's cells flows
/// through here, so the presentation layer can never write state
/// directly.
///
/// ```
/// use taskcell::{Controller, ObservableCell};
///
/// struct Model {
///     counter: ObservableCell<i32>,
/// }
///
/// let controller = Controller::new(Model {
///     counter: ObservableCell::new(73),
/// });
/// controller.increase(&controller.model().counter);
/// controller.await_completion().unwrap();
/// assert_eq!(controller.model().counter.get(), 74);
/// # controller.shutdown();
/// ```
pub struct Controller<M> {
    model: Arc<M>,
    queue: Mutex<QueueSlot<M>>,
}

impl<M: Send + Sync + 'static> Controller<M> {
    /// Create a controller managing `model`.
    pub fn new(model: M) -> Self {
        Self {
            model: Arc::new(model),
            queue: Mutex::new(QueueSlot::Idle),
        }
    }

    /// The managed state container.
    #[must_use]
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Submit one unit of work plus continuation, creating the queue on
    /// first use.
    fn submit_action(
        &self,
        work: impl FnOnce() -> Arc<M> + Send + 'static,
        on_done: impl FnOnce(Arc<M>) + Send + 'static,
    ) {
        let mut slot = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        if let QueueSlot::Idle = &*slot {
            *slot = QueueSlot::Running(SerialTaskQueue::new());
        }
        match &*slot {
            QueueSlot::Running(queue) => queue.submit_then(work, on_done),
            _ => tracing::warn!("action submitted after shutdown; dropped"),
        }
    }

    /// Run `action` against the model, asynchronously, in strict
    /// submission order. The caller is never blocked.
    pub fn run_async(&self, action: impl FnOnce(&M) + Send + 'static) {
        let model = Arc::clone(&self.model);
        self.submit_action(
            move || {
                action(&model);
                model
            },
            |_| {},
        );
    }

    /// Run `after_all` once every unit queued so far has completed.
    pub fn run_later(&self, after_all: impl FnOnce(&M) + Send + 'static) {
        let model = Arc::clone(&self.model);
        self.submit_action(move || model, move |model| after_all(&model));
    }

    /// Block until the queue drains, bounded by [`AWAIT_COMPLETION_WAIT`].
    ///
    /// A testing affordance: it defeats the asynchrony every other entry
    /// point preserves, so calling it from application code is almost
    /// always wrong — register a listener instead. Returns
    /// [`ActionError::AwaitTimeout`] if the bound is exceeded, which
    /// means the queue is stuck or the bound is too small.
    pub fn await_completion(&self) -> Result<()> {
        let (reached_tx, reached_rx) = mpsc::channel();
        {
            let slot = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
            let QueueSlot::Running(queue) = &*slot else {
                // Nothing was ever queued, or the queue is already down.
                return Ok(());
            };
            let model = Arc::clone(&self.model);
            queue.submit(move || {
                let _ = reached_tx.send(());
                model
            });
        }
        match reached_rx.recv_timeout(AWAIT_COMPLETION_WAIT) {
            Ok(()) => Ok(()),
            Err(RecvTimeoutError::Timeout) => Err(ActionError::AwaitTimeout {
                waited: AWAIT_COMPLETION_WAIT,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(ActionError::WorkerExited),
        }
    }

    /// Stop scheduling and release the worker thread. Idempotent; actions
    /// submitted afterwards are dropped with a warning.
    pub fn shutdown(&self) {
        let slot = {
            let mut slot = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *slot, QueueSlot::Down)
        };
        if let QueueSlot::Running(queue) = slot {
            queue.shutdown();
        }
    }

    /// Read a cell's current value.
    #[must_use]
    pub fn get<V>(&self, cell: &ObservableCell<V>) -> V
    where
        V: Clone + PartialEq + Send + Sync + 'static,
    {
        cell.get()
    }

    /// Asynchronously replace a cell's value.
    ///
    /// Even a plain set is the controller's responsibility: no
    /// application code can reach the privileged write path directly.
    pub fn set_value<V>(&self, cell: &ObservableCell<V>, new_value: V)
    where
        V: Clone + PartialEq + Send + Sync + 'static,
    {
        let writer = cell.writer();
        self.run_async(move |_| writer.set(new_value));
    }

    /// Flip a boolean cell.
    pub fn toggle(&self, cell: &ObservableCell<bool>) {
        let writer = cell.writer();
        self.run_async(move |_| writer.set(!writer.get()));
    }

    /// Increment an integer cell by one.
    pub fn increase(&self, cell: &ObservableCell<i32>) {
        let writer = cell.writer();
        self.run_async(move |_| writer.set(writer.get() + 1));
    }

    /// Decrement an integer cell by one.
    pub fn decrease(&self, cell: &ObservableCell<i32>) {
        let writer = cell.writer();
        self.run_async(move |_| writer.set(writer.get() - 1));
    }

    /// Pause the action pipeline for `duration`.
    ///
    /// Later actions queue up behind the pause; the caller itself is not
    /// blocked.
    pub fn pause_execution(&self, duration: Duration) {
        self.run_async(move |_| thread::sleep(duration));
    }

    /// Apply several cell writes within one queued unit of work.
    ///
    /// Build each write with [`Setter::of`]. All writes land before any
    /// later-queued unit starts.
    pub fn update_model(&self, setters: Vec<Setter>) {
        self.run_async(move |_| {
            for setter in setters {
                (setter.apply)();
            }
        });
    }
}

/// One deferred cell write for [`Controller::update_model`], with the
/// value type erased.
pub struct Setter {
    apply: Box<dyn FnOnce() + Send>,
}

impl Setter {
    /// A deferred `cell = value` write.
    #[must_use]
    pub fn of<V>(cell: &ObservableCell<V>, value: V) -> Self
    where
        V: Clone + PartialEq + Send + Sync + 'static,
    {
        let writer = cell.writer();
        Self {
            apply: Box::new(move || writer.set(value)),
        }
    }
}
