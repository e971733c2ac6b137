#![forbid(unsafe_code)]

//! The observable cell and its privileged write handle.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

type Listener<V> = Arc<dyn Fn(&V, &V) + Send + Sync>;

/// Shared interior for a cell and all of its handles.
struct CellInner<V> {
    value: RwLock<V>,
    listeners: Mutex<Vec<Listener<V>>>,
}

/// A single observable value with change-gated multicast notification.
///
/// Cloning an `ObservableCell` creates a new handle to the **same** value.
/// Application code can read and subscribe; mutation is reserved to the
/// action-serialization layer through [`CellWriter`].
///
/// A cell lives as long as any handle to it; there is no individual
/// listener deregistration — listeners share the cell's lifetime.
pub struct ObservableCell<V> {
    inner: Arc<CellInner<V>>,
}

impl<V> Clone for ObservableCell<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: std::fmt::Debug> std::fmt::Debug for ObservableCell<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = self
            .inner
            .value
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("ObservableCell")
            .field("value", &*value)
            .finish()
    }
}

impl<V: std::fmt::Display> std::fmt::Display for ObservableCell<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = self
            .inner
            .value
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        write!(f, "{}", &*value)
    }
}

impl<V: Clone + PartialEq + Send + Sync + 'static> ObservableCell<V> {
    /// Create a cell holding `initial`.
    #[must_use]
    pub fn new(initial: V) -> Self {
        Self {
            inner: Arc::new(CellInner {
                value: RwLock::new(initial),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Current value. Callable from any thread; always a fresh read of
    /// the most recent write.
    #[must_use]
    pub fn get(&self) -> V {
        self.inner
            .value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Register a listener and immediately invoke it once with
    /// `(current, current)`.
    ///
    /// On every later transition the listener receives
    /// `(old_value, new_value)`, synchronously, on the thread that
    /// performed the write. Marshaling onto a presentation-specific
    /// thread is the listener's own responsibility.
    pub fn on_change(&self, listener: impl Fn(&V, &V) + Send + Sync + 'static) {
        let listener: Listener<V> = Arc::new(listener);
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&listener));
        let current = self.get();
        listener(&current, &current);
    }

    /// The privileged mutation capability for this cell.
    ///
    /// Crate-internal: only the controller layer mints writers, keeping
    /// every mutation on the queued-action path.
    pub(crate) fn writer(&self) -> CellWriter<V> {
        CellWriter {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// The privileged write handle of an [`ObservableCell`].
///
/// Not obtainable by application code; the action-serialization layer
/// holds these and applies writes inside queued units of work. Cloning
/// shares the same cell.
pub struct CellWriter<V> {
    inner: Arc<CellInner<V>>,
}

impl<V> Clone for CellWriter<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Clone + PartialEq + Send + Sync + 'static> CellWriter<V> {
    /// Current value, for read-modify-write mutators.
    #[must_use]
    pub fn get(&self) -> V {
        self.inner
            .value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the value, notifying listeners only if it actually changed.
    ///
    /// Equal values are a defined no-op. Listeners run synchronously on
    /// the calling thread, in registration order, with no cell lock held,
    /// so a listener may read the cell or trigger further privileged
    /// writes. Before each listener's turn the current value is re-read;
    /// once the value has moved on, the superseded transition is no
    /// longer delivered.
    pub fn set(&self, new_value: V) {
        let old_value = {
            let mut value = self
                .inner
                .value
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if *value == new_value {
                return;
            }
            std::mem::replace(&mut *value, new_value.clone())
        };

        let listeners: Vec<Listener<V>> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for listener in listeners {
            let still_current = {
                let value = self
                    .inner
                    .value
                    .read()
                    .unwrap_or_else(PoisonError::into_inner);
                *value == new_value
            };
            if still_current {
                listener(&old_value, &new_value);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
