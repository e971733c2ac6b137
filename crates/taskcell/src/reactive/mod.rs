#![forbid(unsafe_code)]

//! Observable state cells with change-gated multicast notification.
//!
//! - [`ObservableCell`]: a shared, single-value holder with listener
//!   callbacks. Application code reads and subscribes.
//! - [`CellWriter`]: the privileged write handle. Only the
//!   action-serialization layer can obtain one, so every mutation flows
//!   through the queued-action path.
//!
//! # Architecture
//!
//! `ObservableCell<V>` uses `Arc` shared ownership with an `RwLock`-held
//! value (writes happen on the background worker, reads anywhere) and a
//! mutex-held listener list. Dispatch snapshots the listener list and
//! holds no lock while invoking callbacks, so a listener may read the
//! cell or trigger reentrant privileged writes.
//!
//! # Invariants
//!
//! 1. A listener is invoked once with `(current, current)` at
//!    registration, before it can observe any real transition.
//! 2. Setting a value equal to the current value is a no-op (no
//!    notifications, stored value untouched).
//! 3. A real transition notifies listeners in registration order with
//!    `(old, new)`.
//! 4. A listener that moves the value on mid-dispatch supersedes the
//!    in-flight transition: remaining listeners never see the stale pair.

pub mod observable;

pub use observable::{CellWriter, ObservableCell};
