#![forbid(unsafe_code)]

use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ActionError>;

/// Errors surfaced by the controller layer.
///
/// Failures inside queued units of work are deliberately not represented
/// here: they are caught at the queue boundary, logged, and skipped — the
/// queue's job is forward progress. A caller that needs to observe a work
/// failure encodes it in the unit's result type and checks it in the
/// completion continuation.
#[derive(Debug, Error)]
pub enum ActionError {
    /// `await_completion` hit its bound before the queue drained.
    #[error("queue did not drain within {waited:?}; a unit of work appears stuck")]
    AwaitTimeout { waited: Duration },

    /// The worker disappeared while awaiting quiescence.
    #[error("worker exited before the queue drained")]
    WorkerExited,
}
