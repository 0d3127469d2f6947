//! Fatal run errors.
//!
//! There is no partial-result or degraded-mode path: every variant here
//! aborts the whole composite computation. Callers see either a complete
//! composite result or one of these.

use std::io;

use thiserror::Error;

/// Result type for conductor-driven runs.
pub type Result<T> = std::result::Result<T, Error>;

/// A fatal condition observed during a run.
#[derive(Debug, Error)]
pub enum Error {
    /// A worker returned something other than the expected frame at an
    /// acknowledgment or completion point, or exited early. Once this
    /// happens the buffer-safety invariant can no longer be trusted, so
    /// the run is not salvageable.
    #[error("worker protocol violation: {0}")]
    Protocol(&'static str),

    /// A worker acknowledged a chunk while still holding its view of the
    /// slot, so the slot cannot be reused.
    #[error("buffer slot still referenced after the acknowledgment barrier")]
    SlotRetained,

    /// The input source failed with something other than end-of-stream.
    #[error("input read failed")]
    Read(#[source] io::Error),

    /// A run was configured with values that cannot work.
    #[error("invalid configuration: {0}")]
    Config(String),
}
