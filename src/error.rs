//! Error types for the benchmark core.
//!
//! [`BenchError`] is the public error currency for every fallible operation
//! in this crate. Internal glue code that talks to `libc`/`io_uring` directly
//! uses `anyhow::Context` to decorate raw OS errors before folding them into
//! the appropriate variant here, but no public function signature returns a
//! bare `anyhow::Error`.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while validating, preparing, or executing a benchmark.
#[derive(Debug, Error)]
pub enum BenchError {
    /// A `Plan` failed validation before any I/O was attempted.
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    /// A `Workload` is internally inconsistent (alignment, region sizing).
    #[error("invalid workload {name:?}: {reason}")]
    InvalidWorkload { name: String, reason: String },

    /// The file preparer could not bring a target file to the required state.
    #[error("failed to prepare {path}: {source}")]
    PrepareFailed {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// Submitting an operation to the completion reactor failed.
    #[error("io submission failed: {0}")]
    IoSubmit(#[source] anyhow::Error),

    /// Reaping completions from the reactor failed.
    #[error("io completion reap failed: {0}")]
    IoReap(#[source] anyhow::Error),

    /// An outstanding operation was aborted (non-fatal during drain).
    #[error("io operation aborted")]
    IoAborted,

    /// The run was cancelled by the caller.
    #[error("benchmark run was cancelled")]
    Cancelled,

    /// Drain did not complete within its bound; the trial result is still
    /// emitted, so this is carried as a warning rather than returned as an
    /// error in practice. Kept as a variant so callers that want to treat it
    /// as fatal can match on it explicitly.
    #[error("drain did not complete within the timeout")]
    DrainTimeout,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BenchError>;
