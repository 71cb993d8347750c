//! Completion reactor: a thin façade over an OS completion queue.
//!
//! A minimal engine trait narrowed to exactly the three operations the
//! trial executor's hot path needs: `submit`, `reap`, and `cancel_all`.
//! Completions are unordered; the only thing the executor needs out of a
//! completion is the handle that names the slot which submitted it (see
//! [`crate::slots::SlotPool::index_for_handle`]).

pub mod sync;
#[cfg(feature = "io_uring")]
pub mod io_uring;

use crate::error::BenchError;
use std::os::unix::io::RawFd;
use std::time::Duration;

/// The kind of operation a slot is submitted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Read,
    Write,
}

/// One drained completion.
#[derive(Debug, Clone, Copy)]
pub struct Completion {
    /// The opaque handle the submission was tagged with.
    pub handle: u64,
    /// Bytes transferred, or a negative value if the operation failed.
    pub result: i64,
}

/// A completion-queue façade. One instance is owned by a single executor
/// thread for the lifetime of a trial (or one per thread, when a workload
/// fans out across `thread_count` threads).
pub trait CompletionReactor {
    /// Submit a read or write. Non-blocking. A submission queue that is
    /// momentarily full returns `Ok(false)` ("try later"); the slot stays
    /// pending and the caller retries. Any other failure unwinds the
    /// slot's pending state and returns [`BenchError::IoSubmit`].
    fn submit(
        &mut self,
        handle: u64,
        fd: RawFd,
        kind: OperationKind,
        buffer: *mut u8,
        length: usize,
        offset: u64,
    ) -> Result<bool, BenchError>;

    /// Wait up to `timeout` for completions, appending them to `batch`.
    /// Returns the number drained (0 on timeout with nothing ready).
    fn reap(&mut self, batch: &mut Vec<Completion>, timeout: Duration) -> Result<usize, BenchError>;

    /// Best-effort cancellation of every outstanding operation on `fd`.
    fn cancel_all(&mut self, fd: RawFd) -> Result<(), BenchError>;
}
