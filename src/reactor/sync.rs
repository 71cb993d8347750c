//! Blocking pread/pwrite fallback reactor.
//!
//! No special kernel features required; works everywhere `io_uring` might
//! not (e.g. non-Linux, or the `io_uring` feature disabled). `submit`
//! performs the
//! operation immediately and queues its result; `reap` just drains that
//! queue, so this reactor offers no real overlap — at most one completion
//! is ever pending. That's a legitimate, if un-overlapped, implementation of
//! the [`super::CompletionReactor`] contract.

use super::{Completion, CompletionReactor, OperationKind};
use crate::error::BenchError;
use std::collections::VecDeque;
use std::os::unix::io::RawFd;
use std::time::Duration;

pub struct SyncReactor {
    ready: VecDeque<Completion>,
}

impl SyncReactor {
    pub fn new() -> Self {
        Self {
            ready: VecDeque::new(),
        }
    }
}

impl Default for SyncReactor {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionReactor for SyncReactor {
    fn submit(
        &mut self,
        handle: u64,
        fd: RawFd,
        kind: OperationKind,
        buffer: *mut u8,
        length: usize,
        offset: u64,
    ) -> Result<bool, BenchError> {
        let result = match kind {
            OperationKind::Read => unsafe {
                libc::pread(fd, buffer as *mut libc::c_void, length, offset as libc::off_t)
            },
            OperationKind::Write => unsafe {
                libc::pwrite(fd, buffer as *const libc::c_void, length, offset as libc::off_t)
            },
        };

        let result = if result < 0 {
            -(std::io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO) as i64)
        } else {
            result as i64
        };

        self.ready.push_back(Completion { handle, result });
        Ok(true)
    }

    fn reap(&mut self, batch: &mut Vec<Completion>, _timeout: Duration) -> Result<usize, BenchError> {
        let mut count = 0;
        while let Some(c) = self.ready.pop_front() {
            batch.push(c);
            count += 1;
        }
        Ok(count)
    }

    fn cancel_all(&mut self, _fd: RawFd) -> Result<(), BenchError> {
        // Every submission already completed synchronously; nothing to cancel.
        self.ready.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use std::os::unix::io::AsRawFd;
    use tempfile::NamedTempFile;

    #[test]
    fn submit_completes_immediately() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&vec![1u8; 4096]).unwrap();
        file.flush().unwrap();
        let fd = file.as_raw_fd();

        let mut reactor = SyncReactor::new();
        let mut buf = vec![0u8; 4096];
        reactor
            .submit(1, fd, OperationKind::Read, buf.as_mut_ptr(), 4096, 0)
            .unwrap();

        let mut batch = Vec::new();
        let n = reactor.reap(&mut batch, Duration::from_millis(0)).unwrap();
        assert_eq!(n, 1);
        assert_eq!(batch[0].result, 4096);
    }

    #[test]
    fn reap_with_nothing_submitted_returns_zero() {
        let mut reactor = SyncReactor::new();
        let mut batch = Vec::new();
        assert_eq!(reactor.reap(&mut batch, Duration::from_millis(1)).unwrap(), 0);
    }
}
