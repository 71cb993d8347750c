//! Optional global-allocator hook backing `Plan::track_allocations`.
//!
//! Follows the familiar snapshot/diff shape (take a reading, take another
//! later, subtract) but counts bytes allocated through the process's global
//! allocator instead of CPU/RSS — the zero-allocation guarantee a measured
//! phase is supposed to uphold is a correctness property, not a
//! resource-usage metric.
//!
//! Counting allocations process-wide requires *being* the process's
//! `#[global_allocator]`, which a library cannot install on a caller's
//! behalf. [`CountingAllocator`] is exported so an application that wants
//! `track_allocations` enforced installs it itself:
//!
//! ```ignore
//! #[global_allocator]
//! static ALLOCATOR: blockbench_core::alloc_tracking::CountingAllocator =
//!     blockbench_core::alloc_tracking::CountingAllocator::new();
//! ```
//!
//! Without that, [`snapshot`] always returns `0` and a trial's
//! `bytes_allocated` will read as `Some(0)` regardless of what actually
//! happened — harmless (it just means the warning never fires), but not a
//! substitute for installing the allocator in a binary that cares.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU64, Ordering};

static ALLOCATED_BYTES: AtomicU64 = AtomicU64::new(0);

/// Current cumulative byte count seen by [`CountingAllocator`], or `0` if
/// it was never installed as the process's global allocator.
pub fn snapshot() -> u64 {
    ALLOCATED_BYTES.load(Ordering::Relaxed)
}

/// A `GlobalAlloc` that forwards to [`System`] and tallies every
/// `alloc`/`alloc_zeroed`/`realloc` growth in a process-wide atomic counter.
#[derive(Debug, Default)]
pub struct CountingAllocator;

impl CountingAllocator {
    pub const fn new() -> Self {
        Self
    }
}

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        ALLOCATED_BYTES.fetch_add(layout.size() as u64, Ordering::Relaxed);
        System.alloc(layout)
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        ALLOCATED_BYTES.fetch_add(layout.size() as u64, Ordering::Relaxed);
        System.alloc_zeroed(layout)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout)
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if new_size > layout.size() {
            ALLOCATED_BYTES.fetch_add((new_size - layout.size()) as u64, Ordering::Relaxed);
        }
        System.realloc(ptr, layout, new_size)
    }
}
