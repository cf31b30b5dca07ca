//! Shared test collaborators: an instrumented allocator and a tracked
//! element type.

#![allow(dead_code)]

use std::alloc::Layout;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::ptr::NonNull;

use allocator_api2::alloc::{AllocError, Allocator, Global};

/// Allocator that forwards to `Global` and records what it was asked for.
///
/// It can also be armed to refuse requests after a number of successful
/// allocations, which exercises the fallible push paths.
#[derive(Default)]
pub struct CountingAlloc {
    allocations: Cell<usize>,
    live: Cell<usize>,
    bytes: Cell<usize>,
    /// Allocations still allowed before every request fails
    remaining: Cell<Option<usize>>,
}

impl CountingAlloc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful allocations so far.
    pub fn allocations(&self) -> usize {
        self.allocations.get()
    }

    /// Allocations not yet returned.
    pub fn live(&self) -> usize {
        self.live.get()
    }

    /// Total bytes handed out over the allocator's lifetime.
    pub fn bytes(&self) -> usize {
        self.bytes.get()
    }

    /// Lets `count` more allocations succeed, then fails the rest.
    pub fn fail_after(&self, count: usize) {
        self.remaining.set(Some(count));
    }

    pub fn stop_failing(&self) {
        self.remaining.set(None);
    }
}

unsafe impl Allocator for CountingAlloc {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        if let Some(remaining) = self.remaining.get() {
            if remaining == 0 {
                return Err(AllocError);
            }
            self.remaining.set(Some(remaining - 1));
        }
        let ptr = Global.allocate(layout)?;
        self.allocations.set(self.allocations.get() + 1);
        self.live.set(self.live.get() + 1);
        self.bytes.set(self.bytes.get() + layout.size());
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.live.set(self.live.get() - 1);
        Global.deallocate(ptr, layout);
    }
}

thread_local! {
    static LIVE_IDS: RefCell<HashSet<u64>> = RefCell::new(HashSet::new());
    static NEXT_ID: Cell<u64> = const { Cell::new(0) };
}

/// Element type that registers itself while alive.
///
/// Dropping the same object twice panics.
#[derive(Debug)]
pub struct Tracked {
    id: u64,
    pub value: i32,
}

impl Tracked {
    pub fn new(value: i32) -> Self {
        let id = NEXT_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            id
        });
        LIVE_IDS.with(|ids| ids.borrow_mut().insert(id));
        Self { id, value }
    }
}

impl Clone for Tracked {
    fn clone(&self) -> Self {
        Self::new(self.value)
    }
}

impl PartialEq for Tracked {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        let was_live = LIVE_IDS.with(|ids| ids.borrow_mut().remove(&self.id));
        if !was_live {
            panic!("tracked object {} dropped twice", self.id);
        }
    }
}

/// Number of `Tracked` objects alive on this thread.
pub fn live_count() -> usize {
    LIVE_IDS.with(|ids| ids.borrow().len())
}
