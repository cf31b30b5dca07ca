//! Raw buffer allocation shared by `Devector` and `SegmentedStack`.
//!
//! This module handles low-level memory allocation for both containers,
//! similar to how `RawVec` works for `Vec` in the standard library. A buffer
//! never constructs or drops elements; that is the owner's job.

use std::alloc::Layout;
use std::ptr::NonNull;

use allocator_api2::alloc::Allocator;

use crate::TryReserveError;

/// One contiguous allocation of `capacity` uninitialized `T` slots.
///
/// The buffer does not remember its allocator. The owning container keeps a
/// single allocator and hands it to [`allocate`](Self::allocate) and
/// [`deallocate`](Self::deallocate), which lets a stack share one allocator
/// across all of its buckets.
pub(crate) struct RawBuffer<T> {
    ptr: NonNull<T>,
    capacity: usize,
}

impl<T> RawBuffer<T> {
    /// Whether T is a zero-sized type
    pub(crate) const IS_ZST: bool = std::mem::size_of::<T>() == 0;

    /// A buffer that owns no memory.
    ///
    /// Zero-sized types never need memory, so their empty buffer already has
    /// unbounded capacity.
    #[inline]
    pub(crate) const fn empty() -> Self {
        Self {
            ptr: NonNull::dangling(),
            capacity: if Self::IS_ZST { usize::MAX } else { 0 },
        }
    }

    /// Allocates room for `capacity` elements.
    ///
    /// Zero-sized types and `capacity == 0` never reach the allocator.
    pub(crate) fn allocate<A: Allocator>(
        alloc: &A,
        capacity: usize,
    ) -> Result<Self, TryReserveError> {
        if Self::IS_ZST || capacity == 0 {
            return Ok(Self {
                ptr: NonNull::dangling(),
                capacity,
            });
        }

        let layout =
            Layout::array::<T>(capacity).map_err(|_| TryReserveError::capacity_overflow())?;
        if layout.size() > isize::MAX as usize {
            return Err(TryReserveError::capacity_overflow());
        }

        match alloc.allocate(layout) {
            Ok(ptr) => Ok(Self {
                ptr: ptr.cast(),
                capacity,
            }),
            Err(_) => {
                log::debug!("allocation of {} bytes failed", layout.size());
                Err(TryReserveError::alloc_error(layout))
            }
        }
    }

    /// Returns the memory to `alloc`.
    ///
    /// # Safety
    ///
    /// `alloc` must be the allocator this buffer was allocated with, and every
    /// element constructed in the buffer must already be dropped or moved out.
    pub(crate) unsafe fn deallocate<A: Allocator>(self, alloc: &A) {
        if Self::IS_ZST || self.capacity == 0 {
            return;
        }
        // The layout was valid when allocating, so it is valid now.
        let layout = Layout::array::<T>(self.capacity).unwrap_unchecked();
        alloc.deallocate(self.ptr.cast(), layout);
    }

    /// Start of the buffer.
    #[inline]
    pub(crate) const fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Number of element slots.
    #[inline]
    pub(crate) const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns a pointer to slot `offset`.
    ///
    /// # Safety
    ///
    /// `offset` must not exceed `capacity`.
    #[inline]
    pub(crate) unsafe fn slot(&self, offset: usize) -> *mut T {
        debug_assert!(Self::IS_ZST || offset <= self.capacity);
        self.ptr.as_ptr().add(offset)
    }
}
