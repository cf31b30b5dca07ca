//! Two growable sequence containers built on a shared raw-buffer layer.
//!
//! - [`Devector`]: a contiguous vector with amortized O(1) push at both the
//!   front and the back.
//! - [`SegmentedStack`]: an append-only vector made of power-of-two buckets.
//!   Pushing never moves existing elements, so pointers to them stay valid,
//!   and indexing is O(1).
//!
//! Both containers are generic over an [`allocator_api2`] allocator.
//!
//! # Example
//!
//! ```
//! use devector::{Devector, SegmentedStack};
//!
//! let mut dv: Devector<i32> = Devector::new();
//! dv.push_back(2);
//! dv.push_front(1);
//! assert_eq!(dv.as_slice(), &[1, 2]);
//!
//! let mut stack: SegmentedStack<i32> = SegmentedStack::new();
//! stack.push_back(1);
//!
//! // Get a pointer to the first element
//! let ptr = &stack[0] as *const i32;
//!
//! // Push more elements - the pointer remains valid!
//! for i in 2..100 {
//!     stack.push_back(i);
//! }
//!
//! assert_eq!(unsafe { *ptr }, 1);
//! assert_eq!(stack.end() - stack.begin(), 99);
//! ```

mod cursor;
mod devector;
mod iter;
mod policy;
mod raw_buffer;
mod relocate;
mod stack;

pub use cursor::Cursor;
pub use devector::Devector;
pub use iter::{DevectorIntoIter, IntoIter, Iter, IterMut};
pub use policy::GrowthPolicy;
pub use stack::{bucket_location, SegmentedStack};

use std::alloc::Layout;

/// The error type for fallible pushes and allocations.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TryReserveError {
    kind: TryReserveErrorKind,
}

#[derive(Clone, PartialEq, Eq, Debug)]
enum TryReserveErrorKind {
    /// The capacity computation overflowed.
    CapacityOverflow,
    /// Memory allocation failed.
    AllocError { layout: Layout },
}

impl std::fmt::Display for TryReserveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            TryReserveErrorKind::CapacityOverflow => {
                write!(f, "memory allocation failed due to capacity overflow")
            }
            TryReserveErrorKind::AllocError { layout } => {
                write!(f, "memory allocation of {} bytes failed", layout.size())
            }
        }
    }
}

impl std::error::Error for TryReserveError {}

impl TryReserveError {
    pub(crate) fn capacity_overflow() -> Self {
        Self {
            kind: TryReserveErrorKind::CapacityOverflow,
        }
    }

    pub(crate) fn alloc_error(layout: Layout) -> Self {
        Self {
            kind: TryReserveErrorKind::AllocError { layout },
        }
    }

    /// Returns the layout of the failed allocation, if the failure came from
    /// the allocator rather than from a capacity overflow.
    pub fn layout(&self) -> Option<Layout> {
        match self.kind {
            TryReserveErrorKind::CapacityOverflow => None,
            TryReserveErrorKind::AllocError { layout } => Some(layout),
        }
    }

    /// Diverges the way the infallible push methods report failure.
    #[cold]
    #[inline(never)]
    pub(crate) fn handle(self) -> ! {
        match self.kind {
            TryReserveErrorKind::CapacityOverflow => panic!("capacity overflow"),
            TryReserveErrorKind::AllocError { layout } => std::alloc::handle_alloc_error(layout),
        }
    }
}
