//! Bulk element relocation and destruction.
//!
//! A Rust move is always a bitwise copy that leaves the source logically
//! uninitialized, so every element type is trivially relocatable. Relocation
//! is one `memmove` for all `T`; destruction compiles away entirely for types
//! without drop glue.

use std::ptr;

/// Moves `count` live elements from `src` to `dst`.
///
/// After the call the source slots are dead: they must not be read or dropped
/// again. The ranges may overlap, as happens when a devector shifts its
/// contents inside its own buffer; `ptr::copy` picks the copy direction so
/// that no unread source slot is overwritten first.
///
/// # Safety
///
/// - `src..src + count` must hold initialized elements.
/// - `dst..dst + count` must be valid for writes and must not hold live
///   elements outside the source range.
#[inline]
pub(crate) unsafe fn relocate<T>(src: *const T, dst: *mut T, count: usize) {
    if count == 0 || ptr::eq(src, dst) {
        return;
    }
    ptr::copy(src, dst, count);
}

/// Drops `count` live elements starting at `first`.
///
/// A no-op when `T` has no drop glue.
///
/// # Safety
///
/// `first..first + count` must hold initialized elements that are not used
/// again afterwards.
#[inline]
pub(crate) unsafe fn destroy_range<T>(first: *mut T, count: usize) {
    if std::mem::needs_drop::<T>() && count > 0 {
        ptr::drop_in_place(ptr::slice_from_raw_parts_mut(first, count));
    }
}
