//! Append-only segmented storage with stable element addresses.

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};
use std::ptr::NonNull;

use allocator_api2::alloc::{Allocator, Global};

use crate::cursor::Cursor;
use crate::iter::{IntoIter, Iter, IterMut};
use crate::raw_buffer::RawBuffer;
use crate::relocate::destroy_range;
use crate::TryReserveError;

/// Maximum number of buckets.
/// Bucket `k` holds `2^k` elements, so 64 buckets cover the address space.
pub(crate) const MAX_BUCKETS: usize = usize::BITS as usize;

/// Returns `(bucket, offset)` for the element at `index`.
///
/// Bucket `k` holds `2^k` elements and starts at index `2^k - 1`, so the
/// bucket is the position of the highest set bit of `index + 1`. This is a
/// single bit-scan instruction, not a search.
///
/// # Example
///
/// ```
/// use devector::bucket_location;
///
/// assert_eq!(bucket_location(0), (0, 0));
/// assert_eq!(bucket_location(1), (1, 0));
/// assert_eq!(bucket_location(2), (1, 1));
/// assert_eq!(bucket_location(999), (9, 488));
/// ```
#[inline]
pub fn bucket_location(index: usize) -> (usize, usize) {
    debug_assert!(index < usize::MAX);
    let biased = index + 1;
    let bucket = biased.ilog2();
    (bucket as usize, biased ^ (1usize << bucket))
}

/// Linear index of the first element of `bucket`.
#[inline]
pub(crate) const fn bucket_start(bucket: usize) -> usize {
    (1usize << bucket) - 1
}

/// Capacity of `bucket`.
#[inline]
pub(crate) const fn bucket_capacity(bucket: usize) -> usize {
    1usize << bucket
}

/// An append-only vector with stable pointers.
///
/// `SegmentedStack` stores elements in buckets of 1, 2, 4, 8, ... slots.
/// When the last bucket is full a new one of twice the size is allocated;
/// existing buckets are never moved, resized or freed until the stack is
/// dropped. Pushing therefore never invalidates references to earlier
/// elements, and indexing locates the bucket with one bit scan.
///
/// # Example
///
/// ```
/// use devector::SegmentedStack;
///
/// let mut stack: SegmentedStack<u32> = SegmentedStack::new();
/// for i in 0..1000 {
///     stack.push_back(i);
/// }
/// assert_eq!(stack[999], 999);
/// assert_eq!(stack.end() - stack.begin(), 1000);
/// ```
pub struct SegmentedStack<T, A: Allocator = Global> {
    /// Buckets `0..allocated_buckets` are allocated
    buckets: [RawBuffer<T>; MAX_BUCKETS],
    allocated_buckets: usize,
    /// Number of initialized elements
    len: usize,
    /// Cached pointer to the next write position (for fast push)
    write_ptr: *mut T,
    /// Pointer to the end of the last bucket
    bucket_end: *mut T,
    alloc: A,
    /// Marker for drop check
    _marker: PhantomData<T>,
}

impl<T> SegmentedStack<T> {
    /// Creates a new empty `SegmentedStack`.
    ///
    /// Does not allocate until elements are pushed.
    #[inline]
    pub fn new() -> Self {
        Self::new_in(Global)
    }
}

impl<T, A: Allocator> SegmentedStack<T, A> {
    /// Creates a new empty `SegmentedStack` using `alloc`.
    pub fn new_in(alloc: A) -> Self {
        Self {
            buckets: std::array::from_fn(|_| RawBuffer::empty()),
            allocated_buckets: 0,
            len: 0,
            write_ptr: std::ptr::null_mut(),
            bucket_end: std::ptr::null_mut(),
            alloc,
            _marker: PhantomData,
        }
    }

    /// Returns the number of elements.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the stack contains no elements.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of buckets holding elements.
    #[inline]
    pub fn bucket_count(&self) -> usize {
        if RawBuffer::<T>::IS_ZST {
            // Zero-sized elements never allocate; their buckets are virtual.
            match self.len {
                0 => 0,
                len => bucket_location(len - 1).0 + 1,
            }
        } else {
            self.allocated_buckets
        }
    }

    /// Returns a reference to the underlying allocator.
    #[inline]
    pub const fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Appends an element.
    ///
    /// Never moves existing elements.
    ///
    /// # Panics
    ///
    /// Panics if allocation fails.
    #[inline]
    pub fn push_back(&mut self, value: T) {
        // Fast path: we have space in the current bucket
        if self.write_ptr < self.bucket_end {
            unsafe { self.write_fast(value) };
            return;
        }

        // Slow path: need a new bucket
        if let Err(err) = self.push_slow(value) {
            err.handle();
        }
    }

    /// Appends an element, reporting allocation failure instead of
    /// panicking.
    ///
    /// On failure `value` is dropped and the stack is unchanged.
    pub fn try_push_back(&mut self, value: T) -> Result<(), TryReserveError> {
        if self.write_ptr < self.bucket_end {
            unsafe { self.write_fast(value) };
            return Ok(());
        }
        self.push_slow(value)
    }

    /// # Safety
    ///
    /// `write_ptr` must be below `bucket_end`.
    #[inline]
    unsafe fn write_fast(&mut self, value: T) {
        std::ptr::write(self.write_ptr, value);
        self.write_ptr = self.write_ptr.add(1);
        self.len += 1;
    }

    #[cold]
    #[inline(never)]
    fn push_slow(&mut self, value: T) -> Result<(), TryReserveError> {
        if RawBuffer::<T>::IS_ZST {
            if self.len == usize::MAX - 1 {
                return Err(TryReserveError::capacity_overflow());
            }
            // For ZST, write to dangling pointer (no-op for memory, but consumes value)
            unsafe { std::ptr::write(NonNull::<T>::dangling().as_ptr(), value) };
            self.len += 1;
            return Ok(());
        }

        let next = self.allocated_buckets;
        if next == MAX_BUCKETS {
            return Err(TryReserveError::capacity_overflow());
        }
        let bucket = RawBuffer::allocate(&self.alloc, bucket_capacity(next))?;
        log::trace!(
            "segmented stack: bucket {} allocated with {} slots, len {}",
            next,
            bucket.capacity(),
            self.len
        );

        unsafe {
            let base = bucket.as_ptr();
            std::ptr::write(base, value);
            self.write_ptr = base.add(1);
            self.bucket_end = base.add(bucket.capacity());
        }
        self.buckets[next] = bucket;
        self.allocated_buckets += 1;
        self.len += 1;
        Ok(())
    }

    /// Returns a pointer to the start of `bucket`.
    ///
    /// # Safety
    ///
    /// `bucket` must be less than `bucket_count()`.
    #[inline]
    pub(crate) unsafe fn bucket_ptr(&self, bucket: usize) -> *mut T {
        debug_assert!(bucket < self.bucket_count());
        self.buckets.get_unchecked(bucket).as_ptr()
    }

    /// Returns a raw pointer to the element at `index`.
    ///
    /// # Safety
    ///
    /// `index` must be less than `self.len`.
    #[inline]
    pub(crate) unsafe fn ptr_at(&self, index: usize) -> *mut T {
        debug_assert!(index < self.len);
        let (bucket, offset) = bucket_location(index);
        self.buckets.get_unchecked(bucket).slot(offset)
    }

    /// Sets the length without dropping anything.
    ///
    /// # Safety
    ///
    /// Elements at `new_len..len` must already be moved out or dropped.
    #[inline]
    pub(crate) unsafe fn set_len(&mut self, new_len: usize) {
        debug_assert!(new_len <= self.len);
        self.len = new_len;
    }

    /// Returns a reference to the element at `index`, or `None` if out of
    /// bounds.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        if index < self.len {
            Some(unsafe { &*self.ptr_at(index) })
        } else {
            None
        }
    }

    /// Returns a mutable reference to the element at `index`, or `None` if
    /// out of bounds.
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index < self.len {
            Some(unsafe { &mut *self.ptr_at(index) })
        } else {
            None
        }
    }

    /// Returns a reference to the element at `index` without bounds checking.
    ///
    /// # Safety
    ///
    /// `index` must be less than `self.len()`.
    #[inline]
    pub unsafe fn get_unchecked(&self, index: usize) -> &T {
        &*self.ptr_at(index)
    }

    /// Returns a reference to the first element, or `None` if empty.
    #[inline]
    pub fn first(&self) -> Option<&T> {
        self.get(0)
    }

    /// Returns a reference to the last element, or `None` if empty.
    #[inline]
    pub fn last(&self) -> Option<&T> {
        self.len.checked_sub(1).and_then(|i| self.get(i))
    }

    /// Returns a cursor at the first element.
    #[inline]
    pub fn begin(&self) -> Cursor<'_, T, A> {
        Cursor::new(self, 0)
    }

    /// Returns a cursor one past the last element.
    ///
    /// The end position moves with every push, so an end cursor must be
    /// re-obtained after pushing.
    #[inline]
    pub fn end(&self) -> Cursor<'_, T, A> {
        Cursor::new(self, self.len)
    }

    /// Returns a cursor at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn cursor_at(&self, index: usize) -> Cursor<'_, T, A> {
        assert!(index <= self.len, "cursor index out of bounds");
        Cursor::new(self, index)
    }

    /// Returns an iterator over the elements.
    #[inline]
    pub fn iter(&self) -> Iter<'_, T, A> {
        Iter::new(self.begin(), self.end())
    }

    /// Returns an iterator over mutable references to the elements.
    #[inline]
    pub fn iter_mut(&mut self) -> IterMut<'_, T, A> {
        IterMut::new(self)
    }
}

impl<T, A: Allocator> Drop for SegmentedStack<T, A> {
    fn drop(&mut self) {
        unsafe {
            if RawBuffer::<T>::IS_ZST {
                destroy_range(NonNull::<T>::dangling().as_ptr(), self.len);
            } else {
                let mut remaining = self.len;
                for bucket in &self.buckets[..self.allocated_buckets] {
                    let live = bucket.capacity().min(remaining);
                    destroy_range(bucket.as_ptr(), live);
                    remaining -= live;
                }
            }
            self.len = 0;

            for bucket in &mut self.buckets[..self.allocated_buckets] {
                std::mem::replace(bucket, RawBuffer::empty()).deallocate(&self.alloc);
            }
            self.allocated_buckets = 0;
        }
    }
}

impl<T, A: Allocator> Index<usize> for SegmentedStack<T, A> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        self.get(index).expect("index out of bounds")
    }
}

impl<T, A: Allocator> IndexMut<usize> for SegmentedStack<T, A> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        self.get_mut(index).expect("index out of bounds")
    }
}

impl<T: Clone, A: Allocator + Clone> Clone for SegmentedStack<T, A> {
    /// If an element's `clone` panics, the already cloned prefix is dropped
    /// by the partially built stack.
    fn clone(&self) -> Self {
        let mut out = Self::new_in(self.alloc.clone());
        out.extend(self.iter().cloned());
        out
    }
}

impl<T: PartialEq, A: Allocator> PartialEq for SegmentedStack<T, A> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl<T: Eq, A: Allocator> Eq for SegmentedStack<T, A> {}

impl<T: fmt::Debug, A: Allocator> fmt::Debug for SegmentedStack<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> Default for SegmentedStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, A: Allocator> Extend<T> for SegmentedStack<T, A> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push_back(item);
        }
    }
}

impl<'a, T: Clone + 'a, A: Allocator> Extend<&'a T> for SegmentedStack<T, A> {
    fn extend<I: IntoIterator<Item = &'a T>>(&mut self, iter: I) {
        for item in iter {
            self.push_back(item.clone());
        }
    }
}

impl<T> FromIterator<T> for SegmentedStack<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut stack = Self::new();
        stack.extend(iter);
        stack
    }
}

impl<T, A: Allocator> IntoIterator for SegmentedStack<T, A> {
    type Item = T;
    type IntoIter = IntoIter<T, A>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter::new(self)
    }
}

impl<'a, T, A: Allocator> IntoIterator for &'a SegmentedStack<T, A> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T, A>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T, A: Allocator> IntoIterator for &'a mut SegmentedStack<T, A> {
    type Item = &'a mut T;
    type IntoIter = IterMut<'a, T, A>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

// Safety: SegmentedStack owns its buckets and T determines thread safety
unsafe impl<T: Send, A: Allocator + Send> Send for SegmentedStack<T, A> {}
unsafe impl<T: Sync, A: Allocator + Sync> Sync for SegmentedStack<T, A> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_bucket_location() {
        // Bucket 0: index 0 (capacity 1)
        // Bucket 1: indices 1..3 (capacity 2)
        // Bucket 2: indices 3..7 (capacity 4)
        assert_eq!(bucket_location(0), (0, 0));
        assert_eq!(bucket_location(1), (1, 0));
        assert_eq!(bucket_location(2), (1, 1));
        assert_eq!(bucket_location(3), (2, 0));
        assert_eq!(bucket_location(6), (2, 3));
        assert_eq!(bucket_location(7), (3, 0));
        for index in 0..5000 {
            let (bucket, offset) = bucket_location(index);
            assert_eq!(bucket_start(bucket) + offset, index);
            assert!(offset < bucket_capacity(bucket));
        }
    }

    #[test]
    fn test_new_empty() {
        let stack: SegmentedStack<i32> = SegmentedStack::new();
        assert!(stack.is_empty());
        assert_eq!(stack.len(), 0);
        assert_eq!(stack.bucket_count(), 0);
        assert_eq!(stack.first(), None);
        assert_eq!(stack.last(), None);
        assert_eq!(stack.end() - stack.begin(), 0);
    }

    #[test]
    fn test_index_across_bucket_boundaries() {
        for &count in &[1usize, 2, 3, 4, 7, 8, 1000] {
            let mut stack: SegmentedStack<usize> = SegmentedStack::new();
            for i in 0..count {
                stack.push_back(i);
            }
            assert_eq!(stack.len(), count);
            for i in 0..count {
                assert_eq!(stack[i], i);
            }
            assert_eq!(stack.get(count), None);
        }
    }

    #[test]
    fn test_bucket_doubling() {
        let mut stack: SegmentedStack<u8> = SegmentedStack::new();
        stack.push_back(0);
        assert_eq!(stack.bucket_count(), 1);
        stack.push_back(1);
        assert_eq!(stack.bucket_count(), 2);
        stack.push_back(2);
        assert_eq!(stack.bucket_count(), 2);
        stack.push_back(3);
        assert_eq!(stack.bucket_count(), 3);
        for i in 4..1000 {
            stack.push_back(i as u8);
        }
        // 2^10 - 1 = 1023 slots across 10 buckets
        assert_eq!(stack.bucket_count(), 10);
    }

    #[test]
    fn test_stable_pointers() {
        let mut stack: SegmentedStack<i32> = SegmentedStack::new();
        let mut addresses = Vec::new();
        for i in 0..1000 {
            stack.push_back(i);
            addresses.push(&stack[i as usize] as *const i32);
        }

        for (i, &ptr) in addresses.iter().enumerate() {
            assert_eq!(ptr, &stack[i] as *const i32);
            assert_eq!(unsafe { *ptr }, i as i32);
        }
    }

    #[test]
    fn test_push_and_index() {
        let mut stack: SegmentedStack<i32> = SegmentedStack::new();
        for i in 0..1000 {
            stack.push_back(i);
        }
        assert_eq!(stack[999], 999);
        assert_eq!(stack.end() - stack.begin(), 1000);
        assert_eq!(stack.first(), Some(&0));
        assert_eq!(stack.last(), Some(&999));
    }

    #[test]
    fn test_index_mut() {
        let mut stack: SegmentedStack<i32> = (0..10).collect();
        stack[5] = 50;
        *stack.get_mut(9).unwrap() = 90;
        assert_eq!(stack[5], 50);
        assert_eq!(stack[9], 90);
        assert_eq!(unsafe { *stack.get_unchecked(4) }, 4);
    }

    #[test]
    #[should_panic(expected = "index out of bounds")]
    fn test_index_out_of_bounds() {
        let stack: SegmentedStack<i32> = (0..3).collect();
        let _ = stack[3];
    }

    #[test]
    fn test_drop_elements() {
        let drop_count = Rc::new(RefCell::new(0));

        struct DropCounter {
            count: Rc<RefCell<i32>>,
        }

        impl Drop for DropCounter {
            fn drop(&mut self) {
                *self.count.borrow_mut() += 1;
            }
        }

        {
            let mut stack: SegmentedStack<DropCounter> = SegmentedStack::new();
            for _ in 0..100 {
                stack.push_back(DropCounter {
                    count: drop_count.clone(),
                });
            }
            assert_eq!(*drop_count.borrow(), 0);
        }

        assert_eq!(*drop_count.borrow(), 100);
    }

    #[test]
    fn test_clone() {
        let stack: SegmentedStack<String> = (0..50).map(|i| i.to_string()).collect();
        let copy = stack.clone();
        assert_eq!(stack, copy);
        assert_eq!(copy[49], "49");
    }

    #[test]
    fn test_zst() {
        let mut stack: SegmentedStack<()> = SegmentedStack::new();
        for _ in 0..100 {
            stack.push_back(());
        }
        assert_eq!(stack.len(), 100);
        assert_eq!(stack[99], ());
        assert_eq!(stack.bucket_count(), 7);
        assert_eq!(stack.iter().count(), 100);
        assert_eq!(stack.end() - stack.begin(), 100);
    }

    #[test]
    fn test_zst_drop() {
        thread_local!(static DROPS: std::cell::Cell<usize> = const { std::cell::Cell::new(0) });

        struct Unit;
        impl Drop for Unit {
            fn drop(&mut self) {
                DROPS.with(|d| d.set(d.get() + 1));
            }
        }

        {
            let mut stack: SegmentedStack<Unit> = SegmentedStack::new();
            for _ in 0..10 {
                stack.push_back(Unit);
            }
        }
        assert_eq!(DROPS.with(|d| d.get()), 10);
    }

    #[test]
    fn test_debug() {
        let stack: SegmentedStack<i32> = (1..=4).collect();
        assert_eq!(format!("{stack:?}"), "[1, 2, 3, 4]");
    }
}
