//! A contiguous vector that grows at both ends.

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut, Index, IndexMut};

use allocator_api2::alloc::{Allocator, Global};

use crate::iter::DevectorIntoIter;
use crate::policy::GrowthPolicy;
use crate::raw_buffer::RawBuffer;
use crate::relocate::{destroy_range, relocate};
use crate::TryReserveError;

/// A double-ended vector.
///
/// `Devector` keeps its elements in one contiguous buffer with free space on
/// both sides of the live range, so [`push_front`](Self::push_front) and
/// [`push_back`](Self::push_back) are both amortized O(1) and the contents can
/// always be viewed as a slice.
///
/// When the side being pushed to runs out of room the devector either shifts
/// its contents inside the current buffer (if the buffer is mostly empty) or
/// moves them to a larger buffer. Either way it places more free space on the
/// side that received more pushes since the previous reallocation. Both events
/// move every element, so they invalidate all pointers into the devector.
///
/// # Example
///
/// ```
/// use devector::Devector;
///
/// let mut dv: Devector<i32> = Devector::new();
/// for i in 1..=100 {
///     dv.push_back(i);
/// }
/// dv.push_front(0);
///
/// assert_eq!(dv.front(), Some(&0));
/// assert_eq!(dv[1], 1);
/// assert_eq!(dv[100], 100);
/// assert_eq!(dv.len(), 101);
/// ```
pub struct Devector<T, A: Allocator = Global> {
    /// Backing storage
    buf: RawBuffer<T>,
    /// Offset of the first live element in `buf`
    head: usize,
    /// Number of live elements
    len: usize,
    /// `head` as of the last shift or grow
    prev_head: usize,
    /// `head + len` as of the last shift or grow
    prev_tail: usize,
    policy: GrowthPolicy,
    alloc: A,
    /// Marker for drop check
    _marker: PhantomData<T>,
}

impl<T> Devector<T> {
    /// Creates a new empty `Devector`.
    ///
    /// Does not allocate until elements are pushed.
    #[inline]
    pub fn new() -> Self {
        Self::new_in(Global)
    }

    /// Creates an empty `Devector` with room for `capacity` elements at the
    /// back.
    ///
    /// # Panics
    ///
    /// Panics if allocation fails.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_in(capacity, Global)
    }

    /// Creates an empty `Devector` that reallocates according to `policy`.
    pub fn with_policy(policy: GrowthPolicy) -> Self {
        Self::with_policy_in(policy, Global)
    }
}

impl<T, A: Allocator> Devector<T, A> {
    /// Initial head offset. Zero-sized elements start in the middle of their
    /// unbounded buffer so neither end ever has to move.
    const START: usize = if RawBuffer::<T>::IS_ZST {
        usize::MAX / 2
    } else {
        0
    };

    /// Creates a new empty `Devector` using `alloc`.
    #[inline]
    pub fn new_in(alloc: A) -> Self {
        Self::with_policy_in(GrowthPolicy::default(), alloc)
    }

    /// Creates a new empty `Devector` using `alloc` and `policy`.
    pub fn with_policy_in(policy: GrowthPolicy, alloc: A) -> Self {
        Self {
            buf: RawBuffer::empty(),
            head: Self::START,
            len: 0,
            prev_head: Self::START,
            prev_tail: Self::START,
            policy,
            alloc,
            _marker: PhantomData,
        }
    }

    /// Creates an empty `Devector` with room for `capacity` elements at the
    /// back, using `alloc`.
    ///
    /// # Panics
    ///
    /// Panics if allocation fails.
    pub fn with_capacity_in(capacity: usize, alloc: A) -> Self {
        match Self::try_with_capacity_in(capacity, alloc) {
            Ok(dv) => dv,
            Err(err) => err.handle(),
        }
    }

    /// Fallible version of [`with_capacity_in`](Self::with_capacity_in).
    pub fn try_with_capacity_in(capacity: usize, alloc: A) -> Result<Self, TryReserveError> {
        let mut dv = Self::new_in(alloc);
        if !RawBuffer::<T>::IS_ZST {
            dv.buf = RawBuffer::allocate(&dv.alloc, capacity)?;
        }
        Ok(dv)
    }

    /// Returns the number of elements.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the devector contains no elements.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the total number of slots, on both sides, in the buffer.
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Returns the reallocation policy.
    #[inline]
    pub const fn policy(&self) -> &GrowthPolicy {
        &self.policy
    }

    /// Returns a reference to the underlying allocator.
    #[inline]
    pub const fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Offset one past the last live element.
    #[inline]
    const fn tail(&self) -> usize {
        self.head + self.len
    }

    /// Returns a pointer to the first element.
    ///
    /// The pointer stays valid until the next call that shifts or grows.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        unsafe { self.buf.slot(self.head) }
    }

    /// Returns a mutable pointer to the first element.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        unsafe { self.buf.slot(self.head) }
    }

    /// Views the elements as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        unsafe { std::slice::from_raw_parts(self.as_ptr(), self.len) }
    }

    /// Views the elements as a mutable slice.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        unsafe { std::slice::from_raw_parts_mut(self.as_mut_ptr(), self.len) }
    }

    /// Appends an element to the back.
    ///
    /// # Panics
    ///
    /// Panics if allocation fails.
    #[inline]
    pub fn push_back(&mut self, value: T) {
        if self.tail() == self.capacity() {
            if let Err(err) = self.shift_or_grow() {
                err.handle();
            }
        }
        self.write_back(value);
    }

    /// Appends an element to the back, reporting allocation failure instead
    /// of panicking.
    ///
    /// On failure `value` is dropped and the devector is unchanged.
    pub fn try_push_back(&mut self, value: T) -> Result<(), TryReserveError> {
        if self.tail() == self.capacity() {
            self.shift_or_grow()?;
        }
        self.write_back(value);
        Ok(())
    }

    #[inline]
    fn write_back(&mut self, value: T) {
        debug_assert!(self.tail() < self.capacity());
        unsafe { self.buf.slot(self.tail()).write(value) };
        self.len += 1;
    }

    /// Prepends an element to the front.
    ///
    /// # Panics
    ///
    /// Panics if allocation fails.
    #[inline]
    pub fn push_front(&mut self, value: T) {
        if self.head == 0 {
            if let Err(err) = self.shift_or_grow() {
                err.handle();
            }
        }
        self.write_front(value);
    }

    /// Prepends an element to the front, reporting allocation failure
    /// instead of panicking.
    ///
    /// On failure `value` is dropped and the devector is unchanged.
    pub fn try_push_front(&mut self, value: T) -> Result<(), TryReserveError> {
        if self.head == 0 {
            self.shift_or_grow()?;
        }
        self.write_front(value);
        Ok(())
    }

    #[inline]
    fn write_front(&mut self, value: T) {
        debug_assert!(self.head > 0);
        self.head -= 1;
        unsafe { self.buf.slot(self.head).write(value) };
        self.len += 1;
    }

    /// Removes the first element and returns it, or `None` if empty.
    ///
    /// Never moves the remaining elements.
    #[inline]
    pub fn pop_front(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let value = unsafe { self.buf.slot(self.head).read() };
        self.head += 1;
        self.len -= 1;
        Some(value)
    }

    /// Removes the last element and returns it, or `None` if empty.
    #[inline]
    pub fn pop_back(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        Some(unsafe { self.buf.slot(self.tail()).read() })
    }

    /// Returns a reference to the first element, or `None` if empty.
    #[inline]
    pub fn front(&self) -> Option<&T> {
        self.as_slice().first()
    }

    /// Returns a mutable reference to the first element, or `None` if empty.
    #[inline]
    pub fn front_mut(&mut self) -> Option<&mut T> {
        self.as_mut_slice().first_mut()
    }

    /// Returns a reference to the last element, or `None` if empty.
    #[inline]
    pub fn back(&self) -> Option<&T> {
        self.as_slice().last()
    }

    /// Returns a mutable reference to the last element, or `None` if empty.
    #[inline]
    pub fn back_mut(&mut self) -> Option<&mut T> {
        self.as_mut_slice().last_mut()
    }

    /// Returns a reference to the element at `index`, or `None` if out of
    /// bounds.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    /// Returns a mutable reference to the element at `index`, or `None` if
    /// out of bounds.
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.as_mut_slice().get_mut(index)
    }

    /// Returns a reference to the element at `index` without bounds checking.
    ///
    /// # Safety
    ///
    /// `index` must be less than `self.len()`.
    #[inline]
    pub unsafe fn get_unchecked(&self, index: usize) -> &T {
        debug_assert!(index < self.len, "index out of bounds");
        &*self.buf.slot(self.head + index)
    }

    /// Removes all elements, keeping the buffer.
    pub fn clear(&mut self) {
        let len = self.len;
        // Reset len BEFORE dropping to prevent double-free if drop panics
        self.len = 0;
        unsafe { destroy_range(self.buf.slot(self.head), len) };
    }

    /// Returns an iterator over the elements.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    /// Returns an iterator over mutable references to the elements.
    #[inline]
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.as_mut_slice().iter_mut()
    }

    #[cold]
    #[inline(never)]
    fn shift_or_grow(&mut self) -> Result<(), TryReserveError> {
        debug_assert!(self.head == 0 || self.tail() == self.capacity());
        if RawBuffer::<T>::IS_ZST {
            return Err(TryReserveError::capacity_overflow());
        }

        if self.policy.should_shift(self.len, self.capacity()) {
            self.shift();
            Ok(())
        } else {
            self.grow()
        }
    }

    /// Elements pushed at the front and at the back since the last shift or
    /// grow. Pops can move the range past the snapshot, which counts as zero.
    fn inserted_since_snapshot(&self) -> (usize, usize) {
        let front = self.prev_head.saturating_sub(self.head);
        let back = self.tail().saturating_sub(self.prev_tail);
        (front, back)
    }

    /// Re-centers the live range inside the current buffer.
    fn shift(&mut self) {
        let free = self.capacity() - self.len;
        let (front, back) = self.inserted_since_snapshot();
        let new_head = self.policy.left_gap(free, front, back);
        debug_assert_ne!(new_head, self.head);

        log::trace!(
            "devector shift: len {}, capacity {}, head {} -> {}",
            self.len,
            self.capacity(),
            self.head,
            new_head
        );

        unsafe {
            relocate(self.buf.slot(self.head), self.buf.slot(new_head), self.len);
        }
        self.head = new_head;
        self.take_snapshot();
    }

    /// Moves the live range into a larger buffer.
    ///
    /// The new buffer is allocated before anything is touched, so on error
    /// the devector is unchanged.
    fn grow(&mut self) -> Result<(), TryReserveError> {
        let new_capacity = self
            .policy
            .grown_capacity(self.capacity(), self.len)
            .ok_or_else(TryReserveError::capacity_overflow)?;
        let new_buf = RawBuffer::allocate(&self.alloc, new_capacity)?;

        let (front, back) = self.inserted_since_snapshot();
        let new_head = self.policy.left_gap(new_capacity - self.len, front, back);

        log::trace!(
            "devector grow: len {}, capacity {} -> {}, head {}",
            self.len,
            self.capacity(),
            new_capacity,
            new_head
        );

        unsafe {
            relocate(self.buf.slot(self.head), new_buf.slot(new_head), self.len);
            let old_buf = std::mem::replace(&mut self.buf, new_buf);
            old_buf.deallocate(&self.alloc);
        }
        self.head = new_head;
        self.take_snapshot();
        Ok(())
    }

    #[inline]
    fn take_snapshot(&mut self) {
        self.prev_head = self.head;
        self.prev_tail = self.tail();
    }
}

impl<T, A: Allocator> Drop for Devector<T, A> {
    fn drop(&mut self) {
        unsafe {
            destroy_range(self.buf.slot(self.head), self.len);
            std::mem::replace(&mut self.buf, RawBuffer::empty()).deallocate(&self.alloc);
        }
    }
}

impl<T, A: Allocator> Deref for Devector<T, A> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T, A: Allocator> DerefMut for Devector<T, A> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T, A: Allocator> Index<usize> for Devector<T, A> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        self.get(index).expect("index out of bounds")
    }
}

impl<T, A: Allocator> IndexMut<usize> for Devector<T, A> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        self.get_mut(index).expect("index out of bounds")
    }
}

impl<T: Clone, A: Allocator + Clone> Clone for Devector<T, A> {
    /// Clones into an exactly sized buffer.
    ///
    /// If an element's `clone` panics, the already cloned prefix is dropped
    /// by the partially built devector.
    fn clone(&self) -> Self {
        let mut out = Self::with_capacity_in(self.len, self.alloc.clone());
        out.policy = self.policy;
        for item in self.iter() {
            out.write_back(item.clone());
        }
        out
    }
}

impl<T: PartialEq, A: Allocator> PartialEq for Devector<T, A> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq, A: Allocator> Eq for Devector<T, A> {}

impl<T: PartialEq, A: Allocator> PartialEq<[T]> for Devector<T, A> {
    fn eq(&self, other: &[T]) -> bool {
        self.as_slice() == other
    }
}

impl<T: fmt::Debug, A: Allocator> fmt::Debug for Devector<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> Default for Devector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, A: Allocator> Extend<T> for Devector<T, A> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push_back(item);
        }
    }
}

impl<'a, T: Clone + 'a, A: Allocator> Extend<&'a T> for Devector<T, A> {
    fn extend<I: IntoIterator<Item = &'a T>>(&mut self, iter: I) {
        for item in iter {
            self.push_back(item.clone());
        }
    }
}

impl<T> FromIterator<T> for Devector<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut dv = Self::new();
        dv.extend(iter);
        dv
    }
}

impl<T, A: Allocator> IntoIterator for Devector<T, A> {
    type Item = T;
    type IntoIter = DevectorIntoIter<T, A>;

    fn into_iter(self) -> Self::IntoIter {
        DevectorIntoIter { dv: self }
    }
}

impl<'a, T, A: Allocator> IntoIterator for &'a Devector<T, A> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T, A: Allocator> IntoIterator for &'a mut Devector<T, A> {
    type Item = &'a mut T;
    type IntoIter = std::slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

// Safety: Devector owns its elements and its allocator
unsafe impl<T: Send, A: Allocator + Send> Send for Devector<T, A> {}
unsafe impl<T: Sync, A: Allocator + Sync> Sync for Devector<T, A> {}
