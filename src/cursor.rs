//! Random-access cursor over a `SegmentedStack`.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use allocator_api2::alloc::{Allocator, Global};

use crate::stack::{bucket_capacity, bucket_location, bucket_start, SegmentedStack};

/// A random-access position in a [`SegmentedStack`].
///
/// The cursor caches the bounds of the bucket it is in, so stepping and
/// jumping within a bucket is plain pointer arithmetic. Crossing into another
/// bucket re-derives the bucket from the linear index with one bit scan, so
/// every movement is O(1) regardless of distance.
///
/// Valid positions are `0..=len`; position `len` is the end sentinel, where
/// [`get`](Self::get) returns `None`. Moving outside that range panics.
/// Cursors borrow the stack, which keeps it from being pushed to while a
/// cursor exists.
///
/// # Example
///
/// ```
/// use devector::SegmentedStack;
///
/// let stack: SegmentedStack<i32> = (0..100).collect();
/// let mut cursor = stack.begin();
/// cursor += 70;
/// assert_eq!(cursor.get(), Some(&70));
/// cursor -= 3;
/// assert_eq!(cursor.get(), Some(&67));
/// assert_eq!(stack.end() - cursor, 33);
/// ```
pub struct Cursor<'a, T, A: Allocator = Global> {
    stack: &'a SegmentedStack<T, A>,
    /// Current bucket index
    bucket: usize,
    /// Start of the current bucket
    base: *const T,
    /// Capacity of the current bucket
    capacity: usize,
    /// Position within the current bucket. Equals `capacity` only at the end
    /// of the last bucket.
    offset: usize,
    /// Shadow of the linear index, checked against the cached bucket state
    #[cfg(debug_assertions)]
    index: usize,
}

impl<'a, T, A: Allocator> Cursor<'a, T, A> {
    pub(crate) fn new(stack: &'a SegmentedStack<T, A>, index: usize) -> Self {
        let mut cursor = Self {
            stack,
            bucket: 0,
            base: std::ptr::NonNull::dangling().as_ptr(),
            capacity: 0,
            offset: 0,
            #[cfg(debug_assertions)]
            index: 0,
        };
        cursor.seek(index);
        cursor
    }

    /// Returns the linear index of the cursor.
    #[inline]
    pub fn index(&self) -> usize {
        bucket_start(self.bucket) + self.offset
    }

    /// Returns the bucket the cursor is in.
    #[inline]
    pub fn bucket(&self) -> usize {
        self.bucket
    }

    /// Returns the element under the cursor, or `None` at the end.
    #[inline]
    pub fn get(&self) -> Option<&'a T> {
        self.check();
        if self.index() < self.stack.len() {
            Some(unsafe { &*self.base.add(self.offset) })
        } else {
            None
        }
    }

    /// Moves one element forward.
    ///
    /// # Panics
    ///
    /// Panics if the cursor is at the end.
    #[inline]
    pub fn move_next(&mut self) {
        assert!(
            self.index() < self.stack.len(),
            "cursor moved past the end"
        );
        self.offset += 1;
        if self.offset == self.capacity && self.bucket + 1 < self.stack.bucket_count() {
            self.load_bucket(self.bucket + 1);
            self.offset = 0;
        }
        #[cfg(debug_assertions)]
        {
            self.index += 1;
        }
        self.check();
    }

    /// Moves one element backward.
    ///
    /// # Panics
    ///
    /// Panics if the cursor is at the start.
    #[inline]
    pub fn move_prev(&mut self) {
        if self.offset == 0 {
            assert!(self.bucket > 0, "cursor moved before the start");
            self.load_bucket(self.bucket - 1);
            self.offset = self.capacity - 1;
        } else {
            self.offset -= 1;
        }
        #[cfg(debug_assertions)]
        {
            self.index -= 1;
        }
        self.check();
    }

    /// Moves by `delta` elements in either direction.
    ///
    /// # Panics
    ///
    /// Panics if the target lies outside `0..=len`.
    pub fn advance(&mut self, delta: isize) {
        let target = self
            .index()
            .checked_add_signed(delta)
            .filter(|&target| target <= self.stack.len())
            .expect("cursor moved out of bounds");

        match self.offset.checked_add_signed(delta) {
            // Still inside the current bucket: no lookup needed.
            Some(offset) if offset < self.capacity => {
                self.offset = offset;
                #[cfg(debug_assertions)]
                {
                    self.index = target;
                }
                self.check();
            }
            _ => self.seek(target),
        }
    }

    /// Positions the cursor at linear `index` from scratch.
    fn seek(&mut self, index: usize) {
        debug_assert!(index <= self.stack.len());
        let bucket_count = self.stack.bucket_count();
        if bucket_count == 0 {
            self.bucket = 0;
            self.capacity = 0;
            self.offset = 0;
        } else {
            let (bucket, offset) = bucket_location(index);
            if bucket < bucket_count {
                self.load_bucket(bucket);
                self.offset = offset;
            } else {
                // The end of a full last bucket.
                self.load_bucket(bucket_count - 1);
                self.offset = index - bucket_start(self.bucket);
            }
        }
        #[cfg(debug_assertions)]
        {
            self.index = index;
        }
        self.check();
    }

    #[inline]
    fn load_bucket(&mut self, bucket: usize) {
        self.bucket = bucket;
        self.base = unsafe { self.stack.bucket_ptr(bucket) };
        self.capacity = bucket_capacity(bucket);
    }

    #[inline]
    fn check(&self) {
        #[cfg(debug_assertions)]
        {
            debug_assert_eq!(self.index, self.index());
            debug_assert!(self.offset <= self.capacity);
            debug_assert!(self.index <= self.stack.len());
        }
    }
}

impl<T, A: Allocator> Clone for Cursor<'_, T, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, A: Allocator> Copy for Cursor<'_, T, A> {}

impl<T, A: Allocator> PartialEq for Cursor<'_, T, A> {
    fn eq(&self, other: &Self) -> bool {
        self.bucket == other.bucket && self.offset == other.offset
    }
}

impl<T, A: Allocator> Eq for Cursor<'_, T, A> {}

impl<T, A: Allocator> PartialOrd for Cursor<'_, T, A> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T, A: Allocator> Ord for Cursor<'_, T, A> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bucket
            .cmp(&other.bucket)
            .then(self.offset.cmp(&other.offset))
    }
}

impl<T, A: Allocator> AddAssign<isize> for Cursor<'_, T, A> {
    #[inline]
    fn add_assign(&mut self, delta: isize) {
        self.advance(delta);
    }
}

impl<T, A: Allocator> SubAssign<isize> for Cursor<'_, T, A> {
    #[inline]
    fn sub_assign(&mut self, delta: isize) {
        self.advance(delta.checked_neg().expect("cursor moved out of bounds"));
    }
}

impl<'a, T, A: Allocator> Add<isize> for Cursor<'a, T, A> {
    type Output = Cursor<'a, T, A>;

    #[inline]
    fn add(mut self, delta: isize) -> Self::Output {
        self += delta;
        self
    }
}

impl<'a, T, A: Allocator> Sub<isize> for Cursor<'a, T, A> {
    type Output = Cursor<'a, T, A>;

    #[inline]
    fn sub(mut self, delta: isize) -> Self::Output {
        self -= delta;
        self
    }
}

impl<T, A: Allocator> Sub for Cursor<'_, T, A> {
    type Output = isize;

    /// Distance in elements from `other` to `self`.
    #[inline]
    fn sub(self, other: Self) -> isize {
        if self.bucket == other.bucket {
            self.offset as isize - other.offset as isize
        } else {
            self.index() as isize - other.index() as isize
        }
    }
}

impl<T, A: Allocator> fmt::Debug for Cursor<'_, T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("index", &self.index())
            .field("bucket", &self.bucket)
            .field("offset", &self.offset)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::SegmentedStack;

    fn stack_of(len: usize) -> SegmentedStack<usize> {
        (0..len).collect()
    }

    #[test]
    fn test_begin_end_empty() {
        let stack = stack_of(0);
        assert_eq!(stack.begin(), stack.end());
        assert_eq!(stack.begin().get(), None);
    }

    #[test]
    fn test_step_forward_and_back() {
        let stack = stack_of(100);
        let mut cursor = stack.begin();
        for i in 0..100 {
            assert_eq!(cursor.get(), Some(&i));
            assert_eq!(cursor.index(), i);
            cursor.move_next();
        }
        assert_eq!(cursor, stack.end());
        assert_eq!(cursor.get(), None);

        for i in (0..100).rev() {
            cursor.move_prev();
            assert_eq!(cursor.get(), Some(&i));
        }
        assert_eq!(cursor, stack.begin());
    }

    #[test]
    fn test_end_of_full_bucket() {
        // 7 elements fill buckets 0..3 exactly.
        let stack = stack_of(7);
        let end = stack.end();
        assert_eq!(end.bucket(), 2);
        assert_eq!(end.index(), 7);
        assert_eq!(end - stack.begin(), 7);
        assert_eq!(stack.begin() + 7, end);

        let mut last = end;
        last.move_prev();
        assert_eq!(last.get(), Some(&6));
    }

    #[test]
    fn test_jumps() {
        let stack = stack_of(1000);
        let begin = stack.begin();
        for target in [0usize, 1, 2, 3, 63, 64, 500, 999, 1000] {
            let cursor = begin + target as isize;
            assert_eq!(cursor.index(), target);
            assert_eq!(cursor.get(), stack.get(target));

            let back = stack.end() - (1000 - target) as isize;
            assert_eq!(back, cursor);
        }

        let mut cursor = stack.cursor_at(10);
        cursor += 1; // bucket 3 holds 7..15, stays in bucket
        assert_eq!(cursor.bucket(), 3);
        cursor += 300;
        assert_eq!(cursor.get(), Some(&311));
        cursor -= 311;
        assert_eq!(cursor, begin);
    }

    #[test]
    fn test_difference_and_ordering() {
        let stack = stack_of(1000);
        let a = stack.cursor_at(5);
        let b = stack.cursor_at(6);
        let c = stack.cursor_at(900);
        assert_eq!(b - a, 1);
        assert_eq!(a - b, -1);
        assert_eq!(c - a, 895);
        assert_eq!(a - c, -895);
        assert!(a < b && b < c);
        assert!(c > a);
        assert!(stack.end() > c);
    }

    #[test]
    #[should_panic(expected = "cursor moved out of bounds")]
    fn test_advance_past_end() {
        let stack = stack_of(10);
        let _ = stack.begin() + 11;
    }

    #[test]
    #[should_panic(expected = "cursor moved out of bounds")]
    fn test_advance_before_start() {
        let stack = stack_of(10);
        let _ = stack.cursor_at(3) - 4;
    }

    #[test]
    #[should_panic(expected = "cursor moved past the end")]
    fn test_move_next_at_end() {
        let stack = stack_of(3);
        stack.end().move_next();
    }

    #[test]
    #[should_panic(expected = "cursor moved out of bounds")]
    fn test_in_bucket_jump_past_len() {
        // Bucket 2 holds indices 3..7; only 3 and 4 are live.
        let stack = stack_of(5);
        let _ = stack.cursor_at(3) + 3;
    }
}
