//! Iterator implementations for `SegmentedStack` and `Devector`.

use std::iter::FusedIterator;
use std::marker::PhantomData;

use allocator_api2::alloc::{Allocator, Global};

use crate::cursor::Cursor;
use crate::devector::Devector;
use crate::stack::{bucket_capacity, SegmentedStack};

/// An iterator over references to elements of a `SegmentedStack`.
///
/// Walks between a front and a back [`Cursor`], so `nth` and `nth_back`
/// jump in O(1).
pub struct Iter<'a, T, A: Allocator = Global> {
    front: Cursor<'a, T, A>,
    back: Cursor<'a, T, A>,
}

impl<'a, T, A: Allocator> Iter<'a, T, A> {
    pub(crate) fn new(front: Cursor<'a, T, A>, back: Cursor<'a, T, A>) -> Self {
        debug_assert!(front <= back);
        Self { front, back }
    }

    #[inline]
    fn remaining(&self) -> usize {
        (self.back - self.front) as usize
    }
}

impl<'a, T, A: Allocator> Iterator for Iter<'a, T, A> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.front == self.back {
            return None;
        }
        let item = self.front.get();
        self.front.move_next();
        item
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }

    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        if n >= self.remaining() {
            self.front = self.back;
            return None;
        }
        self.front += n as isize;
        self.next()
    }

    #[inline]
    fn count(self) -> usize {
        self.remaining()
    }
}

impl<T, A: Allocator> DoubleEndedIterator for Iter<'_, T, A> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front == self.back {
            return None;
        }
        self.back.move_prev();
        self.back.get()
    }

    fn nth_back(&mut self, n: usize) -> Option<Self::Item> {
        if n >= self.remaining() {
            self.back = self.front;
            return None;
        }
        self.back -= n as isize;
        self.next_back()
    }
}

impl<T, A: Allocator> ExactSizeIterator for Iter<'_, T, A> {}

impl<T, A: Allocator> FusedIterator for Iter<'_, T, A> {}

impl<T, A: Allocator> Clone for Iter<'_, T, A> {
    fn clone(&self) -> Self {
        Self {
            front: self.front,
            back: self.back,
        }
    }
}

/// An iterator over mutable references to elements of a `SegmentedStack`.
pub struct IterMut<'a, T, A: Allocator = Global> {
    stack: *mut SegmentedStack<T, A>,
    /// Current pointer within bucket
    ptr: *mut T,
    /// End of current bucket (min of bucket capacity and stack.len)
    bucket_end: *mut T,
    /// Current logical index
    index: usize,
    /// Next bucket to load
    bucket_index: usize,
    len: usize,
    _marker: PhantomData<&'a mut T>,
}

impl<'a, T, A: Allocator> IterMut<'a, T, A> {
    pub(crate) fn new(stack: &'a mut SegmentedStack<T, A>) -> Self {
        Self {
            len: stack.len(),
            stack,
            ptr: std::ptr::null_mut(),
            bucket_end: std::ptr::null_mut(),
            index: 0,
            bucket_index: 0,
            _marker: PhantomData,
        }
    }

    #[cold]
    fn next_bucket(&mut self) -> Option<&'a mut T> {
        if self.index >= self.len {
            return None;
        }

        let bucket_len = bucket_capacity(self.bucket_index).min(self.len - self.index);
        unsafe {
            let base = (*self.stack).bucket_ptr(self.bucket_index);
            self.ptr = base;
            self.bucket_end = base.add(bucket_len);
        }
        self.bucket_index += 1;

        let result = self.ptr;
        self.ptr = unsafe { self.ptr.add(1) };
        self.index += 1;
        Some(unsafe { &mut *result })
    }
}

impl<'a, T, A: Allocator> Iterator for IterMut<'a, T, A> {
    type Item = &'a mut T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        // For ZSTs, just check index vs len
        if std::mem::size_of::<T>() == 0 {
            if self.index < self.len {
                self.index += 1;
                return Some(unsafe { &mut *std::ptr::NonNull::dangling().as_ptr() });
            }
            return None;
        }

        if self.ptr < self.bucket_end {
            let result = self.ptr;
            self.ptr = unsafe { self.ptr.add(1) };
            self.index += 1;
            return Some(unsafe { &mut *result });
        }
        self.next_bucket()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len - self.index;
        (remaining, Some(remaining))
    }
}

impl<T, A: Allocator> ExactSizeIterator for IterMut<'_, T, A> {}

impl<T, A: Allocator> FusedIterator for IterMut<'_, T, A> {}

// Safety: IterMut yields exclusive references
unsafe impl<T: Send, A: Allocator + Send> Send for IterMut<'_, T, A> {}
unsafe impl<T: Sync, A: Allocator + Sync> Sync for IterMut<'_, T, A> {}

/// An owning iterator over elements of a `SegmentedStack`.
///
/// This struct is created by the `into_iter` method on `SegmentedStack`
/// (provided by the [`IntoIterator`] trait).
pub struct IntoIter<T, A: Allocator = Global> {
    stack: SegmentedStack<T, A>,
    index: usize,
}

impl<T, A: Allocator> IntoIter<T, A> {
    pub(crate) fn new(stack: SegmentedStack<T, A>) -> Self {
        Self { stack, index: 0 }
    }
}

impl<T, A: Allocator> Iterator for IntoIter<T, A> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.stack.len() {
            return None;
        }
        // Safety: index < len, so the element exists and is initialized
        let value = unsafe { std::ptr::read(self.stack.ptr_at(self.index)) };
        self.index += 1;
        Some(value)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.stack.len() - self.index;
        (remaining, Some(remaining))
    }
}

impl<T, A: Allocator> DoubleEndedIterator for IntoIter<T, A> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.index >= self.stack.len() {
            return None;
        }
        let new_len = self.stack.len() - 1;
        unsafe {
            let value = std::ptr::read(self.stack.ptr_at(new_len));
            self.stack.set_len(new_len);
            Some(value)
        }
    }
}

impl<T, A: Allocator> ExactSizeIterator for IntoIter<T, A> {}

impl<T, A: Allocator> FusedIterator for IntoIter<T, A> {}

impl<T, A: Allocator> Drop for IntoIter<T, A> {
    fn drop(&mut self) {
        // Drop remaining elements that weren't consumed
        if std::mem::needs_drop::<T>() {
            for i in self.index..self.stack.len() {
                unsafe {
                    std::ptr::drop_in_place(self.stack.ptr_at(i));
                }
            }
        }
        // Safety: All remaining elements have been dropped, set len to 0
        // to prevent the stack from dropping them again
        unsafe { self.stack.set_len(0) };
    }
}

/// An owning iterator over elements of a `Devector`.
///
/// This struct is created by the `into_iter` method on `Devector`
/// (provided by the [`IntoIterator`] trait).
pub struct DevectorIntoIter<T, A: Allocator = Global> {
    pub(crate) dv: Devector<T, A>,
}

impl<T, A: Allocator> DevectorIntoIter<T, A> {
    /// Returns the remaining items as a slice.
    pub fn as_slice(&self) -> &[T] {
        self.dv.as_slice()
    }
}

impl<T, A: Allocator> Iterator for DevectorIntoIter<T, A> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.dv.pop_front()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.dv.len(), Some(self.dv.len()))
    }
}

impl<T, A: Allocator> DoubleEndedIterator for DevectorIntoIter<T, A> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        self.dv.pop_back()
    }
}

impl<T, A: Allocator> ExactSizeIterator for DevectorIntoIter<T, A> {}

impl<T, A: Allocator> FusedIterator for DevectorIntoIter<T, A> {}
