//! Owning handles into [`BlockAllocator`](crate::alloc::BlockAllocator) regions.
//!
//! A cell owns the *value* but not the *memory*: dropping it runs the destructor in
//! place and leaves the bytes to the allocator. Every cell must be dropped before the
//! region that holds it is cleared, released or destroyed.

use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

/// A single-object handle into an allocator region. Behaves like a `Box` that never
/// frees: moves transfer ownership, drop calls the destructor only.
pub struct PlacementCell<T> {
    pointer: Option<NonNull<T>>,
    _marker: PhantomData<T>,
}

impl<T> PlacementCell<T> {
    /// An empty cell holding nothing.
    pub const fn empty() -> Self {
        PlacementCell { pointer: None, _marker: PhantomData }
    }

    /// Wraps a pointer to a fully constructed value in region memory.
    ///
    /// # Safety
    /// `pointer` must reference an initialized `T` that stays valid for the cell's
    /// lifetime and is not owned by anything else.
    pub(crate) unsafe fn from_raw(pointer: NonNull<T>) -> Self {
        PlacementCell { pointer: Some(pointer), _marker: PhantomData }
    }

    pub fn is_empty(&self) -> bool {
        self.pointer.is_none()
    }

    pub fn get(&self) -> Option<&T> {
        self.pointer.map(|p| unsafe { p.as_ref() })
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.pointer.map(|mut p| unsafe { p.as_mut() })
    }

    /// Drops the held value and empties the cell. The memory is not reclaimed.
    pub fn reset(&mut self) {
        if let Some(pointer) = self.pointer.take() {
            unsafe { std::ptr::drop_in_place(pointer.as_ptr()) };
        }
    }
}

impl<T> Deref for PlacementCell<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.get().expect("deref of empty PlacementCell")
    }
}

impl<T> DerefMut for PlacementCell<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.get_mut().expect("deref of empty PlacementCell")
    }
}

impl<T> Default for PlacementCell<T> {
    fn default() -> Self {
        PlacementCell::empty()
    }
}

impl<T> Drop for PlacementCell<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

// The producer finishes constructing the value before the cell crosses threads; after
// that the cell is the sole owner, so sending it is no different from sending a Box.
unsafe impl<T: Send> Send for PlacementCell<T> {}

/// A fixed-size contiguous run of [`PlacementCell`]s living in region memory. The
/// array owns its cells (dropping it drops each element) but, like the cells, never
/// frees the underlying bytes.
pub struct PlacementArray<T> {
    cells: Option<NonNull<PlacementCell<T>>>,
    length: usize,
}

impl<T> PlacementArray<T> {
    pub const fn empty() -> Self {
        PlacementArray { cells: None, length: 0 }
    }

    /// # Safety
    /// `cells` must point at `length` initialized `PlacementCell<T>` values in region
    /// memory, exclusively owned by this array.
    pub(crate) unsafe fn from_raw(cells: NonNull<PlacementCell<T>>, length: usize) -> Self {
        PlacementArray { cells: Some(cells), length }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn get(&self, index: usize) -> Option<&PlacementCell<T>> {
        if index >= self.length {
            return None;
        }
        self.cells.map(|cells| unsafe { &*cells.as_ptr().add(index) })
    }

    pub fn first(&self) -> Option<&PlacementCell<T>> {
        self.get(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlacementCell<T>> {
        (0..self.length).filter_map(move |i| self.get(i))
    }
}

impl<T> std::ops::Index<usize> for PlacementArray<T> {
    type Output = PlacementCell<T>;

    fn index(&self, index: usize) -> &PlacementCell<T> {
        self.get(index).expect("PlacementArray index out of range")
    }
}

impl<T> Default for PlacementArray<T> {
    fn default() -> Self {
        PlacementArray::empty()
    }
}

impl<T> Drop for PlacementArray<T> {
    fn drop(&mut self) {
        if let Some(cells) = self.cells {
            for i in 0..self.length {
                unsafe { std::ptr::drop_in_place(cells.as_ptr().add(i)) };
            }
        }
    }
}

unsafe impl<T: Send> Send for PlacementArray<T> {}
