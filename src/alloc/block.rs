//! A bump allocator over a growing list of byte blocks, with a reference-count gate
//! that delays reclamation while asynchronous consumers still read from the region.

use std::alloc::{alloc, dealloc, realloc, Layout};
use std::cell::RefCell;
use std::ptr::NonNull;
use std::sync::{Arc, Condvar, Mutex, Weak};

use log::error;

use crate::alloc::{PlacementArray, PlacementCell};

/// Largest block the growth policy will produce. Requests beyond this get a one-off
/// block of exactly the requested size.
const MAX_BLOCK_SIZE: usize = 1 << 21; // 2MB

/// Blocks are aligned to cache lines.
const BLOCK_ALIGNMENT: usize = 64;

/// Minimum alignment of typed allocations made through `make`.
const MIN_ALIGNMENT: usize = 8;

struct Block {
    data: NonNull<u8>,
    size: usize,
    offset: usize,
}

impl Block {
    fn layout(size: usize) -> Layout {
        // Size is always rounded to a multiple of BLOCK_ALIGNMENT before this is hit.
        Layout::from_size_align(size, BLOCK_ALIGNMENT).expect("invalid block layout")
    }
}

struct AllocatorState {
    blocks: Vec<Block>,
    current_block_index: usize,
    used_size: usize,
}

/// Shared with [`AllocatorReference`] tokens so their drop can wake waiters.
struct ReferenceSync {
    mutex: Mutex<()>,
    condition: Condvar,
}

/// A token counted against a [`BlockAllocator`]. Asynchronous readers of region memory
/// hold one; `clear`, `release` and drop of the allocator block until every token has
/// been dropped.
pub struct AllocatorReference {
    sync: Arc<ReferenceSync>,
}

impl Drop for AllocatorReference {
    fn drop(&mut self) {
        let _guard = self.sync.mutex.lock().unwrap();
        self.sync.condition.notify_all();
    }
}

/// An allocator that hands out storage from shared memory blocks, amortizing the cost
/// of many small allocations. All objects created in the allocator must be destroyed
/// before the allocator itself is cleared or destroyed.
pub struct BlockAllocator {
    state: RefCell<AllocatorState>,
    external_references: RefCell<Weak<AllocatorReference>>,
    sync: Arc<ReferenceSync>,
    init_block_size: usize,
    max_block_size: usize,
}

impl Default for BlockAllocator {
    fn default() -> Self {
        BlockAllocator::new()
    }
}

impl BlockAllocator {
    /// An allocator with a 256-byte initial block and the default 2MB growth cap.
    pub fn new() -> Self {
        BlockAllocator::with_limits(256, MAX_BLOCK_SIZE)
    }

    /// An allocator with explicit initial and maximum block sizes. `init_block_size`
    /// must be greater than zero. A small `max_block_size` does not prevent larger
    /// one-off blocks when a single request exceeds it.
    pub fn with_limits(init_block_size: usize, max_block_size: usize) -> Self {
        debug_assert!(init_block_size > 0);
        BlockAllocator {
            state: RefCell::new(AllocatorState {
                blocks: Vec::new(),
                current_block_index: 0,
                used_size: 0,
            }),
            external_references: RefCell::new(Weak::new()),
            sync: Arc::new(ReferenceSync {
                mutex: Mutex::new(()),
                condition: Condvar::new(),
            }),
            init_block_size,
            max_block_size,
        }
    }

    /// Total bytes handed out since the last clear.
    pub fn size(&self) -> usize {
        self.state.borrow().used_size
    }

    /// The current block's base address and write offset, or None if nothing has been
    /// allocated yet.
    pub fn current_block(&self) -> Option<(*const u8, usize)> {
        let state = self.state.borrow();
        if state.used_size == 0 {
            return None;
        }
        let block = &state.blocks[state.current_block_index];
        Some((block.data.as_ptr() as *const u8, block.offset))
    }

    /// Allocates `size` bytes from the current block, growing the block list as
    /// needed. Returns None when the system allocator fails.
    pub fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        self.allocate_with_alignment(size, 1)
    }

    fn allocate_with_alignment(&self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        debug_assert!(alignment <= BLOCK_ALIGNMENT);
        let mut state = self.state.borrow_mut();
        // Block bases are 64-byte aligned, so aligning the offset aligns the result.
        let padding_for = |offset: usize| {
            let misalign = offset % alignment;
            if misalign == 0 {
                0
            } else {
                alignment - misalign
            }
        };
        let (index, padding) = loop {
            if state.current_block_index >= state.blocks.len() {
                break (self.allocate_new_block(&mut state, size)?, 0);
            }
            let block = &state.blocks[state.current_block_index];
            let padding = padding_for(block.offset);
            if block.size - block.offset >= size + padding {
                break (state.current_block_index, padding);
            }
            state.current_block_index += 1;
        };
        let block = &mut state.blocks[index];
        let start = block.offset + padding;
        let data = unsafe { NonNull::new_unchecked(block.data.as_ptr().add(start)) };
        block.offset = start + size;
        state.used_size += size + padding;
        Some(data)
    }

    fn allocate_new_block(
        &self, state: &mut AllocatorState, requested_size: usize,
    ) -> Option<usize> {
        let mut block_size = if requested_size <= self.max_block_size {
            let mut size = match state.blocks.last() {
                Some(last) => self.next_block_size(last.size),
                None => self.init_block_size,
            };
            while size < requested_size {
                size = self.next_block_size(size);
            }
            size
        } else {
            // A request beyond the cap gets a block of exactly the requested size.
            requested_size
        };
        block_size = (block_size + BLOCK_ALIGNMENT - 1) & !(BLOCK_ALIGNMENT - 1);
        let data = unsafe { alloc(Block::layout(block_size)) };
        let Some(data) = NonNull::new(data) else {
            error!("BlockAllocator: failed to allocate memory block of {block_size} bytes");
            return None;
        };
        state.current_block_index = state.blocks.len();
        state.blocks.push(Block { data, size: block_size, offset: 0 });
        Some(state.current_block_index)
    }

    fn next_block_size(&self, current_size: usize) -> usize {
        (current_size * 2).min(self.max_block_size)
    }

    /// Moves `value` into region storage and returns its owning cell. Returns an empty
    /// cell when allocation fails.
    pub fn make<T>(&self, value: T) -> PlacementCell<T> {
        let alignment = std::mem::align_of::<T>().max(MIN_ALIGNMENT);
        let Some(memory) = self.allocate_with_alignment(std::mem::size_of::<T>(), alignment)
        else {
            return PlacementCell::empty();
        };
        let pointer = memory.cast::<T>();
        unsafe {
            pointer.as_ptr().write(value);
            PlacementCell::from_raw(pointer)
        }
    }

    /// Creates an array of `count` empty cells. Returns an empty array when `count` is
    /// zero or allocation fails.
    pub fn make_array<T>(&self, count: usize) -> PlacementArray<T> {
        if count == 0 {
            return PlacementArray::empty();
        }
        let byte_size = std::mem::size_of::<PlacementCell<T>>() * count;
        let alignment = std::mem::align_of::<PlacementCell<T>>().max(MIN_ALIGNMENT);
        let Some(memory) = self.allocate_with_alignment(byte_size, alignment) else {
            return PlacementArray::empty();
        };
        let cells = memory.cast::<PlacementCell<T>>();
        unsafe {
            for i in 0..count {
                cells.as_ptr().add(i).write(PlacementCell::empty());
            }
            PlacementArray::from_raw(cells, count)
        }
    }

    /// Moves a list of cells into a new contiguous array in region memory.
    pub fn make_array_from<T>(&self, elements: Vec<PlacementCell<T>>) -> PlacementArray<T> {
        if elements.is_empty() {
            return PlacementArray::empty();
        }
        let count = elements.len();
        let byte_size = std::mem::size_of::<PlacementCell<T>>() * count;
        let alignment = std::mem::align_of::<PlacementCell<T>>().max(MIN_ALIGNMENT);
        let Some(memory) = self.allocate_with_alignment(byte_size, alignment) else {
            return PlacementArray::empty();
        };
        let cells = memory.cast::<PlacementCell<T>>();
        unsafe {
            for (i, element) in elements.into_iter().enumerate() {
                cells.as_ptr().add(i).write(element);
            }
            PlacementArray::from_raw(cells, count)
        }
    }

    /// Returns a token counted against this allocator. Asynchronous readers of region
    /// memory hold one; when all tokens drop, blocked `clear`/`release` calls wake up.
    pub fn add_reference(&self) -> Arc<AllocatorReference> {
        let mut external = self.external_references.borrow_mut();
        if let Some(reference) = external.upgrade() {
            return reference;
        }
        let reference = Arc::new(AllocatorReference { sync: Arc::clone(&self.sync) });
        *external = Arc::downgrade(&reference);
        reference
    }

    /// Resets all offsets so the memory can be reused. Blocks past the point where the
    /// running total exceeds `max_reuse_size` are freed. Blocks until all outstanding
    /// references have been dropped.
    pub fn clear(&self, max_reuse_size: usize) {
        let mut state = self.state.borrow_mut();
        if state.blocks.is_empty() {
            return;
        }
        self.wait_for_references_expired();
        state.current_block_index = 0;
        state.used_size = 0;
        let mut total_block_size = 0usize;
        let mut reused_count = 0usize;
        for block in state.blocks.iter_mut() {
            if total_block_size < max_reuse_size {
                block.offset = 0;
                total_block_size += block.size;
                reused_count += 1;
            } else {
                unsafe { dealloc(block.data.as_ptr(), Block::layout(block.size)) };
            }
        }
        state.blocks.truncate(reused_count);
    }

    /// Transfers ownership of the non-empty blocks to a [`BlockData`] that frees them
    /// on drop, and resets this allocator. Returns None when nothing was allocated.
    /// Blocks until all outstanding references have been dropped.
    pub fn release(&self) -> Option<BlockData> {
        let mut state = self.state.borrow_mut();
        if state.used_size == 0 {
            return None;
        }
        self.wait_for_references_expired();
        let mut used_blocks = Vec::with_capacity(state.current_block_index + 1);
        for block in state.blocks.drain(..) {
            if block.offset > 0 {
                used_blocks.push((block.data, block.size));
            } else {
                unsafe { dealloc(block.data.as_ptr(), Block::layout(block.size)) };
            }
        }
        state.current_block_index = 0;
        state.used_size = 0;
        Some(BlockData { blocks: used_blocks })
    }

    fn wait_for_references_expired(&self) {
        let mut guard = self.sync.mutex.lock().unwrap();
        loop {
            if self.external_references.borrow().strong_count() == 0 {
                return;
            }
            guard = self.sync.condition.wait(guard).unwrap();
        }
    }
}

impl Drop for BlockAllocator {
    fn drop(&mut self) {
        self.wait_for_references_expired();
        let state = self.state.get_mut();
        for block in &state.blocks {
            unsafe { dealloc(block.data.as_ptr(), Block::layout(block.size)) };
        }
    }
}

/// Owns memory blocks released from a [`BlockAllocator`] and frees them on drop.
pub struct BlockData {
    blocks: Vec<(NonNull<u8>, usize)>,
}

impl BlockData {
    /// Shrinks the last block to `new_size` bytes and returns its (possibly moved)
    /// address.
    pub fn shrink_last_block_to(&mut self, new_size: usize) -> Option<NonNull<u8>> {
        let (data, size) = self.blocks.last_mut()?;
        if new_size == 0 || new_size >= *size {
            return Some(*data);
        }
        let moved =
            unsafe { realloc(data.as_ptr(), Block::layout(*size), new_size) };
        let moved = NonNull::new(moved)?;
        *data = moved;
        *size = new_size;
        Some(moved)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

impl Drop for BlockData {
    fn drop(&mut self) {
        for (data, size) in &self.blocks {
            unsafe { dealloc(data.as_ptr(), Block::layout(*size)) };
        }
    }
}

unsafe impl Send for BlockData {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_and_used_size() {
        let allocator = BlockAllocator::with_limits(256, MAX_BLOCK_SIZE);
        allocator.allocate(100).unwrap();
        allocator.allocate(100).unwrap();
        allocator.allocate(100).unwrap();
        assert_eq!(allocator.size(), 300);
        // First block holds 256 bytes, so the second allocation forced a 512-byte block.
        let state = allocator.state.borrow();
        assert_eq!(state.blocks.len(), 2);
        assert_eq!(state.blocks[0].size, 256);
        assert_eq!(state.blocks[1].size, 512);
    }

    #[test]
    fn oversized_request_gets_exact_block() {
        let allocator = BlockAllocator::with_limits(256, 1024);
        allocator.allocate(5000).unwrap();
        let state = allocator.state.borrow();
        // Rounded up to the 64-byte block alignment.
        assert_eq!(state.blocks[0].size, (5000 + 63) & !63);
    }

    #[test]
    fn make_and_drop_runs_destructors() {
        use std::rc::Rc;
        let witness = Rc::new(());
        let allocator = BlockAllocator::new();
        {
            let cell = allocator.make(Rc::clone(&witness));
            assert!(!cell.is_empty());
            assert_eq!(Rc::strong_count(&witness), 2);
        }
        assert_eq!(Rc::strong_count(&witness), 1);
        assert!(allocator.size() > 0);
        allocator.clear(usize::MAX);
        assert_eq!(allocator.size(), 0);
    }

    #[test]
    fn array_from_cells() {
        let allocator = BlockAllocator::new();
        let cells = vec![allocator.make(1i32), allocator.make(2i32), allocator.make(3i32)];
        let array = allocator.make_array_from(cells);
        assert_eq!(array.len(), 3);
        assert_eq!(*array[1].get().unwrap(), 2);
    }

    #[test]
    fn clear_frees_blocks_beyond_reuse_cap() {
        let allocator = BlockAllocator::with_limits(256, MAX_BLOCK_SIZE);
        allocator.allocate(200).unwrap();
        allocator.allocate(400).unwrap();
        allocator.allocate(900).unwrap();
        assert_eq!(allocator.state.borrow().blocks.len(), 3);
        allocator.clear(256);
        // Only the first block stays under a 256-byte reuse cap.
        assert_eq!(allocator.state.borrow().blocks.len(), 1);
        assert_eq!(allocator.size(), 0);
        allocator.allocate(10).unwrap();
        assert_eq!(allocator.size(), 10);
    }

    #[test]
    fn release_transfers_blocks() {
        let allocator = BlockAllocator::new();
        assert!(allocator.release().is_none());
        allocator.allocate(100).unwrap();
        let data = allocator.release().unwrap();
        assert_eq!(data.block_count(), 1);
        assert_eq!(allocator.size(), 0);
    }

    #[test]
    fn clear_waits_for_references() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let allocator = BlockAllocator::new();
        allocator.allocate(64).unwrap();
        let reference = allocator.add_reference();
        let released = Arc::new(AtomicBool::new(false));
        let released_clone = Arc::clone(&released);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(50));
            released_clone.store(true, Ordering::SeqCst);
            drop(reference);
        });
        allocator.clear(usize::MAX);
        // clear must not return before the worker dropped its token.
        assert!(released.load(Ordering::SeqCst));
        handle.join().unwrap();
    }
}
