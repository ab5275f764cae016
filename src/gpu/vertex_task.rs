//! Asynchronous vertex generation on the worker pool.
//!
//! A draw op sizes one shared float buffer, then each provider writes its exclusive
//! span from a rayon task. Tasks run to completion; the consumer joins them before the
//! op executes. Cancelling drops the provider cells early but holds the allocator
//! reference, so region memory stays alive until every token drops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};

use crate::alloc::{AllocatorReference, BlockAllocator, PlacementCell};
use crate::gpu::provider::VertexProvider;

/// A heap float buffer that hands out raw disjoint spans to worker tasks.
struct SharedFloatBuffer {
    data: *mut f32,
    length: usize,
}

impl SharedFloatBuffer {
    fn new(length: usize) -> Arc<Self> {
        let mut storage = vec![0.0f32; length].into_boxed_slice();
        let data = storage.as_mut_ptr();
        std::mem::forget(storage);
        Arc::new(SharedFloatBuffer { data, length })
    }

    /// # Safety
    /// Spans handed to concurrent writers must not overlap.
    unsafe fn span(&self, offset: usize, length: usize) -> &mut [f32] {
        debug_assert!(offset + length <= self.length);
        std::slice::from_raw_parts_mut(self.data.add(offset), length)
    }

    fn as_slice(&self) -> &[f32] {
        unsafe { std::slice::from_raw_parts(self.data, self.length) }
    }
}

impl Drop for SharedFloatBuffer {
    fn drop(&mut self) {
        unsafe {
            drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(self.data, self.length)));
        }
    }
}

unsafe impl Send for SharedFloatBuffer {}
unsafe impl Sync for SharedFloatBuffer {}

/// One vertex-generation task: a provider cell plus its span of the shared buffer.
pub struct VertexProviderTask {
    provider: Mutex<Option<PlacementCell<VertexProvider>>>,
    buffer: Arc<SharedFloatBuffer>,
    offset: usize,
    length: usize,
    cancelled: Arc<AtomicBool>,
    // Keeps the originating region alive even after the provider cell is dropped.
    _reference: Arc<AllocatorReference>,
}

impl VertexProviderTask {
    fn execute(&self, done: Sender<()>) {
        let provider = self.provider.lock().unwrap().take();
        if let Some(provider) = provider {
            if !self.cancelled.load(Ordering::Acquire) {
                let span = unsafe { self.buffer.span(self.offset, self.length) };
                provider.get_vertices(span);
            }
        }
        let _ = done.send(());
    }

    /// Drops the provider cell without running it.
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.provider.lock().unwrap().take();
    }
}

/// The joined output of a batch of vertex tasks. `data()` blocks until every task has
/// completed, then exposes the packed floats.
pub struct AsyncVertexSource {
    buffer: Arc<SharedFloatBuffer>,
    tasks: Vec<Arc<VertexProviderTask>>,
    pending: Vec<Receiver<()>>,
}

impl AsyncVertexSource {
    /// Spawns one task per provider on the worker pool. Provider spans are laid out
    /// back to back in the order given.
    pub fn spawn(
        allocator: &BlockAllocator, providers: Vec<PlacementCell<VertexProvider>>,
    ) -> AsyncVertexSource {
        let total: usize = providers.iter().map(|p| p.vertex_count()).sum();
        let buffer = SharedFloatBuffer::new(total);
        let mut tasks = Vec::with_capacity(providers.len());
        let mut pending = Vec::with_capacity(providers.len());
        let mut offset = 0usize;
        for provider in providers {
            let length = provider.vertex_count();
            let task = Arc::new(VertexProviderTask {
                provider: Mutex::new(Some(provider)),
                buffer: Arc::clone(&buffer),
                offset,
                length,
                cancelled: Arc::new(AtomicBool::new(false)),
                _reference: allocator.add_reference(),
            });
            offset += length;
            let (sender, receiver) = channel();
            let worker = Arc::clone(&task);
            rayon::spawn(move || worker.execute(sender));
            tasks.push(task);
            pending.push(receiver);
        }
        AsyncVertexSource { buffer, tasks, pending }
    }

    /// Generates synchronously on the calling thread, bypassing the pool.
    pub fn new_sync(providers: Vec<PlacementCell<VertexProvider>>) -> AsyncVertexSource {
        let total: usize = providers.iter().map(|p| p.vertex_count()).sum();
        let buffer = SharedFloatBuffer::new(total);
        let mut offset = 0usize;
        for provider in providers {
            let length = provider.vertex_count();
            let span = unsafe { buffer.span(offset, length) };
            provider.get_vertices(span);
            offset += length;
        }
        AsyncVertexSource { buffer, tasks: Vec::new(), pending: Vec::new() }
    }

    /// Joins outstanding tasks and returns the packed vertex data.
    pub fn data(&mut self) -> &[f32] {
        for receiver in self.pending.drain(..) {
            let _ = receiver.recv();
        }
        self.buffer.as_slice()
    }

    /// Requests cancellation: providers are dropped, already-running writes finish,
    /// allocator references stay alive until the source itself drops.
    pub fn cancel(&mut self) {
        for task in &self.tasks {
            task.cancel();
        }
    }
}

impl Drop for AsyncVertexSource {
    fn drop(&mut self) {
        // Tasks hold the buffer and allocator references; join so neither outlives
        // its region guarantees.
        for receiver in self.pending.drain(..) {
            let _ = receiver.recv();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Rect;
    use crate::gpu::quad::AAType;
    use crate::gpu::rects::RectsVertexProvider;

    #[test]
    fn async_matches_sync() {
        let allocator = BlockAllocator::new();
        let make = |rect: Rect| {
            RectsVertexProvider::make_from_rect(&allocator, rect, AAType::Coverage).unwrap()
        };
        let mut source = AsyncVertexSource::spawn(
            &allocator,
            vec![make(Rect::new(0.0, 0.0, 8.0, 8.0)), make(Rect::new(1.0, 1.0, 5.0, 5.0))],
        );
        let mut reference = AsyncVertexSource::new_sync(vec![
            make(Rect::new(0.0, 0.0, 8.0, 8.0)),
            make(Rect::new(1.0, 1.0, 5.0, 5.0)),
        ]);
        assert_eq!(source.data(), reference.data());
        // Provider cells live inside the sources; release them before the region.
        drop(source);
        drop(reference);
        allocator.clear(usize::MAX);
    }

    #[test]
    fn cancel_keeps_allocator_usable() {
        let allocator = BlockAllocator::new();
        let provider = RectsVertexProvider::make_from_rect(
            &allocator,
            Rect::new(0.0, 0.0, 8.0, 8.0),
            AAType::None,
        )
        .unwrap();
        let mut source = AsyncVertexSource::spawn(&allocator, vec![provider]);
        source.cancel();
        let _ = source.data();
        drop(source);
        allocator.clear(usize::MAX);
        assert_eq!(allocator.size(), 0);
    }
}
