//! Byte-sink abstractions used by the PDF emitter: an in-memory stream with the
//! swap-based prepend needed when reordering Porter-Duff composition output, and a
//! file-backed stream that latches failure.

use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A destination for bytes. The size of the stream is dynamic; subclasses may be backed
/// by memory, a file, or a compressor. Not thread-safe.
pub trait WriteStream {
    /// Writes bytes to the stream. Returns true if the write was successful.
    fn write(&mut self, data: &[u8]) -> bool;

    /// Writes UTF-8 text to the stream.
    fn write_text(&mut self, text: &str) -> bool {
        self.write(text.as_bytes())
    }

    /// Number of bytes accepted so far.
    fn bytes_written(&self) -> usize;

    /// Flushes buffered data to the target storage.
    fn flush(&mut self) {}
}

/// A growable in-memory stream that can be read back.
#[derive(Default)]
pub struct MemoryWriteStream {
    buffer: Vec<u8>,
}

impl MemoryWriteStream {
    pub fn new() -> Self {
        MemoryWriteStream { buffer: Vec::new() }
    }

    /// Copies `data.len()` bytes starting at `offset` out of the buffer. Returns false
    /// if the range exceeds the buffer.
    pub fn read(&self, data: &mut [u8], offset: usize) -> bool {
        let Some(end) = offset.checked_add(data.len()) else {
            return false;
        };
        if end > self.buffer.len() {
            return false;
        }
        data.copy_from_slice(&self.buffer[offset..end]);
        true
    }

    /// Returns a copy of everything written so far.
    pub fn read_data(&self) -> Vec<u8> {
        self.buffer.clone()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Moves this stream's contents to the end of `destination` and resets this
    /// stream. Swaps buffers when the destination is empty to avoid the copy.
    pub fn write_to_and_reset(&mut self, destination: &mut MemoryWriteStream) {
        if self.buffer.is_empty() {
            return;
        }
        if destination.buffer.is_empty() {
            std::mem::swap(&mut destination.buffer, &mut self.buffer);
            return;
        }
        destination.buffer.append(&mut self.buffer);
    }

    /// Moves this stream's contents to the *front* of `destination` and resets this
    /// stream.
    pub fn prepend_to_and_reset(&mut self, destination: &mut MemoryWriteStream) {
        if self.buffer.is_empty() {
            return;
        }
        if destination.buffer.is_empty() {
            std::mem::swap(&mut destination.buffer, &mut self.buffer);
            return;
        }
        self.buffer.extend_from_slice(&destination.buffer);
        std::mem::swap(&mut destination.buffer, &mut self.buffer);
        self.buffer.clear();
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.buffer.shrink_to_fit();
    }
}

impl WriteStream for MemoryWriteStream {
    fn write(&mut self, data: &[u8]) -> bool {
        self.buffer.extend_from_slice(data);
        true
    }

    fn bytes_written(&self) -> usize {
        self.buffer.len()
    }
}

/// A clonable handle to one shared in-memory stream, for callers that hand the
/// stream to a document but want to read the bytes back afterwards.
#[derive(Clone, Default)]
pub struct SharedMemoryStream {
    inner: std::sync::Arc<std::sync::Mutex<MemoryWriteStream>>,
}

impl SharedMemoryStream {
    pub fn new() -> Self {
        SharedMemoryStream::default()
    }

    /// A copy of everything written so far.
    pub fn bytes(&self) -> Vec<u8> {
        self.inner.lock().unwrap().read_data()
    }
}

impl WriteStream for SharedMemoryStream {
    fn write(&mut self, data: &[u8]) -> bool {
        self.inner.lock().unwrap().write(data)
    }

    fn bytes_written(&self) -> usize {
        self.inner.lock().unwrap().bytes_written()
    }
}

/// Writes to a disk file. Once any write fails the stream stays failed and subsequent
/// writes are no-ops returning false.
pub struct FileWriteStream {
    file: Option<File>,
    bytes_written: usize,
}

impl FileWriteStream {
    /// Opens `path` for writing. Returns None if the file cannot be created.
    pub fn create(path: impl AsRef<Path>) -> Option<Self> {
        let file = File::create(path).ok()?;
        Some(FileWriteStream { file: Some(file), bytes_written: 0 })
    }
}

impl WriteStream for FileWriteStream {
    fn write(&mut self, data: &[u8]) -> bool {
        let Some(file) = self.file.as_mut() else {
            return false;
        };
        if file.write_all(data).is_err() {
            self.file = None;
            return false;
        }
        self.bytes_written += data.len();
        true
    }

    fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    fn flush(&mut self) {
        if let Some(file) = self.file.as_mut() {
            let _ = file.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepend_swaps_into_place() {
        let mut head = MemoryWriteStream::new();
        head.write_text("head ");
        let mut body = MemoryWriteStream::new();
        body.write_text("body");
        head.prepend_to_and_reset(&mut body);
        assert_eq!(body.as_bytes(), b"head body");
        assert_eq!(head.bytes_written(), 0);
    }

    #[test]
    fn read_range_checked() {
        let mut stream = MemoryWriteStream::new();
        stream.write(&[1, 2, 3, 4]);
        let mut out = [0u8; 2];
        assert!(stream.read(&mut out, 1));
        assert_eq!(out, [2, 3]);
        assert!(!stream.read(&mut out, 3));
    }
}
