//! Streaming zlib compression for PDF object streams.

use miniz_oxide::deflate::core::{create_comp_flags_from_zip_params, CompressorOxide};
use miniz_oxide::deflate::stream::deflate;
use miniz_oxide::MZFlush;

use crate::stream::WriteStream;

const INPUT_BUFFER_SIZE: usize = 4096;
const OUTPUT_BUFFER_SIZE: usize = 4224;

/// A write stream that deflates everything written through it into an inner stream.
/// Call [`finalize`](DeflateWriteStream::finalize) to flush the zlib tail; dropping
/// the stream finalizes as well. After any compression error the stream latches into
/// a failed state and writes become no-ops returning false.
pub struct DeflateWriteStream<'a> {
    out: &'a mut dyn WriteStream,
    compressor: Box<CompressorOxide>,
    in_buffer: [u8; INPUT_BUFFER_SIZE],
    in_buffer_index: usize,
    total_in: usize,
    finalized: bool,
    failed: bool,
}

impl<'a> DeflateWriteStream<'a> {
    /// Wraps `out` with a zlib compressor. `compression_level` follows zlib: -1 for
    /// the default, 0..=9 otherwise. Level 0 is treated as the default rather than
    /// stored (pass-through should be handled by the caller skipping compression).
    pub fn new(out: &'a mut dyn WriteStream, compression_level: i32) -> DeflateWriteStream<'a> {
        debug_assert!((-1..=9).contains(&compression_level));
        let level = if compression_level < 0 { 6 } else { compression_level };
        // Positive window bits select the zlib wrapper, matching deflateInit2.
        let flags = create_comp_flags_from_zip_params(level, 15, 0);
        let compressor = Box::new(CompressorOxide::new(flags));
        DeflateWriteStream {
            out,
            compressor,
            in_buffer: [0u8; INPUT_BUFFER_SIZE],
            in_buffer_index: 0,
            total_in: 0,
            finalized: false,
            failed: false,
        }
    }

    fn do_deflate(&mut self, flush: MZFlush) {
        let mut input = &self.in_buffer[..self.in_buffer_index];
        let mut out_buffer = [0u8; OUTPUT_BUFFER_SIZE];
        loop {
            let result = deflate(&mut self.compressor, input, &mut out_buffer, flush);
            if !self.out.write(&out_buffer[..result.bytes_written]) {
                self.failed = true;
            }
            input = &input[result.bytes_consumed..];
            if result.status.is_err() {
                self.failed = true;
                break;
            }
            // Keep pumping while there is unconsumed input or the output buffer
            // filled completely.
            if input.is_empty() && result.bytes_written < OUTPUT_BUFFER_SIZE {
                break;
            }
        }
        self.total_in += self.in_buffer_index;
        self.in_buffer_index = 0;
    }

    /// Flushes buffered input and terminates the zlib stream.
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;
        if !self.failed {
            self.do_deflate(MZFlush::Finish);
        }
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }
}

impl WriteStream for DeflateWriteStream<'_> {
    fn write(&mut self, data: &[u8]) -> bool {
        if self.failed || self.finalized {
            return false;
        }
        let mut remaining = data;
        while !remaining.is_empty() {
            let to_copy = remaining.len().min(INPUT_BUFFER_SIZE - self.in_buffer_index);
            self.in_buffer[self.in_buffer_index..self.in_buffer_index + to_copy]
                .copy_from_slice(&remaining[..to_copy]);
            self.in_buffer_index += to_copy;
            remaining = &remaining[to_copy..];
            // Only call into the compressor on a full buffer.
            if self.in_buffer_index == INPUT_BUFFER_SIZE {
                self.do_deflate(MZFlush::None);
                if self.failed {
                    return false;
                }
            }
        }
        true
    }

    fn bytes_written(&self) -> usize {
        self.total_in + self.in_buffer_index
    }
}

impl Drop for DeflateWriteStream<'_> {
    fn drop(&mut self) {
        self.finalize();
    }
}

/// One-shot helper: deflates `data` at the given level.
pub fn deflate_bytes(data: &[u8], compression_level: i32) -> Vec<u8> {
    let mut buffer = crate::stream::MemoryWriteStream::new();
    {
        let mut stream = DeflateWriteStream::new(&mut buffer, compression_level);
        stream.write(data);
        stream.finalize();
    }
    buffer.read_data()
}

#[cfg(test)]
mod tests {
    use super::*;
    use miniz_oxide::inflate::decompress_to_vec_zlib;

    #[test]
    fn round_trips_through_inflate() {
        let payload: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        let compressed = deflate_bytes(&payload, -1);
        assert!(compressed.len() < payload.len());
        assert_eq!(decompress_to_vec_zlib(&compressed).unwrap(), payload);
    }

    #[test]
    fn streaming_writes_match_one_shot() {
        let payload = b"the quick brown fox jumps over the lazy dog".repeat(500);
        let mut buffer = crate::stream::MemoryWriteStream::new();
        {
            let mut stream = DeflateWriteStream::new(&mut buffer, 9);
            for chunk in payload.chunks(7) {
                assert!(stream.write(chunk));
            }
            assert_eq!(stream.bytes_written(), payload.len());
            stream.finalize();
        }
        assert_eq!(decompress_to_vec_zlib(buffer.as_bytes()).unwrap(), payload);
    }
}
