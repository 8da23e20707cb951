//! Chunked Transport Primitive
//!
//! A [`StreamWindow`] is a bounded, read-only view over a shared byte
//! stream, used to slice a large payload into fixed-size upload chunks.
//! Several windows may exist over the *same* underlying reader; the
//! underlying stream has a single cursor, so every window re-seeks to its
//! own position and reads while holding the shared lock. Interleaved
//! chunk readers therefore never corrupt each other's position.
//!
//! For non-seekable sources the offset is advisory: reading starts
//! wherever the stream currently is, and windows must be consumed in
//! order.

use std::io::{Read, Seek, SeekFrom};
use std::sync::{Arc, Mutex};

/// `Read + Seek` object-safe bound for shared seekable sources
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// Byte-range bookkeeping for one upload chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkData {
    /// First byte of the chunk (inclusive)
    pub start_byte: u64,
    /// Last byte of the chunk (inclusive)
    pub end_byte: u64,
    /// Total payload size, when known
    pub total_bytes: Option<u64>,
    last_override: Option<bool>,
}

impl ChunkData {
    /// Describe the chunk covering `[start_byte, end_byte]`
    pub fn new(start_byte: u64, end_byte: u64, total_bytes: Option<u64>) -> Self {
        Self {
            start_byte,
            end_byte,
            total_bytes,
            last_override: None,
        }
    }

    /// Force the last-chunk flag, for callers that learn the total size
    /// out of band
    pub fn with_last(mut self, last: bool) -> Self {
        self.last_override = Some(last);
        self
    }

    /// Whether this chunk ends the payload. Computed from the byte range
    /// unless explicitly overridden, so the flag stays correct even when
    /// the total size only became known after the chunk was created.
    pub fn is_last(&self) -> bool {
        match self.last_override {
            Some(last) => last,
            None => self
                .total_bytes
                .is_some_and(|total| total == self.end_byte + 1),
        }
    }

    /// Number of bytes the chunk covers; zero for inverted ranges
    pub fn len(&self) -> u64 {
        self.end_byte.checked_sub(self.start_byte).map_or(0, |d| d + 1)
    }

    /// Whether the chunk covers no bytes (degenerate ranges only)
    pub fn is_empty(&self) -> bool {
        self.end_byte < self.start_byte
    }

    /// `Content-Range` header value for this chunk
    pub fn content_range(&self) -> String {
        match self.total_bytes {
            Some(total) => format!("bytes {}-{}/{}", self.start_byte, self.end_byte, total),
            None => format!("bytes {}-{}/*", self.start_byte, self.end_byte),
        }
    }
}

enum WindowSource {
    Seekable(Arc<Mutex<dyn ReadSeek>>),
    Sequential(Arc<Mutex<dyn Read + Send>>),
}

/// A bounded window over a shared reader, exposing only
/// `[offset, offset + min(limit, len - offset))`.
pub struct StreamWindow {
    source: WindowSource,
    offset: u64,
    limit: u64,
    consumed: u64,
}

impl StreamWindow {
    /// Window over a seekable shared reader. Each read re-seeks to the
    /// window's own position under the shared lock.
    pub fn seekable(source: Arc<Mutex<dyn ReadSeek>>, offset: u64, limit: u64) -> Self {
        Self {
            source: WindowSource::Seekable(source),
            offset,
            limit,
            consumed: 0,
        }
    }

    /// Window over a non-seekable shared reader; `offset` is advisory and
    /// reading starts at the stream's current position.
    pub fn sequential(source: Arc<Mutex<dyn Read + Send>>, offset: u64, limit: u64) -> Self {
        Self {
            source: WindowSource::Sequential(source),
            offset,
            limit,
            consumed: 0,
        }
    }

    /// Bytes read through this window so far
    pub fn consumed(&self) -> u64 {
        self.consumed
    }
}

impl Read for StreamWindow {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let remaining = self.limit.saturating_sub(self.consumed);
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = remaining.min(buf.len() as u64) as usize;

        let read = match &self.source {
            WindowSource::Seekable(source) => {
                let mut guard = source.lock().map_err(|_| poisoned())?;
                // Seek + read as one critical section: another window may
                // have moved the cursor since our last read.
                guard.seek(SeekFrom::Start(self.offset + self.consumed))?;
                guard.read(&mut buf[..want])?
            }
            WindowSource::Sequential(source) => {
                let mut guard = source.lock().map_err(|_| poisoned())?;
                guard.read(&mut buf[..want])?
            }
        };
        self.consumed += read as u64;
        Ok(read)
    }
}

fn poisoned() -> std::io::Error {
    std::io::Error::other("shared stream lock poisoned")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn shared(data: &[u8]) -> Arc<Mutex<dyn ReadSeek>> {
        Arc::new(Mutex::new(Cursor::new(data.to_vec())))
    }

    #[test]
    fn window_yields_exactly_its_range() {
        let source = shared(b"0123456789");
        let mut window = StreamWindow::seekable(source, 2, 4);
        let mut out = Vec::new();
        window.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"2345");
    }

    #[test]
    fn window_is_clamped_by_stream_length() {
        let source = shared(b"0123456789");
        let mut window = StreamWindow::seekable(source, 7, 100);
        let mut out = Vec::new();
        window.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"789");
    }

    #[test]
    fn interleaved_windows_do_not_corrupt_each_other() {
        let source = shared(b"aaaabbbbcccc");
        let mut w1 = StreamWindow::seekable(source.clone(), 0, 4);
        let mut w2 = StreamWindow::seekable(source.clone(), 4, 4);
        let mut w3 = StreamWindow::seekable(source, 8, 4);

        // Read two bytes at a time from each window, round-robin.
        let mut out = [Vec::new(), Vec::new(), Vec::new()];
        for _ in 0..2 {
            for (i, w) in [&mut w1, &mut w2, &mut w3].into_iter().enumerate() {
                let mut buf = [0u8; 2];
                let n = w.read(&mut buf).unwrap();
                out[i].extend_from_slice(&buf[..n]);
            }
        }
        assert_eq!(out[0], b"aaaa");
        assert_eq!(out[1], b"bbbb");
        assert_eq!(out[2], b"cccc");
    }

    #[test]
    fn windows_are_usable_across_threads() {
        let source = shared(&vec![7u8; 64]);
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let mut window = StreamWindow::seekable(source.clone(), i * 16, 16);
                std::thread::spawn(move || {
                    let mut out = Vec::new();
                    window.read_to_end(&mut out).unwrap();
                    out.len()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 16);
        }
    }

    #[test]
    fn sequential_window_reads_from_current_position() {
        let inner: Arc<Mutex<dyn Read + Send>> =
            Arc::new(Mutex::new(Cursor::new(b"abcdef".to_vec())));
        let mut w1 = StreamWindow::sequential(inner.clone(), 0, 3);
        let mut w2 = StreamWindow::sequential(inner, 3, 3);
        let mut a = Vec::new();
        let mut b = Vec::new();
        w1.read_to_end(&mut a).unwrap();
        w2.read_to_end(&mut b).unwrap();
        assert_eq!(a, b"abc");
        assert_eq!(b, b"def");
    }

    #[test]
    fn last_chunk_is_computed_from_totals() {
        assert!(ChunkData::new(80, 99, Some(100)).is_last());
        assert!(!ChunkData::new(60, 79, Some(100)).is_last());
        assert!(!ChunkData::new(80, 99, None).is_last());
        assert!(ChunkData::new(80, 99, None).with_last(true).is_last());
        assert!(!ChunkData::new(80, 99, Some(100)).with_last(false).is_last());
    }

    #[test]
    fn degenerate_ranges_are_empty_with_zero_len() {
        let chunk = ChunkData::new(5, 4, None);
        assert!(chunk.is_empty());
        assert_eq!(chunk.len(), 0);

        let chunk = ChunkData::new(5, 5, None);
        assert!(!chunk.is_empty());
        assert_eq!(chunk.len(), 1);
    }

    #[test]
    fn content_range_formats() {
        assert_eq!(
            ChunkData::new(0, 19, Some(100)).content_range(),
            "bytes 0-19/100"
        );
        assert_eq!(ChunkData::new(20, 39, None).content_range(), "bytes 20-39/*");
    }
}
