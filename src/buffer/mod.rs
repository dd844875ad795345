//! Capture buffer for pseudo-terminal output

mod ansi;

pub use ansi::AnsiStripper;

use bytes::BytesMut;

/// Ratio for buffer compaction strategy.
/// When buffer is full, discard oldest 1/3 and keep newest 2/3.
const DISCARD_RATIO: usize = 3;

/// Capacity reserved up front
const INITIAL_CAPACITY: usize = 64 * 1024;

/// Accumulates output read from a session.
///
/// Appends never drop data. A bounded buffer is brought back under `max_size`
/// by [`enforce_limit`](Self::enforce_limit), which keeps the newest two thirds
/// of the capacity; callers search the buffer before calling it.
pub struct BufferManager {
    buffer: BytesMut,
    max_size: usize,
    stripper: Option<AnsiStripper>,
}

impl BufferManager {
    /// Create a buffer bounded by `max_size`
    pub fn new(max_size: usize, strip_ansi: bool) -> Self {
        Self {
            buffer: BytesMut::with_capacity(max_size.min(INITIAL_CAPACITY)),
            max_size,
            stripper: strip_ansi.then(AnsiStripper::new),
        }
    }

    /// Create a buffer that keeps everything appended
    pub fn unbounded(strip_ansi: bool) -> Self {
        Self::new(usize::MAX, strip_ansi)
    }

    /// Append data to the buffer
    pub fn append(&mut self, data: &[u8]) {
        let stripped;
        let data = match &mut self.stripper {
            Some(stripper) => {
                let mut out = Vec::with_capacity(data.len());
                stripper.feed(data, &mut out);
                stripped = out;
                &stripped[..]
            }
            None => data,
        };

        self.buffer.extend_from_slice(data);
    }

    /// Compact to the newest two thirds of `max_size` if over the bound
    pub fn enforce_limit(&mut self) {
        if self.buffer.len() > self.max_size {
            self.compact();
        }
    }

    /// Get the buffer as bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the current buffer length
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing has been captured
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Consume the manager, returning the captured bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer.to_vec()
    }

    fn compact(&mut self) {
        let keep = self.max_size - self.max_size / DISCARD_RATIO;
        let keep_from = self.buffer.len().saturating_sub(keep);

        if keep_from > 0 {
            let _ = self.buffer.split_to(keep_from);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer() {
        let buffer = BufferManager::new(1024, false);
        assert_eq!(buffer.len(), 0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_appends() {
        let mut buffer = BufferManager::new(1024, false);
        buffer.append(b"forge@host's ");
        buffer.append(b"password: ");
        assert_eq!(buffer.len(), 23);
        assert_eq!(buffer.as_bytes(), b"forge@host's password: ");
    }

    #[test]
    fn test_empty_append() {
        let mut buffer = BufferManager::new(1024, false);
        buffer.append(b"");

        assert!(buffer.is_empty());
    }

    #[test]
    fn test_compact_keeps_newest_two_thirds() {
        let mut buffer = BufferManager::new(90, false);

        buffer.append(b"0123456789".repeat(5).as_slice()); // 50 bytes
        buffer.append(b"ABCDEFGHIJ".repeat(5).as_slice());
        assert_eq!(buffer.len(), 100);
        buffer.enforce_limit();

        // compacted to the newest 60 bytes
        assert_eq!(buffer.len(), 60);
        assert!(buffer.as_bytes().ends_with(b"ABCDEFGHIJ"));
        assert!(buffer.as_bytes().starts_with(b"0123456789"));
    }

    #[test]
    fn test_compact_oversized_chunk() {
        let mut buffer = BufferManager::new(30, false);

        buffer.append(b"old");
        buffer.append(b"X".repeat(40).as_slice());
        buffer.enforce_limit();

        assert_eq!(buffer.as_bytes(), b"X".repeat(20).as_slice());
    }

    #[test]
    fn test_prompt_survives_compaction() {
        let mut buffer = BufferManager::new(64, false);

        buffer.append(b"banner line\r\n".repeat(10).as_slice());
        buffer.append(b"forge@host's password: ");
        buffer.enforce_limit();

        assert!(buffer.len() <= 64);
        assert!(buffer.as_bytes().ends_with(b"password: "));
    }

    #[test]
    fn test_append_never_drops() {
        let mut buffer = BufferManager::new(16, false);
        buffer.append(b"password: plus forty more bytes of trailing output");

        assert!(buffer.as_bytes().starts_with(b"password: "));
        buffer.enforce_limit();
        assert!(buffer.len() <= 16);
    }

    #[test]
    fn test_unbounded_keeps_everything() {
        let mut buffer = BufferManager::unbounded(false);
        for _ in 0..100 {
            buffer.append(&[b'a'; 1024]);
            buffer.enforce_limit();
        }

        assert_eq!(buffer.len(), 100 * 1024);
    }

    #[test]
    fn test_strip_ansi_enabled() {
        let mut buffer = BufferManager::new(1024, true);
        buffer.append(b"\x1b[1mPassword\x1b[0m: ");

        assert_eq!(buffer.as_bytes(), b"Password: ");
    }

    #[test]
    fn test_strip_ansi_across_appends() {
        let mut buffer = BufferManager::new(1024, true);
        buffer.append(b"Pass\x1b[3");
        buffer.append(b"1mword:");

        assert_eq!(buffer.as_bytes(), b"Password:");
    }

    #[test]
    fn test_strip_ansi_disabled() {
        let mut buffer = BufferManager::new(1024, false);
        let data = b"Hello \x1b[31mRed\x1b[0m World";
        buffer.append(data);

        assert_eq!(buffer.as_bytes(), data);
    }

    #[test]
    fn test_invalid_utf8_kept_raw() {
        let mut buffer = BufferManager::new(1024, false);
        buffer.append(&[0xFF, 0xFE, 0xFD]);

        assert_eq!(buffer.into_bytes(), vec![0xFF, 0xFE, 0xFD]);
    }
}
