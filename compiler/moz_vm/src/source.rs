//! Byte-addressable input consumed by the machine.

use std::borrow::Cow;

/// Read-only input a parse runs over.
///
/// Positions are byte offsets. Out-of-range reads never panic: `byte_at`
/// returns `None` at or past the end and sub-slices are clamped.
pub trait Source {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte at `pos`, or `None` at end of input.
    fn byte_at(&self, pos: usize) -> Option<u8>;

    /// Whether `bytes` occurs at `pos`.
    fn matches_at(&self, pos: usize, bytes: &[u8]) -> bool;

    /// Bytes in `start..end`, clamped to the input.
    fn sub_bytes(&self, start: usize, end: usize) -> &[u8];

    /// Text in `start..end`, with invalid UTF-8 replaced.
    fn sub_string(&self, start: usize, end: usize) -> Cow<'_, str> {
        String::from_utf8_lossy(self.sub_bytes(start, end))
    }

    /// 1-based line containing `pos`.
    fn line_of(&self, pos: usize) -> usize;

    /// 1-based byte column of `pos` within its line.
    fn column_of(&self, pos: usize) -> usize;
}

/// In-memory source over a borrowed byte slice.
///
/// Line starts are indexed once at construction so line/column lookup is a
/// binary search.
#[derive(Clone, Debug)]
pub struct ByteSource<'a> {
    bytes: &'a [u8],
    line_starts: Vec<usize>,
}

impl<'a> ByteSource<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(memchr::memchr_iter(b'\n', bytes).map(|nl| nl + 1));
        ByteSource { bytes, line_starts }
    }

    fn line_index(&self, pos: usize) -> usize {
        let pos = pos.min(self.bytes.len());
        // line_starts[0] == 0, so at least one start is <= pos.
        self.line_starts.partition_point(|&start| start <= pos) - 1
    }
}

impl<'a> From<&'a str> for ByteSource<'a> {
    fn from(text: &'a str) -> Self {
        ByteSource::new(text.as_bytes())
    }
}

impl<'a> From<&'a [u8]> for ByteSource<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        ByteSource::new(bytes)
    }
}

impl Source for ByteSource<'_> {
    #[inline]
    fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    fn byte_at(&self, pos: usize) -> Option<u8> {
        self.bytes.get(pos).copied()
    }

    #[inline]
    fn matches_at(&self, pos: usize, bytes: &[u8]) -> bool {
        self.bytes
            .get(pos..)
            .is_some_and(|rest| rest.starts_with(bytes))
    }

    fn sub_bytes(&self, start: usize, end: usize) -> &[u8] {
        let end = end.min(self.bytes.len());
        let start = start.min(end);
        &self.bytes[start..end]
    }

    fn line_of(&self, pos: usize) -> usize {
        self.line_index(pos) + 1
    }

    fn column_of(&self, pos: usize) -> usize {
        let pos = pos.min(self.bytes.len());
        pos - self.line_starts[self.line_index(pos)] + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_access() {
        let src = ByteSource::from("abc");
        assert_eq!(src.len(), 3);
        assert_eq!(src.byte_at(0), Some(b'a'));
        assert_eq!(src.byte_at(3), None);
        assert!(src.matches_at(1, b"bc"));
        assert!(!src.matches_at(1, b"bcd"));
        assert!(src.matches_at(3, b""));
        assert!(!src.matches_at(4, b""));
    }

    #[test]
    fn test_sub_ranges_clamp() {
        let src = ByteSource::from("hello");
        assert_eq!(src.sub_bytes(1, 3), b"el");
        assert_eq!(src.sub_bytes(3, 99), b"lo");
        assert_eq!(src.sub_bytes(4, 2), b"");
        assert_eq!(src.sub_string(0, 5), "hello");
    }

    #[test]
    fn test_line_and_column() {
        let src = ByteSource::from("ab\ncd\n\nx");
        assert_eq!((src.line_of(0), src.column_of(0)), (1, 1));
        assert_eq!((src.line_of(2), src.column_of(2)), (1, 3));
        assert_eq!((src.line_of(3), src.column_of(3)), (2, 1));
        assert_eq!((src.line_of(6), src.column_of(6)), (3, 1));
        assert_eq!((src.line_of(7), src.column_of(7)), (4, 1));
        // End of input is addressable for diagnostics.
        assert_eq!((src.line_of(8), src.column_of(8)), (4, 2));
    }
}
