//! 256-bit byte class bitmap.

use std::fmt;

/// Set of byte values, one bit per value.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Default)]
pub struct ByteSet {
    bits: [u64; 4],
}

impl ByteSet {
    /// The empty set.
    pub const fn new() -> Self {
        ByteSet { bits: [0; 4] }
    }

    /// Build a set from inclusive `(lo, hi)` ranges.
    pub fn from_ranges(ranges: &[(u8, u8)]) -> Self {
        let mut set = ByteSet::new();
        for &(lo, hi) in ranges {
            set.insert_range(lo, hi);
        }
        set
    }

    /// Build a set from individual bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut set = ByteSet::new();
        for &b in bytes {
            set.insert(b);
        }
        set
    }

    #[inline]
    pub fn insert(&mut self, byte: u8) {
        self.bits[usize::from(byte >> 6)] |= 1u64 << (byte & 63);
    }

    /// Insert every byte in `lo..=hi`. Empty when `lo > hi`.
    pub fn insert_range(&mut self, lo: u8, hi: u8) {
        for b in lo..=hi {
            self.insert(b);
        }
    }

    #[inline]
    pub fn contains(&self, byte: u8) -> bool {
        self.bits[usize::from(byte >> 6)] & (1u64 << (byte & 63)) != 0
    }

    /// Complement with respect to all 256 byte values.
    #[must_use]
    pub fn negate(self) -> Self {
        ByteSet {
            bits: self.bits.map(|w| !w),
        }
    }

    /// Number of bytes in the set.
    pub fn len(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bits == [0; 4]
    }

    /// Iterate the members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=255u8).filter(move |&b| self.contains(b))
    }
}

impl fmt::Debug for ByteSet {
    /// Prints runs as `[0-9a-f]`, escaping non-printable bytes.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn byte(f: &mut fmt::Formatter<'_>, b: u8) -> fmt::Result {
            if b.is_ascii_graphic() && b != b']' && b != b'\\' && b != b'-' {
                write!(f, "{}", char::from(b))
            } else {
                write!(f, "\\x{b:02x}")
            }
        }

        write!(f, "[")?;
        let members: Vec<u8> = self.iter().collect();
        let mut i = 0;
        while i < members.len() {
            let lo = members[i];
            let mut j = i;
            while j + 1 < members.len() && members[j + 1] == members[j].wrapping_add(1) {
                j += 1;
            }
            byte(f, lo)?;
            if j > i {
                write!(f, "-")?;
                byte(f, members[j])?;
            }
            i = j + 1;
        }
        write!(f, "]")
    }
}
