//! Segments: contiguous runs of blocks on the medium
//!
//! A segment is the unit of both occupancy and free space. Segments are
//! immutable values; resizing produces a new segment through
//! [`Segment::take_prefix`] or [`Segment::shrink_from_left`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// A contiguous range of blocks `[offset, offset + length)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Segment {
    /// First block of the run
    pub offset: u64,
    /// Number of contiguous blocks (never zero)
    pub length: u64,
}

impl Segment {
    /// Create a segment
    ///
    /// # Panics
    ///
    /// Panics if `length` is zero. Empty segments never exist on the medium.
    pub fn new(offset: u64, length: u64) -> Self {
        assert!(length > 0, "zero-length segment at offset {}", offset);
        Segment { offset, length }
    }

    /// One past the last block of the segment
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    /// Check if this segment shares any block with another
    pub fn overlaps(&self, other: &Segment) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }

    /// Check if this segment is adjacent to another (can be coalesced)
    pub fn is_adjacent(&self, other: &Segment) -> bool {
        self.end() == other.offset || other.end() == self.offset
    }

    /// Coalesce two adjacent segments
    pub fn coalesce(&self, other: &Segment) -> Option<Segment> {
        if !self.is_adjacent(other) {
            return None;
        }

        let start = self.offset.min(other.offset);
        let end = self.end().max(other.end());

        Some(Segment::new(start, end - start))
    }

    /// The first `n` blocks of this segment
    ///
    /// # Panics
    ///
    /// Panics unless `0 < n <= length`.
    pub fn take_prefix(&self, n: u64) -> Segment {
        assert!(
            n <= self.length,
            "prefix of {} blocks exceeds segment {}",
            n,
            self
        );
        Segment::new(self.offset, n)
    }

    /// What remains after dropping the first `n` blocks
    ///
    /// # Panics
    ///
    /// Panics unless `0 < n < length`; dropping every block leaves nothing to
    /// return.
    pub fn shrink_from_left(&self, n: u64) -> Segment {
        assert!(
            n > 0 && n < self.length,
            "cannot shrink segment {} by {} blocks",
            self,
            n
        );
        Segment::new(self.offset + n, self.length - n)
    }

    /// Sum of every block position in the segment
    ///
    /// Closed form of `offset + (offset + 1) + ... + (end - 1)`.
    pub fn position_sum(&self) -> u128 {
        let offset = self.offset as u128;
        let length = self.length as u128;
        length * (2 * offset + length - 1) / 2
    }
}

impl fmt::Display for Segment {
    /// Inclusive block range, e.g. `2-4`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.offset, self.end() - 1)
    }
}
