//! Free-space tracking for the compactor
//!
//! Free segments are kept in a B-tree keyed by offset, so every scan is in
//! ascending block order and a ceiling is just a range bound. Returned
//! blocks are coalesced with their neighbours on insertion; no two free
//! segments ever touch.

use crate::allocator::extent::Segment;
use std::collections::BTreeMap;
use tracing::trace;

/// Ordered collection of free segments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreeSpaceTracker {
    /// Free segments indexed by starting offset
    free_segments: BTreeMap<u64, Segment>,

    /// Number of free blocks across all segments
    free_blocks: u64,
}

impl FreeSpaceTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Greedily take up to `need` blocks from free segments below `ceiling`
    ///
    /// Segments are consumed lowest offset first. A segment no larger than
    /// the outstanding need is taken whole; a larger one gives up its low
    /// blocks and keeps the rest in place. Returns the segments taken, in
    /// ascending order, and the number of blocks that found no home.
    pub fn take_fragmented(&mut self, need: u64, ceiling: u64) -> (Vec<Segment>, u64) {
        let mut taken = Vec::new();
        let mut remaining = need;

        while remaining > 0 {
            let Some((&offset, &free)) = self.free_segments.range(..ceiling).next() else {
                break;
            };
            self.free_segments.remove(&offset);

            if free.length <= remaining {
                remaining -= free.length;
                taken.push(free);
            } else {
                taken.push(free.take_prefix(remaining));
                let rest = free.shrink_from_left(remaining);
                self.free_segments.insert(rest.offset, rest);
                remaining = 0;
            }
        }

        self.free_blocks -= need - remaining;
        trace!(
            need,
            ceiling,
            unmet = remaining,
            pieces = taken.len(),
            "fragmented take"
        );

        (taken, remaining)
    }

    /// Take `need` contiguous blocks from the leftmost free segment below
    /// `ceiling` that can hold them
    ///
    /// Position wins over size: the first sufficiently large segment is used
    /// even when a tighter one exists further right. An exact fit removes the
    /// segment; otherwise it shrinks from the left.
    ///
    /// # Panics
    ///
    /// Panics if `need` is zero.
    pub fn take_best_fit_single(&mut self, need: u64, ceiling: u64) -> Option<Segment> {
        assert!(need > 0, "cannot place a zero-length extent");

        let (offset, free) = self
            .free_segments
            .range(..ceiling)
            .map(|(&offset, &free)| (offset, free))
            .find(|(_, free)| free.length >= need)?;

        self.free_segments.remove(&offset);
        if free.length > need {
            let rest = free.shrink_from_left(need);
            self.free_segments.insert(rest.offset, rest);
        }
        self.free_blocks -= need;

        let placed = free.take_prefix(need);
        trace!(need, ceiling, placed = %placed, "single-extent take");
        Some(placed)
    }

    /// Return a segment to free space, coalescing with adjacent free segments
    ///
    /// # Panics
    ///
    /// Panics if the segment overlaps space that is already free.
    pub fn release(&mut self, segment: Segment) {
        let mut merged = segment;
        let mut to_remove = Vec::new();

        // Check previous segment (by offset)
        if let Some((&prev_offset, prev)) = self.free_segments.range(..=segment.offset).next_back()
        {
            assert!(
                !prev.overlaps(&segment),
                "released segment {} overlaps free segment {}",
                segment,
                prev
            );
            if let Some(joined) = prev.coalesce(&merged) {
                merged = joined;
                to_remove.push(prev_offset);
            }
        }

        // Check next segment (by offset)
        if let Some((&next_offset, next)) = self.free_segments.range(segment.offset + 1..).next() {
            assert!(
                !next.overlaps(&segment),
                "released segment {} overlaps free segment {}",
                segment,
                next
            );
            if let Some(joined) = merged.coalesce(next) {
                merged = joined;
                to_remove.push(next_offset);
            }
        }

        for key in to_remove {
            self.free_segments.remove(&key);
        }
        self.free_segments.insert(merged.offset, merged);
        self.free_blocks += segment.length;

        trace!(released = %segment, merged = %merged, "released blocks");
    }

    /// Free segments in ascending offset order
    pub fn segments(&self) -> impl Iterator<Item = &Segment> + '_ {
        self.free_segments.values()
    }

    /// Total number of free blocks
    pub fn free_blocks(&self) -> u64 {
        self.free_blocks
    }

    /// Number of free segments (fragmentation indicator)
    pub fn extent_count(&self) -> usize {
        self.free_segments.len()
    }

    /// Length of the largest free segment, zero when nothing is free
    pub fn largest_extent(&self) -> u64 {
        self.free_segments
            .values()
            .map(|seg| seg.length)
            .max()
            .unwrap_or(0)
    }
}
