//! Compaction passes over a disk map
//!
//! Both policies walk files from the highest id down and only ever move a
//! file into free space that starts before its current offset:
//!
//! - **Fragmenting**: fill the leftmost free blocks, splitting the file
//!   across as many free segments as needed. The pass ends at the first file
//!   that cannot be fully relocated; its unplaced blocks stay at the front
//!   of its original extent.
//! - **Whole-extent**: move the file as one extent into the leftmost free
//!   segment large enough to hold it, or leave it where it is. Every file
//!   gets one attempt.
//!
//! Vacated blocks are returned to the free list so the medium stays fully
//! tiled after every step.

use crate::allocator::extent::Segment;
use crate::allocator::free_space::FreeSpaceTracker;
use crate::diskmap::DiskMap;
use crate::error::Result;
use crate::occupancy::{FileId, OccupancyTable};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Relocation strategy for a compaction pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Policy {
    /// Move blocks individually, splitting files across free segments
    Fragmenting,
    /// Move each file as a single extent or not at all
    WholeExtent,
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Fragmenting => write!(f, "fragmenting"),
            Policy::WholeExtent => write!(f, "whole-extent"),
        }
    }
}

impl FromStr for Policy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fragmenting" => Ok(Policy::Fragmenting),
            "whole-extent" => Ok(Policy::WholeExtent),
            _ => Err(format!(
                "Invalid policy '{}'. Valid options: fragmenting, whole-extent",
                s
            )),
        }
    }
}

/// Summary of a finished compaction pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionReport {
    pub policy: Policy,
    /// Files the pass looked at before finishing or stopping
    pub files_examined: usize,
    /// Files that moved at least one block
    pub files_relocated: usize,
    /// Files already split across segments, left untouched
    pub files_skipped: usize,
    /// Files spread over more than one segment after the pass
    pub files_fragmented: usize,
    pub blocks_moved: u64,
    /// File at which a fragmenting pass ran out of free space
    pub stopped_early_at: Option<FileId>,
    pub free_extents_before: usize,
    pub free_extents_after: usize,
    pub largest_free_extent_after: u64,
}

impl CompactionReport {
    fn new(policy: Policy, map: &DiskMap) -> Self {
        CompactionReport {
            policy,
            files_examined: 0,
            files_relocated: 0,
            files_skipped: 0,
            files_fragmented: 0,
            blocks_moved: 0,
            stopped_early_at: None,
            free_extents_before: map.free_space().extent_count(),
            free_extents_after: 0,
            largest_free_extent_after: 0,
        }
    }

    /// Serialize the report as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// What happened to a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relocation {
    /// No eligible space, file untouched
    Stayed,
    /// File was already fragmented and is not considered for moves
    Skipped,
    /// Every block of the file moved
    Moved { blocks: u64 },
    /// Free space ran out with part of the file still unplaced
    Stranded { moved: u64 },
}

/// Runs compaction passes with a fixed configuration
#[derive(Debug, Clone)]
pub struct Compactor {
    policy: Policy,
    verify_each_step: bool,
}

impl Compactor {
    /// Create a compactor with default settings for a policy
    pub fn new(policy: Policy) -> Self {
        Compactor::builder().policy(policy).build()
    }

    pub fn builder() -> CompactorBuilder {
        CompactorBuilder::new()
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Compact the disk map in place
    ///
    /// # Panics
    ///
    /// Panics if the pass breaks the partition invariant. The invariant is
    /// always checked when the pass finishes, and after every file when
    /// `verify_each_step` is set.
    pub fn run(&self, map: &mut DiskMap) -> CompactionReport {
        info!(
            "Compacting {} files ({} blocks) with {} policy",
            map.files().len(),
            map.total_blocks(),
            self.policy
        );

        let mut report = CompactionReport::new(self.policy, map);

        // Snapshot ids up front; the table is only touched by key afterwards
        let ids = map.files().ids_descending();
        for id in ids {
            report.files_examined += 1;

            let (files, free) = map.parts_mut();
            let outcome = match self.policy {
                Policy::Fragmenting => relocate_fragmenting(files, free, id),
                Policy::WholeExtent => relocate_whole_extent(files, free, id),
            };

            if self.verify_each_step {
                map.assert_partition();
            }

            match outcome {
                Relocation::Stayed => {}
                Relocation::Skipped => report.files_skipped += 1,
                Relocation::Moved { blocks } => {
                    report.files_relocated += 1;
                    report.blocks_moved += blocks;
                }
                Relocation::Stranded { moved } => {
                    if moved > 0 {
                        report.files_relocated += 1;
                        report.blocks_moved += moved;
                    }
                    report.stopped_early_at = Some(id);
                    break;
                }
            }
        }

        map.assert_partition();

        report.files_fragmented = map.files().fragmented_files();
        report.free_extents_after = map.free_space().extent_count();
        report.largest_free_extent_after = map.free_space().largest_extent();

        info!(
            "{} pass done: {} of {} files relocated, {} blocks moved, {} -> {} free extents",
            self.policy,
            report.files_relocated,
            report.files_examined,
            report.blocks_moved,
            report.free_extents_before,
            report.free_extents_after
        );

        report
    }
}

impl Default for Compactor {
    fn default() -> Self {
        Compactor::builder().build()
    }
}

/// Builder for configuring a [`Compactor`]
///
/// # Examples
///
/// ```
/// use diskmap_rs::{Compactor, DiskMap, Policy};
///
/// let compactor = Compactor::builder()
///     .policy(Policy::WholeExtent)
///     .verify_each_step(true)
///     .build();
///
/// let mut map = DiskMap::parse("2333133121414131402").unwrap();
/// let report = compactor.run(&mut map);
/// assert_eq!(report.files_relocated, 4);
/// ```
#[derive(Debug, Clone)]
pub struct CompactorBuilder {
    policy: Policy,
    verify_each_step: bool,
}

impl CompactorBuilder {
    /// Create a builder with default settings (fragmenting, final check only)
    pub fn new() -> Self {
        CompactorBuilder {
            policy: Policy::Fragmenting,
            verify_each_step: false,
        }
    }

    pub fn policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    /// Check the partition invariant after every file, not just at the end
    pub fn verify_each_step(mut self, enabled: bool) -> Self {
        self.verify_each_step = enabled;
        self
    }

    pub fn build(self) -> Compactor {
        debug!(
            "Building compactor: policy={}, verify_each_step={}",
            self.policy, self.verify_each_step
        );
        Compactor {
            policy: self.policy,
            verify_each_step: self.verify_each_step,
        }
    }
}

impl Default for CompactorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The single extent a file still occupies, `None` once it is fragmented
fn sole_extent(files: &OccupancyTable, id: FileId) -> Option<Segment> {
    match files.get(id) {
        Some([extent]) => Some(*extent),
        Some(_) => None,
        None => panic!("file {} missing from occupancy table", id),
    }
}

fn relocate_fragmenting(
    files: &mut OccupancyTable,
    free: &mut FreeSpaceTracker,
    id: FileId,
) -> Relocation {
    let Some(original) = sole_extent(files, id) else {
        debug!("File {} is already fragmented, skipping", id);
        return Relocation::Skipped;
    };

    let (mut placed, unmet) = free.take_fragmented(original.length, original.offset);

    if unmet == 0 {
        debug!(
            "Relocated file {} from {} into {} segment(s)",
            id,
            original,
            placed.len()
        );
        files.replace(id, placed);
        free.release(original);
        return Relocation::Moved {
            blocks: original.length,
        };
    }

    // Unplaced blocks keep the front of the original extent
    let moved = original.length - unmet;
    placed.push(original.take_prefix(unmet));
    files.replace(id, placed);
    if moved > 0 {
        free.release(original.shrink_from_left(unmet));
    }

    info!(
        "No free space left below file {}: {} of {} blocks stay at offset {}, stopping pass",
        id, unmet, original.length, original.offset
    );
    Relocation::Stranded { moved }
}

fn relocate_whole_extent(
    files: &mut OccupancyTable,
    free: &mut FreeSpaceTracker,
    id: FileId,
) -> Relocation {
    let Some(original) = sole_extent(files, id) else {
        debug!("File {} is already fragmented, skipping", id);
        return Relocation::Skipped;
    };

    match free.take_best_fit_single(original.length, original.offset) {
        Some(target) => {
            debug!("Relocated file {} from {} to {}", id, original, target);
            files.replace(id, vec![target]);
            free.release(original);
            Relocation::Moved {
                blocks: original.length,
            }
        }
        None => {
            debug!("File {} stays at {}: no free extent fits", id, original);
            Relocation::Stayed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::checksum::checksum;

    const SAMPLE: &str = "2333133121414131402";

    fn compact(text: &str, policy: Policy) -> (DiskMap, CompactionReport) {
        let mut map = DiskMap::parse(text).unwrap();
        let report = Compactor::builder()
            .policy(policy)
            .verify_each_step(true)
            .build()
            .run(&mut map);
        (map, report)
    }

    #[test]
    fn test_policy_parse_and_display() {
        assert_eq!("fragmenting".parse::<Policy>(), Ok(Policy::Fragmenting));
        assert_eq!("Whole-Extent".parse::<Policy>(), Ok(Policy::WholeExtent));
        assert!("best-fit".parse::<Policy>().is_err());
        assert_eq!(Policy::WholeExtent.to_string(), "whole-extent");
    }

    #[test]
    fn test_fragmenting_small_map() {
        let (map, report) = compact("12345", Policy::Fragmenting);
        assert_eq!(map.render_blocks(), "022111222......");
        assert_eq!(report.stopped_early_at, Some(1));
        assert_eq!(checksum(map.files()), 60);
    }

    #[test]
    fn test_fragmenting_sample() {
        let (map, report) = compact(SAMPLE, Policy::Fragmenting);

        assert_eq!(
            map.render_blocks(),
            "0099811188827773336446555566.............."
        );
        assert_eq!(checksum(map.files()), 1928);

        assert_eq!(report.files_examined, 4);
        assert_eq!(report.files_relocated, 4);
        assert_eq!(report.blocks_moved, 12);
        assert_eq!(report.files_fragmented, 2);
        assert_eq!(report.free_extents_before, 8);
        assert_eq!(report.free_extents_after, 1);
        assert_eq!(report.largest_free_extent_after, 14);
    }

    #[test]
    fn test_fragmenting_stops_at_first_stranded_file() {
        // File 6 only half fits below its offset. The pass ends there even
        // though files 0-5 were never examined.
        let (map, report) = compact(SAMPLE, Policy::Fragmenting);
        assert_eq!(report.stopped_early_at, Some(6));
        assert_eq!(
            map.files().get(6).unwrap(),
            &[
                Segment::new(18, 1),
                Segment::new(21, 1),
                Segment::new(26, 1),
                Segment::new(27, 1)
            ]
        );
        for id in 0..6 {
            assert_eq!(map.files().get(id).unwrap().len(), 1);
        }
        assert_eq!(map.files().get(5).unwrap(), &[Segment::new(22, 4)]);
    }

    #[test]
    fn test_whole_extent_sample() {
        let (map, report) = compact(SAMPLE, Policy::WholeExtent);

        assert_eq!(
            map.render_blocks(),
            "00992111777.44.333....5555.6666.....8888.."
        );
        assert_eq!(checksum(map.files()), 2858);

        assert_eq!(report.files_examined, 10);
        assert_eq!(report.files_relocated, 4);
        assert_eq!(report.blocks_moved, 8);
        assert_eq!(report.files_fragmented, 0);
        assert_eq!(report.stopped_early_at, None);
    }

    #[test]
    fn test_whole_extent_never_splits() {
        let (map, _) = compact(SAMPLE, Policy::WholeExtent);
        assert!(map.files().iter().all(|(_, segs)| segs.len() == 1));
    }

    #[test]
    fn test_no_eligible_space_leaves_file_in_place() {
        let (map, report) = compact("505", Policy::Fragmenting);
        assert_eq!(map.files().get(1).unwrap(), &[Segment::new(5, 5)]);
        assert_eq!(report.stopped_early_at, Some(1));
        assert_eq!(report.blocks_moved, 0);
        assert_eq!(report.files_relocated, 0);

        let (map, report) = compact("505", Policy::WholeExtent);
        assert_eq!(map.files().get(1).unwrap(), &[Segment::new(5, 5)]);
        assert_eq!(report.files_relocated, 0);
        assert_eq!(report.files_examined, 2);
    }

    #[test]
    fn test_whole_extent_skips_files_too_large() {
        // Gap of 2 below a 3-block file: stays. The 1-block file behind it moves.
        let (map, report) = compact("12301", Policy::WholeExtent);
        assert_eq!(map.render_blocks(), "02.111.");
        assert_eq!(report.files_relocated, 1);
    }

    #[test]
    fn test_whole_extent_first_fit_by_position() {
        let (map, _) = compact("1213141", Policy::WholeExtent);
        assert_eq!(map.render_blocks(), "0321.........");
        assert_eq!(checksum(map.files()), 10);
    }

    #[test]
    fn test_single_file_is_untouched() {
        for policy in [Policy::Fragmenting, Policy::WholeExtent] {
            let (map, _) = compact("7", policy);
            assert_eq!(map.render_blocks(), "0000000");
            assert_eq!(checksum(map.files()), 0);
        }
    }

    #[test]
    fn test_second_pass_skips_fragmented_files() {
        let (mut map, _) = compact(SAMPLE, Policy::Fragmenting);
        let report = Compactor::new(Policy::WholeExtent).run(&mut map);

        assert_eq!(report.files_skipped, 2);
        assert_eq!(report.files_relocated, 0);
        assert_eq!(checksum(map.files()), 1928);
    }

    #[test]
    fn test_report_json() {
        let (_, report) = compact(SAMPLE, Policy::Fragmenting);
        let json = report.to_json().unwrap();
        assert!(json.contains("\"policy\": \"fragmenting\""));
        assert!(json.contains("\"stopped_early_at\": 6"));

        let back: CompactionReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}
