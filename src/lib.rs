//! # diskmap-rs - Disk Map Compaction Simulator
//!
//! `diskmap-rs` models a storage medium as a row of fixed-size blocks, split
//! into file extents and free segments, and compacts it by moving files from
//! the end of the medium into free space nearer the start.
//!
//! - **Parsing** of the compressed run-length disk map (`2333133121414131402`)
//! - **Two compaction policies**: fragmenting block moves and whole-extent
//!   first-fit moves
//! - **Checksum** of the final layout, evaluated in closed form per segment
//!
//! ## Quick Start
//!
//! ```rust
//! use diskmap_rs::{compact_fragmenting, compact_whole_extent, DiskMap, Result};
//!
//! # fn main() -> Result<()> {
//! let map = DiskMap::parse("2333133121414131402")?;
//!
//! assert_eq!(compact_fragmenting(map.clone()), 1928);
//! assert_eq!(compact_whole_extent(map), 2858);
//! # Ok(())
//! # }
//! ```
//!
//! ## Inspecting a pass
//!
//! ```rust
//! use diskmap_rs::{Compactor, DiskMap, Policy, Result};
//!
//! # fn main() -> Result<()> {
//! let mut map = DiskMap::parse("12345")?;
//! let report = Compactor::new(Policy::Fragmenting).run(&mut map);
//!
//! assert_eq!(map.render_blocks(), "022111222......");
//! assert_eq!(report.stopped_early_at, Some(1));
//! # Ok(())
//! # }
//! ```

pub mod core;

// Re-export core modules internally so crate:: paths in core still work
pub(crate) use crate::core::{allocator, diskmap, error, occupancy};

pub use crate::core::{
    allocator::{FreeSpaceTracker, Segment},
    checksum::checksum,
    compactor::{CompactionReport, Compactor, CompactorBuilder, Policy},
    diskmap::DiskMap,
    error::{DiskMapError, MalformedInput, PartitionFault, Result},
    occupancy::{FileId, OccupancyTable},
};

use tracing::info;

/// Compact with the fragmenting policy and return the checksum
pub fn compact_fragmenting(map: DiskMap) -> u128 {
    compact_with(map, Policy::Fragmenting)
}

/// Compact with the whole-extent policy and return the checksum
pub fn compact_whole_extent(map: DiskMap) -> u128 {
    compact_with(map, Policy::WholeExtent)
}

/// Compact an owned disk map with the given policy and return the checksum
pub fn compact_with(mut map: DiskMap, policy: Policy) -> u128 {
    Compactor::new(policy).run(&mut map);
    let sum = checksum(map.files());
    info!("{} checksum: {}", policy, sum);
    sum
}

/// Parse a compressed disk map and return its checksum after compaction
///
/// # Errors
///
/// Returns `MalformedInput` if the text is not a valid disk map.
pub fn checksum_for(text: &str, policy: Policy) -> Result<u128> {
    let map = DiskMap::parse(text)?;
    Ok(compact_with(map, policy))
}
