//! Block-level space accounting for the medium
//!
//! - [`extent`]: the `Segment` value type shared by files and free space
//! - [`free_space`]: the ordered free list both compaction policies draw from

pub mod extent;
pub mod free_space;

pub use extent::Segment;
pub use free_space::FreeSpaceTracker;
