//! Core disk map model and compaction engine

pub mod allocator;
pub mod checksum;
pub mod compactor;
pub mod diskmap;
pub mod error;
pub mod occupancy;
