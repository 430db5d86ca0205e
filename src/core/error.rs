//! Error types for disk map parsing and layout verification

use thiserror::Error;

/// Reasons a compressed disk map is rejected by the parser
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedInput {
    #[error("disk map is empty")]
    Empty,

    #[error("disk map has an even number of digits ({0}); it must end with a file length")]
    EvenDigitCount(usize),

    #[error("invalid character {found:?} at position {position} (expected 0-9)")]
    InvalidDigit { position: usize, found: char },

    #[error("file {file_id} has zero length")]
    ZeroLengthFile { file_id: u64 },
}

#[derive(Error, Debug)]
pub enum DiskMapError {
    #[error("Malformed disk map: {0}")]
    MalformedInput(#[from] MalformedInput),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DiskMapError>;

/// A break in the occupied/free tiling of the medium
///
/// The compactor treats any of these as fatal; they are only ever returned
/// by [`DiskMap::verify_partition`](crate::DiskMap::verify_partition) so
/// tests can inspect them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PartitionFault {
    #[error("blocks {start}..{end} are neither occupied nor free")]
    Gap { start: u64, end: u64 },

    #[error("block {block} is claimed twice ({first} and {second})")]
    Overlap {
        block: u64,
        first: String,
        second: String,
    },

    #[error("segments run past the end of the medium ({end} > {total})")]
    Overrun { end: u64, total: u64 },

    #[error("segments cover only {covered} of {total} blocks")]
    Underrun { covered: u64, total: u64 },
}
