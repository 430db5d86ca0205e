//! Filesystem checksum over final block placement

use crate::occupancy::OccupancyTable;

/// Sum of `file_id * position` over every occupied block
///
/// Each segment contributes through its closed-form position sum, so the
/// cost is proportional to the number of segments, not blocks. Evaluated in
/// `u128`; the segment order within a file does not matter.
pub fn checksum(table: &OccupancyTable) -> u128 {
    table
        .iter()
        .map(|(id, segments)| {
            let positions: u128 = segments.iter().map(|seg| seg.position_sum()).sum();
            id as u128 * positions
        })
        .sum()
}
