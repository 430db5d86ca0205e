//! Occupancy table: which segments hold each file's blocks

use crate::allocator::extent::Segment;

/// File identifier, assigned 0, 1, 2, ... in input order
pub type FileId = u64;

/// Maps each file to the segments currently holding its data
///
/// Ids are dense, so the table is a vector indexed by id. A file starts with
/// exactly one segment; the fragmenting policy may leave it with several.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OccupancyTable {
    files: Vec<Vec<Segment>>,
}

impl OccupancyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the next file at its original placement and return its id
    pub fn push_file(&mut self, segment: Segment) -> FileId {
        self.files.push(vec![segment]);
        (self.files.len() - 1) as FileId
    }

    /// Number of files in the table
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Segments owned by a file, `None` for an unknown id
    pub fn get(&self, id: FileId) -> Option<&[Segment]> {
        self.files.get(id as usize).map(Vec::as_slice)
    }

    /// Replace a file's segments, returning the previous list
    ///
    /// # Panics
    ///
    /// Panics if `id` was never registered or `segments` is empty; every
    /// file always occupies at least one block.
    pub fn replace(&mut self, id: FileId, segments: Vec<Segment>) -> Vec<Segment> {
        assert!(!segments.is_empty(), "file {} left without segments", id);
        let slot = self
            .files
            .get_mut(id as usize)
            .unwrap_or_else(|| panic!("unknown file id {}", id));
        std::mem::replace(slot, segments)
    }

    /// Snapshot of every file id, highest first
    pub fn ids_descending(&self) -> Vec<FileId> {
        (0..self.files.len() as FileId).rev().collect()
    }

    /// Total number of blocks a file occupies
    pub fn file_blocks(&self, id: FileId) -> u64 {
        self.get(id)
            .map(|segs| segs.iter().map(|s| s.length).sum())
            .unwrap_or(0)
    }

    /// Lowest block offset the file occupies
    pub fn first_offset(&self, id: FileId) -> Option<u64> {
        self.get(id)?.iter().map(|s| s.offset).min()
    }

    /// Number of files spread over more than one segment
    pub fn fragmented_files(&self) -> usize {
        self.files.iter().filter(|segs| segs.len() > 1).count()
    }

    /// Iterate `(id, segments)` in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = (FileId, &[Segment])> + '_ {
        self.files
            .iter()
            .enumerate()
            .map(|(id, segs)| (id as FileId, segs.as_slice()))
    }
}
