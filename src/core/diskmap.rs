//! Disk map: the medium, its files and its free space
//!
//! A disk map is parsed from the compressed run-length form, where digits
//! alternate between a file length and the length of the gap that follows
//! it (`12345` = one-block file, two free blocks, three-block file, four
//! free blocks, five-block file).

use crate::allocator::extent::Segment;
use crate::allocator::free_space::FreeSpaceTracker;
use crate::error::{MalformedInput, PartitionFault, Result};
use crate::occupancy::{FileId, OccupancyTable};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// A medium of `total_blocks` blocks, tiled by file segments and free segments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskMap {
    files: OccupancyTable,
    free: FreeSpaceTracker,
    total_blocks: u64,
}

impl DiskMap {
    /// Parse a compressed disk map
    ///
    /// Surrounding whitespace is ignored. Every other character must be a
    /// digit, the digit count must be odd and no file may be empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use diskmap_rs::DiskMap;
    ///
    /// let map = DiskMap::parse("12345").unwrap();
    /// assert_eq!(map.files().len(), 3);
    /// assert_eq!(map.render_blocks(), "0..111....22222");
    ///
    /// assert!(DiskMap::parse("1234").is_err()); // ends with a gap
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(MalformedInput::Empty.into());
        }

        let lengths = text
            .chars()
            .enumerate()
            .map(|(position, found)| {
                found
                    .to_digit(10)
                    .map(u64::from)
                    .ok_or(MalformedInput::InvalidDigit { position, found })
            })
            .collect::<std::result::Result<Vec<u64>, _>>()?;

        if lengths.len() % 2 == 0 {
            return Err(MalformedInput::EvenDigitCount(lengths.len()).into());
        }

        let mut map = DiskMap::default();
        let mut offset = 0u64;

        for (index, &length) in lengths.iter().enumerate() {
            if index % 2 == 0 {
                if length == 0 {
                    let file_id = (index / 2) as FileId;
                    return Err(MalformedInput::ZeroLengthFile { file_id }.into());
                }
                map.files.push_file(Segment::new(offset, length));
            } else if length > 0 {
                map.free.release(Segment::new(offset, length));
            }
            offset += length;
        }
        map.total_blocks = offset;

        debug!(
            "Parsed disk map: {} files, {} free segments, {} blocks",
            map.files.len(),
            map.free.extent_count(),
            map.total_blocks
        );

        Ok(map)
    }

    /// Load a disk map from the first non-blank line of a file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        debug!("Loading disk map from {:?}", path.as_ref());
        Self::from_reader(File::open(path)?)
    }

    /// Read a disk map from the first non-blank line of any reader
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut contents = String::new();
        reader.read_to_string(&mut contents)?;
        let line = contents
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("");
        Self::parse(line)
    }

    pub fn files(&self) -> &OccupancyTable {
        &self.files
    }

    pub fn free_space(&self) -> &FreeSpaceTracker {
        &self.free
    }

    /// Size of the medium in blocks
    pub fn total_blocks(&self) -> u64 {
        self.total_blocks
    }

    /// Split borrow used by the compactor
    pub(crate) fn parts_mut(&mut self) -> (&mut OccupancyTable, &mut FreeSpaceTracker) {
        (&mut self.files, &mut self.free)
    }

    /// Check that file and free segments tile `[0, total_blocks)` exactly
    pub fn verify_partition(&self) -> std::result::Result<(), PartitionFault> {
        let mut claims: Vec<(Segment, Option<FileId>)> = self
            .files
            .iter()
            .flat_map(|(id, segs)| segs.iter().map(move |seg| (*seg, Some(id))))
            .chain(self.free.segments().map(|seg| (*seg, None)))
            .collect();
        claims.sort_unstable_by_key(|(seg, _)| seg.offset);

        let describe = |(seg, owner): &(Segment, Option<FileId>)| match owner {
            Some(id) => format!("file {} at {}", id, seg),
            None => format!("free {}", seg),
        };

        let mut cursor = 0u64;
        let mut previous: Option<&(Segment, Option<FileId>)> = None;

        for claim in &claims {
            let seg = claim.0;
            if seg.offset > cursor {
                return Err(PartitionFault::Gap {
                    start: cursor,
                    end: seg.offset,
                });
            }
            if seg.offset < cursor {
                return Err(PartitionFault::Overlap {
                    block: seg.offset,
                    first: previous.map(describe).unwrap_or_default(),
                    second: describe(claim),
                });
            }
            if seg.end() > self.total_blocks {
                return Err(PartitionFault::Overrun {
                    end: seg.end(),
                    total: self.total_blocks,
                });
            }
            cursor = seg.end();
            previous = Some(claim);
        }

        if cursor < self.total_blocks {
            return Err(PartitionFault::Underrun {
                covered: cursor,
                total: self.total_blocks,
            });
        }

        Ok(())
    }

    /// Panic unless the partition invariant holds
    pub fn assert_partition(&self) {
        if let Err(fault) = self.verify_partition() {
            panic!("partition invariant violated: {}", fault);
        }
    }

    /// One character per block: `.` when free, otherwise the owning file id
    /// in base 36 (ids wrap past 35)
    pub fn render_blocks(&self) -> String {
        let mut blocks = vec!['.'; self.total_blocks as usize];
        for (id, segments) in self.files.iter() {
            let glyph = char::from_digit((id % 36) as u32, 36).unwrap_or('#');
            for seg in segments {
                blocks[seg.offset as usize..seg.end() as usize].fill(glyph);
            }
        }
        blocks.into_iter().collect()
    }
}

impl FromStr for DiskMap {
    type Err = crate::error::DiskMapError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for DiskMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Files:")?;
        for (id, segments) in self.files.iter() {
            let ranges: Vec<String> = segments.iter().map(Segment::to_string).collect();
            writeln!(f, "  file {}: {}", id, ranges.join(", "))?;
        }
        writeln!(f, "Free segments:")?;
        if self.free.extent_count() == 0 {
            write!(f, "  (none)")
        } else {
            let ranges: Vec<String> = self.free.segments().map(Segment::to_string).collect();
            write!(f, "  {}", ranges.join(", "))
        }
    }
}
