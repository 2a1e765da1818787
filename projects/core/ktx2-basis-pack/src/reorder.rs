//! Reorders encoded levels into container payload order.
//!
//! The encoder stores mip levels largest first. The container payload stores
//! them smallest first, so levels are copied in reverse and the level index is
//! rebuilt with the new offsets.

use crate::allocate::AllocateError;
use crate::assemble::LevelRange;
use crate::layout::LevelIndexEntry;
use alloc::vec::Vec;
use thiserror::Error;

/// Errors raised by [`reorder_levels`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReorderError {
    #[error("Level {level} of {length} bytes at offset {offset} exceeds the {available} byte encoder output")]
    LevelOutOfBounds {
        level: usize,
        offset: u32,
        length: u64,
        available: usize,
    },

    #[error("Payload size overflows")]
    SizeOverflow,

    #[error(transparent)]
    Allocate(#[from] AllocateError),
}

/// The container payload and its level index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderedLevels {
    /// Levels concatenated smallest first.
    pub data: Vec<u8>,
    /// Indexed by level, largest level first, like `levels`.
    pub level_index: Vec<LevelIndexEntry>,
}

/// Copies every level of `encoded` into a new payload, smallest level first.
///
/// # Parameters
///
/// - `encoded`: The encoder output
/// - `levels`: Per level ranges within `encoded`, largest level first
///
/// # Remarks
///
/// The payload length is the sum of all level lengths; every level occupies a
/// contiguous, non overlapping range and `uncompressed_byte_length` is zero.
pub fn reorder_levels(
    encoded: &[u8],
    levels: &[LevelRange],
) -> Result<ReorderedLevels, ReorderError> {
    let total = levels
        .iter()
        .try_fold(0usize, |total, level| {
            total.checked_add(usize::try_from(level.byte_length).ok()?)
        })
        .ok_or(ReorderError::SizeOverflow)?;

    let mut data = Vec::new();
    data.try_reserve_exact(total).map_err(AllocateError::from)?;
    let mut level_index = Vec::new();
    level_index
        .try_reserve_exact(levels.len())
        .map_err(AllocateError::from)?;
    level_index.resize(levels.len(), LevelIndexEntry::default());

    for (level, range) in levels.iter().enumerate().rev() {
        let bytes = level_bytes(encoded, range).ok_or(ReorderError::LevelOutOfBounds {
            level,
            offset: range.file_offset,
            length: range.byte_length,
            available: encoded.len(),
        })?;

        level_index[level] = LevelIndexEntry {
            byte_offset: data.len() as u64,
            byte_length: range.byte_length,
            uncompressed_byte_length: 0,
        };
        data.extend_from_slice(bytes);
    }

    Ok(ReorderedLevels { data, level_index })
}

#[inline]
fn level_bytes<'a>(encoded: &'a [u8], range: &LevelRange) -> Option<&'a [u8]> {
    let start = range.file_offset as usize;
    let end = start.checked_add(usize::try_from(range.byte_length).ok()?)?;
    encoded.get(start..end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::assemble_global_data;
    use crate::basis_file::BasisFile;
    use crate::test_prelude::*;

    #[test]
    fn reverses_level_order() {
        let encoded: Vec<u8> = (0..20).collect();
        let levels = [
            LevelRange {
                file_offset: 2,
                byte_length: 8,
            },
            LevelRange {
                file_offset: 10,
                byte_length: 4,
            },
            LevelRange {
                file_offset: 14,
                byte_length: 1,
            },
        ];

        let reordered = reorder_levels(&encoded, &levels).unwrap();

        assert_eq!(reordered.data, vec![14, 10, 11, 12, 13, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(
            reordered.level_index,
            vec![
                LevelIndexEntry {
                    byte_offset: 5,
                    byte_length: 8,
                    uncompressed_byte_length: 0
                },
                LevelIndexEntry {
                    byte_offset: 1,
                    byte_length: 4,
                    uncompressed_byte_length: 0
                },
                LevelIndexEntry {
                    byte_offset: 0,
                    byte_length: 1,
                    uncompressed_byte_length: 0
                },
            ]
        );
    }

    #[rstest]
    #[case(simple_layout(1, 1, 1, 1), false)]
    #[case(simple_layout(5, 1, 1, 1), true)]
    #[case(simple_layout(3, 2, 6, 1), false)]
    #[case(simple_layout(4, 2, 1, 8), true)]
    fn payload_is_a_permutation_of_levels(#[case] layout: TextureLayout, #[case] alpha: bool) {
        let bytes = synthetic_basis_file(&layout, alpha);
        let file = BasisFile::parse(&bytes).unwrap();
        let assembled = assemble_global_data(&file, &layout).unwrap();

        let reordered = reorder_levels(&bytes, &assembled.levels).unwrap();

        let total: u64 = reordered.level_index.iter().map(|e| e.byte_length).sum();
        assert_eq!(total, reordered.data.len() as u64);

        // Smallest level first, contiguous and non overlapping.
        let mut expected_offset = 0;
        for level in (0..layout.num_levels as usize).rev() {
            let entry = reordered.level_index[level];
            assert_eq!(entry.byte_offset, expected_offset);
            assert_eq!(entry.uncompressed_byte_length, 0);
            expected_offset += entry.byte_length;

            let range = assembled.levels[level];
            let source = &bytes[range.file_offset as usize..][..range.byte_length as usize];
            let moved = &reordered.data[entry.byte_offset as usize..][..entry.byte_length as usize];
            assert_eq!(moved, source);
        }
    }

    #[test]
    fn rejects_level_past_end() {
        let encoded = [0u8; 8];
        let levels = [LevelRange {
            file_offset: 4,
            byte_length: 5,
        }];

        assert_eq!(
            reorder_levels(&encoded, &levels),
            Err(ReorderError::LevelOutOfBounds {
                level: 0,
                offset: 4,
                length: 5,
                available: 8
            })
        );
    }

    #[test]
    fn empty_level_list() {
        let reordered = reorder_levels(&[1, 2, 3], &[]).unwrap();
        assert!(reordered.data.is_empty());
        assert!(reordered.level_index.is_empty());
    }
}
