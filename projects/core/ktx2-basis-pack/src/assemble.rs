//! Builds the supercompression global data block from encoder output.
//!
//! The encoder returns images in the order they were submitted (see
//! [`TextureLayout::images`]), one colour slice per image, each followed by an
//! alpha slice when the output has alpha slices. Slice offsets in the encoder
//! output are absolute; the container wants them relative to the start of the
//! mip level each image belongs to, so they are rebased here.
//!
//! Each level is the contiguous run of slice data starting at the first slice
//! of that level. The resulting [`LevelRange`]s are what [`crate::reorder`]
//! copies into the container payload.

use crate::allocate::{try_alloc_zeroed, AllocateError};
use crate::basis_file::{BasisFile, BasisSliceDesc, HEADER_FLAG_Y_FLIPPED, SLICE_FLAG_HAS_ALPHA};
use crate::layout::TextureLayout;
use crate::sgd::{
    global_data_size, BasisGlobalHeader, BasisImageDesc, BASIS_GLOBAL_HEADER_SIZE,
    BASIS_IMAGE_DESC_SIZE,
};
use alloc::vec::Vec;
use thiserror::Error;

/// Errors raised while assembling global data.
///
/// Apart from [`AssembleError::Allocate`], every variant means the encoder
/// output disagrees with what was submitted to the encoder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssembleError {
    #[error("Encoder reported {reported} images, expected {expected}")]
    ImageCountMismatch { expected: u32, reported: u32 },

    #[error("Slice table ended before image {image} (level {level})")]
    MissingSlice { image: u32, level: u32 },

    #[error("Level {level} starts with an alpha slice")]
    LevelStartsWithAlpha { level: u32 },

    #[error("Image {image} has an alpha slice where a colour slice was expected")]
    UnexpectedAlphaSlice { image: u32 },

    #[error("Image {image} is missing its alpha slice")]
    MissingAlphaSlice { image: u32 },

    #[error("Slice of image {image} at offset {offset} starts before its level at {level_offset}")]
    SliceBeforeLevel {
        image: u32,
        offset: u32,
        level_offset: u32,
    },

    #[error("Slice of image {image} ends at {end}, past the {level_length} bytes of level {level}")]
    SliceOutsideLevel {
        image: u32,
        level: u32,
        end: u64,
        level_length: u64,
    },

    #[error("Level {level} of {length} bytes at offset {offset} exceeds the encoder output")]
    LevelOutOfBounds { level: u32, offset: u32, length: u64 },

    #[error("Global data size overflows")]
    SizeOverflow,

    #[error("Global data write of {written} bytes overruns the {size} byte block")]
    GlobalDataOverrun { written: usize, size: usize },

    #[error(transparent)]
    Allocate(#[from] AllocateError),
}

impl AssembleError {
    /// Whether this is a consistency fault rather than resource exhaustion.
    pub fn is_internal_fault(&self) -> bool {
        !matches!(self, Self::Allocate(_))
    }
}

/// Byte range of one mip level within the encoder output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LevelRange {
    /// Absolute offset of the level's first slice.
    pub file_offset: u32,
    /// Sum of the sizes of every slice in the level.
    pub byte_length: u64,
}

/// Output of [`assemble_global_data`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledGlobalData {
    /// The complete global data block.
    pub global_data: Vec<u8>,
    /// Per level byte ranges, indexed by level (largest level first).
    pub levels: Vec<LevelRange>,
    /// Whether the encoder kept an alpha channel.
    pub has_alpha: bool,
}

/// Builds the global data block for `file`, whose images were submitted in
/// the canonical order of `layout`.
///
/// # Errors
///
/// - [`AssembleError::ImageCountMismatch`] when the encoder's image count
///   differs from [`TextureLayout::image_count`].
/// - Consistency errors when slices are missing, out of order, or do not fit
///   within their level.
/// - [`AssembleError::Allocate`] when the block cannot be allocated.
pub fn assemble_global_data(
    file: &BasisFile<'_>,
    layout: &TextureLayout,
) -> Result<AssembledGlobalData, AssembleError> {
    let header = file.header();
    let expected = layout.image_count();
    if header.total_images != expected {
        return Err(AssembleError::ImageCountMismatch {
            expected,
            reported: header.total_images,
        });
    }

    let num_images = expected as usize;
    let size = global_data_size(
        num_images,
        header.endpoint_cb_file_size,
        header.selector_cb_file_size,
        header.tables_file_size,
    )
    .ok_or(AssembleError::SizeOverflow)?;

    let mut global_data = try_alloc_zeroed(size)?;
    let mut levels = Vec::new();
    levels
        .try_reserve_exact(layout.num_levels as usize)
        .map_err(AllocateError::from)?;

    let has_alpha = header.has_alpha_slices();
    let mut descs = Vec::new();
    descs
        .try_reserve_exact(num_images)
        .map_err(AllocateError::from)?;

    let mut slices = file.slices();
    let mut image = 0u32;
    for level in 0..layout.num_levels {
        let level_start = descs.len();
        let mut range = LevelRange::default();

        for index in 0..layout.images_in_level(level) {
            let color = slices
                .next()
                .ok_or(AssembleError::MissingSlice { image, level })?;
            if index == 0 {
                if color.is_alpha() {
                    return Err(AssembleError::LevelStartsWithAlpha { level });
                }
                range.file_offset = color.file_ofs;
            } else if color.is_alpha() {
                return Err(AssembleError::UnexpectedAlphaSlice { image });
            }

            let mut desc = BasisImageDesc {
                color_slice_byte_offset: rebase(&color, range.file_offset, image)?,
                color_slice_byte_length: color.file_size,
                image_flags: (color.flags & !SLICE_FLAG_HAS_ALPHA) as u32,
                ..Default::default()
            };
            range.byte_length += color.file_size as u64;

            if has_alpha {
                let alpha = slices
                    .next()
                    .filter(BasisSliceDesc::is_alpha)
                    .ok_or(AssembleError::MissingAlphaSlice { image })?;
                desc.alpha_slice_byte_offset = rebase(&alpha, range.file_offset, image)?;
                desc.alpha_slice_byte_length = alpha.file_size;
                range.byte_length += alpha.file_size as u64;
            }

            descs.push(desc);
            image += 1;
        }

        check_containment(&descs[level_start..], level_start as u32, level, &range)?;

        let end = (range.file_offset as u64).checked_add(range.byte_length);
        if end.map_or(true, |end| end > file.data().len() as u64) {
            return Err(AssembleError::LevelOutOfBounds {
                level,
                offset: range.file_offset,
                length: range.byte_length,
            });
        }
        levels.push(range);
    }

    let global_header = BasisGlobalHeader {
        global_flags: (header.flags & !HEADER_FLAG_Y_FLIPPED) as u32,
        endpoint_count: header.total_endpoints as u32,
        endpoints_byte_length: header.endpoint_cb_file_size,
        selector_count: header.total_selectors as u32,
        selectors_byte_length: header.selector_cb_file_size,
        tables_byte_length: header.tables_file_size,
        extended_byte_length: 0,
    };

    let mut writer = GlobalDataWriter::new(&mut global_data);
    writer.write_with(BASIS_GLOBAL_HEADER_SIZE, |dst| global_header.write(dst))?;
    for desc in &descs {
        writer.write_with(BASIS_IMAGE_DESC_SIZE, |dst| desc.write(dst))?;
    }
    writer.copy(file.endpoint_codebook())?;
    writer.copy(file.selector_codebook())?;
    writer.copy(file.tables())?;

    Ok(AssembledGlobalData {
        global_data,
        levels,
        has_alpha,
    })
}

/// Offset of `slice` relative to the start of its level.
#[inline]
fn rebase(slice: &BasisSliceDesc, level_offset: u32, image: u32) -> Result<u32, AssembleError> {
    slice
        .file_ofs
        .checked_sub(level_offset)
        .ok_or(AssembleError::SliceBeforeLevel {
            image,
            offset: slice.file_ofs,
            level_offset,
        })
}

fn check_containment(
    descs: &[BasisImageDesc],
    first_image: u32,
    level: u32,
    range: &LevelRange,
) -> Result<(), AssembleError> {
    for (image, desc) in (first_image..).zip(descs) {
        let slices = [
            (desc.color_slice_byte_offset, desc.color_slice_byte_length),
            (desc.alpha_slice_byte_offset, desc.alpha_slice_byte_length),
        ];
        for (offset, length) in slices {
            let end = offset as u64 + length as u64;
            if end > range.byte_length {
                return Err(AssembleError::SliceOutsideLevel {
                    image,
                    level,
                    end,
                    level_length: range.byte_length,
                });
            }
        }
    }
    Ok(())
}

/// Sequential writer that refuses to run past the end of the block.
struct GlobalDataWriter<'a> {
    data: &'a mut [u8],
    written: usize,
}

impl<'a> GlobalDataWriter<'a> {
    fn new(data: &'a mut [u8]) -> Self {
        Self { data, written: 0 }
    }

    fn reserve(&mut self, len: usize) -> Result<&mut [u8], AssembleError> {
        let size = self.data.len();
        let end = self
            .written
            .checked_add(len)
            .filter(|&end| end <= size)
            .ok_or(AssembleError::GlobalDataOverrun {
                written: self.written.saturating_add(len),
                size,
            })?;
        let start = self.written;
        self.written = end;
        Ok(&mut self.data[start..end])
    }

    fn write_with<E>(
        &mut self,
        len: usize,
        write: impl FnOnce(&mut [u8]) -> Result<(), E>,
    ) -> Result<(), AssembleError> {
        let dst = self.reserve(len)?;
        let size = dst.len();
        write(dst).map_err(|_| AssembleError::GlobalDataOverrun {
            written: len,
            size,
        })
    }

    fn copy(&mut self, src: &[u8]) -> Result<(), AssembleError> {
        self.reserve(src.len())?.copy_from_slice(src);
        Ok(())
    }
}
