//! The BasisLZ supercompression global data block.
//!
//! ```text
//! BasisGlobalHeader               28 bytes
//! BasisImageDesc[image_count]     20 bytes each
//! endpoint codebook               endpoints_byte_length
//! selector codebook               selectors_byte_length
//! tables                          tables_byte_length
//! ```
//!
//! All fields are little endian `u32`. Image descriptor offsets are relative
//! to the start of the image's mip level in the texture payload.

use endian_writer::{EndianReader, EndianWriter, LittleEndianReader, LittleEndianWriter};
use thiserror::Error;

/// Size of [`BasisGlobalHeader`] on disk.
pub const BASIS_GLOBAL_HEADER_SIZE: usize = 28;
/// Size of [`BasisImageDesc`] on disk.
pub const BASIS_IMAGE_DESC_SIZE: usize = 20;

/// Errors raised while reading or writing global data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GlobalDataError {
    /// A buffer is too small for the record being read or written.
    #[error("Buffer of {actual} bytes is smaller than the required {required}")]
    TooSmall { required: usize, actual: usize },

    /// The block is not exactly as long as its header describes.
    #[error("Global data is {actual} bytes but its header describes {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    /// The described length does not fit in `usize`.
    #[error("Global data length overflows")]
    Overflow,
}

/// Header of the global data block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BasisGlobalHeader {
    pub global_flags: u32,
    pub endpoint_count: u32,
    pub endpoints_byte_length: u32,
    pub selector_count: u32,
    pub selectors_byte_length: u32,
    pub tables_byte_length: u32,
    /// Always zero.
    pub extended_byte_length: u32,
}

/// Location of one image's slices within its mip level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BasisImageDesc {
    pub color_slice_byte_offset: u32,
    pub color_slice_byte_length: u32,
    /// Zero when the texture has no alpha slices.
    pub alpha_slice_byte_offset: u32,
    /// Zero when the texture has no alpha slices.
    pub alpha_slice_byte_length: u32,
    pub image_flags: u32,
}

/// Size in bytes of a global data block, or [`None`] on overflow.
pub fn global_data_size(
    num_images: usize,
    endpoints_byte_length: u32,
    selectors_byte_length: u32,
    tables_byte_length: u32,
) -> Option<usize> {
    BASIS_IMAGE_DESC_SIZE
        .checked_mul(num_images)?
        .checked_add(BASIS_GLOBAL_HEADER_SIZE)?
        .checked_add(endpoints_byte_length as usize)?
        .checked_add(selectors_byte_length as usize)?
        .checked_add(tables_byte_length as usize)
}

impl BasisGlobalHeader {
    /// Reads the header at the start of `src`.
    pub fn read(src: &[u8]) -> Result<Self, GlobalDataError> {
        ensure_len(src.len(), BASIS_GLOBAL_HEADER_SIZE)?;

        // SAFETY: length checked above.
        unsafe {
            let mut reader = LittleEndianReader::new(src.as_ptr());
            Ok(Self {
                global_flags: reader.read_u32_at(0),
                endpoint_count: reader.read_u32_at(4),
                endpoints_byte_length: reader.read_u32_at(8),
                selector_count: reader.read_u32_at(12),
                selectors_byte_length: reader.read_u32_at(16),
                tables_byte_length: reader.read_u32_at(20),
                extended_byte_length: reader.read_u32_at(24),
            })
        }
    }

    /// Writes the header to the start of `dst`.
    pub fn write(&self, dst: &mut [u8]) -> Result<(), GlobalDataError> {
        ensure_len(dst.len(), BASIS_GLOBAL_HEADER_SIZE)?;

        // SAFETY: length checked above.
        unsafe {
            let mut writer = LittleEndianWriter::new(dst.as_mut_ptr());
            writer.write_u32_at(self.global_flags, 0);
            writer.write_u32_at(self.endpoint_count, 4);
            writer.write_u32_at(self.endpoints_byte_length, 8);
            writer.write_u32_at(self.selector_count, 12);
            writer.write_u32_at(self.selectors_byte_length, 16);
            writer.write_u32_at(self.tables_byte_length, 20);
            writer.write_u32_at(self.extended_byte_length, 24);
        }
        Ok(())
    }
}

impl BasisImageDesc {
    /// Reads a descriptor from the start of `src`.
    pub fn read(src: &[u8]) -> Result<Self, GlobalDataError> {
        ensure_len(src.len(), BASIS_IMAGE_DESC_SIZE)?;

        // SAFETY: length checked above.
        unsafe {
            let mut reader = LittleEndianReader::new(src.as_ptr());
            Ok(Self {
                color_slice_byte_offset: reader.read_u32_at(0),
                color_slice_byte_length: reader.read_u32_at(4),
                alpha_slice_byte_offset: reader.read_u32_at(8),
                alpha_slice_byte_length: reader.read_u32_at(12),
                image_flags: reader.read_u32_at(16),
            })
        }
    }

    /// Writes the descriptor to the start of `dst`.
    pub fn write(&self, dst: &mut [u8]) -> Result<(), GlobalDataError> {
        ensure_len(dst.len(), BASIS_IMAGE_DESC_SIZE)?;

        // SAFETY: length checked above.
        unsafe {
            let mut writer = LittleEndianWriter::new(dst.as_mut_ptr());
            writer.write_u32_at(self.color_slice_byte_offset, 0);
            writer.write_u32_at(self.color_slice_byte_length, 4);
            writer.write_u32_at(self.alpha_slice_byte_offset, 8);
            writer.write_u32_at(self.alpha_slice_byte_length, 12);
            writer.write_u32_at(self.image_flags, 16);
        }
        Ok(())
    }
}

#[inline(always)]
fn ensure_len(actual: usize, required: usize) -> Result<(), GlobalDataError> {
    if actual < required {
        return Err(GlobalDataError::TooSmall { required, actual });
    }
    Ok(())
}

/// A read only view over a complete global data block.
#[derive(Debug, Clone, Copy)]
pub struct BasisGlobalData<'a> {
    header: BasisGlobalHeader,
    image_descs: &'a [u8],
    endpoints: &'a [u8],
    selectors: &'a [u8],
    tables: &'a [u8],
}

impl<'a> BasisGlobalData<'a> {
    /// Splits `data` into its parts. The block must be exactly as long as
    /// the header and `num_images` describe.
    pub fn parse(data: &'a [u8], num_images: usize) -> Result<Self, GlobalDataError> {
        let header = BasisGlobalHeader::read(data)?;
        let expected = global_data_size(
            num_images,
            header.endpoints_byte_length,
            header.selectors_byte_length,
            header.tables_byte_length,
        )
        .ok_or(GlobalDataError::Overflow)?;
        if expected != data.len() {
            return Err(GlobalDataError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }

        let (image_descs, rest) =
            data[BASIS_GLOBAL_HEADER_SIZE..].split_at(num_images * BASIS_IMAGE_DESC_SIZE);
        let (endpoints, rest) = rest.split_at(header.endpoints_byte_length as usize);
        let (selectors, tables) = rest.split_at(header.selectors_byte_length as usize);

        Ok(Self {
            header,
            image_descs,
            endpoints,
            selectors,
            tables,
        })
    }

    #[inline]
    pub fn header(&self) -> &BasisGlobalHeader {
        &self.header
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.image_descs.len() / BASIS_IMAGE_DESC_SIZE
    }

    /// Image descriptor `index` in canonical image order.
    pub fn image_desc(&self, index: usize) -> Option<BasisImageDesc> {
        let start = index.checked_mul(BASIS_IMAGE_DESC_SIZE)?;
        let bytes = self.image_descs.get(start..start + BASIS_IMAGE_DESC_SIZE)?;
        BasisImageDesc::read(bytes).ok()
    }

    pub fn image_descs(&self) -> impl Iterator<Item = BasisImageDesc> + 'a {
        self.image_descs
            .chunks_exact(BASIS_IMAGE_DESC_SIZE)
            .filter_map(|bytes| BasisImageDesc::read(bytes).ok())
    }

    pub fn endpoints(&self) -> &'a [u8] {
        self.endpoints
    }

    pub fn selectors(&self) -> &'a [u8] {
        self.selectors
    }

    pub fn tables(&self) -> &'a [u8] {
        self.tables
    }
}
