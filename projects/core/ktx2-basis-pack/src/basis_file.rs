//! Reader and builder for the block encoder's `.basis` output.
//!
//! The encoder returns one flat buffer: a fixed 77 byte header, a table of
//! 23 byte slice descriptors, the endpoint and selector codebooks, the huffman
//! tables and finally the compressed slices. Every field is little endian and
//! packed without padding, including several 24-bit fields.
//!
//! [`BasisFile::parse`] checks that the header, the slice table, every
//! codebook/table blob and every slice lie within the buffer. After that, all
//! accessors are infallible. Signature and CRC fields are carried but not
//! verified.

use alloc::vec::Vec;
use core::ops::Range;
use endian_writer::{EndianReader, EndianWriter, LittleEndianReader, LittleEndianWriter};
use thiserror::Error;

/// `'sB'`
pub const BASIS_SIGNATURE: u16 = 0x4273;
/// Version written by [`BasisFileBuilder`].
pub const BASIS_FILE_VERSION: u16 = 0x13;
/// Size of [`BasisFileHeader`] on disk.
pub const BASIS_HEADER_SIZE: usize = 77;
/// Size of [`BasisSliceDesc`] on disk.
pub const BASIS_SLICE_DESC_SIZE: usize = 23;
/// Largest value storable in a 24-bit field.
pub const U24_MAX: u32 = 0x00FF_FFFF;

/// Header flag: slices are ETC1S.
pub const HEADER_FLAG_ETC1S: u16 = 0x1;
/// Header flag: images were flipped vertically by the encoder.
pub const HEADER_FLAG_Y_FLIPPED: u16 = 0x2;
/// Header flag: every colour slice is followed by an alpha slice.
pub const HEADER_FLAG_HAS_ALPHA_SLICES: u16 = 0x4;

/// Slice flag: this is an alpha slice.
pub const SLICE_FLAG_HAS_ALPHA: u8 = 0x1;
/// Slice flag: video I-frame.
pub const SLICE_FLAG_I_FRAME: u8 = 0x2;

/// `cBASISTexType2D`
pub const TEX_TYPE_2D: u8 = 0;

/// Errors raised while reading encoder output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BasisFileError {
    /// The buffer cannot hold the fixed header.
    #[error("Encoder output of {0} bytes is smaller than its header")]
    TooSmall(usize),

    /// The slice descriptor table is out of bounds.
    #[error("Slice table of {count} entries at offset {offset} exceeds the {len} byte output")]
    SliceTableOutOfBounds { offset: u32, count: u32, len: usize },

    /// A codebook or table blob is out of bounds.
    #[error("{blob} of {size} bytes at offset {offset} exceeds the {len} byte output")]
    BlobOutOfBounds {
        blob: &'static str,
        offset: u32,
        size: u32,
        len: usize,
    },

    /// A slice's data is out of bounds.
    #[error("Slice {index} of {size} bytes at offset {offset} exceeds the {len} byte output")]
    SliceOutOfBounds {
        index: u32,
        offset: u32,
        size: u32,
        len: usize,
    },
}

/// The encoder output header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BasisFileHeader {
    pub signature: u16,
    pub version: u16,
    pub header_size: u16,
    pub header_crc16: u16,
    pub data_size: u32,
    pub data_crc16: u16,
    /// 24-bit.
    pub total_slices: u32,
    /// 24-bit.
    pub total_images: u32,
    pub tex_format: u8,
    pub flags: u16,
    pub tex_type: u8,
    /// 24-bit.
    pub us_per_frame: u32,
    pub reserved: u32,
    pub userdata0: u32,
    pub userdata1: u32,
    pub total_endpoints: u16,
    pub endpoint_cb_file_ofs: u32,
    /// 24-bit.
    pub endpoint_cb_file_size: u32,
    pub total_selectors: u16,
    pub selector_cb_file_ofs: u32,
    /// 24-bit.
    pub selector_cb_file_size: u32,
    pub tables_file_ofs: u32,
    pub tables_file_size: u32,
    pub slice_desc_file_ofs: u32,
    pub extended_file_ofs: u32,
    pub extended_file_size: u32,
}

/// One entry of the slice descriptor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BasisSliceDesc {
    /// 24-bit.
    pub image_index: u32,
    pub level_index: u8,
    pub flags: u8,
    pub orig_width: u16,
    pub orig_height: u16,
    pub num_blocks_x: u16,
    pub num_blocks_y: u16,
    /// Absolute offset into the encoder output.
    pub file_ofs: u32,
    pub file_size: u32,
    pub slice_data_crc16: u16,
}

#[inline(always)]
unsafe fn read_u24<R: EndianReader>(reader: &mut R) -> u32 {
    let mut bytes = [0u8; 4];
    reader.read_bytes(&mut bytes[..3]);
    u32::from_le_bytes(bytes)
}

#[inline(always)]
unsafe fn write_u24<W: EndianWriter>(writer: &mut W, value: u32) {
    writer.write_bytes(&value.to_le_bytes()[..3]);
}

impl BasisFileHeader {
    /// Decodes the header at the start of `data`.
    pub fn read(data: &[u8]) -> Result<Self, BasisFileError> {
        let bytes: &[u8; BASIS_HEADER_SIZE] = data
            .get(..BASIS_HEADER_SIZE)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(BasisFileError::TooSmall(data.len()))?;
        Ok(Self::decode(bytes))
    }

    /// Decodes a header from its packed form.
    pub fn decode(bytes: &[u8; BASIS_HEADER_SIZE]) -> Self {
        // SAFETY: `bytes` holds exactly one header and every field is read once, in order.
        unsafe {
            let mut reader = LittleEndianReader::new(bytes.as_ptr());
            Self {
                signature: reader.read_u16(),
                version: reader.read_u16(),
                header_size: reader.read_u16(),
                header_crc16: reader.read_u16(),
                data_size: reader.read_u32(),
                data_crc16: reader.read_u16(),
                total_slices: read_u24(&mut reader),
                total_images: read_u24(&mut reader),
                tex_format: reader.read_u8(),
                flags: reader.read_u16(),
                tex_type: reader.read_u8(),
                us_per_frame: read_u24(&mut reader),
                reserved: reader.read_u32(),
                userdata0: reader.read_u32(),
                userdata1: reader.read_u32(),
                total_endpoints: reader.read_u16(),
                endpoint_cb_file_ofs: reader.read_u32(),
                endpoint_cb_file_size: read_u24(&mut reader),
                total_selectors: reader.read_u16(),
                selector_cb_file_ofs: reader.read_u32(),
                selector_cb_file_size: read_u24(&mut reader),
                tables_file_ofs: reader.read_u32(),
                tables_file_size: reader.read_u32(),
                slice_desc_file_ofs: reader.read_u32(),
                extended_file_ofs: reader.read_u32(),
                extended_file_size: reader.read_u32(),
            }
        }
    }

    /// Encodes the header. 24-bit fields keep their low 24 bits.
    pub fn encode(&self) -> [u8; BASIS_HEADER_SIZE] {
        let mut bytes = [0u8; BASIS_HEADER_SIZE];

        // SAFETY: the fields below add up to exactly `BASIS_HEADER_SIZE` bytes.
        unsafe {
            let mut writer = LittleEndianWriter::new(bytes.as_mut_ptr());
            writer.write_u16(self.signature);
            writer.write_u16(self.version);
            writer.write_u16(self.header_size);
            writer.write_u16(self.header_crc16);
            writer.write_u32(self.data_size);
            writer.write_u16(self.data_crc16);
            write_u24(&mut writer, self.total_slices);
            write_u24(&mut writer, self.total_images);
            writer.write_u8(self.tex_format);
            writer.write_u16(self.flags);
            writer.write_u8(self.tex_type);
            write_u24(&mut writer, self.us_per_frame);
            writer.write_u32(self.reserved);
            writer.write_u32(self.userdata0);
            writer.write_u32(self.userdata1);
            writer.write_u16(self.total_endpoints);
            writer.write_u32(self.endpoint_cb_file_ofs);
            write_u24(&mut writer, self.endpoint_cb_file_size);
            writer.write_u16(self.total_selectors);
            writer.write_u32(self.selector_cb_file_ofs);
            write_u24(&mut writer, self.selector_cb_file_size);
            writer.write_u32(self.tables_file_ofs);
            writer.write_u32(self.tables_file_size);
            writer.write_u32(self.slice_desc_file_ofs);
            writer.write_u32(self.extended_file_ofs);
            writer.write_u32(self.extended_file_size);
        }
        bytes
    }

    /// Whether every colour slice is followed by an alpha slice.
    #[inline]
    pub fn has_alpha_slices(&self) -> bool {
        self.flags & HEADER_FLAG_HAS_ALPHA_SLICES != 0
    }
}

impl BasisSliceDesc {
    /// Decodes a slice descriptor from its packed form.
    pub fn decode(bytes: &[u8; BASIS_SLICE_DESC_SIZE]) -> Self {
        // SAFETY: `bytes` holds exactly one descriptor and every field is read once, in order.
        unsafe {
            let mut reader = LittleEndianReader::new(bytes.as_ptr());
            Self {
                image_index: read_u24(&mut reader),
                level_index: reader.read_u8(),
                flags: reader.read_u8(),
                orig_width: reader.read_u16(),
                orig_height: reader.read_u16(),
                num_blocks_x: reader.read_u16(),
                num_blocks_y: reader.read_u16(),
                file_ofs: reader.read_u32(),
                file_size: reader.read_u32(),
                slice_data_crc16: reader.read_u16(),
            }
        }
    }

    /// Encodes the descriptor. `image_index` keeps its low 24 bits.
    pub fn encode(&self) -> [u8; BASIS_SLICE_DESC_SIZE] {
        let mut bytes = [0u8; BASIS_SLICE_DESC_SIZE];

        // SAFETY: the fields below add up to exactly `BASIS_SLICE_DESC_SIZE` bytes.
        unsafe {
            let mut writer = LittleEndianWriter::new(bytes.as_mut_ptr());
            write_u24(&mut writer, self.image_index);
            writer.write_u8(self.level_index);
            writer.write_u8(self.flags);
            writer.write_u16(self.orig_width);
            writer.write_u16(self.orig_height);
            writer.write_u16(self.num_blocks_x);
            writer.write_u16(self.num_blocks_y);
            writer.write_u32(self.file_ofs);
            writer.write_u32(self.file_size);
            writer.write_u16(self.slice_data_crc16);
        }
        bytes
    }

    /// Whether this is an alpha slice.
    #[inline]
    pub fn is_alpha(&self) -> bool {
        self.flags & SLICE_FLAG_HAS_ALPHA != 0
    }

    /// Byte range of the slice data within the encoder output.
    #[inline]
    pub fn file_range(&self) -> Range<usize> {
        let start = self.file_ofs as usize;
        start..start + self.file_size as usize
    }
}

/// Checks `offset..offset + size` against `len`, returning the range.
#[inline]
fn checked_range(offset: u32, size: u32, len: usize) -> Option<Range<usize>> {
    let start = offset as usize;
    let end = start.checked_add(size as usize)?;
    (end <= len).then_some(start..end)
}

/// A bounds checked view over encoder output.
#[derive(Debug, Clone, Copy)]
pub struct BasisFile<'a> {
    data: &'a [u8],
    header: BasisFileHeader,
    slice_table: &'a [u8],
}

impl<'a> BasisFile<'a> {
    /// Validates `data` as encoder output.
    pub fn parse(data: &'a [u8]) -> Result<Self, BasisFileError> {
        let header = BasisFileHeader::read(data)?;
        let len = data.len();

        let table_start = header.slice_desc_file_ofs as usize;
        let table_range = (header.total_slices as usize)
            .checked_mul(BASIS_SLICE_DESC_SIZE)
            .and_then(|size| table_start.checked_add(size))
            .filter(|&end| end <= len)
            .map(|end| table_start..end)
            .ok_or(BasisFileError::SliceTableOutOfBounds {
                offset: header.slice_desc_file_ofs,
                count: header.total_slices,
                len,
            })?;

        let blobs = [
            (
                "Endpoint codebook",
                header.endpoint_cb_file_ofs,
                header.endpoint_cb_file_size,
            ),
            (
                "Selector codebook",
                header.selector_cb_file_ofs,
                header.selector_cb_file_size,
            ),
            ("Tables", header.tables_file_ofs, header.tables_file_size),
        ];
        for (blob, offset, size) in blobs {
            if checked_range(offset, size, len).is_none() {
                return Err(BasisFileError::BlobOutOfBounds {
                    blob,
                    offset,
                    size,
                    len,
                });
            }
        }

        let file = Self {
            data,
            header,
            slice_table: &data[table_range],
        };

        for (index, slice) in file.slices().enumerate() {
            if checked_range(slice.file_ofs, slice.file_size, len).is_none() {
                return Err(BasisFileError::SliceOutOfBounds {
                    index: index as u32,
                    offset: slice.file_ofs,
                    size: slice.file_size,
                    len,
                });
            }
        }

        Ok(file)
    }

    /// The whole encoder output.
    #[inline]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    #[inline]
    pub fn header(&self) -> &BasisFileHeader {
        &self.header
    }

    /// Number of entries in the slice table.
    #[inline]
    pub fn slice_count(&self) -> usize {
        self.slice_table.len() / BASIS_SLICE_DESC_SIZE
    }

    /// Slice descriptor `index`, if present.
    pub fn slice(&self, index: usize) -> Option<BasisSliceDesc> {
        let start = index.checked_mul(BASIS_SLICE_DESC_SIZE)?;
        let bytes = self.slice_table.get(start..start + BASIS_SLICE_DESC_SIZE)?;
        bytes.try_into().ok().map(BasisSliceDesc::decode)
    }

    /// Iterates the slice table in file order.
    pub fn slices(&self) -> impl Iterator<Item = BasisSliceDesc> + 'a {
        self.slice_table
            .chunks_exact(BASIS_SLICE_DESC_SIZE)
            .filter_map(|bytes| bytes.try_into().ok().map(BasisSliceDesc::decode))
    }

    /// Compressed data of `slice`.
    pub fn slice_data(&self, slice: &BasisSliceDesc) -> Option<&'a [u8]> {
        self.data.get(slice.file_range())
    }

    pub fn endpoint_codebook(&self) -> &'a [u8] {
        self.blob(self.header.endpoint_cb_file_ofs, self.header.endpoint_cb_file_size)
    }

    pub fn selector_codebook(&self) -> &'a [u8] {
        self.blob(self.header.selector_cb_file_ofs, self.header.selector_cb_file_size)
    }

    pub fn tables(&self) -> &'a [u8] {
        self.blob(self.header.tables_file_ofs, self.header.tables_file_size)
    }

    // Ranges were validated in `parse`.
    #[inline]
    fn blob(&self, offset: u32, size: u32) -> &'a [u8] {
        checked_range(offset, size, self.data.len())
            .and_then(|range| self.data.get(range))
            .unwrap_or_default()
    }
}

struct PendingSlice {
    desc: BasisSliceDesc,
    data: Vec<u8>,
}

/// Assembles encoder output in the layout the encoder produces.
///
/// The output is laid out as header, slice table, endpoint codebook, selector
/// codebook, tables and then every slice's data in the order added. Used by
/// test encoders and fuzzing to produce well formed inputs.
///
/// # Example
///
/// ```
/// use ktx2_basis_pack::basis_file::{BasisFile, BasisFileBuilder};
///
/// let bytes = BasisFileBuilder::new()
///     .endpoints(4, &[1, 2, 3])
///     .slice(0, 0, &[9, 9])
///     .build();
///
/// let file = BasisFile::parse(&bytes).unwrap();
/// assert_eq!(file.header().total_images, 1);
/// assert_eq!(file.endpoint_codebook(), &[1, 2, 3]);
/// ```
#[derive(Default)]
pub struct BasisFileBuilder {
    flags: u16,
    total_images: Option<u32>,
    total_endpoints: u16,
    endpoints: Vec<u8>,
    total_selectors: u16,
    selectors: Vec<u8>,
    tables: Vec<u8>,
    slices: Vec<PendingSlice>,
}

impl BasisFileBuilder {
    /// Creates a builder for an ETC1S file with no slices.
    pub fn new() -> Self {
        Self {
            flags: HEADER_FLAG_ETC1S,
            ..Default::default()
        }
    }

    /// Replaces the header flags.
    pub fn flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }

    /// Overrides the image count, which otherwise counts the colour slices.
    pub fn total_images(mut self, total_images: u32) -> Self {
        self.total_images = Some(total_images);
        self
    }

    pub fn endpoints(mut self, count: u16, data: &[u8]) -> Self {
        self.total_endpoints = count;
        self.endpoints = data.to_vec();
        self
    }

    pub fn selectors(mut self, count: u16, data: &[u8]) -> Self {
        self.total_selectors = count;
        self.selectors = data.to_vec();
        self
    }

    pub fn tables(mut self, data: &[u8]) -> Self {
        self.tables = data.to_vec();
        self
    }

    /// Appends a slice. Alpha slices carry [`SLICE_FLAG_HAS_ALPHA`].
    pub fn slice(mut self, image_index: u32, flags: u8, data: &[u8]) -> Self {
        self.slices.push(PendingSlice {
            desc: BasisSliceDesc {
                image_index,
                flags,
                file_size: data.len() as u32,
                ..Default::default()
            },
            data: data.to_vec(),
        });
        self
    }

    /// Like [`Self::slice`] but also records the source dimensions.
    pub fn slice_with_size(
        self,
        image_index: u32,
        flags: u8,
        width: u16,
        height: u16,
        data: &[u8],
    ) -> Self {
        let mut builder = self.slice(image_index, flags, data);
        if let Some(pending) = builder.slices.last_mut() {
            pending.desc.orig_width = width;
            pending.desc.orig_height = height;
            pending.desc.num_blocks_x = width.div_ceil(4);
            pending.desc.num_blocks_y = height.div_ceil(4);
        }
        builder
    }

    /// Appends the slices a stand-in encoder emits for RGBA `images`, each
    /// given as `(width, height, pixels)`.
    ///
    /// Every image gets an I-frame colour slice holding its red bytes. When any
    /// alpha byte is not 255, like the real encoder with alpha detection on,
    /// [`HEADER_FLAG_HAS_ALPHA_SLICES`] is set and each colour slice is followed
    /// by an alpha slice holding the alpha bytes.
    pub fn rgba_images(mut self, images: &[(u32, u32, &[u8])]) -> Self {
        let has_alpha = images
            .iter()
            .any(|(_, _, rgba)| rgba.chunks_exact(4).any(|pixel| pixel[3] != u8::MAX));
        if has_alpha {
            self.flags |= HEADER_FLAG_HAS_ALPHA_SLICES;
        }

        for (index, &(width, height, rgba)) in images.iter().enumerate() {
            let (width, height) = (width as u16, height as u16);
            let red: Vec<u8> = rgba.chunks_exact(4).map(|pixel| pixel[0]).collect();
            self = self.slice_with_size(index as u32, SLICE_FLAG_I_FRAME, width, height, &red);
            if has_alpha {
                let alpha: Vec<u8> = rgba.chunks_exact(4).map(|pixel| pixel[3]).collect();
                self = self.slice_with_size(index as u32, SLICE_FLAG_HAS_ALPHA, width, height, &alpha);
            }
        }
        self
    }

    /// Produces the encoded output.
    pub fn build(self) -> Vec<u8> {
        let table_ofs = BASIS_HEADER_SIZE;
        let endpoints_ofs = table_ofs + self.slices.len() * BASIS_SLICE_DESC_SIZE;
        let selectors_ofs = endpoints_ofs + self.endpoints.len();
        let tables_ofs = selectors_ofs + self.selectors.len();
        let mut data_ofs = tables_ofs + self.tables.len();
        let total_len = data_ofs + self.slices.iter().map(|s| s.data.len()).sum::<usize>();

        let color_slices = self.slices.iter().filter(|s| !s.desc.is_alpha()).count() as u32;
        let header = BasisFileHeader {
            signature: BASIS_SIGNATURE,
            version: BASIS_FILE_VERSION,
            header_size: BASIS_HEADER_SIZE as u16,
            data_size: (total_len - BASIS_HEADER_SIZE) as u32,
            total_slices: self.slices.len() as u32,
            total_images: self.total_images.unwrap_or(color_slices),
            flags: self.flags,
            tex_type: TEX_TYPE_2D,
            total_endpoints: self.total_endpoints,
            endpoint_cb_file_ofs: endpoints_ofs as u32,
            endpoint_cb_file_size: self.endpoints.len() as u32,
            total_selectors: self.total_selectors,
            selector_cb_file_ofs: selectors_ofs as u32,
            selector_cb_file_size: self.selectors.len() as u32,
            tables_file_ofs: tables_ofs as u32,
            tables_file_size: self.tables.len() as u32,
            slice_desc_file_ofs: table_ofs as u32,
            ..Default::default()
        };

        let mut out = Vec::with_capacity(total_len);
        out.extend_from_slice(&header.encode());
        for pending in &self.slices {
            let mut desc = pending.desc;
            desc.file_ofs = data_ofs as u32;
            out.extend_from_slice(&desc.encode());
            data_ofs += pending.data.len();
        }
        out.extend_from_slice(&self.endpoints);
        out.extend_from_slice(&self.selectors);
        out.extend_from_slice(&self.tables);
        for pending in &self.slices {
            out.extend_from_slice(&pending.data);
        }
        out
    }
}
