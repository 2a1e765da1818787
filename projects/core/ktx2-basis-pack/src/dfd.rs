//! Khronos data format descriptors (basic descriptor block only).
//!
//! A descriptor is stored as little endian `u32` words. Word 0 holds the total
//! size in bytes and the basic descriptor block (BDB) follows immediately:
//!
//! ```text
//! BDB word 0     vendorId:17 | descriptorType:15
//! BDB word 1     versionNumber:16 | descriptorBlockSize:16
//! BDB word 2     colorModel:8 | colorPrimaries:8 | transferFunction:8 | flags:8
//! BDB word 3     texelBlockDimension0..3 (stored as dimension - 1)
//! BDB word 4..5  bytesPlane0..7
//! BDB word 6..   samples, 4 words each
//! ```
//!
//! Each sample is `bitOffset:16 | bitLength:8 | channelType:8`, then four
//! sample positions, then `sampleLower` and `sampleUpper`. `bitLength` stores
//! the number of bits minus one.

use crate::allocate::AllocateError;
use alloc::vec::Vec;
use bitfield::bitfield;
use endian_writer::{EndianReader, EndianWriter, LittleEndianReader, LittleEndianWriter};
use thiserror::Error;

/// Words in the basic descriptor block before the first sample.
pub const BDB_WORD_SAMPLE_START: usize = 6;
/// Words per sample.
pub const BDB_WORDS_PER_SAMPLE: usize = 4;
/// Byte size of the basic descriptor block header.
pub const BDB_HEADER_BYTES: u32 = (BDB_WORD_SAMPLE_START * 4) as u32;
/// Byte size of one sample.
pub const BDB_SAMPLE_BYTES: u32 = (BDB_WORDS_PER_SAMPLE * 4) as u32;
/// Descriptor version written by [`DataFormatDescriptor::unorm8`].
pub const KHR_DF_VERSION: u32 = 2;

/// `KHR_DF_MODEL_RGBSDA`
pub const COLOR_MODEL_RGBSDA: u8 = 1;
/// `KHR_DF_PRIMARIES_BT709`
pub const COLOR_PRIMARIES_BT709: u8 = 1;
/// `KHR_DF_TRANSFER_LINEAR`
pub const TRANSFER_LINEAR: u8 = 1;
/// `KHR_DF_TRANSFER_SRGB`
pub const TRANSFER_SRGB: u8 = 2;

/// Channel ids of the RGBSDA color model.
pub const CHANNEL_RED: u8 = 0;
pub const CHANNEL_GREEN: u8 = 1;
pub const CHANNEL_BLUE: u8 = 2;
pub const CHANNEL_ALPHA: u8 = 15;

/// `KHR_DF_SAMPLE_DATATYPE_LINEAR`, as found in the high nibble of `channelType`.
pub const QUALIFIER_LINEAR: u8 = 0x1;

// Word indices relative to the start of the descriptor (word 0 is the total size).
const WORD_TOTAL_SIZE: usize = 0;
const WORD_BLOCK_SIZE: usize = 2;
const WORD_MODEL: usize = 3;
const WORD_TEXEL_BLOCK_DIMENSIONS: usize = 4;
const WORD_BYTES_PLANE0: usize = 5;
const WORD_BYTES_PLANE4: usize = 6;
const WORD_FIRST_SAMPLE: usize = 1 + BDB_WORD_SAMPLE_START;

bitfield! {
    /// BDB word 1.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BlockSizeWord(u32);
    impl Debug;
    u32;

    pub version_number, set_version_number: 15, 0;
    pub descriptor_block_size, set_descriptor_block_size: 31, 16;
}

bitfield! {
    /// BDB word 2.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ColorModelWord(u32);
    impl Debug;
    u32;

    pub color_model, set_color_model: 7, 0;
    pub color_primaries, set_color_primaries: 15, 8;
    pub transfer_function, set_transfer_function: 23, 16;
    pub flags, set_flags: 31, 24;
}

bitfield! {
    /// First word of a sample.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SampleWord(u32);
    impl Debug;
    u32;

    pub bit_offset, set_bit_offset: 15, 0;
    /// Number of bits minus one.
    pub bit_length, set_bit_length: 23, 16;
    pub channel_type, set_channel_type: 31, 24;
    pub channel_id, set_channel_id: 27, 24;
    pub qualifiers, set_qualifiers: 31, 28;
}

/// Errors raised while reading or building a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DfdError {
    /// Too short to hold the size word and a basic descriptor block header.
    #[error("Descriptor of {0} bytes is too short")]
    TooShort(usize),

    /// Descriptors are made of whole `u32` words.
    #[error("Descriptor length {0} is not a multiple of 4")]
    UnalignedLength(usize),

    /// Word 0 disagrees with the actual length.
    #[error("Descriptor declares {declared} bytes but holds {actual}")]
    SizeMismatch { declared: u32, actual: usize },

    /// The block size does not describe a whole number of samples.
    #[error("Invalid descriptor block size {0}")]
    InvalidBlockSize(u32),

    /// The basic block runs past the end of the descriptor.
    #[error("Descriptor block of {block_size} bytes exceeds the {available} bytes available")]
    BlockExceedsDescriptor { block_size: u32, available: usize },

    /// The output buffer is too small.
    #[error("Output buffer of {actual} bytes cannot hold {required} bytes")]
    BufferTooSmall { required: usize, actual: usize },

    /// Only 1 to 4 channel descriptors can be built.
    #[error("Cannot build a descriptor with {0} channels")]
    UnsupportedComponentCount(u32),

    #[error(transparent)]
    Allocate(#[from] AllocateError),
}

/// One decoded sample of the basic descriptor block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DfdSample {
    pub bit_offset: u16,
    /// Number of bits minus one.
    pub bit_length: u8,
    pub channel_type: u8,
    pub positions: [u8; 4],
    pub lower: u32,
    pub upper: u32,
}

impl DfdSample {
    /// Channel id (low nibble of the channel type).
    #[inline]
    pub fn channel_id(&self) -> u8 {
        self.channel_type & 0xF
    }

    /// Data type qualifiers (high nibble of the channel type).
    #[inline]
    pub fn qualifiers(&self) -> u8 {
        self.channel_type >> 4
    }

    /// Number of bits covered by the sample.
    #[inline]
    pub fn bits(&self) -> u32 {
        self.bit_length as u32 + 1
    }
}

/// Component summary of an unpacked format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentInfo {
    pub num_components: u32,
    /// Bytes per component, taken from the last component described.
    pub component_byte_length: u32,
}

/// An owned, validated data format descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFormatDescriptor {
    words: Vec<u32>,
}

impl DataFormatDescriptor {
    /// Reads a descriptor from its serialized little endian form.
    pub fn parse(bytes: &[u8]) -> Result<Self, DfdError> {
        if bytes.len() % 4 != 0 {
            return Err(DfdError::UnalignedLength(bytes.len()));
        }

        let num_words = bytes.len() / 4;
        let mut words = Vec::new();
        words
            .try_reserve_exact(num_words)
            .map_err(AllocateError::from)?;

        // SAFETY: every read is at `index * 4 < bytes.len()`.
        let mut reader = unsafe { LittleEndianReader::new(bytes.as_ptr()) };
        for index in 0..num_words {
            words.push(unsafe { reader.read_u32_at((index * 4) as isize) });
        }

        Self::from_words(words)
    }

    /// Wraps native endian words, validating the size and block fields.
    pub fn from_words(words: Vec<u32>) -> Result<Self, DfdError> {
        let len = words.len() * 4;
        if len < 4 + BDB_HEADER_BYTES as usize {
            return Err(DfdError::TooShort(len));
        }

        let declared = words[WORD_TOTAL_SIZE];
        if declared as usize != len {
            return Err(DfdError::SizeMismatch {
                declared,
                actual: len,
            });
        }

        let block_size = BlockSizeWord(words[WORD_BLOCK_SIZE]).descriptor_block_size();
        if block_size < BDB_HEADER_BYTES || (block_size - BDB_HEADER_BYTES) % BDB_SAMPLE_BYTES != 0
        {
            return Err(DfdError::InvalidBlockSize(block_size));
        }
        if block_size as usize > len - 4 {
            return Err(DfdError::BlockExceedsDescriptor {
                block_size,
                available: len - 4,
            });
        }

        Ok(Self { words })
    }

    /// Builds a single plane descriptor for 8-bit UNORM data with
    /// `num_components` channels (R, RG, RGB or RGBA).
    ///
    /// With `srgb` set the transfer function is sRGB and the alpha sample is
    /// flagged linear.
    pub fn unorm8(num_components: u32, srgb: bool) -> Result<Self, DfdError> {
        const CHANNELS: [u8; 4] = [CHANNEL_RED, CHANNEL_GREEN, CHANNEL_BLUE, CHANNEL_ALPHA];
        if !(1..=4).contains(&num_components) {
            return Err(DfdError::UnsupportedComponentCount(num_components));
        }

        let n = num_components as usize;
        let block_size = BDB_HEADER_BYTES + BDB_SAMPLE_BYTES * num_components;
        let num_words = 1 + BDB_WORD_SAMPLE_START + n * BDB_WORDS_PER_SAMPLE;

        let mut words = Vec::new();
        words
            .try_reserve_exact(num_words)
            .map_err(AllocateError::from)?;
        words.resize(num_words, 0);

        words[WORD_TOTAL_SIZE] = block_size + 4;

        let mut size_word = BlockSizeWord::default();
        size_word.set_version_number(KHR_DF_VERSION);
        size_word.set_descriptor_block_size(block_size);
        words[WORD_BLOCK_SIZE] = size_word.0;

        let mut model = ColorModelWord::default();
        model.set_color_model(COLOR_MODEL_RGBSDA as u32);
        model.set_color_primaries(COLOR_PRIMARIES_BT709 as u32);
        let transfer = if srgb { TRANSFER_SRGB } else { TRANSFER_LINEAR };
        model.set_transfer_function(transfer as u32);
        words[WORD_MODEL] = model.0;

        // 1x1x1 texel blocks are stored as zero dimensions.
        words[WORD_TEXEL_BLOCK_DIMENSIONS] = 0;
        words[WORD_BYTES_PLANE0] = num_components;

        for (index, &channel) in CHANNELS.iter().take(n).enumerate() {
            let mut qualifiers = 0;
            if srgb && channel == CHANNEL_ALPHA {
                qualifiers = QUALIFIER_LINEAR;
            }

            let mut sample = SampleWord::default();
            sample.set_bit_offset(8 * index as u32);
            sample.set_bit_length(7);
            sample.set_channel_id(channel as u32);
            sample.set_qualifiers(qualifiers as u32);

            let base = WORD_FIRST_SAMPLE + index * BDB_WORDS_PER_SAMPLE;
            words[base] = sample.0;
            words[base + 1] = 0;
            words[base + 2] = 0;
            words[base + 3] = u8::MAX as u32;
        }

        Ok(Self { words })
    }

    /// The descriptor as native endian words, size word included.
    #[inline]
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Total size in bytes.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.words.len() * 4
    }

    /// Serializes into `dst`, which must hold at least [`Self::byte_len`] bytes.
    pub fn write_to(&self, dst: &mut [u8]) -> Result<(), DfdError> {
        if dst.len() < self.byte_len() {
            return Err(DfdError::BufferTooSmall {
                required: self.byte_len(),
                actual: dst.len(),
            });
        }

        // SAFETY: checked above that every word fits.
        unsafe {
            let mut writer = LittleEndianWriter::new(dst.as_mut_ptr());
            for (index, &word) in self.words.iter().enumerate() {
                writer.write_u32_at(word, (index * 4) as isize);
            }
        }
        Ok(())
    }

    /// Serializes into a new buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DfdError> {
        let mut bytes = crate::allocate::try_alloc_zeroed(self.byte_len())?;
        self.write_to(&mut bytes)?;
        Ok(bytes)
    }

    /// Byte size of the basic descriptor block.
    #[inline]
    pub fn descriptor_block_size(&self) -> u32 {
        BlockSizeWord(self.words[WORD_BLOCK_SIZE]).descriptor_block_size()
    }

    pub fn version_number(&self) -> u32 {
        BlockSizeWord(self.words[WORD_BLOCK_SIZE]).version_number()
    }

    pub fn color_model(&self) -> u8 {
        ColorModelWord(self.words[WORD_MODEL]).color_model() as u8
    }

    pub fn color_primaries(&self) -> u8 {
        ColorModelWord(self.words[WORD_MODEL]).color_primaries() as u8
    }

    pub fn transfer_function(&self) -> u8 {
        ColorModelWord(self.words[WORD_MODEL]).transfer_function() as u8
    }

    /// Whether the data is sRGB encoded, i.e. should be compressed perceptually.
    #[inline]
    pub fn is_srgb(&self) -> bool {
        self.transfer_function() == TRANSFER_SRGB
    }

    /// Raw texel block dimension word.
    pub fn texel_block_dimensions(&self) -> [u8; 4] {
        self.words[WORD_TEXEL_BLOCK_DIMENSIONS].to_le_bytes()
    }

    /// `bytesPlane0..7`.
    pub fn bytes_planes(&self) -> [u8; 8] {
        let low = self.words[WORD_BYTES_PLANE0].to_le_bytes();
        let high = self.words[WORD_BYTES_PLANE4].to_le_bytes();
        [
            low[0], low[1], low[2], low[3], high[0], high[1], high[2], high[3],
        ]
    }

    /// Number of samples in the basic descriptor block.
    #[inline]
    pub fn sample_count(&self) -> u32 {
        (self.descriptor_block_size() - BDB_HEADER_BYTES) / BDB_SAMPLE_BYTES
    }

    /// Decodes sample `index`.
    pub fn sample(&self, index: u32) -> Option<DfdSample> {
        if index >= self.sample_count() {
            return None;
        }

        let base = WORD_FIRST_SAMPLE + index as usize * BDB_WORDS_PER_SAMPLE;
        let words = self.words.get(base..base + BDB_WORDS_PER_SAMPLE)?;
        let first = SampleWord(words[0]);
        Some(DfdSample {
            bit_offset: first.bit_offset() as u16,
            bit_length: first.bit_length() as u8,
            channel_type: first.channel_type() as u8,
            positions: words[1].to_le_bytes(),
            lower: words[2],
            upper: words[3],
        })
    }

    /// Iterates all samples in order.
    pub fn samples(&self) -> impl Iterator<Item = DfdSample> + '_ {
        (0..self.sample_count()).filter_map(move |index| self.sample(index))
    }

    /// Component count and per component byte length of an unpacked format.
    ///
    /// Consecutive samples with the same channel id describe one component.
    pub fn component_info_unpacked(&self) -> ComponentInfo {
        let mut info = ComponentInfo {
            num_components: 0,
            component_byte_length: 0,
        };
        let mut current_channel = None;

        for sample in self.samples() {
            let byte_length = sample.bits() >> 3;
            if current_channel == Some(sample.channel_id()) {
                info.component_byte_length += byte_length;
            } else {
                current_channel = Some(sample.channel_id());
                info.num_components += 1;
                info.component_byte_length = byte_length;
            }
        }

        info
    }

    /// Builds the descriptor of the same colour model in unsized form.
    ///
    /// The alpha sample is dropped when a 4 sample descriptor is rewritten with
    /// `has_alpha == false`. Plane sizes, the texel block dimensions and every
    /// sample's bit offset, bit length, lower and upper values are zeroed;
    /// channel types and sample positions are kept. Anything following the
    /// retained samples is not carried over.
    pub fn rewrite_unsized(&self, has_alpha: bool) -> Result<Self, DfdError> {
        let mut sample_count = self.sample_count();
        if sample_count == 4 && !has_alpha {
            sample_count = 3;
        }

        let block_size = BDB_HEADER_BYTES + sample_count * BDB_SAMPLE_BYTES;
        let total_size = block_size + 4;
        let num_words = total_size as usize / 4;

        let mut words = Vec::new();
        words
            .try_reserve_exact(num_words)
            .map_err(AllocateError::from)?;
        words.extend_from_slice(&self.words[..num_words]);

        if total_size != self.words[WORD_TOTAL_SIZE] {
            words[WORD_TOTAL_SIZE] = total_size;
            let mut size_word = BlockSizeWord(words[WORD_BLOCK_SIZE]);
            size_word.set_descriptor_block_size(block_size);
            words[WORD_BLOCK_SIZE] = size_word.0;
        }

        words[WORD_BYTES_PLANE0] = 0;
        words[WORD_BYTES_PLANE4] = 0;
        words[WORD_TEXEL_BLOCK_DIMENSIONS] = 0;

        for sample in 0..sample_count as usize {
            let base = WORD_FIRST_SAMPLE + sample * BDB_WORDS_PER_SAMPLE;
            let mut first = SampleWord(words[base]);
            first.set_bit_offset(0);
            first.set_bit_length(0);
            words[base] = first.0;
            words[base + 2] = 0;
            words[base + 3] = 0;
        }

        Ok(Self { words })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_prelude::*;

    #[rstest]
    #[case(1, 44)]
    #[case(2, 60)]
    #[case(3, 76)]
    #[case(4, 92)]
    fn unorm8_layout(#[case] num_components: u32, #[case] expected_size: usize) {
        let dfd = DataFormatDescriptor::unorm8(num_components, false).unwrap();

        assert_eq!(dfd.byte_len(), expected_size);
        assert_eq!(dfd.words()[0] as usize, expected_size);
        assert_eq!(dfd.sample_count(), num_components);
        assert_eq!(dfd.bytes_planes()[0] as u32, num_components);
        assert_eq!(dfd.color_model(), COLOR_MODEL_RGBSDA);
        assert_eq!(
            dfd.component_info_unpacked(),
            ComponentInfo {
                num_components,
                component_byte_length: 1
            }
        );
    }

    #[test]
    fn unorm8_samples_describe_rgba() {
        let dfd = DataFormatDescriptor::unorm8(4, true).unwrap();
        let samples: Vec<DfdSample> = dfd.samples().collect();

        assert!(dfd.is_srgb());
        assert_eq!(samples.len(), 4);
        let ids: Vec<u8> = samples.iter().map(|s| s.channel_id()).collect();
        assert_eq!(ids, vec![0, 1, 2, 15]);
        assert_eq!(samples[2].bit_offset, 16);
        assert_eq!(samples[2].bits(), 8);
        assert_eq!(samples[3].qualifiers(), QUALIFIER_LINEAR);
        assert_eq!(samples[0].qualifiers(), 0);
        assert_eq!(samples[1].upper, 255);
    }

    #[test]
    fn parse_round_trips_serialized_form() {
        let dfd = DataFormatDescriptor::unorm8(3, true).unwrap();
        let bytes = dfd.to_bytes().unwrap();

        assert_eq!(&bytes[..4], &76u32.to_le_bytes());
        assert_eq!(DataFormatDescriptor::parse(&bytes).unwrap(), dfd);
    }

    #[test]
    fn parse_rejects_size_mismatch() {
        let mut bytes = DataFormatDescriptor::unorm8(2, false)
            .unwrap()
            .to_bytes()
            .unwrap();
        bytes[0] = 64;
        assert_eq!(
            DataFormatDescriptor::parse(&bytes),
            Err(DfdError::SizeMismatch {
                declared: 64,
                actual: 60
            })
        );
    }

    #[rstest]
    #[case(&[0u8; 6], DfdError::UnalignedLength(6))]
    #[case(&[0u8; 8], DfdError::TooShort(8))]
    fn parse_rejects_malformed(#[case] bytes: &[u8], #[case] expected: DfdError) {
        assert_eq!(DataFormatDescriptor::parse(bytes), Err(expected));
    }

    #[test]
    fn parse_rejects_partial_sample() {
        let mut words = DataFormatDescriptor::unorm8(1, false).unwrap().words().to_vec();
        let mut size_word = BlockSizeWord(words[WORD_BLOCK_SIZE]);
        size_word.set_descriptor_block_size(30);
        words[WORD_BLOCK_SIZE] = size_word.0;

        assert_eq!(
            DataFormatDescriptor::from_words(words),
            Err(DfdError::InvalidBlockSize(30))
        );
    }

    #[test]
    fn rewrite_drops_alpha_and_unsizes() {
        let dfd = DataFormatDescriptor::unorm8(4, true).unwrap();
        let rewritten = dfd.rewrite_unsized(false).unwrap();

        assert_eq!(rewritten.sample_count(), 3);
        assert_eq!(rewritten.byte_len(), 76);
        assert_eq!(rewritten.words()[0], 76);
        assert_eq!(rewritten.descriptor_block_size(), 72);
        assert_eq!(rewritten.bytes_planes(), [0; 8]);
        assert_eq!(rewritten.texel_block_dimensions(), [0; 4]);
        // Model and transfer survive.
        assert_eq!(rewritten.color_model(), dfd.color_model());
        assert!(rewritten.is_srgb());

        for (old, new) in dfd.samples().zip(rewritten.samples()) {
            assert_eq!(new.channel_type, old.channel_type);
            assert_eq!(new.positions, old.positions);
            assert_eq!(new.bit_offset, 0);
            assert_eq!(new.bit_length, 0);
            assert_eq!(new.lower, 0);
            assert_eq!(new.upper, 0);
        }
    }

    #[rstest]
    #[case(4, true, 4)]
    #[case(3, false, 3)]
    #[case(3, true, 3)]
    #[case(2, false, 2)]
    #[case(1, false, 1)]
    fn rewrite_keeps_sample_count(
        #[case] num_components: u32,
        #[case] has_alpha: bool,
        #[case] expected: u32,
    ) {
        let dfd = DataFormatDescriptor::unorm8(num_components, false).unwrap();
        let rewritten = dfd.rewrite_unsized(has_alpha).unwrap();

        assert_eq!(rewritten.sample_count(), expected);
        assert_eq!(rewritten.words()[0] as usize, rewritten.byte_len());
        assert_eq!(rewritten.bytes_planes(), [0; 8]);
    }

    #[test]
    fn component_info_merges_consecutive_samples() {
        // Two 8-bit samples for red (16-bit red split in two), then green.
        let mut words = DataFormatDescriptor::unorm8(3, false).unwrap().words().to_vec();
        let mut second = SampleWord(words[WORD_FIRST_SAMPLE + BDB_WORDS_PER_SAMPLE]);
        second.set_channel_id(CHANNEL_RED as u32);
        words[WORD_FIRST_SAMPLE + BDB_WORDS_PER_SAMPLE] = second.0;
        let mut third = SampleWord(words[WORD_FIRST_SAMPLE + 2 * BDB_WORDS_PER_SAMPLE]);
        third.set_channel_id(CHANNEL_GREEN as u32);
        third.set_bit_length(15);
        words[WORD_FIRST_SAMPLE + 2 * BDB_WORDS_PER_SAMPLE] = third.0;

        let dfd = DataFormatDescriptor::from_words(words).unwrap();
        assert_eq!(
            dfd.component_info_unpacked(),
            ComponentInfo {
                num_components: 2,
                component_byte_length: 2
            }
        );
    }
}
