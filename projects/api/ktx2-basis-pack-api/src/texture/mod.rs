//! In-memory KTX2 texture.
//!
//! [`Ktx2Texture`] holds what the packaging layer reads and replaces: the
//! format, the level index, the data format descriptor, key/value metadata,
//! the image data and, once supercompressed, the global data block.
//!
//! Levels are stored smallest first. Within a level, images are laid out
//! layer by layer, then face by face (or depth slice by depth slice), with no
//! row padding.

mod format;
mod image_data;

pub use format::*;
pub use image_data::{ImageDataError, ImageDataSource};

use crate::error::InvalidOperationReason;
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::ops::Range;
use ktx2_basis_pack::allocate::{try_alloc_zeroed, try_clone_slice, AllocateError};
use ktx2_basis_pack::{DataFormatDescriptor, DfdError, LayoutError, LevelIndexEntry, TextureLayout};
use thiserror::Error;

/// Parameters for [`Ktx2Texture::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureCreateInfo {
    /// One of the 8-bit `VK_FORMAT_*` constants in this module.
    pub vk_format: u32,
    pub base_width: u32,
    pub base_height: u32,
    pub base_depth: u32,
    /// 1, 2 or 3.
    pub num_dimensions: u32,
    pub num_levels: u32,
    pub num_layers: u32,
    /// 1, or 6 for cubemaps.
    pub num_faces: u32,
    pub is_array: bool,
    /// Allocate zeroed image data. Without it, data is loaded from an
    /// [`ImageDataSource`] on demand.
    pub allocate_storage: bool,
}

impl TextureCreateInfo {
    /// A single layer 2D texture with storage.
    pub fn new_2d(vk_format: u32, width: u32, height: u32, num_levels: u32) -> Self {
        Self {
            vk_format,
            base_width: width,
            base_height: height,
            base_depth: 1,
            num_dimensions: 2,
            num_levels,
            num_layers: 1,
            num_faces: 1,
            is_array: false,
            allocate_storage: true,
        }
    }
}

/// Errors raised by [`Ktx2Texture::new`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TextureCreateError {
    /// Only 8-bit R, RG, RGB and RGBA formats can be created.
    #[error("Unsupported format {0}")]
    UnsupportedFormat(u32),

    #[error("Invalid dimension count {0}")]
    InvalidDimensionCount(u32),

    /// The extents do not fit the dimension count.
    #[error("A {num_dimensions}D texture cannot be {width}x{height}x{depth}")]
    ExtentForDimensions {
        num_dimensions: u32,
        width: u32,
        height: u32,
        depth: u32,
    },

    #[error("Invalid face count {0}, expected 1 or 6")]
    InvalidFaceCount(u32),

    /// Cubemaps must be square and 2D.
    #[error("Cubemap faces must be square 2D images")]
    InvalidCubemap,

    #[error("Texture has {levels} levels, at most {max} fit its size")]
    TooManyLevels { levels: u32, max: u32 },

    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// The image data does not fit in memory's address space.
    #[error("Texture data size overflows")]
    SizeOverflow,

    #[error(transparent)]
    Dfd(DfdError),

    #[error(transparent)]
    Allocate(#[from] AllocateError),
}

impl From<DfdError> for TextureCreateError {
    fn from(value: DfdError) -> Self {
        match value {
            DfdError::Allocate(e) => Self::Allocate(e),
            other => Self::Dfd(other),
        }
    }
}

/// A KTX2 texture held in memory.
pub struct Ktx2Texture {
    /// `VK_FORMAT_*` of the images, [`VK_FORMAT_UNDEFINED`] once supercompressed.
    pub vk_format: u32,
    /// Size of the data type, in bytes.
    pub type_size: u32,
    pub base_width: u32,
    pub base_height: u32,
    pub base_depth: u32,
    pub num_dimensions: u32,
    pub num_levels: u32,
    pub num_layers: u32,
    pub num_faces: u32,
    pub is_array: bool,
    pub is_cubemap: bool,
    /// The images are block compressed.
    pub is_compressed: bool,
    pub supercompression_scheme: SupercompressionScheme,
    pub format_size: FormatSize,
    pub dfd: DataFormatDescriptor,
    /// Alignment of each level's offset within the data.
    pub required_level_alignment: u32,
    level_index: Vec<LevelIndexEntry>,
    key_values: BTreeMap<String, Vec<u8>>,
    data: Option<Vec<u8>>,
    data_size: usize,
    source: Option<Box<dyn ImageDataSource>>,
    supercompression_global_data: Option<Vec<u8>>,
}

/// Everything replaced when a texture is supercompressed.
pub(crate) struct Supercompressed {
    pub(crate) data: Vec<u8>,
    pub(crate) level_index: Vec<LevelIndexEntry>,
    pub(crate) dfd: DataFormatDescriptor,
    pub(crate) global_data: Vec<u8>,
}

impl Ktx2Texture {
    /// Creates an uncompressed 8-bit texture.
    ///
    /// # Errors
    ///
    /// - [`TextureCreateError::UnsupportedFormat`] for anything but the 8-bit
    ///   `R`, `RG`, `RGB` and `RGBA` UNORM/sRGB formats.
    /// - Shape errors when the extents, face count or level count are invalid.
    /// - [`TextureCreateError::Allocate`] when the image data cannot be allocated.
    pub fn new(info: TextureCreateInfo) -> Result<Self, TextureCreateError> {
        let (num_components, srgb) =
            format::describe_format(info.vk_format).ok_or(TextureCreateError::UnsupportedFormat(info.vk_format))?;
        validate_shape(&info)?;

        let dfd = DataFormatDescriptor::unorm8(num_components, srgb)?;
        let alignment = lcm4(num_components);

        let mut texture = Self {
            vk_format: info.vk_format,
            type_size: 1,
            base_width: info.base_width,
            base_height: info.base_height,
            base_depth: info.base_depth,
            num_dimensions: info.num_dimensions,
            num_levels: info.num_levels,
            num_layers: info.num_layers,
            num_faces: info.num_faces,
            is_array: info.is_array,
            is_cubemap: info.num_faces == 6,
            is_compressed: false,
            supercompression_scheme: SupercompressionScheme::None,
            format_size: FormatSize::uncompressed(num_components),
            dfd,
            required_level_alignment: alignment,
            level_index: Vec::new(),
            key_values: BTreeMap::new(),
            data: None,
            data_size: 0,
            source: None,
            supercompression_global_data: None,
        };

        let mut level_index = Vec::new();
        level_index.try_reserve_exact(info.num_levels as usize).map_err(AllocateError::from)?;
        level_index.resize(info.num_levels as usize, LevelIndexEntry::default());

        // Smallest level first, each aligned.
        let mut offset = 0usize;
        for level in (0..info.num_levels).rev() {
            let level_size = texture.level_size(level).ok_or(TextureCreateError::SizeOverflow)?;
            offset = align_up(offset, alignment as usize).ok_or(TextureCreateError::SizeOverflow)?;
            level_index[level as usize] = LevelIndexEntry {
                byte_offset: offset as u64,
                byte_length: level_size as u64,
                uncompressed_byte_length: level_size as u64,
            };
            offset = offset.checked_add(level_size).ok_or(TextureCreateError::SizeOverflow)?;
        }

        texture.level_index = level_index;
        texture.data_size = offset;
        if info.allocate_storage {
            texture.data = Some(try_alloc_zeroed(offset)?);
        }

        Ok(texture)
    }

    /// The texture's shape.
    #[inline]
    pub fn layout(&self) -> TextureLayout {
        TextureLayout {
            base_width: self.base_width,
            base_height: self.base_height,
            base_depth: self.base_depth,
            num_levels: self.num_levels,
            num_layers: self.num_layers,
            num_faces: self.num_faces,
        }
    }

    /// One entry per level, indexed by level.
    #[inline]
    pub fn level_index(&self) -> &[LevelIndexEntry] {
        &self.level_index
    }

    /// Size of the complete image data.
    #[inline]
    pub fn data_size(&self) -> usize {
        self.data_size
    }

    /// The image data, if loaded.
    #[inline]
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// The supercompression global data, present once supercompressed.
    #[inline]
    pub fn supercompression_global_data(&self) -> Option<&[u8]> {
        self.supercompression_global_data.as_deref()
    }

    /// Attaches a source for [`Self::load_image_data`].
    pub fn set_image_source<S: ImageDataSource + 'static>(&mut self, source: S) {
        self.source = Some(Box::new(source));
    }

    /// Reads the image data from the attached source unless already loaded.
    ///
    /// # Errors
    ///
    /// - [`ImageDataError::NoSource`] when there is nothing to load from.
    /// - [`ImageDataError::SizeMismatch`] when the source returns anything but
    ///   [`Self::data_size`] bytes. The texture stays unloaded.
    pub fn load_image_data(&mut self) -> Result<(), ImageDataError> {
        if self.data.is_some() {
            return Ok(());
        }

        let data_size = self.data_size;
        let source = self.source.as_mut().ok_or(ImageDataError::NoSource)?;
        let data = source.read_image_data(data_size)?;
        if data.len() != data_size {
            return Err(ImageDataError::SizeMismatch {
                expected: data_size,
                actual: data.len(),
            });
        }

        self.data = Some(data);
        Ok(())
    }

    /// Size of one image of `level`, in bytes.
    pub fn image_size(&self, level: u32) -> usize {
        let (width, height, _) = self.layout().level_extent(level);
        (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(self.format_size.block_bytes() as usize)
    }

    /// Offset of an image within [`Self::data`].
    ///
    /// `face_slice` is the cubemap face, or the depth slice of a 3D texture.
    pub fn image_offset(&self, level: u32, layer: u32, face_slice: u32) -> Result<usize, ImageDataError> {
        self.image_range(level, layer, face_slice)
            .map(|range| range.start)
    }

    /// One image's bytes.
    pub fn image(&self, level: u32, layer: u32, face_slice: u32) -> Result<&[u8], ImageDataError> {
        let range = self.image_range(level, layer, face_slice)?;
        let data = self.data.as_deref().ok_or(ImageDataError::NotLoaded)?;
        data.get(range).ok_or(ImageDataError::ImageOutOfRange {
            level,
            layer,
            face_slice,
        })
    }

    /// One image's bytes, for filling in pixel data.
    pub fn image_mut(&mut self, level: u32, layer: u32, face_slice: u32) -> Result<&mut [u8], ImageDataError> {
        let range = self.image_range(level, layer, face_slice)?;
        let data = self.data.as_deref_mut().ok_or(ImageDataError::NotLoaded)?;
        data.get_mut(range).ok_or(ImageDataError::ImageOutOfRange {
            level,
            layer,
            face_slice,
        })
    }

    /// Checks that the level index and image data can hold every image the
    /// shape fields describe.
    ///
    /// The shape fields are public, so this is what guards image addressing
    /// after they are changed.
    pub(crate) fn check_storage(&self) -> Result<(), InvalidOperationReason> {
        if self.level_index.len() != self.num_levels as usize {
            return Err(InvalidOperationReason::LevelIndexMismatch {
                entries: self.level_index.len(),
                num_levels: self.num_levels,
            });
        }

        for (level, entry) in (0..self.num_levels).zip(&self.level_index) {
            let end = usize::try_from(entry.byte_offset)
                .ok()
                .zip(self.level_size(level))
                .and_then(|(offset, size)| offset.checked_add(size));
            if end.map_or(true, |end| end > self.data_size) {
                return Err(InvalidOperationReason::LevelOutOfBounds {
                    level,
                    data_size: self.data_size,
                });
            }
        }

        Ok(())
    }

    /// Byte range of an image within the declared image data.
    fn image_range(&self, level: u32, layer: u32, face_slice: u32) -> Result<Range<usize>, ImageDataError> {
        if self.supercompression_scheme != SupercompressionScheme::None {
            return Err(ImageDataError::Supercompressed);
        }

        let out_of_range = || ImageDataError::ImageOutOfRange {
            level,
            layer,
            face_slice,
        };

        let face_slices = self.layout().face_slices(level);
        if level >= self.num_levels || layer >= self.num_layers || face_slice >= face_slices {
            return Err(out_of_range());
        }

        let entry = self.level_index.get(level as usize).ok_or_else(out_of_range)?;
        let image_size = self.image_size(level);
        let start = (layer as usize)
            .checked_mul(face_slices as usize)
            .and_then(|images| images.checked_add(face_slice as usize))
            .and_then(|index| index.checked_mul(image_size))
            .zip(usize::try_from(entry.byte_offset).ok())
            .and_then(|(within, level_offset)| level_offset.checked_add(within));

        start
            .and_then(|start| Some(start..start.checked_add(image_size)?))
            .filter(|range| range.end <= self.data_size)
            .ok_or_else(out_of_range)
    }

    /// Looks up a key/value metadata entry.
    pub fn find_value(&self, key: &str) -> Option<&[u8]> {
        self.key_values.get(key).map(Vec::as_slice)
    }

    /// Inserts or replaces a key/value metadata entry.
    pub fn set_value(&mut self, key: &str, value: &[u8]) -> Result<(), AllocateError> {
        let value = try_clone_slice(value)?;
        self.key_values.insert(String::from(key), value);
        Ok(())
    }

    /// Replaces the images, level index and descriptor with their
    /// supercompressed counterparts. Nothing here can fail.
    pub(crate) fn commit_supercompressed(&mut self, output: Supercompressed) {
        self.vk_format = VK_FORMAT_UNDEFINED;
        self.supercompression_scheme = SupercompressionScheme::BasisLz;
        self.format_size = FormatSize::unsized_format();
        self.required_level_alignment = 1;
        self.dfd = output.dfd;
        self.level_index = output.level_index;
        self.data_size = output.data.len();
        self.data = Some(output.data);
        self.source = None;
        self.supercompression_global_data = Some(output.global_data);
    }

    /// Size of one level, or [`None`] on overflow.
    fn level_size(&self, level: u32) -> Option<usize> {
        let (width, height, _) = self.layout().level_extent(level);
        (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(self.format_size.block_bytes() as usize)?
            .checked_mul(self.layout().face_slices(level) as usize)?
            .checked_mul(self.num_layers as usize)
    }
}

impl fmt::Debug for Ktx2Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ktx2Texture")
            .field("vk_format", &self.vk_format)
            .field("base_width", &self.base_width)
            .field("base_height", &self.base_height)
            .field("base_depth", &self.base_depth)
            .field("num_levels", &self.num_levels)
            .field("num_layers", &self.num_layers)
            .field("num_faces", &self.num_faces)
            .field("supercompression_scheme", &self.supercompression_scheme)
            .field("level_index", &self.level_index)
            .field("data_size", &self.data_size)
            .field("data_loaded", &self.data.is_some())
            .finish_non_exhaustive()
    }
}

fn validate_shape(info: &TextureCreateInfo) -> Result<(), TextureCreateError> {
    if !(1..=3).contains(&info.num_dimensions) {
        return Err(TextureCreateError::InvalidDimensionCount(info.num_dimensions));
    }

    let extent_ok = match info.num_dimensions {
        1 => info.base_height == 1 && info.base_depth == 1,
        2 => info.base_depth == 1,
        _ => true,
    };
    if !extent_ok {
        return Err(TextureCreateError::ExtentForDimensions {
            num_dimensions: info.num_dimensions,
            width: info.base_width,
            height: info.base_height,
            depth: info.base_depth,
        });
    }

    match info.num_faces {
        1 => {}
        6 => {
            if info.num_dimensions != 2 || info.base_width != info.base_height {
                return Err(TextureCreateError::InvalidCubemap);
            }
        }
        faces => return Err(TextureCreateError::InvalidFaceCount(faces)),
    }

    let layout = TextureLayout {
        base_width: info.base_width,
        base_height: info.base_height,
        base_depth: info.base_depth,
        num_levels: info.num_levels,
        num_layers: info.num_layers,
        num_faces: info.num_faces,
    };
    layout.validate()?;

    let largest = info.base_width.max(info.base_height).max(info.base_depth);
    let max = u32::BITS - largest.leading_zeros();
    if info.num_levels > max {
        return Err(TextureCreateError::TooManyLevels {
            levels: info.num_levels,
            max,
        });
    }

    Ok(())
}

/// Least common multiple of `value` and 4.
#[inline]
fn lcm4(value: u32) -> u32 {
    match value % 4 {
        0 => value,
        2 => value * 2,
        _ => value * 4,
    }
}

#[inline]
fn align_up(value: usize, alignment: usize) -> Option<usize> {
    Some(value.checked_add(alignment - 1)? / alignment * alignment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_prelude::*;

    #[rstest]
    #[case(1, 4)]
    #[case(2, 4)]
    #[case(3, 12)]
    #[case(4, 4)]
    fn level_alignment(#[case] components: u32, #[case] expected: u32) {
        assert_eq!(lcm4(components), expected);
    }

    #[rstest]
    #[case::extra_layer(|t: &mut Ktx2Texture| t.num_layers = 2, (0, 1, 0))]
    #[case::extra_level(|t: &mut Ktx2Texture| t.num_levels = 2, (1, 0, 0))]
    #[case::wider_base(|t: &mut Ktx2Texture| t.base_width = 8, (0, 0, 0))]
    #[case::deeper_base(|t: &mut Ktx2Texture| t.base_depth = 2, (0, 0, 1))]
    fn reshaped_textures_report_out_of_range_images(
        #[case] reshape: fn(&mut Ktx2Texture),
        #[case] image: (u32, u32, u32),
    ) {
        let (level, layer, face_slice) = image;
        let mut texture = Ktx2Texture::new(TextureCreateInfo::new_2d(VK_FORMAT_R8G8B8A8_UNORM, 4, 4, 1)).unwrap();
        reshape(&mut texture);

        let expected = ImageDataError::ImageOutOfRange { level, layer, face_slice };
        assert_eq!(texture.image(level, layer, face_slice), Err(expected.clone()));
        assert_eq!(texture.image_mut(level, layer, face_slice).map(|image| image.len()), Err(expected));
        assert!(texture.check_storage().is_err());
    }

    #[test]
    fn fresh_textures_pass_storage_check() {
        let texture = Ktx2Texture::new(TextureCreateInfo::new_2d(VK_FORMAT_R8G8B8_UNORM, 8, 4, 4)).unwrap();
        assert_eq!(texture.check_storage(), Ok(()));
    }

    #[test]
    fn levels_are_stored_smallest_first() {
        let texture = Ktx2Texture::new(TextureCreateInfo::new_2d(VK_FORMAT_R8G8B8_UNORM, 4, 4, 3)).unwrap();
        let index = texture.level_index();

        // 1x1 (3 bytes) at 0, 2x2 (12 bytes) at 12, 4x4 (48 bytes) at 24.
        assert_eq!(index[2], LevelIndexEntry { byte_offset: 0, byte_length: 3, uncompressed_byte_length: 3 });
        assert_eq!(index[1], LevelIndexEntry { byte_offset: 12, byte_length: 12, uncompressed_byte_length: 12 });
        assert_eq!(index[0], LevelIndexEntry { byte_offset: 24, byte_length: 48, uncompressed_byte_length: 48 });
        assert_eq!(texture.data_size(), 72);
        assert_eq!(texture.data().map(<[u8]>::len), Some(72));
        assert_eq!(texture.required_level_alignment, 12);
    }

    #[test]
    fn image_offsets_follow_layers_then_faces() {
        let mut info = TextureCreateInfo::new_2d(VK_FORMAT_R8G8B8A8_UNORM, 8, 8, 2);
        info.num_layers = 2;
        info.num_faces = 6;
        info.is_array = true;
        let texture = Ktx2Texture::new(info).unwrap();

        let image_size = texture.image_size(0);
        assert_eq!(image_size, 256);
        let level = texture.level_index()[0].byte_offset as usize;
        assert_eq!(texture.image_offset(0, 0, 0), Ok(level));
        assert_eq!(texture.image_offset(0, 0, 5), Ok(level + 5 * image_size));
        assert_eq!(texture.image_offset(0, 1, 2), Ok(level + 8 * image_size));
        assert!(texture.is_cubemap);
    }

    #[test]
    fn depth_slices_shrink_per_level() {
        let info = TextureCreateInfo {
            base_depth: 4,
            num_dimensions: 3,
            ..TextureCreateInfo::new_2d(VK_FORMAT_R8_UNORM, 4, 4, 3)
        };
        let texture = Ktx2Texture::new(info).unwrap();

        assert_eq!(texture.level_index()[0].byte_length, 16 * 4);
        assert_eq!(texture.level_index()[1].byte_length, 4 * 2);
        assert_eq!(texture.level_index()[2].byte_length, 1);
        assert!(texture.image_offset(1, 0, 1).is_ok());
        assert_eq!(
            texture.image_offset(1, 0, 2),
            Err(ImageDataError::ImageOutOfRange { level: 1, layer: 0, face_slice: 2 })
        );
    }

    #[rstest]
    #[case(TextureCreateInfo::new_2d(VK_FORMAT_UNDEFINED, 4, 4, 1), TextureCreateError::UnsupportedFormat(0))]
    #[case(TextureCreateInfo::new_2d(VK_FORMAT_R8_UNORM, 4, 4, 4), TextureCreateError::TooManyLevels { levels: 4, max: 3 })]
    #[case(TextureCreateInfo { num_faces: 6, ..TextureCreateInfo::new_2d(VK_FORMAT_R8_UNORM, 4, 8, 1) }, TextureCreateError::InvalidCubemap)]
    #[case(TextureCreateInfo { num_faces: 3, ..TextureCreateInfo::new_2d(VK_FORMAT_R8_UNORM, 4, 4, 1) }, TextureCreateError::InvalidFaceCount(3))]
    #[case(TextureCreateInfo { num_dimensions: 1, ..TextureCreateInfo::new_2d(VK_FORMAT_R8_UNORM, 4, 4, 1) }, TextureCreateError::ExtentForDimensions { num_dimensions: 1, width: 4, height: 4, depth: 1 })]
    #[case(TextureCreateInfo::new_2d(VK_FORMAT_R8_UNORM, 4, 4, 0), TextureCreateError::Layout(LayoutError::ZeroExtent("level count")))]
    fn rejects_invalid_create_info(#[case] info: TextureCreateInfo, #[case] expected: TextureCreateError) {
        assert_eq!(Ktx2Texture::new(info).unwrap_err(), expected);
    }

    #[test]
    fn loads_from_source_once() {
        let info = TextureCreateInfo {
            allocate_storage: false,
            ..TextureCreateInfo::new_2d(VK_FORMAT_R8G8_UNORM, 2, 2, 1)
        };
        let mut texture = Ktx2Texture::new(info).unwrap();
        assert_eq!(texture.data(), None);
        assert_eq!(texture.load_image_data(), Err(ImageDataError::NoSource));

        texture.set_image_source(vec![1u8, 2, 3, 4, 5, 6, 7, 8]);
        texture.load_image_data().unwrap();
        assert_eq!(texture.image(0, 0, 0).unwrap(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn rejects_short_source() {
        let info = TextureCreateInfo {
            allocate_storage: false,
            ..TextureCreateInfo::new_2d(VK_FORMAT_R8G8_UNORM, 2, 2, 1)
        };
        let mut texture = Ktx2Texture::new(info).unwrap();
        texture.set_image_source(vec![0u8; 3]);

        assert_eq!(
            texture.load_image_data(),
            Err(ImageDataError::SizeMismatch { expected: 8, actual: 3 })
        );
        assert_eq!(texture.data(), None);
    }

    #[test]
    fn key_values_round_trip() {
        let mut texture = Ktx2Texture::new(TextureCreateInfo::new_2d(VK_FORMAT_R8_UNORM, 1, 1, 1)).unwrap();
        assert_eq!(texture.find_value("KTXswizzle"), None);

        texture.set_value("KTXswizzle", b"rrr1\0").unwrap();
        assert_eq!(texture.find_value("KTXswizzle"), Some(&b"rrr1\0"[..]));
    }
}
