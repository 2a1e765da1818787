//! Vulkan formats understood by [`super::Ktx2Texture`] and their size information.

/// `VK_FORMAT_UNDEFINED`, used by supercompressed textures.
pub const VK_FORMAT_UNDEFINED: u32 = 0;
/// `VK_FORMAT_R8_UNORM`
pub const VK_FORMAT_R8_UNORM: u32 = 9;
/// `VK_FORMAT_R8_SRGB`
pub const VK_FORMAT_R8_SRGB: u32 = 15;
/// `VK_FORMAT_R8G8_UNORM`
pub const VK_FORMAT_R8G8_UNORM: u32 = 16;
/// `VK_FORMAT_R8G8_SRGB`
pub const VK_FORMAT_R8G8_SRGB: u32 = 22;
/// `VK_FORMAT_R8G8B8_UNORM`
pub const VK_FORMAT_R8G8B8_UNORM: u32 = 23;
/// `VK_FORMAT_R8G8B8_SRGB`
pub const VK_FORMAT_R8G8B8_SRGB: u32 = 29;
/// `VK_FORMAT_R8G8B8A8_UNORM`
pub const VK_FORMAT_R8G8B8A8_UNORM: u32 = 37;
/// `VK_FORMAT_R8G8B8A8_SRGB`
pub const VK_FORMAT_R8G8B8A8_SRGB: u32 = 43;

/// Component count and sRGB-ness of the 8-bit formats textures can be created with.
pub(crate) fn describe_format(vk_format: u32) -> Option<(u32, bool)> {
    match vk_format {
        VK_FORMAT_R8_UNORM => Some((1, false)),
        VK_FORMAT_R8_SRGB => Some((1, true)),
        VK_FORMAT_R8G8_UNORM => Some((2, false)),
        VK_FORMAT_R8G8_SRGB => Some((2, true)),
        VK_FORMAT_R8G8B8_UNORM => Some((3, false)),
        VK_FORMAT_R8G8B8_SRGB => Some((3, true)),
        VK_FORMAT_R8G8B8A8_UNORM => Some((4, false)),
        VK_FORMAT_R8G8B8A8_SRGB => Some((4, true)),
        _ => None,
    }
}

/// Block size information of a texture's format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSize {
    /// Combination of [`Self::PACKED`], [`Self::COMPRESSED`], [`Self::PALETTIZED`],
    /// [`Self::DEPTH`] and [`Self::STENCIL`].
    pub flags: u32,
    pub palette_size_in_bits: u32,
    /// Size of one block (a texel, for uncompressed formats).
    pub block_size_in_bits: u32,
    pub block_width: u32,
    pub block_height: u32,
    pub block_depth: u32,
}

impl FormatSize {
    /// Several components share one machine word.
    pub const PACKED: u32 = 0x1;
    /// Block compressed format.
    pub const COMPRESSED: u32 = 0x2;
    pub const PALETTIZED: u32 = 0x4;
    pub const DEPTH: u32 = 0x8;
    pub const STENCIL: u32 = 0x10;

    /// An uncompressed format with `texel_bytes` bytes per texel.
    pub fn uncompressed(texel_bytes: u32) -> Self {
        Self {
            flags: 0,
            palette_size_in_bits: 0,
            block_size_in_bits: texel_bytes * 8,
            block_width: 1,
            block_height: 1,
            block_depth: 1,
        }
    }

    /// The size of a supercompressed format, whose real layout depends on
    /// the transcode target.
    pub fn unsized_format() -> Self {
        Self::uncompressed(0)
    }

    #[inline]
    pub fn is_packed(&self) -> bool {
        self.flags & Self::PACKED != 0
    }

    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.flags & Self::COMPRESSED != 0
    }

    /// Bytes per block.
    #[inline]
    pub fn block_bytes(&self) -> u32 {
        self.block_size_in_bits / 8
    }
}

/// Supercompression applied to a texture's levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum SupercompressionScheme {
    /// Levels are stored as is.
    #[default]
    None = 0,
    /// Basis LZ, ETC1S images with global codebooks.
    BasisLz = 1,
    Zstd = 2,
    Zlib = 3,
}
