//! Component mappings applied while converting images to RGBA.
//!
//! A [`ComponentMapping`] names, for each of the four destination channels,
//! which source channel (or which constant) to read. Mappings come either from
//! the fixed defaults used for 1 and 2 component textures, or from the
//! `KTXswizzle` key/value entry, which is parsed and validated once here.

use thiserror::Error;

/// Metadata key holding a texture's swizzle string.
pub const SWIZZLE_KEY: &str = "KTXswizzle";

/// Length of a swizzle value including its NUL terminator.
pub const SWIZZLE_VALUE_LEN: usize = 5;

/// Source of a single destination channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Swizzle {
    R = 0,
    G = 1,
    B = 2,
    A = 3,
    Zero = 4,
    One = 5,
}

impl Swizzle {
    /// Parses one swizzle character (`r`, `g`, `b`, `a`, `0` or `1`).
    pub fn from_char(value: u8) -> Option<Self> {
        match value {
            b'r' => Some(Self::R),
            b'g' => Some(Self::G),
            b'b' => Some(Self::B),
            b'a' => Some(Self::A),
            b'0' => Some(Self::Zero),
            b'1' => Some(Self::One),
            _ => None,
        }
    }

    /// Index of the source channel read, or [`None`] for constants.
    #[inline(always)]
    pub fn source_channel(self) -> Option<usize> {
        match self {
            Self::R => Some(0),
            Self::G => Some(1),
            Self::B => Some(2),
            Self::A => Some(3),
            Self::Zero | Self::One => None,
        }
    }
}

/// Errors raised while parsing a swizzle metadata value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SwizzleParseError {
    /// The value is not 4 characters followed by a NUL terminator.
    #[error("Swizzle value must be 5 bytes including terminator, got {0}")]
    InvalidLength(usize),

    /// The value is missing its NUL terminator.
    #[error("Swizzle value is not NUL terminated")]
    MissingTerminator,

    /// A character outside `[rgba01]` was found.
    #[error("Invalid swizzle character {character:#04x} at position {position}")]
    InvalidCharacter { position: usize, character: u8 },
}

/// Per destination channel source selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentMapping(pub [Swizzle; 4]);

impl ComponentMapping {
    /// Single channel textures: `(R, R, R, 1)`.
    pub const R_TO_RGBA: Self = Self([Swizzle::R, Swizzle::R, Swizzle::R, Swizzle::One]);

    /// Luminance/alpha separation: `(R, R, R, G)`.
    pub const RG_TO_RGB_A: Self = Self([Swizzle::R, Swizzle::R, Swizzle::R, Swizzle::G]);

    /// Parses a `KTXswizzle` value of the form `[rgba01]{4}` plus terminator.
    pub fn parse(value: &[u8]) -> Result<Self, SwizzleParseError> {
        if value.len() != SWIZZLE_VALUE_LEN {
            return Err(SwizzleParseError::InvalidLength(value.len()));
        }
        if value[4] != 0 {
            return Err(SwizzleParseError::MissingTerminator);
        }

        let mut mapping = [Swizzle::Zero; 4];
        for (position, (slot, &character)) in mapping.iter_mut().zip(&value[..4]).enumerate() {
            *slot = Swizzle::from_char(character).ok_or(SwizzleParseError::InvalidCharacter {
                position,
                character,
            })?;
        }

        Ok(Self(mapping))
    }

    /// The identity mapping for a texture with `num_components` components.
    ///
    /// Missing colour channels read as zero and a missing alpha reads as one,
    /// i.e. `rg01`, `rgb1` and `rgba`. Single channel textures have none.
    pub fn identity(num_components: u32) -> Option<Self> {
        use Swizzle::*;
        match num_components {
            2 => Some(Self([R, G, Zero, One])),
            3 => Some(Self([R, G, B, One])),
            4 => Some(Self([R, G, B, A])),
            _ => None,
        }
    }

    /// Whether this is the identity mapping for `num_components`.
    pub fn is_identity_for(&self, num_components: u32) -> bool {
        Self::identity(num_components).is_some_and(|identity| identity == *self)
    }

    /// Highest source channel index read by this mapping, if any.
    pub fn max_source_channel(&self) -> Option<usize> {
        self.0.iter().filter_map(|s| s.source_channel()).max()
    }
}
