//! Channel normalization into the RGBA layout consumed by the block encoder.
//!
//! Source images are tightly packed (no row padding) with 1 to 4 8-bit
//! components per pixel. The encoder only accepts 4 component pixels, so every
//! image is expanded here before it is handed over.
//!
//! ## Useful APIs
//!
//! [`normalize_to_rgba`]: Validates the inputs and dispatches to one of the copy routines below.

use crate::swizzle::{ComponentMapping, Swizzle};
use thiserror::Error;

/// Value written to constant one channels and to the forced opaque alpha.
pub const CHANNEL_MAX: u8 = u8::MAX;

/// Errors raised by [`normalize_to_rgba`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NormalizeError {
    /// Only 1, 2, 3 and 4 components are supported.
    #[error("Unsupported component count {0}, expected 1 to 4")]
    UnsupportedComponentCount(u32),

    /// The source length is not a whole number of pixels.
    #[error("Source length {len} is not a multiple of the {num_components} byte pixel size")]
    PartialPixel { len: usize, num_components: u32 },

    /// The destination does not hold exactly 4 bytes per source pixel.
    #[error("Destination length {actual} does not match the required {required} bytes")]
    DestinationSize { required: usize, actual: usize },

    /// The mapping reads a source channel the image does not have.
    #[error("Mapping reads source channel {channel} but the image only has {num_components} components")]
    ChannelOutOfRange { channel: usize, num_components: u32 },

    /// 1 and 2 component images cannot be expanded without a mapping.
    #[error("A component mapping is required for {0} component images")]
    MappingRequired(u32),
}

/// Converts `src` into tightly packed RGBA pixels written to `dst`.
///
/// # Parameters
///
/// - `dst`: Output buffer, exactly 4 bytes per source pixel
/// - `src`: Source pixels with `num_components` bytes each
/// - `num_components`: Component count of the source (1 to 4)
/// - `mapping`: Optional per destination channel source selection
///
/// # Remarks
///
/// Without a mapping, 4 component sources are copied verbatim and 3 component
/// sources gain an opaque alpha. With a mapping every destination channel is
/// taken from the mapped source channel or constant. A mapping is mandatory
/// for 1 and 2 component sources.
///
/// The mapping is checked against `num_components` up front; no bytes are
/// written when an error is returned.
pub fn normalize_to_rgba(
    dst: &mut [u8],
    src: &[u8],
    num_components: u32,
    mapping: Option<&ComponentMapping>,
) -> Result<(), NormalizeError> {
    if !(1..=4).contains(&num_components) {
        return Err(NormalizeError::UnsupportedComponentCount(num_components));
    }

    let pixel_size = num_components as usize;
    if src.len() % pixel_size != 0 {
        return Err(NormalizeError::PartialPixel {
            len: src.len(),
            num_components,
        });
    }

    let required = (src.len() / pixel_size) * 4;
    if dst.len() != required {
        return Err(NormalizeError::DestinationSize {
            required,
            actual: dst.len(),
        });
    }

    match (mapping, num_components) {
        (Some(mapping), _) => {
            if let Some(channel) = mapping.max_source_channel() {
                if channel >= pixel_size {
                    return Err(NormalizeError::ChannelOutOfRange {
                        channel,
                        num_components,
                    });
                }
            }
            swizzle_to_rgba(dst, src, pixel_size, mapping);
        }
        (None, 4) => copy_rgba_to_rgba(dst, src),
        (None, 3) => copy_rgb_to_rgba(dst, src),
        (None, n) => return Err(NormalizeError::MappingRequired(n)),
    }

    Ok(())
}

/// Straight copy of 4 component pixels.
#[inline]
fn copy_rgba_to_rgba(dst: &mut [u8], src: &[u8]) {
    dst.copy_from_slice(src);
}

/// Copies 3 component pixels, marking every pixel as opaque.
#[inline]
fn copy_rgb_to_rgba(dst: &mut [u8], src: &[u8]) {
    for (out, pixel) in dst.chunks_exact_mut(4).zip(src.chunks_exact(3)) {
        out[..3].copy_from_slice(pixel);
        out[3] = CHANNEL_MAX;
    }
}

// Source channels were validated against `pixel_size` by the caller.
#[inline]
fn swizzle_to_rgba(dst: &mut [u8], src: &[u8], pixel_size: usize, mapping: &ComponentMapping) {
    for (out, pixel) in dst.chunks_exact_mut(4).zip(src.chunks_exact(pixel_size)) {
        for (channel, swizzle) in out.iter_mut().zip(mapping.0) {
            *channel = match swizzle {
                Swizzle::Zero => 0,
                Swizzle::One => CHANNEL_MAX,
                Swizzle::R => pixel[0],
                Swizzle::G => pixel[1],
                Swizzle::B => pixel[2],
                Swizzle::A => pixel[3],
            };
        }
    }
}
