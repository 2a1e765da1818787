//! The external ETC1S/Basis encoder.
//!
//! The encoder itself is not part of this crate. Implementations of
//! [`BasisCompressor`] receive the staged RGBA images and return the raw
//! encoder output (a `.basis` file in memory), which the packaging layer then
//! takes apart.

use crate::params::{BasisParams, DEFAULT_COMPRESSION_LEVEL, DEFAULT_QUALITY_LEVEL};
use alloc::boxed::Box;
use alloc::vec::Vec;
use thiserror::Error;

/// Texture type written into the encoder output header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureType {
    /// Independent 2D images. The only type the packaging layer submits.
    #[default]
    Texture2D,
    /// 2D texture array.
    Texture2DArray,
    /// Cubemap array.
    CubemapArray,
    /// Video frames.
    VideoFrames,
    /// 3D volume.
    Volume,
}

/// Encoder configuration derived from [`BasisParams`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorParams {
    /// Treat the images as sRGB.
    pub perceptual: bool,
    /// Always `false`, mip levels are supplied.
    pub generate_mipmaps: bool,
    /// Texture type written into the output header.
    pub texture_type: TextureType,
    /// Always `false`; orientation is left to the caller.
    pub y_flip: bool,
    /// Drop the alpha channel when every alpha byte is 255.
    pub check_for_alpha: bool,
    /// Keep the alpha channel even when fully opaque.
    pub force_alpha: bool,
    /// Worker threads, at least 1.
    pub thread_count: u32,
    /// Encoder effort.
    pub compression_level: u32,
    /// Explicit quality, or [`None`] to use the cluster caps.
    pub quality_level: Option<u32>,
    /// 0 lets the encoder choose.
    pub max_endpoint_clusters: u32,
    /// 0 lets the encoder choose.
    pub max_selector_clusters: u32,
    /// Endpoint RDO threshold, or the encoder default.
    pub endpoint_rdo_threshold: Option<f32>,
    /// Selector RDO threshold, or the encoder default.
    pub selector_rdo_threshold: Option<f32>,
    /// Skip endpoint RDO.
    pub no_endpoint_rdo: bool,
    /// Skip selector RDO.
    pub no_selector_rdo: bool,
}

impl CompressorParams {
    /// Derives the encoder configuration for a texture.
    ///
    /// # Parameters
    ///
    /// - `params`: The caller's options
    /// - `perceptual`: Whether the texture's transfer function is sRGB
    pub fn from_basis_params(params: &BasisParams, perceptual: bool) -> Self {
        let (quality_level, max_endpoint_clusters, max_selector_clusters) =
            if params.quality_level != 0 {
                (Some(params.quality_level), 0, 0)
            } else if params.max_endpoints == 0 || params.max_selectors == 0 {
                (Some(DEFAULT_QUALITY_LEVEL), 0, 0)
            } else {
                (None, params.max_endpoints, params.max_selectors)
            };

        let compression_level = match params.compression_level {
            0 => DEFAULT_COMPRESSION_LEVEL,
            level => level,
        };

        Self {
            perceptual,
            generate_mipmaps: false,
            texture_type: TextureType::Texture2D,
            y_flip: false,
            check_for_alpha: true,
            force_alpha: false,
            thread_count: params.thread_count.max(1),
            compression_level,
            quality_level,
            max_endpoint_clusters,
            max_selector_clusters,
            endpoint_rdo_threshold: positive(params.endpoint_rdo_threshold),
            selector_rdo_threshold: positive(params.selector_rdo_threshold),
            no_endpoint_rdo: params.normal_map || params.no_endpoint_rdo,
            no_selector_rdo: params.normal_map || params.no_selector_rdo,
        }
    }
}

#[inline]
fn positive(value: f32) -> Option<f32> {
    (value > 0.0).then_some(value)
}

/// One staged image handed to the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceImage<'a> {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Tightly packed RGBA pixels, `width * height * 4` bytes.
    pub rgba: &'a [u8],
}

/// Failure categories reported by the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum CompressorError {
    /// The source images could not be read.
    #[error("Failed reading source images")]
    FailedReadingSourceImages,

    /// The encoder rejected the image set.
    #[error("Failed validating source images")]
    FailedValidating,

    /// The frontend stage failed.
    #[error("Frontend stage failed")]
    FailedFrontEnd,

    /// Frontend data extraction failed.
    #[error("Frontend data extraction failed")]
    FailedFrontendExtract,

    /// The backend stage failed.
    #[error("Backend stage failed")]
    FailedBackend,

    /// The output file could not be assembled.
    #[error("Failed creating Basis file data")]
    FailedCreateBasisFile,

    /// The output could not be written.
    #[error("Failed writing output")]
    FailedWritingOutput,
}

/// Trait for the block encoder used by [`crate::compress_basis_ex`].
///
/// The call is blocking. Implementations may use up to
/// [`CompressorParams::thread_count`] threads internally.
///
/// # Output contract
///
/// The returned buffer is a complete `.basis` file: its header reports one
/// image per entry of `images`, and its slice table holds, in the order the
/// images were given, one colour slice per image, each followed by an alpha
/// slice when the header's alpha slice flag is set.
pub trait BasisCompressor {
    /// Encodes `images` into a `.basis` file.
    fn compress(
        &mut self,
        params: &CompressorParams,
        images: &[SourceImage<'_>],
    ) -> Result<Vec<u8>, CompressorError>;
}

impl<T: BasisCompressor + ?Sized> BasisCompressor for Box<T> {
    fn compress(
        &mut self,
        params: &CompressorParams,
        images: &[SourceImage<'_>],
    ) -> Result<Vec<u8>, CompressorError> {
        (**self).compress(params, images)
    }
}

impl<T: BasisCompressor + ?Sized> BasisCompressor for &mut T {
    fn compress(
        &mut self,
        params: &CompressorParams,
        images: &[SourceImage<'_>],
    ) -> Result<Vec<u8>, CompressorError> {
        (**self).compress(params, images)
    }
}
