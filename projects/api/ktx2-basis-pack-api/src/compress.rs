//! Basis supercompression of a [`Ktx2Texture`].
//!
//! [`compress_basis_ex`] moves through these states, stopping at the first
//! failure:
//!
//! 1. Validate the parameters and the texture, loading its image data if needed.
//! 2. Stage every image as RGBA in canonical order.
//! 3. Run the encoder.
//! 4. Assemble the global data block from the encoder output.
//! 5. Rewrite the data format descriptor to its unsized form.
//! 6. Copy the levels into a new payload, smallest first.
//! 7. Commit everything to the texture.
//!
//! Every buffer the texture receives is built before step 7, and step 7
//! cannot fail, so a failed call leaves the texture as it was. The only
//! observable effect of a failed call is image data loaded in step 1.

use crate::compressor::{BasisCompressor, CompressorParams};
use crate::error::{CompressError, InvalidOperationReason};
use crate::pack::{pack_images, select_component_mapping};
use crate::params::BasisParams;
use crate::texture::{Ktx2Texture, Supercompressed, SupercompressionScheme};
use ktx2_basis_pack::{assemble_global_data, reorder_levels, BasisFile};
use tracing::{debug, error, info};

/// Supercompresses `texture` on a single thread at `quality`.
///
/// `quality` ranges from 1 to 255; lower compresses better at lower quality.
/// 0 selects the default of 128.
///
/// See [`compress_basis_ex`] for errors.
pub fn compress_basis<C: BasisCompressor + ?Sized>(
    texture: &mut Ktx2Texture,
    quality: u32,
    compressor: &mut C,
) -> Result<(), CompressError> {
    compress_basis_ex(texture, &BasisParams::with_quality(quality), compressor)
}

/// Encodes every image of `texture` to ETC1S and supercompresses it with
/// Basis LZ.
///
/// On success the texture's image data, level index and descriptor are
/// replaced, the global data block is attached, the format becomes
/// `VK_FORMAT_UNDEFINED` and the supercompression scheme
/// [`SupercompressionScheme::BasisLz`].
///
/// # Errors
///
/// - [`CompressError::InvalidValue`] when `params` fail validation.
/// - [`CompressError::InvalidOperation`] when the texture is already
///   supercompressed, block compressed, packed, 1D, not made of 8-bit
///   components, or when red/green separation is requested on a single
///   channel texture. Also when the encoder fails.
/// - [`CompressError::ImageData`] when the image data cannot be loaded.
/// - [`CompressError::OutOfMemory`] when a staging buffer cannot be allocated.
/// - [`CompressError::InternalConsistencyFault`] when the encoder output does
///   not match the submitted images.
///
/// The texture is unchanged on error.
pub fn compress_basis_ex<C: BasisCompressor + ?Sized>(
    texture: &mut Ktx2Texture,
    params: &BasisParams,
    compressor: &mut C,
) -> Result<(), CompressError> {
    let result = supercompress(texture, params, compressor);
    if let Err(fault) = &result {
        if fault.is_internal_fault() {
            error!(error = %fault, "Basis supercompression hit an internal consistency fault");
        }
    }
    result
}

fn supercompress<C: BasisCompressor + ?Sized>(
    texture: &mut Ktx2Texture,
    params: &BasisParams,
    compressor: &mut C,
) -> Result<(), CompressError> {
    // Validate
    params.validate()?;
    let num_components = validate_texture(texture, params)?;
    texture.load_image_data()?;

    let layout = texture.layout();
    debug!(
        levels = layout.num_levels,
        layers = layout.num_layers,
        faces = layout.num_faces,
        base_depth = layout.base_depth,
        images = layout.image_count(),
        num_components,
        "Validated texture"
    );

    // Normalize & pack
    let mapping = select_component_mapping(texture, num_components, params);
    let staged = pack_images(texture, num_components, mapping.as_ref())?;
    debug!(
        images = staged.len(),
        bytes = staged.byte_len(),
        mapping = ?mapping,
        "Staged images"
    );

    // Compress
    let compressor_params = CompressorParams::from_basis_params(params, texture.dfd.is_srgb());
    let encoded = {
        let images = staged.source_images()?;
        compressor.compress(&compressor_params, &images)?
    };
    drop(staged);
    debug!(bytes = encoded.len(), "Encoder finished");

    // Assemble global data
    let file = BasisFile::parse(&encoded)?;
    let assembled = assemble_global_data(&file, &layout)?;
    debug!(
        bytes = assembled.global_data.len(),
        has_alpha = assembled.has_alpha,
        "Assembled global data"
    );

    // Rewrite descriptor
    let dfd = texture.dfd.rewrite_unsized(assembled.has_alpha)?;
    debug!(samples = dfd.sample_count(), "Rewrote format descriptor");

    // Reorder levels
    let reordered = reorder_levels(&encoded, &assembled.levels)?;
    debug!(bytes = reordered.data.len(), "Reordered levels");

    // Commit
    let payload_bytes = reordered.data.len();
    texture.commit_supercompressed(Supercompressed {
        data: reordered.data,
        level_index: reordered.level_index,
        dfd,
        global_data: assembled.global_data,
    });
    info!(
        images = layout.image_count(),
        payload_bytes,
        global_data_bytes = texture.supercompression_global_data().map_or(0, <[u8]>::len),
        "Supercompressed texture with Basis LZ"
    );

    Ok(())
}

/// Checks the texture can be encoded, returning its component count.
fn validate_texture(
    texture: &Ktx2Texture,
    params: &BasisParams,
) -> Result<u32, InvalidOperationReason> {
    if texture.supercompression_scheme != SupercompressionScheme::None {
        return Err(InvalidOperationReason::AlreadySupercompressed(
            texture.supercompression_scheme,
        ));
    }
    if texture.is_compressed || texture.format_size.is_compressed() {
        return Err(InvalidOperationReason::BlockCompressed);
    }
    if texture.format_size.is_packed() {
        return Err(InvalidOperationReason::PackedFormat);
    }
    if texture.num_dimensions == 1 {
        return Err(InvalidOperationReason::OneDimensional);
    }
    texture.layout().validate()?;
    texture.check_storage()?;

    let info = texture.dfd.component_info_unpacked();
    if info.component_byte_length != 1 {
        return Err(InvalidOperationReason::ComponentSize(
            info.component_byte_length,
        ));
    }
    if !(1..=4).contains(&info.num_components) {
        return Err(InvalidOperationReason::ComponentCount(info.num_components));
    }
    if params.separate_rg_to_rgb_a && info.num_components == 1 {
        return Err(InvalidOperationReason::SplitRgOnSingleChannel);
    }

    Ok(info.num_components)
}
