//! Stages a texture's images as RGBA for the encoder.
//!
//! Images are visited in the canonical order of [`TextureLayout::images`]
//! (level, then layer, then face or depth slice) and written back to back into
//! one 64 byte aligned allocation. The encoder reports its slices in the same
//! order, which is what lets [`ktx2_basis_pack::assemble_global_data`] map
//! them back to their images.

use crate::compressor::SourceImage;
use crate::error::CompressError;
use crate::params::BasisParams;
use crate::texture::{ImageDataError, Ktx2Texture};
use alloc::vec::Vec;
use ktx2_basis_pack::allocate::{allocate_align_64, AllocateError};
use ktx2_basis_pack::normalize::normalize_to_rgba;
use ktx2_basis_pack::swizzle::{ComponentMapping, SWIZZLE_KEY};
use ktx2_basis_pack::TextureLayout;
use safe_allocator_api::RawAlloc;
use tracing::warn;

/// RGBA images ready to be handed to the encoder.
pub(crate) struct StagedImages {
    buffer: RawAlloc,
    /// Width and height of each image, in canonical order.
    extents: Vec<(u32, u32)>,
}

impl StagedImages {
    /// Number of staged images.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.extents.len()
    }

    /// Total staged bytes.
    #[inline]
    pub(crate) fn byte_len(&self) -> usize {
        self.buffer.len()
    }

    /// Borrows every image in canonical order.
    pub(crate) fn source_images(&self) -> Result<Vec<SourceImage<'_>>, AllocateError> {
        let data = self.buffer.as_slice();
        let mut images = Vec::new();
        images.try_reserve_exact(self.extents.len())?;

        let mut offset = 0;
        for &(width, height) in &self.extents {
            let len = rgba_size(width, height);
            images.push(SourceImage {
                width,
                height,
                rgba: &data[offset..offset + len],
            });
            offset += len;
        }

        Ok(images)
    }
}

/// Picks the mapping applied while staging a `num_components` texture.
///
/// Swizzle metadata is only honoured when `pre_swizzle` is set and it spells
/// the identity for the component count. Two component textures and red/green
/// separation always use `rrrg`, single component textures `rrr1`.
pub(crate) fn select_component_mapping(
    texture: &Ktx2Texture,
    num_components: u32,
    params: &BasisParams,
) -> Option<ComponentMapping> {
    let mut mapping = None;
    if params.pre_swizzle {
        mapping = swizzle_from_metadata(texture, num_components);
    }

    if num_components == 2 || params.separate_rg_to_rgb_a {
        mapping = Some(ComponentMapping::RG_TO_RGB_A);
    }

    if num_components == 1 {
        mapping = Some(ComponentMapping::R_TO_RGBA);
    }

    mapping
}

fn swizzle_from_metadata(texture: &Ktx2Texture, num_components: u32) -> Option<ComponentMapping> {
    let value = texture.find_value(SWIZZLE_KEY)?;
    let mapping = match ComponentMapping::parse(value) {
        Ok(mapping) => mapping,
        Err(error) => {
            warn!(%error, "Ignoring malformed swizzle metadata");
            return None;
        }
    };

    if mapping.is_identity_for(num_components) {
        Some(mapping)
    } else {
        warn!(
            swizzle = ?mapping,
            num_components,
            "Ignoring swizzle metadata that does not match the component count"
        );
        None
    }
}

/// Converts every image of `texture` to RGBA.
///
/// # Errors
///
/// - [`CompressError::OutOfMemory`] if the staging buffer cannot be allocated.
/// - [`ImageDataError::NotLoaded`] if the texture's data is not resident.
/// - An internal fault if an image does not normalize.
pub(crate) fn pack_images(
    texture: &Ktx2Texture,
    num_components: u32,
    mapping: Option<&ComponentMapping>,
) -> Result<StagedImages, CompressError> {
    let layout: TextureLayout = texture.layout();
    if texture.data().is_none() {
        return Err(ImageDataError::NotLoaded.into());
    }

    let mut extents = Vec::new();
    extents
        .try_reserve_exact(layout.image_count() as usize)
        .map_err(AllocateError::from)?;

    // Saturates so that an impossible size fails the allocation's layout.
    let mut total = 0usize;
    for image in layout.images() {
        let (width, height, _) = layout.level_extent(image.level);
        total = total.saturating_add(rgba_size(width, height));
        extents.push((width, height));
    }

    let mut buffer = allocate_align_64(total)?;
    let staging = buffer.as_mut_slice();

    let mut offset = 0;
    for (image, &(width, height)) in layout.images().zip(&extents) {
        let len = rgba_size(width, height);
        let source = texture.image(image.level, image.layer, image.face_slice)?;
        normalize_to_rgba(&mut staging[offset..offset + len], source, num_components, mapping)?;
        offset += len;
    }

    Ok(StagedImages { buffer, extents })
}

#[inline(always)]
fn rgba_size(width: u32, height: u32) -> usize {
    (width as usize)
        .saturating_mul(height as usize)
        .saturating_mul(4)
}
