//! Common test imports and utilities for API tests.
//!
//! This module provides a common prelude for test modules to avoid
//! duplicate imports across the codebase.
#![allow(unused_imports)]

// Re-export commonly used alloc types for tests
pub use alloc::{boxed::Box, format, string::String, vec, vec::Vec};

// External crates commonly used in tests
pub use rstest::rstest;

pub use crate::compressor::{BasisCompressor, CompressorError, CompressorParams, SourceImage};
pub use crate::texture::*;

use ktx2_basis_pack::basis_file::BasisFileBuilder;

/// An uncompressed 8-bit UNORM texture with `num_components` components.
pub(crate) fn texture_with_components(
    num_components: u32,
    width: u32,
    height: u32,
    num_levels: u32,
) -> Ktx2Texture {
    let vk_format = match num_components {
        1 => VK_FORMAT_R8_UNORM,
        2 => VK_FORMAT_R8G8_UNORM,
        3 => VK_FORMAT_R8G8B8_UNORM,
        _ => VK_FORMAT_R8G8B8A8_UNORM,
    };
    Ktx2Texture::new(TextureCreateInfo::new_2d(vk_format, width, height, num_levels)).unwrap()
}

/// Fills every byte of the image data with a pattern that differs per image.
pub(crate) fn fill_images(texture: &mut Ktx2Texture) {
    let layout = texture.layout();
    for (index, image) in layout.images().enumerate() {
        let bytes = texture
            .image_mut(image.level, image.layer, image.face_slice)
            .unwrap();
        for (offset, byte) in bytes.iter_mut().enumerate() {
            *byte = (index * 31 + offset) as u8;
        }
    }
}

/// Encoder stand-in producing a well formed `.basis` file.
///
/// Slice contents follow [`BasisFileBuilder::rgba_images`].
#[derive(Default)]
pub(crate) struct ScriptedCompressor {
    pub calls: usize,
    pub last_params: Option<CompressorParams>,
    /// Returned instead of encoding.
    pub failure: Option<CompressorError>,
    /// Overrides the image count written to the header.
    pub total_images: Option<u32>,
}

impl BasisCompressor for ScriptedCompressor {
    fn compress(
        &mut self,
        params: &CompressorParams,
        images: &[SourceImage<'_>],
    ) -> Result<Vec<u8>, CompressorError> {
        self.calls += 1;
        self.last_params = Some(*params);
        if let Some(failure) = self.failure {
            return Err(failure);
        }

        let images: Vec<(u32, u32, &[u8])> = images
            .iter()
            .map(|image| (image.width, image.height, image.rgba))
            .collect();
        let mut builder = BasisFileBuilder::new()
            .endpoints(3, &[0xE0, 0xE1, 0xE2])
            .selectors(2, &[0x50, 0x51])
            .tables(&[0x7A, 0x7B, 0x7C, 0x7D])
            .rgba_images(&images);

        if let Some(total_images) = self.total_images {
            builder = builder.total_images(total_images);
        }
        Ok(builder.build())
    }
}
