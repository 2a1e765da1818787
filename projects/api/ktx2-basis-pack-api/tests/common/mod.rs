//! Shared helpers for the integration tests.
#![allow(dead_code)]

use ktx2_basis_pack::basis_file::BasisFileBuilder;
use ktx2_basis_pack_api::texture::*;
use ktx2_basis_pack_api::{BasisCompressor, CompressorError, CompressorParams, SourceImage};
use tracing_subscriber::EnvFilter;

pub const ENDPOINTS: &[u8] = &[0xE0, 0xE1, 0xE2, 0xE3];
pub const SELECTORS: &[u8] = &[0x50, 0x51, 0x52];
pub const TABLES: &[u8] = &[0x7A, 0x7B];

/// Routes `tracing` output to the test harness. Set `RUST_LOG` to see it.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// An image as the encoder received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Encoder stand-in that records what it receives and emits the output of
/// [`BasisFileBuilder::rgba_images`].
#[derive(Default)]
pub struct FakeCompressor {
    pub calls: usize,
    pub params: Option<CompressorParams>,
    pub received: Vec<ReceivedImage>,
    pub failure: Option<CompressorError>,
}

impl FakeCompressor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(failure: CompressorError) -> Self {
        Self {
            failure: Some(failure),
            ..Self::default()
        }
    }
}

impl BasisCompressor for FakeCompressor {
    fn compress(
        &mut self,
        params: &CompressorParams,
        images: &[SourceImage<'_>],
    ) -> Result<Vec<u8>, CompressorError> {
        self.calls += 1;
        self.params = Some(*params);
        self.received = images
            .iter()
            .map(|image| ReceivedImage {
                width: image.width,
                height: image.height,
                rgba: image.rgba.to_vec(),
            })
            .collect();

        if let Some(failure) = self.failure {
            return Err(failure);
        }

        let images: Vec<(u32, u32, &[u8])> = images
            .iter()
            .map(|image| (image.width, image.height, image.rgba))
            .collect();
        Ok(BasisFileBuilder::new()
            .endpoints(ENDPOINTS.len() as u16, ENDPOINTS)
            .selectors(SELECTORS.len() as u16, SELECTORS)
            .tables(TABLES)
            .rgba_images(&images)
            .build())
    }
}

/// Extracts one channel of RGBA pixels.
pub fn channel(rgba: &[u8], index: usize) -> Vec<u8> {
    rgba.chunks_exact(4).map(|pixel| pixel[index]).collect()
}

/// Creates a texture and fills every image with a pattern unique to it.
pub fn filled_texture(info: TextureCreateInfo) -> Ktx2Texture {
    let mut texture = Ktx2Texture::new(info).expect("Texture should be created");
    let layout = texture.layout();
    for (index, image) in layout.images().enumerate() {
        let bytes = texture
            .image_mut(image.level, image.layer, image.face_slice)
            .expect("Image should exist");
        for (offset, byte) in bytes.iter_mut().enumerate() {
            *byte = (index * 17 + offset * 3) as u8;
        }
    }
    texture
}

/// Forces every alpha byte of an RGBA texture to 255.
pub fn make_opaque(texture: &mut Ktx2Texture) {
    let layout = texture.layout();
    for image in layout.images() {
        let bytes = texture
            .image_mut(image.level, image.layer, image.face_slice)
            .expect("Image should exist");
        for pixel in bytes.chunks_exact_mut(4) {
            pixel[3] = 255;
        }
    }
}
