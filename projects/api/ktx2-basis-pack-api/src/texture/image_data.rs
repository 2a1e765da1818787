//! Lazily loaded image data.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use ktx2_basis_pack::allocate::{try_clone_slice, AllocateError};
use thiserror::Error;

/// Errors raised while loading or addressing image data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageDataError {
    /// Nothing is loaded and there is nothing to load from.
    #[error("Image data is not loaded and no source is attached")]
    NoSource,

    /// The data must be loaded first, see [`super::Ktx2Texture::load_image_data`].
    #[error("Image data is not loaded")]
    NotLoaded,

    /// The source returned the wrong amount of data.
    #[error("Image source returned {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    /// The source failed.
    #[error("Image source failed: {0}")]
    Source(String),

    /// The requested image does not exist.
    #[error("Texture has no image at level {level}, layer {layer}, face/slice {face_slice}")]
    ImageOutOfRange {
        level: u32,
        layer: u32,
        face_slice: u32,
    },

    /// Supercompressed levels cannot be addressed per image.
    #[error("Images of a supercompressed texture cannot be addressed")]
    Supercompressed,

    #[error(transparent)]
    Allocate(#[from] AllocateError),
}

/// Somewhere a texture's image data can be read from on demand.
///
/// The data is every level in container order, as laid out by the texture's
/// level index.
pub trait ImageDataSource {
    /// Reads `data_size` bytes of image data.
    fn read_image_data(&mut self, data_size: usize) -> Result<Vec<u8>, ImageDataError>;
}

impl ImageDataSource for Vec<u8> {
    fn read_image_data(&mut self, _data_size: usize) -> Result<Vec<u8>, ImageDataError> {
        Ok(try_clone_slice(self)?)
    }
}

impl<T: ImageDataSource + ?Sized> ImageDataSource for Box<T> {
    fn read_image_data(&mut self, data_size: usize) -> Result<Vec<u8>, ImageDataError> {
        (**self).read_image_data(data_size)
    }
}
