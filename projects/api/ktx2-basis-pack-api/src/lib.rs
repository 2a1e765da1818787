#![doc = include_str!("../README.MD")]
#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

//! Basis supercompression of KTX2 textures.
//!
//! # Examples
//!
//! ## Quick compression with a fixed quality
//!
//! ```ignore
//! use ktx2_basis_pack_api::compress_basis;
//!
//! // 0 selects the default quality (128).
//! compress_basis(&mut texture, 0, &mut encoder)?;
//! ```

extern crate alloc;

pub mod compress;
pub mod compressor;
pub mod error;
pub mod params;
pub mod texture;

mod pack;

#[cfg(test)]
pub(crate) mod test_prelude;

pub use compress::{compress_basis, compress_basis_ex};
pub use compressor::{BasisCompressor, CompressorError, CompressorParams, SourceImage, TextureType};
pub use error::{CompressError, ErrorCode, InternalFault, InvalidOperationReason};
pub use params::{BasisParams, BasisParamsBuilder, ParamsError};
pub use texture::{
    FormatSize, ImageDataError, ImageDataSource, Ktx2Texture, SupercompressionScheme,
    TextureCreateError, TextureCreateInfo,
};

// Re-export the core types callers commonly need
pub use ktx2_basis_pack::{DataFormatDescriptor, LevelIndexEntry};
