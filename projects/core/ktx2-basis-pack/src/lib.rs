#![doc = include_str!(concat!("../", core::env!("CARGO_PKG_README")))]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod allocate;
pub mod assemble;
pub mod basis_file;
pub mod dfd;
pub mod layout;
pub mod normalize;
pub mod reorder;
pub mod sgd;
pub mod swizzle;

#[cfg(test)]
pub(crate) mod test_prelude;

pub use allocate::AllocateError;
pub use assemble::{assemble_global_data, AssembleError, AssembledGlobalData, LevelRange};
pub use basis_file::{BasisFile, BasisFileBuilder, BasisFileError, BasisFileHeader, BasisSliceDesc};
pub use dfd::{DataFormatDescriptor, DfdError};
pub use layout::{ImageId, LayoutError, LevelIndexEntry, TextureLayout};
pub use normalize::{normalize_to_rgba, NormalizeError};
pub use reorder::{reorder_levels, ReorderError, ReorderedLevels};
pub use sgd::{BasisGlobalData, BasisGlobalHeader, BasisImageDesc, GlobalDataError};
pub use swizzle::{ComponentMapping, Swizzle, SwizzleParseError};
