//! Error types for Basis supercompression.

use crate::compressor::CompressorError;
use crate::params::ParamsError;
use crate::texture::{ImageDataError, SupercompressionScheme};
use ktx2_basis_pack::{
    AllocateError, AssembleError, BasisFileError, DfdError, LayoutError, NormalizeError,
    ReorderError,
};
use thiserror::Error;

/// The closed set of statuses reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The caller's parameters are malformed.
    InvalidValue,
    /// The texture cannot be compressed in its current state, or compression failed.
    InvalidOperation,
    /// A staging buffer could not be allocated.
    OutOfMemory,
}

/// Errors that can occur while supercompressing a texture.
///
/// On every error the texture is left as it was before the call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompressError {
    /// The parameters failed validation.
    #[error("Invalid parameters: {0}")]
    InvalidValue(#[from] ParamsError),

    /// The texture's state or the parameter combination forbids compression.
    #[error("Invalid operation: {0}")]
    InvalidOperation(#[from] InvalidOperationReason),

    /// Memory allocation failed.
    #[error("Out of memory: {0}")]
    OutOfMemory(AllocateError),

    /// The encoder output disagrees with its input, or another invariant broke.
    ///
    /// These indicate a defect rather than bad input and surface to callers
    /// as [`ErrorCode::InvalidOperation`].
    #[error("Internal consistency fault: {0}")]
    InternalConsistencyFault(#[from] InternalFault),

    /// The texture's pixel data could not be loaded.
    #[error("Failed to load image data: {0}")]
    ImageData(ImageDataError),
}

impl CompressError {
    /// The caller facing status for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidValue(_) => ErrorCode::InvalidValue,
            Self::OutOfMemory(_) => ErrorCode::OutOfMemory,
            Self::InvalidOperation(_) | Self::InternalConsistencyFault(_) | Self::ImageData(_) => {
                ErrorCode::InvalidOperation
            }
        }
    }

    /// Whether this error is a logic defect rather than a user facing fault.
    pub fn is_internal_fault(&self) -> bool {
        matches!(self, Self::InternalConsistencyFault(_))
    }
}

/// Why a texture cannot be compressed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidOperationReason {
    /// Supercompression schemes cannot be stacked.
    #[error("Texture is already supercompressed ({0:?})")]
    AlreadySupercompressed(SupercompressionScheme),

    /// Block compressed images cannot be re-encoded.
    #[error("Texture uses a block compressed format")]
    BlockCompressed,

    /// Packed formats are not supported by the encoder.
    #[error("Texture uses a packed format")]
    PackedFormat,

    /// Only 8-bit components can be encoded.
    #[error("Texture has {0} byte components, only 1 byte components are supported")]
    ComponentSize(u32),

    /// The descriptor describes an unsupported number of components.
    #[error("Texture has {0} components, expected 1 to 4")]
    ComponentCount(u32),

    /// Red/green separation needs a green channel.
    #[error("Cannot split red/green into RGB/alpha on a single channel texture")]
    SplitRgOnSingleChannel,

    /// Only 2D images (and arrays, cubemaps or 3D slices of them) can be encoded.
    #[error("1D textures cannot be supercompressed")]
    OneDimensional,

    /// The texture's shape is invalid.
    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// The level index does not have one entry per level.
    #[error("Level index has {entries} entries but the texture has {num_levels} levels")]
    LevelIndexMismatch { entries: usize, num_levels: u32 },

    /// A level's images do not fit within the image data.
    #[error("Images of level {level} do not fit within the {data_size} byte image data")]
    LevelOutOfBounds { level: u32, data_size: usize },

    /// The encoder failed.
    #[error("Encoder failed: {0}")]
    Compressor(CompressorError),
}

/// Invariant violations detected while repackaging encoder output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InternalFault {
    /// The encoder rejected images that were already validated.
    #[error("Encoder rejected validated images: {0}")]
    Compressor(CompressorError),

    /// An image could not be staged.
    #[error("Failed to stage image: {0}")]
    Normalize(#[from] NormalizeError),

    /// The encoder output could not be read.
    #[error("Malformed encoder output: {0}")]
    EncoderOutput(#[from] BasisFileError),

    /// The encoder output does not match the submitted images.
    #[error(transparent)]
    Assemble(AssembleError),

    /// A level could not be moved into the payload.
    #[error(transparent)]
    Reorder(ReorderError),

    /// The format descriptor could not be rewritten.
    #[error("Failed to rewrite format descriptor: {0}")]
    Dfd(DfdError),
}

impl From<AllocateError> for CompressError {
    fn from(value: AllocateError) -> Self {
        Self::OutOfMemory(value)
    }
}

impl From<ImageDataError> for CompressError {
    fn from(value: ImageDataError) -> Self {
        match value {
            ImageDataError::Allocate(e) => Self::OutOfMemory(e),
            other => Self::ImageData(other),
        }
    }
}

impl From<CompressorError> for CompressError {
    fn from(value: CompressorError) -> Self {
        match value {
            CompressorError::FailedValidating => {
                Self::InternalConsistencyFault(InternalFault::Compressor(value))
            }
            other => Self::InvalidOperation(InvalidOperationReason::Compressor(other)),
        }
    }
}

impl From<LayoutError> for CompressError {
    fn from(value: LayoutError) -> Self {
        Self::InvalidOperation(InvalidOperationReason::Layout(value))
    }
}

impl From<NormalizeError> for CompressError {
    fn from(value: NormalizeError) -> Self {
        Self::InternalConsistencyFault(InternalFault::Normalize(value))
    }
}

impl From<BasisFileError> for CompressError {
    fn from(value: BasisFileError) -> Self {
        Self::InternalConsistencyFault(InternalFault::EncoderOutput(value))
    }
}

impl From<AssembleError> for CompressError {
    fn from(value: AssembleError) -> Self {
        match value {
            AssembleError::Allocate(e) => Self::OutOfMemory(e),
            other => Self::InternalConsistencyFault(InternalFault::Assemble(other)),
        }
    }
}

impl From<ReorderError> for CompressError {
    fn from(value: ReorderError) -> Self {
        match value {
            ReorderError::Allocate(e) => Self::OutOfMemory(e),
            other => Self::InternalConsistencyFault(InternalFault::Reorder(other)),
        }
    }
}

impl From<DfdError> for CompressError {
    fn from(value: DfdError) -> Self {
        match value {
            DfdError::Allocate(e) => Self::OutOfMemory(e),
            other => Self::InternalConsistencyFault(InternalFault::Dfd(other)),
        }
    }
}
