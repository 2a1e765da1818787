//! Memory allocation utilities for the packaging steps.
//!
//! Supercompression stages several large buffers (the normalized RGBA image set,
//! the global data block, the reordered payload). Every one of them is allocated
//! through this module so that allocation failure surfaces as an [`AllocateError`]
//! instead of aborting the process.
//!
//! ## Useful APIs
//!
//! [`allocate_align_64`]: Allocates uninitialized memory aligned to 64-bytes.
//! [`try_alloc_zeroed`]: Allocates a zero filled [`Vec<u8>`] without aborting on failure.

use alloc::collections::TryReserveError;
use alloc::vec::Vec;
use core::alloc::{Layout, LayoutError};
use safe_allocator_api::prelude::*;
use safe_allocator_api::RawAlloc;
use thiserror::Error;

/// Allocates data with an alignment of 64 bytes.
///
/// Used for staging buffers handed to the encoder, where a cache line aligned
/// start keeps per-image slices from straddling lines unnecessarily.
///
/// # Parameters
///
/// - `num_bytes`: The number of bytes to allocate
///
/// # Returns
///
/// A [`RawAlloc`] containing the allocated data
pub fn allocate_align_64(num_bytes: usize) -> Result<RawAlloc, AllocateError> {
    let layout = Layout::from_size_align(num_bytes, 64)?;
    Ok(RawAlloc::new(layout)?)
}

/// Allocates a zero filled byte vector of exactly `num_bytes` length.
///
/// Unlike [`alloc::vec!`], running out of memory returns
/// [`AllocateError::ReserveFailed`] rather than aborting.
pub fn try_alloc_zeroed(num_bytes: usize) -> Result<Vec<u8>, AllocateError> {
    let mut data = Vec::new();
    data.try_reserve_exact(num_bytes)?;
    data.resize(num_bytes, 0);
    Ok(data)
}

/// Copies `source` into a freshly reserved vector.
pub fn try_clone_slice<T: Copy>(source: &[T]) -> Result<Vec<T>, AllocateError> {
    let mut data = Vec::new();
    data.try_reserve_exact(source.len())?;
    data.extend_from_slice(source);
    Ok(data)
}

/// An error that happened in memory allocation within the library.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocateError {
    /// An error that occurred while creating a layout for allocation.
    #[error("Invalid layout provided. Likely due to `num_bytes` in `allocate_align_64` being larger than isize::MAX. {0}")]
    LayoutError(#[from] LayoutError),

    /// An error that occurred while allocating memory.
    #[error(transparent)]
    AllocationFailed(#[from] AllocError),

    /// Reserving capacity for an owned buffer failed.
    #[error("Failed to reserve buffer capacity: {0}")]
    ReserveFailed(#[from] TryReserveError),
}
