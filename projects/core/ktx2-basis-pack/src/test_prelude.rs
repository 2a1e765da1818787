//! Common test imports and utilities for packaging tests
//!
//! This module provides a common prelude for test modules to avoid
//! duplicate imports across the codebase.
#![allow(unused_imports)]

// Re-export commonly used alloc types for tests
pub use alloc::{boxed::Box, format, string::String, vec, vec::Vec};

// External crates commonly used in tests
pub use rstest::rstest;

pub use crate::basis_file::{
    BasisFileBuilder, BasisFileHeader, BasisSliceDesc, BASIS_HEADER_SIZE, BASIS_SLICE_DESC_SIZE,
    HEADER_FLAG_ETC1S, HEADER_FLAG_HAS_ALPHA_SLICES, SLICE_FLAG_HAS_ALPHA,
};
pub use crate::layout::TextureLayout;

/// Endpoint codebook written by [`synthetic_basis_file`].
pub const ENDPOINTS: &[u8] = &[0xE0, 0xE1, 0xE2, 0xE3, 0xE4];
pub const ENDPOINT_COUNT: u16 = 17;
/// Selector codebook written by [`synthetic_basis_file`].
pub const SELECTORS: &[u8] = &[0x50, 0x51, 0x52];
pub const SELECTOR_COUNT: u16 = 9;
/// Huffman tables written by [`synthetic_basis_file`].
pub const TABLES: &[u8] = &[0x7A, 0x7B, 0x7C, 0x7D, 0x7E, 0x7F, 0x70];

/// A 16x16 texture with the given counts.
pub(crate) fn simple_layout(levels: u32, layers: u32, faces: u32, depth: u32) -> TextureLayout {
    TextureLayout {
        base_width: 16,
        base_height: 16,
        base_depth: depth,
        num_levels: levels,
        num_layers: layers,
        num_faces: faces,
    }
}

/// Builds encoder output for every image of `layout` in canonical order.
///
/// Slice sizes vary per image (never zero) and every slice is filled with a
/// single byte unique to it, so misplaced bytes are easy to spot:
/// colour slices use `image * 2`, alpha slices `image * 2 + 1` (wrapping).
pub(crate) fn synthetic_basis_file(layout: &TextureLayout, alpha: bool) -> Vec<u8> {
    let mut flags = HEADER_FLAG_ETC1S;
    if alpha {
        flags |= HEADER_FLAG_HAS_ALPHA_SLICES;
    }

    let mut builder = BasisFileBuilder::new()
        .flags(flags)
        .endpoints(ENDPOINT_COUNT, ENDPOINTS)
        .selectors(SELECTOR_COUNT, SELECTORS)
        .tables(TABLES);

    for (index, image) in layout.images().enumerate() {
        let (width, height, _) = layout.level_extent(image.level);
        let size = 1 + (width * height / 8) as usize + index % 3;
        let fill = (index * 2) as u8;

        builder = builder.slice_with_size(index as u32, 0, width as u16, height as u16, &vec![fill; size]);
        if alpha {
            builder = builder.slice_with_size(
                index as u32,
                SLICE_FLAG_HAS_ALPHA,
                width as u16,
                height as u16,
                &vec![fill.wrapping_add(1); size + 1],
            );
        }
    }

    builder.build()
}

/// Decodes slice descriptor `index` straight from encoder output.
pub(crate) fn slice_at(bytes: &[u8], index: usize) -> BasisSliceDesc {
    let header = BasisFileHeader::read(bytes).unwrap();
    let start = header.slice_desc_file_ofs as usize + index * BASIS_SLICE_DESC_SIZE;
    BasisSliceDesc::decode(bytes[start..start + BASIS_SLICE_DESC_SIZE].try_into().unwrap())
}

/// Rewrites slice descriptor `index` of encoder output in place.
pub(crate) fn patch_slice_desc(bytes: &mut [u8], index: usize, patch: impl FnOnce(&mut BasisSliceDesc)) {
    let mut slice = slice_at(bytes, index);
    patch(&mut slice);
    let header = BasisFileHeader::read(bytes).unwrap();
    let start = header.slice_desc_file_ofs as usize + index * BASIS_SLICE_DESC_SIZE;
    bytes[start..start + BASIS_SLICE_DESC_SIZE].copy_from_slice(&slice.encode());
}

#[test]
fn synthetic_basis_file_matches_layout() {
    let layout = simple_layout(3, 2, 1, 1);
    let bytes = synthetic_basis_file(&layout, true);
    let header = BasisFileHeader::read(&bytes).unwrap();

    assert_eq!(header.total_images, 6);
    assert_eq!(header.total_slices, 12);
    assert_eq!(slice_at(&bytes, 0).orig_width, 16);
    assert_eq!(slice_at(&bytes, 4).orig_width, 8);
    assert_eq!(slice_at(&bytes, 1).flags, SLICE_FLAG_HAS_ALPHA);
    assert_eq!(header.endpoint_cb_file_size as usize, ENDPOINTS.len());
}
