//! Canonical image order of a texture.
//!
//! Images are visited level by level (largest first), then layer by layer, then
//! face by face or depth slice by depth slice. The encoder preserves this order
//! in its output, which is how compressed slices are correlated back to their
//! `(level, layer, face/slice)` identity.

use thiserror::Error;

/// Errors describing a texture shape that cannot be packed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// A texture may have several faces or several depth slices, never both.
    #[error("Texture has {num_faces} faces and a base depth of {base_depth}; 3D cubemaps are not supported")]
    CubemapWithDepth { num_faces: u32, base_depth: u32 },

    /// A dimension or count was zero.
    #[error("Texture {0} must be at least 1")]
    ZeroExtent(&'static str),
}

/// Shape of a texture as seen by the image packer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureLayout {
    pub base_width: u32,
    pub base_height: u32,
    pub base_depth: u32,
    pub num_levels: u32,
    pub num_layers: u32,
    pub num_faces: u32,
}

/// Identity of a single 2D image within a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageId {
    pub level: u32,
    pub layer: u32,
    /// Cubemap face, or depth slice for 3D textures.
    pub face_slice: u32,
}

impl TextureLayout {
    /// Checks the face/depth exclusivity and that no extent is zero.
    pub fn validate(&self) -> Result<(), LayoutError> {
        let extents = [
            (self.base_width, "base width"),
            (self.base_height, "base height"),
            (self.base_depth, "base depth"),
            (self.num_levels, "level count"),
            (self.num_layers, "layer count"),
            (self.num_faces, "face count"),
        ];
        if let Some((_, name)) = extents.iter().find(|(value, _)| *value == 0) {
            return Err(LayoutError::ZeroExtent(name));
        }

        if self.num_faces > 1 && self.base_depth > 1 {
            return Err(LayoutError::CubemapWithDepth {
                num_faces: self.num_faces,
                base_depth: self.base_depth,
            });
        }

        Ok(())
    }

    /// Width, height and depth of `level`, each clamped to 1.
    #[inline]
    pub fn level_extent(&self, level: u32) -> (u32, u32, u32) {
        (
            shift_clamped(self.base_width, level),
            shift_clamped(self.base_height, level),
            shift_clamped(self.base_depth, level),
        )
    }

    /// Number of faces, or of depth slices when the texture has a single face.
    #[inline]
    pub fn face_slices(&self, level: u32) -> u32 {
        if self.num_faces == 1 {
            shift_clamped(self.base_depth, level)
        } else {
            self.num_faces
        }
    }

    /// Number of images in `level`.
    #[inline]
    pub fn images_in_level(&self, level: u32) -> u32 {
        self.num_layers * self.face_slices(level)
    }

    /// Total number of images the encoder receives and must report back.
    pub fn image_count(&self) -> u32 {
        (0..self.num_levels)
            .map(|level| self.images_in_level(level))
            .sum()
    }

    /// Iterates every image in canonical order.
    pub fn images(&self) -> impl Iterator<Item = ImageId> + '_ {
        (0..self.num_levels).flat_map(move |level| {
            (0..self.num_layers).flat_map(move |layer| {
                (0..self.face_slices(level)).map(move |face_slice| ImageId {
                    level,
                    layer,
                    face_slice,
                })
            })
        })
    }
}

#[inline(always)]
fn shift_clamped(value: u32, level: u32) -> u32 {
    value.checked_shr(level).unwrap_or(0).max(1)
}

/// One entry of the container's level index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LevelIndexEntry {
    /// Offset of the level within the texture's payload.
    pub byte_offset: u64,
    pub byte_length: u64,
    /// Zero once the level is supercompressed.
    pub uncompressed_byte_length: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_prelude::*;

    fn layout(levels: u32, layers: u32, faces: u32, depth: u32) -> TextureLayout {
        TextureLayout {
            base_width: 16,
            base_height: 16,
            base_depth: depth,
            num_levels: levels,
            num_layers: layers,
            num_faces: faces,
        }
    }

    #[rstest]
    #[case(layout(1, 1, 1, 1), 1)]
    #[case(layout(5, 1, 1, 1), 5)]
    #[case(layout(3, 4, 1, 1), 12)]
    #[case(layout(3, 2, 6, 1), 36)]
    // Depth shrinks with each level: 8 + 4 + 2 + 1 + 1
    #[case(layout(5, 1, 1, 8), 16)]
    #[case(layout(2, 3, 1, 4), 18)]
    fn image_count_matches_formula(#[case] layout: TextureLayout, #[case] expected: u32) {
        assert_eq!(layout.image_count(), expected);
        assert_eq!(layout.images().count() as u32, expected);
    }

    #[test]
    fn images_are_in_level_layer_face_order() {
        let layout = layout(2, 2, 6, 1);
        let images: Vec<ImageId> = layout.images().collect();

        assert_eq!(
            images[0],
            ImageId {
                level: 0,
                layer: 0,
                face_slice: 0
            }
        );
        assert_eq!(
            images[7],
            ImageId {
                level: 0,
                layer: 1,
                face_slice: 1
            }
        );
        assert_eq!(
            images[12],
            ImageId {
                level: 1,
                layer: 0,
                face_slice: 0
            }
        );

        // Strictly increasing in (level, layer, face_slice).
        for pair in images.windows(2) {
            let a = (pair[0].level, pair[0].layer, pair[0].face_slice);
            let b = (pair[1].level, pair[1].layer, pair[1].face_slice);
            assert!(a < b);
        }
    }

    #[test]
    fn level_extent_clamps_to_one() {
        let layout = TextureLayout {
            base_width: 8,
            base_height: 2,
            base_depth: 1,
            num_levels: 4,
            num_layers: 1,
            num_faces: 1,
        };
        assert_eq!(layout.level_extent(0), (8, 2, 1));
        assert_eq!(layout.level_extent(2), (2, 1, 1));
        assert_eq!(layout.level_extent(3), (1, 1, 1));
        assert_eq!(layout.level_extent(40), (1, 1, 1));
    }

    #[test]
    fn rejects_cubemap_with_depth() {
        assert_eq!(
            layout(1, 1, 6, 4).validate(),
            Err(LayoutError::CubemapWithDepth {
                num_faces: 6,
                base_depth: 4
            })
        );
    }

    #[test]
    fn rejects_zero_levels() {
        assert_eq!(
            layout(0, 1, 1, 1).validate(),
            Err(LayoutError::ZeroExtent("level count"))
        );
    }
}
