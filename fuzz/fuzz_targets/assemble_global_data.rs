#![no_main]

// Feeds arbitrary encoder output and texture shapes through the assembler and
// the level reorderer. Neither may panic, and a successful assembly must
// describe only bytes that exist.

use ktx2_basis_pack::{assemble_global_data, reorder_levels, BasisFile, BasisGlobalData, TextureLayout};
use libfuzzer_sys::{arbitrary, fuzz_target};

#[derive(Clone, Debug, arbitrary::Arbitrary)]
pub struct Input {
    pub width: u8,
    pub height: u8,
    pub depth: u8,
    pub levels: u8,
    pub layers: u8,
    pub cubemap: bool,
    pub encoded: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let layout = TextureLayout {
        base_width: input.width as u32,
        base_height: input.height as u32,
        base_depth: input.depth as u32,
        num_levels: (input.levels % 9) as u32,
        num_layers: (input.layers % 5) as u32,
        num_faces: if input.cubemap { 6 } else { 1 },
    };
    if layout.validate().is_err() {
        return;
    }

    let Ok(file) = BasisFile::parse(&input.encoded) else {
        return;
    };
    let Ok(assembled) = assemble_global_data(&file, &layout) else {
        return;
    };

    let num_images = layout.image_count() as usize;
    let global_data = BasisGlobalData::parse(&assembled.global_data, num_images)
        .expect("Assembled global data must parse");
    assert_eq!(global_data.image_count(), num_images);

    let reordered = reorder_levels(&input.encoded, &assembled.levels)
        .expect("Assembled levels lie within the encoder output");
    let total: u64 = reordered.level_index.iter().map(|entry| entry.byte_length).sum();
    assert_eq!(total, reordered.data.len() as u64);
});
