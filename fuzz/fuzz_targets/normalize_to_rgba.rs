#![no_main]

// Any component count and mapping either normalizes every pixel or fails
// without touching the destination.

use ktx2_basis_pack::normalize::normalize_to_rgba;
use ktx2_basis_pack::swizzle::ComponentMapping;
use libfuzzer_sys::{arbitrary, fuzz_target};

#[derive(Clone, Debug, arbitrary::Arbitrary)]
pub struct Input {
    pub num_components: u8,
    pub swizzle: Option<[u8; 5]>,
    pub pixels: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let num_components = (input.num_components % 6) as u32;
    let mapping = input
        .swizzle
        .and_then(|value| ComponentMapping::parse(&value).ok());

    let pixel_size = num_components.max(1) as usize;
    let mut dst = vec![0xCDu8; input.pixels.len() / pixel_size * 4];

    match normalize_to_rgba(&mut dst, &input.pixels, num_components, mapping.as_ref()) {
        Ok(()) => {
            if mapping.is_none() && num_components == 3 {
                assert!(dst.chunks_exact(4).all(|pixel| pixel[3] == u8::MAX));
            }
        }
        Err(_) => assert!(dst.iter().all(|&byte| byte == 0xCD)),
    }
});
