#![no_main]

// Arbitrary encoder output must be rejected cleanly, and anything accepted must
// be safe to walk slice by slice.

use ktx2_basis_pack::BasisFile;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(file) = BasisFile::parse(data) else {
        return;
    };

    for slice in file.slices() {
        let bytes = file
            .slice_data(&slice)
            .expect("Parsed files only hold in bounds slices");
        assert_eq!(bytes.len(), slice.file_size as usize);
    }

    let _ = file.endpoint_codebook();
    let _ = file.selector_codebook();
    let _ = file.tables();
});
