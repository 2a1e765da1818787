use core::{alloc::Layout, time::Duration};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ktx2_basis_pack::normalize::normalize_to_rgba;
use ktx2_basis_pack::swizzle::ComponentMapping;
use safe_allocator_api::RawAlloc;
use std::hint::black_box;

pub(crate) fn allocate_align_64(num_bytes: usize) -> RawAlloc {
    let layout = Layout::from_size_align(num_bytes, 64).unwrap();
    RawAlloc::new(layout).unwrap()
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("Normalize to RGBA");
    let num_pixels = 2048 * 2048;
    let mut output = allocate_align_64(num_pixels * 4);

    group.throughput(criterion::Throughput::Bytes((num_pixels * 4) as u64));
    group.warm_up_time(Duration::from_secs(5));
    group.measurement_time(Duration::from_secs(20));

    let cases: [(&str, u32, Option<ComponentMapping>); 4] = [
        ("rgba copy", 4, None),
        ("rgb opaque", 3, None),
        ("rg luminance alpha", 2, Some(ComponentMapping::RG_TO_RGB_A)),
        ("r broadcast", 1, Some(ComponentMapping::R_TO_RGBA)),
    ];

    for (name, num_components, mapping) in cases {
        let mut input = allocate_align_64(num_pixels * num_components as usize);
        for (index, byte) in input.as_mut_slice().iter_mut().enumerate() {
            *byte = index as u8;
        }

        group.bench_with_input(BenchmarkId::new(name, num_pixels), &num_pixels, |b, _| {
            b.iter(|| {
                normalize_to_rgba(
                    black_box(output.as_mut_slice()),
                    black_box(input.as_slice()),
                    num_components,
                    mapping.as_ref(),
                )
            })
        });
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default();
    targets = criterion_benchmark
}

criterion_main!(benches);
