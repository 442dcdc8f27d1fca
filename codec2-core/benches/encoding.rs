use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use codec2_core::{Codec2, Codec2Mode};

fn benchmark_codec2_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec2_encode");

    for mode in [
        Codec2Mode::Mode3200,
        Codec2Mode::Mode1600,
        Codec2Mode::Mode700C,
    ] {
        let mut codec = Codec2::new(mode).unwrap();
        let n = codec.samples_per_frame();
        let speech: Vec<i16> = (0..n).map(|i| ((i * 37) % 2000) as i16 - 1000).collect();

        group.bench_with_input(BenchmarkId::from_parameter(format!("{mode:?}")), &speech, |b, speech| {
            b.iter(|| codec.encode(black_box(speech)))
        });
    }

    group.finish();
}

fn benchmark_mbest_search(c: &mut Criterion) {
    use codec2_core::mbest::{mbest_search, MbestList};

    const K: usize = 10;
    const M: usize = 1024;
    let cb: Vec<f32> = (0..M * K).map(|i| (i as f32 * 0.0013).sin()).collect();
    let target: Vec<f32> = (0..K).map(|i| (i as f32 * 0.21).cos()).collect();

    c.bench_function("mbest_search_1024x10_beam5", |b| {
        b.iter(|| {
            let mut mbest = MbestList::new(5);
            mbest_search(
                black_box(&cb),
                black_box(&target),
                K,
                M,
                &mut mbest,
                0,
                [0; codec2_core::mbest::MBEST_STAGES],
            );
            black_box(mbest)
        })
    });
}

criterion_group!(benches, benchmark_codec2_encode, benchmark_mbest_search);
criterion_main!(benches);
