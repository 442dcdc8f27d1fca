use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use codec2_core::{Codec2, Codec2Mode};

fn benchmark_codec2_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec2_decode");

    for mode in [
        Codec2Mode::Mode3200,
        Codec2Mode::Mode1600,
        Codec2Mode::Mode700C,
    ] {
        let mut enc = Codec2::new(mode).unwrap();
        let n = enc.samples_per_frame();
        let speech: Vec<i16> = (0..n).map(|i| ((i * 37) % 2000) as i16 - 1000).collect();
        let frame = enc.encode(&speech);

        let mut dec = Codec2::new(mode).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(format!("{mode:?}")), &frame, |b, frame| {
            b.iter(|| dec.decode(black_box(frame)))
        });
    }

    group.finish();
}

fn benchmark_freedv_rx_loop(c: &mut Criterion) {
    use codec2_core::freedv::modes::FreeDvMode;
    use codec2_core::{FreeDvSession, RxOutcome};

    let mode = FreeDvMode::DataC1;
    let mut tx = FreeDvSession::new(mode).unwrap();
    let payload = vec![0xABu8; 32];
    let mut samples = Vec::new();
    for _ in 0..4 {
        samples.extend(tx.tx(None, Some(&payload)));
    }

    c.bench_function("freedv_rx_dataC1_nin_loop", |b| {
        b.iter(|| {
            let mut rx = FreeDvSession::new(mode).unwrap();
            let mut pos = 0;
            let mut frames = 0usize;
            while pos + rx.nin() <= samples.len() {
                let nin = rx.nin();
                if let RxOutcome::Data(bytes) = rx.rx(black_box(&samples[pos..pos + nin])) {
                    frames += bytes.len();
                }
                pos += nin;
            }
            black_box(frames)
        })
    });
}

criterion_group!(benches, benchmark_codec2_decode, benchmark_freedv_rx_loop);
criterion_main!(benches);
