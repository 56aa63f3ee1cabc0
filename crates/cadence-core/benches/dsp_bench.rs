use cadence_core::autocorr::estimate_bpm;
use cadence_core::cqt::CqtExtractor;
use cadence_core::mel::MelExtractor;
use cadence_core::resample::Downsampler;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_mel(c: &mut Criterion) {
    let samples: Vec<f32> = (0..441 * 10).map(|i| (i as f32 * 0.01).sin()).collect();
    c.bench_function("mel_extractor_10_hops", |b| {
        b.iter(|| {
            let mut ext = MelExtractor::new();
            black_box(ext.push(black_box(&samples)))
        });
    });
}

fn bench_cqt(c: &mut Criterion) {
    let samples: Vec<f32> = (0..8_820 * 5).map(|i| (i as f32 * 0.002).sin()).collect();
    c.bench_function("cqt_extractor_5_hops", |b| {
        b.iter(|| {
            let mut ext = CqtExtractor::new();
            black_box(ext.push(black_box(&samples)))
        });
    });
}

fn bench_downsampler(c: &mut Criterion) {
    let samples: Vec<f32> = (0..44_100).map(|i| (i as f32 * 0.001).sin()).collect();
    c.bench_function("downsampler_1s", |b| {
        b.iter(|| {
            let mut ds = Downsampler::new();
            let mut out = Vec::new();
            ds.process(black_box(&samples), &mut out);
            black_box(out)
        });
    });
}

fn bench_autocorrelation(c: &mut Criterion) {
    let signal: Vec<f32> = (0..512)
        .map(|i| if i % 25 == 0 { 1.0 } else { 0.0 })
        .collect();
    c.bench_function("autocorrelation_512_frames", |b| {
        b.iter(|| black_box(estimate_bpm(black_box(&signal))));
    });
}

criterion_group!(benches, bench_mel, bench_cqt, bench_downsampler, bench_autocorrelation);
criterion_main!(benches);
