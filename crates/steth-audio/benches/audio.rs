use criterion::{Criterion, black_box, criterion_group, criterion_main};
use steth_audio::mel::MelExtractor;
use steth_audio::resample::resample;
use steth_core::frame::SampleBuffer;

fn heartbeat(len: usize, rate: u32) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let t = i as f32 / rate as f32;
            0.2 * (2.0 * std::f32::consts::PI * 60.0 * t).sin() * (t * 1.2).fract()
        })
        .collect()
}

fn bench_features(c: &mut Criterion) {
    let buffer = SampleBuffer::new(heartbeat(16_000, 16_000), 16_000);
    let mut extractor = MelExtractor::new();
    c.bench_function("mel_extract_1s", |b| {
        b.iter(|| extractor.extract(black_box(&buffer)));
    });
}

fn bench_resample(c: &mut Criterion) {
    let input = heartbeat(44_100 * 2, 44_100);
    c.bench_function("resample_44k1_to_16k_2s", |b| {
        b.iter(|| resample(black_box(&input), 44_100, 16_000).len());
    });
}

criterion_group!(benches, bench_features, bench_resample);
criterion_main!(benches);
