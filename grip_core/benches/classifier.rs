use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use grip_core::TrainingSet;
use grip_core::adc::AdcTransform;
use grip_core::knn::KnnModel;
use grip_traits::SENSOR_COUNT;

// Synthetic calibration buckets: smooth per-channel ramps with additive
// white noise, shaped like a real sweep over `positions` labels.
fn synth_buckets(positions: usize, noise_amp: f32, seed: u32) -> Vec<[f32; SENSOR_COUNT]> {
    // tiny PRNG
    let mut state = seed.max(1);
    let mut next_f32 = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        (x as f32) / (u32::MAX as f32 + 1.0)
    };
    let mut v = Vec::with_capacity(positions);
    for p in 0..positions {
        let mut bucket = [0.0f32; SENSOR_COUNT];
        for (ch, b) in bucket.iter_mut().enumerate() {
            let base = (p as f32 / positions as f32) * (ch as f32 + 1.0) * 100.0;
            let noise = (next_f32() * 2.0 - 1.0) * noise_amp;
            *b = base + noise;
        }
        v.push(bucket);
    }
    v
}

pub fn bench_knn(c: &mut Criterion) {
    let mut g = c.benchmark_group("knn");
    // Allow quick tweaking without CLI flags (Criterion 0.5):
    //   BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p grip_core --bench classifier
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(n) = ss.parse::<usize>() {
            g.sample_size(n.max(1));
        }
    } else {
        g.sample_size(50);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(std::time::Duration::from_millis(ms_u64));
    }

    let positions = 125usize;
    let buckets = synth_buckets(positions, 2.0, 0xC0FFEE);
    let adc = AdcTransform::default();

    g.bench_function("train_125", |b| {
        b.iter_batched(
            || TrainingSet::from_buckets(buckets.clone()),
            |set| black_box(KnnModel::train(&set, &adc, 5)),
            BatchSize::SmallInput,
        )
    });

    let queries = synth_buckets(64, 5.0, 0xBEEF);
    for &k in &[1usize, 5, 15] {
        let model = KnnModel::train(&TrainingSet::from_buckets(buckets.clone()), &adc, k);
        g.bench_function(format!("classify_k{k}"), |b| {
            b.iter(|| {
                for query in &queries {
                    black_box(model.classify(black_box(query)));
                }
            })
        });
    }
    g.finish();
}

criterion_group!(classifier, bench_knn);
criterion_main!(classifier);
