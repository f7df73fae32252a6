use grip_config::SweepCfg;
use grip_core::sweep::{SweepAggregator, TrainingSet};
use grip_traits::SENSOR_COUNT;
use rstest::rstest;

fn cfg(intervals: u32, spi: u32, duration_ms: u64) -> SweepCfg {
    SweepCfg {
        intervals,
        samples_per_interval: spi,
        interval_duration_ms: duration_ms,
    }
}

/// Drive a full sweep where the reading at physical position p is always
/// `value_at(p)`, alternating direction per interval like the real rig.
fn run_sweep(c: SweepCfg, value_at: impl Fn(u32) -> u16) -> TrainingSet {
    let mut agg = SweepAggregator::new(c);
    let pace = c.time_per_sample_ms();
    let mut now = 0u64;
    for i in 0..c.total_samples() {
        let pos = SweepAggregator::bucket_index(i, c.samples_per_interval);
        let reading = [value_at(pos); SENSOR_COUNT];
        assert!(
            agg.offer(now, &reading).is_some(),
            "sample {i} unexpectedly rejected"
        );
        now += pace;
    }
    assert!(agg.is_complete());
    agg.finish()
}

#[rstest]
// Opening interval 0: forward order
#[case(0, 0)]
#[case(1, 1)]
#[case(3, 3)]
// Closing interval 1: reverse order
#[case(4, 3)]
#[case(5, 2)]
#[case(7, 0)]
// Opening again
#[case(8, 0)]
#[case(11, 3)]
// Closing again
#[case(12, 3)]
#[case(15, 0)]
fn bucket_index_matches_physical_position(#[case] i: u32, #[case] expected: u32) {
    assert_eq!(SweepAggregator::bucket_index(i, 4), expected);
}

#[test]
fn opening_alternates_per_interval() {
    assert!(SweepAggregator::is_opening(0, 4));
    assert!(SweepAggregator::is_opening(3, 4));
    assert!(!SweepAggregator::is_opening(4, 4));
    assert!(!SweepAggregator::is_opening(7, 4));
    assert!(SweepAggregator::is_opening(8, 4));
}

#[test]
fn two_sweeps_of_four_positions_average_to_expected_buckets() {
    // spi=4, intervals=2, readings [10,20,30,40] per pass
    let set = run_sweep(cfg(2, 4, 400), |pos| (10 * (pos + 1)) as u16);
    assert_eq!(set.positions(), 4);
    for (pos, expected) in [(0usize, 10.0f32), (1, 20.0), (2, 30.0), (3, 40.0)] {
        let bucket = set.bucket(pos).expect("bucket exists");
        for ch in bucket {
            assert!(
                (ch - expected).abs() < 1e-3,
                "bucket {pos} = {ch}, expected {expected}"
            );
        }
    }
}

#[test]
fn bucket_mean_is_independent_of_sweep_direction() {
    // Four alternating traversals; constant per-position readings must
    // yield exactly those constants regardless of traversal direction.
    let set = run_sweep(cfg(4, 5, 500), |pos| (100 + 7 * pos) as u16);
    for pos in 0..5u32 {
        let expected = (100 + 7 * pos) as f32;
        let bucket = set.bucket(pos as usize).expect("bucket exists");
        assert!(
            (bucket[0] - expected).abs() < 1e-2,
            "bucket {pos} = {}, expected {expected}",
            bucket[0]
        );
    }
}

#[test]
fn varying_readings_converge_to_the_running_mean() {
    // Position 0 sees 10 on the first pass and 30 on the second: mean 20.
    let c = cfg(2, 2, 200);
    let mut agg = SweepAggregator::new(c);
    let frames: [u16; 4] = [10, 10, 30, 30]; // pos order: 0,1,1,0
    let mut now = 0;
    for f in frames {
        assert!(agg.offer(now, &[f; SENSOR_COUNT]).is_some());
        now += c.time_per_sample_ms();
    }
    let set = agg.finish();
    assert!((set.bucket(0).expect("bucket")[0] - 20.0).abs() < 1e-4);
    assert!((set.bucket(1).expect("bucket")[0] - 20.0).abs() < 1e-4);
}

#[test]
fn incomplete_sweep_keeps_partial_buckets() {
    let c = cfg(2, 4, 400);
    let mut agg = SweepAggregator::new(c);
    // Only the first two positions get touched before the operator stops.
    assert!(agg.offer(0, &[40; SENSOR_COUNT]).is_some());
    assert!(agg.offer(100, &[40; SENSOR_COUNT]).is_some());
    let set = agg.finish();
    assert!((set.bucket(0).expect("bucket")[0] - 20.0).abs() < 1e-4);
    assert_eq!(set.bucket(3).expect("bucket")[0], 0.0);
}
