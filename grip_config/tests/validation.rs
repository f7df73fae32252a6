use grip_config::load_toml;
use rstest::rstest;

#[test]
fn defaults_match_reference_hardware() {
    let cfg = load_toml("").expect("empty TOML uses defaults");
    cfg.validate().expect("defaults are valid");
    assert_eq!(cfg.sweep.intervals, 4);
    assert_eq!(cfg.sweep.samples_per_interval, 125);
    assert_eq!(cfg.sweep.interval_duration_ms, 2000);
    assert_eq!(cfg.sweep.time_per_sample_ms(), 16);
    assert_eq!(cfg.sweep.total_samples(), 500);
    assert_eq!(cfg.classifier.k, 5);
    assert!((cfg.adc.vref - 4.3).abs() < 1e-6);
    assert_eq!(cfg.adc.resolution, 1023);
}

#[test]
fn rejects_zero_intervals() {
    let cfg = load_toml("[sweep]\nintervals = 0\n").expect("parse TOML");
    let err = cfg.validate().expect_err("should reject intervals=0");
    assert!(format!("{err}").contains("sweep.intervals must be >= 1"));
}

#[test]
fn rejects_k_larger_than_positions() {
    let toml = r#"
[sweep]
samples_per_interval = 8

[classifier]
k = 9
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject k > positions");
    assert!(format!("{err}").contains("classifier.k must not exceed"));
}

#[test]
fn rejects_sweep_faster_than_one_ms_per_sample() {
    let toml = r#"
[sweep]
samples_per_interval = 200
interval_duration_ms = 100
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject <1ms per sample");
    assert!(format!("{err}").contains("interval_duration_ms"));
}

#[rstest]
#[case("[smoother]\nmeasurement_error = 0.0\n", "smoother.measurement_error")]
#[case("[smoother]\nestimate_error = -1.0\n", "smoother.estimate_error")]
#[case("[smoother]\nprocess_noise = 0.0\n", "smoother.process_noise")]
#[case("[smoother]\nmin_confidence = 0.0\n", "smoother.min_confidence")]
#[case("[control]\nloop_hz = 0\n", "control.loop_hz")]
#[case("[control]\nfeedback_hz = 0\n", "control.feedback_hz")]
#[case("[timeouts]\nsensor_ms = 0\n", "timeouts.sensor_ms")]
#[case("[adc]\nvref = 0.0\n", "adc.vref")]
#[case("[adc]\nresolution = 0\n", "adc.resolution")]
fn rejects_out_of_range_fields(#[case] toml: &str, #[case] field: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        format!("{err}").contains(field),
        "error should mention {field}: {err}"
    );
}

#[test]
fn accepts_sample_ms_alias() {
    let cfg = load_toml("[timeouts]\nsample_ms = 75\n").expect("parse TOML");
    assert_eq!(cfg.timeouts.sensor_ms, 75);
}
