#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas for the hall-sensor position estimator.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - All values have defaults matching the reference hardware (6 hall
//!   channels, 4.3 V ADC reference, 10-bit resolution, 4 sweeps of 125
//!   positions over 2 s each).
use serde::Deserialize;

/// ADC front-end parameters shared by calibration and classification.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct AdcCfg {
    /// ADC reference voltage in volts.
    pub vref: f32,
    /// Full-scale ADC count (e.g. 1023 for a 10-bit converter).
    pub resolution: u16,
}

impl Default for AdcCfg {
    fn default() -> Self {
        Self {
            vref: 4.3,
            resolution: 1023,
        }
    }
}

/// Calibration sweep timing and geometry.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct SweepCfg {
    /// Number of repeated back-and-forth traversals.
    pub intervals: u32,
    /// Discrete positions sampled per traversal.
    pub samples_per_interval: u32,
    /// Duration of one traversal in milliseconds.
    pub interval_duration_ms: u64,
}

impl SweepCfg {
    /// Minimum spacing between accepted samples, in milliseconds.
    pub fn time_per_sample_ms(&self) -> u64 {
        self.interval_duration_ms / u64::from(self.samples_per_interval.max(1))
    }

    /// Total samples a complete calibration run accumulates.
    pub fn total_samples(&self) -> u32 {
        self.intervals.saturating_mul(self.samples_per_interval)
    }
}

impl Default for SweepCfg {
    fn default() -> Self {
        Self {
            intervals: 4,
            samples_per_interval: 125,
            interval_duration_ms: 2000,
        }
    }
}

/// K-nearest-neighbor classifier parameters.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct ClassifierCfg {
    /// Neighbors consulted per classification.
    pub k: usize,
}

impl Default for ClassifierCfg {
    fn default() -> Self {
        Self { k: 5 }
    }
}

/// Scalar recursive filter parameters.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct SmootherCfg {
    /// Expected measurement noise.
    pub measurement_error: f32,
    /// Initial estimate uncertainty.
    pub estimate_error: f32,
    /// Process noise; higher values track faster, lower values smooth harder.
    pub process_noise: f32,
    /// When true, classifier confidence inflates the effective measurement
    /// noise so low-agreement labels are trusted less.
    pub confidence_weighting: bool,
    /// Floor applied to confidence before weighting, in (0, 1].
    pub min_confidence: f32,
}

impl Default for SmootherCfg {
    fn default() -> Self {
        Self {
            measurement_error: 1.0,
            estimate_error: 1.0,
            process_noise: 0.01,
            confidence_weighting: false,
            min_confidence: 0.2,
        }
    }
}

/// Loop pacing.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct ControlCfg {
    /// Control-loop rate in Hz.
    pub loop_hz: u32,
    /// Feedback sampler rate in Hz (reference hardware runs 20 kHz).
    pub feedback_hz: u32,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            loop_hz: 100,
            feedback_hz: 20_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Timeouts {
    /// Max sensor wait per read (ms). Also accepts alias "sample_ms".
    #[serde(alias = "sample_ms")]
    pub sensor_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { sensor_ms: 150 }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub adc: AdcCfg,
    pub sweep: SweepCfg,
    pub classifier: ClassifierCfg,
    pub smoother: SmootherCfg,
    pub control: ControlCfg,
    pub timeouts: Timeouts,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // ADC
        if !self.adc.vref.is_finite() || self.adc.vref <= 0.0 {
            eyre::bail!("adc.vref must be finite and > 0");
        }
        if self.adc.resolution == 0 {
            eyre::bail!("adc.resolution must be > 0");
        }

        // Sweep
        if self.sweep.intervals == 0 {
            eyre::bail!("sweep.intervals must be >= 1");
        }
        if self.sweep.samples_per_interval < 2 {
            eyre::bail!("sweep.samples_per_interval must be >= 2");
        }
        if self.sweep.interval_duration_ms < u64::from(self.sweep.samples_per_interval) {
            eyre::bail!(
                "sweep.interval_duration_ms must allow at least 1 ms per sample \
                 (got {} ms for {} samples)",
                self.sweep.interval_duration_ms,
                self.sweep.samples_per_interval
            );
        }

        // Classifier
        if self.classifier.k == 0 {
            eyre::bail!("classifier.k must be >= 1");
        }
        if self.classifier.k > self.sweep.samples_per_interval as usize {
            eyre::bail!("classifier.k must not exceed sweep.samples_per_interval");
        }

        // Smoother
        if !(self.smoother.measurement_error.is_finite() && self.smoother.measurement_error > 0.0) {
            eyre::bail!("smoother.measurement_error must be finite and > 0");
        }
        if !(self.smoother.estimate_error.is_finite() && self.smoother.estimate_error > 0.0) {
            eyre::bail!("smoother.estimate_error must be finite and > 0");
        }
        if !(self.smoother.process_noise.is_finite() && self.smoother.process_noise > 0.0) {
            eyre::bail!("smoother.process_noise must be finite and > 0");
        }
        if !(self.smoother.min_confidence > 0.0 && self.smoother.min_confidence <= 1.0) {
            eyre::bail!("smoother.min_confidence must be in (0.0, 1.0]");
        }

        // Control
        if self.control.loop_hz == 0 {
            eyre::bail!("control.loop_hz must be > 0");
        }
        if self.control.feedback_hz == 0 {
            eyre::bail!("control.feedback_hz must be > 0");
        }

        // Timeouts
        if self.timeouts.sensor_ms == 0 {
            eyre::bail!("timeouts.sensor_ms must be >= 1");
        }

        Ok(())
    }
}
