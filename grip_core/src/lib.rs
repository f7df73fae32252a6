#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core position-estimation logic (hardware-agnostic).
//!
//! Estimates the position of a prosthetic digit from six hall-effect
//! sensors, without an absolute encoder. All hardware interactions go
//! through `grip_traits::HallArray`, `grip_traits::FeedbackAdc`, and
//! `grip_traits::PositionSink`.
//!
//! ## Architecture
//!
//! - **Sampling**: high-rate feedback thread with an atomic sample slot
//!   (`sampler` module)
//! - **Calibration**: timed sweep bucketed into running means (`sweep`)
//! - **Classification**: k-nearest-neighbor over voltage space (`knn`)
//! - **Smoothing**: scalar recursive filter (`kalman`)
//! - **Control**: Standby → Calibration → Motoring state machine
//!   (`Estimator` + `state`)

// Module declarations
pub mod adc;
pub mod error;
pub mod kalman;
pub mod knn;
pub mod mocks;
pub mod runner;
pub mod sampler;
pub mod state;
pub mod status;
pub mod sweep;
pub mod util;

use crate::adc::AdcTransform;
use crate::error::{BuildError, Result, map_sensor_error};
use crate::kalman::ScalarKalman;
use crate::knn::KnnModel;
pub use crate::state::{Phase, PhaseEvent, transition};
pub use crate::status::ControlStatus;
use crate::sweep::SweepAggregator;
use eyre::WrapErr;
use grip_config::{ClassifierCfg, Config, ControlCfg, SmootherCfg, SweepCfg, Timeouts};
use grip_traits::clock::{Clock, MonotonicClock};
use grip_traits::{HallArray, PositionSink, SENSOR_COUNT};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub use crate::knn::Classification;
pub use crate::sampler::{FeedbackSampler, RawSample, SampleSlot};
pub use crate::sweep::{SweepSample, TrainingSet};

/// The position estimation pipeline and its control state machine.
///
/// Owned, single-threaded; `step()` executes one polling-loop iteration.
/// The feedback sampler runs beside it and is orchestrated by `runner::run`.
pub struct Estimator<H: HallArray, P: PositionSink> {
    halls: H,
    sink: P,
    adc: AdcTransform,
    sweep_cfg: SweepCfg,
    classifier: ClassifierCfg,
    smoother: SmootherCfg,
    timeouts: Timeouts,
    // Unified clock for deterministic time in tests
    clock: Arc<dyn Clock + Send + Sync>,
    // Epoch Instant for computing monotonic milliseconds
    epoch: Instant,

    phase: Phase,
    aggregator: Option<SweepAggregator>,
    model: Option<KnnModel>,
    filter: ScalarKalman,
    // Edge-triggered calibration trigger; None means trigger is never asserted
    trigger_rx: Option<crossbeam_channel::Receiver<()>>,
    start_in_calibration: bool,

    // Cached loop pacing
    period_us: u64,
    period_ms: u64,
    // Loop-overrun observability
    last_step_ms: Option<u64>,
    overruns: u64,

    last_estimate: Option<f32>,
}

impl<H: HallArray, P: PositionSink> core::fmt::Debug for Estimator<H, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Estimator")
            .field("phase", &self.phase)
            .field("trained", &self.model.is_some())
            .field("last_estimate", &self.last_estimate)
            .field("overruns", &self.overruns)
            .finish()
    }
}

impl<H: HallArray, P: PositionSink> Estimator<H, P> {
    /// Current control phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Last emitted continuous estimate, if any.
    pub fn last_estimate(&self) -> Option<f32> {
        self.last_estimate
    }

    /// Number of detected loop overruns (step-to-step gap exceeding twice
    /// the configured loop period). Observability only; behavior is
    /// unchanged when overruns occur.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Reset per-session state and re-enter the initial phase. Call before
    /// reusing an estimator for a fresh run.
    pub fn begin(&mut self) {
        self.epoch = self.clock.now();
        self.model = None;
        self.aggregator = None;
        self.filter.reset();
        self.last_step_ms = None;
        self.overruns = 0;
        self.last_estimate = None;
        if self.start_in_calibration {
            self.phase = Phase::Calibration;
            self.aggregator = Some(SweepAggregator::new(self.sweep_cfg));
        } else {
            self.phase = Phase::Standby;
        }
    }

    /// One iteration of the polling loop.
    pub fn step(&mut self) -> Result<ControlStatus> {
        let now = self.clock.ms_since(self.epoch);
        self.track_overrun(now);

        if self.take_trigger() {
            self.enter_calibration();
            let status = self.calibrating_status(None);
            self.clock.sleep(self.pacing_sleep());
            return Ok(status);
        }

        let status = match self.phase {
            Phase::Standby => {
                tracing::trace!("standby; waiting for calibration trigger");
                ControlStatus::Standby
            }
            Phase::Calibration => self.step_calibration(now)?,
            Phase::Motoring => self.step_motoring()?,
        };

        self.clock.sleep(self.pacing_sleep());
        Ok(status)
    }

    /// Loop pacing for `step()`: one full period, except during an active
    /// sweep where the sleep is shortened so the next poll lands on the
    /// sample schedule. Sleeping the full period would quantize the sample
    /// pace to the loop grid and skew every accepted sample later than the
    /// physical position its bucket index assumes.
    fn pacing_sleep(&self) -> Duration {
        let mut us = self.period_us;
        if self.phase == Phase::Calibration
            && let Some(agg) = self.aggregator.as_ref()
            && !agg.is_complete()
        {
            let now = self.clock.ms_since(self.epoch);
            us = us.min(agg.due_in_ms(now).saturating_mul(1000));
        }
        Duration::from_micros(us)
    }

    /// Process a pre-sampled hall reading instead of reading the array.
    /// Pacing and trigger polling are the caller's responsibility.
    pub fn step_from_raw(&mut self, reading: [u16; SENSOR_COUNT]) -> Result<ControlStatus> {
        let now = self.clock.ms_since(self.epoch);
        self.track_overrun(now);
        if self.take_trigger() {
            self.enter_calibration();
            return Ok(self.calibrating_status(None));
        }
        match self.phase {
            Phase::Standby => Ok(ControlStatus::Standby),
            Phase::Calibration => self.calibration_from_reading(now, reading),
            Phase::Motoring => self.motoring_from_reading(reading),
        }
    }

    fn step_calibration(&mut self, now: u64) -> Result<ControlStatus> {
        // A completed sweep trains the classifier on the *next* poll, so the
        // transition to Motoring happens exactly once, in its own iteration.
        if self
            .aggregator
            .as_ref()
            .map(SweepAggregator::is_complete)
            .unwrap_or(false)
        {
            return self.train_and_enter_motoring();
        }
        let reading = self.read_halls()?;
        self.calibration_from_reading(now, reading)
    }

    fn calibration_from_reading(
        &mut self,
        now: u64,
        reading: [u16; SENSOR_COUNT],
    ) -> Result<ControlStatus> {
        if self
            .aggregator
            .as_ref()
            .map(SweepAggregator::is_complete)
            .unwrap_or(false)
        {
            return self.train_and_enter_motoring();
        }
        let Some(agg) = self.aggregator.as_mut() else {
            return Err(eyre::Report::new(error::EstimatorError::State(
                "calibration phase without an active sweep".into(),
            )));
        };
        let sample = agg.offer(now, &reading);
        if let Some(s) = &sample {
            tracing::debug!(
                index = s.index,
                position = s.position,
                opening = s.opening,
                "calibrating"
            );
        }
        Ok(self.calibrating_status(sample))
    }

    fn train_and_enter_motoring(&mut self) -> Result<ControlStatus> {
        let Some(agg) = self.aggregator.take() else {
            return Err(eyre::Report::new(error::EstimatorError::State(
                "sweep completion without an aggregator".into(),
            )));
        };
        let set = agg.finish();
        let model = KnnModel::train(&set, &self.adc, self.classifier.k);
        let classes = model.classes();
        self.model = Some(model);
        self.filter = ScalarKalman::from_cfg(&self.smoother);
        self.phase = transition(self.phase, PhaseEvent::SweepComplete);
        tracing::info!(classes, "classifier trained; entering motoring");
        Ok(ControlStatus::Calibrated { classes })
    }

    fn step_motoring(&mut self) -> Result<ControlStatus> {
        let reading = self.read_halls()?;
        self.motoring_from_reading(reading)
    }

    fn motoring_from_reading(&mut self, reading: [u16; SENSOR_COUNT]) -> Result<ControlStatus> {
        let Some(model) = self.model.as_ref() else {
            return Err(eyre::Report::new(error::EstimatorError::State(
                "motoring without a trained model".into(),
            )));
        };
        let volts = self.adc.vector(&reading);
        let c = model.classify(&volts);
        let estimate = if self.smoother.confidence_weighting {
            self.filter
                .update_weighted(c.label as f32, c.confidence, self.smoother.min_confidence)
        } else {
            self.filter.update(c.label as f32)
        };
        self.sink
            .set_target(estimate)
            .map_err(|e| eyre::Report::new(error::EstimatorError::Sink(e.to_string())))
            .wrap_err("emitting position estimate")?;
        self.last_estimate = Some(estimate);
        tracing::trace!(
            label = c.label,
            confidence = c.confidence,
            estimate,
            "motoring"
        );
        Ok(ControlStatus::Motoring {
            label: c.label,
            confidence: c.confidence,
            estimate,
        })
    }

    fn read_halls(&mut self) -> Result<[u16; SENSOR_COUNT]> {
        let timeout = Duration::from_millis(self.timeouts.sensor_ms);
        self.halls
            .read(timeout)
            .map_err(|e| eyre::Report::new(map_sensor_error(&*e)))
            .wrap_err("reading hall array")
    }

    /// Drain the trigger channel; returns true if at least one edge arrived.
    fn take_trigger(&mut self) -> bool {
        let Some(rx) = &self.trigger_rx else {
            return false;
        };
        let mut asserted = false;
        while rx.try_recv().is_ok() {
            asserted = true;
        }
        asserted
    }

    fn enter_calibration(&mut self) {
        // Acknowledge the trigger (the reference hardware blinks an LED
        // pattern here; telemetry is our equivalent).
        tracing::info!(phase = ?self.phase, "calibration trigger acknowledged; starting sweep");
        self.phase = transition(self.phase, PhaseEvent::Trigger);
        self.aggregator = Some(SweepAggregator::new(self.sweep_cfg));
        self.model = None;
        self.filter.reset();
        self.last_estimate = None;
    }

    fn calibrating_status(&self, sample: Option<SweepSample>) -> ControlStatus {
        let (accepted, total) = self
            .aggregator
            .as_ref()
            .map(|a| (a.accepted(), a.total()))
            .unwrap_or((0, 0));
        ControlStatus::Calibrating {
            accepted,
            total,
            sample,
        }
    }

    fn track_overrun(&mut self, now: u64) {
        if let Some(prev) = self.last_step_ms {
            let gap = now.saturating_sub(prev);
            if gap > self.period_ms.saturating_mul(2) {
                self.overruns += 1;
                tracing::debug!(gap_ms = gap, overruns = self.overruns, "loop overrun");
            }
        }
        self.last_step_ms = Some(now);
    }
}

// Type-state markers for the builder
pub struct Missing;
pub struct Set;

use std::marker::PhantomData;

/// Boxed estimator produced by the builder.
pub type BoxedEstimator = Estimator<Box<dyn HallArray>, Box<dyn PositionSink>>;

/// Builder for `Estimator`. The hall array and position sink advance the
/// type-state; everything else is optional with validated defaults.
pub struct EstimatorBuilder<HS, PS> {
    halls: Option<Box<dyn HallArray>>,
    sink: Option<Box<dyn PositionSink>>,
    sweep: Option<SweepCfg>,
    classifier: Option<ClassifierCfg>,
    smoother: Option<SmootherCfg>,
    control: Option<ControlCfg>,
    timeouts: Option<Timeouts>,
    adc: Option<AdcTransform>,
    trigger_rx: Option<crossbeam_channel::Receiver<()>>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    start_in_calibration: bool,
    _h: PhantomData<HS>,
    _p: PhantomData<PS>,
}

impl Default for EstimatorBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            halls: None,
            sink: None,
            sweep: None,
            classifier: None,
            smoother: None,
            control: None,
            timeouts: None,
            adc: None,
            trigger_rx: None,
            clock: None,
            start_in_calibration: false,
            _h: PhantomData,
            _p: PhantomData,
        }
    }
}

impl BoxedEstimator {
    /// Start building an estimator over boxed trait objects.
    pub fn builder() -> EstimatorBuilder<Missing, Missing> {
        EstimatorBuilder::default()
    }
}

/// Chainable setters that do not affect type-state
impl<HS, PS> EstimatorBuilder<HS, PS> {
    pub fn with_sweep(mut self, sweep: SweepCfg) -> Self {
        self.sweep = Some(sweep);
        self
    }
    pub fn with_classifier(mut self, classifier: ClassifierCfg) -> Self {
        self.classifier = Some(classifier);
        self
    }
    pub fn with_smoother(mut self, smoother: SmootherCfg) -> Self {
        self.smoother = Some(smoother);
        self
    }
    pub fn with_control(mut self, control: ControlCfg) -> Self {
        self.control = Some(control);
        self
    }
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = Some(timeouts);
        self
    }
    pub fn with_adc(mut self, adc: AdcTransform) -> Self {
        self.adc = Some(adc);
        self
    }
    /// Take every section from a parsed `Config` at once.
    pub fn with_config(mut self, cfg: &Config) -> Self {
        self.sweep = Some(cfg.sweep);
        self.classifier = Some(cfg.classifier);
        self.smoother = Some(cfg.smoother);
        self.control = Some(cfg.control);
        self.timeouts = Some(cfg.timeouts);
        self.adc = Some(AdcTransform::new(cfg.adc));
        self
    }
    /// Edge-triggered calibration trigger. Without one the estimator can
    /// only calibrate via `start_in_calibration`.
    pub fn with_trigger(mut self, rx: crossbeam_channel::Receiver<()>) -> Self {
        self.trigger_rx = Some(rx);
        self
    }
    /// Provide a custom clock implementation; defaults to MonotonicClock.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
    /// Skip Standby and begin sweeping immediately, matching the reference
    /// firmware's debug wiring. Default is false: Standby is the initial
    /// phase and calibration waits for the trigger.
    pub fn start_in_calibration(mut self, yes: bool) -> Self {
        self.start_in_calibration = yes;
        self
    }

    /// Fallible build available in any type-state; returns a detailed
    /// BuildError for missing pieces.
    pub fn try_build(self) -> Result<BoxedEstimator> {
        let EstimatorBuilder {
            halls,
            sink,
            sweep,
            classifier,
            smoother,
            control,
            timeouts,
            adc,
            trigger_rx,
            clock,
            start_in_calibration,
            _h: _,
            _p: _,
        } = self;

        let halls = halls.ok_or_else(|| eyre::Report::new(BuildError::MissingHalls))?;
        let sink = sink.ok_or_else(|| eyre::Report::new(BuildError::MissingSink))?;
        let sweep = sweep.unwrap_or_default();
        let classifier = classifier.unwrap_or_default();
        let smoother = smoother.unwrap_or_default();
        let control = control.unwrap_or_default();
        let timeouts = timeouts.unwrap_or_default();
        let adc = adc.unwrap_or_default();
        let clock: Arc<dyn Clock + Send + Sync> = match clock {
            Some(b) => Arc::from(b),
            None => Arc::new(MonotonicClock::new()),
        };

        validate_build(&sweep, &classifier, &smoother, &control, &timeouts)?;

        let period_us = util::period_us(control.loop_hz);
        let period_ms = util::period_ms(control.loop_hz);
        let epoch = clock.now();

        let mut est = Estimator {
            halls,
            sink,
            adc,
            sweep_cfg: sweep,
            classifier,
            smoother,
            timeouts,
            clock,
            epoch,
            phase: Phase::Standby,
            aggregator: None,
            model: None,
            filter: ScalarKalman::from_cfg(&smoother),
            trigger_rx,
            start_in_calibration,
            period_us,
            period_ms,
            last_step_ms: None,
            overruns: 0,
            last_estimate: None,
        };
        est.begin();
        Ok(est)
    }
}

// Setters that advance type-state when providing mandatory components
impl<PS> EstimatorBuilder<Missing, PS> {
    pub fn with_halls(self, halls: impl HallArray + 'static) -> EstimatorBuilder<Set, PS> {
        let EstimatorBuilder {
            halls: _,
            sink,
            sweep,
            classifier,
            smoother,
            control,
            timeouts,
            adc,
            trigger_rx,
            clock,
            start_in_calibration,
            _h: _,
            _p: _,
        } = self;
        EstimatorBuilder {
            halls: Some(Box::new(halls)),
            sink,
            sweep,
            classifier,
            smoother,
            control,
            timeouts,
            adc,
            trigger_rx,
            clock,
            start_in_calibration,
            _h: PhantomData,
            _p: PhantomData,
        }
    }
}

impl<HS> EstimatorBuilder<HS, Missing> {
    pub fn with_sink(self, sink: impl PositionSink + 'static) -> EstimatorBuilder<HS, Set> {
        let EstimatorBuilder {
            halls,
            sink: _,
            sweep,
            classifier,
            smoother,
            control,
            timeouts,
            adc,
            trigger_rx,
            clock,
            start_in_calibration,
            _h: _,
            _p: _,
        } = self;
        EstimatorBuilder {
            halls,
            sink: Some(Box::new(sink)),
            sweep,
            classifier,
            smoother,
            control,
            timeouts,
            adc,
            trigger_rx,
            clock,
            start_in_calibration,
            _h: PhantomData,
            _p: PhantomData,
        }
    }
}

impl EstimatorBuilder<Set, Set> {
    /// Validate and build. Only available when the hall array and position
    /// sink are both set.
    pub fn build(self) -> Result<BoxedEstimator> {
        self.try_build()
    }
}

fn validate_build(
    sweep: &SweepCfg,
    classifier: &ClassifierCfg,
    smoother: &SmootherCfg,
    control: &ControlCfg,
    timeouts: &Timeouts,
) -> Result<()> {
    if sweep.intervals == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "sweep intervals must be >= 1",
        )));
    }
    if sweep.samples_per_interval < 2 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "samples_per_interval must be >= 2",
        )));
    }
    if sweep.time_per_sample_ms() == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "interval duration must allow at least 1 ms per sample",
        )));
    }
    if classifier.k == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "classifier k must be >= 1",
        )));
    }
    if classifier.k > sweep.samples_per_interval as usize {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "classifier k must not exceed samples_per_interval",
        )));
    }
    if !(smoother.measurement_error.is_finite() && smoother.measurement_error > 0.0) {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "measurement_error must be finite and > 0",
        )));
    }
    if !(smoother.estimate_error.is_finite() && smoother.estimate_error > 0.0) {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "estimate_error must be finite and > 0",
        )));
    }
    if !(smoother.process_noise.is_finite() && smoother.process_noise > 0.0) {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "process_noise must be finite and > 0",
        )));
    }
    if !(smoother.min_confidence > 0.0 && smoother.min_confidence <= 1.0) {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "min_confidence must be in (0.0, 1.0]",
        )));
    }
    if control.loop_hz == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "loop_hz must be > 0",
        )));
    }
    if timeouts.sensor_ms == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "sensor_ms must be >= 1",
        )));
    }
    Ok(())
}

/// Build a generic, statically-dispatched estimator from concrete parts.
#[allow(clippy::too_many_arguments)]
pub fn build_estimator<H, P>(
    halls: H,
    sink: P,
    cfg: &Config,
    trigger_rx: Option<crossbeam_channel::Receiver<()>>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    start_in_calibration: bool,
) -> Result<Estimator<H, P>>
where
    H: HallArray + 'static,
    P: PositionSink + 'static,
{
    validate_build(
        &cfg.sweep,
        &cfg.classifier,
        &cfg.smoother,
        &cfg.control,
        &cfg.timeouts,
    )?;
    let clock: Arc<dyn Clock + Send + Sync> = match clock {
        Some(b) => Arc::from(b),
        None => Arc::new(MonotonicClock::new()),
    };
    let period_us = util::period_us(cfg.control.loop_hz);
    let period_ms = util::period_ms(cfg.control.loop_hz);
    let epoch = clock.now();

    let mut est = Estimator {
        halls,
        sink,
        adc: AdcTransform::new(cfg.adc),
        sweep_cfg: cfg.sweep,
        classifier: cfg.classifier,
        smoother: cfg.smoother,
        timeouts: cfg.timeouts,
        clock,
        epoch,
        phase: Phase::Standby,
        aggregator: None,
        model: None,
        filter: ScalarKalman::from_cfg(&cfg.smoother),
        trigger_rx,
        start_in_calibration,
        period_us,
        period_ms,
        last_step_ms: None,
        overruns: 0,
        last_estimate: None,
    };
    est.begin();
    Ok(est)
}
