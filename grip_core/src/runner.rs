//! Orchestration: the polling loop plus the feedback sampler thread.

use crate::error::{EstimatorError, Result as CoreResult};
use crate::sampler::FeedbackSampler;
use crate::status::ControlStatus;
use grip_config::Config;
use grip_traits::clock::MonotonicClock;
use grip_traits::{FeedbackAdc, HallArray, PositionSink};
use std::time::Duration;

/// Compute the feedback stall watchdog threshold in milliseconds.
///
/// Starts from a fast threshold (4x the per-read sensor timeout) so stalls
/// are caught promptly, then widens it to span at least two sampling
/// periods so a single missed acquisition does not trip the watchdog.
#[inline]
fn stall_threshold_ms(sensor_timeout_ms: u64, period_ms: u64) -> u64 {
    let fast = sensor_timeout_ms.saturating_mul(4);
    let two_periods = period_ms.saturating_mul(2);
    fast.max(two_periods).max(1)
}

#[inline]
fn stalled_now(elapsed_ms: u64, stalled_ms: u64, threshold_ms: u64) -> bool {
    elapsed_ms >= threshold_ms && stalled_ms > threshold_ms
}

/// Run the estimator until `stop` returns true, with the feedback sampler
/// alive beside it. Returns the last emitted estimate, if any.
///
/// The feedback channel carries motor-current telemetry; losing it means
/// the actuator state is unknown, so a persistent stall aborts the run.
pub fn run<H, A, P>(
    halls: H,
    feedback: A,
    sink: P,
    cfg: &Config,
    trigger_rx: crossbeam_channel::Receiver<()>,
    stop: impl Fn() -> bool,
    start_in_calibration: bool,
) -> CoreResult<Option<f32>>
where
    H: HallArray + 'static,
    A: FeedbackAdc + Send + 'static,
    P: PositionSink + 'static,
{
    let feedback_period_ms = crate::util::period_ms(cfg.control.feedback_hz);
    let threshold_ms = stall_threshold_ms(cfg.timeouts.sensor_ms, feedback_period_ms);
    let sampler_timeout = Duration::from_millis(cfg.timeouts.sensor_ms);
    let sampler = FeedbackSampler::spawn(
        feedback,
        cfg.control.feedback_hz,
        sampler_timeout,
        MonotonicClock::new(),
    );

    let mut estimator = crate::build_estimator(
        halls,
        sink,
        cfg,
        Some(trigger_rx),
        None,
        start_in_calibration,
    )?;

    tracing::info!(
        loop_hz = cfg.control.loop_hz,
        feedback_hz = cfg.control.feedback_hz,
        "estimator loop start"
    );

    let start = std::time::Instant::now();
    loop {
        if stop() {
            tracing::info!(
                overruns = estimator.overruns(),
                last_estimate = estimator.last_estimate(),
                "estimator loop stopping"
            );
            return Ok(estimator.last_estimate());
        }

        let elapsed_ms: u64 = {
            let ms = start.elapsed().as_millis();
            (ms.min(u128::from(u64::MAX))) as u64
        };
        let stalled_ms = sampler.stalled_for_now();
        if stalled_now(elapsed_ms, stalled_ms, threshold_ms) {
            tracing::error!(stalled_ms, threshold_ms, "feedback sampler stalled");
            return Err(crate::error::Report::new(EstimatorError::Timeout));
        }

        match estimator.step()? {
            ControlStatus::Standby | ControlStatus::Calibrating { .. } => {}
            ControlStatus::Calibrated { classes } => {
                tracing::info!(classes, "calibration complete");
            }
            ControlStatus::Motoring {
                label,
                confidence,
                estimate,
            } => {
                // The feedback pair rides along as telemetry only; the
                // motor collaborator consumes it out of band.
                if let Some(fb) = sampler.latest() {
                    tracing::trace!(
                        label,
                        confidence,
                        estimate,
                        pot = fb.position,
                        current = fb.current,
                        "estimate emitted"
                    );
                }
            }
        }
    }
}
