//! Estimator execution: rig assembly and loop orchestration.

use grip_config::Config;
use grip_core::error::Result as CoreResult;
use grip_core::mocks::{FixedFeedback, SimulatedDigit};
use grip_traits::PositionSink;
use grip_traits::clock::MonotonicClock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Sink that logs each estimate; stands in for the motor position loop.
pub struct LoggingSink;

impl PositionSink for LoggingSink {
    fn set_target(
        &mut self,
        position: f32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::debug!(position, "position target updated");
        Ok(())
    }
}

/// Assemble the simulated rig and run the estimator until the duration
/// elapses or `shutdown` is set. Returns the last emitted estimate.
pub fn run_estimator(
    cfg: &Config,
    duration_s: Option<u64>,
    auto_trigger_ms: Option<u64>,
    start_in_calibration: bool,
    shutdown: Arc<AtomicBool>,
) -> CoreResult<Option<f32>> {
    let clock: Arc<dyn grip_traits::Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    // The simulated digit sweeps through as many distinct positions as the
    // calibration expects, with the same traversal period.
    let halls = SimulatedDigit::new(
        cfg.sweep.samples_per_interval,
        cfg.sweep.interval_duration_ms,
        clock,
    );
    let feedback = FixedFeedback {
        position: 512,
        current: 40,
    };

    let (trigger_tx, trigger_rx) = crossbeam_channel::unbounded();
    if let Some(ms) = auto_trigger_ms {
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(ms));
            if trigger_tx.send(()).is_ok() {
                tracing::info!(delay_ms = ms, "auto calibration trigger fired");
            }
        });
    }

    let deadline = duration_s.map(|s| Instant::now() + Duration::from_secs(s));
    let stop = move || {
        shutdown.load(Ordering::Relaxed) || deadline.is_some_and(|d| Instant::now() >= d)
    };

    grip_core::runner::run(
        halls,
        feedback,
        LoggingSink,
        cfg,
        trigger_rx,
        stop,
        start_in_calibration,
    )
}
