//! Test and simulation helpers for grip_core.

use grip_traits::{FeedbackAdc, HallArray, PositionSink, SENSOR_COUNT};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Hall array that replays a fixed sequence of readings, then repeats the
/// last frame.
pub struct ScriptedHalls {
    frames: Vec<[u16; SENSOR_COUNT]>,
    idx: usize,
}

impl ScriptedHalls {
    pub fn new(frames: impl Into<Vec<[u16; SENSOR_COUNT]>>) -> Self {
        Self {
            frames: frames.into(),
            idx: 0,
        }
    }

    /// Frames where every channel carries the same value; convenient for
    /// the 1-D style calibration scenarios.
    pub fn uniform(values: impl IntoIterator<Item = u16>) -> Self {
        Self::new(
            values
                .into_iter()
                .map(|v| [v; SENSOR_COUNT])
                .collect::<Vec<_>>(),
        )
    }
}

impl HallArray for ScriptedHalls {
    fn read(
        &mut self,
        _timeout: Duration,
    ) -> Result<[u16; SENSOR_COUNT], Box<dyn std::error::Error + Send + Sync>> {
        let frame = if self.idx < self.frames.len() {
            let f = self.frames[self.idx];
            self.idx += 1;
            f
        } else {
            self.frames.last().copied().unwrap_or([0; SENSOR_COUNT])
        };
        Ok(frame)
    }
}

/// Feedback ADC returning a fixed pair; enough to keep the sampler thread
/// and its stall watchdog exercised in tests and simulation.
pub struct FixedFeedback {
    pub position: u16,
    pub current: u16,
}

impl FeedbackAdc for FixedFeedback {
    fn read(
        &mut self,
        _timeout: Duration,
    ) -> Result<(u16, u16), Box<dyn std::error::Error + Send + Sync>> {
        Ok((self.position, self.current))
    }
}

/// Sink that discards estimates.
#[derive(Default)]
pub struct NullSink;

impl PositionSink for NullSink {
    fn set_target(
        &mut self,
        _position: f32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}

/// Sink that records every emitted estimate for later inspection.
#[derive(Default, Clone)]
pub struct RecordingSink {
    targets: Arc<Mutex<Vec<f32>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn targets(&self) -> Vec<f32> {
        self.targets.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

impl PositionSink for RecordingSink {
    fn set_target(
        &mut self,
        position: f32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Ok(mut g) = self.targets.lock() {
            g.push(position);
        }
        Ok(())
    }
}

/// Simulated digit for the CLI demo: hall readings are a deterministic
/// function of a triangle-wave position signal, so a timed physical sweep
/// can be reproduced without hardware.
pub struct SimulatedDigit {
    positions: u32,
    interval_ms: u64,
    clock: Arc<dyn grip_traits::Clock + Send + Sync>,
    epoch: std::time::Instant,
}

impl SimulatedDigit {
    pub fn new(
        positions: u32,
        interval_ms: u64,
        clock: Arc<dyn grip_traits::Clock + Send + Sync>,
    ) -> Self {
        let epoch = clock.now();
        Self {
            positions: positions.max(2),
            interval_ms: interval_ms.max(1),
            clock,
            epoch,
        }
    }

    /// Continuous position in [0, positions-1] following a back-and-forth
    /// sweep with period `2 * interval_ms`.
    pub fn position_at(&self, now_ms: u64) -> f32 {
        let span = (self.positions - 1) as f32;
        let cycle = self.interval_ms * 2;
        let phase = now_ms % cycle;
        if phase < self.interval_ms {
            span * phase as f32 / self.interval_ms as f32
        } else {
            span * (1.0 - (phase - self.interval_ms) as f32 / self.interval_ms as f32)
        }
    }

    /// Synthetic field profile: each channel sees a bump centered at a
    /// different fraction of the range, so distinct positions map to
    /// distinct 6-vectors.
    pub fn field_at(position: f32, positions: u32) -> [u16; SENSOR_COUNT] {
        let span = (positions.max(2) - 1) as f32;
        let p = position / span;
        let mut out = [0u16; SENSOR_COUNT];
        for (ch, o) in out.iter_mut().enumerate() {
            let center = (ch as f32 + 0.5) / SENSOR_COUNT as f32;
            let d = p - center;
            let bump = (-d * d / 0.02).exp();
            *o = (512.0 + 400.0 * bump) as u16;
        }
        out
    }
}

impl HallArray for SimulatedDigit {
    fn read(
        &mut self,
        _timeout: Duration,
    ) -> Result<[u16; SENSOR_COUNT], Box<dyn std::error::Error + Send + Sync>> {
        let now_ms = self.clock.ms_since(self.epoch);
        Ok(Self::field_at(self.position_at(now_ms), self.positions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_position_reverses_after_one_interval() {
        let clock: Arc<dyn grip_traits::Clock + Send + Sync> =
            Arc::new(grip_traits::clock::TestClock::new());
        let sim = SimulatedDigit::new(5, 100, clock);
        assert_eq!(sim.position_at(0), 0.0);
        assert_eq!(sim.position_at(100), 4.0);
        assert_eq!(sim.position_at(150), 2.0);
        assert_eq!(sim.position_at(200), 0.0);
    }

    #[test]
    fn distinct_positions_have_distinct_fields() {
        let a = SimulatedDigit::field_at(0.0, 8);
        let b = SimulatedDigit::field_at(7.0, 8);
        assert_ne!(a, b);
    }
}
