//! Status returned from each control-loop iteration.

use crate::sweep::SweepSample;

/// Public outcome of a single `Estimator::step` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlStatus {
    /// Waiting for the calibration trigger.
    Standby,
    /// Sweep in progress; `sample` is Some when this step accepted one
    /// (None means the step was rate-limited).
    Calibrating {
        accepted: u32,
        total: u32,
        sample: Option<SweepSample>,
    },
    /// Sweep finished and the classifier was trained this step. Returned
    /// exactly once per calibration run.
    Calibrated { classes: usize },
    /// Estimate computed and emitted to the position sink.
    Motoring {
        label: usize,
        confidence: f32,
        estimate: f32,
    },
}
