//! Scalar recursive filter turning the classifier's discrete label stream
//! into a continuous low-jitter position estimate.
//!
//! Update rule per measurement:
//!   gain = e_est / (e_est + e_mea)
//!   estimate += gain * (measurement - estimate)
//!   e_est = (1 - gain) * e_est + |Δestimate| * q
//!
//! The error covariance is carried across calls within a session and only
//! reset on re-calibration.

use grip_config::SmootherCfg;

#[derive(Debug, Clone)]
pub struct ScalarKalman {
    err_measure: f32,
    err_estimate: f32,
    process_noise: f32,
    last_estimate: f32,
    initial_err_estimate: f32,
}

impl ScalarKalman {
    pub fn new(measurement_error: f32, estimate_error: f32, process_noise: f32) -> Self {
        Self {
            err_measure: measurement_error,
            err_estimate: estimate_error,
            process_noise,
            last_estimate: 0.0,
            initial_err_estimate: estimate_error,
        }
    }

    pub fn from_cfg(cfg: &SmootherCfg) -> Self {
        Self::new(cfg.measurement_error, cfg.estimate_error, cfg.process_noise)
    }

    /// Current estimate without feeding a new measurement.
    pub fn estimate(&self) -> f32 {
        self.last_estimate
    }

    /// Feed one noisy measurement; returns the updated estimate.
    pub fn update(&mut self, measurement: f32) -> f32 {
        self.update_with_noise(measurement, self.err_measure)
    }

    /// Feed one measurement whose trustworthiness is scaled by classifier
    /// confidence in (0, 1]: lower confidence inflates the effective
    /// measurement noise, so uncertain labels move the estimate less.
    pub fn update_weighted(&mut self, measurement: f32, confidence: f32, min_confidence: f32) -> f32 {
        let floor = min_confidence.clamp(f32::EPSILON, 1.0);
        let conf = if confidence.is_finite() {
            confidence.clamp(floor, 1.0)
        } else {
            floor
        };
        self.update_with_noise(measurement, self.err_measure / conf)
    }

    fn update_with_noise(&mut self, measurement: f32, err_measure: f32) -> f32 {
        let gain = self.err_estimate / (self.err_estimate + err_measure);
        let current = self.last_estimate + gain * (measurement - self.last_estimate);
        self.err_estimate = (1.0 - gain) * self.err_estimate
            + (self.last_estimate - current).abs() * self.process_noise;
        self.last_estimate = current;
        current
    }

    /// Reset estimate and covariance to their initial values. Used when a
    /// re-calibration discards the model.
    pub fn reset(&mut self) {
        self.err_estimate = self.initial_err_estimate;
        self.last_estimate = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_to_constant_input() {
        let mut f = ScalarKalman::new(1.0, 1.0, 0.01);
        let mut est = 0.0;
        for _ in 0..64 {
            est = f.update(40.0);
        }
        assert!((est - 40.0).abs() < 0.5, "estimate {est} far from 40");
    }

    #[test]
    fn single_update_moves_halfway_with_equal_errors() {
        // gain = 1/(1+1) = 0.5 on the first call
        let mut f = ScalarKalman::new(1.0, 1.0, 0.01);
        assert!((f.update(10.0) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn low_confidence_measurement_moves_estimate_less() {
        let mut trusted = ScalarKalman::new(1.0, 1.0, 0.01);
        let mut doubted = ScalarKalman::new(1.0, 1.0, 0.01);
        let a = trusted.update_weighted(10.0, 1.0, 0.1);
        let b = doubted.update_weighted(10.0, 0.2, 0.1);
        assert!(b < a, "low confidence should damp the step: {b} >= {a}");
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut f = ScalarKalman::new(1.0, 2.0, 0.01);
        for _ in 0..10 {
            f.update(33.0);
        }
        f.reset();
        assert_eq!(f.estimate(), 0.0);
        // First post-reset update behaves like a fresh filter
        let step = f.update(10.0);
        assert!((step - 10.0 * (2.0 / 3.0)).abs() < 1e-5);
    }
}
