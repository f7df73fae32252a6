//! ADC count → voltage conversion shared by training and classification.

use grip_config::AdcCfg;
use grip_traits::SENSOR_COUNT;

/// Fixed linear transform `volts = raw * vref / resolution`.
///
/// Both calibration buckets and live readings must pass through the same
/// transform so the classifier's distance metric stays consistent.
#[derive(Debug, Clone, Copy)]
pub struct AdcTransform {
    vref: f32,
    resolution: f32,
}

impl AdcTransform {
    pub fn new(cfg: AdcCfg) -> Self {
        Self {
            vref: cfg.vref,
            resolution: f32::from(cfg.resolution.max(1)),
        }
    }

    /// Convert one raw count to volts. Monotonic non-decreasing in `raw`;
    /// returns 0.0 at 0.
    #[inline]
    pub fn to_volts(&self, raw: f32) -> f32 {
        raw * self.vref / self.resolution
    }

    /// Convert a whole sensor vector of raw counts to volts.
    #[inline]
    pub fn vector(&self, raw: &[u16; SENSOR_COUNT]) -> [f32; SENSOR_COUNT] {
        let mut out = [0.0f32; SENSOR_COUNT];
        for (o, r) in out.iter_mut().zip(raw.iter()) {
            *o = self.to_volts(f32::from(*r));
        }
        out
    }
}

impl Default for AdcTransform {
    fn default() -> Self {
        Self::new(AdcCfg::default())
    }
}
