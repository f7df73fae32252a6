//! K-nearest-neighbor position classifier over voltage space.
//!
//! One training example per sweep bucket, labeled by bucket index. Trained
//! exactly once per calibration run and read-only afterward; sensor drift
//! after training degrades classification silently (known limitation of the
//! approach, handled upstream by re-triggering calibration).

use crate::adc::AdcTransform;
use crate::sweep::TrainingSet;
use grip_traits::SENSOR_COUNT;

/// A discrete position label plus neighbor-agreement confidence in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub label: usize,
    pub confidence: f32,
}

/// KNN model over 6-dimensional voltage vectors.
#[derive(Debug, Clone)]
pub struct KnnModel {
    examples: Vec<[f32; SENSOR_COUNT]>,
    k: usize,
}

impl KnnModel {
    /// Train from a finalized sweep: each bucket mean is converted from ADC
    /// counts to volts and becomes the single example for its label.
    pub fn train(set: &TrainingSet, adc: &AdcTransform, k: usize) -> Self {
        let examples: Vec<[f32; SENSOR_COUNT]> = set
            .iter()
            .map(|bucket| {
                let mut v = [0.0f32; SENSOR_COUNT];
                for (o, raw) in v.iter_mut().zip(bucket.iter()) {
                    *o = adc.to_volts(*raw);
                }
                v
            })
            .collect();
        let k = k.clamp(1, examples.len().max(1));
        Self { examples, k }
    }

    /// Number of classes (= training examples).
    pub fn classes(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Classify a live voltage vector by majority vote among the k nearest
    /// examples. Confidence is the winning vote share. Ties resolve toward
    /// the closer neighbor because candidates are scanned in distance order.
    pub fn classify(&self, input: &[f32; SENSOR_COUNT]) -> Classification {
        debug_assert!(!self.examples.is_empty(), "classify on untrained model");
        if self.examples.is_empty() {
            return Classification {
                label: 0,
                confidence: 0.0,
            };
        }

        // Squared distances preserve the nearest-neighbor ordering.
        let mut order: Vec<usize> = (0..self.examples.len()).collect();
        let dist = |idx: usize| -> f32 {
            self.examples[idx]
                .iter()
                .zip(input.iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum()
        };
        order.sort_unstable_by(|&a, &b| dist(a).total_cmp(&dist(b)));

        let k = self.k.min(order.len());
        let mut best_label = order[0];
        let mut best_votes = 0u32;
        for &candidate in order.iter().take(k) {
            let votes = order
                .iter()
                .take(k)
                .filter(|&&n| n == candidate)
                .count() as u32;
            if votes > best_votes {
                best_votes = votes;
                best_label = candidate;
            }
        }
        Classification {
            label: best_label,
            confidence: best_votes as f32 / k as f32,
        }
    }
}
