//! Calibration sweep aggregation.
//!
//! A calibration run is `intervals` back-and-forth traversals of the digit's
//! range, `samples_per_interval` positions each. Samples are bucketed by
//! physical position (odd traversals run in reverse index order) and
//! accumulated as running means pre-divided by `intervals`, so no raw sample
//! storage is needed and each bucket converges to an averaged vector.

use grip_config::SweepCfg;
use grip_traits::SENSOR_COUNT;

/// One labeled training vector per sweep position, in raw ADC counts.
///
/// Immutable once produced; classifier training consumes it by reference.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    buckets: Vec<[f32; SENSOR_COUNT]>,
}

impl TrainingSet {
    /// Number of discrete positions (= classifier classes).
    pub fn positions(&self) -> usize {
        self.buckets.len()
    }

    pub fn bucket(&self, index: usize) -> Option<&[f32; SENSOR_COUNT]> {
        self.buckets.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f32; SENSOR_COUNT]> {
        self.buckets.iter()
    }

    /// Build a training set directly from bucket vectors. Intended for tests
    /// and offline tooling; live runs go through `SweepAggregator`.
    pub fn from_buckets(buckets: Vec<[f32; SENSOR_COUNT]>) -> Self {
        Self { buckets }
    }
}

/// Progress record for one accepted calibration sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSample {
    /// Running sample counter over the whole run, 0-based.
    pub index: u32,
    /// Physical position bucket the sample landed in.
    pub position: u32,
    /// Whether the sweep was traversing in the opening direction.
    pub opening: bool,
}

/// Accumulates a timed physical sweep into a `TrainingSet`.
#[derive(Debug)]
pub struct SweepAggregator {
    cfg: SweepCfg,
    sums: Vec<[f32; SENSOR_COUNT]>,
    taken: u32,
    last_sample_ms: Option<u64>,
}

impl SweepAggregator {
    pub fn new(cfg: SweepCfg) -> Self {
        let positions = cfg.samples_per_interval.max(1) as usize;
        Self {
            cfg,
            sums: vec![[0.0; SENSOR_COUNT]; positions],
            taken: 0,
            last_sample_ms: None,
        }
    }

    /// Whether sample `i` belongs to an opening (even) traversal.
    #[inline]
    pub fn is_opening(i: u32, samples_per_interval: u32) -> bool {
        (i / samples_per_interval.max(1)) % 2 == 0
    }

    /// Bucket index for running sample `i`: forward while opening, reversed
    /// while closing, so the index always matches true physical position.
    #[inline]
    pub fn bucket_index(i: u32, samples_per_interval: u32) -> u32 {
        let spi = samples_per_interval.max(1);
        if Self::is_opening(i, spi) {
            i % spi
        } else {
            (spi - 1) - i % spi
        }
    }

    /// Number of samples accepted so far.
    pub fn accepted(&self) -> u32 {
        self.taken
    }

    /// Total samples a complete run needs.
    pub fn total(&self) -> u32 {
        self.cfg.total_samples()
    }

    pub fn is_complete(&self) -> bool {
        self.taken >= self.cfg.total_samples()
    }

    /// Milliseconds until the next sample is due at `now_ms`; zero when an
    /// offer would be accepted immediately. Lets the polling loop align its
    /// sleep with the sample schedule instead of quantizing it to the loop
    /// period.
    pub fn due_in_ms(&self, now_ms: u64) -> u64 {
        match self.last_sample_ms {
            Some(last) => (last + self.cfg.time_per_sample_ms()).saturating_sub(now_ms),
            None => 0,
        }
    }

    /// Offer a sensor reading at `now_ms`. Returns `Some` when the reading
    /// was accepted into a bucket, `None` when rate-limited or already
    /// complete. Rate limiting guards against over-sampling when the polling
    /// loop runs faster than `time_per_sample`.
    pub fn offer(&mut self, now_ms: u64, reading: &[u16; SENSOR_COUNT]) -> Option<SweepSample> {
        if self.is_complete() {
            return None;
        }
        let pace = self.cfg.time_per_sample_ms();
        if let Some(last) = self.last_sample_ms
            && now_ms.saturating_sub(last) < pace
        {
            return None;
        }
        self.last_sample_ms = Some(now_ms);

        let spi = self.cfg.samples_per_interval;
        let i = self.taken;
        let opening = Self::is_opening(i, spi);
        let position = Self::bucket_index(i, spi);

        // Running mean: each reading enters pre-divided by the number of
        // traversals that will visit this bucket.
        let divisor = self.cfg.intervals.max(1) as f32;
        let bucket = &mut self.sums[position as usize];
        for (sum, raw) in bucket.iter_mut().zip(reading.iter()) {
            *sum += f32::from(*raw) / divisor;
        }

        self.taken += 1;
        tracing::trace!(
            index = i,
            position,
            opening,
            accepted = self.taken,
            total = self.total(),
            "calibration sample accepted"
        );
        Some(SweepSample {
            index: i,
            position,
            opening,
        })
    }

    /// Finalize the run. Buckets never visited (operator stopped short)
    /// retain their zero or partial accumulation; this is an accepted
    /// quality risk, not an error.
    pub fn finish(self) -> TrainingSet {
        if !self.is_complete() {
            tracing::warn!(
                accepted = self.taken,
                total = self.cfg.total_samples(),
                "finalizing incomplete calibration sweep"
            );
        }
        TrainingSet {
            buckets: self.sums,
        }
    }
}
