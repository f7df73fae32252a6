//! High-rate feedback sampling.
//!
//! Spawns a thread that owns the `FeedbackAdc` and publishes the latest
//! (position, current) pair into a single atomic word. The control loop
//! reads the most recent complete sample; last write wins, no queuing, and
//! a reader can never observe a pair mixing two acquisitions. Staleness is
//! bounded by one sampling period.
//!
//! Safety: Each `FeedbackSampler` spawns exactly one thread that is
//! automatically shut down when the sampler is dropped.
use grip_traits::FeedbackAdc;
use grip_traits::clock::Clock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Most recent interrupt-style acquisition: potentiometer + motor current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    pub position: u16,
    pub current: u16,
}

// Both readings fit in the low 32 bits; bit 63 marks "a sample exists" so an
// all-zero reading is distinguishable from the empty slot.
const VALID: u64 = 1 << 63;

#[inline]
fn pack(s: RawSample) -> u64 {
    VALID | (u64::from(s.position) << 16) | u64::from(s.current)
}

#[inline]
fn unpack(word: u64) -> Option<RawSample> {
    if word & VALID == 0 {
        return None;
    }
    Some(RawSample {
        position: ((word >> 16) & 0xFFFF) as u16,
        current: (word & 0xFFFF) as u16,
    })
}

/// Atomically-swappable sample slot shared between the sampler thread and
/// the polling loop. A single 64-bit store/load replaces the critical
/// section the reference design used, with the same no-tearing guarantee.
#[derive(Debug, Default)]
pub struct SampleSlot(AtomicU64);

impl SampleSlot {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    #[inline]
    pub fn store(&self, s: RawSample) {
        self.0.store(pack(s), Ordering::Release);
    }

    #[inline]
    pub fn load(&self) -> Option<RawSample> {
        unpack(self.0.load(Ordering::Acquire))
    }
}

pub struct FeedbackSampler {
    slot: Arc<SampleSlot>,
    last_ok: Arc<AtomicU64>,
    epoch: Instant,
    /// Shutdown flag for immediate response (atomic for lock-free check)
    shutdown: Arc<AtomicBool>,
    /// Join handle for graceful thread cleanup
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl FeedbackSampler {
    /// Spawn a rate-paced sampler at `hz`. The per-tick path performs one
    /// read, one atomic store, and one timestamp store: no allocation, no
    /// locking, no logging.
    pub fn spawn<A: FeedbackAdc + Send + 'static, C: Clock + Send + Sync + 'static>(
        mut adc: A,
        hz: u32,
        timeout: Duration,
        clock: C,
    ) -> Self {
        let slot = Arc::new(SampleSlot::new());
        let slot_clone = slot.clone();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let last_ok = Arc::new(AtomicU64::new(0));
        let last_ok_clone = last_ok.clone();
        let period = Duration::from_micros(crate::util::period_us(hz));
        let epoch = clock.now();

        let join_handle = std::thread::spawn(move || {
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }

                match adc.read(timeout) {
                    Ok((position, current)) => {
                        slot_clone.store(RawSample { position, current });
                        let now = clock.ms_since(epoch);
                        last_ok_clone.store(now, Ordering::Relaxed);
                    }
                    Err(_) => {
                        // Transient failure: keep the previous sample; the
                        // consumer's stall watchdog covers persistent loss.
                    }
                }

                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                clock.sleep(period);
            }
            tracing::trace!("feedback sampler thread exiting cleanly");
        });

        Self {
            slot,
            last_ok,
            epoch,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Latest complete sample, if any acquisition has succeeded yet.
    pub fn latest(&self) -> Option<RawSample> {
        self.slot.load()
    }

    /// Milliseconds since the last successful acquisition, given `now_ms`
    /// measured from this sampler's epoch.
    pub fn stalled_for(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_ok.load(Ordering::Relaxed))
    }

    /// Convenience helper: compute stall using this sampler's epoch and a
    /// real monotonic clock.
    pub fn stalled_for_now(&self) -> u64 {
        let now_ms = {
            let dur = Instant::now().saturating_duration_since(self.epoch);
            let ms = dur.as_millis();
            (ms.min(u128::from(u64::MAX))) as u64
        };
        now_ms.saturating_sub(self.last_ok.load(Ordering::Relaxed))
    }
}

impl Drop for FeedbackSampler {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        // The thread exits either between reads (flag check) or after the
        // in-flight adc.read() completes, bounded by the sensor timeout.
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => {
                    tracing::trace!("feedback sampler thread joined successfully");
                }
                Err(e) => {
                    // Thread panicked; log but don't propagate (we're in Drop)
                    tracing::warn!(?e, "feedback sampler thread panicked during shutdown");
                }
            }
        }
    }
}
