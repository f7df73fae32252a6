pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Number of hall-effect channels on the digit.
pub const SENSOR_COUNT: usize = 6;

/// Six-channel hall-effect sensor array, read once per control-loop iteration.
///
/// Readings are raw ADC counts; the core converts them to volts before
/// classification.
pub trait HallArray {
    fn read(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<[u16; SENSOR_COUNT], Box<dyn std::error::Error + Send + Sync>>;
}

/// Auxiliary feedback channels (potentiometer + motor current), read by the
/// high-rate sampler thread rather than the control loop.
pub trait FeedbackAdc {
    fn read(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<(u16, u16), Box<dyn std::error::Error + Send + Sync>>;
}

/// Sink for the continuous position estimate, typically a motor controller.
pub trait PositionSink {
    fn set_target(
        &mut self,
        position: f32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

// Boxed trait objects participate in the generic estimator unchanged.
impl<T: HallArray + ?Sized> HallArray for Box<T> {
    fn read(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<[u16; SENSOR_COUNT], Box<dyn std::error::Error + Send + Sync>> {
        (**self).read(timeout)
    }
}

impl<T: FeedbackAdc + ?Sized> FeedbackAdc for Box<T> {
    fn read(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<(u16, u16), Box<dyn std::error::Error + Send + Sync>> {
        (**self).read(timeout)
    }
}

impl<T: PositionSink + ?Sized> PositionSink for Box<T> {
    fn set_target(
        &mut self,
        position: f32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_target(position)
    }
}
