use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum EstimatorError {
    #[error("sensor error: {0}")]
    Sensor(String),
    #[error("position sink error: {0}")]
    Sink(String),
    #[error("timeout waiting for sensor")]
    Timeout,
    #[error("invalid state: {0}")]
    State(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing hall array")]
    MissingHalls,
    #[error("missing position sink")]
    MissingSink,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;

/// Map a boxed trait-object error to a typed EstimatorError. Timeouts are
/// recognized by message so trait implementors need no shared error type.
pub(crate) fn map_sensor_error(e: &(dyn std::error::Error + 'static)) -> EstimatorError {
    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        EstimatorError::Timeout
    } else {
        EstimatorError::Sensor(s)
    }
}
