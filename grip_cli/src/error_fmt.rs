//! Human-readable error descriptions and structured JSON error formatting.

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use grip_core::error::{BuildError, EstimatorError};

    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingHalls => {
                "What happened: No hall array was provided to the estimator.\nLikely causes: The sensor rig failed to initialize or was not wired into the builder.\nHow to fix: Ensure the hall array is created successfully and passed via with_halls(...).".to_string()
            }
            BuildError::MissingSink => {
                "What happened: No position sink was provided to the estimator.\nLikely causes: The motor interface failed to initialize or was not wired into the builder.\nHow to fix: Ensure the sink is created successfully and passed via with_sink(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See README for a sample."
            ),
        };
    }

    if let Some(ee) = err.downcast_ref::<EstimatorError>() {
        return match ee {
            EstimatorError::Timeout => {
                "What happened: The motor feedback channel stalled.\nLikely causes: Feedback ADC not responding, wiring fault, or timeout configured too low.\nHow to fix: Check the feedback wiring and consider raising timeouts.sensor_ms in the config.".to_string()
            }
            EstimatorError::Sensor(msg) => format!(
                "What happened: A hall sensor read failed ({msg}).\nLikely causes: Sensor array disconnected or bus fault.\nHow to fix: Check the sensor wiring and power, then rerun."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("config") && (lower.contains("not found") || lower.contains("no such file")) {
        return format!(
            "What happened: {msg}.\nLikely causes: Wrong --config path or missing file.\nHow to fix: Pass --config <FILE> pointing at a valid TOML config."
        );
    }

    if lower.contains("must be") || lower.contains("must not") || lower.contains("must allow") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Map typed errors to stable exit codes; everything else returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    use grip_core::error::EstimatorError;
    if let Some(ee) = err.downcast_ref::<EstimatorError>() {
        return match ee {
            EstimatorError::Timeout => 3,
            EstimatorError::Sensor(_) => 4,
            EstimatorError::Sink(_) => 5,
            EstimatorError::State(_) => 6,
        };
    }
    1
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use grip_core::error::EstimatorError;
    use serde_json::json;

    let reason = match err.downcast_ref::<EstimatorError>() {
        Some(EstimatorError::Timeout) => "FeedbackStall",
        Some(EstimatorError::Sensor(_)) => "SensorRead",
        Some(EstimatorError::Sink(_)) => "PositionSink",
        Some(EstimatorError::State(_)) => "InvalidState",
        None => "Error",
    };
    json!({ "reason": reason, "message": humanize(err) }).to_string()
}
