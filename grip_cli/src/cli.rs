//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "grip", version, about = "Hall-array position estimator CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/grip_config.toml")]
    pub config: PathBuf,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the estimator against the simulated digit
    Run {
        /// Stop automatically after this many seconds (default: run until Ctrl-C)
        #[arg(long, value_name = "SECS")]
        duration_s: Option<u64>,

        /// Fire the calibration trigger after this many milliseconds
        #[arg(long, value_name = "MS")]
        auto_trigger_ms: Option<u64>,

        /// Skip Standby and begin the calibration sweep immediately
        #[arg(long, action = ArgAction::SetTrue)]
        start_in_calibration: bool,

        /// Override control loop rate in Hz (takes precedence over config)
        #[arg(long, value_name = "HZ")]
        loop_hz: Option<u32>,
    },
    /// Parse and validate the config, then exit
    CheckConfig,
    /// Quick health check (sim rig produces a hall frame and a feedback pair)
    SelfCheck,
}
