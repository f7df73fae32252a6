mod cli;
mod error_fmt;
mod run;

use clap::Parser;
use cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use eyre::WrapErr;
use grip_config::Config;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_CONFIG: &str = "etc/grip_config.toml";

fn main() {
    if let Err(err) = try_main() {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", error_fmt::format_error_json(&err));
        } else {
            eprintln!("{}", error_fmt::humanize(&err));
        }
        std::process::exit(error_fmt::exit_code_for_error(&err));
    }
}

fn try_main() -> eyre::Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();
    let _ = JSON_MODE.set(args.json);

    let mut cfg = load_config(&args.config)?;
    init_tracing(args.json, &args.log_level, cfg.logging.file.as_deref());

    match args.cmd {
        Commands::CheckConfig => {
            if args.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "event": "config_ok",
                        "positions": cfg.sweep.samples_per_interval,
                        "sweeps": cfg.sweep.intervals,
                        "k": cfg.classifier.k,
                        "loop_hz": cfg.control.loop_hz,
                    })
                );
            } else {
                println!(
                    "config ok: {} positions x {} sweeps, k={}, loop {} Hz",
                    cfg.sweep.samples_per_interval,
                    cfg.sweep.intervals,
                    cfg.classifier.k,
                    cfg.control.loop_hz
                );
            }
            Ok(())
        }
        Commands::SelfCheck => self_check(&cfg),
        Commands::Run {
            duration_s,
            auto_trigger_ms,
            start_in_calibration,
            loop_hz,
        } => {
            if let Some(hz) = loop_hz {
                cfg.control.loop_hz = hz;
                cfg.validate().wrap_err("applying --loop-hz override")?;
            }

            let shutdown = Arc::new(AtomicBool::new(false));
            let s = shutdown.clone();
            ctrlc::set_handler(move || s.store(true, Ordering::Relaxed))
                .wrap_err("installing Ctrl-C handler")?;

            let final_estimate =
                run::run_estimator(&cfg, duration_s, auto_trigger_ms, start_in_calibration, shutdown)?;

            if args.json {
                println!(
                    "{}",
                    serde_json::json!({ "event": "run_complete", "final_estimate": final_estimate })
                );
            } else {
                match final_estimate {
                    Some(e) => println!("run complete; final estimate {e:.3}"),
                    None => println!("run complete; no estimate emitted"),
                }
            }
            Ok(())
        }
    }
}

/// Read, parse, and validate the config. A missing file at the built-in
/// default path falls back to compiled-in defaults; a missing file at an
/// explicit path is an error.
fn load_config(path: &Path) -> eyre::Result<Config> {
    if path.exists() {
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("reading config {}", path.display()))?;
        let cfg = grip_config::load_toml(&text)
            .wrap_err_with(|| format!("parsing config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    } else if path == Path::new(DEFAULT_CONFIG) {
        Ok(Config::default())
    } else {
        eyre::bail!("config file not found: {}", path.display());
    }
}

/// Console logging to stderr (pretty or JSON lines), plus an optional JSON
/// file sink from `[logging] file`. RUST_LOG overrides --log-level.
fn init_tracing(json_console: bool, level: &str, file: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = file.map(|path| {
        let p = Path::new(path);
        let dir = p.parent().filter(|d| !d.as_os_str().is_empty());
        let name = p
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("grip.log"));
        let appender =
            tracing_appender::rolling::never(dir.unwrap_or_else(|| Path::new(".")), name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        tracing_subscriber::fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(non_blocking)
    });

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    if json_console {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Exercise the sim rig once: one hall frame, one feedback pair.
fn self_check(cfg: &Config) -> eyre::Result<()> {
    use grip_core::mocks::{FixedFeedback, SimulatedDigit};
    use grip_traits::clock::MonotonicClock;
    use grip_traits::{FeedbackAdc, HallArray};

    let timeout = Duration::from_millis(cfg.timeouts.sensor_ms);
    let clock: Arc<dyn grip_traits::Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    let mut halls = SimulatedDigit::new(
        cfg.sweep.samples_per_interval,
        cfg.sweep.interval_duration_ms,
        clock,
    );
    let frame = halls
        .read(timeout)
        .map_err(|e| eyre::eyre!("hall array read failed: {e}"))?;

    let mut feedback = FixedFeedback {
        position: 512,
        current: 40,
    };
    let (pot, current) = feedback
        .read(timeout)
        .map_err(|e| eyre::eyre!("feedback read failed: {e}"))?;

    tracing::info!(?frame, pot, current, "self-check readings");
    println!("self-check ok");
    Ok(())
}
