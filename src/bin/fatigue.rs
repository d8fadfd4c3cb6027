//! Fatigue CLI - Command-line interface for the fatigue monitor
//!
//! Commands:
//! - run: Process a stream of NDJSON frames (file or stdin)
//! - config: Print the default configuration
//! - doctor: Diagnose configuration and baselines files

use clap::{ArgAction, Parser, Subcommand};
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use fatigue_monitor::{
    AlertSink, CalibratedBaselines, DetachedAlert, FatigueMonitor, FrameInput, MonitorConfig,
    MonitorError, SessionLog, TerminalBell, MONITOR_VERSION, PRODUCER_NAME,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Fatigue - blink, long-blink and yawn detection over aspect-ratio streams
#[derive(Parser)]
#[command(name = "fatigue")]
#[command(version = MONITOR_VERSION)]
#[command(about = "Detect drowsiness from eye and mouth aspect ratios", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process NDJSON frames ({"t": .., "ear": .., "mar": ..}) and emit one result per frame
    Run {
        /// Input file path (omit or use - for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Monitor configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Load baselines from file and skip calibration
        #[arg(long)]
        load_baselines: Option<PathBuf>,

        /// Save baselines to file on exit
        #[arg(long)]
        save_baselines: Option<PathBuf>,

        /// Write the session log (persisted events) to file on exit
        #[arg(long)]
        session_out: Option<PathBuf>,

        /// Ring the terminal bell when the drowsy alert goes up
        #[arg(long)]
        bell: bool,

        /// Flush output after each record (`--flush false` to buffer)
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        flush: bool,

        /// Only write frames that completed an event
        #[arg(long)]
        events_only: bool,
    },

    /// Print the default configuration as JSON
    Config,

    /// Diagnose configuration and baselines files
    Doctor {
        /// Check a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Check a baselines file
        #[arg(long)]
        baselines: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("fatigue_monitor=info,fatigue=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), FatigueCliError> {
    match cli.command {
        Commands::Run {
            input,
            config,
            load_baselines,
            save_baselines,
            session_out,
            bell,
            flush,
            events_only,
        } => cmd_run(RunOptions {
            input,
            config,
            load_baselines,
            save_baselines,
            session_out,
            bell,
            flush,
            events_only,
        }),

        Commands::Config => cmd_config(),

        Commands::Doctor {
            config,
            baselines,
            json,
        } => cmd_doctor(config.as_deref(), baselines.as_deref(), json),
    }
}

struct RunOptions {
    input: Option<PathBuf>,
    config: Option<PathBuf>,
    load_baselines: Option<PathBuf>,
    save_baselines: Option<PathBuf>,
    session_out: Option<PathBuf>,
    bell: bool,
    flush: bool,
    events_only: bool,
}

fn open_input(input: Option<&Path>) -> Result<Box<dyn BufRead>, FatigueCliError> {
    match input {
        Some(path) if path.to_string_lossy() != "-" => {
            Ok(Box::new(BufReader::new(fs::File::open(path)?)))
        }
        _ => {
            if atty::is(atty::Stream::Stdin) {
                warn!("Reading frames from an interactive terminal; pipe NDJSON into stdin");
            }
            Ok(Box::new(BufReader::new(io::stdin())))
        }
    }
}

fn cmd_run(opts: RunOptions) -> Result<(), FatigueCliError> {
    let config = match opts.config.as_deref() {
        Some(path) => MonitorConfig::from_file(path)?,
        None => MonitorConfig::default(),
    };

    let baselines = match opts.load_baselines.as_deref() {
        Some(path) => Some(CalibratedBaselines::from_json(&fs::read_to_string(path)?)?),
        None => None,
    };

    let reader = open_input(opts.input.as_deref())?;
    let mut stdout = io::stdout();

    // The calibration window is anchored at the first frame's timestamp
    let mut monitor: Option<FatigueMonitor> = None;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let frame: FrameInput = serde_json::from_str(trimmed).map_err(|e| {
            FatigueCliError::ParseError(format!("Failed to parse frame on line {}: {}", index + 1, e))
        })?;

        if monitor.is_none() {
            monitor = Some(build_monitor(&config, baselines, opts.bell, frame.timestamp)?);
        }
        let Some(active) = monitor.as_mut() else {
            continue;
        };

        let result = active.process_frame(&frame);
        if opts.events_only && result.events.is_empty() {
            continue;
        }

        writeln!(stdout, "{}", serde_json::to_string(&result)?)?;
        if opts.flush {
            stdout.flush()?;
        }
    }
    stdout.flush()?;

    let Some(mut monitor) = monitor else {
        return Err(FatigueCliError::NoFrames);
    };

    let counters = monitor.counters();
    info!(
        frames = monitor.frames_processed(),
        normal = counters.normal_count,
        long = counters.long_count,
        yawns = counters.yawn_count,
        "Stream finished"
    );

    // Save baselines if requested
    if let Some(path) = opts.save_baselines.as_deref() {
        fs::write(path, monitor.save_baselines()?)?;
    }

    monitor.store_mut().end_session();
    if let Some(path) = opts.session_out.as_deref() {
        fs::write(path, monitor.store().to_json_pretty()?)?;
    }

    Ok(())
}

fn build_monitor(
    config: &MonitorConfig,
    baselines: Option<CalibratedBaselines>,
    bell: bool,
    started_at: f64,
) -> Result<FatigueMonitor, MonitorError> {
    let monitor = match baselines {
        Some(baselines) => FatigueMonitor::with_baselines(
            config.clone(),
            baselines,
            SessionLog::with_session(),
            started_at,
        )?,
        None => FatigueMonitor::new(config.clone(), started_at)?,
    };

    if bell {
        let sink: Box<dyn AlertSink + Send> = Box::new(DetachedAlert::new(TerminalBell));
        Ok(monitor.with_alert_sink(sink))
    } else {
        Ok(monitor)
    }
}

fn cmd_config() -> Result<(), FatigueCliError> {
    println!("{}", MonitorConfig::default().to_json_pretty()?);
    Ok(())
}

fn cmd_doctor(
    config: Option<&Path>,
    baselines: Option<&Path>,
    json: bool,
) -> Result<(), FatigueCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck::ok(
        "monitor_version",
        format!("Fatigue monitor version {}", MONITOR_VERSION),
    ));

    match config {
        Some(path) if !path.exists() => {
            checks.push(DoctorCheck::warning("config", "Config file does not exist"));
        }
        Some(path) => {
            let check = match MonitorConfig::from_file(path) {
                Ok(c) => DoctorCheck::ok(
                    "config",
                    format!(
                        "Config valid (smoothing {} frames, calibration {} s)",
                        c.smoothing_window, c.calibration_secs
                    ),
                ),
                Err(e) => DoctorCheck::error("config", format!("Invalid config: {}", e)),
            };
            checks.push(check);
        }
        None => checks.push(DoctorCheck::ok("config", "Using default configuration")),
    }

    if let Some(path) = baselines {
        if path.exists() {
            let loaded = fs::read_to_string(path)
                .map_err(MonitorError::from)
                .and_then(|content| CalibratedBaselines::from_json(&content));
            let check = match loaded {
                Ok(b) => DoctorCheck::ok(
                    "baselines",
                    format!(
                        "Baselines valid (eye threshold {:.3}, mouth reference {:.3})",
                        b.eye.closed_threshold, b.mouth.open_reference
                    ),
                ),
                Err(e) => DoctorCheck::error("baselines", format!("Invalid baselines: {}", e)),
            };
            checks.push(check);
        } else {
            checks.push(DoctorCheck::warning("baselines", "Baselines file does not exist"));
        }
    }

    // Check stdin is available (for streaming mode)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck::ok("stdin", "stdin is a TTY (interactive mode)")
    } else {
        DoctorCheck::ok("stdin", "stdin is a pipe (streaming mode ready)")
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: MONITOR_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Fatigue Doctor Report");
        println!("=====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(FatigueCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum FatigueCliError {
    Io(io::Error),
    Monitor(MonitorError),
    Json(serde_json::Error),
    NoFrames,
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for FatigueCliError {
    fn from(e: io::Error) -> Self {
        FatigueCliError::Io(e)
    }
}

impl From<MonitorError> for FatigueCliError {
    fn from(e: MonitorError) -> Self {
        FatigueCliError::Monitor(e)
    }
}

impl From<serde_json::Error> for FatigueCliError {
    fn from(e: serde_json::Error) -> Self {
        FatigueCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<FatigueCliError> for CliError {
    fn from(e: FatigueCliError) -> Self {
        match e {
            FatigueCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            FatigueCliError::Monitor(MonitorError::InvalidConfig(msg)) => CliError {
                code: "INVALID_CONFIG".to_string(),
                message: msg,
                hint: Some("Run 'fatigue config' for a valid starting point".to_string()),
            },
            FatigueCliError::Monitor(MonitorError::InvalidBaseline(msg)) => CliError {
                code: "INVALID_BASELINE".to_string(),
                message: msg,
                hint: Some("Run 'fatigue doctor --baselines <file>' for details".to_string()),
            },
            FatigueCliError::Monitor(e) => CliError {
                code: "MONITOR_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            FatigueCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            FatigueCliError::NoFrames => CliError {
                code: "NO_FRAMES".to_string(),
                message: "No frames found in input".to_string(),
                hint: Some("Ensure input is not empty".to_string()),
            },
            FatigueCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            FatigueCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some(r#"Each line must look like {"t": 1.25, "ear": 0.31, "mar": 0.18}"#.to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

impl DoctorCheck {
    fn ok(name: &str, message: impl Into<String>) -> Self {
        Self::with_status(name, CheckStatus::Ok, message)
    }

    fn warning(name: &str, message: impl Into<String>) -> Self {
        Self::with_status(name, CheckStatus::Warning, message)
    }

    fn error(name: &str, message: impl Into<String>) -> Self {
        Self::with_status(name, CheckStatus::Error, message)
    }

    fn with_status(name: &str, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
        }
    }
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_run(args: &[&str]) -> (bool, bool) {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Run {
                flush, events_only, ..
            } => (flush, events_only),
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_flush_defaults_on() {
        assert_eq!(parse_run(&["fatigue", "run"]), (true, false));
    }

    #[test]
    fn test_flush_can_be_disabled() {
        assert_eq!(parse_run(&["fatigue", "run", "--flush", "false"]), (false, false));
        assert_eq!(
            parse_run(&["fatigue", "run", "--flush", "true", "--events-only"]),
            (true, true)
        );
    }

    #[test]
    fn test_doctor_rejects_invalid_config_file() {
        let path = std::env::temp_dir().join(format!("fatigue-doctor-{}.json", std::process::id()));
        fs::write(&path, r#"{"eye": {"closed_ratio": 0.4, "drowsy_ratio": 0.6}}"#).unwrap();

        let result = cmd_doctor(Some(&path), None, true);
        let _ = fs::remove_file(&path);
        assert!(matches!(result, Err(FatigueCliError::DoctorFailed)));
    }
}
