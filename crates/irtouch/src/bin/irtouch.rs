use clap::{Args, Parser, Subcommand};
use irtouch::core::CalibrationIoError;
use irtouch::provider::BundleSequencer;
use irtouch::{replay, CalibrationData, ConfigIoError, ProviderConfig, ReplayError, ReplayScript};
use nalgebra::Point2;
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "irtouch", version, about = "IR touch sensor tools")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON (requires the `tracing` feature).
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play recorded sensor reports through a provider and print each frame
    /// as a JSON line.
    Replay(ReplayArgs),
    /// Map one raw sensor point through a stored calibration.
    Warp(WarpArgs),
    /// Write a default provider config.
    InitConfig {
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Args, Debug)]
struct ReplayArgs {
    /// Replay script (JSON).
    #[arg(long)]
    reports: PathBuf,
    /// Provider config (JSON). Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Calibration to apply, overriding the config.
    #[arg(long)]
    calibration: Option<PathBuf>,
    /// Print transport bundles instead of frames.
    #[arg(long)]
    bundles: bool,
}

#[derive(Args, Debug)]
struct WarpArgs {
    #[arg(long)]
    calibration: PathBuf,
    x: f64,
    y: f64,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("config: {0}")]
    Config(#[from] ConfigIoError),
    #[error("calibration: {0}")]
    Calibration(#[from] CalibrationIoError),
    #[error(transparent)]
    Replay(#[from] ReplayError),
    #[error(transparent)]
    Warp(#[from] irtouch::core::WarpError),
}

#[derive(Serialize)]
struct WarpedPoint {
    x: f64,
    y: f64,
    normalized: Point2<f64>,
}

fn init_logging(verbose: u8, json: bool) {
    #[cfg(feature = "tracing")]
    {
        let _ = verbose;
        irtouch::core::init_tracing(json);
        let _ = tracing_log::LogTracer::init();
    }
    #[cfg(not(feature = "tracing"))]
    {
        let level = match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        if json {
            eprintln!("--log-json needs the `tracing` feature; using plain logs");
        }
        let _ = irtouch::core::init_with_level(level);
    }
}

fn run_replay(args: ReplayArgs) -> Result<(), CliError> {
    let config = match &args.config {
        Some(path) => ProviderConfig::load_json(path)?,
        None => ProviderConfig::default(),
    };
    let calibration = args
        .calibration
        .as_ref()
        .map(CalibrationData::load_json)
        .transpose()?;
    let script = ReplayScript::load_json(&args.reports)?;

    let out = replay(&config, calibration.as_ref(), script)?;
    for diagnostic in &out.diagnostics {
        log::warn!("{diagnostic:?}");
    }

    let stdout = io::stdout();
    let mut w = stdout.lock();
    if args.bundles {
        let mut sequencer = BundleSequencer::new();
        for frame in &out.frames {
            serde_json::to_writer(&mut w, &sequencer.bundle(frame))?;
            writeln!(w)?;
        }
    } else {
        for frame in &out.frames {
            serde_json::to_writer(&mut w, frame)?;
            writeln!(w)?;
        }
    }
    Ok(())
}

fn run_warp(args: WarpArgs) -> Result<(), CliError> {
    let data = CalibrationData::load_json(&args.calibration)?;
    let mut warper = data.warper()?;
    let p = warper.warp(Point2::new(args.x, args.y))?;
    let out = WarpedPoint {
        x: p.x,
        y: p.y,
        normalized: data.screen_size().normalize(p),
    };
    println!("{}", serde_json::to_string(&out)?);
    Ok(())
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Replay(args) => run_replay(args),
        Command::Warp(args) => run_warp(args),
        Command::InitConfig { out } => {
            ProviderConfig::default().write_json(&out)?;
            log::info!("wrote default config to {}", out.display());
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
