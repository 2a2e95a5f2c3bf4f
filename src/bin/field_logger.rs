use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use field_logger::calibration::calibrate;
use field_logger::controller::{CycleReport, PollController};
use field_logger::sensor::{SensorSource, SimulatedSource};
use field_logger::storage::{self, MemoryStore, ReadingStore, SqliteStore};
use field_logger::{AppConfig, SensorKind};
use tokio::sync::broadcast::error::TryRecvError;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(
    name = "field_logger",
    about = "Poll soil and air sensors on a Firmata board and log readings"
)]
struct Cli {
    /// JSON config file (missing or invalid files fall back to defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the poll loop and print one JSON line per cycle.
    Run(RunArgs),
    /// Print stored readings from the last hours as JSON lines.
    History(HistoryArgs),
    /// List serial ports that may host the board.
    Ports,
    /// Calibrate one raw sample with the configured constants.
    Calibrate(CalibrateArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Use a simulated board instead of the serial port.
    #[arg(long)]
    simulate: bool,
    /// Seed for the simulated board.
    #[arg(long, requires = "simulate")]
    seed: Option<u64>,
    /// Keep readings in memory instead of the database.
    #[arg(long)]
    in_memory: bool,
    /// Stop after this many cycles (runs until interrupted otherwise).
    #[arg(long)]
    cycles: Option<u64>,
    /// Override the configured poll interval (seconds).
    #[arg(long)]
    interval: Option<u64>,
    /// Override the configured serial port.
    #[arg(long)]
    port: Option<String>,
}

#[derive(Args, Debug)]
struct HistoryArgs {
    /// Window length in hours (defaults to poll.history_hours).
    #[arg(long)]
    hours: Option<i64>,
}

#[derive(Args, Debug)]
struct CalibrateArgs {
    /// soil_moisture, air_temperature, air_flow or air_light.
    #[arg(long)]
    kind: SensorKind,
    /// Raw sample in [0, 1].
    #[arg(long)]
    raw: f64,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("field_logger error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

impl Cli {
    fn execute(self) -> Result<()> {
        let config = match &self.config {
            Some(path) => AppConfig::load_from_file(path),
            None => AppConfig::default(),
        }
        .with_env_overrides();

        match self.command {
            Command::Run(args) => run_command(config, args),
            Command::History(args) => history_command(&config, args),
            Command::Ports => ports_command(),
            Command::Calibrate(args) => calibrate_command(&config, args),
        }
    }
}

fn run_command(mut config: AppConfig, args: RunArgs) -> Result<()> {
    if let Some(port) = args.port {
        config.board.port = port;
    }
    if let Some(secs) = args.interval {
        if secs == 0 {
            bail!("--interval must be at least 1 second");
        }
        config.poll.interval_secs = secs;
    }

    let store: Box<dyn ReadingStore> = if args.in_memory {
        Box::new(MemoryStore::new())
    } else {
        Box::new(
            SqliteStore::open(config.storage.clone())
                .with_context(|| format!("opening {}", config.storage.db_path.display()))?,
        )
    };

    if args.simulate {
        let source = SimulatedSource::new(args.seed);
        poll_loop(PollController::from_config(&config, source, store), &config, args.cycles)
    } else {
        let source = config.board.source();
        poll_loop(PollController::from_config(&config, source, store), &config, args.cycles)
    }
}

fn poll_loop<S: SensorSource, P: ReadingStore>(
    mut controller: PollController<S, P>,
    config: &AppConfig,
    cycles: Option<u64>,
) -> Result<()> {
    let mut reports = controller
        .subscribe()
        .context("cycle report channel not initialized")?;

    let mut completed = 0u64;
    loop {
        controller.run_cycle();
        completed += 1;
        drain_reports(&mut reports)?;

        if cycles.is_some_and(|limit| completed >= limit) {
            break;
        }
        thread::sleep(config.poll.interval());
    }

    controller.shutdown();
    let stats = controller.stats();
    tracing::info!(
        cycles = stats.cycles,
        persisted = stats.persisted,
        incomplete = stats.incomplete,
        aborted = stats.aborted,
        store_failed = stats.store_failed,
        "poll loop stopped"
    );
    Ok(())
}

fn drain_reports(reports: &mut tokio::sync::broadcast::Receiver<CycleReport>) -> Result<()> {
    loop {
        match reports.try_recv() {
            Ok(report) => print_report(&report)?,
            Err(TryRecvError::Empty) => return Ok(()),
            Err(TryRecvError::Lagged(skipped)) => {
                eprintln!("skipped {skipped} cycle reports");
            }
            Err(TryRecvError::Closed) => bail!("cycle report channel closed"),
        }
    }
}

fn print_report(report: &CycleReport) -> Result<()> {
    let line = serde_json::json!({
        "cycle": report.cycle,
        "outcome": report.outcome.label(),
        "reading": report.reading,
        "error": report.error,
    });
    println!("{}", serde_json::to_string(&line)?);
    Ok(())
}

fn history_command(config: &AppConfig, args: HistoryArgs) -> Result<()> {
    let hours = args.hours.unwrap_or(config.poll.history_hours);
    let store = SqliteStore::open(config.storage.clone())
        .with_context(|| format!("opening {}", config.storage.db_path.display()))?;
    let rows = storage::recent(&store, hours, Utc::now())
        .with_context(|| format!("querying the last {hours} hours"))?;

    if rows.is_empty() {
        eprintln!("No readings in the last {hours} hours");
    }
    for row in rows {
        println!("{}", serde_json::to_string(&row)?);
    }
    Ok(())
}

fn ports_command() -> Result<()> {
    let ports = serialport::available_ports().context("enumerating serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found");
        return Ok(());
    }
    for port in ports {
        match port.port_type {
            serialport::SerialPortType::UsbPort(info) => println!(
                "{} usb {:04x}:{:04x} {}",
                port.port_name,
                info.vid,
                info.pid,
                info.product.unwrap_or_default()
            ),
            other => println!("{} {:?}", port.port_name, other),
        }
    }
    Ok(())
}

fn calibrate_command(config: &AppConfig, args: CalibrateArgs) -> Result<()> {
    if !(0.0..=1.0).contains(&args.raw) {
        bail!("--raw must be within [0, 1], got {}", args.raw);
    }
    let result = calibrate(args.kind, Some(args.raw), &config.calibration);
    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}
