mod figure;
mod terminal;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use eyelab_lib::calibration::{CalibrationSurface, KeySource, ScriptedKeys};
use eyelab_lib::clock::MonotonicClock;
use eyelab_lib::device::ErrorCode;
use eyelab_lib::sim::{default_devices, SimConfig, SimulatedBrowser, SimulatedConnector};
use eyelab_lib::tracking::FlushReport;
use eyelab_lib::TrackerController;
use eyelab_run::settings::parse_assignment;
use eyelab_run::{
    connect_first, load_session_config, Frontend, MarkerTask, Orchestrator, PresetEdits,
    ScriptedActions, SettingsMap,
};
use log::{info, warn};
use serde_json::json;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "eyelab",
    version,
    about = "eyelab: eye-tracker calibration and recording against a simulated tracker"
)]
struct Cli {
    /// Logging verbosity (e.g., debug, info, warn)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Session configuration (TOML); omitted fields keep their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    sim: SimArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Debug)]
struct SimArgs {
    /// Interval between simulated gaze samples in milliseconds
    #[arg(long, default_value_t = 8, global = true)]
    sim_sample_ms: u64,
    /// Simulated unit rejects the connection as too old
    #[arg(long, global = true)]
    sim_too_old: bool,
    /// Simulated right eye fails calibration at every point
    #[arg(long, global = true)]
    sim_right_eye_invalid: bool,
    #[arg(long, default_value_t = 42, global = true)]
    sim_seed: u64,
}

impl SimArgs {
    fn sim_config(&self) -> SimConfig {
        SimConfig {
            connect_error: self.sim_too_old.then_some(ErrorCode::UNIT_TOO_OLD),
            right_eye_status: if self.sim_right_eye_invalid { 0 } else { 1 },
            sample_interval: Duration::from_millis(self.sim_sample_ms.max(1)),
            seed: self.sim_seed,
            ..SimConfig::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List discovered eye trackers as JSON lines
    Devices,
    /// Run a calibration and report the operator's decision
    Calibrate {
        /// Comma-separated key script (e.g. "space,a"); reads the terminal when omitted
        #[arg(long)]
        keys: Option<String>,
        /// Write the accuracy plot to this PNG
        #[arg(long)]
        plot: Option<PathBuf>,
        #[arg(long, default_value_t = 1280.0)]
        width: f64,
        #[arg(long, default_value_t = 1024.0)]
        height: f64,
    },
    /// Record gaze for a fixed time, stamping each named event once
    Record {
        #[arg(long, default_value_t = 1000)]
        duration_ms: u64,
        /// Event columns, stamped in order at even spacing
        #[arg(long, value_delimiter = ',')]
        events: Vec<String>,
        #[arg(long)]
        out: PathBuf,
    },
    /// Drive the task menu from a scripted list of actions
    Menu {
        /// Working directory holding settings/ and data/
        #[arg(long)]
        root: PathBuf,
        /// Comma-separated actions, `action@subject` renames the subject (e.g. "1@s01,2,q")
        #[arg(long)]
        script: String,
        /// Key script for calibration runs; reads the terminal when omitted
        #[arg(long)]
        keys: Option<String>,
        /// Settings applied by the `s` action, as key=value
        #[arg(long = "set")]
        set: Vec<String>,
        /// Trials per task
        #[arg(long, default_value_t = 5)]
        trials: usize,
        #[arg(long, default_value_t = 100)]
        trial_ms: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level)).init();
    info!("Starting eyelab with log_level={}", cli.log_level);
    match &cli.command {
        Commands::Devices => cmd_devices(&cli)?,
        Commands::Calibrate {
            keys,
            plot,
            width,
            height,
        } => cmd_calibrate(&cli, keys.as_deref(), plot.as_deref(), (*width, *height))?,
        Commands::Record {
            duration_ms,
            events,
            out,
        } => cmd_record(&cli, *duration_ms, events, out)?,
        Commands::Menu {
            root,
            script,
            keys,
            set,
            trials,
            trial_ms,
        } => cmd_menu(
            &cli,
            root,
            script,
            keys.as_deref(),
            set,
            MarkerTask {
                trials: *trials,
                trial_interval: Duration::from_millis(*trial_ms),
            },
        )?,
    }
    Ok(())
}

fn build_controller(cli: &Cli) -> Result<TrackerController> {
    let config = load_session_config(cli.config.as_deref())?;
    let browser = Arc::new(SimulatedBrowser::new(
        default_devices(),
        Duration::from_millis(20),
    ));
    let connector = Arc::new(SimulatedConnector::new(cli.sim.sim_config()));
    Ok(TrackerController::new(
        browser,
        connector,
        Arc::new(MonotonicClock::new()),
        config,
    ))
}

fn key_source(script: Option<&str>) -> Result<Box<dyn KeySource>> {
    Ok(match script {
        Some(script) => Box::new(ScriptedKeys::parse(script)),
        None => Box::new(terminal::TerminalKeys::new().context("enabling terminal key input")?),
    })
}

/// Prompts reach the operator only when keys come from the terminal.
fn prompt_surface(script: Option<&str>, size: (f64, f64)) -> terminal::PromptSurface {
    let out: Box<dyn Write> = match script {
        Some(_) => Box::new(io::sink()),
        None => Box::new(io::stderr()),
    };
    terminal::PromptSurface::new(out, size.0, size.1)
}

fn cmd_devices(cli: &Cli) -> Result<()> {
    let controller = build_controller(cli)?;
    for device in controller.wait_for_device()? {
        println!("{}", serde_json::to_string(&device)?);
    }
    Ok(())
}

fn cmd_calibrate(
    cli: &Cli,
    keys: Option<&str>,
    plot: Option<&Path>,
    size: (f64, f64),
) -> Result<()> {
    let mut controller = build_controller(cli)?;
    let device = connect_first(&mut controller)?;
    let points = controller.config().points();
    let mut surface = prompt_surface(keys, size);
    let mut keys = key_source(keys)?;
    let decision = controller.do_calibration(&points, &mut surface, keys.as_mut())?;
    drop(keys);
    let mut plotted = None;
    if let Some(path) = plot {
        match surface.headless().last_figure() {
            Some(fig) => {
                figure::draw_plotters_figure(path, fig)
                    .with_context(|| format!("writing plot {}", path.display()))?;
                plotted = Some(path.display().to_string());
            }
            None => warn!("calibration produced no accuracy plot"),
        }
    }
    let summary = json!({
        "device": device,
        "decision": decision.as_str(),
        "points": points.len(),
        "frames": surface.headless().frames(),
        "plot": plotted,
    });
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

fn cmd_record(cli: &Cli, duration_ms: u64, events: &[String], out: &Path) -> Result<()> {
    let mut controller = build_controller(cli)?;
    let device = connect_first(&mut controller)?;
    let file = File::create(out).with_context(|| format!("creating {}", out.display()))?;
    controller.set_data_file(Box::new(BufWriter::new(file)));
    controller.configure_channels(events.iter().cloned());
    controller.start_tracking()?;
    let step = Duration::from_millis(duration_ms) / (events.len() as u32 + 1);
    for name in events {
        thread::sleep(step);
        controller.record_event(name)?;
    }
    thread::sleep(step);
    let report = controller.stop_tracking()?;
    controller.close_data_file()?;
    let rows = match report {
        FlushReport::Written { rows } => rows,
        FlushReport::Empty | FlushReport::Skipped => 0,
    };
    let summary = json!({
        "device": device,
        "rows": rows,
        "events": events,
        "out": out.display().to_string(),
    });
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

fn cmd_menu(
    cli: &Cli,
    root: &Path,
    script: &str,
    keys: Option<&str>,
    set: &[String],
    task: MarkerTask,
) -> Result<()> {
    let mut values = SettingsMap::new();
    for entry in set {
        let (key, value) = parse_assignment(entry)
            .with_context(|| format!("expected key=value, got '{}'", entry))?;
        values.insert(key, value);
    }
    let mut controller = build_controller(cli)?;
    connect_first(&mut controller)?;
    let surface: Box<dyn CalibrationSurface> = Box::new(prompt_surface(keys, (1280.0, 1024.0)));
    let frontend = Frontend {
        surface,
        keys: key_source(keys)?,
        runner: Box::new(task),
        editor: Box::new(PresetEdits { values }),
    };
    let mut orchestrator = Orchestrator::new(root, controller, frontend)?;
    // terminal keys put stdout in raw mode
    let line_end = if keys.is_some() { "\n" } else { "\r\n" };
    let mut actions = ScriptedActions::parse(script).with_echo(line_end);
    orchestrator.run(&mut actions)?;
    let summary = json!({
        "subject": orchestrator.subject(),
        "calibrated": orchestrator.is_calibrated(),
        "last_data_file": orchestrator.last_data_file().map(|p| p.display().to_string()),
    });
    drop(orchestrator);
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}
