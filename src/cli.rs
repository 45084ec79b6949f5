use crate::text_summary::build_text_summary;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use house_sim_bridge::model::{
    BridgeSettings, ConfigDocument, Notification, RunId, RunSummary, SimulatorCommand,
};
use house_sim_bridge::{Bridge, HostEvent, HouseId, Session};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

/// Simulator used when `--simulator` is not given, with its entry script.
const DEFAULT_SIMULATOR: &str = "python3";
const DEFAULT_SIMULATOR_SCRIPT: &str = "mpsds_generate_simulation/puppeteer.py";

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "house-sim",
    version,
    about = "Hand a house configuration to the energy simulator and collect its results"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding config_files/ and sim_result/ (defaults to the user data dir)
    #[arg(long, global = true)]
    pub base_dir: Option<PathBuf>,

    /// Override where config files are written
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    /// Override where the simulator writes its output
    #[arg(long, global = true)]
    pub result_dir: Option<PathBuf>,

    /// Simulator program (defaults to python3 running the puppeteer script)
    #[arg(long, global = true)]
    pub simulator: Option<PathBuf>,

    /// Argument passed to the simulator before the config file name (repeatable)
    #[arg(long = "simulator-arg", global = true)]
    pub simulator_args: Vec<String>,

    /// Working directory for the simulator (defaults to the base dir)
    #[arg(long, global = true)]
    pub simulator_cwd: Option<PathBuf>,

    /// Delay between checks for the output file
    #[arg(long, global = true, default_value = "1s")]
    pub poll_interval: humantime::Duration,

    /// Number of checks before giving up on the output file
    #[arg(long, global = true, default_value_t = BridgeSettings::DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Print the run summary as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Print a short text summary (default)
    #[arg(long, global = true)]
    pub text: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Save a form configuration (JSON) and run the simulation for it
    Submit {
        /// Configuration document as produced by the form
        form: PathBuf,
    },
    /// Run the simulator with its built-in default house
    Default,
    /// Print a previously produced result
    Load {
        /// House identifier (or house name)
        id: String,
    },
    /// Print the identifier derived from a house name
    Id {
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },
}

pub async fn run(args: Cli) -> Result<()> {
    if args.json && args.text {
        return Err(anyhow::anyhow!("--json and --text are mutually exclusive"));
    }

    match &args.command {
        Command::Id { name } => {
            println!("{}", HouseId::from_house_name(&name.join(" ")));
            Ok(())
        }
        Command::Load { id } => run_load(&args, &HouseId::parse(id)).await,
        Command::Submit { form } => {
            let raw = std::fs::read_to_string(form)
                .with_context(|| format!("failed to read {}", form.display()))?;
            let doc: ConfigDocument = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a valid configuration", form.display()))?;
            run_simulation(&args, Some(doc)).await
        }
        Command::Default => run_simulation(&args, None).await,
    }
}

/// Build `BridgeSettings` from CLI arguments.
pub fn build_settings(args: &Cli) -> BridgeSettings {
    let base = args
        .base_dir
        .clone()
        .unwrap_or_else(BridgeSettings::default_base_dir);
    let (program, sim_args) = match &args.simulator {
        Some(program) => (program.clone(), args.simulator_args.clone()),
        None if args.simulator_args.is_empty() => (
            PathBuf::from(DEFAULT_SIMULATOR),
            vec![DEFAULT_SIMULATOR_SCRIPT.to_string()],
        ),
        None => (PathBuf::from(DEFAULT_SIMULATOR), args.simulator_args.clone()),
    };
    let simulator = SimulatorCommand {
        program,
        args: sim_args,
        working_dir: Some(args.simulator_cwd.clone().unwrap_or_else(|| base.clone())),
    };
    let mut settings = BridgeSettings::rooted_at(&base, simulator);
    if let Some(dir) = &args.config_dir {
        settings.config_dir = dir.clone();
    }
    if let Some(dir) = &args.result_dir {
        settings.result_dir = dir.clone();
    }
    settings.poll_interval = Duration::from(args.poll_interval);
    settings.max_retries = args.max_retries;
    settings
}

async fn run_load(args: &Cli, id: &HouseId) -> Result<()> {
    let (bridge, _host_rx) = Bridge::start(build_settings(args));
    let data = bridge
        .load_sim_data(id)
        .await
        .with_context(|| format!("no stored result for {id}"))?;
    bridge.shutdown();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        for line in crate::text_summary::describe_data(&data) {
            println!("{line}");
        }
    }
    Ok(())
}

async fn run_simulation(args: &Cli, doc: Option<ConfigDocument>) -> Result<()> {
    let settings = build_settings(args);
    let (out_tx, out_handle) = spawn_output_writer();
    let (bridge, mut host_rx) = Bridge::start(settings);
    let mut form = bridge.open_form_session().await?;

    let (run, id) = match doc {
        Some(doc) => {
            let id = doc.house_id();
            let (run, path) = bridge
                .save_config(form.id, doc)
                .await
                .context("failed to save config")?;
            let _ = out_tx.send(OutputLine::Stderr(format!("Saved: {}", path.display())));
            (run, id)
        }
        None => (
            bridge.run_default_simulation(form.id).await?,
            HouseId::default_run(),
        ),
    };

    let outcome = tokio::select! {
        res = follow_run(&mut form, &mut host_rx, run, &id, &out_tx) => res,
        _ = tokio::signal::ctrl_c() => Err(anyhow::anyhow!("interrupted")),
    };
    bridge.shutdown();

    let result = outcome.and_then(|summary| {
        print_summary(args, &summary, &out_tx)?;
        if summary.ok {
            return Ok(());
        }
        let err = summary.error.unwrap_or_default();
        Err(anyhow::anyhow!("simulation failed: {err}"))
    });
    drop(out_tx);
    let _ = out_handle.await;
    result
}

/// Consume the form session until `run` ends. A failed run still yields a
/// summary; on success pick up the data pushed into the results session the
/// bridge opens.
async fn follow_run(
    form: &mut Session,
    host_rx: &mut mpsc::UnboundedReceiver<HostEvent>,
    run: RunId,
    id: &HouseId,
    out_tx: &mpsc::UnboundedSender<OutputLine>,
) -> Result<RunSummary> {
    let mut summary = None;
    while let Some(n) = form.recv().await {
        if n.run() != Some(run) {
            continue;
        }
        match &n {
            Notification::RunStateChanged { state, .. } => {
                if !state.is_terminal() {
                    let _ = out_tx.send(OutputLine::Stderr(format!("== {state:?} ==")));
                }
            }
            Notification::SimulationOutput { line, .. } => {
                let _ = out_tx.send(OutputLine::Stderr(format!("[sim] {line}")));
            }
            Notification::SimulationComplete { .. } | Notification::SimulationError { .. } => {
                summary = RunSummary::from_notification(id, &n);
                break;
            }
            Notification::SimulationData { .. } => {}
        }
    }
    let summary = summary.context("bridge closed before the run finished")?;
    if !summary.ok {
        return Ok(summary);
    }

    // The results view should open right after completion.
    while let Some(ev) = host_rx.recv().await {
        if let HostEvent::SessionOpened(mut results) = ev {
            if let Some(Notification::SimulationData { id, .. }) = results.recv().await {
                let _ = out_tx.send(OutputLine::Stderr(format!("Results view opened for {id}")));
            }
            break;
        }
    }
    Ok(summary)
}

fn print_summary(
    args: &Cli,
    summary: &RunSummary,
    out_tx: &mpsc::UnboundedSender<OutputLine>,
) -> Result<()> {
    if args.json {
        let out = serde_json::to_string_pretty(summary)?;
        let _ = out_tx.send(OutputLine::Stdout(out));
        return Ok(());
    }
    for line in build_text_summary(summary).lines {
        let _ = out_tx.send(OutputLine::Stdout(line));
    }
    Ok(())
}
