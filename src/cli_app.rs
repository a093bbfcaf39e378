//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal as _};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::core::config::{WatchConfig, check_interval, parse_duration};
use crate::core::errors::{Result, UwError};
use crate::daemon::signals::install_shutdown_flag;
use crate::daemon::{RunnerOptions, Watcher, spawn_watcher};
use crate::logger::{ActivityLogger, JsonlLogger, TeeLogger, TracingLogger};
use crate::notify::{Notifier, OutputFormat, StdoutNotifier, render};
use crate::state::StateStore;
use crate::units::model::Transition;
use crate::units::replay::ReplaySource;
use crate::units::source::{SystemctlSource, UnitSource};

/// unitwatch: reports systemd units that appear, disappear, or change state.
#[derive(Parser, Debug)]
#[command(name = "unitwatch", version, about)]
pub struct Cli {
    /// TOML config file; command-line flags take precedence.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// More diagnostics on stderr (-v debug, -vv trace). `RUST_LOG` wins.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Print transitions and state as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Watch units and report transitions until interrupted.
    Watch(WatchArgs),
    /// Print the snapshot stored in the state file.
    Show(StateArgs),
    /// Truncate the state file: the next run reports every unit as added.
    Reset(StateArgs),
    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Default)]
pub struct WatchArgs {
    /// Slack incoming-webhook URL. Without it, transitions only go to stdout.
    pub webhook_url: Option<String>,

    /// Status polling interval, e.g. `500ms`, `2s`.
    #[arg(long, value_parser = parse_interval)]
    pub interval: Option<Duration>,

    /// Path to the state file.
    #[arg(long, value_name = "PATH")]
    pub state_file: Option<PathBuf>,

    /// Slack channel name.
    #[arg(long)]
    pub slack_channel: Option<String>,

    /// Slack username.
    #[arg(long)]
    pub slack_username: Option<String>,

    /// Slack avatar URL.
    #[arg(long)]
    pub slack_icon_url: Option<String>,

    /// Watch the per-user service manager instead of the system one.
    #[arg(long)]
    pub user: bool,

    /// Replay listings from a JSON file instead of calling systemctl.
    #[arg(long, value_name = "PATH")]
    pub replay: Option<PathBuf>,

    /// Also append activity to this JSON Lines file.
    #[arg(long, value_name = "PATH")]
    pub activity_log: Option<PathBuf>,

    /// Disable the activity log entirely.
    #[arg(long, conflicts_with = "activity_log")]
    pub no_activity_log: bool,

    /// Stop after this many poll cycles.
    #[arg(long, value_name = "N")]
    pub cycles: Option<u64>,
}

#[derive(Args, Debug, Default)]
pub struct StateArgs {
    /// Path to the state file.
    #[arg(long, value_name = "PATH")]
    pub state_file: Option<PathBuf>,
}

fn parse_interval(raw: &str) -> std::result::Result<Duration, String> {
    let interval = parse_duration(raw).map_err(|err| err.to_string())?;
    check_interval(interval).map_err(|err| err.to_string())?;
    Ok(interval)
}

/// Install the stderr diagnostics subscriber.
pub fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Watch(args) => {
            let config = resolve_watch_config(cli.config.as_ref(), args)?;
            let shutdown = install_shutdown_flag()?;
            run_watch(&config, args, cli.json, shutdown)
        }
        Command::Show(args) => {
            let config = resolve_state_config(cli.config.as_ref(), args)?;
            show_state(&config, cli.json)
        }
        Command::Reset(args) => {
            let config = resolve_state_config(cli.config.as_ref(), args)?;
            reset_state(&config)
        }
        Command::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "unitwatch", &mut io::stdout());
            Ok(())
        }
    }
}

fn base_config(path: Option<&PathBuf>) -> Result<WatchConfig> {
    path.map_or_else(|| Ok(WatchConfig::default()), |path| WatchConfig::load(path))
}

/// Defaults, then the config file, then flags.
pub fn resolve_watch_config(path: Option<&PathBuf>, args: &WatchArgs) -> Result<WatchConfig> {
    let mut config = base_config(path)?;
    if let Some(interval) = args.interval {
        config.interval = interval;
    }
    if let Some(state_file) = &args.state_file {
        config.state_file.clone_from(state_file);
    }
    if let Some(url) = &args.webhook_url {
        config.slack.webhook_url = Some(url.clone());
    }
    if let Some(channel) = &args.slack_channel {
        config.slack.channel.clone_from(channel);
    }
    if let Some(username) = &args.slack_username {
        config.slack.username.clone_from(username);
    }
    if let Some(icon_url) = &args.slack_icon_url {
        config.slack.icon_url.clone_from(icon_url);
    }
    config.validate()?;
    Ok(config)
}

fn resolve_state_config(path: Option<&PathBuf>, args: &StateArgs) -> Result<WatchConfig> {
    let mut config = base_config(path)?;
    if let Some(state_file) = &args.state_file {
        config.state_file.clone_from(state_file);
    }
    config.validate()?;
    Ok(config)
}

fn build_source(args: &WatchArgs) -> Result<Box<dyn UnitSource + Send>> {
    Ok(match &args.replay {
        Some(path) => Box::new(ReplaySource::from_json_file(path)?),
        None if args.user => Box::new(SystemctlSource::user()),
        None => Box::new(SystemctlSource::new()),
    })
}

fn build_logger(args: &WatchArgs) -> Result<Option<Box<dyn ActivityLogger>>> {
    if args.no_activity_log {
        return Ok(None);
    }
    let tracing_logger: Box<dyn ActivityLogger> = Box::new(TracingLogger);
    Ok(Some(match &args.activity_log {
        Some(path) => Box::new(TeeLogger::new(vec![
            tracing_logger,
            Box::new(JsonlLogger::open(path)?),
        ])),
        None => tracing_logger,
    }))
}

fn build_notifiers(config: &WatchConfig, json: bool) -> Result<Vec<Box<dyn Notifier>>> {
    let format = if json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let mut notifiers: Vec<Box<dyn Notifier>> = vec![Box::new(StdoutNotifier::new(
        format,
        io::stdout().is_terminal(),
    ))];

    #[cfg(feature = "slack")]
    if config.slack.webhook_url.is_some() {
        notifiers.push(Box::new(crate::notify::SlackNotifier::new(
            config.slack.clone(),
        )?));
    }
    #[cfg(not(feature = "slack"))]
    if config.slack.webhook_url.is_some() {
        warn!("built without the `slack` feature; webhook url ignored");
    }

    Ok(notifiers)
}

/// Delivery failures never stop the watch; they are logged and dropped.
fn deliver(notifiers: &mut [Box<dyn Notifier>], batch: &[Transition]) {
    for transition in batch {
        for notifier in notifiers.iter_mut() {
            if let Err(err) = notifier.post(transition) {
                warn!(code = err.code(), error = %err, message = %render(transition), "notification dropped");
            }
        }
    }
}

fn run_watch(
    config: &WatchConfig,
    args: &WatchArgs,
    json: bool,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    let mut notifiers = build_notifiers(config, json)?;
    let watcher = Watcher::from_config(build_source(args)?, config, build_logger(args)?)?;
    info!(
        state_file = %config.state_file.display(),
        interval_ms = u64::try_from(config.interval.as_millis()).unwrap_or(u64::MAX),
        "watching units"
    );

    let handle = spawn_watcher(
        watcher,
        Arc::clone(&shutdown),
        RunnerOptions {
            max_cycles: args.cycles,
            ..RunnerOptions::default()
        },
    )?;

    let mut outcome = Ok(());
    for batch in handle.batches() {
        match batch {
            Ok(batch) => deliver(&mut notifiers, &batch),
            // Ctrl-C also reaches a running systemctl child.
            Err(err) if shutdown.load(Ordering::SeqCst) => {
                info!(error = %err, "listing interrupted by shutdown");
                break;
            }
            Err(err) => {
                outcome = Err(err);
                break;
            }
        }
    }
    handle.join()?;
    outcome
}

fn show_state(config: &WatchConfig, json: bool) -> Result<()> {
    let store = StateStore::new(&config.state_file);
    let loaded = store.load()?;
    if json {
        let body = serde_json::json!({
            "state_file": config.state_file,
            "exists": !loaded.bootstrap,
            "units": loaded.snapshot,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }
    if loaded.bootstrap {
        println!(
            "no state file at {} (next watch bootstraps)",
            config.state_file.display()
        );
        return Ok(());
    }
    let width = loaded
        .snapshot
        .iter()
        .map(|unit| unit.name.len())
        .max()
        .unwrap_or(4);
    println!("{:<width$}  LOAD       ACTIVE       SUB", "UNIT");
    for unit in loaded.snapshot.iter() {
        println!(
            "{:<width$}  {:<9}  {:<11}  {}",
            unit.name, unit.load_state, unit.active_state, unit.sub_state
        );
    }
    println!("{} units", loaded.snapshot.len());
    Ok(())
}

fn reset_state(config: &WatchConfig) -> Result<()> {
    let path = &config.state_file;
    std::fs::File::create(path).map_err(|source| UwError::StateWriteFailed {
        path: path.clone(),
        source,
    })?;
    println!("reset {}", path.display());
    Ok(())
}
