//! Service entry point for the dropzone integration bus.
//!
//! Watches the configured drop directories, hands every arriving file to
//! the orchestrator and keeps running until it is told to stop.
//!
//! # Usage
//!
//! ```bash
//! dropzone [OPTIONS] <COMMAND>
//!
//! # Run the service
//! dropzone --config dropzone.json run
//!
//! # Validate configuration and show what would be watched
//! DZ_ROOT_DIRECTORY=/srv/drop dropzone check
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

use std::io::Write;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use color_eyre::eyre::eyre;
use dz_bus::{AccessPolicy, IntegrationHandlers, Orchestrator, OrchestratorOptions};
use dz_core::Config;
use dz_watcher::{WatchFault, WatcherService};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Directory-drop integration bus.
///
/// Files dropped into `<root>/Output` are decoded, handled, answered in
/// `<root>/Input` and moved to `done/` or `error/`.
#[derive(Parser)]
#[command(name = "dropzone", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    command: Commands,

    /// Path to a JSON configuration file.
    #[arg(short, long, global = true, env = "DZ_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Root of the drop zone (overrides `integration.root_directory`).
    #[arg(long, global = true, env = "DZ_ROOT_DIRECTORY")]
    root_directory: Option<Utf8PathBuf>,

    /// Directory to watch, absolute or relative to the root.
    #[arg(long, global = true, env = "DZ_WATCH_DIRECTORY")]
    watch_directory: Option<Utf8PathBuf>,

    /// Glob filter list, separated by `;` or `,`.
    #[arg(long, global = true, env = "DZ_WATCH_FILTER")]
    watch_filter: Option<String>,

    /// Maximum number of files processed at once.
    #[arg(long, global = true, env = "DZ_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Watch the drop zone and process files until stopped.
    Run,

    /// Validate configuration and print the resolved watch targets.
    Check {
        /// Print the effective configuration as JSON as well.
        #[arg(long)]
        json: bool,
    },
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for logging.
///
/// Respects `RUST_LOG` if set. Otherwise uses `debug` with `--verbose` and
/// `info` by default, with `notify` capped at `warn`.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(format!("{level},notify=warn,mio=warn"))
    });

    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_ansi(use_ansi))
        .with(filter)
        .init();
}

/// Builds the effective [`Config`] from the file (if any) and overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded or the result is invalid.
fn build_config(cli: &Cli) -> color_eyre::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if let Some(root) = &cli.root_directory {
        config.integration.root_directory.clone_from(root);
    }
    if let Some(dir) = &cli.watch_directory {
        config.integration.watch_directory = Some(dir.clone());
    }
    if let Some(filter) = &cli.watch_filter {
        config.integration.watch_filter = Some(filter.clone());
    }
    if let Some(concurrency) = cli.concurrency {
        config.integration.concurrency = concurrency;
    }

    config.validate()?;
    Ok(config)
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

/// Runs the service until a shutdown signal or a watcher fault.
///
/// # Errors
///
/// Returns an error if the layout cannot be created, a watch cannot be
/// registered, or a watcher reports a fault.
async fn run_service(config: Config) -> color_eyre::Result<()> {
    let layout = config.layout();
    layout.ensure()?;

    let concurrency = config.integration.effective_concurrency();
    let orchestrator = Arc::new(Orchestrator::new(
        IntegrationHandlers::new(config.features),
        OrchestratorOptions {
            layout,
            access: AccessPolicy::from(&config.watch),
            concurrency,
        },
    ));

    let mut service: WatcherService<Orchestrator<IntegrationHandlers>> =
        WatcherService::new(Arc::clone(&orchestrator), config.watch.queue_capacity)
            .escalate_overflow(config.watch.shutdown_on_overflow);
    for target in config.watch_targets() {
        let root = target.root().to_owned();
        service
            .add_watch(target)
            .map_err(|e| eyre!("Failed to watch {root}: {e}"))?;
    }
    service.start()?;
    info!(
        root = %config.integration.root_directory,
        watches = service.watchers().len(),
        concurrency,
        "Service started"
    );

    let fault = tokio::select! {
        () = shutdown_signal() => None,
        fault = service.next_fault() => fault,
    };

    service.stop().await;
    orchestrator.shutdown().await;

    match fault {
        Some(WatchFault { root, reason }) => {
            error!(root = %root, reason = %reason, "Watcher fault, shutting down");
            Err(eyre!("watcher fault on {root}: {reason}"))
        }
        None => {
            info!("Service stopped");
            Ok(())
        }
    }
}

/// Resolves when Ctrl-C or, on Unix, SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    () = ctrl_c => info!("Received Ctrl-C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
        info!("Received Ctrl-C, shutting down");
    }
}

/// Prints the resolved layout and watch targets.
///
/// # Errors
///
/// Returns an error if writing to stdout fails.
fn run_check(config: &Config, json: bool) -> color_eyre::Result<()> {
    let layout = config.layout();
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();

    writeln!(handle, "Configuration OK")?;
    writeln!(handle, "  Input:       {}", layout.input_dir())?;
    writeln!(handle, "  Output:      {}", layout.output_dir())?;
    writeln!(handle, "  Concurrency: {}", config.integration.effective_concurrency())?;
    writeln!(handle)?;
    writeln!(handle, "Watch targets:")?;
    for target in config.watch_targets() {
        let exists = if target.root().is_dir() { "" } else { " (missing)" };
        writeln!(
            handle,
            "  {}{exists}  filters={}  recursive={}  replay={}",
            target.root(),
            target.filters.join(";"),
            target.recurse,
            target.replay_existing,
        )?;
    }

    if json {
        writeln!(handle)?;
        writeln!(handle, "{}", serde_json::to_string_pretty(config)?)?;
    }

    Ok(())
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.no_color);

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration, aborting startup");
            return Err(e);
        }
    };

    match cli.command {
        Commands::Run => run_service(config).await,
        Commands::Check { json } => run_check(&config, json),
    }
}
