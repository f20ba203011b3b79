mod daemon;

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use memloop_config::AppConfig;
use memloop_runtime::{ClientCommand, DaemonClient, ServerEvent};
use memloop_sync::SyncMode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "memloop", version, about = "A background daemon that maintains a Markdown knowledge vault")]
struct Cli {
    #[arg(long, global = true, default_value = "config/default.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Manage the background daemon process.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommands,
    },
    /// Run the daemon in the foreground (used internally by `daemon start`).
    #[command(hide = true)]
    Run,
    /// Run the sync engine once.
    Sync {
        #[arg(long, value_enum, default_value = "incremental")]
        mode: CliSyncMode,
        #[arg(long)]
        pipeline: Option<String>,
        #[arg(long)]
        vault: Option<String>,
        /// Match and fetch but skip writing frontmatter changes.
        #[arg(long)]
        dry_run: bool,
    },
    /// Run the sandboxed extraction engine once.
    Extraction {
        #[arg(long)]
        vault: Option<String>,
    },
    /// Run the card discovery engine once.
    Cards {
        #[arg(long)]
        weekly: bool,
        #[arg(long)]
        vault: Option<String>,
        /// Generate candidates but skip writing card files and advancing the ledger.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the daemon's current status.
    Status,
}

#[derive(Debug, Subcommand)]
enum DaemonCommands {
    Start {
        #[arg(long)]
        force: bool,
    },
    Stop,
    Status,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliSyncMode {
    Full,
    Incremental,
}

impl From<CliSyncMode> for SyncMode {
    fn from(mode: CliSyncMode) -> Self {
        match mode {
            CliSyncMode::Full => SyncMode::Full,
            CliSyncMode::Incremental => SyncMode::Incremental,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config)?;

    // The forked daemon process logs to a rotating file via a non-blocking
    // writer instead of the terminal-facing formatter the CLI's one-shot
    // commands use; the worker guard must outlive the whole run, so it is
    // only dropped at the end of `main`.
    let _log_guard = if matches!(cli.command, Commands::Run) {
        let paths = daemon::daemon_paths();
        std::fs::create_dir_all(paths.log_dir())?;
        let file_appender = tracing_appender::rolling::daily(paths.log_dir(), "daemon.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(non_blocking)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
        None
    };

    match cli.command {
        Commands::Daemon { command } => match command {
            DaemonCommands::Start { force } => daemon::daemon_start(&config, force),
            DaemonCommands::Stop => daemon::daemon_stop(&config).await,
            DaemonCommands::Status => daemon::daemon_status(&config).await,
        },
        Commands::Run => daemon::run_daemon_process(config).await,
        Commands::Sync { mode, pipeline, vault, dry_run } => {
            let client = DaemonClient::new(&config.paths.socket_path);
            let response = client
                .send(ClientCommand::TriggerSync { mode: mode.into(), pipeline, vault, dry_run })
                .await?;
            print_ack_or_error(response)
        }
        Commands::Extraction { vault } => {
            let client = DaemonClient::new(&config.paths.socket_path);
            let response = client.send(ClientCommand::TriggerExtraction { vault }).await?;
            print_ack_or_error(response)
        }
        Commands::Cards { weekly, vault, dry_run } => {
            let client = DaemonClient::new(&config.paths.socket_path);
            let response =
                client.send(ClientCommand::TriggerCardDiscovery { weekly, vault, dry_run }).await?;
            print_ack_or_error(response)
        }
        Commands::Status => daemon::daemon_status(&config).await,
    }
}

fn print_ack_or_error(event: ServerEvent) -> Result<()> {
    match event {
        ServerEvent::Ack(message) => {
            println!("{message}");
            Ok(())
        }
        ServerEvent::Error(message) => bail!(message),
        other => bail!("unexpected response from daemon: {other:?}"),
    }
}
