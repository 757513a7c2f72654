//! hdfs-bridge command-line client.
//!
//! Resources are `local:///path` or `remote://user@host:port/path`; a bare
//! path is taken as local.
//!
//! ## Usage
//!
//! ```bash
//! hdfs-bridge ls remote://amy@namenode:9870/data
//! hdfs-bridge cp ./report.csv remote://amy@namenode:9870/data/
//! hdfs-bridge put a.txt photos/ remote://amy@namenode:9870/inbox
//! hdfs-bridge get remote://amy@namenode:9870/logs ./restore
//! hdfs-bridge clusters
//! ```
//!
//! Clusters are read from `~/.config/hdfs-bridge/config.ron`
//! (override with `--config`). Ctrl-C cancels a running transfer.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use hdfs_bridge::{
    Bridge, BridgeConfig, Progress, ProgressSink, ResourceId, StatusIndicator, TransferOptions,
    VfsError, WriteOptions, config_file_path,
};

/// Uniform filesystem client for local disk and WebHDFS clusters.
#[derive(Parser, Debug)]
#[command(name = "hdfs-bridge")]
#[command(about = "Browse and move files between local disk and WebHDFS clusters")]
struct Cli {
    /// Config file (default: ~/.config/hdfs-bridge/config.ron)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show size, kind and modification time
    Stat { id: String },
    /// List a directory
    Ls { id: String },
    /// Create a directory and any missing parents
    Mkdir { id: String },
    /// Delete a file or directory
    Rm {
        id: String,
        /// Delete non-empty directories
        #[arg(short, long)]
        recursive: bool,
    },
    /// Rename or move
    Mv {
        from: String,
        to: String,
        #[arg(short, long)]
        overwrite: bool,
    },
    /// Copy a file or directory tree
    Cp {
        from: String,
        to: String,
        #[arg(short, long)]
        overwrite: bool,
    },
    /// Print a file to stdout
    Cat { id: String },
    /// Write stdin to a file
    Write {
        id: String,
        #[arg(short, long)]
        overwrite: bool,
    },
    /// Upload local files and folders into a remote directory
    Put {
        #[arg(required = true, num_args = 2..)]
        paths: Vec<String>,
        #[arg(short, long)]
        overwrite: bool,
    },
    /// Download remote files and folders into a local directory
    Get {
        #[arg(required = true, num_args = 2..)]
        paths: Vec<String>,
        #[arg(short, long)]
        overwrite: bool,
    },
    /// List configured clusters
    Clusters,
}

/// Parse a resource argument; bare paths are local.
fn parse_id(arg: &str) -> Result<ResourceId> {
    if arg.contains("://") {
        return Ok(ResourceId::parse(arg)?);
    }
    let path = std::path::absolute(arg).with_context(|| format!("cannot resolve {arg}"))?;
    Ok(ResourceId::local(&path.to_string_lossy()))
}

/// Split `a b c dest` into sources and destination.
fn split_batch(paths: &[String]) -> Result<(Vec<ResourceId>, ResourceId)> {
    let (dest, sources) = paths.split_last().context("need at least one source and a destination")?;
    let sources = sources.iter().map(|s| parse_id(s)).collect::<Result<Vec<_>>>()?;
    Ok((sources, parse_id(dest)?))
}

// ============================================================================
// Progress display
// ============================================================================

/// Progress bar on stderr; one bar per file, batch position as a log line.
#[derive(Clone)]
struct ProgressDisplay {
    bar: ProgressBar,
}

impl ProgressDisplay {
    fn new() -> Self {
        let bar = ProgressBar::new(10_000);
        if let Ok(style) = ProgressStyle::with_template("{msg:30!} [{bar:40}] {percent:>3}%") {
            bar.set_style(style.progress_chars("=> "));
        }
        Self { bar }
    }
}

impl ProgressSink for ProgressDisplay {
    fn report(&self, progress: Progress) {
        if self.bar.message() != progress.message {
            self.bar.reset();
            self.bar.set_message(progress.message);
        }
        self.bar.inc((progress.percent_increment * 100.0).round() as u64);
    }
}

impl StatusIndicator for ProgressDisplay {
    fn update(&self, index: usize, total: usize, name: &str) {
        self.bar.println(format!("[{}/{}] {}", index + 1, total, name));
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn run(cli: Cli, cancel: CancellationToken) -> Result<()> {
    let config = match &cli.config {
        Some(path) => BridgeConfig::load(path),
        None => BridgeConfig::load_default(),
    }
    .context("failed to load config")?;

    let bridge = Bridge::from_config(&config);
    let display = ProgressDisplay::new();
    let opts = TransferOptions::new()
        .with_cancel(cancel)
        .with_progress(display.clone());

    match cli.command {
        Command::Stat { id } => {
            let id = parse_id(&id)?;
            let stat = bridge.stat(&id).await?;
            let modified = stat
                .modified
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            println!("{id}");
            println!("  kind:     {}", if stat.is_dir() { "directory" } else { "file" });
            println!("  size:     {}", stat.size);
            println!("  modified: {modified}");
        }
        Command::Ls { id } => {
            let id = parse_id(&id)?;
            for entry in bridge.read_directory(&id).await? {
                let marker = if entry.kind.is_dir() { 'd' } else { '-' };
                println!("{marker} {}", entry.name);
            }
        }
        Command::Mkdir { id } => bridge.create_directory(&parse_id(&id)?).await?,
        Command::Rm { id, recursive } => bridge.delete(&parse_id(&id)?, recursive).await?,
        Command::Mv { from, to, overwrite } => {
            bridge
                .rename_with(&parse_id(&from)?, &parse_id(&to)?, overwrite, &opts)
                .await?;
            display.finish();
        }
        Command::Cp { from, to, overwrite } => {
            let target = bridge
                .copy(&parse_id(&from)?, &parse_id(&to)?, overwrite, &opts)
                .await?;
            display.finish();
            println!("{target}");
        }
        Command::Cat { id } => {
            let data = bridge.read_file(&parse_id(&id)?, &opts).await?;
            display.finish();
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&data)?;
            stdout.flush()?;
        }
        Command::Write { id, overwrite } => {
            let mut content = Vec::new();
            std::io::Read::read_to_end(&mut std::io::stdin(), &mut content)?;
            let options = WriteOptions {
                create: true,
                overwrite,
            };
            bridge
                .write_file(&parse_id(&id)?, content.into(), options, &opts)
                .await?;
            display.finish();
        }
        Command::Put { paths, overwrite } => {
            let (sources, dest) = split_batch(&paths)?;
            for target in hdfs_bridge::upload(&bridge, &sources, &dest, overwrite, &display, &opts).await? {
                println!("{target}");
            }
        }
        Command::Get { paths, overwrite } => {
            let (sources, dest) = split_batch(&paths)?;
            for target in hdfs_bridge::download(&bridge, &sources, &dest, overwrite, &display, &opts).await? {
                println!("{target}");
            }
        }
        Command::Clusters => {
            if config.clusters.is_empty() {
                eprintln!("No clusters configured.");
            }
            for cluster in &config.clusters {
                println!(
                    "{:<16} remote://{}/  ({})",
                    cluster.name,
                    cluster.authority(),
                    cluster.base_path
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    match run(cli, cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<VfsError>() {
            Some(e) if e.is_cancelled() => {
                eprintln!("Cancelled.");
                ExitCode::from(130)
            }
            Some(e) if e.is_configuration() => {
                eprintln!("Error: {err:#}");
                let path = config_file_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "config.ron".to_string());
                eprintln!("Hint: add a cluster for this authority to {path}");
                ExitCode::FAILURE
            }
            _ => {
                eprintln!("Error: {err:#}");
                ExitCode::FAILURE
            }
        },
    }
}
