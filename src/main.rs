//! MediaShard console binary
//!
//! Wires the real filesystem adapter and the file-backed config store
//! into a [`MediaDir`] and drives the command console from stdin.
//! One command per line; replies are written as `<code> <text>` with
//! multi-line texts repeating the code.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mediashard::adapters::{FileConfigStore, StdFileops};
use mediashard::config::GIBIBYTE;
use mediashard::facade::console;
use mediashard::{MediaDir, StoreConfig};

// =============================================================================
// CLI Arguments
// =============================================================================

/// MediaShard - multi-volume recording store console
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Mount prefix of the physical volumes (prefix0, prefix1, ... are probed)
    #[arg(long, env = "MEDIASHARD_MOUNT_PREFIX", default_value = "/mnt/video")]
    mount_prefix: PathBuf,

    /// Root of the logical recording tree
    #[arg(long, env = "MEDIASHARD_VIDEO_DIR", default_value = "/video")]
    video_dir: PathBuf,

    /// File holding the persisted bucket sequence
    #[arg(
        long,
        env = "MEDIASHARD_STATE_FILE",
        default_value = "/var/lib/mediashard/state.conf"
    )]
    state_file: PathBuf,

    /// Background worker threads (0 = one per CPU)
    #[arg(long, env = "MEDIASHARD_WORKERS", default_value = "0")]
    workers: usize,

    /// Task queue capacity (0 = same as workers)
    #[arg(long, env = "MEDIASHARD_QUEUE_CAPACITY", default_value = "0")]
    queue_capacity: usize,

    /// Low-space threshold in GiB triggering a rebalance
    #[arg(long, env = "MEDIASHARD_LOW_SPACE_GIB", default_value = "100")]
    low_space_gib: u64,

    /// Disable threshold-triggered rebalancing (forced BALANCE still works)
    #[arg(long, env = "MEDIASHARD_NO_BALANCE")]
    no_balance: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn store_config(&self) -> StoreConfig {
        let defaults = StoreConfig::default();
        let workers = if self.workers == 0 {
            defaults.workers
        } else {
            self.workers
        };
        StoreConfig {
            mount_prefix: self.mount_prefix.clone(),
            video_dir: self.video_dir.clone(),
            low_space_bytes: self.low_space_gib * GIBIBYTE,
            workers,
            queue_capacity: if self.queue_capacity == 0 {
                workers
            } else {
                self.queue_capacity
            },
            balance: !self.no_balance,
        }
    }
}

// =============================================================================
// Main
// =============================================================================

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args);

    info!("Starting MediaShard");
    info!("  Mount prefix: {}", args.mount_prefix.display());
    info!("  Video dir: {}", args.video_dir.display());
    info!("  State file: {}", args.state_file.display());
    info!("  Low-space threshold: {} GiB", args.low_space_gib);
    info!("  Balancing enabled: {}", !args.no_balance);

    let config = args.store_config();
    let fs = Arc::new(StdFileops::new());
    let store = Arc::new(FileConfigStore::new(args.state_file.clone()));

    let mut dir = MediaDir::new(&config, fs, store)?;
    info!(seq = %dir.seq(), free_mib = dir.free_mib(), "store ready");

    // opportunistic startup rebalance (no-op above the threshold)
    dir.balance(false)?;

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().eq_ignore_ascii_case("QUIT") {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        let reply = console::dispatch(&dir, &line);
        for text in reply.text.lines() {
            println!("{} {}", reply.code, text);
        }
    }

    info!("draining task queue");
    dir.shutdown();
    info!("MediaShard shutdown complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
