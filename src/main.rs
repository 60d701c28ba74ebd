//! Binary entrypoint for the reelbot CLI.
//!
//! Commands:
//! - `start` - run the game server (growth loop and session housekeeping) until Ctrl-C
//! - `init` - write a starter `config.toml` and create the data directory
//! - `status [--json]` - print farm stage counts from the store
//!
//! See the library crate docs for module-level details: `reelbot::`.
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use serde::Serialize;

use reelbot::config::Config;
use reelbot::farm::{CropStage, FarmStore};
use reelbot::server::GameServer;
use reelbot::storage::SledFarmStore;

#[derive(Parser)]
#[command(name = "reelbot")]
#[command(about = "Game server core for a chat-driven fishing, farming and digging bot")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the game server
    Start,
    /// Write a default configuration file
    Init,
    /// Show farm statistics
    Status {
        /// Print machine-readable JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Default, Serialize)]
struct FarmStatus {
    farms: usize,
    planted: usize,
    growing: usize,
    ready: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start => {
            let config = Config::load(&cli.config).await?;
            init_logging(Some(&config), cli.verbose);
            info!("Starting reelbot v{}", env!("CARGO_PKG_VERSION"));
            let mut server = GameServer::new(config).await?;
            server.run().await?;
        }
        Commands::Init => {
            init_logging(None, cli.verbose);
            info!("Initializing new reelbot configuration");
            let cfg = Config::default();
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
            tokio::fs::create_dir_all(&cfg.storage.data_dir).await?;
            info!("Data directory ready at {}", cfg.storage.data_dir);
        }
        Commands::Status { json } => {
            let config = Config::load(&cli.config).await?;
            init_logging(Some(&config), cli.verbose);
            let store = SledFarmStore::open(config.storage.farms_path())?;
            let status = farm_status(&store).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("reelbot v{}", env!("CARGO_PKG_VERSION"));
                println!("Farm store: {}", store.path().display());
                println!("Farms: {}", status.farms);
                println!(
                    "Crops: {} planted, {} growing, {} ready",
                    status.planted, status.growing, status.ready
                );
            }
        }
    }

    Ok(())
}

async fn farm_status(store: &dyn FarmStore) -> Result<FarmStatus> {
    let farms = store.fetch_all_farms().await?;
    let mut status = FarmStatus {
        farms: farms.len(),
        ..FarmStatus::default()
    };
    for farm in &farms {
        status.planted += farm.count_in(CropStage::Planted);
        status.growing += farm.count_in(CropStage::Growing);
        status.ready += farm.ready_count();
    }
    Ok(status)
}

fn init_logging(config: Option<&Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // Config sets the floor; each -v raises it one step
    let configured = config
        .and_then(|c| c.logging.level.parse::<log::LevelFilter>().ok())
        .unwrap_or(log::LevelFilter::Info);
    let base_level = match verbosity {
        0 => configured,
        1 => configured.max(log::LevelFilter::Debug),
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });

    if let Some(f) = log_file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Mirror to the console only when attached to a terminal
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            writeln!(
                fmt,
                "{} [{}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                record.level(),
                record.args()
            )
        });
    }
    let _ = builder.try_init();
}
