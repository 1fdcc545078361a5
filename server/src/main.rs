use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::level::Level;
use server::network::Server;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Lobby tick interval in milliseconds
    #[clap(long, default_value = "4")]
    tick_ms: u64,
    /// Matchmaking scan interval in milliseconds
    #[clap(long, default_value = "2000")]
    queue_ms: u64,
    /// Time without any delivered snapshot before a lobby is closed
    #[clap(long, default_value = "10000")]
    inactivity_ms: u64,
    /// Largest time step a simulation integrates in one tick
    #[clap(long, default_value = "50")]
    max_delta_ms: u64,
    /// Credential signing secret; random when omitted
    #[clap(long)]
    secret: Option<String>,
    /// JSON level file; the built-in level when omitted
    #[clap(long)]
    level: Option<PathBuf>,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        ServerConfig {
            bind_addr: format!("{}:{}", args.host, args.port),
            tick_interval: Duration::from_millis(args.tick_ms),
            queue_interval: Duration::from_millis(args.queue_ms),
            inactivity_timeout: Duration::from_millis(args.inactivity_ms),
            max_step: Duration::from_millis(args.max_delta_ms),
            secret: args.secret,
            level_path: args.level,
            ..ServerConfig::default()
        }
    }
}

/// Parses command-line arguments, loads the level and runs the server until
/// it fails or Ctrl+C is pressed.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from(Args::parse());
    let level = match &config.level_path {
        Some(path) => {
            info!("Loading level from {}", path.display());
            Level::load(path)?
        }
        None => Level::default(),
    };

    let mut server = Server::bind(config, Arc::new(level)).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
