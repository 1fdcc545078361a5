//! Runtime settings of the game server.

use crate::lobby::DEFAULT_INACTIVITY_TIMEOUT;
use crate::simulation::DEFAULT_MAX_STEP;
use shared::LOBBY_SIZE;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(4);
pub const DEFAULT_QUEUE_INTERVAL: Duration = Duration::from_millis(2_000);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to. Port 0 picks a free port.
    pub bind_addr: String,
    /// Period of the round-robin lobby tick.
    pub tick_interval: Duration,
    /// Period of the matchmaking scan.
    pub queue_interval: Duration,
    pub inactivity_timeout: Duration,
    /// Largest time step a single simulation tick integrates over.
    pub max_step: Duration,
    pub lobby_size: usize,
    /// Credential signing secret. Random per process when unset.
    pub secret: Option<String>,
    /// JSON level file. The built-in level is used when unset.
    pub level_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            queue_interval: DEFAULT_QUEUE_INTERVAL,
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            max_step: DEFAULT_MAX_STEP,
            lobby_size: LOBBY_SIZE,
            secret: None,
            level_path: None,
        }
    }
}
