//! # Game Server Library
//!
//! Authoritative server for a two-player platformer played in the browser.
//! It admits authenticated identities, groups them into lobbies, runs one
//! physics simulation per lobby and streams the world state to both players.
//!
//! ## Core Responsibilities
//!
//! ### Matchmaking
//! Authenticated connections wait in a queue until enough of them are still
//! connected to fill a lobby. Dead connections are pruned while the queue is
//! scanned, without a second pass.
//!
//! ### Lobby Lifecycle
//! A lobby owns two player slots and a simulation. It is ticked on a fixed
//! interval, broadcasts a snapshot after every step and dies once nobody has
//! received anything for the inactivity timeout. A player who reconnects
//! with the same identity gets their old slot back.
//!
//! ### Authoritative Simulation
//! Character movement, one-sided segment collision and gem pickup run only
//! here. Clients send key edges and render whatever the server reports.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! The [`coordinator::Coordinator`] and everything it owns live on one task.
//! Connection tasks never touch that state; they send
//! [`coordinator::ServerEvent`]s over a channel and the loop applies them
//! between ticks. No locks are involved.
//!
//! ### Stable Collections
//! The queue and the set of live lobbies are [`stable_list::StableList`]s:
//! a scan can unlink the element under its cursor and carry on, and handles
//! to removed elements never resolve to a reused slot.
//!
//! ### Injectable Time
//! Lobbies and simulations read time from a [`clock::Clock`]. Production uses
//! the system clock; tests drive a manual one and call the tick methods
//! directly.
//!
//! ## Module Organization
//!
//! - `stable_list`: arena-backed linked list with a removing cursor
//! - `session`: connection handles and per-player input state
//! - `queue`: the matchmaking queue
//! - `lobby`: one game, its slots and inactivity tracking
//! - `physics`: vectors, colliders and the blocking test
//! - `simulation`: character kinematics and gems
//! - `level`: static level geometry and gem sites
//! - `coordinator`: routing table, lobby formation and round-robin ticking
//! - `auth`: credential issue and validation
//! - `network`: WebSocket transport and the event loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::level::Level;
//! use server::network::Server;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         bind_addr: "127.0.0.1:8080".to_string(),
//!         ..ServerConfig::default()
//!     };
//!     let mut server = Server::bind(config, Arc::new(Level::default())).await?;
//!
//!     // Accepts connections, forms lobbies every 2 s and ticks every
//!     // live lobby every 4 ms until the process exits.
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod level;
pub mod lobby;
pub mod network;
pub mod physics;
pub mod queue;
pub mod session;
pub mod simulation;
pub mod stable_list;
