//! Process-wide game bookkeeping: the matchmaking queue, the live lobbies and
//! the table routing each identity to its lobby slot.
//!
//! Everything here runs on the single event-loop task. Connection tasks talk
//! to it through [`ServerEvent`]s and the two periodic timers call
//! [`Coordinator::promote_queue`] and [`Coordinator::round_robin`].

use crate::clock::SharedClock;
use crate::config::ServerConfig;
use crate::level::Level;
use crate::lobby::Lobby;
use crate::queue::MatchmakingQueue;
use crate::session::{ConnectionId, PlayerSession};
use crate::simulation::Simulation;
use crate::stable_list::{Handle, StableList, Step};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::InputEvent;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Messages sent from connection tasks to the event loop.
#[derive(Debug)]
pub enum ServerEvent {
    /// An authenticated connection finished its handshake.
    Admit(PlayerSession),
    Input {
        connection_id: ConnectionId,
        identity: String,
        event: InputEvent,
    },
}

/// Where an identity was last seated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub lobby: Handle,
    pub slot: usize,
}

pub struct Coordinator {
    queue: MatchmakingQueue,
    lobbies: StableList<Lobby>,
    routes: HashMap<String, Route>,
    level: Arc<Level>,
    clock: SharedClock,
    rng: StdRng,
    inactivity_timeout: Duration,
    max_step: Duration,
}

impl Coordinator {
    pub fn new(level: Arc<Level>, clock: SharedClock, config: &ServerConfig) -> Self {
        Self {
            queue: MatchmakingQueue::new(config.lobby_size),
            lobbies: StableList::new(),
            routes: HashMap::new(),
            level,
            clock,
            rng: StdRng::from_entropy(),
            inactivity_timeout: config.inactivity_timeout,
            max_step: config.max_step,
        }
    }

    /// Makes gem placement reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn handle_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Admit(session) => self.admit(session),
            ServerEvent::Input {
                connection_id,
                identity,
                event,
            } => self.apply_input(connection_id, &identity, event),
        }
    }

    /// Seats `session` back in its previous lobby slot if possible, otherwise
    /// queues it.
    ///
    /// A slot still held by a live connection is never taken over: the route
    /// is dropped and the newcomer goes back to matchmaking.
    pub fn admit(&mut self, mut session: PlayerSession) {
        let now = self.clock.now();
        if let Some(route) = self.routes.get(session.identity()).copied() {
            if let Some(lobby) = self.lobbies.get_mut(route.lobby) {
                match lobby.rejoin(session, route.slot, now) {
                    Ok(()) => return,
                    Err(rejected) => session = rejected,
                }
            }
            debug!(
                "Dropping stale route of {} to slot {}",
                session.identity(),
                route.slot
            );
            self.routes.remove(session.identity());
        }
        self.queue.enqueue(session);
    }

    /// Creates a lobby for `sessions` and routes every participant to it.
    pub fn form_lobby(&mut self, sessions: Vec<PlayerSession>) -> Handle {
        let now = self.clock.now();
        let identities: Vec<String> = sessions
            .iter()
            .map(|session| session.identity().to_owned())
            .collect();

        let simulation = Simulation::new(Arc::clone(&self.level), &mut self.rng, now)
            .with_max_step(self.max_step);
        let lobby = Lobby::new(sessions, simulation, now)
            .with_inactivity_timeout(self.inactivity_timeout);
        let handle = self.lobbies.push_back(lobby);

        info!(
            "Formed lobby for {} ({} live)",
            identities.join(", "),
            self.lobbies.len()
        );
        for (slot, identity) in identities.into_iter().enumerate() {
            self.routes.insert(
                identity,
                Route {
                    lobby: handle,
                    slot,
                },
            );
        }
        handle
    }

    /// Matchmaking tick: forms at most one lobby from the queue.
    pub fn promote_queue(&mut self) -> Option<Handle> {
        let group = self.queue.promote()?;
        Some(self.form_lobby(group))
    }

    /// Lobby tick: prunes dead lobbies and their routes, ticks the rest.
    pub fn round_robin(&mut self) {
        let now = self.clock.now();
        let routes = &mut self.routes;
        let mut cursor = self.lobbies.cursor_front_mut();
        while !cursor.at_back() {
            if cursor.value().is_some_and(Lobby::is_dead) {
                let handle = cursor.handle();
                if let (Some(handle), Some(lobby)) = (handle, cursor.remove(Step::Forward)) {
                    for identity in lobby.identities() {
                        if routes.get(identity).is_some_and(|r| r.lobby == handle) {
                            routes.remove(identity);
                        }
                    }
                    info!(
                        "Pruned dead lobby of {}",
                        lobby.identities().collect::<Vec<_>>().join(", ")
                    );
                }
                continue;
            }
            if let Some(lobby) = cursor.value_mut() {
                lobby.tick(now);
            }
            cursor.advance();
        }
    }

    /// Applies input from `connection_id` to the session it belongs to. Input
    /// from a connection that no longer owns its identity's seat is dropped.
    pub fn apply_input(&mut self, connection_id: ConnectionId, identity: &str, event: InputEvent) {
        if let Some(route) = self.routes.get(identity) {
            let seated = self
                .lobbies
                .get_mut(route.lobby)
                .and_then(|lobby| lobby.slot_mut(route.slot))
                .filter(|session| session.connection_id() == connection_id);
            if let Some(session) = seated {
                session.apply_input(event);
                return;
            }
        }
        match self.queue.find_mut(connection_id) {
            Some(session) => session.apply_input(event),
            None => debug!("Dropped input from unseated connection {}", connection_id),
        }
    }

    pub fn queue(&self) -> &MatchmakingQueue {
        &self.queue
    }

    pub fn lobbies(&self) -> &StableList<Lobby> {
        &self.lobbies
    }

    pub fn lobby(&self, handle: Handle) -> Option<&Lobby> {
        self.lobbies.get(handle)
    }

    pub fn lobby_mut(&mut self, handle: Handle) -> Option<&mut Lobby> {
        self.lobbies.get_mut(handle)
    }

    pub fn route(&self, identity: &str) -> Option<Route> {
        self.routes.get(identity).copied()
    }
}
