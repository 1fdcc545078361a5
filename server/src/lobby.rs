//! One running game: a fixed set of player slots and their simulation.

use crate::session::PlayerSession;
use crate::simulation::{Simulation, Snapshot};
use log::{error, info};
use shared::SlotAssignment;
use std::time::Duration;

pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_millis(10_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyState {
    Active,
    /// Reserved; nothing moves a lobby into or out of this state yet.
    Paused,
    /// Terminal. The lobby is pruned on the next scheduling pass.
    Dead,
}

pub struct Lobby {
    state: LobbyState,
    slots: Vec<PlayerSession>,
    simulation: Simulation,
    last_active: Duration,
    inactivity_timeout: Duration,
    /// Gem positions only go out until one snapshot has been delivered.
    gems_announced: bool,
}

impl Lobby {
    /// Seats `sessions` in arrival order and tells each one its slot.
    pub fn new(sessions: Vec<PlayerSession>, simulation: Simulation, now: Duration) -> Self {
        for (slot, session) in sessions.iter().enumerate() {
            session.send_json(&SlotAssignment::new(slot));
        }
        Self {
            state: LobbyState::Active,
            slots: sessions,
            simulation,
            last_active: now,
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            gems_announced: false,
        }
    }

    pub fn with_inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    pub fn state(&self) -> LobbyState {
        self.state
    }

    pub fn is_dead(&self) -> bool {
        self.state == LobbyState::Dead
    }

    pub fn slots(&self) -> &[PlayerSession] {
        &self.slots
    }

    pub fn slot_mut(&mut self, slot: usize) -> Option<&mut PlayerSession> {
        self.slots.get_mut(slot)
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    pub fn simulation_mut(&mut self) -> &mut Simulation {
        &mut self.simulation
    }

    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(PlayerSession::identity)
    }

    /// Steps the simulation and broadcasts the snapshot to every slot.
    ///
    /// Any successful delivery refreshes the lobby. With no delivery for at
    /// least the inactivity timeout the lobby dies.
    pub fn tick(&mut self, now: Duration) {
        if self.is_dead() {
            return;
        }

        let snapshot = self
            .simulation
            .step(now, self.slots.iter_mut().map(|session| &mut session.input));
        let delivered = self.broadcast(&snapshot);
        self.record_delivery(delivered, now);
    }

    /// Returns whether at least one slot accepted the snapshot.
    fn broadcast(&self, snapshot: &Snapshot) -> bool {
        let payload = match serde_json::to_string(&snapshot.render_data(!self.gems_announced)) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to serialize render data: {}", e);
                return false;
            }
        };
        let mut delivered = false;
        for session in &self.slots {
            if session.send(&payload) {
                delivered = true;
            }
        }
        delivered
    }

    fn record_delivery(&mut self, delivered: bool, now: Duration) {
        if delivered {
            self.gems_announced = true;
            self.last_active = now;
        } else if now.saturating_sub(self.last_active) >= self.inactivity_timeout {
            info!(
                "Lobby with {} went inactive",
                self.identities().collect::<Vec<_>>().join(", ")
            );
            self.state = LobbyState::Dead;
        }
    }

    /// Seats `session` in `slot` if the lobby is alive and the slot's current
    /// occupant is disconnected. On refusal the session is handed back.
    pub fn rejoin(
        &mut self,
        session: PlayerSession,
        slot: usize,
        now: Duration,
    ) -> Result<(), PlayerSession> {
        if self.is_dead() {
            return Err(session);
        }
        let Some(occupant) = self.slots.get_mut(slot) else {
            return Err(session);
        };
        if occupant.is_valid() {
            return Err(session);
        }

        *occupant = session;
        occupant.send_json(&SlotAssignment::new(slot));
        info!("{} rejoined slot {}", occupant.identity(), slot);

        self.last_active = now;
        self.gems_announced = false;
        Ok(())
    }
}
