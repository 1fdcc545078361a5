//! Player sessions: one authenticated identity bound to one live connection.

use log::{debug, error};
use serde::Serialize;
use shared::{DirectionKey, InputEvent};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Server-assigned id of one transport connection.
pub type ConnectionId = u64;

/// Lifecycle of a transport connection, mirroring the WebSocket ready states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ReadyState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }
}

/// Handle to a connection's writer task and shared ready state.
///
/// The connection task owns the socket; this handle only queues outbound
/// frames and observes state changes.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    state: Arc<AtomicU8>,
    outbound: mpsc::UnboundedSender<Message>,
}

impl Connection {
    /// Creates a handle in the `Connecting` state together with the receiving
    /// end of its outbound queue.
    pub fn new(id: ConnectionId) -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (outbound, receiver) = mpsc::unbounded_channel();
        let connection = Self {
            id,
            state: Arc::new(AtomicU8::new(ReadyState::Connecting as u8)),
            outbound,
        };
        (connection, receiver)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn set_ready_state(&self, state: ReadyState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Starts a close handshake. No-op on a connection that is already closing.
    pub fn close(&self) {
        match self.ready_state() {
            ReadyState::Closing | ReadyState::Closed => {}
            ReadyState::Connecting | ReadyState::Open => {
                self.set_ready_state(ReadyState::Closing);
                let _ = self.outbound.send(Message::Close(None));
            }
        }
    }

    fn transmit(&self, payload: &str) -> bool {
        if self.outbound.send(Message::Text(payload.to_owned())).is_err() {
            // Writer task is gone, so is the socket.
            self.set_ready_state(ReadyState::Closed);
            return false;
        }
        true
    }
}

/// Latest edge-triggered input state of one player.
///
/// Updates overwrite each other; only the state at tick time is observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputState {
    pub direction_key: DirectionKey,
    pub direction_key_down: bool,
    /// Consumed by the next simulation step whether or not a jump happens.
    pub pending_jump: bool,
}

impl InputState {
    pub fn apply(&mut self, event: InputEvent) {
        match event {
            InputEvent::KeyDown(key) => {
                self.direction_key = key;
                self.direction_key_down = true;
            }
            InputEvent::KeyUp(key) => {
                self.direction_key = key;
                self.direction_key_down = false;
            }
            InputEvent::JumpPressed => self.pending_jump = true,
            InputEvent::JumpReleased => {}
        }
    }

    /// The direction currently held down, if any.
    pub fn held(&self) -> Option<DirectionKey> {
        match (self.direction_key_down, self.direction_key) {
            (true, DirectionKey::Left | DirectionKey::Right) => Some(self.direction_key),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct PlayerSession {
    identity: String,
    connection: Connection,
    pub input: InputState,
}

impl PlayerSession {
    pub fn new(identity: impl Into<String>, connection: Connection) -> Self {
        Self {
            identity: identity.into(),
            connection,
            input: InputState::default(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection.id()
    }

    /// True while the connection is open.
    ///
    /// A connection still in `Connecting` at this point means it was handed
    /// over before its handshake finished. That never happens in correct
    /// operation, so the connection is closed and reported invalid.
    pub fn is_valid(&self) -> bool {
        match self.connection.ready_state() {
            ReadyState::Open => true,
            ReadyState::Closing | ReadyState::Closed => false,
            ReadyState::Connecting => {
                error!(
                    "Session {} handed over while connection {} was still connecting; closing it",
                    self.identity,
                    self.connection.id()
                );
                self.connection.close();
                false
            }
        }
    }

    /// Queues `payload` if the session is valid. Returns whether it was sent.
    pub fn send(&self, payload: &str) -> bool {
        self.is_valid() && self.connection.transmit(payload)
    }

    pub fn send_json<T: Serialize>(&self, message: &T) -> bool {
        match serde_json::to_string(message) {
            Ok(payload) => self.send(&payload),
            Err(e) => {
                error!("Failed to serialize message for {}: {}", self.identity, e);
                false
            }
        }
    }

    pub fn apply_input(&mut self, event: InputEvent) {
        debug!("Input {:?} from {}", event, self.identity);
        self.input.apply(event);
    }
}
