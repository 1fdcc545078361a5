//! Wire protocol shared by the game server and its headless client.
//!
//! Inbound traffic (client to server) is a stream of two-byte ASCII control
//! codes. Outbound traffic (server to client) is JSON text.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of player slots in every lobby.
pub const LOBBY_SIZE: usize = 2;
/// Number of gems placed in every game.
pub const GEM_COUNT: usize = 10;

pub const RENDER_DATA_MESSAGE: &str = "renderData";
pub const CREDENTIAL_MESSAGE: &str = "credential";

/// Horizontal direction key last reported by a client.
///
/// The numeric codes are what the browser client expects in `facing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectionKey {
    #[default]
    None,
    Left,
    Right,
}

impl DirectionKey {
    pub fn code(self) -> u8 {
        match self {
            DirectionKey::None => 0,
            DirectionKey::Left => 2,
            DirectionKey::Right => 3,
        }
    }
}

/// One decoded client control code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// `A0` / `D0`
    KeyDown(DirectionKey),
    /// `A1` / `D1`
    KeyUp(DirectionKey),
    /// `" 0"`
    JumpPressed,
    /// `" 1"`, accepted but carries no meaning since jumps are edge-triggered
    JumpReleased,
}

impl InputEvent {
    /// Decodes a control code. Anything that is not exactly one of the known
    /// two-byte codes yields `None`.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let &[key, state] = data else {
            return None;
        };
        let pressed = match state {
            b'0' => true,
            b'1' => false,
            _ => return None,
        };
        match (key, pressed) {
            (b'A', true) => Some(InputEvent::KeyDown(DirectionKey::Left)),
            (b'A', false) => Some(InputEvent::KeyUp(DirectionKey::Left)),
            (b'D', true) => Some(InputEvent::KeyDown(DirectionKey::Right)),
            (b'D', false) => Some(InputEvent::KeyUp(DirectionKey::Right)),
            (b' ', true) => Some(InputEvent::JumpPressed),
            (b' ', false) => Some(InputEvent::JumpReleased),
            _ => None,
        }
    }

    /// Encodes the event the way the browser client sends it.
    pub fn encode(self) -> &'static str {
        match self {
            InputEvent::KeyDown(DirectionKey::Left) => "A0",
            InputEvent::KeyUp(DirectionKey::Left) => "A1",
            InputEvent::KeyDown(DirectionKey::Right) => "D0",
            InputEvent::KeyUp(DirectionKey::Right) => "D1",
            InputEvent::JumpPressed => " 0",
            InputEvent::JumpReleased | InputEvent::KeyDown(_) | InputEvent::KeyUp(_) => " 1",
        }
    }
}

/// Sent once per slot when a lobby is formed or a slot is re-joined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotAssignment {
    pub message: String,
}

impl SlotAssignment {
    pub fn new(slot: usize) -> Self {
        Self {
            message: format!("Player {}", slot),
        }
    }

    pub fn slot(&self) -> Option<usize> {
        self.message.strip_prefix("Player ")?.parse().ok()
    }
}

/// Credential handed out on the login route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialGrant {
    pub message: String,
    pub token: String,
}

impl CredentialGrant {
    pub fn new(token: String) -> Self {
        Self {
            message: CREDENTIAL_MESSAGE.to_string(),
            token,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterView {
    pub pos: [f32; 3],
    pub facing: u8,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GemView {
    /// Only present in the first snapshot a lobby delivers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<[f32; 3]>,
    pub collected: bool,
}

/// Per-tick world snapshot: `player1`, `player2` and `gem1`..`gem10`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderData {
    pub message: String,
    /// Milliseconds since the server clock origin.
    pub time: f64,
    pub player1: CharacterView,
    pub player2: CharacterView,
    #[serde(flatten)]
    pub gems: BTreeMap<String, GemView>,
}

impl RenderData {
    pub fn new(time: f64, players: [CharacterView; LOBBY_SIZE], gems: Vec<GemView>) -> Self {
        let [player1, player2] = players;
        let gems = gems
            .into_iter()
            .enumerate()
            .map(|(index, gem)| (gem_key(index), gem))
            .collect();
        Self {
            message: RENDER_DATA_MESSAGE.to_string(),
            time,
            player1,
            player2,
            gems,
        }
    }

    /// Gem by zero-based index.
    pub fn gem(&self, index: usize) -> Option<&GemView> {
        self.gems.get(&gem_key(index))
    }

    pub fn player(&self, slot: usize) -> Option<&CharacterView> {
        match slot {
            0 => Some(&self.player1),
            1 => Some(&self.player2),
            _ => None,
        }
    }
}

fn gem_key(index: usize) -> String {
    format!("gem{}", index + 1)
}

/// Any message the server may send, for client-side decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Render(RenderData),
    Credential(CredentialGrant),
    Slot(SlotAssignment),
}

impl ServerMessage {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
