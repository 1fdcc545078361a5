//! Per-lobby physics and gem pickup.
//!
//! Each step integrates with the real time elapsed since the previous step,
//! so movement speed does not depend on how often a lobby is ticked.

use crate::level::Level;
use crate::physics::{is_blocked, Axis, Collider, Vec3};
use crate::session::InputState;
use log::warn;
use rand::seq::SliceRandom;
use rand::Rng;
use shared::{CharacterView, DirectionKey, GemView, RenderData, GEM_COUNT, LOBBY_SIZE};
use std::sync::Arc;
use std::time::Duration;

pub const RUN_SPEED: f32 = 10.0;
pub const GRAVITY: f32 = -25.0;
pub const MAX_FALL_SPEED: f32 = 20.0;
/// Grounded horizontal speed is divided by this every step without input.
pub const GROUND_DECELERATION: f32 = 1.2;
pub const JUMP_SPEED: f32 = 10.0;
pub const MAX_AIR_SPEED: f32 = 5.0;
pub const AIR_ACCELERATION: f32 = 100.0;
/// Depth of the below-feet probe that decides whether a character is supported.
pub const GROUND_PROBE: f32 = 0.05;
pub const PICKUP_RADIUS: f32 = 0.5;

pub const DEFAULT_MAX_STEP: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Character {
    pub pos: Vec3,
    pub velocity: Vec3,
    pub facing: DirectionKey,
    pub grounded: bool,
    pub score: u32,
}

impl Character {
    pub fn new(pos: Vec3) -> Self {
        Self {
            pos,
            velocity: Vec3::default(),
            facing: DirectionKey::None,
            grounded: true,
            score: 0,
        }
    }

    /// Advances one step of `t` seconds, consuming any pending jump.
    pub fn step(&mut self, input: &mut InputState, t: f32, colliders: &[Collider]) {
        if input.pending_jump {
            if self.grounded {
                self.velocity.z = JUMP_SPEED;
                self.grounded = false;
            }
            input.pending_jump = false;
        }

        if self.grounded {
            self.step_grounded(input, t, colliders);
        } else {
            self.step_airborne(input, t, colliders);
        }
    }

    fn step_grounded(&mut self, input: &InputState, t: f32, colliders: &[Collider]) {
        match input.held() {
            Some(key) => {
                self.velocity.x = match key {
                    DirectionKey::Left => -RUN_SPEED,
                    _ => RUN_SPEED,
                };
                self.facing = key;
            }
            None => self.velocity.x /= GROUND_DECELERATION,
        }

        self.move_horizontally(t, colliders);

        let probe = Vec3::new(self.pos.x, self.pos.y, self.pos.z - GROUND_PROBE);
        if !is_blocked(colliders, probe, Axis::Vertical) {
            self.grounded = false;
        }
    }

    fn step_airborne(&mut self, input: &InputState, t: f32, colliders: &[Collider]) {
        self.velocity.z = (self.velocity.z + GRAVITY * t).max(-MAX_FALL_SPEED);

        if let Some(key) = input.held() {
            // Turning around in the air kills horizontal momentum.
            if self.facing != key {
                self.velocity.x = 0.0;
            }
            match key {
                DirectionKey::Left if self.velocity.x > -MAX_AIR_SPEED => {
                    self.velocity.x = (self.velocity.x - AIR_ACCELERATION * t).max(-MAX_AIR_SPEED);
                }
                DirectionKey::Right if self.velocity.x < MAX_AIR_SPEED => {
                    self.velocity.x = (self.velocity.x + AIR_ACCELERATION * t).min(MAX_AIR_SPEED);
                }
                _ => {}
            }
            self.facing = key;
        }

        self.move_horizontally(t, colliders);

        let target = Vec3::new(self.pos.x, self.pos.y, self.pos.z + self.velocity.z * t);
        if is_blocked(colliders, target, Axis::Vertical) {
            // Landed: stay at the pre-collision height. Vertical speed is kept
            // and carries over if the character later walks off a ledge.
            self.grounded = true;
        } else {
            self.pos.z = target.z;
        }
    }

    fn move_horizontally(&mut self, t: f32, colliders: &[Collider]) {
        let target = Vec3::new(self.pos.x + self.velocity.x * t, self.pos.y, self.pos.z);
        if !is_blocked(colliders, target, Axis::Horizontal) {
            self.pos.x = target.x;
        }
    }

    pub fn view(&self) -> CharacterView {
        CharacterView {
            pos: self.pos.to_array(),
            facing: self.facing.code(),
            score: self.score,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gem {
    pub pos: Vec3,
    /// Never reverts once set.
    pub collected: bool,
}

impl Gem {
    pub fn view(&self, include_position: bool) -> GemView {
        GemView {
            pos: include_position.then(|| self.pos.to_array()),
            collected: self.collected,
        }
    }
}

/// World state after one step.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub time: Duration,
    pub characters: [Character; LOBBY_SIZE],
    pub gems: Vec<Gem>,
}

impl Snapshot {
    pub fn render_data(&self, include_gem_positions: bool) -> RenderData {
        RenderData::new(
            self.time.as_secs_f64() * 1000.0,
            self.characters.map(|c| c.view()),
            self.gems
                .iter()
                .map(|gem| gem.view(include_gem_positions))
                .collect(),
        )
    }
}

pub struct Simulation {
    level: Arc<Level>,
    characters: [Character; LOBBY_SIZE],
    gems: Vec<Gem>,
    last_step: Duration,
    max_step: Duration,
}

impl Simulation {
    /// Places characters on the level's spawns and draws the gems, without
    /// replacement, from its candidate sites.
    pub fn new<R: Rng + ?Sized>(level: Arc<Level>, rng: &mut R, now: Duration) -> Self {
        let characters = std::array::from_fn(|slot| {
            Character::new(level.spawns.get(slot).copied().unwrap_or_default())
        });
        let gems = level
            .gem_sites
            .choose_multiple(rng, GEM_COUNT)
            .map(|&pos| Gem {
                pos,
                collected: false,
            })
            .collect();

        Self {
            level,
            characters,
            gems,
            last_step: now,
            max_step: DEFAULT_MAX_STEP,
        }
    }

    /// Caps the time a single step may integrate over.
    pub fn with_max_step(mut self, max_step: Duration) -> Self {
        self.max_step = max_step;
        self
    }

    pub fn characters(&self) -> &[Character; LOBBY_SIZE] {
        &self.characters
    }

    pub fn character_mut(&mut self, slot: usize) -> Option<&mut Character> {
        self.characters.get_mut(slot)
    }

    pub fn gems(&self) -> &[Gem] {
        &self.gems
    }

    /// Advances every character using the matching slot's input.
    pub fn step<'a, I>(&mut self, now: Duration, inputs: I) -> Snapshot
    where
        I: IntoIterator<Item = &'a mut InputState>,
    {
        let mut elapsed = now.saturating_sub(self.last_step);
        if elapsed > self.max_step {
            warn!(
                "Large delta time detected ({:.3}s), capping to {:.3}s",
                elapsed.as_secs_f32(),
                self.max_step.as_secs_f32()
            );
            elapsed = self.max_step;
        }
        self.last_step = now;
        let t = elapsed.as_secs_f32();

        for (character, input) in self.characters.iter_mut().zip(inputs) {
            character.step(input, t, &self.level.colliders);
            collect_gem(character, &mut self.gems);
        }

        Snapshot {
            time: now,
            characters: self.characters,
            gems: self.gems.clone(),
        }
    }
}

/// Awards at most one uncollected gem within reach, first in gem order.
fn collect_gem(character: &mut Character, gems: &mut [Gem]) {
    let reach = PICKUP_RADIUS * PICKUP_RADIUS;
    if let Some(gem) = gems
        .iter_mut()
        .find(|gem| !gem.collected && gem.pos.distance_squared(&character.pos) <= reach)
    {
        gem.collected = true;
        character.score += 1;
    }
}
