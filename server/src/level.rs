//! Static level geometry shared read-only by every simulation.

use crate::error::{Result, ServerError};
use crate::physics::{block, Collider, Vec3};
use serde::{Deserialize, Serialize};
use shared::{GEM_COUNT, LOBBY_SIZE};
use std::path::Path;

/// Candidate gem positions; each game draws its gems from these.
const GEM_SITES: [[f32; 3]; 50] = [
    [8.0, 0.0, 3.0],
    [10.0, 0.0, 4.5],
    [8.0, 0.0, 6.0],
    [10.0, 0.0, 7.5],
    [12.0, 0.0, 7.5],
    [14.0, 0.0, 1.0],
    [14.0, 0.0, 6.5],
    [17.0, 0.0, 7.5],
    [20.0, 0.0, 6.5],
    [18.5, 0.0, 2.5],
    [21.5, 0.0, 5.5],
    [23.0, 0.0, 4.0],
    [26.0, 0.0, 6.5],
    [24.0, 0.0, 8.0],
    [22.0, 0.0, 9.5],
    [20.0, 0.0, 11.0],
    [22.0, 0.0, 12.5],
    [24.0, 0.0, 14.0],
    [26.0, 0.0, 15.5],
    [28.0, 0.0, 14.0],
    [30.0, 0.0, 12.5],
    [32.0, 0.0, 11.0],
    [30.0, 0.0, 9.5],
    [28.0, 0.0, 8.0],
    [8.0, 0.0, 9.0],
    [10.0, 0.0, 10.5],
    [13.0, 0.0, 12.0],
    [17.0, 0.0, 13.5],
    [8.0, 0.0, 11.0],
    [10.0, 0.0, 13.0],
    [13.0, 0.0, 9.0],
    [13.0, 0.0, 14.0],
    [15.0, 0.0, 3.0],
    [15.0, 0.0, 9.0],
    [17.0, 0.0, 5.0],
    [17.0, 0.0, 10.0],
    [19.0, 0.0, 9.0],
    [20.0, 0.0, 14.0],
    [22.0, 0.0, 15.0],
    [24.0, 0.0, 10.0],
    [24.0, 0.0, 16.0],
    [26.0, 0.0, 2.0],
    [26.0, 0.0, 8.0],
    [26.0, 0.0, 10.0],
    [26.0, 0.0, 12.0],
    [26.0, 0.0, 17.0],
    [28.0, 0.0, 10.0],
    [28.0, 0.0, 16.0],
    [30.0, 0.0, 15.0],
    [32.0, 0.0, 14.0],
];

/// Solid blocks of the built-in level as (min_x, min_z, max_x, max_z).
const BLOCKS: [[f32; 4]; 14] = [
    // ground, walls
    [-1.0, -1.0, 41.0, 0.0],
    [-1.0, 0.0, 0.0, 20.0],
    [40.0, 0.0, 41.0, 20.0],
    // staircase of ledges, each within one jump of the previous
    [11.0, 1.5, 15.0, 2.0],
    [17.0, 2.5, 21.0, 3.0],
    [22.0, 4.0, 26.0, 4.5],
    [27.0, 5.5, 31.0, 6.0],
    [22.0, 7.0, 26.0, 7.5],
    [16.0, 8.5, 20.0, 9.0],
    [9.0, 10.0, 14.0, 10.5],
    [16.0, 11.5, 20.0, 12.0],
    [22.0, 13.0, 26.0, 13.5],
    [27.0, 14.5, 31.0, 15.0],
    [22.0, 16.0, 26.0, 16.5],
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Level {
    pub colliders: Vec<Collider>,
    /// Starting position of each slot's character.
    pub spawns: Vec<Vec3>,
    pub gem_sites: Vec<Vec3>,
}

impl Level {
    /// Builds a level, checking it can host a full game.
    pub fn new(colliders: Vec<Collider>, spawns: Vec<Vec3>, gem_sites: Vec<Vec3>) -> Result<Self> {
        if spawns.len() < LOBBY_SIZE {
            return Err(ServerError::Level(format!(
                "need {} spawn points, got {}",
                LOBBY_SIZE,
                spawns.len()
            )));
        }
        if gem_sites.len() < GEM_COUNT {
            return Err(ServerError::Level(format!(
                "need at least {} gem sites, got {}",
                GEM_COUNT,
                gem_sites.len()
            )));
        }
        Ok(Self {
            colliders,
            spawns,
            gem_sites,
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let level: Level = serde_json::from_str(json)?;
        Level::new(level.colliders, level.spawns, level.gem_sites)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

impl Default for Level {
    fn default() -> Self {
        let mut colliders: Vec<Collider> = BLOCKS
            .iter()
            .flat_map(|&[min_x, min_z, max_x, max_z]| block(min_x, min_z, max_x, max_z))
            .collect();
        // Background trim drawn behind the ledges.
        colliders.push(Collider::decorative(
            Vec3::new(0.0, 0.0, 19.0),
            Vec3::new(40.0, 0.0, 19.0),
        ));

        Self {
            colliders,
            spawns: vec![Vec3::new(3.0, 0.0, 0.0), Vec3::new(5.0, 0.0, 0.0)],
            gem_sites: GEM_SITES.iter().map(|&site| Vec3::from(site)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{is_blocked, Axis};

    #[test]
    fn test_default_level_is_playable() {
        let level = Level::default();
        assert_eq!(level.colliders.len(), BLOCKS.len() * 4 + 1);
        assert_eq!(level.gem_sites.len(), 50);
        assert!(Level::new(level.colliders.clone(), level.spawns.clone(), level.gem_sites.clone()).is_ok());
    }

    #[test]
    fn test_spawns_stand_on_the_ground() {
        let level = Level::default();
        for spawn in &level.spawns {
            let probe = Vec3::new(spawn.x, spawn.y, spawn.z - 0.05);
            assert!(is_blocked(&level.colliders, probe, Axis::Vertical));
            assert!(!is_blocked(&level.colliders, *spawn, Axis::Horizontal));
        }
    }

    #[test]
    fn test_gem_sites_are_not_inside_walls() {
        let level = Level::default();
        for site in &level.gem_sites {
            assert!(site.x > 0.0 && site.x < 40.0);
            assert!(site.z > 0.0);
        }
    }

    #[test]
    fn test_json_round_trip() {
        let level = Level::default();
        let json = serde_json::to_string(&level).unwrap();
        let loaded = Level::from_json_str(&json).unwrap();
        assert_eq!(loaded.colliders, level.colliders);
        assert_eq!(loaded.spawns, level.spawns);
    }

    #[test]
    fn test_rejects_incomplete_level() {
        let json = r#"{"colliders": [], "spawns": [[0,0,0]], "gem_sites": []}"#;
        assert!(matches!(
            Level::from_json_str(json),
            Err(ServerError::Level(_))
        ));
    }

    #[test]
    fn test_collider_kind_defaults_to_solid() {
        let json = r#"{
            "colliders": [{"handles": [[0,0,0],[1,0,0]]}, {"handles": [[0,0,1],[1,0,1]], "kind": "decorative"}],
            "spawns": [[0,0,0],[1,0,0]],
            "gem_sites": [[1,0,1],[2,0,1],[3,0,1],[4,0,1],[5,0,1],[6,0,1],[7,0,1],[8,0,1],[9,0,1],[10,0,1]]
        }"#;
        let level = Level::from_json_str(json).unwrap();
        assert!(level.colliders[0].is_solid());
        assert!(!level.colliders[1].is_solid());
    }
}
