//! Serializable state view.
//!
//! The `Snapshot` struct is a read-only picture of the persistent entity fields
//! for debugging, replays and visualization. It is not the per-tick index
//! snapshot used by the steering and hit phases.

use crate::components::*;
use crate::systems::performance::{SimConfig, SimLod};
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Snapshot of a single agent's state for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemySnapshot {
    pub id: i32,
    pub x: f32,
    pub y: f32,
    pub elevation: f32,
    pub vx: f32,
    pub vy: f32,
    pub yaw: f32,
    pub health: f32,
    pub health_max: f32,
    /// Tier relative to the current target, if there is one.
    pub lod: Option<SimLod>,
    pub despawn_requested: bool,
}

/// Complete simulation state snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Current simulation tick.
    pub tick: u64,
    /// Elapsed simulation time in seconds.
    pub time: f32,
    /// Target position, if a live target exists.
    pub player: Option<(f32, f32)>,
    /// All agent states, sorted by id.
    pub enemies: Vec<EnemySnapshot>,
    pub projectiles_active: usize,
}

impl Snapshot {
    /// Create a snapshot from the ECS world.
    pub fn from_world(world: &mut World, tick: u64, time: f32) -> Self {
        let config = world.get_resource::<SimConfig>().cloned().unwrap_or_default();

        let mut players = world.query_filtered::<(&Position, Option<&Health>), With<Player>>();
        let player = players
            .iter(world)
            .find(|(_, health)| health.map_or(true, Health::is_alive))
            .map(|(pos, _)| (pos.x, pos.y));

        let mut query = world.query_filtered::<(
            &AgentId,
            &Position,
            &Velocity,
            Option<&Facing>,
            &Health,
            Has<DespawnRequest>,
        ), With<Enemy>>();

        let mut enemies: Vec<EnemySnapshot> = query
            .iter(world)
            .map(|(id, pos, vel, facing, health, despawn)| EnemySnapshot {
                id: id.0,
                x: pos.x,
                y: pos.y,
                elevation: pos.elevation,
                vx: vel.vx,
                vy: vel.vy,
                yaw: facing.copied().unwrap_or_default().yaw(),
                health: health.current,
                health_max: health.max,
                lod: player.map(|(px, py)| {
                    let dx = pos.x - px;
                    let dy = pos.y - py;
                    SimLod::classify(dx * dx + dy * dy, &config)
                }),
                despawn_requested: despawn,
            })
            .collect();
        enemies.sort_by_key(|e| e.id);

        let mut projectiles = world.query::<&Projectile>();
        let projectiles_active = projectiles.iter(world).filter(|p| p.active).count();

        Self {
            tick,
            time,
            player,
            enemies,
            projectiles_active,
        }
    }

    /// Serialize snapshot to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize snapshot to pretty JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize a snapshot from a JSON string.
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}
