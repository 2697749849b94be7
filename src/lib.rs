//! Horde Sim - Steering Core
//!
//! A deterministic, fixed-timestep ECS simulation for large enemy hordes
//! chasing a single target. Uses `bevy_ecs` for the entity-component-system
//! architecture and `rayon` (feature `parallel`) for the per-agent fans.

pub mod api;
pub mod collaborators;
pub mod components;
pub mod error;
pub mod parallel;
pub mod spatial;
pub mod systems;
pub mod world;

pub use api::{EnemySpec, SimWorld};
pub use collaborators::{PoolRelease, ProjectilePool, ReleaseLog, SweepResult, WallCollision};
pub use components::*;
pub use error::ConfigError;
pub use spatial::{GridEntry, SpatialHashGrid};
pub use systems::*;
pub use world::{EnemySnapshot, Snapshot};
