//! Public API for the simulation.
//!
//! This module provides the main interface for a game host (or any other
//! client) to drive the horde simulation.
//!
//! ## Fixed Timestep
//!
//! The simulation uses a fixed timestep internally (default 30 Hz). When `step(dt)` is called,
//! the simulation accumulates time and runs fixed updates as needed, at most
//! `max_substeps_per_step` per call. This ensures deterministic behavior regardless of frame rate.
//!
//! ## Tick Pipeline
//!
//! Every fixed update runs one chained schedule:
//! 1. `steering_gather_system` - snapshot, grid, LOD, parallel force fans
//! 2. `integration_system` - sequential velocity/position/facing write-back
//! 3. `projectile_gather_system` - parallel nearest-hit search
//! 4. `projectile_apply_system` - damage, kill flags, pool releases
//! 5. `tick_report_system` - per-tick counters to the log

use crate::collaborators::{ProjectilePool, ProjectilePoolResource, WallCollider, WallCollision};
use crate::components::*;
use crate::error::ConfigError;
use crate::systems::*;
use crate::world::Snapshot;
use bevy_ecs::prelude::*;

/// Everything needed to spawn one agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnemySpec {
    pub id: i32,
    pub x: f32,
    pub y: f32,
    pub elevation: f32,
    pub steering: SteeringParams,
    pub body_radius: f32,
    pub health: f32,
}

impl Default for EnemySpec {
    fn default() -> Self {
        Self {
            id: 0,
            x: 0.0,
            y: 0.0,
            elevation: 0.0,
            steering: SteeringParams::default(),
            body_radius: BodyRadius::default().0,
            health: Health::default().max,
        }
    }
}

impl EnemySpec {
    pub fn at(id: i32, x: f32, y: f32) -> Self {
        Self {
            id,
            x,
            y,
            ..Default::default()
        }
    }
}

/// The main simulation world container.
///
/// Holds the ECS world and schedule, providing a clean API for:
/// - Initializing the simulation
/// - Stepping the simulation forward
/// - Extracting state snapshots
/// - Installing the wall and projectile-pool collaborators
pub struct SimWorld {
    world: World,
    schedule: Schedule,
    tick: u64,
    time: f32,
    /// Accumulated time for fixed timestep.
    time_accumulator: f32,
}

impl SimWorld {
    /// Create a new empty simulation world.
    pub fn new() -> Self {
        Self::build(SimConfig::default())
    }

    /// Create a new simulation world with custom configuration.
    pub fn with_config(config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: SimConfig) -> Self {
        let mut world = World::new();

        // Core resources
        world.insert_resource(DeltaTime(config.fixed_timestep));
        world.insert_resource(SimTick(0));
        world.insert_resource(config);

        // Per-tick hand-off between gather and apply phases
        world.insert_resource(PendingSteering::default());
        world.insert_resource(PendingHits::default());
        world.insert_resource(TickReport::default());

        let mut schedule = Schedule::default();
        schedule.add_systems(
            (
                steering_gather_system,
                integration_system,
                projectile_gather_system,
                projectile_apply_system,
                tick_report_system,
            )
                .chain(),
        );

        Self {
            world,
            schedule,
            tick: 0,
            time: 0.0,
            time_accumulator: 0.0,
        }
    }

    /// Step the simulation forward by `dt` seconds.
    ///
    /// Returns the number of fixed updates that ran. Time beyond
    /// `max_substeps_per_step` updates is dropped instead of carried over.
    pub fn step(&mut self, dt: f32) -> u32 {
        let (fixed_dt, max_substeps) = {
            let config = self.config();
            (config.fixed_timestep, config.max_substeps_per_step)
        };

        if dt.is_finite() && dt > 0.0 {
            self.time_accumulator += dt;
        }

        let mut substeps = 0;
        while self.time_accumulator >= fixed_dt && substeps < max_substeps {
            self.fixed_update(fixed_dt);
            self.time_accumulator -= fixed_dt;
            substeps += 1;
        }

        if self.time_accumulator >= fixed_dt {
            log::debug!(
                "step({}) hit the {} substep cap, dropping {:.4}s",
                dt,
                max_substeps,
                self.time_accumulator - self.time_accumulator % fixed_dt
            );
            self.time_accumulator %= fixed_dt;
        }
        substeps
    }

    /// Run exactly one fixed update, ignoring the accumulator.
    pub fn tick_once(&mut self) {
        let fixed_dt = self.config().fixed_timestep;
        self.fixed_update(fixed_dt);
    }

    /// Run a single fixed timestep update.
    fn fixed_update(&mut self, dt: f32) {
        // Update delta time resource
        if let Some(mut dt_res) = self.world.get_resource_mut::<DeltaTime>() {
            dt_res.0 = dt;
        }

        // Increment simulation tick
        if let Some(mut tick_res) = self.world.get_resource_mut::<SimTick>() {
            tick_res.increment();
        }

        // Run all systems
        self.schedule.run(&mut self.world);

        self.tick += 1;
        self.time += dt;
    }

    /// Get a snapshot of the current simulation state.
    pub fn snapshot(&mut self) -> Snapshot {
        Snapshot::from_world(&mut self.world, self.tick, self.time)
    }

    /// Get the snapshot as a JSON string.
    pub fn snapshot_json(&mut self) -> String {
        self.snapshot().to_json().unwrap_or_else(|_| "{}".to_string())
    }

    /// Get the current simulation tick.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Get the current simulation time.
    pub fn current_time(&self) -> f32 {
        self.time
    }

    pub fn config(&self) -> &SimConfig {
        self.world.resource::<SimConfig>()
    }

    /// Counters from the last completed tick.
    pub fn last_report(&self) -> TickReport {
        *self.world.resource::<TickReport>()
    }

    /// Spawn the steering target.
    pub fn spawn_player(&mut self, x: f32, y: f32) -> Entity {
        self.world
            .spawn(PlayerBundle {
                position: Position::new(x, y),
                ..Default::default()
            })
            .id()
    }

    /// Move the first player. Returns false if there is none.
    pub fn set_player_position(&mut self, x: f32, y: f32) -> bool {
        let mut query = self.world.query_filtered::<&mut Position, With<Player>>();
        match query.iter_mut(&mut self.world).next() {
            Some(mut pos) => {
                pos.x = x;
                pos.y = y;
                true
            }
            None => false,
        }
    }

    pub fn spawn_enemy(&mut self, spec: EnemySpec) -> Entity {
        self.world
            .spawn(EnemyBundle {
                id: AgentId(spec.id),
                position: Position::with_elevation(spec.x, spec.y, spec.elevation),
                steering: spec.steering,
                body: BodyRadius(spec.body_radius),
                health: Health::new(spec.health),
                ..Default::default()
            })
            .id()
    }

    /// Spawn agents on a square grid around a center point.
    /// Ids run from `start_id` upward. Returns the spawned entities.
    pub fn spawn_horde(
        &mut self,
        center_x: f32,
        center_y: f32,
        count: usize,
        spread: f32,
        start_id: i32,
    ) -> Vec<Entity> {
        if count == 0 {
            return Vec::new();
        }
        let cols = (count as f32).sqrt().ceil() as usize;
        let spacing = spread / cols as f32;

        (0..count)
            .map(|i| {
                let row = i / cols;
                let col = i % cols;
                let x = center_x + (col as f32 - cols as f32 / 2.0) * spacing;
                let y = center_y + (row as f32 - (count / cols) as f32 / 2.0) * spacing;
                self.spawn_enemy(EnemySpec::at(start_id.wrapping_add(i as i32), x, y))
            })
            .collect()
    }

    pub fn spawn_projectile(&mut self, x: f32, y: f32, damage: f32, owner: Entity) -> Entity {
        self.world.spawn(ProjectileBundle::new(x, y, damage, owner)).id()
    }

    /// Install the wall collaborator. It is only consulted while
    /// `wall_collision_mask` is non-zero.
    pub fn set_wall_collider<W: WallCollision + 'static>(&mut self, walls: W) {
        self.world.insert_resource(WallCollider::new(walls));
    }

    /// Install the pool that receives consumed projectiles.
    pub fn set_projectile_pool<P: ProjectilePool + 'static>(&mut self, pool: P) {
        self.world.insert_resource(ProjectilePoolResource::new(pool));
    }

    /// Agents flagged for removal, in spawn order of the query.
    pub fn pending_despawns(&mut self) -> Vec<(Entity, DespawnReason)> {
        let mut query = self.world.query::<(Entity, &DespawnRequest)>();
        query
            .iter(&self.world)
            .map(|(entity, request)| (entity, request.reason))
            .collect()
    }

    /// Despawn every flagged agent. Returns how many were removed.
    pub fn despawn_flagged(&mut self) -> usize {
        let flagged = self.pending_despawns();
        for (entity, _) in &flagged {
            self.world.despawn(*entity);
        }
        flagged.len()
    }

    pub fn enemy_count(&mut self) -> usize {
        let mut query = self.world.query_filtered::<(), With<Enemy>>();
        query.iter(&self.world).count()
    }

    /// Get direct access to the ECS world (for advanced usage).
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Get mutable access to the ECS world (for advanced usage).
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}
