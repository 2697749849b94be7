//! Steering system - approach + separation forces for the horde.
//!
//! ## Phases
//!
//! 1. **Snapshot** - O(n): copy every agent's position, velocity and params
//!    into index-based arrays. The snapshot index is only valid for this tick.
//! 2. **Grid** - O(n): bucket the snapshot by separation radius.
//! 3. **LOD** - O(n): classify each agent by distance to the target and decide
//!    whether it is evaluated on this tick.
//! 4. **Forces** - O(n × k): two independent fans (approach, separation) over
//!    the evaluated agents. Each task reads the snapshot and grid and writes
//!    only its own slot, so the fans run concurrently and internally in parallel.
//!
//! Results go to `PendingSteering`; `integration_system` consumes them
//! sequentially after the join.

use crate::components::*;
use crate::parallel;
use crate::spatial::{GridEntry, SpatialHashGrid};
use crate::systems::performance::{SimConfig, SimLod, SimTick, TickReport};
use bevy_ecs::prelude::*;

/// Read-only per-tick copy of the agents. All vectors share one index space.
#[derive(Debug, Clone, Default)]
pub struct SteeringSnapshot {
    pub entities: Vec<Entity>,
    pub positions: Vec<(f32, f32)>,
    pub velocities: Vec<Velocity>,
    pub params: Vec<SteeringParams>,
    pub body_radii: Vec<f32>,
}

impl SteeringSnapshot {
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn push(
        &mut self,
        entity: Entity,
        pos: &Position,
        vel: Velocity,
        params: SteeringParams,
        body_radius: f32,
    ) {
        self.entities.push(entity);
        self.positions.push((pos.x, pos.y));
        self.velocities.push(vel);
        self.params.push(params);
        self.body_radii.push(body_radius);
    }
}

/// Steering results waiting for the integrator.
/// `approach`, `separation` and `evaluated` are indexed like the snapshot.
#[derive(Resource, Debug, Default)]
pub struct PendingSteering {
    pub snapshot: SteeringSnapshot,
    pub evaluated: Vec<bool>,
    pub approach: Vec<(f32, f32)>,
    pub separation: Vec<(f32, f32)>,
}

impl PendingSteering {
    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }
}

/// Steering gather system - builds the snapshot and computes forces without
/// touching any entity.
///
/// ## Data Access (READ-ONLY on entities)
/// - Reads: SimConfig, SimTick, Position, Velocity, SteeringParams, AgentId, BodyRadius
/// - Writes: PendingSteering, TickReport (resources only)
pub fn steering_gather_system(
    config: Res<SimConfig>,
    tick: Res<SimTick>,
    mut pending: ResMut<PendingSteering>,
    mut report: ResMut<TickReport>,
    players: Query<(&Position, Option<&Health>), With<Player>>,
    agents: Query<
        (
            Entity,
            &AgentId,
            &Position,
            &Velocity,
            &SteeringParams,
            Option<&BodyRadius>,
        ),
        (With<Enemy>, Without<DespawnRequest>),
    >,
) {
    *pending = PendingSteering::default();
    *report = TickReport {
        tick: tick.0,
        ..Default::default()
    };

    let target = players
        .iter()
        .find(|(_, health)| health.map_or(true, Health::is_alive))
        .map(|(pos, _)| (pos.x, pos.y));

    let Some(target) = target else {
        log::debug!("tick {}: no live target, steering skipped", tick.0);
        return;
    };
    report.target_present = true;

    // SNAPSHOT + LOD: O(n)
    let mut snapshot = SteeringSnapshot::default();
    let mut tiers = Vec::new();
    let mut evaluated = Vec::new();
    for (entity, id, pos, vel, params, body) in agents.iter() {
        let dx = pos.x - target.0;
        let dy = pos.y - target.1;
        let tier = SimLod::classify(dx * dx + dy * dy, &config);
        tiers.push(tier);
        evaluated.push(tier.should_update(tick.0, id.0));
        snapshot.push(
            entity,
            pos,
            *vel,
            *params,
            body.copied().unwrap_or_default().0,
        );
    }

    // GRID: O(n)
    let entries: Vec<GridEntry> = snapshot
        .positions
        .iter()
        .zip(&snapshot.params)
        .enumerate()
        .map(|(i, (&(x, y), params))| GridEntry::new(i, x, y, params.separation_radius))
        .collect();
    let grid = SpatialHashGrid::build(&entries, config.min_cell_size);

    // FORCES: two independent fans, one slot per snapshot index
    let n = snapshot.len();
    let batch = config.parallel_batch_size;
    let mut approach = vec![(0.0, 0.0); n];
    let mut separation = vec![(0.0, 0.0); n];
    {
        let snapshot = &snapshot;
        let grid = &grid;
        let tiers = &tiers;
        let evaluated = &evaluated;
        parallel::join(
            || {
                parallel::fill_slots(&mut approach, batch, |i| {
                    if evaluated[i] {
                        approach_force(snapshot.positions[i], target, &snapshot.params[i])
                    } else {
                        (0.0, 0.0)
                    }
                })
            },
            || {
                parallel::fill_slots(&mut separation, batch, |i| {
                    if evaluated[i] && tiers[i].separation_enabled() {
                        separation_force(i, &snapshot.positions, snapshot.params[i].separation_radius, grid)
                    } else {
                        (0.0, 0.0)
                    }
                })
            },
        );
    }

    report.agents = n;
    report.evaluated = evaluated.iter().filter(|&&e| e).count();

    *pending = PendingSteering {
        snapshot,
        evaluated,
        approach,
        separation,
    };
}

/// Velocity toward the target at the agent's effective speed.
/// Zero at the target or inside the contact radius.
pub fn approach_force(pos: (f32, f32), target: (f32, f32), params: &SteeringParams) -> (f32, f32) {
    let delta = Velocity::new(saturate(target.0 - pos.0), saturate(target.1 - pos.1));
    let dist = delta.magnitude();
    if dist * dist <= EPSILON_SQ {
        return (0.0, 0.0);
    }
    if dist <= params.contact_radius.max(0.0) {
        return (0.0, 0.0);
    }
    let dir = delta.normalized();
    let speed = saturate(params.effective_speed());
    (dir.vx * speed, dir.vy * speed)
}

/// Push away from neighbours within `radius` of agent `index`.
///
/// Each neighbour at offset `Δ = self - neighbour` contributes `Δ / d²`, its
/// unit away-direction scaled by `1/d`. The sum is not normalized, so crowding
/// and proximity both increase it. Neighbours at (almost) the same position
/// contribute nothing.
pub fn separation_force(
    index: usize,
    positions: &[(f32, f32)],
    radius: f32,
    grid: &SpatialHashGrid,
) -> (f32, f32) {
    if !(radius > 0.0) {
        return (0.0, 0.0);
    }
    let (x, y) = positions[index];
    let radius_sq = radius * radius;
    let mut sum = (0.0f32, 0.0f32);

    grid.for_each_neighbor(x, y, |other| {
        if other == index {
            return;
        }
        let Some(&(ox, oy)) = positions.get(other) else {
            return;
        };
        let dx = x - ox;
        let dy = y - oy;
        let dist_sq = dx * dx + dy * dy;
        if !dist_sq.is_finite() || dist_sq > radius_sq || dist_sq <= EPSILON_SQ {
            return;
        }
        let inv_dist_sq = 1.0 / dist_sq;
        sum.0 = saturate(sum.0 + dx * inv_dist_sq);
        sum.1 = saturate(sum.1 + dy * inv_dist_sq);
    });

    sum
}

/// Combine forces into a desired velocity capped at `max_speed`.
pub fn desired_velocity(approach: (f32, f32), separation: (f32, f32), params: &SteeringParams) -> Velocity {
    let weight = params.separation_weight;
    Velocity::new(
        saturate(approach.0 + saturate(separation.0 * weight)),
        saturate(approach.1 + saturate(separation.1 * weight)),
    )
    .clamped(params.max_speed)
}

/// Move `current` toward `desired` by at most `acceleration × dt`.
/// Non-positive acceleration means "snap".
pub fn step_velocity(current: Velocity, desired: Velocity, acceleration: f32, dt: f32) -> Velocity {
    if acceleration <= 0.0 {
        return desired;
    }
    let max_step = acceleration * dt.max(0.0);
    if !(max_step > 0.0) {
        return current;
    }
    let change = Velocity::new(
        saturate(desired.vx - current.vx),
        saturate(desired.vy - current.vy),
    );
    if change.magnitude() <= max_step {
        return desired;
    }
    let change = change.clamped(max_step);
    Velocity::new(
        saturate(current.vx + change.vx),
        saturate(current.vy + change.vy),
    )
}
