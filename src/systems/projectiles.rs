//! Projectile hit resolution.
//!
//! ## Complexity Analysis
//!
//! 1. **Gather Phase** - O(p × k) where p = active projectiles, k = agents in
//!    the 3×3 cell block around each projectile
//!    - Builds a second grid over live agents, sized by body radius
//!    - Each projectile finds the closest agent whose body contains it
//!    - Read-only, one result slot per projectile, runs in parallel
//!
//! 2. **Apply Phase** - O(p + n)
//!    - Accumulates damage per agent (several projectiles may hit one agent)
//!    - Deactivates and releases projectiles, applies damage, flags kills
//!    - Sequential to avoid racing on the per-agent totals
//!
//! Equidistant candidates resolve to the first one visited, which is
//! deterministic for a fixed spawn order but otherwise unspecified.

use crate::collaborators::ProjectilePoolResource;
use crate::components::*;
use crate::parallel;
use crate::spatial::{GridEntry, SpatialHashGrid};
use crate::systems::performance::{SimConfig, TickReport};
use bevy_ecs::prelude::*;
use bevy_ecs::query::Has;

/// Resolved hits waiting for the apply phase.
/// `agents` is the agent snapshot; the other vectors are indexed by projectile.
#[derive(Resource, Debug, Default)]
pub struct PendingHits {
    pub agents: Vec<Entity>,
    pub projectiles: Vec<Entity>,
    pub damage: Vec<f32>,
    /// Agent snapshot index hit by each projectile.
    pub hits: Vec<Option<usize>>,
}

impl PendingHits {
    pub fn hit_count(&self) -> usize {
        self.hits.iter().filter(|h| h.is_some()).count()
    }
}

/// Projectile gather system - finds the agent each projectile hit.
///
/// ## Data Access (READ-ONLY on entities)
/// - Reads: SimConfig, Position, BodyRadius, Health, Projectile
/// - Writes: PendingHits (resource only)
pub fn projectile_gather_system(
    config: Res<SimConfig>,
    mut pending: ResMut<PendingHits>,
    agents: Query<(Entity, &Position, &BodyRadius, &Health), With<Enemy>>,
    projectiles: Query<(Entity, &Position, &Projectile)>,
) {
    *pending = PendingHits::default();

    // Agent snapshot: live agents only
    let mut agent_entities = Vec::new();
    let mut positions = Vec::new();
    let mut radii = Vec::new();
    for (entity, pos, body, health) in agents.iter() {
        if !health.is_alive() {
            continue;
        }
        agent_entities.push(entity);
        positions.push((pos.x, pos.y));
        radii.push(body.0.max(0.0));
    }

    let mut projectile_entities = Vec::new();
    let mut points = Vec::new();
    let mut damage = Vec::new();
    for (entity, pos, projectile) in projectiles.iter() {
        if !projectile.active {
            continue;
        }
        if !(pos.x.is_finite() && pos.y.is_finite()) {
            log::trace!("projectile {:?} at non-finite position, skipped", entity);
            continue;
        }
        projectile_entities.push(entity);
        points.push((pos.x, pos.y));
        damage.push(projectile.damage);
    }

    let mut hits = vec![None; points.len()];
    if !agent_entities.is_empty() && !points.is_empty() {
        let entries: Vec<GridEntry> = positions
            .iter()
            .zip(&radii)
            .enumerate()
            .map(|(i, (&(x, y), &r))| GridEntry::new(i, x, y, r))
            .collect();
        let grid = SpatialHashGrid::build(&entries, config.min_cell_size);

        let (grid, positions, radii, points) = (&grid, &positions, &radii, &points);
        parallel::fill_slots(&mut hits, config.parallel_batch_size, |p| {
            nearest_hit(points[p], positions, radii, grid)
        });
    }

    *pending = PendingHits {
        agents: agent_entities,
        projectiles: projectile_entities,
        damage,
        hits,
    };
}

/// Closest agent whose body circle contains `point`.
/// Ties keep the first candidate in grid visit order.
pub fn nearest_hit(
    point: (f32, f32),
    positions: &[(f32, f32)],
    radii: &[f32],
    grid: &SpatialHashGrid,
) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    grid.for_each_neighbor(point.0, point.1, |i| {
        let (Some(&(x, y)), Some(&r)) = (positions.get(i), radii.get(i)) else {
            return;
        };
        let dx = point.0 - x;
        let dy = point.1 - y;
        let dist_sq = dx * dx + dy * dy;
        if !(dist_sq <= r * r) {
            return;
        }
        if best.map_or(true, |(_, best_sq)| dist_sq < best_sq) {
            best = Some((i, dist_sq));
        }
    });
    best.map(|(i, _)| i)
}

/// Projectile apply system - consumes projectiles and applies damage.
///
/// ## Data Access
/// - Reads: PendingHits
/// - Writes: Projectile, Health, DespawnRequest (via commands), TickReport
/// - Calls: ProjectilePoolResource
///
/// Every write is guarded; entities removed since the gather phase are skipped.
pub fn projectile_apply_system(
    mut commands: Commands,
    mut pending: ResMut<PendingHits>,
    mut report: ResMut<TickReport>,
    mut pool: Option<ResMut<ProjectilePoolResource>>,
    mut projectiles: Query<&mut Projectile>,
    mut agents: Query<(&mut Health, Has<DespawnRequest>), With<Enemy>>,
) {
    let PendingHits {
        agents: agent_entities,
        projectiles: projectile_entities,
        damage,
        hits,
    } = std::mem::take(&mut *pending);

    report.projectiles = projectile_entities.len();

    // ACCUMULATE: per-agent totals, release projectiles
    let mut totals = vec![0.0f32; agent_entities.len()];
    for (p, hit) in hits.iter().enumerate() {
        let Some(agent) = *hit else {
            continue;
        };
        let entity = projectile_entities[p];
        let Ok(mut projectile) = projectiles.get_mut(entity) else {
            log::trace!("projectile {:?} gone before impact, skipped", entity);
            report.stale_writes += 1;
            continue;
        };
        if !projectile.active {
            continue;
        }
        totals[agent] += damage[p];
        projectile.active = false;
        report.hits += 1;

        match pool.as_deref_mut() {
            Some(ProjectilePoolResource(pool)) => pool.release(entity, projectile.owner),
            None => log::trace!("no projectile pool installed, {:?} only deactivated", entity),
        }
    }

    // APPLY: damage and kill flags
    for (a, &total) in totals.iter().enumerate() {
        if total == 0.0 {
            continue;
        }
        let entity = agent_entities[a];
        let Ok((mut health, flagged)) = agents.get_mut(entity) else {
            log::trace!("agent {:?} gone before damage, skipped", entity);
            report.stale_writes += 1;
            continue;
        };
        health.damage(total);
        if !health.is_alive() && !flagged {
            commands.entity(entity).try_insert(DespawnRequest {
                reason: DespawnReason::Killed,
            });
            report.kills += 1;
        }
    }
}
