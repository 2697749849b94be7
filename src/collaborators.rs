//! Boundaries to systems owned outside this crate.
//!
//! - Wall collision: world geometry lives elsewhere; the integrator only asks
//!   how far an agent may move.
//! - Projectile pool: recycling of projectiles after impact.
//!
//! Both are installed as resources and only called from sequential phases.

use bevy_ecs::prelude::*;
use std::sync::{Arc, Mutex};

/// Outcome of a swept move against walls.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SweepResult {
    /// Displacement actually allowed (possibly shortened).
    pub allowed: (f32, f32),
    /// Surface normal when the move was blocked.
    pub normal: Option<(f32, f32)>,
}

impl SweepResult {
    /// The move went through untouched.
    pub fn clear(displacement: (f32, f32)) -> Self {
        Self {
            allowed: displacement,
            normal: None,
        }
    }
}

/// Query contract of the external wall collision layer.
pub trait WallCollision: Send + Sync {
    /// Sweep a circle of `radius` from `start` along `displacement` against the
    /// walls selected by `mask`.
    fn sweep(&self, start: (f32, f32), displacement: (f32, f32), radius: f32, mask: u32) -> SweepResult;

    /// Remove the component of `velocity` pointing into the surface with
    /// outward `normal` (slide response).
    fn remove_into_surface(&self, velocity: (f32, f32), normal: (f32, f32)) -> (f32, f32) {
        let len_sq = normal.0 * normal.0 + normal.1 * normal.1;
        if len_sq <= crate::components::EPSILON_SQ {
            return velocity;
        }
        let inv = 1.0 / len_sq.sqrt();
        let (nx, ny) = (normal.0 * inv, normal.1 * inv);
        let into = velocity.0 * nx + velocity.1 * ny;
        if into >= 0.0 {
            velocity
        } else {
            (velocity.0 - nx * into, velocity.1 - ny * into)
        }
    }

    /// Push-out needed to restore minimum clearance at `position`.
    fn clearance_correction(&self, _position: (f32, f32), _radius: f32, _mask: u32) -> (f32, f32) {
        (0.0, 0.0)
    }
}

/// Resource wrapper for the wall collision layer.
#[derive(Resource, Clone)]
pub struct WallCollider(pub Arc<dyn WallCollision>);

impl WallCollider {
    pub fn new<W: WallCollision + 'static>(walls: W) -> Self {
        Self(Arc::new(walls))
    }
}

/// Receives projectiles back after impact.
pub trait ProjectilePool: Send + Sync {
    fn release(&mut self, projectile: Entity, owner: Entity);
}

/// Resource wrapper for the projectile pool.
#[derive(Resource)]
pub struct ProjectilePoolResource(pub Box<dyn ProjectilePool>);

impl ProjectilePoolResource {
    pub fn new<P: ProjectilePool + 'static>(pool: P) -> Self {
        Self(Box::new(pool))
    }
}

/// A projectile handed back to its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolRelease {
    pub projectile: Entity,
    pub owner: Entity,
}

/// Pool that records every release. Clones share the same log, so a clone can
/// be installed in the world while another is kept for inspection.
#[derive(Debug, Clone, Default)]
pub struct ReleaseLog {
    released: Arc<Mutex<Vec<PoolRelease>>>,
}

impl ReleaseLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Releases recorded so far.
    pub fn released(&self) -> Vec<PoolRelease> {
        self.released.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Take and clear the recorded releases.
    pub fn drain(&self) -> Vec<PoolRelease> {
        self.released
            .lock()
            .map(|mut r| std::mem::take(&mut *r))
            .unwrap_or_default()
    }
}

impl ProjectilePool for ReleaseLog {
    fn release(&mut self, projectile: Entity, owner: Entity) {
        if let Ok(mut released) = self.released.lock() {
            released.push(PoolRelease { projectile, owner });
        }
    }
}
