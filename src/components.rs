//! ECS Components for the horde simulation.
//!
//! Components are pure data containers attached to entities.
//! All game logic lives in systems that query these components.
//! Agents, the player and projectiles are owned by external spawners/pools;
//! this crate only mutates their fields.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Squared length below which a planar vector is treated as zero.
pub const EPSILON_SQ: f32 = 1e-6;

/// Clamp into the finite `f32` range. NaN becomes 0.
#[inline]
pub fn saturate(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(f32::MIN, f32::MAX)
    }
}

// ============================================================================
// SPATIAL COMPONENTS
// ============================================================================

/// Position in the world. Steering and collision are planar (x, y);
/// `elevation` is the fixed vertical coordinate and is never modified here.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub elevation: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, elevation: 0.0 }
    }

    pub fn with_elevation(x: f32, y: f32, elevation: f32) -> Self {
        Self { x, y, elevation }
    }
}

/// Planar velocity vector.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub vx: f32,
    pub vy: f32,
}

impl Velocity {
    pub const ZERO: Self = Self { vx: 0.0, vy: 0.0 };

    pub fn new(vx: f32, vy: f32) -> Self {
        Self { vx, vy }
    }

    #[inline]
    pub fn magnitude_sq(&self) -> f32 {
        self.vx * self.vx + self.vy * self.vy
    }

    /// Length via `hypot`; only infinite if the true length exceeds `f32::MAX`.
    pub fn magnitude(&self) -> f32 {
        self.vx.hypot(self.vy)
    }

    pub fn normalized(&self) -> Self {
        let mag = self.magnitude();
        if !mag.is_finite() {
            return self.clamped(1.0);
        }
        if mag * mag <= EPSILON_SQ {
            Self::ZERO
        } else {
            Self {
                vx: self.vx / mag,
                vy: self.vy / mag,
            }
        }
    }

    /// Scale down so the magnitude does not exceed `max`.
    /// A non-positive `max` means "no limit".
    ///
    /// Vectors whose length overflows keep their direction; NaN collapses to zero.
    pub fn clamped(self, max: f32) -> Self {
        if !(max > 0.0) {
            return self;
        }
        let mag = self.magnitude();
        if mag <= max {
            return self;
        }
        if mag.is_finite() {
            return Self {
                vx: self.vx / mag * max,
                vy: self.vy / mag * max,
            };
        }

        // Length overflowed: rescale by the largest component first
        let largest = self.vx.abs().max(self.vy.abs());
        let (ux, uy) = if largest.is_finite() {
            (self.vx / largest, self.vy / largest)
        } else {
            let unit = |v: f32| if v.is_infinite() { v.signum() } else { 0.0 };
            (unit(self.vx), unit(self.vy))
        };
        let len = ux.hypot(uy);
        if !(len > 0.0) {
            return Self::ZERO;
        }
        Self {
            vx: ux / len * max,
            vy: uy / len * max,
        }
    }
}

/// Yaw-only facing, stored as a unit planar direction.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Facing {
    pub x: f32,
    pub y: f32,
}

impl Default for Facing {
    fn default() -> Self {
        Self { x: 0.0, y: 1.0 }
    }
}

impl Facing {
    /// Yaw angle in radians, measured from +y toward +x.
    pub fn yaw(&self) -> f32 {
        self.x.atan2(self.y)
    }
}

// ============================================================================
// IDENTITY COMPONENTS
// ============================================================================

/// Stable numeric id of an agent. Unlike snapshot indices it survives across
/// ticks; the LOD scheduler uses it to stagger updates.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AgentId(pub i32);

/// Marker for steered agents.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Enemy;

/// Marker for the steering target.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Player;

// ============================================================================
// STEERING COMPONENTS
// ============================================================================

/// Per-agent steering tuning.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SteeringParams {
    /// Base move speed (units per second).
    pub move_speed: f32,
    /// Hard speed cap; `<= 0` disables the cap.
    pub max_speed: f32,
    /// Maximum velocity change per second; `<= 0` snaps to the desired velocity.
    pub acceleration: f32,
    /// Approach stops inside this distance from the target.
    pub contact_radius: f32,
    /// Neighbours closer than this push the agent away.
    pub separation_radius: f32,
    pub separation_weight: f32,
}

impl Default for SteeringParams {
    fn default() -> Self {
        Self {
            move_speed: 3.5,
            max_speed: 5.0,
            acceleration: 20.0,
            contact_radius: 1.2,
            separation_radius: 1.0,
            separation_weight: 1.0,
        }
    }
}

impl SteeringParams {
    /// Approach speed: `min(move_speed, max_speed)` when capped.
    #[inline]
    pub fn effective_speed(&self) -> f32 {
        if self.max_speed > 0.0 {
            self.move_speed.min(self.max_speed)
        } else {
            self.move_speed
        }
    }
}

/// Collision / hit radius.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyRadius(pub f32);

impl Default for BodyRadius {
    fn default() -> Self {
        Self(0.5)
    }
}

// ============================================================================
// COMBAT COMPONENTS
// ============================================================================

/// Health of an agent.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self { current: max, max }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0.0
    }

    pub fn damage(&mut self, amount: f32) {
        self.current = (self.current - amount).max(0.0);
    }
}

impl Default for Health {
    fn default() -> Self {
        Self::new(10.0)
    }
}

/// A fast projectile. Moved and recycled by its owner's pool; this crate only
/// reads position/damage and deactivates it on impact.
#[derive(Component, Debug, Clone, Copy)]
pub struct Projectile {
    pub damage: f32,
    /// Owner whose pool receives the projectile back.
    pub owner: Entity,
    pub active: bool,
}

impl Projectile {
    pub fn new(damage: f32, owner: Entity) -> Self {
        Self {
            damage,
            owner,
            active: true,
        }
    }
}

/// Why an agent was flagged for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DespawnReason {
    Killed,
}

/// Marker consumed by the external despawn pipeline.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DespawnRequest {
    pub reason: DespawnReason,
}

// ============================================================================
// BUNDLE HELPERS
// ============================================================================

/// Bundle for spawning a complete agent entity.
#[derive(Bundle, Default)]
pub struct EnemyBundle {
    pub marker: Enemy,
    pub id: AgentId,
    pub position: Position,
    pub velocity: Velocity,
    pub facing: Facing,
    pub steering: SteeringParams,
    pub body: BodyRadius,
    pub health: Health,
}

impl EnemyBundle {
    pub fn new(id: i32, x: f32, y: f32) -> Self {
        Self {
            id: AgentId(id),
            position: Position::new(x, y),
            ..Default::default()
        }
    }
}

/// Bundle for spawning the steering target.
#[derive(Bundle, Default)]
pub struct PlayerBundle {
    pub marker: Player,
    pub position: Position,
    pub health: Health,
}

/// Bundle for spawning an active projectile.
#[derive(Bundle)]
pub struct ProjectileBundle {
    pub projectile: Projectile,
    pub position: Position,
}

impl ProjectileBundle {
    pub fn new(x: f32, y: f32, damage: f32, owner: Entity) -> Self {
        Self {
            projectile: Projectile::new(damage, owner),
            position: Position::new(x, y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_velocity_clamp() {
        let v = Velocity::new(3.0, 4.0).clamped(2.5);
        assert!((v.magnitude() - 2.5).abs() < 1e-5);
        assert!((v.vx / v.vy - 0.75).abs() < 1e-5);

        // Uncapped when max <= 0
        let v = Velocity::new(30.0, 40.0).clamped(0.0);
        assert_eq!(v, Velocity::new(30.0, 40.0));
    }

    #[test]
    fn test_clamp_keeps_direction_when_length_overflows() {
        let v = Velocity::new(-2e20, 0.0).clamped(5.0);
        assert!((v.vx + 5.0).abs() < 1e-5);
        assert_eq!(v.vy, 0.0);

        let v = Velocity::new(3e38, 3e38).clamped(1.0);
        assert!((v.vx - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-5);
        assert!((v.vy - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-5);

        let v = Velocity::new(f32::NEG_INFINITY, 1.0).clamped(2.0);
        assert_eq!(v, Velocity::new(-2.0, 0.0));

        assert_eq!(Velocity::new(f32::NAN, 1.0).clamped(2.0), Velocity::ZERO);
    }

    #[test]
    fn test_saturate() {
        assert_eq!(saturate(f32::INFINITY), f32::MAX);
        assert_eq!(saturate(f32::NEG_INFINITY), f32::MIN);
        assert_eq!(saturate(f32::NAN), 0.0);
        assert_eq!(saturate(-3.5), -3.5);
    }

    #[test]
    fn test_normalized_zero_is_zero() {
        assert_eq!(Velocity::new(1e-5, 0.0).normalized(), Velocity::ZERO);
        let unit = Velocity::new(f32::MAX, 0.0).normalized();
        assert!((unit.vx - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_effective_speed() {
        let mut params = SteeringParams {
            move_speed: 8.0,
            max_speed: 5.0,
            ..Default::default()
        };
        assert_eq!(params.effective_speed(), 5.0);
        params.max_speed = 0.0;
        assert_eq!(params.effective_speed(), 8.0);
    }

    #[test]
    fn test_health_clamps_at_zero() {
        let mut health = Health::new(10.0);
        health.damage(25.0);
        assert_eq!(health.current, 0.0);
        assert!(!health.is_alive());
    }

    #[test]
    fn test_facing_yaw() {
        assert!(Facing::default().yaw().abs() < 1e-6);
        let east = Facing { x: 1.0, y: 0.0 };
        assert!((east.yaw() - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }
}
