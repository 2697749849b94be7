//! ECS Systems for the horde simulation.
//!
//! Systems contain the per-tick logic that operates on components.
//!
//! ## System Ordering
//!
//! Each system group is a gather phase that never writes entities, followed by
//! an apply phase that writes them sequentially:
//!
//! **Group 1 (Steering)** - agents chase the target:
//! - `steering_gather_system` - Snapshot, grid, LOD, approach/separation fans
//! - `integration_system` - Velocity, wall sweep, position and facing
//!
//! **Group 2 (Projectiles)** - after agents moved:
//! - `projectile_gather_system` - Nearest body containing each projectile
//! - `projectile_apply_system` - Damage, kill flags, pool releases
//!
//! **Group 3 (Reporting)**
//! - `tick_report_system` - Logs the tick counters

pub mod movement;
pub mod performance;
pub mod projectiles;
pub mod steering;

pub use movement::*;
pub use performance::*;
pub use projectiles::*;
pub use steering::*;
