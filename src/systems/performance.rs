//! Performance tuning: configuration, tick counter and LOD scheduling.
//!
//! Agents are classified every tick by squared planar distance to the target:
//! - **High** - evaluated every tick
//! - **Medium** - evaluated every 2 ticks
//! - **Low** - evaluated every 4 ticks, separation disabled
//!
//! The stable agent id offsets the schedule so agents in the same tier do not
//! all update on the same tick. Tiers are derived on the fly and never stored.
//!
//! ## Parallelism Notes
//! - Tier classification happens inside `steering_gather_system` while the
//!   snapshot is built, so it needs no system of its own.
//! - `tick_report_system` only reads `TickReport` and runs last.

use crate::error::ConfigError;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Configuration for simulation performance tuning.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed timestep in seconds (e.g., 1/30 = 0.0333 for 30 Hz).
    pub fixed_timestep: f32,
    /// Distance threshold for High LOD (full fidelity).
    pub lod_high_distance: f32,
    /// Distance threshold for Medium LOD.
    pub lod_medium_distance: f32,
    /// Lower bound for spatial grid cells.
    pub min_cell_size: f32,
    /// Minimum number of agents/projectiles handled per parallel task.
    pub parallel_batch_size: usize,
    /// Collision layers passed to the wall collaborator. 0 disables wall collision.
    pub wall_collision_mask: u32,
    /// Upper bound on fixed updates run by a single `step` call.
    pub max_substeps_per_step: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 1.0 / 30.0, // 30 Hz
            lod_high_distance: 16.0,
            lod_medium_distance: 34.0,
            min_cell_size: crate::spatial::MIN_CELL_SIZE,
            parallel_batch_size: 64,
            wall_collision_mask: 0,
            max_substeps_per_step: 8,
        }
    }
}

impl SimConfig {
    /// Parse a (possibly partial) JSON config; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.fixed_timestep.is_finite() || self.fixed_timestep <= 0.0 {
            return Err(ConfigError::InvalidTimestep(self.fixed_timestep));
        }
        for (field, value) in [
            ("lod_high_distance", self.lod_high_distance),
            ("lod_medium_distance", self.lod_medium_distance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidDistance { field, value });
            }
        }
        if self.lod_high_distance > self.lod_medium_distance {
            return Err(ConfigError::LodThresholdOrder {
                high: self.lod_high_distance,
                medium: self.lod_medium_distance,
            });
        }
        if !self.min_cell_size.is_finite() || self.min_cell_size <= 0.0 {
            return Err(ConfigError::InvalidCellSize(self.min_cell_size));
        }
        if self.parallel_batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.max_substeps_per_step == 0 {
            return Err(ConfigError::ZeroSubsteps);
        }
        Ok(())
    }

    #[inline]
    pub fn wall_collision_enabled(&self) -> bool {
        self.wall_collision_mask != 0
    }
}

/// Global simulation tick counter.
/// Increments each fixed update, used for LOD scheduling.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimTick(pub u64);

impl SimTick {
    pub fn increment(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }
}

/// Counters for the last completed tick.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub tick: u64,
    /// Whether a live target existed; without one steering was skipped.
    pub target_present: bool,
    pub agents: usize,
    /// Agents whose steering was recomputed this tick.
    pub evaluated: usize,
    /// Write-backs skipped because the entity disappeared mid-tick.
    pub stale_writes: usize,
    pub projectiles: usize,
    pub hits: usize,
    pub kills: usize,
}

/// System that logs the tick counters once the pipeline has finished.
pub fn tick_report_system(report: Res<TickReport>) {
    log::debug!(
        "tick {}: agents={} evaluated={} projectiles={} hits={} kills={} stale={}{}",
        report.tick,
        report.agents,
        report.evaluated,
        report.projectiles,
        report.hits,
        report.kills,
        report.stale_writes,
        if report.target_present { "" } else { " (no target)" },
    );
}

/// Simulation Level-of-Detail tier of an agent for the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SimLod {
    /// Full simulation fidelity - updates every tick.
    #[default]
    High,
    /// Reduced fidelity - updates every 2 ticks.
    Medium,
    /// Minimal fidelity - updates every 4 ticks, no separation.
    Low,
}

impl SimLod {
    /// Classify by squared planar distance to the target.
    #[inline]
    pub fn classify(dist_sq: f32, config: &SimConfig) -> Self {
        let high_sq = config.lod_high_distance * config.lod_high_distance;
        let med_sq = config.lod_medium_distance * config.lod_medium_distance;
        if dist_sq <= high_sq {
            SimLod::High
        } else if dist_sq <= med_sq {
            SimLod::Medium
        } else {
            SimLod::Low
        }
    }

    /// Returns the tick interval for this LOD level.
    pub fn tick_interval(&self) -> u64 {
        match self {
            SimLod::High => 1,
            SimLod::Medium => 2,
            SimLod::Low => 4,
        }
    }

    /// Check if an agent with this tier and stable id is evaluated on `tick`.
    #[inline]
    pub fn should_update(&self, tick: u64, stable_id: i32) -> bool {
        let phase = tick.wrapping_add(u64::from(stable_id.unsigned_abs()));
        phase % self.tick_interval() == 0
    }

    /// Low tier skips separation even on its evaluation ticks.
    #[inline]
    pub fn separation_enabled(&self) -> bool {
        !matches!(self, SimLod::Low)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_lod_classification() {
        let config = SimConfig::default();
        assert_eq!(SimLod::classify(0.0, &config), SimLod::High);
        assert_eq!(SimLod::classify(16.0 * 16.0, &config), SimLod::High);
        assert_eq!(SimLod::classify(20.0 * 20.0, &config), SimLod::Medium);
        assert_eq!(SimLod::classify(34.0 * 34.0, &config), SimLod::Medium);
        assert_eq!(SimLod::classify(40.0 * 40.0, &config), SimLod::Low);
    }

    #[test]
    fn test_sim_tick_lod_scheduling() {
        assert!(SimLod::High.should_update(1, 0));
        assert!(SimLod::High.should_update(7, 3));

        assert!(SimLod::Medium.should_update(0, 0));
        assert!(!SimLod::Medium.should_update(1, 0));
        assert!(SimLod::Medium.should_update(1, 1)); // id offset

        assert!(SimLod::Low.should_update(4, 0));
        assert!(!SimLod::Low.should_update(2, 0));
        assert!(SimLod::Low.should_update(1, -3)); // uses |id|
    }

    #[test]
    fn test_low_tier_evaluated_only_on_its_phase() {
        // (tick + id) % 4 == 0 holds at tick 5 for id 7, not at tick 6
        let id = 7;
        assert!(SimLod::Low.should_update(5, id));
        assert!(!SimLod::Low.should_update(6, id));
    }

    #[test]
    fn test_separation_disabled_for_low_tier() {
        assert!(SimLod::High.separation_enabled());
        assert!(SimLod::Medium.separation_enabled());
        assert!(!SimLod::Low.separation_enabled());
    }

    #[test]
    fn test_tick_wraps() {
        let mut tick = SimTick(u64::MAX);
        tick.increment();
        assert_eq!(tick, SimTick(0));
    }

    #[test]
    fn test_config_validation() {
        assert!(SimConfig::default().validate().is_ok());

        let bad = SimConfig {
            fixed_timestep: 0.0,
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(ConfigError::InvalidTimestep(_))));

        let bad = SimConfig {
            lod_high_distance: 50.0,
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(ConfigError::LodThresholdOrder { .. })));

        let bad = SimConfig {
            parallel_batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(ConfigError::ZeroBatchSize)));
    }

    #[test]
    fn test_config_from_partial_json() {
        let config = SimConfig::from_json(r#"{ "wall_collision_mask": 3, "lod_high_distance": 10.0 }"#).unwrap();
        assert_eq!(config.wall_collision_mask, 3);
        assert_eq!(config.lod_high_distance, 10.0);
        assert_eq!(config.lod_medium_distance, 34.0);
        assert!(config.wall_collision_enabled());

        assert!(matches!(SimConfig::from_json("{ nope"), Err(ConfigError::Parse(_))));
    }

    proptest! {
        #[test]
        fn prop_every_tier_evaluated_within_its_interval(start in 0u64..1_000_000, id in any::<i32>()) {
            for lod in [SimLod::High, SimLod::Medium, SimLod::Low] {
                let interval = lod.tick_interval();
                let hits = (start..start + interval).filter(|&t| lod.should_update(t, id)).count();
                prop_assert_eq!(hits, 1);
            }
        }
    }
}
