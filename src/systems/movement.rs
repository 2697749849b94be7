//! Movement system - integrates steering results into positions.
//!
//! This is the only phase of the steering path that writes agent state. It runs
//! one agent at a time because it calls the wall collaborator, which is not
//! reentrant.

use crate::collaborators::{WallCollider, WallCollision};
use crate::components::*;
use crate::systems::performance::{SimConfig, TickReport};
use crate::systems::steering::{desired_velocity, step_velocity, PendingSteering};
use bevy_ecs::prelude::*;

/// Resource containing the delta time for the current tick.
#[derive(Resource, Default)]
pub struct DeltaTime(pub f32);

/// System that applies pending steering and moves agents.
///
/// For every snapshot index:
/// 1. evaluated agents step toward their desired velocity
/// 2. all agents are reclamped to `max_speed`
/// 3. the displacement is clipped by walls (when enabled) with a slide response
/// 4. facing follows non-negligible planar velocity
///
/// Agents that vanished since the snapshot are skipped.
pub fn integration_system(
    dt: Res<DeltaTime>,
    config: Res<SimConfig>,
    walls: Option<Res<WallCollider>>,
    mut pending: ResMut<PendingSteering>,
    mut report: ResMut<TickReport>,
    mut agents: Query<(&mut Position, &mut Velocity, Option<&mut Facing>), With<Enemy>>,
) {
    let delta = dt.0;
    let PendingSteering {
        snapshot,
        evaluated,
        approach,
        separation,
        ..
    } = std::mem::take(&mut *pending);

    let walls = if config.wall_collision_enabled() {
        walls.as_deref()
    } else {
        None
    };

    for i in 0..snapshot.len() {
        let params = &snapshot.params[i];
        let mut vel = snapshot.velocities[i];
        if evaluated[i] {
            let desired = desired_velocity(approach[i], separation[i], params);
            vel = step_velocity(vel, desired, params.acceleration, delta);
        }
        vel = vel.clamped(params.max_speed);

        let entity = snapshot.entities[i];
        let Ok((mut pos, mut velocity, facing)) = agents.get_mut(entity) else {
            log::trace!("agent {:?} gone before integration, skipped", entity);
            report.stale_writes += 1;
            continue;
        };

        let displacement = (saturate(vel.vx * delta), saturate(vel.vy * delta));
        match walls {
            Some(WallCollider(walls)) => {
                let radius = snapshot.body_radii[i];
                let mask = config.wall_collision_mask;
                let sweep = walls.sweep((pos.x, pos.y), displacement, radius, mask);
                pos.x = saturate(pos.x + sweep.allowed.0);
                pos.y = saturate(pos.y + sweep.allowed.1);
                if let Some(normal) = sweep.normal {
                    let (vx, vy) = walls.remove_into_surface((vel.vx, vel.vy), normal);
                    vel = Velocity::new(saturate(vx), saturate(vy));
                }
                let (cx, cy) = walls.clearance_correction((pos.x, pos.y), radius, mask);
                pos.x = saturate(pos.x + cx);
                pos.y = saturate(pos.y + cy);
            }
            None => {
                pos.x = saturate(pos.x + displacement.0);
                pos.y = saturate(pos.y + displacement.1);
            }
        }

        if let Some(mut facing) = facing {
            if vel.magnitude_sq() > EPSILON_SQ {
                let dir = vel.normalized();
                *facing = Facing { x: dir.vx, y: dir.vy };
            }
        }

        *velocity = vel;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::SweepResult;
    use crate::systems::performance::SimTick;
    use crate::systems::steering::steering_gather_system;

    /// Vertical wall at x = `x`, blocking motion toward +x.
    struct WallAt {
        x: f32,
    }

    impl WallCollision for WallAt {
        fn sweep(&self, start: (f32, f32), displacement: (f32, f32), radius: f32, _mask: u32) -> SweepResult {
            let limit = self.x - radius;
            let end_x = start.0 + displacement.0;
            if end_x <= limit {
                return SweepResult::clear(displacement);
            }
            SweepResult {
                allowed: ((limit - start.0).max(0.0), displacement.1),
                normal: Some((-1.0, 0.0)),
            }
        }
    }

    fn setup(config: SimConfig) -> (World, Schedule) {
        let mut world = World::new();
        world.insert_resource(DeltaTime(0.1));
        world.insert_resource(config);
        world.insert_resource(SimTick(0));
        world.insert_resource(PendingSteering::default());
        world.insert_resource(TickReport::default());

        let mut schedule = Schedule::default();
        schedule.add_systems((steering_gather_system, integration_system).chain());
        (world, schedule)
    }

    fn fast_agent(id: i32, x: f32, y: f32) -> EnemyBundle {
        EnemyBundle {
            steering: SteeringParams {
                move_speed: 4.0,
                max_speed: 5.0,
                acceleration: 1000.0,
                contact_radius: 0.5,
                separation_radius: 1.0,
                separation_weight: 1.0,
            },
            ..EnemyBundle::new(id, x, y)
        }
    }

    #[test]
    fn test_movement_applies_velocity() {
        let (mut world, mut schedule) = setup(SimConfig::default());
        world.spawn(PlayerBundle {
            position: Position::new(10.0, 0.0),
            ..Default::default()
        });
        let agent = world.spawn(fast_agent(0, 0.0, 0.0)).id();

        schedule.run(&mut world);

        let pos = world.get::<Position>(agent).unwrap();
        let vel = world.get::<Velocity>(agent).unwrap();
        let facing = world.get::<Facing>(agent).unwrap();
        assert!((vel.vx - 4.0).abs() < 1e-4);
        assert!((pos.x - 0.4).abs() < 1e-4);
        assert!((facing.x - 1.0).abs() < 1e-5);
        assert_eq!(pos.elevation, 0.0);
    }

    #[test]
    fn test_unevaluated_agent_keeps_velocity_but_is_reclamped() {
        let (mut world, mut schedule) = setup(SimConfig::default());
        world.resource_mut::<SimTick>().0 = 1;
        world.spawn(PlayerBundle::default());
        // Medium tier (20 units), id 0 -> (1 + 0) % 2 != 0, not evaluated
        let mut bundle = fast_agent(0, 20.0, 0.0);
        bundle.velocity = Velocity::new(0.0, 30.0);
        let agent = world.spawn(bundle).id();

        schedule.run(&mut world);

        let vel = world.get::<Velocity>(agent).unwrap();
        assert!(vel.vx.abs() < 1e-6, "direction must not be re-steered");
        assert!((vel.vy - 5.0).abs() < 1e-4, "speed clamped to max_speed");
        let pos = world.get::<Position>(agent).unwrap();
        assert!((pos.y - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_facing_kept_when_stationary() {
        let (mut world, mut schedule) = setup(SimConfig::default());
        world.spawn(PlayerBundle::default());
        // Inside contact radius -> no approach, no velocity
        let mut bundle = fast_agent(0, 0.1, 0.0);
        bundle.facing = Facing { x: 0.0, y: -1.0 };
        let agent = world.spawn(bundle).id();

        schedule.run(&mut world);

        assert_eq!(*world.get::<Facing>(agent).unwrap(), Facing { x: 0.0, y: -1.0 });
        assert_eq!(*world.get::<Velocity>(agent).unwrap(), Velocity::ZERO);
    }

    #[test]
    fn test_wall_blocks_and_slides() {
        let (mut world, mut schedule) = setup(SimConfig {
            wall_collision_mask: 1,
            ..Default::default()
        });
        world.insert_resource(WallCollider::new(WallAt { x: 1.0 }));
        world.spawn(PlayerBundle {
            position: Position::new(10.0, 10.0),
            ..Default::default()
        });
        let agent = world.spawn(fast_agent(0, 0.45, 0.0)).id();

        schedule.run(&mut world);

        let pos = world.get::<Position>(agent).unwrap();
        let vel = world.get::<Velocity>(agent).unwrap();
        // body radius 0.5 -> stops at x = 0.5
        assert!((pos.x - 0.5).abs() < 1e-5);
        assert!(pos.y > 0.0);
        assert!(vel.vx.abs() < 1e-5, "into-wall component removed");
        assert!(vel.vy > 0.0);
    }

    #[test]
    fn test_wall_ignored_when_mask_zero() {
        let (mut world, mut schedule) = setup(SimConfig::default());
        world.insert_resource(WallCollider::new(WallAt { x: 0.0 }));
        world.spawn(PlayerBundle {
            position: Position::new(10.0, 0.0),
            ..Default::default()
        });
        let agent = world.spawn(fast_agent(0, 0.0, 0.0)).id();

        schedule.run(&mut world);

        assert!((world.get::<Position>(agent).unwrap().x - 0.4).abs() < 1e-4);
    }

    #[test]
    fn test_extreme_params_keep_state_finite() {
        let (mut world, mut schedule) = setup(SimConfig::default());
        world.spawn(PlayerBundle {
            position: Position::new(3.0, 0.0),
            ..Default::default()
        });
        let extreme = SteeringParams {
            move_speed: 3e38,
            max_speed: 0.0,
            acceleration: 0.0,
            contact_radius: 0.0,
            separation_radius: 1.0,
            separation_weight: 3e38,
        };
        let a = world
            .spawn(EnemyBundle {
                steering: extreme,
                ..EnemyBundle::new(0, 0.0, 0.0)
            })
            .id();
        let b = world
            .spawn(EnemyBundle {
                steering: extreme,
                ..EnemyBundle::new(1, 0.5, 0.0)
            })
            .id();

        for _ in 0..3 {
            schedule.run(&mut world);
        }

        for agent in [a, b] {
            let pos = world.get::<Position>(agent).unwrap();
            let vel = world.get::<Velocity>(agent).unwrap();
            let facing = world.get::<Facing>(agent).unwrap();
            assert!(pos.x.is_finite() && pos.y.is_finite(), "{:?}", pos);
            assert!(vel.vx.is_finite() && vel.vy.is_finite(), "{:?}", vel);
            assert!(facing.x.is_finite() && facing.y.is_finite());
        }
    }

    #[test]
    fn test_stale_agent_skipped() {
        let (mut world, _) = setup(SimConfig::default());
        world.spawn(PlayerBundle::default());
        let agent = world.spawn(fast_agent(0, 5.0, 0.0)).id();

        let mut gather = Schedule::default();
        gather.add_systems(steering_gather_system);
        gather.run(&mut world);

        // Removed by someone else between gather and apply
        world.despawn(agent);

        let mut apply = Schedule::default();
        apply.add_systems(integration_system);
        apply.run(&mut world);

        assert_eq!(world.resource::<TickReport>().stale_writes, 1);
        assert!(world.resource::<PendingSteering>().is_empty());
    }
}
