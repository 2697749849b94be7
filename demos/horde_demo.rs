//! Horde demonstration: a few hundred agents chase a moving target behind a
//! wall while projectiles are fired into the pack.
//!
//! Run with: RUST_LOG=debug cargo run --example horde_demo

use horde_sim::{ReleaseLog, SimConfig, SimWorld, SweepResult, WallCollision};

/// Infinite wall along x = `x`, solid on the positive side.
struct HalfPlaneWall {
    x: f32,
}

impl WallCollision for HalfPlaneWall {
    fn sweep(&self, start: (f32, f32), displacement: (f32, f32), radius: f32, _mask: u32) -> SweepResult {
        let limit = self.x - radius;
        if start.0 + displacement.0 <= limit {
            return SweepResult::clear(displacement);
        }
        SweepResult {
            allowed: ((limit - start.0).max(0.0), displacement.1),
            normal: Some((-1.0, 0.0)),
        }
    }

    fn clearance_correction(&self, position: (f32, f32), radius: f32, _mask: u32) -> (f32, f32) {
        let overlap = position.0 - (self.x - radius);
        if overlap > 0.0 {
            (-overlap, 0.0)
        } else {
            (0.0, 0.0)
        }
    }
}

fn main() {
    env_logger::init();
    println!("=== Horde Sim - Demo ===\n");

    let config = SimConfig {
        wall_collision_mask: 1,
        ..Default::default()
    };
    let mut sim = match SimWorld::with_config(config) {
        Ok(sim) => sim,
        Err(err) => {
            eprintln!("bad config: {err}");
            return;
        }
    };

    let pool = ReleaseLog::new();
    sim.set_projectile_pool(pool.clone());
    sim.set_wall_collider(HalfPlaneWall { x: 20.0 });

    sim.spawn_player(25.0, 0.0);
    sim.spawn_horde(-30.0, 0.0, 300, 30.0, 0);
    let turret = sim.world_mut().spawn_empty().id();

    println!("Initial state:");
    print_summary(&mut sim);

    // 10 seconds at 60 fps
    for frame in 0..600 {
        sim.step(1.0 / 60.0);

        // Target strafes up and down
        let t = sim.current_time();
        sim.set_player_position(25.0, 10.0 * (t * 0.5).sin());

        // A volley every half second along the target's line
        if frame % 30 == 0 {
            for i in 0..10 {
                sim.spawn_projectile(10.0 - i as f32, (i as f32 - 5.0) * 0.8, 4.0, turret);
            }
        }

        let removed = sim.despawn_flagged();
        if removed > 0 {
            println!("  tick {}: {} agents killed", sim.current_tick(), removed);
        }

        if (frame + 1) % 120 == 0 {
            println!("--- Tick {} (t={:.1}s) ---", sim.current_tick(), sim.current_time());
            print_summary(&mut sim);
        }
    }

    println!("\nProjectiles returned to pool: {}", pool.released().len());
    println!("\n=== Final Report (JSON) ===\n");
    match serde_json::to_string_pretty(&sim.last_report()) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("failed to serialize report: {err}"),
    }
}

fn print_summary(sim: &mut SimWorld) {
    let snapshot = sim.snapshot();
    let count = snapshot.enemies.len();
    if count == 0 {
        println!("  no agents left");
        return;
    }

    let (px, py) = snapshot.player.unwrap_or((0.0, 0.0));
    let mean_distance: f32 = snapshot
        .enemies
        .iter()
        .map(|e| ((e.x - px).powi(2) + (e.y - py).powi(2)).sqrt())
        .sum::<f32>()
        / count as f32;
    let max_x = snapshot.enemies.iter().map(|e| e.x).fold(f32::MIN, f32::max);

    println!(
        "  agents={} mean_dist={:.2} max_x={:.2} projectiles_active={}",
        count, mean_distance, max_x, snapshot.projectiles_active
    );
}
