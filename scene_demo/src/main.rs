//! Fleet Culling Demo
//!
//! Headless run of a scene:
//! - Ships wander inside the octree volume and bounce off its walls
//! - Each ship carries a turret child that follows it through the hierarchy
//! - Ship hull bounds are "parsed" on loader threads and installed later
//! - A slowly turning camera culls the fleet through the octree each frame
//!
//! Pass a `.toml` or `.ron` scene config path to override the defaults.

use rand::Rng;
use scene_world::prelude::*;
use scene_world::foundation::{logging, math::Point3};
use std::f32::consts::TAU;

// Simulation settings
const FRAMES: u64 = 600;
const DELTA_TIME: f32 = 1.0 / 60.0;
const REPORT_EVERY: u64 = 60;

// Fleet
const NUM_SHIPS: usize = 40;
const SHIP_SPEED: f32 = 12.0;
const SHIP_SIZE: f32 = 1.5;
const TURRET_SIZE: f32 = 0.4;
const TURRET_OFFSET: f32 = 1.2;

struct Ship {
    entity: Entity,
    velocity: Vec3,
}

fn cube(half_size: f32) -> AABB {
    AABB::from_center_extents(Vec3::zeros(), Vec3::repeat(half_size))
}

fn spawn_ship(scene: &mut SceneManager, rng: &mut impl Rng, area: f32, index: usize) -> Ship {
    let position = Vec3::new(
        rng.gen_range(-area..area),
        rng.gen_range(-area..area),
        rng.gen_range(-area..area),
    );
    let velocity = Vec3::new(
        rng.gen_range(-1.0..1.0),
        rng.gen_range(-1.0..1.0),
        rng.gen_range(-1.0..1.0),
    )
    .try_normalize(f32::EPSILON)
    .unwrap_or_else(Vec3::x)
        * SHIP_SPEED;

    let entity = scene.spawn("Ship", None, &Transform::from_position(position), None);
    scene.spawn(
        "Turret",
        Some(entity),
        &Transform::from_position(Vec3::new(0.0, TURRET_OFFSET, 0.0)),
        Some(cube(TURRET_SIZE)),
    );

    // Hull bounds arrive from a worker, standing in for a mesh parse
    let scale = 1.0 + (index % 3) as f32 * 0.5;
    let _ = scene.load(entity, move || Ok(BoundsComponent::new(cube(SHIP_SIZE * scale))));

    Ship { entity, velocity }
}

fn spawn_fleet(scene: &mut SceneManager, area: f32) -> Vec<Ship> {
    let mut rng = rand::thread_rng();
    (0..NUM_SHIPS).map(|index| spawn_ship(scene, &mut rng, area, index)).collect()
}

fn move_ships(scene: &mut SceneManager, ships: &mut [Ship], limit: f32) {
    let world = scene.world_mut();
    for ship in ships.iter_mut() {
        let Some(transform) = world.get_component_mut::<TransformComponent>(ship.entity) else {
            continue;
        };

        let mut position = transform.position + ship.velocity * DELTA_TIME;
        for axis in 0..3 {
            if position[axis].abs() > limit {
                position[axis] = position[axis].clamp(-limit, limit);
                ship.velocity[axis] = -ship.velocity[axis];
            }
        }
        transform.set_position(position);
    }
}

fn camera_frustum(frame: u64, distance: f32) -> Frustum {
    let angle = frame as f32 / FRAMES as f32 * TAU;
    let eye = Point3::new(angle.cos() * distance, distance * 0.3, angle.sin() * distance);
    let view = Mat4::look_at_rh(&eye, &Point3::origin(), &Vec3::y());
    let projection = Mat4::new_perspective(16.0 / 9.0, std::f32::consts::FRAC_PI_4, 0.1, distance * 2.0);
    Frustum::from_matrix(&(projection * view))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_with_level(log::LevelFilter::Info);

    let config = match std::env::args().nth(1) {
        Some(path) => SceneConfig::load_from_file(&path)?,
        None => SceneConfig::default(),
    };
    log::info!("Scene config: {config:?}");

    let mut scene = SceneManager::new(&config.octree)?.with_loader(&config.loader)?;
    let extent = config.octree.extent;
    let limit = extent * 0.8;

    let mut ships = spawn_fleet(&mut scene, limit);
    log::info!("Spawned {} ships", ships.len());

    let mut visible_total = 0usize;
    for frame in 0..FRAMES {
        move_ships(&mut scene, &mut ships, limit);
        let report = scene.update();
        if report.dropped > 0 {
            log::warn!("Frame {frame}: {} entities left the octree", report.dropped);
        }

        let visible = scene.visible_entities(&camera_frustum(frame, extent * 1.5));
        visible_total += visible.len();

        if frame % REPORT_EVERY == 0 {
            let stats = scene.stats();
            log::info!(
                "Frame {frame}: {} visible of {} indexed, octree depth {}, {} loads applied",
                visible.len(),
                stats.indexed,
                stats.octree_depth,
                report.loaded.applied
            );
        }

        // Retire a ship now and then and launch a replacement
        if frame % 150 == 149 {
            if let Some(ship) = ships.pop() {
                scene.despawn(ship.entity);
            }
            let replacement = spawn_ship(&mut scene, &mut rand::thread_rng(), limit, frame as usize);
            ships.push(replacement);
        }
    }

    let stats = scene.stats();
    log::info!(
        "Done: {} frames, {} entities, average {:.1} visible",
        stats.frames,
        stats.entities,
        visible_total as f32 / FRAMES as f32
    );
    log::info!("Component stores: {:?}", scene.world().store_summary());
    Ok(())
}
