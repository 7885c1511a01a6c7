//! Bounds demo application
//!
//! Builds a small scene (or loads one from the `.ron`/`.toml` file given as
//! the first argument), spins its pivot for a few frames and logs every
//! colliding pair of bounds.

use tiny3d_core::foundation::logging;
use tiny3d_core::prelude::*;

const FRAMES: usize = 12;
const YAW_PER_FRAME: Degree = Degree(30.0);

#[derive(thiserror::Error, Debug)]
enum DemoError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Pivot at the origin carrying a ship on a 4-unit arm, plus a rock and a
/// camera looking at the ship's path
fn built_in_scene() -> SceneDescription {
    let camera_view = Mat4::look_at_rh(
        &Vec3::new(0.0, 3.0, 10.0).into(),
        &Vec3::zeros().into(),
        &Vec3::y(),
    );
    let camera_projection = Mat4::new_perspective(16.0 / 9.0, Radian::from(Degree(45.0)).value(), 0.1, 20.0);

    SceneDescription {
        config: SceneConfig::default(),
        objects: vec![
            ObjectDescription::new("pivot"),
            ObjectDescription::new("ship")
                .with_parent("pivot")
                .with_transform(Transform::from_position(Vec3::new(4.0, 0.0, 0.0)))
                .with_bound(BoundDescription {
                    movable: true,
                    collision_source: true,
                    ..BoundDescription::new(BoundVolume::Sphere(Sphere::new(Vec3::zeros(), 0.75)))
                }),
            ObjectDescription::new("turret")
                .with_parent("ship")
                .with_transform(Transform::from_position(Vec3::new(0.0, 0.5, 0.0)))
                .with_bound(BoundDescription::new(BoundVolume::Obb(Obb::from_aabb(
                    &Aabb::from_center_extents(Vec3::zeros(), Vec3::new(0.2, 0.2, 0.6)),
                )))),
            ObjectDescription::new("rock")
                .with_transform(Transform::from_position(Vec3::new(0.0, 0.0, -4.0)))
                .with_bound(BoundDescription::new(BoundVolume::Aabb(Aabb::from_center_extents(
                    Vec3::zeros(),
                    Vec3::new(1.0, 1.0, 1.0),
                )))),
            ObjectDescription::new("camera").with_bound(BoundDescription {
                collision_source: true,
                ..BoundDescription::new(BoundVolume::Frustum(Frustum::from_view_projection(
                    &(camera_projection * camera_view),
                )))
            }),
        ],
    }
}

fn run() -> Result<(), DemoError> {
    let description = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading scene description from {path}");
            SceneDescription::load_from_file(&path)?
        }
        None => built_in_scene(),
    };

    let mut scene = Scene::from_description(&description)?;
    let Some(pivot) = scene.find_by_name("pivot").and_then(|id| scene.transform(id)) else {
        log::warn!("Scene has no 'pivot' object; nothing to animate");
        return Ok(());
    };

    for frame in 0..FRAMES {
        scene.graph_mut().yaw(pivot, YAW_PER_FRAME)?;
        let refreshed = scene.update();

        let names: Vec<String> = scene
            .collisions()
            .into_iter()
            .map(|(a, b)| -> CoreResult<String> {
                Ok(format!("{} <-> {}", scene.object(a)?.name(), scene.object(b)?.name()))
            })
            .collect::<CoreResult<_>>()?;
        log::info!("Frame {frame:2}: {refreshed} bound(s) refreshed, collisions: [{}]", names.join(", "));
    }

    Ok(())
}

fn main() {
    logging::init_with_default("info");
    log::info!("Starting bounds demo");

    if let Err(error) = run() {
        log::error!("Demo failed: {error}");
        std::process::exit(1);
    }
}
