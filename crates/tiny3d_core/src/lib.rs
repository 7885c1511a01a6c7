//! # Tiny3D Core
//!
//! Spatial core of the Tiny3D engine: a transform hierarchy with lazily
//! cached world matrices, bounding volumes that follow those transforms,
//! and symmetric overlap tests between every pair of volume kinds.
//!
//! ## Features
//!
//! - **Transform graph**: arena-backed parent/child hierarchy with dirty propagation
//! - **Change callbacks**: per-node position/orientation/scaling observers
//! - **Bounds**: sphere, axis-aligned box, oriented box and frustum volumes
//! - **Scene wiring**: game objects whose bounds track their transforms
//! - **Descriptions**: scenes loaded from and saved to RON or TOML
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tiny3d_core::prelude::*;
//!
//! fn main() -> Result<(), CoreError> {
//!     let mut scene = Scene::default();
//!     let ship = scene.spawn("ship", None)?;
//!     let rock = scene.spawn("rock", None)?;
//!
//!     scene.attach_bound(ship, Bound::sphere(Sphere::new(Vec3::zeros(), 1.0)))?;
//!     scene.attach_bound(rock, Bound::aabb(Aabb::from_center_extents(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0))))?;
//!     scene.start_bound(ship)?;
//!     scene.start_bound(rock)?;
//!
//!     if let Some(node) = scene.transform(ship) {
//!         scene.graph_mut().translate_xyz(node, 1.5, 0.0, 0.0)?;
//!     }
//!     scene.update();
//!     assert!(scene.test(ship, rock)?);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod bounds;
pub mod config;
pub mod error;
pub mod foundation;
pub mod scene;

pub use error::{CoreError, CoreResult};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        bounds::{Aabb, Bound, BoundFlags, BoundState, BoundType, BoundVolume, Frustum, FrustumFace, Obb, Plane, Sphere},
        config::{Config, ConfigError, ConfigFormat, OrphanPolicy, SceneConfig},
        error::{CoreError, CoreResult},
        foundation::math::{Degree, Mat4, Quat, Radian, Transform, Vec3},
        scene::{
            BoundDescription, GameObjectId, NodeId, ObjectDescription, Scene, SceneDescription, SubscriptionId,
            TransformChanged, TransformGraph,
        },
    };
}
