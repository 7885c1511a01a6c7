//! Bounds module - bounding volumes, overlap tests and the bound component

mod bound;
pub mod intersection;
mod volumes;

pub use bound::{Bound, BoundFlags, BoundState, BoundType, BoundVolume, Renderable};
pub use volumes::{Aabb, Frustum, FrustumFace, Obb, Plane, Sphere};
