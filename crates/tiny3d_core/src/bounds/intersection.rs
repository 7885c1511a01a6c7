//! Pairwise overlap tests between bounding volumes
//!
//! One routine per unordered pair of volume kinds. Callers that hold the
//! pair in the "wrong" order swap the arguments rather than use a second
//! routine, so both directions of a mixed test run the same arithmetic.
//!
//! Tests involving a [`Frustum`] are conservative: they never miss an
//! overlap but may report one for a volume just outside a frustum corner.

use super::volumes::{Aabb, Frustum, Obb, Sphere};
use crate::foundation::math::Vec3;

/// Cross-product axes shorter than this (parallel edges) are skipped
const PARALLEL_EPSILON: f32 = 1e-6;

/// Sphere against sphere
pub fn sphere_sphere(a: &Sphere, b: &Sphere) -> bool {
    let distance_squared = (a.center - b.center).magnitude_squared();
    let radius_sum = a.radius + b.radius;
    distance_squared <= radius_sum * radius_sum
}

/// Sphere against axis-aligned box, via the box's closest point
pub fn sphere_aabb(sphere: &Sphere, aabb: &Aabb) -> bool {
    let closest = aabb.closest_point(sphere.center);
    (closest - sphere.center).magnitude_squared() <= sphere.radius * sphere.radius
}

/// Sphere against oriented box, via the box's closest point
pub fn sphere_obb(sphere: &Sphere, obb: &Obb) -> bool {
    let closest = obb.closest_point(sphere.center);
    (closest - sphere.center).magnitude_squared() <= sphere.radius * sphere.radius
}

/// Sphere against frustum: rejected only when fully behind one plane
pub fn sphere_frustum(sphere: &Sphere, frustum: &Frustum) -> bool {
    frustum
        .planes
        .iter()
        .all(|plane| plane.distance_to_point(sphere.center) >= -sphere.radius)
}

/// Axis-aligned box against axis-aligned box
pub fn aabb_aabb(a: &Aabb, b: &Aabb) -> bool {
    a.min.x <= b.max.x && a.max.x >= b.min.x &&
    a.min.y <= b.max.y && a.max.y >= b.min.y &&
    a.min.z <= b.max.z && a.max.z >= b.min.z
}

/// Axis-aligned box against oriented box
pub fn aabb_obb(aabb: &Aabb, obb: &Obb) -> bool {
    obb_obb(&Obb::from_aabb(aabb), obb)
}

/// Axis-aligned box against frustum
pub fn aabb_frustum(aabb: &Aabb, frustum: &Frustum) -> bool {
    // For each plane, check if the AABB is completely outside
    for plane in &frustum.planes {
        // Corner of the box farthest along the plane normal
        let mut p = aabb.min;
        if plane.normal.x >= 0.0 { p.x = aabb.max.x; }
        if plane.normal.y >= 0.0 { p.y = aabb.max.y; }
        if plane.normal.z >= 0.0 { p.z = aabb.max.z; }

        if plane.distance_to_point(p) < 0.0 {
            return false;
        }
    }

    true
}

/// Oriented box against oriented box.
///
/// Separating axis theorem over the 15 candidate axes (3 face normals of
/// each box and the 9 edge cross products), evaluated in world space with
/// unnormalized axes.
pub fn obb_obb(a: &Obb, b: &Obb) -> bool {
    let offset = b.center - a.center;

    let separates = |axis: &Vec3| {
        let distance = offset.dot(axis).abs();
        distance > a.projected_radius(axis) + b.projected_radius(axis)
    };

    if a.axes.iter().chain(b.axes.iter()).any(|axis| separates(axis)) {
        return false;
    }

    for axis_a in &a.axes {
        for axis_b in &b.axes {
            let axis = axis_a.cross(axis_b);
            if axis.magnitude_squared() > PARALLEL_EPSILON && separates(&axis) {
                return false;
            }
        }
    }

    true
}

/// Oriented box against frustum
pub fn obb_frustum(obb: &Obb, frustum: &Frustum) -> bool {
    frustum.planes.iter().all(|plane| {
        plane.distance_to_point(obb.center) >= -obb.projected_radius(&plane.normal)
    })
}

/// Frustum against frustum.
///
/// Separated when every corner of one frustum lies behind a single plane of
/// the other, checked in both directions. Frustums whose planes do not form
/// corners are assumed to overlap.
pub fn frustum_frustum(a: &Frustum, b: &Frustum) -> bool {
    let (Some(corners_a), Some(corners_b)) = (a.corners(), b.corners()) else {
        return true;
    };

    let outside = |frustum: &Frustum, corners: &[Vec3; 8]| {
        frustum.planes.iter().any(|plane| {
            corners.iter().all(|corner| plane.distance_to_point(*corner) < 0.0)
        })
    };

    !(outside(a, &corners_b) || outside(b, &corners_a))
}
