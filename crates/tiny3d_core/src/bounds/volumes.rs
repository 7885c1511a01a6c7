//! Geometric bounding volumes
//!
//! Plain value types (sphere, axis-aligned box, oriented box, plane,
//! frustum) plus the routines that carry them through an affine matrix.
//! The [`Bound`](super::Bound) component keeps one of these in local space
//! and one in world space.

use serde::{Deserialize, Serialize};

use crate::foundation::math::{Mat4, Mat4Ext, Vec3};

/// Extents below this are treated as collapsed when re-deriving OBB axes
const DEGENERATE_EXTENT: f32 = 1e-6;

/// A bounding sphere
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    /// Center of the sphere
    pub center: Vec3,
    /// Radius of the sphere
    pub radius: f32,
}

impl Sphere {
    /// Creates a new bounding sphere with the given center and radius
    pub const fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Sphere centered on the points' box, reaching the farthest point.
    ///
    /// Returns `None` for an empty slice.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let center = Aabb::from_points(points)?.center();
        let radius = points
            .iter()
            .map(|p| (p - center).magnitude())
            .fold(0.0_f32, f32::max);
        Some(Self { center, radius })
    }

    /// Check if a point lies inside or on the sphere
    pub fn contains_point(&self, point: Vec3) -> bool {
        (point - self.center).magnitude_squared() <= self.radius * self.radius
    }

    /// World-space sphere under `matrix`.
    ///
    /// The radius is scaled by the matrix's largest stretch so the result
    /// still encloses the ellipsoid a non-uniform or sheared matrix would
    /// produce.
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        Self {
            center: matrix.transform_position(&self.center),
            radius: self.radius * matrix.max_stretch(),
        }
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl Aabb {
    /// Create a new AABB from min and max points
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at a point with given extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// Smallest box containing every point, `None` for an empty slice
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        Some(rest.iter().fold(Self::new(*first, *first), |aabb, p| Self {
            min: aabb.min.inf(p),
            max: aabb.max.sup(p),
        }))
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the extents (half-size) of the AABB
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Check if this AABB contains a point
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x &&
        point.y >= self.min.y && point.y <= self.max.y &&
        point.z >= self.min.z && point.z <= self.max.z
    }

    /// Closest point of the box to `point`
    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        point.sup(&self.min).inf(&self.max)
    }

    /// The eight corners, bit `i` of the index selecting max on axis `i`
    pub fn corners(&self) -> [Vec3; 8] {
        std::array::from_fn(|i| {
            Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            )
        })
    }

    /// World-space box under `matrix`, computed per output axis.
    ///
    /// Each output axis starts at the translation, then every input axis
    /// contributes `m * min` or `m * max`, whichever is smaller for the
    /// minimum (and the other one for the maximum). This gives the same box
    /// as transforming all eight corners without touching any of them.
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        let mut min = matrix.translation_part();
        let mut max = min;

        for i in 0..3 {
            for j in 0..3 {
                let m = matrix[(i, j)];
                if m > 0.0 {
                    min[i] += m * self.min[j];
                    max[i] += m * self.max[j];
                } else {
                    min[i] += m * self.max[j];
                    max[i] += m * self.min[j];
                }
            }
        }

        Self { min, max }
    }
}

/// Oriented bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obb {
    /// Center of the box
    pub center: Vec3,
    /// Unit axes of the box
    pub axes: [Vec3; 3],
    /// Half-size along each axis
    pub extents: Vec3,
}

impl Obb {
    /// Create an OBB from center, axes and half-sizes
    pub const fn new(center: Vec3, axes: [Vec3; 3], extents: Vec3) -> Self {
        Self {
            center,
            axes,
            extents,
        }
    }

    /// OBB aligned with the world axes covering the same region as `aabb`
    pub fn from_aabb(aabb: &Aabb) -> Self {
        Self {
            center: aabb.center(),
            axes: [Vec3::x(), Vec3::y(), Vec3::z()],
            extents: aabb.extents(),
        }
    }

    /// Closest point of the box to `point`
    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        let offset = point - self.center;
        let mut closest = self.center;
        for (axis, extent) in self.axes.iter().zip(self.extents.iter()) {
            let distance = offset.dot(axis).clamp(-extent, *extent);
            closest += axis * distance;
        }
        closest
    }

    /// The eight corners of the box
    pub fn corners(&self) -> [Vec3; 8] {
        std::array::from_fn(|i| {
            let mut corner = self.center;
            for k in 0..3 {
                let sign = if i & (1 << k) == 0 { -1.0 } else { 1.0 };
                corner += self.axes[k] * (sign * self.extents[k]);
            }
            corner
        })
    }

    /// Half-length of the box's projection onto `direction`
    pub fn projected_radius(&self, direction: &Vec3) -> f32 {
        (0..3)
            .map(|k| self.extents[k] * self.axes[k].dot(direction).abs())
            .sum()
    }

    /// World-space box under `matrix`.
    ///
    /// Every scaled axis is pushed through the matrix; its new length is the
    /// new extent. Under non-uniform scale the resulting axes are only
    /// approximately orthogonal.
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        let mut axes = self.axes;
        let mut extents = Vec3::zeros();

        for k in 0..3 {
            let scaled = matrix.transform_direction(&(self.axes[k] * self.extents[k]));
            let length = scaled.magnitude();
            if length > DEGENERATE_EXTENT {
                axes[k] = scaled / length;
            } else {
                // Keep a usable direction for collapsed axes
                axes[k] = matrix
                    .transform_direction(&self.axes[k])
                    .try_normalize(DEGENERATE_EXTENT)
                    .unwrap_or(self.axes[k]);
            }
            extents[k] = length;
        }

        Self {
            center: matrix.transform_position(&self.center),
            axes,
            extents,
        }
    }
}

/// Plane defined by normal and distance from origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    /// Normal vector (normalized)
    pub normal: Vec3,
    /// Distance from origin along the normal
    pub distance: f32,
}

impl Plane {
    /// Create a new plane from normal and distance
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal: normal.normalize(), distance }
    }

    /// Plane `a*x + b*y + c*z + d = 0`, normalized
    pub fn from_coefficients(a: f32, b: f32, c: f32, d: f32) -> Self {
        let normal = Vec3::new(a, b, c);
        let length = normal.magnitude();
        Self {
            normal: normal / length,
            distance: d / length,
        }
    }

    /// Plane through `point` facing `normal`
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        let normal = normal.normalize();
        Self {
            normal,
            distance: -normal.dot(&point),
        }
    }

    /// Calculate signed distance from plane to point
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(&point) + self.distance
    }
}

/// Index of a frustum plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrustumFace {
    /// Left clipping plane
    Left = 0,
    /// Right clipping plane
    Right = 1,
    /// Top clipping plane
    Top = 2,
    /// Bottom clipping plane
    Bottom = 3,
    /// Near clipping plane
    Near = 4,
    /// Far clipping plane
    Far = 5,
}

impl FrustumFace {
    /// All faces in storage order
    pub const ALL: [Self; 6] = [
        Self::Left,
        Self::Right,
        Self::Top,
        Self::Bottom,
        Self::Near,
        Self::Far,
    ];
}

/// View frustum bounded by six planes whose normals point inside
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frustum {
    /// Six planes defining the frustum (left, right, top, bottom, near, far)
    pub planes: [Plane; 6],
}

impl Default for Frustum {
    /// Planes of the OpenGL clip cube `[-1, 1]^3`
    fn default() -> Self {
        Self::from_view_projection(&Mat4::identity())
    }
}

impl Frustum {
    /// Create a frustum from six planes
    pub const fn new(planes: [Plane; 6]) -> Self {
        Self { planes }
    }

    /// Extract frustum planes from a view-projection matrix.
    ///
    /// Gribb-Hartmann extraction for clip space with `-w <= z <= w`
    /// (the convention of `nalgebra::Perspective3`).
    pub fn from_view_projection(matrix: &Mat4) -> Self {
        let row = |i: usize| matrix.row(i).transpose();
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));
        let plane = |v: nalgebra::Vector4<f32>| Plane::from_coefficients(v.x, v.y, v.z, v.w);

        Self {
            planes: [
                plane(r3 + r0),
                plane(r3 - r0),
                plane(r3 - r1),
                plane(r3 + r1),
                plane(r3 + r2),
                plane(r3 - r2),
            ],
        }
    }

    /// Plane of one face
    pub fn face(&self, face: FrustumFace) -> &Plane {
        &self.planes[face as usize]
    }

    /// Replace the plane of one face
    pub fn set_face(&mut self, face: FrustumFace, plane: Plane) {
        self.planes[face as usize] = plane;
    }

    /// Check if a point is inside all six planes
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes.iter().all(|plane| plane.distance_to_point(point) >= 0.0)
    }

    /// Corners of the frustum: near face first, then far, each ordered
    /// bottom-left, bottom-right, top-right, top-left.
    ///
    /// Returns `None` when three of the planes do not meet in a point.
    pub fn corners(&self) -> Option<[Vec3; 8]> {
        use FrustumFace::{Bottom, Far, Left, Near, Right, Top};

        let mut corners = [Vec3::zeros(); 8];
        for (slot, depth) in [Near, Far].into_iter().enumerate() {
            for (k, (side, vertical)) in [(Left, Bottom), (Right, Bottom), (Right, Top), (Left, Top)]
                .into_iter()
                .enumerate()
            {
                corners[slot * 4 + k] =
                    intersect_planes(self.face(depth), self.face(side), self.face(vertical))?;
            }
        }
        Some(corners)
    }
}

/// Point shared by three planes
fn intersect_planes(a: &Plane, b: &Plane, c: &Plane) -> Option<Vec3> {
    let bc = b.normal.cross(&c.normal);
    let denom = a.normal.dot(&bc);
    if denom.abs() < DEGENERATE_EXTENT {
        return None;
    }
    let ca = c.normal.cross(&a.normal);
    let ab = a.normal.cross(&b.normal);
    Some(-(bc * a.distance + ca * b.distance + ab * c.distance) / denom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{constants::HALF_PI, Quat, Transform};
    use approx::assert_relative_eq;

    #[test]
    fn test_aabb_contains_point() {
        let aabb = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));

        assert!(aabb.contains_point(Vec3::zeros()));
        assert!(aabb.contains_point(Vec3::new(0.5, 0.5, 0.5)));
        assert!(!aabb.contains_point(Vec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn test_aabb_from_points() {
        let points = [
            Vec3::new(1.0, -2.0, 0.5),
            Vec3::new(-3.0, 4.0, 0.0),
            Vec3::new(0.0, 0.0, 2.0),
        ];
        let aabb = Aabb::from_points(&points).unwrap();

        assert_eq!(aabb.min, Vec3::new(-3.0, -2.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 4.0, 2.0));
        assert!(Aabb::from_points(&[]).is_none());
    }

    #[test]
    fn test_aabb_rotated_cube_is_unchanged() {
        let aabb = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        let rotation = Transform::new(
            Vec3::zeros(),
            Quat::from_axis_angle(&Vec3::y_axis(), HALF_PI),
            Vec3::new(1.0, 1.0, 1.0),
        );

        let world = aabb.transformed(&rotation.to_matrix());
        assert_relative_eq!(world.min, aabb.min, epsilon = 1e-5);
        assert_relative_eq!(world.max, aabb.max, epsilon = 1e-5);
    }

    #[test]
    fn test_aabb_translated_and_scaled() {
        let aabb = Aabb::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 2.0, 3.0));
        let matrix = Transform::new(Vec3::new(10.0, 0.0, -1.0), Quat::identity(), Vec3::new(2.0, -1.0, 1.0))
            .to_matrix();

        let world = aabb.transformed(&matrix);
        assert_relative_eq!(world.min, Vec3::new(10.0, -2.0, -1.0));
        assert_relative_eq!(world.max, Vec3::new(12.0, 0.0, 2.0));
    }

    #[test]
    fn test_sphere_nonuniform_scale_uses_largest_axis() {
        let sphere = Sphere::new(Vec3::zeros(), 1.0);
        let matrix = Mat4::new_nonuniform_scaling(&Vec3::new(2.0, 3.0, 1.0));

        let world = sphere.transformed(&matrix);
        assert_relative_eq!(world.radius, 3.0, epsilon = 1e-6);
        assert_relative_eq!(world.center, Vec3::zeros());
    }

    #[test]
    fn test_sphere_from_points() {
        let points = [Vec3::new(-1.0, 0.0, 0.0), Vec3::new(3.0, 0.0, 0.0)];
        let sphere = Sphere::from_points(&points).unwrap();

        assert_relative_eq!(sphere.center, Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(sphere.radius, 2.0);
    }

    #[test]
    fn test_obb_transformed_axes_and_extents() {
        let obb = Obb::from_aabb(&Aabb::new(Vec3::new(-1.0, -2.0, -3.0), Vec3::new(1.0, 2.0, 3.0)));
        let matrix = Transform::new(
            Vec3::new(5.0, 0.0, 0.0),
            Quat::from_axis_angle(&Vec3::z_axis(), HALF_PI),
            Vec3::new(2.0, 1.0, 1.0),
        )
        .to_matrix();

        let world = obb.transformed(&matrix);
        assert_relative_eq!(world.center, Vec3::new(5.0, 0.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(world.extents, Vec3::new(2.0, 2.0, 3.0), epsilon = 1e-5);
        assert_relative_eq!(world.axes[0], Vec3::new(0.0, 1.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(world.axes[1], Vec3::new(-1.0, 0.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn test_obb_collapsed_axis_keeps_direction() {
        let obb = Obb::from_aabb(&Aabb::new(Vec3::new(-1.0, -1.0, 0.0), Vec3::new(1.0, 1.0, 0.0)));
        let world = obb.transformed(&Mat4::identity());

        assert_relative_eq!(world.extents.z, 0.0);
        assert_relative_eq!(world.axes[2], Vec3::z());
    }

    #[test]
    fn test_frustum_from_identity_is_clip_cube() {
        let frustum = Frustum::default();

        assert!(frustum.contains_point(Vec3::zeros()));
        assert!(frustum.contains_point(Vec3::new(0.99, -0.99, 0.5)));
        assert!(!frustum.contains_point(Vec3::new(1.5, 0.0, 0.0)));

        let corners = frustum.corners().unwrap();
        assert_relative_eq!(corners[0], Vec3::new(-1.0, -1.0, -1.0), epsilon = 1e-5);
        assert_relative_eq!(corners[6], Vec3::new(1.0, 1.0, 1.0), epsilon = 1e-5);
    }

    #[test]
    fn test_frustum_from_perspective() {
        let projection = nalgebra::Perspective3::new(1.0, HALF_PI, 1.0, 100.0).to_homogeneous();
        let view = Mat4::look_at_rh(
            &nalgebra::Point3::new(0.0, 0.0, 10.0),
            &nalgebra::Point3::origin(),
            &Vec3::y(),
        );
        let frustum = Frustum::from_view_projection(&(projection * view));

        assert!(frustum.contains_point(Vec3::zeros()));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, 20.0)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, -200.0)));
        assert_relative_eq!(frustum.face(FrustumFace::Near).distance_to_point(Vec3::new(0.0, 0.0, 9.0)), 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_frustum_set_face() {
        let mut frustum = Frustum::default();
        let plane = Plane::from_point_normal(Vec3::new(0.0, 0.0, 0.5), Vec3::new(0.0, 0.0, -1.0));
        frustum.set_face(FrustumFace::Far, plane);

        assert_eq!(*frustum.face(FrustumFace::Far), plane);
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, 0.75)));
    }
}
