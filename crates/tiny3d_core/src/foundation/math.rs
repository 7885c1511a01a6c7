//! Math utilities and types
//!
//! Provides the fundamental math types used by the transform hierarchy and
//! the bounding volumes.

use serde::{Deserialize, Serialize};

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Unit, Vector3, Vector4};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations (always normalized)
pub type Quat = Unit<Quaternion<f32>>;

/// Angle in radians
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Radian(pub f32);

/// Angle in degrees
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Degree(pub f32);

impl Radian {
    /// Raw value in radians
    pub const fn value(self) -> f32 {
        self.0
    }
}

impl Degree {
    /// Raw value in degrees
    pub const fn value(self) -> f32 {
        self.0
    }
}

impl From<Degree> for Radian {
    fn from(degree: Degree) -> Self {
        Self(utils::deg_to_rad(degree.0))
    }
}

impl From<Radian> for Degree {
    fn from(radian: Radian) -> Self {
        Self(utils::rad_to_deg(radian.0))
    }
}

/// Local transform made of position, rotation and scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Position relative to the parent
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a transform from all three components
    pub const fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Convert to a transformation matrix (scale, then rotate, then translate)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// Decompose an affine matrix into position, rotation and scale.
    ///
    /// Shear cannot be represented and is dropped. A mirrored matrix
    /// (negative determinant) is reported with a negative X scale so the
    /// recomposed matrix keeps its handedness.
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let position = Vec3::new(matrix.m14, matrix.m24, matrix.m34);

        let linear = matrix.linear_part();
        let mut scale = Vec3::new(
            linear.column(0).magnitude(),
            linear.column(1).magnitude(),
            linear.column(2).magnitude(),
        );
        if linear.determinant() < 0.0 {
            scale.x = -scale.x;
        }

        // Degenerate axes keep an identity column so the rotation stays valid
        let mut rotation_matrix = Mat3::identity();
        for axis in 0..3 {
            if scale[axis].abs() > f32::EPSILON {
                rotation_matrix.set_column(axis, &(linear.column(axis) / scale[axis]));
            }
        }
        let rotation = Quat::from_matrix(&rotation_matrix);

        Self {
            position,
            rotation,
            scale,
        }
    }
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Pi / 2
    pub const HALF_PI: f32 = PI * 0.5;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// Radians to degrees conversion factor
    pub const RAD_TO_DEG: f32 = 180.0 / PI;
}

/// Math utility functions
pub mod utils {
    use super::constants;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Convert radians to degrees
    pub fn rad_to_deg(radians: f32) -> f32 {
        radians * constants::RAD_TO_DEG
    }
}

/// Iteration cap for the singular value decomposition in [`Mat4Ext::max_stretch`]
const SVD_MAX_ITERATIONS: usize = 100;

/// Extension trait for reading affine matrices
pub trait Mat4Ext {
    /// Translation column of the matrix
    fn translation_part(&self) -> Vec3;

    /// Upper-left 3x3 rotation/scale block
    fn linear_part(&self) -> Mat3;

    /// Length of each basis column, i.e. the world scale along each local axis
    fn axis_scales(&self) -> Vec3;

    /// Largest factor by which the linear block lengthens any vector, i.e.
    /// its largest singular value. Unlike [`Mat4Ext::axis_scales`] this
    /// accounts for shear.
    fn max_stretch(&self) -> f32;

    /// Transform a position (translation applied)
    fn transform_position(&self, position: &Vec3) -> Vec3;

    /// Transform a direction (translation ignored, not normalized)
    fn transform_direction(&self, direction: &Vec3) -> Vec3;
}

impl Mat4Ext for Mat4 {
    fn translation_part(&self) -> Vec3 {
        Vec3::new(self.m14, self.m24, self.m34)
    }

    fn linear_part(&self) -> Mat3 {
        self.fixed_view::<3, 3>(0, 0).into_owned()
    }

    fn axis_scales(&self) -> Vec3 {
        let linear = self.linear_part();
        Vec3::new(
            linear.column(0).magnitude(),
            linear.column(1).magnitude(),
            linear.column(2).magnitude(),
        )
    }

    fn max_stretch(&self) -> f32 {
        let linear = self.linear_part();
        // Frobenius norm bounds the largest singular value from above
        linear
            .try_svd(false, false, f32::EPSILON, SVD_MAX_ITERATIONS)
            .map_or_else(|| linear.norm(), |svd| svd.singular_values.max())
    }

    fn transform_position(&self, position: &Vec3) -> Vec3 {
        self.transform_point(&Point3::from(*position)).coords
    }

    fn transform_direction(&self, direction: &Vec3) -> Vec3 {
        self.transform_vector(direction)
    }
}
