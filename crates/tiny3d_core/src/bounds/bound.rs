//! Bound component: a local-space volume and its world-space image
//!
//! A [`Bound`] keeps the authoring-time ("original") volume untouched and
//! re-derives the world-space ("current") volume from the owning
//! transform's world matrix, either when a change callback fires or when
//! the scene polls it once per frame.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::intersection;
use super::volumes::{Aabb, Frustum, FrustumFace, Obb, Plane, Sphere};
use crate::error::{CoreError, CoreResult};
use crate::foundation::math::{Mat4, Quat, Vec3};
use crate::scene::TransformChanged;

/// Kind of volume held by a bound, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoundType {
    /// Bounding sphere
    Sphere,
    /// Axis-aligned bounding box
    Aabb,
    /// Oriented bounding box
    Obb,
    /// View frustum
    Frustum,
}

bitflags! {
    /// Classification flags of a bound
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BoundFlags: u8 {
        /// The owner is expected to move
        const MOVABLE = 0b001;
        /// The bound actively looks for collisions
        const COLLISION_SOURCE = 0b010;
        /// The bound takes part in queries
        const ENABLED = 0b100;
    }
}

impl Default for BoundFlags {
    fn default() -> Self {
        Self::ENABLED
    }
}

/// Whether the current volume matches the last transform seen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundState {
    /// Constructed or changed since the last update
    Stale,
    /// World volume matches the transform
    Current,
}

/// Debug-visualization handle a bound may expose
pub trait Renderable {
    /// Name shown by debug overlays
    fn debug_name(&self) -> &str;
}

/// One bounding volume of any supported kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BoundVolume {
    /// Bounding sphere
    Sphere(Sphere),
    /// Axis-aligned bounding box
    Aabb(Aabb),
    /// Oriented bounding box
    Obb(Obb),
    /// View frustum
    Frustum(Frustum),
}

impl BoundVolume {
    /// Kind of this volume
    pub const fn bound_type(&self) -> BoundType {
        match self {
            Self::Sphere(_) => BoundType::Sphere,
            Self::Aabb(_) => BoundType::Aabb,
            Self::Obb(_) => BoundType::Obb,
            Self::Frustum(_) => BoundType::Frustum,
        }
    }

    /// World-space image of this volume. Frustums are returned unchanged:
    /// the camera rebuilds them from its projection.
    pub fn transformed(&self, world: &Mat4) -> Self {
        match self {
            Self::Sphere(sphere) => Self::Sphere(sphere.transformed(world)),
            Self::Aabb(aabb) => Self::Aabb(aabb.transformed(world)),
            Self::Obb(obb) => Self::Obb(obb.transformed(world)),
            Self::Frustum(frustum) => Self::Frustum(*frustum),
        }
    }

    /// Overlap with a sphere
    pub fn test_sphere(&self, sphere: &Sphere) -> bool {
        match self {
            Self::Sphere(own) => intersection::sphere_sphere(own, sphere),
            Self::Aabb(own) => intersection::sphere_aabb(sphere, own),
            Self::Obb(own) => intersection::sphere_obb(sphere, own),
            Self::Frustum(own) => intersection::sphere_frustum(sphere, own),
        }
    }

    /// Overlap with an axis-aligned box
    pub fn test_aabb(&self, aabb: &Aabb) -> bool {
        match self {
            Self::Sphere(own) => intersection::sphere_aabb(own, aabb),
            Self::Aabb(own) => intersection::aabb_aabb(own, aabb),
            Self::Obb(own) => intersection::aabb_obb(aabb, own),
            Self::Frustum(own) => intersection::aabb_frustum(aabb, own),
        }
    }

    /// Overlap with an oriented box
    pub fn test_obb(&self, obb: &Obb) -> bool {
        match self {
            Self::Sphere(own) => intersection::sphere_obb(own, obb),
            Self::Aabb(own) => intersection::aabb_obb(own, obb),
            Self::Obb(own) => intersection::obb_obb(own, obb),
            Self::Frustum(own) => intersection::obb_frustum(obb, own),
        }
    }

    /// Overlap with a frustum
    pub fn test_frustum(&self, frustum: &Frustum) -> bool {
        match self {
            Self::Sphere(own) => intersection::sphere_frustum(own, frustum),
            Self::Aabb(own) => intersection::aabb_frustum(own, frustum),
            Self::Obb(own) => intersection::obb_frustum(own, frustum),
            Self::Frustum(own) => intersection::frustum_frustum(own, frustum),
        }
    }

    /// Double dispatch on the other volume's kind
    pub fn test(&self, other: &Self) -> bool {
        match other {
            Self::Sphere(sphere) => self.test_sphere(sphere),
            Self::Aabb(aabb) => self.test_aabb(aabb),
            Self::Obb(obb) => self.test_obb(obb),
            Self::Frustum(frustum) => self.test_frustum(frustum),
        }
    }
}

/// Collision/culling volume attached to a game object
#[derive(Debug, Clone, PartialEq)]
pub struct Bound {
    group_id: u32,
    flags: BoundFlags,
    original: BoundVolume,
    current: BoundVolume,
    state: BoundState,
}

impl Bound {
    /// Create a bound from its local-space volume
    pub const fn new(original: BoundVolume) -> Self {
        Self {
            group_id: 0,
            flags: BoundFlags::ENABLED,
            original,
            current: original,
            state: BoundState::Stale,
        }
    }

    /// Sphere bound
    pub const fn sphere(sphere: Sphere) -> Self {
        Self::new(BoundVolume::Sphere(sphere))
    }

    /// Axis-aligned box bound
    pub const fn aabb(aabb: Aabb) -> Self {
        Self::new(BoundVolume::Aabb(aabb))
    }

    /// Oriented box bound
    pub const fn obb(obb: Obb) -> Self {
        Self::new(BoundVolume::Obb(obb))
    }

    /// Frustum bound. Frustums are never derived from a transform, so the
    /// bound starts out current.
    pub const fn frustum(frustum: Frustum) -> Self {
        Self {
            group_id: 0,
            flags: BoundFlags::ENABLED,
            original: BoundVolume::Frustum(frustum),
            current: BoundVolume::Frustum(frustum),
            state: BoundState::Current,
        }
    }

    /// Builder pattern: Set group id
    pub const fn with_group_id(mut self, group_id: u32) -> Self {
        self.group_id = group_id;
        self
    }

    /// Builder pattern: Set flags
    pub const fn with_flags(mut self, flags: BoundFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Kind of volume, fixed at construction
    pub const fn bound_type(&self) -> BoundType {
        self.original.bound_type()
    }

    /// Query group this bound belongs to
    pub const fn group_id(&self) -> u32 {
        self.group_id
    }

    /// Set query group
    pub fn set_group_id(&mut self, group_id: u32) {
        self.group_id = group_id;
    }

    /// All flags
    pub const fn flags(&self) -> BoundFlags {
        self.flags
    }

    /// Whether the owner is expected to move
    pub const fn is_movable(&self) -> bool {
        self.flags.contains(BoundFlags::MOVABLE)
    }

    /// Set the movable flag
    pub fn set_movable(&mut self, movable: bool) {
        self.flags.set(BoundFlags::MOVABLE, movable);
    }

    /// Whether this bound actively looks for collisions
    pub const fn is_collision_source(&self) -> bool {
        self.flags.contains(BoundFlags::COLLISION_SOURCE)
    }

    /// Set the collision-source flag
    pub fn set_collision_source(&mut self, source: bool) {
        self.flags.set(BoundFlags::COLLISION_SOURCE, source);
    }

    /// Whether this bound takes part in queries
    pub const fn is_enabled(&self) -> bool {
        self.flags.contains(BoundFlags::ENABLED)
    }

    /// Enable or disable the bound
    pub fn set_enabled(&mut self, enabled: bool) {
        self.flags.set(BoundFlags::ENABLED, enabled);
    }

    /// Local-space volume
    pub const fn original(&self) -> &BoundVolume {
        &self.original
    }

    /// World-space volume as of the last update
    pub const fn current(&self) -> &BoundVolume {
        &self.current
    }

    /// Stale or current
    pub const fn state(&self) -> BoundState {
        self.state
    }

    /// Whether the world volume matches the last transform seen
    pub fn is_current(&self) -> bool {
        self.state == BoundState::Current
    }

    /// Replace the local-space volume; the kind may not change
    pub fn set_original(&mut self, original: BoundVolume) -> CoreResult<()> {
        self.expect_type(original.bound_type())?;
        self.original = original;
        if let BoundVolume::Frustum(_) = original {
            self.current = original;
        } else {
            self.state = BoundState::Stale;
        }
        Ok(())
    }

    /// Replace one plane of a frustum bound
    pub fn set_frustum_face(&mut self, face: FrustumFace, plane: Plane) -> CoreResult<()> {
        let BoundVolume::Frustum(frustum) = &mut self.original else {
            return Err(self.mismatch(BoundType::Frustum));
        };
        frustum.set_face(face, plane);
        self.current = self.original;
        Ok(())
    }

    /// Replace all six planes of a frustum bound
    pub fn set_frustum_faces(&mut self, planes: [Plane; 6]) -> CoreResult<()> {
        self.set_original(BoundVolume::Frustum(Frustum::new(planes)))
    }

    /// Recompute the world-space volume from the owner's world matrix.
    ///
    /// Always a full recompute from the original volume. Frustum bounds
    /// are left alone.
    pub fn update(&mut self, world: &Mat4) {
        if self.bound_type() == BoundType::Frustum {
            return;
        }
        self.current = self.original.transformed(world);
        self.state = BoundState::Current;
    }

    /// Mark the world volume stale without recomputing it
    pub fn invalidate(&mut self) {
        if self.bound_type() != BoundType::Frustum {
            self.state = BoundState::Stale;
        }
    }

    /// Position-changed handler
    pub fn on_position_changed(&mut self, event: &TransformChanged<Vec3>) {
        self.update(&event.world);
    }

    /// Orientation-changed handler
    pub fn on_orientation_changed(&mut self, event: &TransformChanged<Quat>) {
        self.update(&event.world);
    }

    /// Scaling-changed handler
    pub fn on_scaling_changed(&mut self, event: &TransformChanged<Vec3>) {
        self.update(&event.world);
    }

    /// World-changed handler, for moves inherited from an ancestor
    pub fn on_world_changed(&mut self, event: &TransformChanged<Mat4>) {
        self.update(&event.world);
    }

    /// Overlap with a world-space sphere
    pub fn test_sphere(&self, sphere: &Sphere) -> bool {
        self.current.test_sphere(sphere)
    }

    /// Overlap with a world-space axis-aligned box
    pub fn test_aabb(&self, aabb: &Aabb) -> bool {
        self.current.test_aabb(aabb)
    }

    /// Overlap with a world-space oriented box
    pub fn test_obb(&self, obb: &Obb) -> bool {
        self.current.test_obb(obb)
    }

    /// Overlap with a world-space frustum
    pub fn test_frustum(&self, frustum: &Frustum) -> bool {
        self.current.test_frustum(frustum)
    }

    /// Overlap with another bound, dispatched on its kind
    pub fn test(&self, other: &Self) -> bool {
        self.current.test(&other.current)
    }

    /// Debug visualization; bounds draw nothing themselves
    pub fn renderable(&self) -> Option<&dyn Renderable> {
        None
    }

    /// Copy flags, group and both volumes from a bound of the same kind
    pub fn clone_properties(&mut self, src: &Self) -> CoreResult<()> {
        self.expect_type(src.bound_type())?;
        self.group_id = src.group_id;
        self.flags = src.flags;
        self.original = src.original;
        self.current = src.current;
        self.state = src.state;
        Ok(())
    }

    fn expect_type(&self, found: BoundType) -> CoreResult<()> {
        if found == self.bound_type() {
            Ok(())
        } else {
            Err(self.mismatch(found))
        }
    }

    const fn mismatch(&self, found: BoundType) -> CoreError {
        CoreError::TypeMismatch {
            expected: self.bound_type(),
            found,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{constants::HALF_PI, Transform};
    use approx::assert_relative_eq;

    fn cube() -> Aabb {
        Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn test_new_bound_is_stale_copy_of_original() {
        let bound = Bound::aabb(cube());

        assert_eq!(bound.bound_type(), BoundType::Aabb);
        assert_eq!(bound.state(), BoundState::Stale);
        assert_eq!(bound.current(), bound.original());
        assert!(bound.is_enabled());
        assert!(!bound.is_movable());
        assert!(bound.renderable().is_none());
    }

    #[test]
    fn test_update_keeps_original() {
        let mut bound = Bound::sphere(Sphere::new(Vec3::new(1.0, 0.0, 0.0), 1.0));
        bound.update(&Mat4::new_translation(&Vec3::new(0.0, 5.0, 0.0)));
        bound.update(&Mat4::new_translation(&Vec3::new(0.0, 5.0, 0.0)));

        assert!(bound.is_current());
        assert_eq!(*bound.original(), BoundVolume::Sphere(Sphere::new(Vec3::new(1.0, 0.0, 0.0), 1.0)));
        let BoundVolume::Sphere(world) = bound.current() else {
            panic!("sphere bound changed kind");
        };
        assert_relative_eq!(world.center, Vec3::new(1.0, 5.0, 0.0));
    }

    #[test]
    fn test_aabb_bound_under_quarter_turn() {
        let mut bound = Bound::aabb(cube());
        let world = Transform::new(Vec3::zeros(), Quat::from_axis_angle(&Vec3::y_axis(), HALF_PI), Vec3::new(1.0, 1.0, 1.0))
            .to_matrix();
        bound.update(&world);

        let BoundVolume::Aabb(aabb) = bound.current() else {
            panic!("aabb bound changed kind");
        };
        assert_relative_eq!(aabb.min, Vec3::new(-1.0, -1.0, -1.0), epsilon = 1e-5);
        assert_relative_eq!(aabb.max, Vec3::new(1.0, 1.0, 1.0), epsilon = 1e-5);
    }

    #[test]
    fn test_invalidate_marks_stale_until_next_update() {
        let mut bound = Bound::sphere(Sphere::new(Vec3::zeros(), 1.0));
        bound.update(&Mat4::identity());
        bound.invalidate();
        assert_eq!(bound.state(), BoundState::Stale);

        bound.update(&Mat4::identity());
        assert!(bound.is_current());

        let mut frustum = Bound::frustum(Frustum::default());
        frustum.invalidate();
        assert!(frustum.is_current());
    }

    #[test]
    fn test_frustum_update_is_noop() {
        let frustum = Frustum::default();
        let mut bound = Bound::frustum(frustum);
        bound.update(&Mat4::new_translation(&Vec3::new(100.0, 0.0, 0.0)));

        assert!(bound.is_current());
        assert_eq!(*bound.current(), BoundVolume::Frustum(frustum));
    }

    #[test]
    fn test_set_frustum_face() {
        let mut bound = Bound::frustum(Frustum::default());
        let plane = Plane::from_point_normal(Vec3::new(0.0, 0.0, 0.25), -Vec3::z());
        bound.set_frustum_face(FrustumFace::Far, plane).unwrap();

        assert!(!bound.test_sphere(&Sphere::new(Vec3::new(0.0, 0.0, 0.5), 0.1)));

        let mut aabb_bound = Bound::aabb(cube());
        assert_eq!(
            aabb_bound.set_frustum_face(FrustumFace::Far, plane),
            Err(CoreError::TypeMismatch { expected: BoundType::Aabb, found: BoundType::Frustum })
        );
    }

    #[test]
    fn test_set_original_rejects_other_kind() {
        let mut bound = Bound::aabb(cube());
        let result = bound.set_original(BoundVolume::Sphere(Sphere::new(Vec3::zeros(), 1.0)));

        assert!(matches!(result, Err(CoreError::TypeMismatch { .. })));
        assert_eq!(bound.bound_type(), BoundType::Aabb);
    }

    #[test]
    fn test_clone_properties() {
        let mut src = Bound::obb(Obb::from_aabb(&cube()))
            .with_group_id(7)
            .with_flags(BoundFlags::MOVABLE | BoundFlags::COLLISION_SOURCE);
        src.update(&Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0)));

        let mut dst = Bound::obb(Obb::from_aabb(&Aabb::new(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0))));
        dst.clone_properties(&src).unwrap();
        assert_eq!(dst, src);
        assert!(!dst.is_enabled());

        let mut sphere = Bound::sphere(Sphere::new(Vec3::zeros(), 1.0));
        assert!(sphere.clone_properties(&src).is_err());
    }

    #[test]
    fn test_flags() {
        let mut bound = Bound::sphere(Sphere::new(Vec3::zeros(), 1.0));
        bound.set_movable(true);
        bound.set_collision_source(true);
        bound.set_enabled(false);

        assert_eq!(bound.flags(), BoundFlags::MOVABLE | BoundFlags::COLLISION_SOURCE);
        bound.set_group_id(3);
        assert_eq!(bound.group_id(), 3);
    }

    #[test]
    fn test_dispatch_between_kinds() {
        let mut sphere = Bound::sphere(Sphere::new(Vec3::zeros(), 1.0));
        let mut aabb = Bound::aabb(cube());
        sphere.update(&Mat4::new_translation(&Vec3::new(1.5, 0.0, 0.0)));
        aabb.update(&Mat4::identity());

        assert!(sphere.test(&aabb));
        assert!(aabb.test(&sphere));

        sphere.update(&Mat4::new_translation(&Vec3::new(3.0, 0.0, 0.0)));
        assert!(!sphere.test(&aabb));
        assert!(!aabb.test(&sphere));
    }
}
