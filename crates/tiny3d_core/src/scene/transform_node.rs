//! Transform hierarchy
//!
//! Nodes live in a [`TransformGraph`] arena and refer to each other by
//! [`NodeId`]. Every node carries a local position/orientation/scaling and a
//! cached local-to-world matrix.
//!
//! # Dirty propagation
//!
//! Changing a node's local transform (or its parent) marks the node and its
//! whole subtree dirty. World matrices are recomputed lazily on read:
//! `world = parent_world * local`, walking up only through dirty ancestors,
//! each of which is recomputed at most once. The cache lives in `Cell`s so
//! reads only need `&TransformGraph`.
//!
//! # Notification
//!
//! Setters call back synchronously before returning: the changed node's
//! position/orientation/scaling listeners first, then the world listeners of
//! every subscribed descendant. Reparenting notifies the world listeners of
//! the moved subtree, its root included.
//!
//! Traversals borrow the graph immutably; the tree cannot be restructured
//! while it is being walked.

use std::cell::Cell;

use bitflags::bitflags;
use slotmap::SlotMap;

use super::callbacks::{
    ChangeEvent, ChangeListeners, OrientationCallback, PositionCallback, ScalingCallback,
    SubscriptionId, TransformChanged, WorldCallback,
};
use crate::error::{CoreError, CoreResult};
use crate::foundation::math::{Mat4, Mat4Ext, Quat, Quaternion, Radian, Transform, Unit, Vec3};

/// Axis or quaternion norms below this are rejected as degenerate
const MIN_NORM: f32 = 1e-6;

slotmap::new_key_type! {
    /// Handle of a node in a [`TransformGraph`]
    pub struct NodeId;
}

bitflags! {
    /// Which local components a write actually changed
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TransformChange: u8 {
        /// Position changed
        const POSITION = 0b001;
        /// Orientation changed
        const ORIENTATION = 0b010;
        /// Scaling changed
        const SCALING = 0b100;
    }
}

/// One node of the transform hierarchy
#[derive(Debug)]
pub struct TransformNode {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    local: Transform,
    world: Cell<Mat4>,
    dirty: Cell<bool>,
    world_version: Cell<u64>,
    subscriptions: Vec<SubscriptionId>,
}

impl TransformNode {
    fn new(parent: Option<NodeId>) -> Self {
        Self {
            parent,
            children: Vec::new(),
            local: Transform::identity(),
            world: Cell::new(Mat4::identity()),
            dirty: Cell::new(true),
            world_version: Cell::new(0),
            subscriptions: Vec::new(),
        }
    }

    /// Parent node, `None` for the root and detached subtrees
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in insertion order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Local position, orientation and scaling
    pub const fn local(&self) -> &Transform {
        &self.local
    }

    /// Whether the cached world matrix must be recomputed
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }
}

/// Arena of transform nodes with a permanent root
#[derive(Debug)]
pub struct TransformGraph {
    nodes: SlotMap<NodeId, TransformNode>,
    listeners: ChangeListeners,
    root: NodeId,
}

impl Default for TransformGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformGraph {
    /// Create a graph holding only the root node
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a graph with room for `capacity` nodes besides the root
    pub fn with_capacity(capacity: usize) -> Self {
        let mut nodes = SlotMap::with_capacity_and_key(capacity + 1);
        let root = nodes.insert(TransformNode::new(None));
        Self {
            nodes,
            listeners: ChangeListeners::default(),
            root,
        }
    }

    /// The root node; it is never destroyed or reparented
    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes, root included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether `id` refers to a live node
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Borrow a node
    pub fn node(&self, id: NodeId) -> CoreResult<&TransformNode> {
        self.nodes.get(id).ok_or(CoreError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> CoreResult<&mut TransformNode> {
        self.nodes.get_mut(id).ok_or(CoreError::NodeNotFound(id))
    }

    // ---------------------------------------------------------------------
    // Hierarchy
    // ---------------------------------------------------------------------

    /// Create a node under `parent`, or under the root when `None`
    pub fn create(&mut self, parent: Option<NodeId>) -> CoreResult<NodeId> {
        let parent = parent.unwrap_or(self.root);
        self.node(parent)?;

        let id = self.nodes.insert(TransformNode::new(Some(parent)));
        self.node_mut(parent)?.children.push(id);
        log::trace!("Created transform node {id:?} under {parent:?}");
        Ok(id)
    }

    /// Create a node that belongs to no tree until attached
    pub fn create_detached(&mut self) -> NodeId {
        self.nodes.insert(TransformNode::new(None))
    }

    /// Parent of a node
    pub fn parent(&self, id: NodeId) -> CoreResult<Option<NodeId>> {
        Ok(self.node(id)?.parent)
    }

    /// Children of a node in insertion order
    pub fn children(&self, id: NodeId) -> CoreResult<&[NodeId]> {
        Ok(&self.node(id)?.children)
    }

    /// All nodes below `id` in depth-first pre-order, `id` excluded
    pub fn descendants(&self, id: NodeId) -> CoreResult<Vec<NodeId>> {
        let mut result = Vec::new();
        let mut stack: Vec<NodeId> = self.node(id)?.children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            result.push(next);
            stack.extend(self.node(next)?.children.iter().rev());
        }
        Ok(result)
    }

    /// Whether `ancestor` lies strictly above `id`
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> CoreResult<bool> {
        self.node(ancestor)?;
        let mut current = self.node(id)?.parent;
        while let Some(node) = current {
            if node == ancestor {
                return Ok(true);
            }
            current = self.node(node)?.parent;
        }
        Ok(false)
    }

    /// Attach `child` under `parent`, detaching it from its previous parent.
    ///
    /// Fails with [`CoreError::CycleDetected`] if `child` is `parent` or one
    /// of its ancestors, and with [`CoreError::Duplicated`] if `child` is
    /// already a child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> CoreResult<()> {
        self.node(parent)?;
        let previous = self.node(child)?.parent;

        if child == self.root {
            return Err(CoreError::InvalidArgument("the root node cannot be reparented".into()));
        }
        if child == parent || self.is_ancestor(child, parent)? {
            return Err(CoreError::CycleDetected { parent, child });
        }
        if previous == Some(parent) {
            return Err(CoreError::Duplicated(format!("{child:?} is already a child of {parent:?}")));
        }

        if let Some(previous) = previous {
            self.on_detach_parent(child, previous)?;
        }
        self.on_attach_parent(child, parent)
    }

    /// Detach `child` from `parent`; it becomes the root of its own subtree
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> CoreResult<()> {
        self.node(parent)?;
        if self.node(child)?.parent != Some(parent) {
            return Err(CoreError::NotAChild { parent, child });
        }
        self.on_detach_parent(child, parent)?;
        self.subtree_moved(child)
    }

    fn on_attach_parent(&mut self, child: NodeId, parent: NodeId) -> CoreResult<()> {
        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);
        log::debug!("Attached {child:?} under {parent:?}");
        self.subtree_moved(child)
    }

    /// New ancestor chain: dirty the subtree and tell its world listeners
    fn subtree_moved(&mut self, id: NodeId) -> CoreResult<()> {
        self.set_dirty(id, true, true)?;
        if self.listeners.is_empty() {
            return Ok(());
        }
        let mut moved = vec![id];
        moved.extend(self.descendants(id)?);
        self.notify_world_changed(&moved)
    }

    fn on_detach_parent(&mut self, child: NodeId, parent: NodeId) -> CoreResult<()> {
        self.node_mut(parent)?.children.retain(|&id| id != child);
        self.node_mut(child)?.parent = None;
        log::debug!("Detached {child:?} from {parent:?}");
        Ok(())
    }

    /// Remove a node and its whole subtree. Returns the removed ids, the
    /// node itself first.
    pub fn destroy(&mut self, id: NodeId) -> CoreResult<Vec<NodeId>> {
        if id == self.root {
            return Err(CoreError::InvalidArgument("the root node cannot be destroyed".into()));
        }
        if let Some(parent) = self.node(id)?.parent {
            self.on_detach_parent(id, parent)?;
        }

        let mut removed = vec![id];
        removed.extend(self.descendants(id)?);
        for node_id in &removed {
            if let Some(node) = self.nodes.remove(*node_id) {
                for subscription in node.subscriptions {
                    self.listeners.remove(subscription);
                }
            }
        }
        log::debug!("Destroyed {} transform node(s) rooted at {id:?}", removed.len());
        Ok(removed)
    }

    /// Remove a single node, handing its children to its parent (or leaving
    /// them detached if it had none). Children keep their local transforms.
    pub fn destroy_reparenting(&mut self, id: NodeId) -> CoreResult<()> {
        if id == self.root {
            return Err(CoreError::InvalidArgument("the root node cannot be destroyed".into()));
        }
        let parent = self.node(id)?.parent;
        let children = self.node(id)?.children.clone();
        for child in children {
            self.on_detach_parent(child, id)?;
            match parent {
                Some(parent) => self.on_attach_parent(child, parent)?,
                None => self.subtree_moved(child)?,
            }
        }
        self.destroy(id).map(|_| ())
    }

    // ---------------------------------------------------------------------
    // Local transform
    // ---------------------------------------------------------------------

    /// Local position
    pub fn position(&self, id: NodeId) -> CoreResult<Vec3> {
        Ok(self.node(id)?.local.position)
    }

    /// Local orientation
    pub fn orientation(&self, id: NodeId) -> CoreResult<Quat> {
        Ok(self.node(id)?.local.rotation)
    }

    /// Local scaling
    pub fn scaling(&self, id: NodeId) -> CoreResult<Vec3> {
        Ok(self.node(id)?.local.scale)
    }

    /// Local transform, recomposed from its three components
    pub fn local_transform(&self, id: NodeId) -> CoreResult<Transform> {
        Ok(self.node(id)?.local)
    }

    /// Local transform as a matrix
    pub fn local_matrix(&self, id: NodeId) -> CoreResult<Mat4> {
        Ok(self.node(id)?.local.to_matrix())
    }

    /// Replace position
    pub fn set_position(&mut self, id: NodeId, position: Vec3) -> CoreResult<()> {
        let mut local = self.local_transform(id)?;
        local.position = position;
        self.set_local_transform(id, local).map(|_| ())
    }

    /// Replace position from components
    pub fn set_position_xyz(&mut self, id: NodeId, x: f32, y: f32, z: f32) -> CoreResult<()> {
        self.set_position(id, Vec3::new(x, y, z))
    }

    /// Replace orientation
    pub fn set_orientation(&mut self, id: NodeId, orientation: Quat) -> CoreResult<()> {
        let mut local = self.local_transform(id)?;
        local.rotation = orientation;
        self.set_local_transform(id, local).map(|_| ())
    }

    /// Replace orientation from raw quaternion components, normalizing them
    pub fn set_orientation_wxyz(&mut self, id: NodeId, w: f32, x: f32, y: f32, z: f32) -> CoreResult<()> {
        let orientation = Unit::try_new(Quaternion::new(w, x, y, z), MIN_NORM)
            .ok_or_else(|| CoreError::InvalidArgument("zero-length quaternion".into()))?;
        self.set_orientation(id, orientation)
    }

    /// Replace orientation with a rotation of `angle` about `axis`
    pub fn set_orientation_axis_angle(
        &mut self,
        id: NodeId,
        axis: Vec3,
        angle: impl Into<Radian>,
    ) -> CoreResult<()> {
        let orientation = axis_angle(axis, angle.into())?;
        self.set_orientation(id, orientation)
    }

    /// Replace scaling
    pub fn set_scaling(&mut self, id: NodeId, scaling: Vec3) -> CoreResult<()> {
        let mut local = self.local_transform(id)?;
        local.scale = scaling;
        self.set_local_transform(id, local).map(|_| ())
    }

    /// Replace scaling from components
    pub fn set_scaling_xyz(&mut self, id: NodeId, x: f32, y: f32, z: f32) -> CoreResult<()> {
        self.set_scaling(id, Vec3::new(x, y, z))
    }

    /// Move by `offset` in parent space
    pub fn translate(&mut self, id: NodeId, offset: Vec3) -> CoreResult<()> {
        let position = self.position(id)? + offset;
        self.set_position(id, position)
    }

    /// Move by an offset given as components
    pub fn translate_xyz(&mut self, id: NodeId, x: f32, y: f32, z: f32) -> CoreResult<()> {
        self.translate(id, Vec3::new(x, y, z))
    }

    /// Move `step` units along `direction`; the direction is normalized first
    pub fn translate_along(&mut self, id: NodeId, direction: Vec3, step: f32) -> CoreResult<()> {
        let direction = direction
            .try_normalize(MIN_NORM)
            .ok_or_else(|| CoreError::InvalidArgument("zero-length translation direction".into()))?;
        self.translate(id, direction * step)
    }

    /// Apply `delta` about the parent-space axes: `new = delta * old`
    pub fn rotate(&mut self, id: NodeId, delta: Quat) -> CoreResult<()> {
        let orientation = delta * self.orientation(id)?;
        self.set_orientation(id, orientation)
    }

    /// Rotate by `angle` about a parent-space `axis`
    pub fn rotate_axis_angle(&mut self, id: NodeId, axis: Vec3, angle: impl Into<Radian>) -> CoreResult<()> {
        let delta = axis_angle(axis, angle.into())?;
        self.rotate(id, delta)
    }

    /// Rotate about the node's own X axis
    pub fn pitch(&mut self, id: NodeId, angle: impl Into<Radian>) -> CoreResult<()> {
        self.rotate_local(id, Vec3::x(), angle.into())
    }

    /// Rotate about the node's own Y axis
    pub fn yaw(&mut self, id: NodeId, angle: impl Into<Radian>) -> CoreResult<()> {
        self.rotate_local(id, Vec3::y(), angle.into())
    }

    /// Rotate about the node's own Z axis
    pub fn roll(&mut self, id: NodeId, angle: impl Into<Radian>) -> CoreResult<()> {
        self.rotate_local(id, Vec3::z(), angle.into())
    }

    fn rotate_local(&mut self, id: NodeId, axis: Vec3, angle: Radian) -> CoreResult<()> {
        let orientation = self.orientation(id)? * axis_angle(axis, angle)?;
        self.set_orientation(id, orientation)
    }

    /// Multiply scaling componentwise by `factor`
    pub fn scale(&mut self, id: NodeId, factor: Vec3) -> CoreResult<()> {
        let scaling = self.scaling(id)?.component_mul(&factor);
        self.set_scaling(id, scaling)
    }

    /// Multiply scaling componentwise by the given factors
    pub fn scale_xyz(&mut self, id: NodeId, x: f32, y: f32, z: f32) -> CoreResult<()> {
        self.scale(id, Vec3::new(x, y, z))
    }

    /// Override the local transform with a matrix.
    ///
    /// The matrix is decomposed right away so the position, orientation and
    /// scaling getters stay consistent; shear is dropped.
    pub fn set_local_matrix(&mut self, id: NodeId, matrix: &Mat4) -> CoreResult<TransformChange> {
        self.set_local_transform(id, Transform::from_matrix(matrix))
    }

    /// Replace all three local components at once.
    ///
    /// Components equal to the current value are left alone and do not fire
    /// callbacks. Returns what changed.
    pub fn set_local_transform(&mut self, id: NodeId, local: Transform) -> CoreResult<TransformChange> {
        let node = self.node_mut(id)?;
        let old = node.local;

        let mut changed = TransformChange::empty();
        changed.set(TransformChange::POSITION, old.position != local.position);
        changed.set(TransformChange::ORIENTATION, !same_rotation(&old.rotation, &local.rotation));
        changed.set(TransformChange::SCALING, old.scale != local.scale);
        if changed.is_empty() {
            return Ok(changed);
        }

        node.local = local;
        self.set_dirty(id, true, true)?;
        self.notify(id, &old, &local, changed)?;
        if !self.listeners.is_empty() {
            let descendants = self.descendants(id)?;
            self.notify_world_changed(&descendants)?;
        }
        Ok(changed)
    }

    fn notify(&mut self, id: NodeId, old: &Transform, new: &Transform, changed: TransformChange) -> CoreResult<()> {
        if self.node(id)?.subscriptions.is_empty() {
            return Ok(());
        }

        let world = self.world_transform(id)?;
        let world_version = self.node(id)?.world_version.get();
        let mut events = Vec::with_capacity(3);
        if changed.contains(TransformChange::POSITION) {
            events.push(ChangeEvent::Position(TransformChanged {
                node: id,
                old: old.position,
                new: new.position,
                world,
                world_version,
            }));
        }
        if changed.contains(TransformChange::ORIENTATION) {
            events.push(ChangeEvent::Orientation(TransformChanged {
                node: id,
                old: old.rotation,
                new: new.rotation,
                world,
                world_version,
            }));
        }
        if changed.contains(TransformChange::SCALING) {
            events.push(ChangeEvent::Scaling(TransformChanged {
                node: id,
                old: old.scale,
                new: new.scale,
                world,
                world_version,
            }));
        }

        let node = self.nodes.get(id).ok_or(CoreError::NodeNotFound(id))?;
        for event in &events {
            let invoked = self.listeners.dispatch(&node.subscriptions, event);
            log::trace!("Node {id:?}: {event:?} delivered to {invoked} listener(s)");
        }
        Ok(())
    }

    /// Deliver world-changed events to the subscribed nodes among `nodes`
    fn notify_world_changed(&mut self, nodes: &[NodeId]) -> CoreResult<()> {
        for &id in nodes {
            let node = self.node(id)?;
            if node.subscriptions.is_empty() {
                continue;
            }
            let old = node.world.get();
            let world = self.world_transform(id)?;

            let node = self.nodes.get(id).ok_or(CoreError::NodeNotFound(id))?;
            let event = ChangeEvent::World(TransformChanged {
                node: id,
                old,
                new: world,
                world,
                world_version: node.world_version.get(),
            });
            let invoked = self.listeners.dispatch(&node.subscriptions, &event);
            log::trace!("Node {id:?}: world change delivered to {invoked} listener(s)");
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // World transform
    // ---------------------------------------------------------------------

    /// Local-to-world matrix, recomputed first if the node is dirty.
    ///
    /// Walks up to the first clean ancestor, then recomputes the dirty chain
    /// top-down, so depth is bounded by memory rather than the call stack.
    pub fn world_transform(&self, id: NodeId) -> CoreResult<Mat4> {
        let node = self.node(id)?;
        if !node.dirty.get() {
            return Ok(node.world.get());
        }

        let mut chain = vec![node];
        let mut world = Mat4::identity();
        let mut next = node.parent;
        while let Some(parent_id) = next {
            let parent = self.node(parent_id)?;
            if !parent.dirty.get() {
                world = parent.world.get();
                break;
            }
            chain.push(parent);
            next = parent.parent;
        }

        for node in chain.iter().rev() {
            world *= node.local.to_matrix();
            node.world.set(world);
            node.dirty.set(false);
            node.world_version.set(node.world_version.get().wrapping_add(1));
        }
        Ok(world)
    }

    /// Translation of the world matrix
    pub fn world_translation(&self, id: NodeId) -> CoreResult<Vec3> {
        Ok(self.world_transform(id)?.translation_part())
    }

    /// Version of the (recomputed if needed) world matrix; changes whenever
    /// the matrix is recomputed
    pub fn world_version(&self, id: NodeId) -> CoreResult<u64> {
        self.world_transform(id)?;
        Ok(self.node(id)?.world_version.get())
    }

    /// Per-frame hook: make sure the world matrix is current
    pub fn update(&self, id: NodeId) -> CoreResult<Mat4> {
        self.world_transform(id)
    }

    /// Bring every node's world matrix up to date
    pub fn update_all(&self) -> CoreResult<()> {
        for id in self.nodes.keys() {
            self.world_transform(id)?;
        }
        Ok(())
    }

    /// Force or clear the dirty flag, optionally for the whole subtree.
    ///
    /// Clearing it keeps whatever matrix is cached, stale or not.
    pub fn set_dirty(&mut self, id: NodeId, dirty: bool, recursive: bool) -> CoreResult<()> {
        self.node(id)?.dirty.set(dirty);
        if recursive {
            for descendant in self.descendants(id)? {
                self.node(descendant)?.dirty.set(dirty);
            }
        }
        Ok(())
    }

    /// Whether the node's cached world matrix is stale
    pub fn is_dirty(&self, id: NodeId) -> CoreResult<bool> {
        Ok(self.node(id)?.dirty.get())
    }

    // ---------------------------------------------------------------------
    // Callbacks
    // ---------------------------------------------------------------------

    /// Register a position-changed callback
    pub fn add_position_changed_callback(
        &mut self,
        id: NodeId,
        callback: impl FnMut(&TransformChanged<Vec3>) + 'static,
    ) -> CoreResult<SubscriptionId> {
        self.node(id)?;
        let boxed: PositionCallback = Box::new(callback);
        let subscription = self.listeners.add_position(id, boxed);
        self.node_mut(id)?.subscriptions.push(subscription);
        Ok(subscription)
    }

    /// Register an orientation-changed callback
    pub fn add_orientation_changed_callback(
        &mut self,
        id: NodeId,
        callback: impl FnMut(&TransformChanged<Quat>) + 'static,
    ) -> CoreResult<SubscriptionId> {
        self.node(id)?;
        let boxed: OrientationCallback = Box::new(callback);
        let subscription = self.listeners.add_orientation(id, boxed);
        self.node_mut(id)?.subscriptions.push(subscription);
        Ok(subscription)
    }

    /// Register a scaling-changed callback
    pub fn add_scaling_changed_callback(
        &mut self,
        id: NodeId,
        callback: impl FnMut(&TransformChanged<Vec3>) + 'static,
    ) -> CoreResult<SubscriptionId> {
        self.node(id)?;
        let boxed: ScalingCallback = Box::new(callback);
        let subscription = self.listeners.add_scaling(id, boxed);
        self.node_mut(id)?.subscriptions.push(subscription);
        Ok(subscription)
    }

    /// Register a callback for world matrix changes caused by ancestors or
    /// reparenting
    pub fn add_world_changed_callback(
        &mut self,
        id: NodeId,
        callback: impl FnMut(&TransformChanged<Mat4>) + 'static,
    ) -> CoreResult<SubscriptionId> {
        self.node(id)?;
        let boxed: WorldCallback = Box::new(callback);
        let subscription = self.listeners.add_world(id, boxed);
        self.node_mut(id)?.subscriptions.push(subscription);
        Ok(subscription)
    }

    /// Unregister a callback of any kind
    pub fn remove_callback(&mut self, id: NodeId, subscription: SubscriptionId) -> CoreResult<()> {
        if self.listeners.owner(subscription) != Some(id) {
            self.node(id)?;
            return Err(CoreError::SubscriptionNotFound { node: id, subscription });
        }
        self.listeners.remove(subscription);
        self.node_mut(id)?.subscriptions.retain(|&s| s != subscription);
        Ok(())
    }

    /// Number of callbacks registered on a node
    pub fn subscription_count(&self, id: NodeId) -> CoreResult<usize> {
        Ok(self.node(id)?.subscriptions.len())
    }
}

/// `q` and `-q` encode the same rotation
fn same_rotation(a: &Quat, b: &Quat) -> bool {
    a == b || a.coords == -b.coords
}

fn axis_angle(axis: Vec3, angle: Radian) -> CoreResult<Quat> {
    let axis = Unit::try_new(axis, MIN_NORM)
        .ok_or_else(|| CoreError::InvalidArgument("zero-length rotation axis".into()))?;
    Ok(Quat::from_axis_angle(&axis, angle.value()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{constants::HALF_PI, Degree};
    use approx::assert_relative_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// root -> a -> b -> c
    fn chain(graph: &mut TransformGraph) -> (NodeId, NodeId, NodeId) {
        let a = graph.create(None).unwrap();
        let b = graph.create(Some(a)).unwrap();
        let c = graph.create(Some(b)).unwrap();
        (a, b, c)
    }

    #[test]
    fn test_new_node_is_identity() {
        let mut graph = TransformGraph::new();
        let node = graph.create(None).unwrap();

        assert_eq!(graph.position(node).unwrap(), Vec3::zeros());
        assert_eq!(graph.scaling(node).unwrap(), Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(graph.orientation(node).unwrap(), Quat::identity());
        assert_eq!(graph.parent(node).unwrap(), Some(graph.root()));
        assert_eq!(graph.world_transform(node).unwrap(), Mat4::identity());
    }

    #[test]
    fn test_translate_parent_moves_child() {
        let mut graph = TransformGraph::new();
        let parent = graph.create(None).unwrap();
        let child = graph.create(Some(parent)).unwrap();
        graph.set_position(child, Vec3::new(1.0, 0.0, 0.0)).unwrap();

        graph.translate(parent, Vec3::new(2.0, 0.0, 0.0)).unwrap();
        assert_relative_eq!(graph.world_translation(child).unwrap(), Vec3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn test_root_translation_propagates_down_chain() {
        let mut graph = TransformGraph::new();
        let root = graph.root();
        let (_, _, c) = chain(&mut graph);
        let before = graph.world_translation(c).unwrap();

        graph.translate_xyz(root, 1.5, -2.0, 0.25).unwrap();
        assert_relative_eq!(graph.world_translation(c).unwrap() - before, Vec3::new(1.5, -2.0, 0.25));
    }

    #[test]
    fn test_repeated_reads_are_identical() {
        let mut graph = TransformGraph::new();
        let (a, _, c) = chain(&mut graph);
        graph.set_orientation_axis_angle(a, Vec3::new(1.0, 2.0, 3.0), Radian(0.3)).unwrap();
        graph.set_scaling_xyz(c, 2.0, 0.5, 1.0).unwrap();

        let first = graph.world_transform(c).unwrap();
        let version = graph.world_version(c).unwrap();
        let second = graph.world_transform(c).unwrap();

        assert_eq!(first, second);
        assert_eq!(graph.world_version(c).unwrap(), version);
        assert!(!graph.is_dirty(c).unwrap());
    }

    #[test]
    fn test_world_matches_direct_recomposition() {
        let mut graph = TransformGraph::new();
        let (a, b, c) = chain(&mut graph);
        graph.set_position_xyz(a, 1.0, 2.0, 3.0).unwrap();
        graph.yaw(a, Degree(30.0)).unwrap();
        graph.set_scaling_xyz(b, 2.0, 2.0, 2.0).unwrap();
        graph.set_position_xyz(c, 0.0, 1.0, 0.0).unwrap();
        // Read once so caches are warm, then change a middle node
        graph.world_transform(c).unwrap();
        graph.pitch(b, Radian(0.5)).unwrap();

        let expected = graph.local_matrix(a).unwrap() * graph.local_matrix(b).unwrap() * graph.local_matrix(c).unwrap();
        assert_relative_eq!(graph.world_transform(c).unwrap(), expected, epsilon = 1e-5);
    }

    #[test]
    fn test_rotate_composes_on_the_left() {
        let mut graph = TransformGraph::new();
        let node = graph.create(None).unwrap();
        let first = Quat::from_axis_angle(&Vec3::x_axis(), 0.4);
        let delta = Quat::from_axis_angle(&Vec3::y_axis(), 0.9);
        graph.set_orientation(node, first).unwrap();

        graph.rotate(node, delta).unwrap();
        assert_relative_eq!(graph.orientation(node).unwrap(), delta * first, epsilon = 1e-6);

        // Local-axis rotation composes on the right
        graph.set_orientation(node, first).unwrap();
        graph.roll(node, Radian(0.9)).unwrap();
        let expected = first * Quat::from_axis_angle(&Vec3::z_axis(), 0.9);
        assert_relative_eq!(graph.orientation(node).unwrap(), expected, epsilon = 1e-6);
    }

    #[test]
    fn test_degrees_and_radians_agree() {
        let mut graph = TransformGraph::new();
        let a = graph.create(None).unwrap();
        let b = graph.create(None).unwrap();
        graph.set_orientation_axis_angle(a, Vec3::y(), Degree(90.0)).unwrap();
        graph.set_orientation_axis_angle(b, Vec3::y(), Radian(HALF_PI)).unwrap();

        assert_relative_eq!(graph.orientation(a).unwrap(), graph.orientation(b).unwrap(), epsilon = 1e-6);
    }

    #[test]
    fn test_degenerate_inputs_are_rejected() {
        let mut graph = TransformGraph::new();
        let node = graph.create(None).unwrap();

        assert!(matches!(
            graph.rotate_axis_angle(node, Vec3::zeros(), Radian(1.0)),
            Err(CoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            graph.translate_along(node, Vec3::zeros(), 1.0),
            Err(CoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            graph.set_orientation_wxyz(node, 0.0, 0.0, 0.0, 0.0),
            Err(CoreError::InvalidArgument(_))
        ));
        assert_eq!(graph.orientation(node).unwrap(), Quat::identity());
    }

    #[test]
    fn test_translate_along_normalizes_direction() {
        let mut graph = TransformGraph::new();
        let node = graph.create(None).unwrap();
        graph.translate_along(node, Vec3::new(0.0, 10.0, 0.0), 2.0).unwrap();

        assert_relative_eq!(graph.position(node).unwrap(), Vec3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn test_scale_multiplies() {
        let mut graph = TransformGraph::new();
        let node = graph.create(None).unwrap();
        graph.set_scaling_xyz(node, 2.0, 3.0, 4.0).unwrap();
        graph.scale_xyz(node, 0.5, 2.0, 1.0).unwrap();

        assert_eq!(graph.scaling(node).unwrap(), Vec3::new(1.0, 6.0, 4.0));
    }

    #[test]
    fn test_set_local_matrix_decomposes() {
        let mut graph = TransformGraph::new();
        let node = graph.create(None).unwrap();
        let source = Transform::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_axis_angle(&Vec3::z_axis(), 0.5),
            Vec3::new(2.0, 2.0, 2.0),
        );

        let changed = graph.set_local_matrix(node, &source.to_matrix()).unwrap();
        assert_eq!(changed, TransformChange::all());
        assert_relative_eq!(graph.position(node).unwrap(), source.position, epsilon = 1e-5);
        assert_relative_eq!(graph.scaling(node).unwrap(), source.scale, epsilon = 1e-5);
        assert_relative_eq!(graph.world_transform(node).unwrap(), source.to_matrix(), epsilon = 1e-5);
    }

    #[test]
    fn test_callbacks_fire_only_on_change() {
        let mut graph = TransformGraph::new();
        let node = graph.create(None).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let log = Rc::clone(&seen);
        graph
            .add_position_changed_callback(node, move |event| log.borrow_mut().push((event.old, event.new)))
            .unwrap();

        graph.set_position_xyz(node, 1.0, 0.0, 0.0).unwrap();
        graph.set_position_xyz(node, 1.0, 0.0, 0.0).unwrap();
        graph.set_scaling_xyz(node, 2.0, 2.0, 2.0).unwrap();

        assert_eq!(*seen.borrow(), vec![(Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0))]);
    }

    #[test]
    fn test_callback_sees_fresh_world() {
        let mut graph = TransformGraph::new();
        let parent = graph.create(None).unwrap();
        let child = graph.create(Some(parent)).unwrap();
        graph.set_position_xyz(parent, 0.0, 5.0, 0.0).unwrap();

        let world = Rc::new(Cell::new(Vec3::zeros()));
        let sink = Rc::clone(&world);
        graph
            .add_scaling_changed_callback(child, move |event| sink.set(event.world.transform_position(&Vec3::x())))
            .unwrap();

        graph.set_scaling_xyz(child, 3.0, 1.0, 1.0).unwrap();
        assert_relative_eq!(world.get(), Vec3::new(3.0, 5.0, 0.0));
    }

    #[test]
    fn test_multiple_observers_and_removal() {
        let mut graph = TransformGraph::new();
        let node = graph.create(None).unwrap();
        let count = Rc::new(Cell::new(0));

        let first = Rc::clone(&count);
        let a = graph.add_orientation_changed_callback(node, move |_| first.set(first.get() + 1)).unwrap();
        let second = Rc::clone(&count);
        graph.add_orientation_changed_callback(node, move |_| second.set(second.get() + 10)).unwrap();

        graph.yaw(node, Radian(0.1)).unwrap();
        assert_eq!(count.get(), 11);

        graph.remove_callback(node, a).unwrap();
        graph.yaw(node, Radian(0.1)).unwrap();
        assert_eq!(count.get(), 21);

        assert!(matches!(
            graph.remove_callback(node, a),
            Err(CoreError::SubscriptionNotFound { .. })
        ));
        assert_eq!(graph.subscription_count(node).unwrap(), 1);
    }

    #[test]
    fn test_add_child_rejects_cycles() {
        let mut graph = TransformGraph::new();
        let (a, _, c) = chain(&mut graph);

        assert_eq!(graph.add_child(c, a), Err(CoreError::CycleDetected { parent: c, child: a }));
        assert_eq!(graph.add_child(a, a), Err(CoreError::CycleDetected { parent: a, child: a }));
        assert!(matches!(graph.add_child(a, graph.root()), Err(CoreError::InvalidArgument(_))));
        assert_eq!(graph.parent(a).unwrap(), Some(graph.root()));
    }

    #[test]
    fn test_add_child_twice_is_duplicated() {
        let mut graph = TransformGraph::new();
        let (a, b, _) = chain(&mut graph);

        assert!(matches!(graph.add_child(a, b), Err(CoreError::Duplicated(_))));
        assert_eq!(graph.children(a).unwrap(), &[b]);
    }

    #[test]
    fn test_reparent_keeps_links_consistent_and_dirties_subtree() {
        let mut graph = TransformGraph::new();
        let (a, b, c) = chain(&mut graph);
        let other = graph.create(None).unwrap();
        graph.set_position_xyz(a, 10.0, 0.0, 0.0).unwrap();
        graph.set_position_xyz(other, 0.0, 0.0, -4.0).unwrap();
        assert_relative_eq!(graph.world_translation(c).unwrap(), Vec3::new(10.0, 0.0, 0.0));

        graph.add_child(other, b).unwrap();

        assert!(graph.is_dirty(b).unwrap());
        assert!(graph.is_dirty(c).unwrap());
        assert!(graph.children(a).unwrap().is_empty());
        assert_eq!(graph.children(other).unwrap(), &[b]);
        assert_eq!(graph.parent(b).unwrap(), Some(other));
        assert_relative_eq!(graph.world_translation(c).unwrap(), Vec3::new(0.0, 0.0, -4.0));
    }

    #[test]
    fn test_detach_and_reattach() {
        let mut graph = TransformGraph::new();
        let (a, b, c) = chain(&mut graph);
        graph.set_position_xyz(a, 1.0, 1.0, 1.0).unwrap();
        graph.set_position_xyz(c, 0.0, 2.0, 0.0).unwrap();
        assert_relative_eq!(graph.world_translation(c).unwrap(), Vec3::new(1.0, 3.0, 1.0));

        graph.remove_child(a, b).unwrap();
        assert_eq!(graph.parent(b).unwrap(), None);
        assert_relative_eq!(graph.world_translation(c).unwrap(), Vec3::new(0.0, 2.0, 0.0));

        let target = graph.create(None).unwrap();
        graph.set_position_xyz(target, -5.0, 0.0, 0.0).unwrap();
        graph.add_child(target, b).unwrap();
        assert_relative_eq!(graph.world_translation(c).unwrap(), Vec3::new(-5.0, 2.0, 0.0));

        assert_eq!(graph.remove_child(a, b), Err(CoreError::NotAChild { parent: a, child: b }));
    }

    #[test]
    fn test_destroy_removes_subtree_and_callbacks() {
        let mut graph = TransformGraph::new();
        let (a, b, c) = chain(&mut graph);
        let subscription = graph.add_position_changed_callback(c, |_| {}).unwrap();

        let removed = graph.destroy(b).unwrap();
        assert_eq!(removed, vec![b, c]);
        assert!(!graph.contains(c));
        assert!(graph.children(a).unwrap().is_empty());
        assert_eq!(graph.remove_callback(c, subscription), Err(CoreError::NodeNotFound(c)));
        assert!(matches!(graph.destroy(graph.root()), Err(CoreError::InvalidArgument(_))));
    }

    #[test]
    fn test_destroy_reparenting_moves_children_up() {
        let mut graph = TransformGraph::new();
        let (a, b, c) = chain(&mut graph);
        graph.set_position_xyz(b, 7.0, 0.0, 0.0).unwrap();

        graph.destroy_reparenting(b).unwrap();
        assert!(!graph.contains(b));
        assert_eq!(graph.parent(c).unwrap(), Some(a));
        assert_eq!(graph.children(a).unwrap(), &[c]);
        assert_relative_eq!(graph.world_translation(c).unwrap(), Vec3::zeros());
    }

    #[test]
    fn test_descendants_preorder() {
        let mut graph = TransformGraph::new();
        let a = graph.create(None).unwrap();
        let b = graph.create(Some(a)).unwrap();
        let c = graph.create(Some(b)).unwrap();
        let d = graph.create(Some(a)).unwrap();

        assert_eq!(graph.descendants(a).unwrap(), vec![b, c, d]);
        assert!(graph.is_ancestor(a, c).unwrap());
        assert!(!graph.is_ancestor(d, c).unwrap());
    }

    #[test]
    fn test_stale_id_reports_not_found() {
        let mut graph = TransformGraph::new();
        let node = graph.create(None).unwrap();
        graph.destroy(node).unwrap();

        assert_eq!(graph.set_position_xyz(node, 1.0, 0.0, 0.0), Err(CoreError::NodeNotFound(node)));
        assert_eq!(graph.world_transform(node), Err(CoreError::NodeNotFound(node)));
    }

    #[test]
    fn test_parent_setter_notifies_descendant_world_listeners() {
        let mut graph = TransformGraph::new();
        let (a, _, c) = chain(&mut graph);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&seen);
        graph
            .add_world_changed_callback(c, move |event| {
                sink.borrow_mut().push((event.old.translation_part(), event.new.translation_part()));
            })
            .unwrap();
        // Own setters go to position/orientation/scaling listeners only
        graph.set_position_xyz(c, 0.0, 1.0, 0.0).unwrap();
        assert!(seen.borrow().is_empty());

        graph.translate_xyz(a, 10.0, 0.0, 0.0).unwrap();
        assert_eq!(seen.borrow().len(), 1);
        let (old, new) = seen.borrow()[0];
        assert_relative_eq!(old, Vec3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(new, Vec3::new(10.0, 1.0, 0.0));
        // Delivered with a freshly computed matrix
        assert!(!graph.is_dirty(c).unwrap());
    }

    #[test]
    fn test_reparent_notifies_moved_subtree() {
        let mut graph = TransformGraph::new();
        let (a, b, c) = chain(&mut graph);
        let target = graph.create(None).unwrap();
        graph.set_position_xyz(target, 0.0, -3.0, 0.0).unwrap();
        let count = Rc::new(Cell::new(0));

        for node in [b, c] {
            let counter = Rc::clone(&count);
            graph.add_world_changed_callback(node, move |_| counter.set(counter.get() + 1)).unwrap();
        }

        graph.add_child(target, b).unwrap();
        assert_eq!(count.get(), 2);

        graph.remove_child(target, b).unwrap();
        assert_eq!(count.get(), 4);

        graph.add_child(a, b).unwrap();
        graph.destroy_reparenting(a).unwrap();
        assert_eq!(count.get(), 8);
    }

    #[test]
    fn test_negated_quaternion_is_same_orientation() {
        let mut graph = TransformGraph::new();
        let node = graph.create(None).unwrap();
        let orientation = Quat::from_axis_angle(&Vec3::y_axis(), 0.8);
        graph.set_orientation(node, orientation).unwrap();

        let fired = Rc::new(Cell::new(false));
        let flag = Rc::clone(&fired);
        graph.add_orientation_changed_callback(node, move |_| flag.set(true)).unwrap();

        let negated = Unit::new_unchecked(-orientation.into_inner());
        graph.set_orientation(node, negated).unwrap();
        assert!(!fired.get());
        assert_eq!(graph.orientation(node).unwrap(), orientation);
    }

    #[test]
    fn test_deep_chain_world_transform() {
        const DEPTH: usize = 100_000;
        let mut graph = TransformGraph::new();
        let mut leaf = graph.root();
        for _ in 0..DEPTH {
            leaf = graph.create(Some(leaf)).unwrap();
            graph.set_position_xyz(leaf, 0.0, 0.0, 1.0).unwrap();
        }

        assert_relative_eq!(graph.world_translation(leaf).unwrap(), Vec3::new(0.0, 0.0, 100_000.0));
    }
}
