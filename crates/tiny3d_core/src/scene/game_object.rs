//! Game objects and the scene that owns them
//!
//! A [`GameObject`] is a name plus optional components: at most one
//! transform node in the scene's [`TransformGraph`] and at most one
//! [`Bound`]. Once started, a bound follows its transform through the
//! node's change callbacks, including world changes inherited from
//! ancestors, so it is current as soon as a setter returns.
//! [`Scene::update`] catches up anything a callback could not reach, such as
//! a bound that was borrowed while its transform moved.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

use slotmap::{SecondaryMap, SlotMap};

use super::callbacks::{SubscriptionId, TransformChanged};
use super::transform_node::{NodeId, TransformGraph};
use crate::bounds::Bound;
use crate::config::{OrphanPolicy, SceneConfig};
use crate::error::{CoreError, CoreResult};

slotmap::new_key_type! {
    /// Handle of a game object in a [`Scene`]
    pub struct GameObjectId;
}

/// Bound plus the world version it was last refreshed against
#[derive(Debug)]
struct TrackedBound {
    bound: Bound,
    seen_version: Option<u64>,
}

/// Bound component: shared with the change callbacks, which only hold a
/// weak reference
#[derive(Debug)]
struct BoundComponent {
    shared: Rc<RefCell<TrackedBound>>,
    subscriptions: Vec<SubscriptionId>,
    started: bool,
}

impl BoundComponent {
    fn new(bound: Bound) -> Self {
        Self {
            shared: Rc::new(RefCell::new(TrackedBound { bound, seen_version: None })),
            subscriptions: Vec::new(),
            started: false,
        }
    }
}

/// Named entity with optional transform and bound components
#[derive(Debug)]
pub struct GameObject {
    name: String,
    transform: Option<NodeId>,
    bound: Option<BoundComponent>,
}

impl GameObject {
    /// Object name; not required to be unique
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transform component, if any
    pub const fn transform(&self) -> Option<NodeId> {
        self.transform
    }

    /// Whether a bound is attached
    pub const fn has_bound(&self) -> bool {
        self.bound.is_some()
    }

    /// Whether the attached bound is following its transform
    pub fn is_bound_started(&self) -> bool {
        self.bound.as_ref().is_some_and(|component| component.started)
    }
}

/// Transform graph plus the game objects living in it
#[derive(Debug)]
pub struct Scene {
    config: SceneConfig,
    graph: TransformGraph,
    objects: SlotMap<GameObjectId, GameObject>,
    owners: SecondaryMap<NodeId, GameObjectId>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(SceneConfig::default())
    }
}

impl Scene {
    /// Create an empty scene
    pub fn new(config: SceneConfig) -> Self {
        Self {
            graph: TransformGraph::with_capacity(config.node_capacity),
            objects: SlotMap::with_capacity_and_key(config.object_capacity),
            owners: SecondaryMap::new(),
            config,
        }
    }

    /// Settings the scene was created with
    pub const fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// The transform hierarchy
    pub const fn graph(&self) -> &TransformGraph {
        &self.graph
    }

    /// Mutable access to the transform hierarchy, for moving objects
    pub fn graph_mut(&mut self) -> &mut TransformGraph {
        &mut self.graph
    }

    // ---------------------------------------------------------------------
    // Objects and transforms
    // ---------------------------------------------------------------------

    /// Create an object with no components
    pub fn create_game_object(&mut self, name: impl Into<String>) -> GameObjectId {
        let name = name.into();
        log::trace!("Creating game object '{name}'");
        self.objects.insert(GameObject {
            name,
            transform: None,
            bound: None,
        })
    }

    /// Create an object with a transform under `parent`'s transform (or the
    /// root)
    pub fn spawn(&mut self, name: impl Into<String>, parent: Option<GameObjectId>) -> CoreResult<GameObjectId> {
        let parent_node = self.parent_node(parent)?;
        let id = self.create_game_object(name);
        let node = self.graph.create(Some(parent_node))?;
        self.bind_transform(id, node)?;
        Ok(id)
    }

    /// Give an object a transform under `parent`'s transform (or the root)
    pub fn add_transform(&mut self, id: GameObjectId, parent: Option<GameObjectId>) -> CoreResult<NodeId> {
        if self.object(id)?.transform.is_some() {
            return Err(CoreError::Duplicated(format!("{id:?} already has a transform")));
        }
        let parent_node = self.parent_node(parent)?;
        let node = self.graph.create(Some(parent_node))?;
        self.bind_transform(id, node)?;
        Ok(node)
    }

    fn bind_transform(&mut self, id: GameObjectId, node: NodeId) -> CoreResult<()> {
        self.object_mut(id)?.transform = Some(node);
        self.owners.insert(node, id);
        Ok(())
    }

    fn parent_node(&self, parent: Option<GameObjectId>) -> CoreResult<NodeId> {
        match parent {
            Some(parent) => self.object(parent)?.transform.ok_or(CoreError::MissingTransform(parent)),
            None => Ok(self.graph.root()),
        }
    }

    /// Transform component of an object; `None` for unknown objects too
    pub fn transform(&self, id: GameObjectId) -> Option<NodeId> {
        self.objects.get(id).and_then(|object| object.transform)
    }

    /// Object owning a transform node
    pub fn game_object_of(&self, node: NodeId) -> Option<GameObjectId> {
        self.owners.get(node).copied()
    }

    /// First object with the given name
    pub fn find_by_name(&self, name: &str) -> Option<GameObjectId> {
        self.objects
            .iter()
            .find(|(_, object)| object.name == name)
            .map(|(id, _)| id)
    }

    /// Borrow an object
    pub fn object(&self, id: GameObjectId) -> CoreResult<&GameObject> {
        self.objects.get(id).ok_or(CoreError::ObjectNotFound(id))
    }

    fn object_mut(&mut self, id: GameObjectId) -> CoreResult<&mut GameObject> {
        self.objects.get_mut(id).ok_or(CoreError::ObjectNotFound(id))
    }

    /// All objects in unspecified order
    pub fn objects(&self) -> impl Iterator<Item = (GameObjectId, &GameObject)> {
        self.objects.iter()
    }

    /// Number of live objects
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Reparent `child`'s transform under `parent`'s transform (or the root)
    pub fn set_parent(&mut self, child: GameObjectId, parent: Option<GameObjectId>) -> CoreResult<()> {
        let child_node = self.object(child)?.transform.ok_or(CoreError::MissingTransform(child))?;
        let parent_node = self.parent_node(parent)?;
        self.graph.add_child(parent_node, child_node)
    }

    // ---------------------------------------------------------------------
    // Bounds
    // ---------------------------------------------------------------------

    /// Attach a bound. It keeps its original volume until started.
    pub fn attach_bound(&mut self, id: GameObjectId, bound: Bound) -> CoreResult<()> {
        let object = self.object_mut(id)?;
        if object.bound.is_some() {
            return Err(CoreError::Duplicated(format!("{id:?} already has a bound")));
        }
        object.bound = Some(BoundComponent::new(bound));
        Ok(())
    }

    /// Subscribe the object's bound to its transform and refresh it once
    pub fn start_bound(&mut self, id: GameObjectId) -> CoreResult<()> {
        let object = self.object(id)?;
        let node = object.transform.ok_or(CoreError::MissingTransform(id))?;
        let component = object.bound.as_ref().ok_or(CoreError::BoundNotFound(id))?;
        if component.started {
            return Err(CoreError::Duplicated(format!("bound of {id:?} is already started")));
        }
        let shared = Rc::clone(&component.shared);

        let subscriptions = vec![
            self.graph
                .add_position_changed_callback(node, follow(&shared, Bound::on_position_changed))?,
            self.graph
                .add_orientation_changed_callback(node, follow(&shared, Bound::on_orientation_changed))?,
            self.graph
                .add_scaling_changed_callback(node, follow(&shared, Bound::on_scaling_changed))?,
            self.graph
                .add_world_changed_callback(node, follow(&shared, Bound::on_world_changed))?,
        ];

        let world = self.graph.world_transform(node)?;
        let version = self.graph.world_version(node)?;
        {
            let mut tracked = shared.borrow_mut();
            tracked.bound.update(&world);
            tracked.seen_version = Some(version);
        }

        if let Some(component) = self.object_mut(id)?.bound.as_mut() {
            component.subscriptions = subscriptions;
            component.started = true;
        }
        log::debug!("Started bound of {id:?} on node {node:?}");
        Ok(())
    }

    /// Remove the object's bound, unsubscribing it, and hand it back. The
    /// returned bound no longer follows a transform and is left stale.
    pub fn detach_bound(&mut self, id: GameObjectId) -> CoreResult<Bound> {
        let object = self.object_mut(id)?;
        let component = object.bound.take().ok_or(CoreError::BoundNotFound(id))?;
        let node = object.transform;
        self.unsubscribe(node, &component.subscriptions);

        let mut bound = match Rc::try_unwrap(component.shared) {
            Ok(cell) => cell.into_inner().bound,
            Err(shared) => shared.borrow().bound.clone(),
        };
        bound.invalidate();
        Ok(bound)
    }

    fn unsubscribe(&mut self, node: Option<NodeId>, subscriptions: &[SubscriptionId]) {
        let Some(node) = node else {
            return;
        };
        for subscription in subscriptions {
            if let Err(error) = self.graph.remove_callback(node, *subscription) {
                log::warn!("Could not unsubscribe bound from {node:?}: {error}");
            }
        }
    }

    /// Borrow an object's bound
    pub fn bound(&self, id: GameObjectId) -> CoreResult<Ref<'_, Bound>> {
        let component = self.object(id)?.bound.as_ref().ok_or(CoreError::BoundNotFound(id))?;
        Ok(Ref::map(component.shared.borrow(), |tracked| &tracked.bound))
    }

    /// Mutably borrow an object's bound
    pub fn bound_mut(&mut self, id: GameObjectId) -> CoreResult<RefMut<'_, Bound>> {
        let component = self.object(id)?.bound.as_ref().ok_or(CoreError::BoundNotFound(id))?;
        Ok(RefMut::map(component.shared.borrow_mut(), |tracked| &mut tracked.bound))
    }

    /// Refresh every started bound whose transform was recomputed since the
    /// bound last saw it. Returns how many bounds were refreshed; bounds
    /// borrowed elsewhere are skipped.
    pub fn update(&self) -> usize {
        let mut refreshed = 0;
        for (id, object) in &self.objects {
            let (Some(node), Some(component)) = (object.transform, object.bound.as_ref()) else {
                continue;
            };
            if !component.started {
                continue;
            }

            let (world, version) = match self.graph.world_transform(node).and_then(|world| {
                self.graph.world_version(node).map(|version| (world, version))
            }) {
                Ok(pair) => pair,
                Err(error) => {
                    log::warn!("Skipping bound of {id:?}: {error}");
                    continue;
                }
            };

            let Ok(mut tracked) = component.shared.try_borrow_mut() else {
                log::warn!("Bound of {id:?} is borrowed; skipped by update");
                continue;
            };
            if tracked.seen_version != Some(version) {
                tracked.bound.update(&world);
                tracked.seen_version = Some(version);
                refreshed += 1;
            }
        }
        log::trace!("Scene update refreshed {refreshed} bound(s)");
        refreshed
    }

    /// Whether the bounds of two objects overlap. An object without an
    /// enabled bound never collides.
    pub fn test(&self, a: GameObjectId, b: GameObjectId) -> CoreResult<bool> {
        let (Some(first), Some(second)) = (self.enabled_bound(a)?, self.enabled_bound(b)?) else {
            return Ok(false);
        };
        let overlap = first.test(&second);
        Ok(overlap)
    }

    fn enabled_bound(&self, id: GameObjectId) -> CoreResult<Option<Ref<'_, Bound>>> {
        let object = self.object(id)?;
        Ok(object
            .bound
            .as_ref()
            .map(|component| Ref::map(component.shared.borrow(), |tracked| &tracked.bound))
            .filter(|bound| bound.is_enabled()))
    }

    /// Every overlapping pair of enabled bounds in which at least one side is
    /// a collision source
    pub fn collisions(&self) -> Vec<(GameObjectId, GameObjectId)> {
        let bounds: Vec<(GameObjectId, Ref<'_, Bound>)> = self
            .objects
            .iter()
            .filter_map(|(id, object)| {
                let component = object.bound.as_ref()?;
                let bound = Ref::map(component.shared.borrow(), |tracked| &tracked.bound);
                bound.is_enabled().then_some((id, bound))
            })
            .collect();

        let mut pairs = Vec::new();
        for (i, (a, first)) in bounds.iter().enumerate() {
            for (b, second) in &bounds[i + 1..] {
                let relevant = first.is_collision_source() || second.is_collision_source();
                if relevant && first.test(second) {
                    pairs.push((*a, *b));
                }
            }
        }
        pairs
    }

    /// Destroy an object and deal with its transform's children according to
    /// the configured [`OrphanPolicy`]. Returns every destroyed object.
    pub fn destroy_game_object(&mut self, id: GameObjectId) -> CoreResult<Vec<GameObjectId>> {
        let object = self.objects.remove(id).ok_or(CoreError::ObjectNotFound(id))?;
        let mut destroyed = vec![id];

        if let Some(component) = &object.bound {
            self.unsubscribe(object.transform, &component.subscriptions);
        }

        if let Some(node) = object.transform {
            self.owners.remove(node);
            match self.config.orphan_policy {
                OrphanPolicy::DestroySubtree => {
                    for removed in self.graph.destroy(node)? {
                        if let Some(owner) = self.owners.remove(removed) {
                            self.objects.remove(owner);
                            destroyed.push(owner);
                        }
                    }
                }
                OrphanPolicy::ReparentChildren => self.graph.destroy_reparenting(node)?,
            }
        }

        log::debug!("Destroyed {} game object(s) starting at '{}'", destroyed.len(), object.name);
        Ok(destroyed)
    }
}

/// Callback that forwards a change event to a shared bound
fn follow<T: 'static>(
    shared: &Rc<RefCell<TrackedBound>>,
    handler: fn(&mut Bound, &TransformChanged<T>),
) -> impl FnMut(&TransformChanged<T>) + 'static {
    let weak: Weak<RefCell<TrackedBound>> = Rc::downgrade(shared);
    move |event| {
        let Some(shared) = weak.upgrade() else {
            return;
        };
        let Ok(mut tracked) = shared.try_borrow_mut() else {
            log::warn!("Bound of node {:?} is borrowed; change left for the next update", event.node);
            return;
        };
        handler(&mut tracked.bound, event);
        tracked.seen_version = Some(event.world_version);
    }
}
