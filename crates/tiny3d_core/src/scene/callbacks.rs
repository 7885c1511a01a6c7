//! Change notification for transform nodes
//!
//! Observers register a callback per kind of change and get back an opaque
//! [`SubscriptionId`]; removing the subscription is the only way to stop
//! notifications, so no observer identity is ever used as a key.
//!
//! Position, orientation and scaling callbacks fire for the node whose local
//! value changed. World callbacks fire for nodes whose world matrix moved
//! because an ancestor changed or the node was reparented.

use std::fmt;

use slotmap::SlotMap;

use super::transform_node::NodeId;
use crate::foundation::math::{Mat4, Quat, Vec3};

slotmap::new_key_type! {
    /// Handle returned when registering a change callback
    pub struct SubscriptionId;
}

/// Payload handed to change callbacks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformChanged<T> {
    /// Node whose local value changed
    pub node: NodeId,
    /// Value before the change
    pub old: T,
    /// Value after the change
    pub new: T,
    /// World matrix of the node after the change
    pub world: Mat4,
    /// Version of `world`, bumped on every recompute
    pub world_version: u64,
}

/// Position-changed callback
pub type PositionCallback = Box<dyn FnMut(&TransformChanged<Vec3>)>;

/// Orientation-changed callback
pub type OrientationCallback = Box<dyn FnMut(&TransformChanged<Quat>)>;

/// Scaling-changed callback
pub type ScalingCallback = Box<dyn FnMut(&TransformChanged<Vec3>)>;

/// World-changed callback; `old` is the previously cached world matrix
pub type WorldCallback = Box<dyn FnMut(&TransformChanged<Mat4>)>;

/// One logical change of a node's local transform
#[derive(Debug, Clone, Copy)]
pub(crate) enum ChangeEvent {
    Position(TransformChanged<Vec3>),
    Orientation(TransformChanged<Quat>),
    Scaling(TransformChanged<Vec3>),
    World(TransformChanged<Mat4>),
}

enum Listener {
    Position(PositionCallback),
    Orientation(OrientationCallback),
    Scaling(ScalingCallback),
    World(WorldCallback),
}

struct Entry {
    node: NodeId,
    listener: Listener,
}

/// Every callback registered on a graph, keyed by subscription
#[derive(Default)]
pub(crate) struct ChangeListeners {
    entries: SlotMap<SubscriptionId, Entry>,
}

impl fmt::Debug for ChangeListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeListeners")
            .field("count", &self.entries.len())
            .finish()
    }
}

impl ChangeListeners {
    pub(crate) fn add_position(&mut self, node: NodeId, callback: PositionCallback) -> SubscriptionId {
        self.entries.insert(Entry { node, listener: Listener::Position(callback) })
    }

    pub(crate) fn add_orientation(&mut self, node: NodeId, callback: OrientationCallback) -> SubscriptionId {
        self.entries.insert(Entry { node, listener: Listener::Orientation(callback) })
    }

    pub(crate) fn add_scaling(&mut self, node: NodeId, callback: ScalingCallback) -> SubscriptionId {
        self.entries.insert(Entry { node, listener: Listener::Scaling(callback) })
    }

    pub(crate) fn add_world(&mut self, node: NodeId, callback: WorldCallback) -> SubscriptionId {
        self.entries.insert(Entry { node, listener: Listener::World(callback) })
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Node a subscription belongs to
    pub(crate) fn owner(&self, subscription: SubscriptionId) -> Option<NodeId> {
        self.entries.get(subscription).map(|entry| entry.node)
    }

    pub(crate) fn remove(&mut self, subscription: SubscriptionId) -> bool {
        self.entries.remove(subscription).is_some()
    }

    /// Invoke the callbacks among `subscriptions` that listen for this kind
    /// of change, in registration order. Returns how many ran.
    pub(crate) fn dispatch(&mut self, subscriptions: &[SubscriptionId], event: &ChangeEvent) -> usize {
        let mut invoked = 0;
        for subscription in subscriptions {
            let Some(entry) = self.entries.get_mut(*subscription) else {
                continue;
            };
            match (&mut entry.listener, event) {
                (Listener::Position(callback), ChangeEvent::Position(change))
                | (Listener::Scaling(callback), ChangeEvent::Scaling(change)) => callback(change),
                (Listener::Orientation(callback), ChangeEvent::Orientation(change)) => callback(change),
                (Listener::World(callback), ChangeEvent::World(change)) => callback(change),
                _ => continue,
            }
            invoked += 1;
        }
        invoked
    }
}
