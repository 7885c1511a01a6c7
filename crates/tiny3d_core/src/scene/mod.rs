//! Scene module - transform hierarchy and game objects
//!
//! - [`TransformGraph`]: arena of transform nodes with cached world matrices
//! - Change callbacks keyed by [`SubscriptionId`]
//! - [`Scene`]: game objects whose bounds follow their transforms
//! - [`SceneDescription`]: serializable authoring view of a scene

mod callbacks;
mod description;
mod game_object;
mod transform_node;

pub use callbacks::{OrientationCallback, PositionCallback, ScalingCallback, SubscriptionId, TransformChanged};
pub use description::{BoundDescription, ObjectDescription, SceneDescription};
pub use game_object::{GameObject, GameObjectId, Scene};
pub use transform_node::{NodeId, TransformChange, TransformGraph, TransformNode};
