//! Error types shared by the transform, bound and scene modules

use thiserror::Error;

use crate::bounds::BoundType;
use crate::scene::{GameObjectId, NodeId, SubscriptionId};

/// Result alias used throughout the crate
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors returned by transform, bound and scene operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// The node id is stale or was never issued by this graph
    #[error("Transform node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// The game object id is stale or unknown
    #[error("Game object not found: {0:?}")]
    ObjectNotFound(GameObjectId),

    /// Removing a callback that is not registered on the node
    #[error("Subscription {subscription:?} is not registered on node {node:?}")]
    SubscriptionNotFound {
        /// Node the removal was addressed to
        node: NodeId,
        /// Unknown subscription
        subscription: SubscriptionId,
    },

    /// The game object has no bound attached
    #[error("Game object {0:?} has no bound")]
    BoundNotFound(GameObjectId),

    /// Registering something that already exists
    #[error("Already registered: {0}")]
    Duplicated(String),

    /// Degenerate input such as a zero-length axis
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Reparenting would make a node its own ancestor
    #[error("Attaching {child:?} under {parent:?} would create a cycle")]
    CycleDetected {
        /// Requested parent
        parent: NodeId,
        /// Node being attached
        child: NodeId,
    },

    /// Detaching a node from something that is not its parent
    #[error("{child:?} is not a child of {parent:?}")]
    NotAChild {
        /// Supposed parent
        parent: NodeId,
        /// Node that was to be detached
        child: NodeId,
    },

    /// The game object needs a transform for this operation
    #[error("Game object {0:?} has no transform")]
    MissingTransform(GameObjectId),

    /// Bound variants differ where they must match
    #[error("Bound type mismatch: expected {expected:?}, found {found:?}")]
    TypeMismatch {
        /// Type of the receiving bound
        expected: BoundType,
        /// Type that was supplied
        found: BoundType,
    },

    /// A scene description could not be turned into a scene
    #[error("Invalid scene description: {0}")]
    Description(String),
}
