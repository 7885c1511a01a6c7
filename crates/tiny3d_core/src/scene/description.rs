//! Serializable scene descriptions
//!
//! A [`SceneDescription`] is the authoring-time view of a scene: names,
//! parent links, local transforms and bounds in local space. It loads and
//! saves through the [`Config`] trait, so `.ron` and `.toml` both work.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::game_object::{GameObjectId, Scene};
use crate::bounds::{Bound, BoundFlags, BoundVolume};
use crate::config::{Config, SceneConfig};
use crate::error::{CoreError, CoreResult};
use crate::foundation::math::Transform;

/// Whole scene: settings plus objects, parents listed before children
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneDescription {
    /// Scene settings
    pub config: SceneConfig,
    /// Objects in creation order
    pub objects: Vec<ObjectDescription>,
}

impl Config for SceneDescription {}

/// One game object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDescription {
    /// Unique name within the description
    pub name: String,
    /// Name of an object listed earlier; `None` attaches to the root
    #[serde(default)]
    pub parent: Option<String>,
    /// Local transform
    #[serde(default)]
    pub transform: Transform,
    /// Bound, started as soon as the object exists
    #[serde(default)]
    pub bound: Option<BoundDescription>,
}

impl ObjectDescription {
    /// Object at the identity transform under the root
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            transform: Transform::identity(),
            bound: None,
        }
    }

    /// Builder pattern: Set parent name
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Builder pattern: Set local transform
    pub const fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Builder pattern: Set bound
    pub fn with_bound(mut self, bound: BoundDescription) -> Self {
        self.bound = Some(bound);
        self
    }
}

/// Bound in local space plus its flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundDescription {
    /// Local-space volume
    pub volume: BoundVolume,
    /// Query group
    #[serde(default)]
    pub group_id: u32,
    /// Owner expected to move
    #[serde(default)]
    pub movable: bool,
    /// Actively looks for collisions
    #[serde(default)]
    pub collision_source: bool,
    /// Takes part in queries
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

const fn enabled_by_default() -> bool {
    true
}

impl BoundDescription {
    /// Enabled, non-moving, passive bound
    pub const fn new(volume: BoundVolume) -> Self {
        Self {
            volume,
            group_id: 0,
            movable: false,
            collision_source: false,
            enabled: true,
        }
    }

    /// Build the component
    pub fn to_bound(&self) -> Bound {
        let mut flags = BoundFlags::empty();
        flags.set(BoundFlags::MOVABLE, self.movable);
        flags.set(BoundFlags::COLLISION_SOURCE, self.collision_source);
        flags.set(BoundFlags::ENABLED, self.enabled);

        let bound = match self.volume {
            BoundVolume::Frustum(frustum) => Bound::frustum(frustum),
            volume => Bound::new(volume),
        };
        bound.with_group_id(self.group_id).with_flags(flags)
    }

    /// Capture the authoring-time fields of a bound
    pub fn from_bound(bound: &Bound) -> Self {
        Self {
            volume: *bound.original(),
            group_id: bound.group_id(),
            movable: bound.is_movable(),
            collision_source: bound.is_collision_source(),
            enabled: bound.is_enabled(),
        }
    }
}

impl Scene {
    /// Build a scene, starting every described bound
    pub fn from_description(description: &SceneDescription) -> CoreResult<Self> {
        let mut scene = Self::new(description.config.clone());
        let mut by_name: HashMap<&str, GameObjectId> = HashMap::with_capacity(description.objects.len());

        for object in &description.objects {
            if by_name.contains_key(object.name.as_str()) {
                return Err(CoreError::Description(format!("duplicate object name '{}'", object.name)));
            }
            let parent = match &object.parent {
                Some(parent) => Some(*by_name.get(parent.as_str()).ok_or_else(|| {
                    CoreError::Description(format!(
                        "'{}' names parent '{parent}', which is not listed before it",
                        object.name
                    ))
                })?),
                None => None,
            };

            let id = scene.spawn(object.name.clone(), parent)?;
            let node = scene.transform(id).ok_or(CoreError::MissingTransform(id))?;
            scene.graph_mut().set_local_transform(node, object.transform)?;
            if let Some(bound) = &object.bound {
                scene.attach_bound(id, bound.to_bound())?;
                scene.start_bound(id)?;
            }
            by_name.insert(object.name.as_str(), id);
        }

        log::info!("Built scene with {} object(s)", scene.object_count());
        Ok(scene)
    }

    /// Capture the scene as a description.
    ///
    /// Objects are listed parents first. Objects without a transform, or
    /// whose transform is not under the root, are left out. Parent links
    /// are by name, so scenes with duplicate names do not reload.
    pub fn describe(&self) -> CoreResult<SceneDescription> {
        let graph = self.graph();
        let mut objects = Vec::with_capacity(self.object_count());

        for node in graph.descendants(graph.root())? {
            let Some(id) = self.game_object_of(node) else {
                continue;
            };
            let object = self.object(id)?;

            let mut parent = None;
            let mut ancestor = graph.parent(node)?;
            while let Some(candidate) = ancestor {
                if let Some(owner) = self.game_object_of(candidate) {
                    parent = Some(self.object(owner)?.name().to_owned());
                    break;
                }
                ancestor = graph.parent(candidate)?;
            }

            let bound = if object.has_bound() {
                Some(BoundDescription::from_bound(&*self.bound(id)?))
            } else {
                None
            };

            objects.push(ObjectDescription {
                name: object.name().to_owned(),
                parent,
                transform: graph.local_transform(node)?,
                bound,
            });
        }

        let skipped = self.object_count() - objects.len();
        if skipped > 0 {
            log::warn!("{skipped} object(s) without a rooted transform left out of the description");
        }

        Ok(SceneDescription {
            config: self.config().clone(),
            objects,
        })
    }
}
