use crate::coords::{Mat4, Quat, Vec3};

use super::{ActorKey, ComponentKey, LayerKey};

/// Node of the scene hierarchy: a local transform, components and children.
///
/// Hierarchy, layer and component membership are managed through
/// [`Scene`](super::Scene); transform and visibility setters live here and
/// mark the cached world matrix stale.
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    name: String,
    position: Vec3,
    rotation: Quat,
    scale: Vec3,
    opacity: f32,
    hidden: bool,

    pub(crate) parent: Option<ActorKey>,
    pub(crate) children: Vec<ActorKey>,
    pub(crate) layer: Option<LayerKey>,
    pub(crate) components: Vec<ComponentKey>,

    pub(crate) world: Mat4,
    pub(crate) dirty: bool,
}

impl Actor {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            opacity: 1.0,
            hidden: false,
            parent: None,
            children: Vec::new(),
            layer: None,
            components: Vec::new(),
            world: Mat4::IDENTITY,
            dirty: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.dirty = true;
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
        self.dirty = true;
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.dirty = true;
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Hidden actors skip drawing and picking for their whole subtree.
    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub fn parent(&self) -> Option<ActorKey> {
        self.parent
    }

    pub fn children(&self) -> &[ActorKey] {
        &self.children
    }

    pub fn layer(&self) -> Option<LayerKey> {
        self.layer
    }

    pub fn components(&self) -> &[ComponentKey] {
        &self.components
    }

    pub fn local_transform(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// World matrix as of the last [`Scene::update_transforms`](super::Scene::update_transforms).
    pub fn world_transform(&self) -> Mat4 {
        self.world
    }
}
