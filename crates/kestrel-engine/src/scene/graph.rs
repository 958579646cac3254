use slotmap::{SlotMap, new_key_type};

use crate::coords::{Mat4, Vec2};
use crate::error::{Error, Result};

use super::{Actor, Component, DrawContext, DrawList, Layer, ZIndex};

new_key_type! {
    pub struct ActorKey;
    pub struct ComponentKey;
    pub struct LayerKey;
}

/// Arena owning every actor, component and layer.
///
/// Back-references (component → actor/layer, actor → parent/layer) are plain
/// keys; the scene keeps both sides consistent.
#[derive(Debug, Default)]
pub struct Scene {
    actors: SlotMap<ActorKey, Actor>,
    components: SlotMap<ComponentKey, Component>,
    layers: SlotMap<LayerKey, Layer>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    // ── layers ────────────────────────────────────────────────────────────

    pub fn add_layer(&mut self, name: impl Into<String>, order: ZIndex) -> LayerKey {
        self.layers.insert(Layer::new(name, order))
    }

    pub fn layer(&self, key: LayerKey) -> Option<&Layer> {
        self.layers.get(key)
    }

    pub fn layer_mut(&mut self, key: LayerKey) -> Option<&mut Layer> {
        self.layers.get_mut(key)
    }

    /// Removes the layer; its actors stay alive, detached from any layer.
    pub fn remove_layer(&mut self, key: LayerKey) -> Option<Layer> {
        let roots = self.layers.get(key)?.roots.clone();
        for root in roots {
            self.propagate_layer(root, None);
        }
        self.layers.remove(key)
    }

    /// Layer keys sorted by draw order; ties keep creation order.
    pub fn layers_in_draw_order(&self) -> Vec<LayerKey> {
        let mut keys: Vec<LayerKey> = self.layers.keys().collect();
        keys.sort_by_key(|&k| self.layers[k].order());
        keys
    }

    // ── actors ────────────────────────────────────────────────────────────

    /// New detached root actor.
    pub fn add_actor(&mut self, name: impl Into<String>) -> ActorKey {
        self.actors.insert(Actor::new(name))
    }

    pub fn actor(&self, key: ActorKey) -> Option<&Actor> {
        self.actors.get(key)
    }

    pub fn actor_mut(&mut self, key: ActorKey) -> Option<&mut Actor> {
        self.actors.get_mut(key)
    }

    /// Makes `actor` a root of `layer` (or of no layer). A parented actor is
    /// first detached from its parent.
    pub fn set_actor_layer(&mut self, actor: ActorKey, layer: Option<LayerKey>) -> Result<()> {
        self.actor_or_err(actor)?;
        if let Some(layer) = layer {
            self.layers.get(layer).ok_or(Error::UnknownSceneObject("layer"))?;
        }

        self.unlink(actor);
        if let Some(layer) = layer {
            self.layers[layer].roots.push(actor);
        }
        self.propagate_layer(actor, layer);
        self.actors[actor].dirty = true;
        Ok(())
    }

    /// Re-parents `child`. With `None` the child becomes a root of the layer
    /// it was already in.
    pub fn set_parent(&mut self, child: ActorKey, parent: Option<ActorKey>) -> Result<()> {
        self.actor_or_err(child)?;
        let Some(parent) = parent else {
            let layer = self.actors[child].layer;
            return self.set_actor_layer(child, layer);
        };
        self.actor_or_err(parent)?;

        let mut cursor = Some(parent);
        while let Some(k) = cursor {
            if k == child {
                return Err(Error::HierarchyCycle);
            }
            cursor = self.actors[k].parent;
        }

        self.unlink(child);
        self.actors[parent].children.push(child);
        self.actors[child].parent = Some(parent);
        let layer = self.actors[parent].layer;
        self.propagate_layer(child, layer);
        self.actors[child].dirty = true;
        Ok(())
    }

    /// Destroys the actor, its descendants and every component they own.
    pub fn remove_actor(&mut self, actor: ActorKey) -> bool {
        if !self.actors.contains_key(actor) {
            return false;
        }
        self.unlink(actor);

        let mut stack = vec![actor];
        while let Some(key) = stack.pop() {
            let Some(node) = self.actors.remove(key) else {
                continue;
            };
            for component in node.components {
                self.assign_layer(component, None);
                self.components.remove(component);
            }
            stack.extend(node.children);
        }
        true
    }

    // ── components ────────────────────────────────────────────────────────

    /// Stores a detached component.
    pub fn add_component(&mut self, component: Component) -> ComponentKey {
        self.components.insert(component)
    }

    pub fn component(&self, key: ComponentKey) -> Option<&Component> {
        self.components.get(key)
    }

    pub fn component_mut(&mut self, key: ComponentKey) -> Option<&mut Component> {
        self.components.get_mut(key)
    }

    /// Attaches `component` to `actor`, moving it off any previous actor.
    pub fn attach_component(&mut self, actor: ActorKey, component: ComponentKey) -> Result<()> {
        self.actor_or_err(actor)?;
        if !self.components.contains_key(component) {
            return Err(Error::UnknownSceneObject("component"));
        }

        self.remove_from_actor(component);

        let node = &mut self.actors[actor];
        node.components.push(component);
        let (layer, world) = (node.layer, node.world);

        self.components[component].set_actor(Some(actor));
        self.assign_layer(component, layer);
        self.components[component].update_transform(world);
        Ok(())
    }

    /// Detaches `component` from its actor, clearing both sides. Returns
    /// `false` when it was not attached.
    pub fn remove_from_actor(&mut self, component: ComponentKey) -> bool {
        let Some(actor) = self.components.get(component).and_then(Component::actor) else {
            return false;
        };

        if let Some(node) = self.actors.get_mut(actor) {
            node.components.retain(|&c| c != component);
        }
        self.assign_layer(component, None);
        self.components[component].set_actor(None);
        true
    }

    /// Detaches and drops the component.
    pub fn destroy_component(&mut self, component: ComponentKey) -> Option<Component> {
        self.remove_from_actor(component);
        self.components.remove(component)
    }

    // ── transforms ────────────────────────────────────────────────────────

    /// Recomputes world matrices of stale subtrees and forwards them to the
    /// components they own.
    pub fn update_transforms(&mut self) {
        let roots: Vec<ActorKey> = self
            .actors
            .iter()
            .filter(|(_, a)| a.parent.is_none())
            .map(|(k, _)| k)
            .collect();

        let mut stack: Vec<(ActorKey, Mat4, bool)> =
            roots.into_iter().map(|k| (k, Mat4::IDENTITY, false)).collect();

        while let Some((key, parent_world, parent_dirty)) = stack.pop() {
            let node = &mut self.actors[key];
            let dirty = parent_dirty || node.dirty;
            if dirty {
                node.world = parent_world * node.local_transform();
                node.dirty = false;
            }
            let world = node.world;
            stack.extend(node.children.iter().map(|&c| (c, world, dirty)));

            if dirty {
                for &component in &node.components {
                    if let Some(c) = self.components.get_mut(component) {
                        c.update_transform(world);
                    }
                }
            }
        }
    }

    // ── drawing ───────────────────────────────────────────────────────────

    /// Records every visible layer into `list`, once per camera. Layers with
    /// no camera are drawn once with `base`. Returns the number of calls
    /// recorded.
    pub fn draw(&mut self, base: &DrawContext, list: &mut DrawList) -> usize {
        self.update_transforms();
        let before = list.len();

        for layer_key in self.layers_in_draw_order() {
            let layer = &self.layers[layer_key];
            if layer.is_hidden() {
                continue;
            }

            let contexts: Vec<DrawContext> = layer
                .cameras
                .iter()
                .filter_map(|&k| self.components.get(k))
                .filter(|c| !c.is_hidden() && c.actor().is_some_and(|a| self.is_visible(a)))
                .filter_map(|c| c.camera().map(|cam| cam.context(base)))
                .collect();

            if contexts.is_empty() {
                self.draw_layer(layer, base, list);
            } else {
                for ctx in &contexts {
                    self.draw_layer(layer, ctx, list);
                }
            }
        }

        list.len() - before
    }

    fn draw_layer(&self, layer: &Layer, ctx: &DrawContext, list: &mut DrawList) {
        for &root in &layer.roots {
            self.draw_actor(root, ctx, ctx.opacity, layer.order(), list);
        }
    }

    fn draw_actor(&self, key: ActorKey, base: &DrawContext, opacity: f32, z: ZIndex, list: &mut DrawList) {
        let Some(actor) = self.actors.get(key) else {
            return;
        };
        if actor.is_hidden() {
            return;
        }

        let ctx = DrawContext {
            transform: actor.world,
            opacity: opacity * actor.opacity(),
            ..base.clone()
        };
        for &component in &actor.components {
            if let Some(c) = self.components.get(component) {
                c.draw(&ctx, z, list);
            }
        }
        for &child in &actor.children {
            self.draw_actor(child, base, ctx.opacity, z, list);
        }
    }

    // ── picking ───────────────────────────────────────────────────────────

    /// Topmost visible actor of `layer` with a component under the world
    /// point `point`.
    pub fn pick_actor(&mut self, layer: LayerKey, point: Vec2) -> Option<ActorKey> {
        self.update_transforms();
        self.actors_in_draw_order(layer).into_iter().rev().find(|&key| {
            let inverse = self.actors[key].world.inverse();
            let local = inverse.transform_point3(point.extend(0.0)).truncate();
            self.visible_components(key).any(|c| c.point_on(local))
        })
    }

    /// Visible actors of `layer` with a component overlapping the world-space
    /// convex `polygon`, in draw order.
    pub fn pick_actors(&mut self, layer: LayerKey, polygon: &[Vec2]) -> Vec<ActorKey> {
        self.update_transforms();
        self.actors_in_draw_order(layer)
            .into_iter()
            .filter(|&key| {
                let inverse = self.actors[key].world.inverse();
                let local: Vec<Vec2> = polygon
                    .iter()
                    .map(|p| inverse.transform_point3(p.extend(0.0)).truncate())
                    .collect();
                self.visible_components(key).any(|c| c.shape_overlaps(&local))
            })
            .collect()
    }

    // ── internals ─────────────────────────────────────────────────────────

    fn actor_or_err(&self, key: ActorKey) -> Result<&Actor> {
        self.actors.get(key).ok_or(Error::UnknownSceneObject("actor"))
    }

    fn is_visible(&self, mut key: ActorKey) -> bool {
        loop {
            let Some(actor) = self.actors.get(key) else {
                return false;
            };
            if actor.is_hidden() {
                return false;
            }
            match actor.parent {
                Some(parent) => key = parent,
                None => return true,
            }
        }
    }

    fn visible_components(&self, actor: ActorKey) -> impl Iterator<Item = &Component> {
        self.actors[actor]
            .components
            .iter()
            .filter_map(|&k| self.components.get(k))
            .filter(|c| !c.is_hidden())
    }

    /// Visible actors of `layer`, depth-first, parents before children.
    fn actors_in_draw_order(&self, layer: LayerKey) -> Vec<ActorKey> {
        let mut out = Vec::new();
        let Some(layer) = self.layers.get(layer) else {
            return out;
        };
        if layer.is_hidden() {
            return out;
        }

        let mut stack: Vec<ActorKey> = layer.roots.iter().rev().copied().collect();
        while let Some(key) = stack.pop() {
            let actor = &self.actors[key];
            if actor.is_hidden() {
                continue;
            }
            out.push(key);
            stack.extend(actor.children.iter().rev());
        }
        out
    }

    /// Removes `actor` from its parent's children or its layer's roots.
    fn unlink(&mut self, actor: ActorKey) {
        let node = &mut self.actors[actor];
        match (node.parent.take(), node.layer) {
            (Some(parent), _) => {
                if let Some(p) = self.actors.get_mut(parent) {
                    p.children.retain(|&c| c != actor);
                }
            }
            (None, Some(layer)) => {
                if let Some(l) = self.layers.get_mut(layer) {
                    l.roots.retain(|&a| a != actor);
                }
            }
            (None, None) => {}
        }
    }

    fn propagate_layer(&mut self, actor: ActorKey, layer: Option<LayerKey>) {
        let mut stack = vec![actor];
        while let Some(key) = stack.pop() {
            let Some(node) = self.actors.get_mut(key) else {
                continue;
            };
            node.layer = layer;
            stack.extend(node.children.iter().copied());
            let components = node.components.clone();
            for component in components {
                self.assign_layer(component, layer);
            }
        }
    }

    /// Updates a component's layer back-reference and the layers' camera lists.
    fn assign_layer(&mut self, component: ComponentKey, layer: Option<LayerKey>) {
        let Some(c) = self.components.get_mut(component) else {
            return;
        };
        let old = c.layer();
        if old == layer {
            return;
        }
        c.set_layer(layer);

        if c.camera().is_none() {
            return;
        }
        if let Some(l) = old.and_then(|k| self.layers.get_mut(k)) {
            l.cameras.retain(|&k| k != component);
        }
        if let Some(l) = layer.and_then(|k| self.layers.get_mut(k)) {
            l.cameras.push(component);
        }
    }
}
