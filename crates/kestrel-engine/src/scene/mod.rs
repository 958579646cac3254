//! Scene graph and draw dispatch.
//!
//! A [`Scene`] owns layers, actors and components in slot-map arenas. Drawing
//! walks each layer's actor trees once per camera, hands an accumulated
//! [`DrawContext`] to every component and records the resulting draw calls
//! into a [`DrawList`], which the renderer submits in paint order.

mod actor;
mod camera;
mod component;
mod context;
mod graph;
mod hit;
mod key;
mod layer;
mod list;
mod z_index;

pub use actor::Actor;
pub use camera::{Camera, Projection};
pub use component::{
    Component, ComponentKind, Light, MeshRenderer, Particle, ParticleSystem, ShapeRenderer, Sound, Sprite,
    TextRenderer,
};
pub use context::DrawContext;
pub use graph::{ActorKey, ComponentKey, LayerKey, Scene};
pub use hit::polygon_overlaps_rect;
pub use key::SortKey;
pub use layer::Layer;
pub use list::{DrawItem, DrawList};
pub use z_index::ZIndex;
