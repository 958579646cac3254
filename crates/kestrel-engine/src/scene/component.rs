use crate::coords::{Box3, Mat4, Vec2, Vec3};
use crate::device::{MeshBufferId, PrimitiveTopology, TextureId};
use crate::paint::Color;

use super::camera::Camera;
use super::hit::polygon_overlaps_rect;
use super::{ActorKey, DrawContext, DrawList, LayerKey, ZIndex};

/// Indexed geometry drawn with the actor's transform.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshRenderer {
    pub mesh_buffer: MeshBufferId,
    pub textures: Vec<TextureId>,
    pub color: Color,
    pub topology: PrimitiveTopology,
    pub start_index: u32,
    /// `0` draws the whole index buffer.
    pub index_count: u32,
}

impl MeshRenderer {
    pub fn new(mesh_buffer: MeshBufferId) -> Self {
        Self {
            mesh_buffer,
            textures: Vec::new(),
            color: Color::WHITE,
            topology: PrimitiveTopology::TriangleList,
            start_index: 0,
            index_count: 0,
        }
    }
}

/// Textured quad covering `[0, size]` in local space.
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    /// Unit quad, `[0, 1]` on X and Y.
    pub quad: MeshBufferId,
    pub texture: Option<TextureId>,
    pub size: Vec2,
    pub color: Color,
}

impl Sprite {
    pub fn new(quad: MeshBufferId, size: Vec2) -> Self {
        Self { quad, texture: None, size, color: Color::WHITE }
    }
}

/// Flat-coloured geometry; hit tests use the component's bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeRenderer {
    pub mesh_buffer: MeshBufferId,
    pub color: Color,
    pub topology: PrimitiveTopology,
}

impl ShapeRenderer {
    pub fn new(mesh_buffer: MeshBufferId, color: Color) -> Self {
        Self { mesh_buffer, color, topology: PrimitiveTopology::TriangleList }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Particle {
    pub position: Vec3,
    pub size: f32,
    pub color: Color,
}

/// Unit quads, one draw call per live particle.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleSystem {
    pub quad: MeshBufferId,
    pub texture: Option<TextureId>,
    pub particles: Vec<Particle>,
}

impl ParticleSystem {
    pub fn new(quad: MeshBufferId) -> Self {
        Self { quad, texture: None, particles: Vec::new() }
    }

    /// Union of every particle's quad.
    pub fn bounds(&self) -> Box3 {
        self.particles.iter().fold(Box3::empty(), |acc, p| {
            acc.merge(Box3::new(p.position, p.position + Vec3::new(p.size, p.size, 0.0)))
        })
    }
}

/// Pre-built glyph quads: six indices per glyph.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRenderer {
    pub mesh_buffer: MeshBufferId,
    pub glyph_atlas: Option<TextureId>,
    pub glyph_count: u32,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Light {
    pub color: Color,
    pub intensity: f32,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Sound {
    pub volume: f32,
    pub looping: bool,
}

/// Every component variant the scene knows about.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentKind {
    Camera(Camera),
    Animator,
    MeshRenderer(MeshRenderer),
    ParticleSystem(ParticleSystem),
    ShapeRenderer(ShapeRenderer),
    Listener,
    Sound(Sound),
    Sprite(Sprite),
    TextRenderer(TextRenderer),
    Light(Light),
}

impl ComponentKind {
    pub fn name(&self) -> &'static str {
        match self {
            ComponentKind::Camera(_) => "camera",
            ComponentKind::Animator => "animator",
            ComponentKind::MeshRenderer(_) => "mesh renderer",
            ComponentKind::ParticleSystem(_) => "particle system",
            ComponentKind::ShapeRenderer(_) => "shape renderer",
            ComponentKind::Listener => "listener",
            ComponentKind::Sound(_) => "sound",
            ComponentKind::Sprite(_) => "sprite",
            ComponentKind::TextRenderer(_) => "text renderer",
            ComponentKind::Light(_) => "light",
        }
    }

    fn natural_bounds(&self) -> Box3 {
        match self {
            ComponentKind::Sprite(s) => Box3::new(Vec3::ZERO, s.size.extend(0.0)),
            ComponentKind::ParticleSystem(p) => p.bounds(),
            _ => Box3::empty(),
        }
    }

    fn is_pickable(&self) -> bool {
        matches!(
            self,
            ComponentKind::Sprite(_) | ComponentKind::ShapeRenderer(_) | ComponentKind::TextRenderer(_)
        )
    }
}

/// Unit of behaviour attached to an actor.
///
/// Created detached; the [`Scene`](super::Scene) attaches it to at most one
/// actor at a time and keeps the actor/layer back-references in sync.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    kind: ComponentKind,
    bounding_box: Box3,
    /// Owning actor's world transform as of the last update.
    world: Mat4,
    world_bounds: Box3,
    hidden: bool,
    actor: Option<ActorKey>,
    layer: Option<LayerKey>,
}

impl Component {
    pub fn new(kind: ComponentKind) -> Self {
        let bounding_box = kind.natural_bounds();
        Self {
            kind,
            bounding_box,
            world: Mat4::IDENTITY,
            world_bounds: bounding_box,
            hidden: false,
            actor: None,
            layer: None,
        }
    }

    #[inline]
    pub fn kind(&self) -> &ComponentKind {
        &self.kind
    }

    #[inline]
    pub fn kind_mut(&mut self) -> &mut ComponentKind {
        &mut self.kind
    }

    pub fn camera(&self) -> Option<&Camera> {
        match &self.kind {
            ComponentKind::Camera(c) => Some(c),
            _ => None,
        }
    }

    pub fn camera_mut(&mut self) -> Option<&mut Camera> {
        match &mut self.kind {
            ComponentKind::Camera(c) => Some(c),
            _ => None,
        }
    }

    /// Local-space bounds.
    #[inline]
    pub fn bounding_box(&self) -> Box3 {
        self.bounding_box
    }

    pub fn set_bounding_box(&mut self, bounds: Box3) {
        self.bounding_box = bounds;
        self.world_bounds = bounds.transformed(self.world);
    }

    /// Local bounds under the owning actor's world transform.
    #[inline]
    pub fn world_bounding_box(&self) -> Box3 {
        self.world_bounds
    }

    #[inline]
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    #[inline]
    pub fn actor(&self) -> Option<ActorKey> {
        self.actor
    }

    #[inline]
    pub fn layer(&self) -> Option<LayerKey> {
        self.layer
    }

    /// Records this component's draw calls. Hidden components and variants
    /// without visuals record nothing.
    pub fn draw(&self, ctx: &DrawContext, z: ZIndex, list: &mut DrawList) {
        if self.hidden {
            return;
        }

        match &self.kind {
            ComponentKind::MeshRenderer(m) => {
                let mut call = ctx.draw_call(m.mesh_buffer);
                call.textures.clone_from(&m.textures);
                call.color = m.color.with_opacity(ctx.opacity);
                call.topology = m.topology;
                call.start_index = m.start_index;
                call.index_count = m.index_count;
                list.push(z, call);
            }
            ComponentKind::Sprite(s) => {
                let mut call = ctx.draw_call(s.quad);
                call.transform = ctx.model_view_projection() * Mat4::from_scale(s.size.extend(1.0));
                call.textures.extend(s.texture);
                call.color = s.color.with_opacity(ctx.opacity);
                list.push(z, call);
            }
            ComponentKind::ShapeRenderer(s) => {
                let mut call = ctx.draw_call(s.mesh_buffer);
                call.color = s.color.with_opacity(ctx.opacity);
                call.topology = s.topology;
                list.push(z, call);
            }
            ComponentKind::ParticleSystem(p) => {
                let mvp = ctx.model_view_projection();
                for particle in &p.particles {
                    let mut call = ctx.draw_call(p.quad);
                    call.transform = mvp
                        * Mat4::from_translation(particle.position)
                        * Mat4::from_scale(Vec3::new(particle.size, particle.size, 1.0));
                    call.textures.extend(p.texture);
                    call.color = particle.color.with_opacity(ctx.opacity);
                    list.push(z, call);
                }
            }
            ComponentKind::TextRenderer(t) => {
                if t.glyph_count == 0 {
                    return;
                }
                let mut call = ctx.draw_call(t.mesh_buffer);
                call.textures.extend(t.glyph_atlas);
                call.color = t.color.with_opacity(ctx.opacity);
                call.index_count = t.glyph_count * 6;
                list.push(z, call);
            }
            ComponentKind::Camera(_)
            | ComponentKind::Animator
            | ComponentKind::Listener
            | ComponentKind::Sound(_)
            | ComponentKind::Light(_) => {}
        }
    }

    /// Hit test for a point in this component's local space.
    pub fn point_on(&self, local: Vec2) -> bool {
        self.kind.is_pickable() && !self.bounding_box.is_empty() && self.bounding_box.xy_rect().contains(local)
    }

    /// Overlap test for a convex polygon in this component's local space.
    pub fn shape_overlaps(&self, polygon: &[Vec2]) -> bool {
        self.kind.is_pickable()
            && !self.bounding_box.is_empty()
            && polygon_overlaps_rect(polygon, self.bounding_box.xy_rect())
    }

    pub(crate) fn set_actor(&mut self, actor: Option<ActorKey>) {
        self.actor = actor;
    }

    pub(crate) fn set_layer(&mut self, layer: Option<LayerKey>) {
        self.layer = layer;
    }

    pub(crate) fn update_transform(&mut self, world: Mat4) {
        self.world = world;
        self.world_bounds = self.bounding_box.transformed(world);
        if let ComponentKind::Camera(camera) = &mut self.kind {
            camera.update_transform(world);
        }
    }
}
