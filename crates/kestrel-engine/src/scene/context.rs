use crate::coords::{Mat4, Rect};
use crate::device::{DrawCall, MeshBufferId, PipelineState, TextureId};

/// Render state accumulated while walking the scene and handed to
/// [`Component::draw`](super::Component::draw).
#[derive(Debug, Clone, PartialEq)]
pub struct DrawContext {
    /// Model (world) transform of the actor being drawn.
    pub transform: Mat4,
    /// Product of the actor chain's opacities.
    pub opacity: f32,
    pub view_projection: Mat4,
    /// `None` draws into the back buffer.
    pub render_target: Option<TextureId>,
    pub viewport: Rect,
    pub depth_write: bool,
    pub depth_test: bool,
    pub wireframe: bool,
    pub scissor_test: bool,
    pub scissor_rect: Rect,
}

impl Default for DrawContext {
    fn default() -> Self {
        Self {
            transform: Mat4::IDENTITY,
            opacity: 1.0,
            view_projection: Mat4::IDENTITY,
            render_target: None,
            viewport: Rect::default(),
            depth_write: true,
            depth_test: true,
            wireframe: false,
            scissor_test: false,
            scissor_rect: Rect::default(),
        }
    }
}

impl DrawContext {
    /// Viewport-sized context with an identity camera.
    pub fn for_viewport(viewport: Rect) -> Self {
        Self { viewport, ..Self::default() }
    }

    /// `view_projection * transform`.
    #[inline]
    pub fn model_view_projection(&self) -> Mat4 {
        self.view_projection * self.transform
    }

    /// Draw call for `mesh` carrying this context's target and pipeline state.
    pub fn draw_call(&self, mesh: MeshBufferId) -> DrawCall {
        let mut call = DrawCall::new(mesh);
        call.transform = self.model_view_projection();
        call.render_target = self.render_target;
        call.viewport = self.viewport;
        call.pipeline = PipelineState {
            depth_write: self.depth_write,
            depth_test: self.depth_test,
            wireframe: self.wireframe,
            scissor: self.scissor_test.then_some(self.scissor_rect),
        };
        call
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Vec3;

    #[test]
    fn draw_call_carries_model_view_projection() {
        let ctx = DrawContext {
            transform: Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)),
            view_projection: Mat4::from_scale(Vec3::splat(2.0)),
            ..DrawContext::default()
        };
        let mesh = MeshBufferId::from(crate::device::ResourceId {
            device: crate::device::DeviceId::next(),
            slot: 1,
        });
        let call = ctx.draw_call(mesh);

        assert_eq!(call.transform.transform_point3(Vec3::ZERO), Vec3::new(20.0, 0.0, 0.0));
        assert_eq!(call.mesh_buffer, mesh);
    }

    #[test]
    fn scissor_only_when_enabled() {
        let mut ctx = DrawContext {
            scissor_rect: Rect::new(0.0, 0.0, 4.0, 4.0),
            ..DrawContext::default()
        };
        let mesh = MeshBufferId::from(crate::device::ResourceId {
            device: crate::device::DeviceId::next(),
            slot: 1,
        });
        assert_eq!(ctx.draw_call(mesh).pipeline.scissor, None);

        ctx.scissor_test = true;
        assert_eq!(ctx.draw_call(mesh).pipeline.scissor, Some(Rect::new(0.0, 0.0, 4.0, 4.0)));
    }
}
