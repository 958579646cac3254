use crate::coords::{Mat4, Rect, Vec2};
use crate::device::TextureId;

use super::DrawContext;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Projection {
    /// Top-left origin, y down. `size: None` spans the viewport in pixels.
    Orthographic { size: Option<Vec2>, near: f32, far: f32 },
    /// Vertical field of view in radians; aspect comes from the viewport.
    Perspective { fov_y: f32, near: f32, far: f32 },
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Orthographic { size: None, near: -1000.0, far: 1000.0 }
    }
}

impl Projection {
    pub fn matrix(self, viewport: Rect) -> Mat4 {
        match self {
            Projection::Orthographic { size, near, far } => {
                let size = size.unwrap_or(viewport.size);
                Mat4::orthographic_rh(0.0, size.x, size.y, 0.0, near, far)
            }
            Projection::Perspective { fov_y, near, far } => {
                let aspect = if viewport.size.y > 0.0 { viewport.size.x / viewport.size.y } else { 1.0 };
                Mat4::perspective_rh(fov_y, aspect, near, far)
            }
        }
    }
}

/// Camera component data. The view matrix follows the owning actor.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub projection: Projection,
    /// `None` uses the viewport of the frame being drawn.
    pub viewport: Option<Rect>,
    /// `None` renders into the frame's target.
    pub render_target: Option<TextureId>,
    view: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Projection::default())
    }
}

impl Camera {
    pub fn new(projection: Projection) -> Self {
        Self { projection, viewport: None, render_target: None, view: Mat4::IDENTITY }
    }

    pub fn with_viewport(mut self, viewport: Rect) -> Self {
        self.viewport = Some(viewport);
        self
    }

    pub fn with_render_target(mut self, target: TextureId) -> Self {
        self.render_target = Some(target);
        self
    }

    /// Inverse of the actor's world transform.
    #[inline]
    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn view_projection(&self, viewport: Rect) -> Mat4 {
        self.projection.matrix(viewport) * self.view
    }

    pub(crate) fn update_transform(&mut self, world: Mat4) {
        self.view = world.inverse();
    }

    /// Context for drawing a layer through this camera.
    pub fn context(&self, base: &DrawContext) -> DrawContext {
        let viewport = self.viewport.unwrap_or(base.viewport);
        DrawContext {
            view_projection: self.view_projection(viewport),
            viewport,
            render_target: self.render_target.or(base.render_target),
            ..base.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{Vec3, Vec4};

    fn clip(m: Mat4, p: Vec3) -> Vec2 {
        let c: Vec4 = m * p.extend(1.0);
        Vec2::new(c.x / c.w, c.y / c.w)
    }

    #[test]
    fn default_ortho_maps_viewport_pixels_to_clip_space() {
        let camera = Camera::default();
        let vp = camera.view_projection(Rect::new(0.0, 0.0, 200.0, 100.0));

        assert!(clip(vp, Vec3::ZERO).abs_diff_eq(Vec2::new(-1.0, 1.0), 1e-5));
        assert!(clip(vp, Vec3::new(200.0, 100.0, 0.0)).abs_diff_eq(Vec2::new(1.0, -1.0), 1e-5));
    }

    #[test]
    fn view_follows_actor_transform() {
        let mut camera = Camera::default();
        camera.update_transform(Mat4::from_translation(Vec3::new(100.0, 0.0, 0.0)));
        let vp = camera.view_projection(Rect::new(0.0, 0.0, 200.0, 100.0));

        assert!(clip(vp, Vec3::new(100.0, 0.0, 0.0)).abs_diff_eq(Vec2::new(-1.0, 1.0), 1e-5));
    }

    #[test]
    fn perspective_uses_viewport_aspect() {
        let p = Projection::Perspective { fov_y: 1.0, near: 0.1, far: 100.0 };
        let wide = p.matrix(Rect::new(0.0, 0.0, 200.0, 100.0));
        let square = p.matrix(Rect::new(0.0, 0.0, 100.0, 100.0));
        assert!((square.x_axis.x / wide.x_axis.x - 2.0).abs() < 1e-5);
    }

    #[test]
    fn context_overrides_viewport_and_target_only_when_set() {
        let base = DrawContext::for_viewport(Rect::new(0.0, 0.0, 64.0, 64.0));
        let ctx = Camera::default().context(&base);
        assert_eq!(ctx.viewport, base.viewport);
        assert_eq!(ctx.render_target, None);

        let ctx = Camera::default().with_viewport(Rect::new(0.0, 0.0, 32.0, 32.0)).context(&base);
        assert_eq!(ctx.viewport, Rect::new(0.0, 0.0, 32.0, 32.0));
    }
}
