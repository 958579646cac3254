/// Straight-alpha RGBA color with linear `f32` channels in `[0, 1]`.
///
/// Clear colors, sprite tints and vertex colors all use this type. Renderers
/// that blend with premultiplied alpha convert through [`Color::premultiplied`].
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);

    #[inline]
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Creates a color from 8-bit channels (`0`–`255`).
    #[inline]
    pub fn from_u8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::rgba(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, a as f32 / 255.0)
    }

    /// Creates a color from a packed `0xRRGGBBAA` value.
    #[inline]
    pub fn from_hex(rgba: u32) -> Self {
        let [r, g, b, a] = rgba.to_be_bytes();
        Self::from_u8(r, g, b, a)
    }

    /// Returns the channels as 8-bit values, rounding to nearest.
    #[inline]
    pub fn to_u8(self) -> [u8; 4] {
        let c = self.clamped();
        let q = |v: f32| (v * 255.0 + 0.5) as u8;
        [q(c.r), q(c.g), q(c.b), q(c.a)]
    }

    /// Premultiplied representation `[r*a, g*a, b*a, a]`.
    #[inline]
    pub fn premultiplied(self) -> [f32; 4] {
        let c = self.clamped();
        [c.r * c.a, c.g * c.a, c.b * c.a, c.a]
    }

    /// Scales alpha by `opacity`, used when a parent actor fades its children.
    #[inline]
    pub fn with_opacity(self, opacity: f32) -> Self {
        Self { a: self.a * opacity.clamp(0.0, 1.0), ..self }
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite() && self.a.is_finite()
    }

    /// Clamps all channels to [0, 1].
    #[inline]
    pub fn clamped(self) -> Self {
        Self {
            r: self.r.clamp(0.0, 1.0),
            g: self.g.clamp(0.0, 1.0),
            b: self.b.clamp(0.0, 1.0),
            a: self.a.clamp(0.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_unpacks_in_rgba_order() {
        let c = Color::from_hex(0xff000080);
        assert_eq!(c.to_u8(), [255, 0, 0, 128]);
    }

    #[test]
    fn premultiplied_scales_rgb_by_alpha() {
        let p = Color::rgba(1.0, 0.5, 0.0, 0.5).premultiplied();
        assert_eq!(p, [0.5, 0.25, 0.0, 0.5]);
    }

    #[test]
    fn opacity_only_touches_alpha() {
        let c = Color::WHITE.with_opacity(0.25);
        assert_eq!(c, Color::rgba(1.0, 1.0, 1.0, 0.25));
    }
}
