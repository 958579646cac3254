/// Two-dimensional extent.
///
/// Used both for logical window sizes and for pixel dimensions of textures and
/// back buffers. Pixel users convert through [`Size2::to_extent`].
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Size2 {
    pub width: f32,
    pub height: f32,
}

impl Size2 {
    #[inline]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub const fn zero() -> Self {
        Self { width: 0.0, height: 0.0 }
    }

    #[inline]
    pub fn area(self) -> f32 {
        self.width * self.height
    }

    /// True when either dimension is zero, negative or not finite.
    #[inline]
    pub fn is_empty(self) -> bool {
        !(self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite())
    }

    /// Scales both dimensions, e.g. logical size to physical resolution.
    #[inline]
    pub fn scaled(self, factor: f32) -> Self {
        Self::new(self.width * factor, self.height * factor)
    }

    /// Rounds to whole pixels. Negative and non-finite values clamp to zero.
    #[inline]
    pub fn to_extent(self) -> (u32, u32) {
        fn px(v: f32) -> u32 {
            if v.is_finite() && v > 0.0 { v.round() as u32 } else { 0 }
        }
        (px(self.width), px(self.height))
    }

    #[inline]
    pub fn from_extent(width: u32, height: u32) -> Self {
        Self::new(width as f32, height as f32)
    }
}
