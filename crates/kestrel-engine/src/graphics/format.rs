/// Pixel layout of texture storage.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum PixelFormat {
    R8Unorm,
    R8Snorm,
    Rg8Unorm,
    Rg8Snorm,
    #[default]
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Rgba8Snorm,
    Bgra8Unorm,
    R16Float,
    Rg16Float,
    Rgba16Float,
    R32Float,
    Rg32Float,
    Rgba32Float,
    Depth32Float,
}

impl PixelFormat {
    #[inline]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::R8Unorm | Self::R8Snorm => 1,
            Self::Rg8Unorm | Self::Rg8Snorm | Self::R16Float => 2,
            Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Rgba8Snorm
            | Self::Bgra8Unorm
            | Self::Rg16Float
            | Self::R32Float
            | Self::Depth32Float => 4,
            Self::Rgba16Float | Self::Rg32Float => 8,
            Self::Rgba32Float => 16,
        }
    }

    #[inline]
    pub const fn channels(self) -> usize {
        match self {
            Self::R8Unorm | Self::R8Snorm | Self::R16Float | Self::R32Float | Self::Depth32Float => 1,
            Self::Rg8Unorm | Self::Rg8Snorm | Self::Rg16Float | Self::Rg32Float => 2,
            _ => 4,
        }
    }

    #[inline]
    pub const fn is_depth(self) -> bool {
        matches!(self, Self::Depth32Float)
    }

    /// Unsigned 8-bit per channel formats, the ones the CPU mip builder can average.
    #[inline]
    pub const fn is_unorm8(self) -> bool {
        matches!(
            self,
            Self::R8Unorm | Self::Rg8Unorm | Self::Rgba8Unorm | Self::Rgba8UnormSrgb | Self::Bgra8Unorm
        )
    }

    /// Byte length of a tightly packed `width x height` image.
    #[inline]
    pub const fn image_len(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bytes_per_pixel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_len_uses_pixel_size() {
        assert_eq!(PixelFormat::Rgba8Unorm.image_len(4, 2), 32);
        assert_eq!(PixelFormat::R8Unorm.image_len(4, 2), 8);
        assert_eq!(PixelFormat::Rgba32Float.image_len(1, 1), 16);
    }

    #[test]
    fn only_8bit_unsigned_formats_are_box_filterable() {
        assert!(PixelFormat::Rgba8UnormSrgb.is_unorm8());
        assert!(!PixelFormat::Rgba8Snorm.is_unorm8());
        assert!(!PixelFormat::R16Float.is_unorm8());
    }
}
