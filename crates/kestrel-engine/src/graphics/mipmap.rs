use crate::error::{Error, Result};

use super::{MipLevel, PixelFormat};

/// Level count of a full chain for a `width` x `height` base, down to 1x1.
pub fn max_levels(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Extent of mip `level` of a `width` x `height` base. `level` must be below
/// [`max_levels`].
pub fn level_extent(width: u32, height: u32, level: u32) -> (u32, u32) {
    ((width >> level).max(1), (height >> level).max(1))
}

/// Checks that `levels` is the head of the mip chain of its first level and
/// that each level holds exactly its pixels in `format`.
pub fn validate_levels(format: PixelFormat, levels: &[MipLevel]) -> Result<()> {
    let Some(base) = levels.first() else {
        return Err(Error::EmptyMipLevels);
    };
    if base.width == 0 || base.height == 0 {
        return Err(Error::InvalidSize { width: base.width as f32, height: base.height as f32 });
    }

    let max = max_levels(base.width, base.height);
    let count = u32::try_from(levels.len()).unwrap_or(u32::MAX);
    if count > max {
        return Err(Error::TooManyMipLevels { count, max });
    }

    for (level, mip) in (0u32..).zip(levels) {
        let (expected_width, expected_height) = level_extent(base.width, base.height, level);
        if (mip.width, mip.height) != (expected_width, expected_height) {
            return Err(Error::InvalidMipChain {
                level,
                width: mip.width,
                height: mip.height,
                expected_width,
                expected_height,
            });
        }
        let expected = format.image_len(mip.width, mip.height);
        if mip.data.len() != expected {
            return Err(Error::DataLengthMismatch { expected, actual: mip.data.len() });
        }
    }
    Ok(())
}

/// Builds a mip chain from `base` with a 2x2 box filter.
///
/// Stops at 1x1 or after `max_levels` levels, whichever comes first. The
/// returned vector starts with a copy of `base`. Only meaningful for formats
/// where [`PixelFormat::is_unorm8`] holds.
pub fn generate_chain(format: PixelFormat, base: &MipLevel, max_levels: u32) -> Vec<MipLevel> {
    let bpp = format.bytes_per_pixel();
    let mut levels = vec![base.clone()];

    while (levels.len() as u32) < max_levels {
        let prev = &levels[levels.len() - 1];
        if prev.width <= 1 && prev.height <= 1 {
            break;
        }
        let next = downsample(prev, bpp);
        levels.push(next);
    }

    levels
}

/// Halves both dimensions (minimum 1), averaging each 2x2 footprint.
/// Odd edges reuse the last row/column.
fn downsample(src: &MipLevel, bpp: usize) -> MipLevel {
    let width = (src.width / 2).max(1);
    let height = (src.height / 2).max(1);
    let src_w = src.width as usize;
    let mut data = vec![0u8; width as usize * height as usize * bpp];

    for y in 0..height as usize {
        let y0 = (y * 2).min(src.height as usize - 1);
        let y1 = (y * 2 + 1).min(src.height as usize - 1);

        for x in 0..width as usize {
            let x0 = (x * 2).min(src_w - 1);
            let x1 = (x * 2 + 1).min(src_w - 1);

            for c in 0..bpp {
                let px = |xx: usize, yy: usize| src.data[(yy * src_w + xx) * bpp + c] as u32;
                let sum = px(x0, y0) + px(x1, y0) + px(x0, y1) + px(x1, y1);
                data[(y * width as usize + x) * bpp + c] = ((sum + 2) / 4) as u8;
            }
        }
    }

    MipLevel { width, height, data }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(width: u32, height: u32, fill: impl Fn(u32, u32) -> [u8; 4]) -> MipLevel {
        let mut data = Vec::new();
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&fill(x, y));
            }
        }
        MipLevel { width, height, data }
    }

    // ── chain validation ──────────────────────────────────────────────────

    #[test]
    fn full_chain_length() {
        assert_eq!(max_levels(1, 1), 1);
        assert_eq!(max_levels(8, 4), 4);
        assert_eq!(max_levels(5, 3), 3);
        assert_eq!(level_extent(8, 4, 3), (1, 1));
    }

    #[test]
    fn generated_chain_is_valid() {
        let base = level(8, 2, |_, _| [1; 4]);
        let chain = generate_chain(PixelFormat::Rgba8Unorm, &base, 16);
        assert!(validate_levels(PixelFormat::Rgba8Unorm, &chain).is_ok());
    }

    #[test]
    fn repeated_level_size_is_rejected() {
        let chain = [level(2, 2, |_, _| [0; 4]), level(2, 2, |_, _| [0; 4])];
        let err = validate_levels(PixelFormat::Rgba8Unorm, &chain).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidMipChain { level: 1, width: 2, height: 2, expected_width: 1, expected_height: 1 }
        ));
    }

    #[test]
    fn chain_longer_than_full_is_rejected() {
        let chain = [level(2, 1, |_, _| [0; 4]), level(1, 1, |_, _| [0; 4]), level(1, 1, |_, _| [0; 4])];
        let err = validate_levels(PixelFormat::Rgba8Unorm, &chain).unwrap_err();
        assert!(matches!(err, Error::TooManyMipLevels { count: 3, max: 2 }));
    }

    #[test]
    fn level_payload_must_match_extent() {
        let mut chain = vec![level(2, 2, |_, _| [0; 4]), level(1, 1, |_, _| [0; 4])];
        chain[1].data.pop();
        let err = validate_levels(PixelFormat::Rgba8Unorm, &chain).unwrap_err();
        assert!(matches!(err, Error::DataLengthMismatch { expected: 4, actual: 3 }));
    }

    // ── generation ────────────────────────────────────────────────────────

    #[test]
    fn full_chain_down_to_one_pixel() {
        let base = level(8, 4, |_, _| [10, 20, 30, 255]);
        let chain = generate_chain(PixelFormat::Rgba8Unorm, &base, 16);

        let dims: Vec<_> = chain.iter().map(|l| (l.width, l.height)).collect();
        assert_eq!(dims, vec![(8, 4), (4, 2), (2, 1), (1, 1)]);
        assert_eq!(chain[3].data, vec![10, 20, 30, 255]);
    }

    #[test]
    fn chain_respects_level_limit() {
        let base = level(16, 16, |_, _| [0; 4]);
        assert_eq!(generate_chain(PixelFormat::Rgba8Unorm, &base, 2).len(), 2);
    }

    #[test]
    fn box_filter_averages_footprint() {
        let base = level(2, 2, |x, y| if (x + y) % 2 == 0 { [0, 0, 0, 0] } else { [200, 100, 50, 255] });
        let chain = generate_chain(PixelFormat::Rgba8Unorm, &base, 2);
        assert_eq!(chain[1].data, vec![100, 50, 25, 128]);
    }

    #[test]
    fn odd_width_reuses_edge_column() {
        let base = level(3, 1, |x, _| [x as u8 * 10, 0, 0, 0]);
        let chain = generate_chain(PixelFormat::Rgba8Unorm, &base, 2);
        assert_eq!((chain[1].width, chain[1].height), (1, 1));
        assert_eq!(chain[1].data[0], 5);
    }
}
