use super::{Mat4, Rect, Vec3};

/// Axis-aligned bounding box in three dimensions.
///
/// A default box is *empty* (min = +inf, max = -inf) so that inserting the
/// first point produces a degenerate box around it.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Box3 {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Box3 {
    fn default() -> Self {
        Self::empty()
    }
}

impl Box3 {
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    #[inline]
    pub const fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    #[inline]
    pub fn size(self) -> Vec3 {
        if self.is_empty() { Vec3::ZERO } else { self.max - self.min }
    }

    #[inline]
    pub fn insert_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    #[inline]
    pub fn merge(self, other: Box3) -> Box3 {
        Box3::new(self.min.min(other.min), self.max.max(other.max))
    }

    #[inline]
    pub fn contains_point(self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Bounding box of this box after transformation by `m`.
    pub fn transformed(self, m: Mat4) -> Box3 {
        if self.is_empty() {
            return self;
        }

        let mut out = Box3::empty();
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.insert_point(m.transform_point3(corner));
        }
        out
    }

    /// Projection onto the XY plane.
    #[inline]
    pub fn xy_rect(self) -> Rect {
        if self.is_empty() {
            return Rect::default();
        }
        Rect::new(self.min.x, self.min.y, self.max.x - self.min.x, self.max.y - self.min.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_empty_and_grows_from_first_point() {
        let mut b = Box3::default();
        assert!(b.is_empty());
        b.insert_point(Vec3::new(1.0, 2.0, 3.0));
        assert!(!b.is_empty());
        assert_eq!(b.size(), Vec3::ZERO);
    }

    #[test]
    fn transformed_by_translation_moves_bounds() {
        let b = Box3::new(Vec3::ZERO, Vec3::ONE);
        let t = b.transformed(Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)));
        assert_eq!(t.min, Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(t.max, Vec3::new(6.0, 1.0, 1.0));
    }

    #[test]
    fn xy_rect_drops_depth() {
        let b = Box3::new(Vec3::new(-1.0, -2.0, -9.0), Vec3::new(1.0, 2.0, 9.0));
        assert_eq!(b.xy_rect(), Rect::new(-1.0, -2.0, 2.0, 4.0));
    }
}
