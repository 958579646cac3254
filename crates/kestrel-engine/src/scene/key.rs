use super::ZIndex;

/// Paint-order key of a recorded draw call.
///
/// Field order is the comparison order: layer z first, then recording order
/// so calls within one layer keep the order they were recorded in.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SortKey {
    pub z: ZIndex,
    pub order: u32,
}

impl SortKey {
    #[inline]
    pub const fn new(z: ZIndex, order: u32) -> Self {
        Self { z, order }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn z_dominates_recording_order() {
        let back_late = SortKey::new(ZIndex(-1), 9);
        let front_early = SortKey::new(ZIndex(3), 0);
        assert!(back_late < front_early);
        assert!(SortKey::new(ZIndex(3), 0) < SortKey::new(ZIndex(3), 1));
    }
}
