use crate::device::DrawCall;

use super::{SortKey, ZIndex};

/// A recorded draw call with its paint-order key.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawItem {
    pub key: SortKey,
    pub call: DrawCall,
}

/// Draw calls recorded for one frame.
///
/// `push` is O(1). Paint-order iteration sorts an index buffer that is kept
/// across frames, so a warmed list does not allocate.
#[derive(Debug, Default)]
pub struct DrawList {
    items: Vec<DrawItem>,
    next_order: u32,

    sorted_indices: Vec<usize>,
    sorted_dirty: bool,
}

impl DrawList {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets recorded calls, keeping capacity.
    pub fn clear(&mut self) {
        self.items.clear();
        self.next_order = 0;
        self.sorted_indices.clear();
        self.sorted_dirty = true;
    }

    /// Recording order.
    #[inline]
    pub fn items(&self) -> &[DrawItem] {
        &self.items
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, z: ZIndex, call: DrawCall) {
        let order = self.next_order;
        self.next_order = self.next_order.wrapping_add(1);
        self.items.push(DrawItem { key: SortKey::new(z, order), call });
        self.sorted_dirty = true;
    }

    /// Back-to-front.
    pub fn iter_in_paint_order(&mut self) -> impl Iterator<Item = &DrawItem> {
        if self.sorted_dirty {
            self.sorted_indices.clear();
            self.sorted_indices.extend(0..self.items.len());
            let items = &self.items;
            self.sorted_indices.sort_unstable_by_key(|&i| items[i].key);
            self.sorted_dirty = false;
        }

        self.sorted_indices.iter().map(|&i| &self.items[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceId, MeshBufferId, ResourceId};

    fn call(slot: u64) -> DrawCall {
        DrawCall::new(MeshBufferId::from(ResourceId { device: DeviceId::next(), slot }))
    }

    fn slots(list: &mut DrawList) -> Vec<u64> {
        list.iter_in_paint_order().map(|i| i.call.mesh_buffer.raw().slot).collect()
    }

    // ── ordering ──────────────────────────────────────────────────────────

    #[test]
    fn paint_order_is_z_then_recording_order() {
        let mut list = DrawList::new();
        list.push(ZIndex(1), call(1));
        list.push(ZIndex(0), call(2));
        list.push(ZIndex(1), call(3));
        list.push(ZIndex(0), call(4));

        assert_eq!(slots(&mut list), vec![2, 4, 1, 3]);
    }

    #[test]
    fn clear_resets_order() {
        let mut list = DrawList::new();
        list.push(ZIndex(0), call(1));
        list.clear();
        assert!(list.is_empty());
        list.push(ZIndex(0), call(2));
        assert_eq!(list.items()[0].key.order, 0);
    }
}
