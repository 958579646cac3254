use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Identifies one render device instance.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct DeviceId(u32);

impl DeviceId {
    /// Returns a process-unique id for a newly created device.
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `(device, slot)` pair naming a back-end resource.
///
/// Slots are never reused within a device, so a stale id can be detected by a
/// plain table lookup.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
    pub device: DeviceId,
    pub slot: u64,
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device, self.slot)
    }
}

macro_rules! resource_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
        pub struct $name(ResourceId);

        impl $name {
            #[inline]
            pub const fn raw(self) -> ResourceId {
                self.0
            }

            #[inline]
            pub const fn device(self) -> DeviceId {
                self.0.device
            }
        }

        impl From<ResourceId> for $name {
            #[inline]
            fn from(id: ResourceId) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

resource_id!(
    /// Back-end texture handle.
    TextureId, "texture"
);
resource_id!(
    /// Back-end index or vertex buffer handle.
    BufferId, "buffer"
);
resource_id!(
    /// Back-end mesh buffer (index + vertex binding) handle.
    MeshBufferId, "mesh_buffer"
);

/// Any resource id, used by release commands.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ResourceKey {
    Texture(TextureId),
    Buffer(BufferId),
    MeshBuffer(MeshBufferId),
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Texture(id) => id.fmt(f),
            Self::Buffer(id) => id.fmt(f),
            Self::MeshBuffer(id) => id.fmt(f),
        }
    }
}

/// Lock-free slot allocator owned by a device, callable from any thread.
#[derive(Debug)]
pub(crate) struct IdAllocator {
    device: DeviceId,
    next: AtomicU64,
}

impl IdAllocator {
    pub(crate) fn new(device: DeviceId) -> Self {
        Self { device, next: AtomicU64::new(1) }
    }

    pub(crate) fn allocate<T: From<ResourceId>>(&self) -> T {
        let slot = self.next.fetch_add(1, Ordering::Relaxed);
        T::from(ResourceId { device: self.device, slot })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocated_ids_are_unique_and_tagged_with_device() {
        let device = DeviceId::next();
        let alloc = IdAllocator::new(device);

        let a: TextureId = alloc.allocate();
        let b: BufferId = alloc.allocate();

        assert_eq!(a.device(), device);
        assert_ne!(a.raw().slot, b.raw().slot);
    }

    #[test]
    fn devices_get_distinct_ids() {
        assert_ne!(DeviceId::next(), DeviceId::next());
    }

    #[test]
    fn display_includes_kind() {
        let alloc = IdAllocator::new(DeviceId(7));
        let id: MeshBufferId = alloc.allocate();
        assert_eq!(id.to_string(), "mesh_buffer#7:1");
    }
}
