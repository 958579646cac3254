//! Coordinate and geometry types shared across the resource and scene layers.
//!
//! Vector, quaternion and matrix math comes from `glam`. This module adds the
//! engine's own size, rectangle and bounding-volume types on top of it.
//!
//! Conventions:
//! - sizes are in logical units unless a field says otherwise
//! - rectangles are axis-aligned with a bottom-left origin
//! - bounding boxes are expressed in the owning component's local space

mod bounds;
mod rect;
mod size;

pub use bounds::Box3;
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
pub use rect::Rect;
pub use size::Size2;
