//! Color model shared by textures, clear operations and scene components.

pub mod color;

pub use color::Color;
