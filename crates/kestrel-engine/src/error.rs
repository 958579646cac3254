//! Error types.
//!
//! Every fallible operation of the public API returns [`Result<T>`], an alias
//! for `std::result::Result<T, Error>`.
//!
//! The variants fall into three groups:
//! - validation errors: a front-end call was rejected before any state changed
//! - decode errors: an image could not be loaded, nothing was created
//! - platform errors: the window/GPU layer failed to start
//!
//! Failures that happen while the device thread executes a command never reach
//! the caller. They are logged there and use [`crate::device::DeviceError`].

use std::path::PathBuf;

use thiserror::Error;

use crate::device::DeviceId;

#[derive(Error, Debug)]
pub enum Error {
    // ── validation ────────────────────────────────────────────────────────
    /// Width or height is zero, negative or not finite.
    #[error("invalid size {width}x{height}")]
    InvalidSize { width: f32, height: f32 },

    #[error("mip level count must be at least 1")]
    InvalidMipLevels,

    #[error("sample count must be at least 1")]
    InvalidSampleCount,

    /// Pixel or buffer payload does not match the declared layout.
    #[error("data length mismatch: expected {expected} bytes, got {actual}")]
    DataLengthMismatch { expected: usize, actual: usize },

    #[error("index size must be 2 or 4 bytes, got {0}")]
    InvalidIndexSize(u32),

    #[error("mesh buffer needs at least one vertex attribute")]
    EmptyVertexAttributes,

    #[error("vertex attribute component count must be 1 to 4, got {0}")]
    InvalidComponentCount(u8),

    /// A resource created on one device was handed to another.
    #[error("resource belongs to device {actual}, expected device {expected}")]
    ForeignResource { expected: DeviceId, actual: DeviceId },

    #[error("buffer is not dynamic and cannot be updated after init")]
    BufferNotDynamic,

    #[error("buffer has not been initialized")]
    BufferNotInitialized,

    #[error("mip level list is empty")]
    EmptyMipLevels,

    /// A level of an uploaded chain is not half the size of the one above it.
    #[error("mip level {level} is {width}x{height}, expected {expected_width}x{expected_height}")]
    InvalidMipChain { level: u32, width: u32, height: u32, expected_width: u32, expected_height: u32 },

    #[error("{count} mip levels exceed the {max} levels of a full chain")]
    TooManyMipLevels { count: u32, max: u32 },

    /// A scene key that was never created or has been destroyed.
    #[error("unknown {0} in scene")]
    UnknownSceneObject(&'static str),

    #[error("reparenting would make an actor its own ancestor")]
    HierarchyCycle,

    // ── decode ────────────────────────────────────────────────────────────
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ── platform ──────────────────────────────────────────────────────────
    #[error("platform error: {0}")]
    Platform(String),

    #[error("failed to spawn device thread: {0}")]
    DeviceThread(String),
}

/// Alias for `Result<T, kestrel_engine::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for errors raised by synchronous argument checks.
    pub fn is_validation(&self) -> bool {
        !matches!(
            self,
            Error::Decode { .. } | Error::Io(_) | Error::Platform(_) | Error::DeviceThread(_)
        )
    }
}
