use thiserror::Error;

use super::ResourceKey;

/// Failure raised while the device thread executes a command.
///
/// These never cross back to the application thread: the worker logs them,
/// counts them in [`super::DeviceStats`] and keeps the last-good resource state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// The command names a resource that was never created or already released.
    #[error("unknown resource {0}")]
    UnknownResource(ResourceKey),

    #[error("resource {0} already exists")]
    DuplicateResource(ResourceKey),

    /// The command is well-formed but not valid for the resource's current state.
    #[error("invalid operation on {key}: {reason}")]
    InvalidOperation { key: ResourceKey, reason: String },

    /// The backend rejected the operation.
    #[error("backend failure: {0}")]
    Backend(String),

    #[error("surface lost")]
    SurfaceLost,
}

pub type DeviceResult<T> = std::result::Result<T, DeviceError>;
