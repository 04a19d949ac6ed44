//! Error type shared by the runtime, the FIFOs and module implementations.

use thiserror::Error;

/// Errors returned by lifecycle calls, data calls and module entry points.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// A parameter failed validation, or the handle is not open.
    #[error("invalid parameter")]
    InvalidParameter,

    /// The call is not allowed for the module's type or current state.
    #[error("operation not supported in the current state")]
    NotSupported,

    /// The handle, connection or state is already in the requested form.
    #[error("already initialized")]
    AlreadyInit,

    /// No free FIFO slot or slab block was available.
    #[error("no memory available")]
    NoMemory,

    /// Nothing arrived before the timeout expired.
    #[error("timed out")]
    Timeout,

    /// The data was rejected as malformed.
    #[error("data refused")]
    Refused,

    /// The requested capability is not implemented by the module.
    #[error("not implemented")]
    NotImplemented,

    /// The worker thread could not be created.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

impl ModuleError {
    /// Wire-equivalent negative POSIX error code.
    pub fn errno(&self) -> i32 {
        match self {
            ModuleError::InvalidParameter => -22,
            ModuleError::NotSupported => -95,
            ModuleError::AlreadyInit => -114,
            ModuleError::NoMemory => -12,
            ModuleError::Timeout => -11,
            ModuleError::Refused => -74,
            ModuleError::NotImplemented => -38,
            ModuleError::Spawn(err) => err.raw_os_error().map_or(-5, |code| -code),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, ModuleError>;
