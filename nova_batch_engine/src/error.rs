//! Error types for the Nova batch engine
//!
//! This module defines the error types used throughout the engine,
//! including rendering, initialization and effect configuration.

use std::fmt;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Engine errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (Vulkan, wgpu, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (texture pack, buffer, draw record, etc.)
    InvalidResource(String),

    /// Initialization failed (effect, aggregator, texture pack)
    InitializationFailed(String),

    /// Fatal configuration error (malformed material list, missing
    /// frame targets). Indicates a build-time/asset-time mistake and
    /// aborts effect setup.
    Configuration(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::Configuration(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ===== ERROR MACROS =====

/// Log an error with file:line information and produce an
/// [`Error::BackendError`] carrying the same message.
///
/// # Example
///
/// ```ignore
/// device.wait_idle()
///     .map_err(|e| engine_err!("nova::vulkan", "wait idle failed: {:?}", e))?;
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine::Engine::log_detailed(
            $crate::log::LogSeverity::Error,
            $source,
            message.clone(),
            file!(),
            line!(),
        );
        $crate::error::Error::BackendError(message)
    }};
}

/// Log an error and return early with an [`Error::BackendError`].
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

/// Log a configuration error with file:line information and produce an
/// [`Error::Configuration`]. Configuration errors are fatal to effect
/// setup (malformed material lists, missing frame targets).
#[macro_export]
macro_rules! engine_config_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine::Engine::log_detailed(
            $crate::log::LogSeverity::Error,
            $source,
            message.clone(),
            file!(),
            line!(),
        );
        $crate::error::Error::Configuration(message)
    }};
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
