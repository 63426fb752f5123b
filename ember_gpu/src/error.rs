//! Error types for the Ember GPU layer
//!
//! Every failure in this crate is logged at its origin (see the `engine_*` macros)
//! and then propagated as one of these variants.

use std::fmt;

/// Result type for Ember operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ember errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Backend-specific error (Vulkan, mock device, ...)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (unknown texture key, bad size, unreadable image, ...)
    InvalidResource(String),

    /// Initialization failed (device, queue, swapchain, fence, ...)
    InitializationFailed(String),

    /// The shader-visible view table has no free slot left
    ViewSlotsExhausted { capacity: u32 },

    /// Operation called outside of its valid frame phase
    InvalidState(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::ViewSlotsExhausted { capacity } => {
                write!(f, "View table exhausted: all {} slots are allocated", capacity)
            }
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
