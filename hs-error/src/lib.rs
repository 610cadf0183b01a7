//! Unified error handling for hddsaver
//!
//! This crate provides the single error type used by the Super-I/O protocol
//! layer, the device lifecycle and the command line front end. Every variant
//! maps onto a negative errno so the host adapter can hand a kernel-style
//! status back to whoever invoked it.

use std::io;
use std::path::PathBuf;

/// Result type alias using HddSaverError
pub type Result<T> = std::result::Result<T, HddSaverError>;

/// Unified error type for all hddsaver operations
#[derive(thiserror::Error, Debug)]
pub enum HddSaverError {
    // ============================================================================
    // Bus and Device Errors
    // ============================================================================
    #[error("I/O ports {start:#x}..={end:#x} are busy")]
    Busy {
        start: u16,
        end: u16,
    },

    #[error("Device not found: {0}")]
    NotFound(String),

    #[error("Unsupported chip: {0}")]
    Unsupported(String),

    #[error("Out of resources: {0}")]
    OutOfResources(String),

    // ============================================================================
    // Request Errors
    // ============================================================================
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    // ============================================================================
    // I/O and Configuration Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl HddSaverError {
    /// Busy error for a port range of `len` ports starting at `start`
    pub fn busy(start: u16, len: u16) -> Self {
        Self::Busy {
            start,
            end: start.saturating_add(len.saturating_sub(1)),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for errors a caller may retry after a short delay
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }

    /// Negative errno for host interfaces that report kernel-style status codes
    pub fn errno(&self) -> i32 {
        let code = match self {
            Self::Busy { .. } => libc::EBUSY,
            Self::NotFound(_) => libc::ENODEV,
            Self::Unsupported(_) => libc::ENODEV,
            Self::OutOfResources(_) => libc::ENOMEM,
            Self::InvalidInput(_) => libc::EINVAL,
            Self::PermissionDenied(_) => libc::EACCES,
            Self::Io(e) | Self::Open { source: e, .. } => e.raw_os_error().unwrap_or(libc::EIO),
            Self::Config(_) | Self::JsonParse(_) => libc::EINVAL,
        };
        -code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_range_display() {
        let err = HddSaverError::busy(0x2e, 2);
        assert_eq!(err.to_string(), "I/O ports 0x2e..=0x2f are busy");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_errno_mapping() {
        assert_eq!(HddSaverError::busy(0x295, 2).errno(), -libc::EBUSY);
        assert_eq!(HddSaverError::invalid_input("x").errno(), -libc::EINVAL);
        assert_eq!(HddSaverError::not_found("x").errno(), -libc::ENODEV);
        assert_eq!(HddSaverError::OutOfResources("x".into()).errno(), -libc::ENOMEM);
    }

    #[test]
    fn test_io_errno_passthrough() {
        let err = HddSaverError::from(io::Error::from_raw_os_error(libc::EPERM));
        assert_eq!(err.errno(), -libc::EPERM);
        assert!(!err.is_retryable());
    }
}
