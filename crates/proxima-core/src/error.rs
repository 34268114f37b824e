//! Unified error types for the proxima core library.
//!
//! [`ProximaError`] covers every failure mode a caller of the hub can
//! observe. Configuration loading reports through its own [`ConfigError`].
//!
//! - **Validation**: a producer or viewer sent something malformed. Nothing
//!   was mutated and the caller should fix the request.
//! - **Unavailable**: the hub is shutting down and refuses new viewers.
//! - **Internal**: an event could not be encoded. Details are for logs only.
//!
//! # Example
//!
//! ```rust
//! use proxima_core::error::{ProximaError, Result};
//!
//! fn require_address(address: Option<&str>) -> Result<&str> {
//!     address.ok_or_else(|| ProximaError::InvalidReading {
//!         index: 0,
//!         reason: "address is required".into(),
//!     })
//! }
//! ```
//!
//! [`ConfigError`]: crate::config::ConfigError

use thiserror::Error;

/// The unified error type for all proxima operations.
#[derive(Debug, Error)]
pub enum ProximaError {
    // =========================================================================
    // VALIDATION ERRORS
    // =========================================================================
    /// A hardware address did not match the `XX:XX:XX:XX:XX:XX` format.
    #[error("Invalid device address: '{0}'. Expected format XX:XX:XX:XX:XX:XX (hex digits).")]
    InvalidAddress(String),

    /// One reading inside a submitted batch was malformed.
    ///
    /// The whole batch is rejected when this occurs.
    #[error("Invalid reading at index {index}: {reason}")]
    InvalidReading {
        /// Position of the offending reading in the batch.
        index: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// A producer-reported notification was malformed.
    #[error("Invalid notification: {0}")]
    InvalidNotification(String),

    // =========================================================================
    // AVAILABILITY ERRORS
    // =========================================================================
    /// Shutdown has begun; no new viewers are accepted.
    #[error("Server is shutting down")]
    ShuttingDown,

    // =========================================================================
    // INTERNAL ERRORS
    // =========================================================================
    /// An outbound event could not be encoded.
    #[error("Failed to serialize event: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A specialized [`Result`] type for proxima operations.
pub type Result<T> = std::result::Result<T, ProximaError>;

impl ProximaError {
    /// Returns `true` if the caller sent a malformed request.
    #[inline]
    #[must_use]
    pub const fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAddress(_) | Self::InvalidReading { .. } | Self::InvalidNotification(_)
        )
    }

    /// Returns an HTTP-appropriate status code for this error.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidAddress(_) | Self::InvalidReading { .. } | Self::InvalidNotification(_) => {
                400
            }
            Self::ShuttingDown => 503,
            Self::Serialization(_) => 500,
        }
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAddress(_) => "invalid_address",
            Self::InvalidReading { .. } => "invalid_reading",
            Self::InvalidNotification(_) => "invalid_notification",
            Self::ShuttingDown => "shutting_down",
            Self::Serialization(_) => "serialization_error",
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
