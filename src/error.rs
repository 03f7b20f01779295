//! Error types and handling for Helios
//!
//! This module defines the error types used throughout the application,
//! providing consistent error handling and reporting.

use thiserror::Error;

/// Result type alias for Helios operations
pub type Result<T> = std::result::Result<T, HeliosError>;

/// Main error type for Helios
#[derive(Debug, Error)]
pub enum HeliosError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Serial link errors (port setup, byte-level transfer)
    #[error("Serial error: {message}")]
    Serial { message: String },

    /// No response within the configured window
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Frame received but its checksum does not match
    #[error("CRC mismatch: computed {computed:#06x}, received {received:#06x}")]
    CrcMismatch { computed: u16, received: u16 },

    /// Device explicitly rejected the request
    #[error("Exception response from device: code {code:#04x}")]
    ExceptionResponse { code: u8 },

    /// Frame too short or internally inconsistent
    #[error("Malformed frame: {message}")]
    Malformed { message: String },

    /// A register read failed while assembling a telemetry snapshot
    #[error("Telemetry acquisition failed: {message}")]
    Acquisition { message: String },

    /// Charge point communication errors
    #[error("Charger error: {message}")]
    Charger { message: String },

    /// Storage collaborator errors
    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl HeliosError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        HeliosError::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        HeliosError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        HeliosError::Io {
            message: message.into(),
        }
    }

    /// Create a new serial link error
    pub fn serial<S: Into<String>>(message: S) -> Self {
        HeliosError::Serial {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        HeliosError::Timeout {
            message: message.into(),
        }
    }

    /// Create a new malformed-frame error
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        HeliosError::Malformed {
            message: message.into(),
        }
    }

    /// Create a new acquisition error
    pub fn acquisition<S: Into<String>>(message: S) -> Self {
        HeliosError::Acquisition {
            message: message.into(),
        }
    }

    /// Create a new charger error
    pub fn charger<S: Into<String>>(message: S) -> Self {
        HeliosError::Charger {
            message: message.into(),
        }
    }

    /// Create a new storage error
    pub fn storage<S: Into<String>>(message: S) -> Self {
        HeliosError::Storage {
            message: message.into(),
        }
    }

    /// Whether this error belongs to the serial protocol taxonomy
    /// (the failures that abort a telemetry acquisition).
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            HeliosError::Timeout { .. }
                | HeliosError::CrcMismatch { .. }
                | HeliosError::ExceptionResponse { .. }
                | HeliosError::Malformed { .. }
        )
    }
}

impl From<std::io::Error> for HeliosError {
    fn from(err: std::io::Error) -> Self {
        HeliosError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for HeliosError {
    fn from(err: serde_yaml::Error) -> Self {
        HeliosError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for HeliosError {
    fn from(err: serde_json::Error) -> Self {
        HeliosError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<tokio_serial::Error> for HeliosError {
    fn from(err: tokio_serial::Error) -> Self {
        HeliosError::serial(err.to_string())
    }
}

impl From<reqwest::Error> for HeliosError {
    fn from(err: reqwest::Error) -> Self {
        HeliosError::charger(err.to_string())
    }
}
