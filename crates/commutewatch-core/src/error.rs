//! Core error types for commutewatch-core.
//!
//! This module defines the error hierarchy using thiserror. Every fallible
//! path in the library resolves to one of these variants so callers can
//! distinguish client mistakes (validation) from collaborator failures
//! (registry, directions).

use thiserror::Error;

/// Core error type for commutewatch-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Subscription registry / event store errors
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Commute lookup errors
    #[error("Directions error: {0}")]
    Directions(#[from] DirectionsError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors (caller-supplied fields)
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Registry-specific errors.
///
/// `get` returning `Ok(None)` means the record is genuinely absent; any of
/// these variants means the answer is unknown and must not be treated as
/// absent (a spurious re-notification would follow).
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Backend could not be reached or opened
    #[error("Registry unavailable: {0}")]
    Unavailable(String),

    /// A query or statement failed
    #[error("Registry query failed: {0}")]
    QueryFailed(String),

    /// Stored record could not be decoded
    #[error("Corrupt record for '{id}': {message}")]
    CorruptRecord { id: String, message: String },
}

/// Commute lookup errors.
#[derive(Error, Debug)]
pub enum DirectionsError {
    /// Transport-level failure (connect, timeout, TLS)
    #[error("Directions request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Service answered with a non-OK status
    #[error("Directions service returned status '{status}'")]
    ServiceStatus { status: String },

    /// No route between the supplied addresses
    #[error("No route found from '{origin}' to '{destination}'")]
    NoRoute { origin: String, destination: String },

    /// Response body did not have the expected shape
    #[error("Malformed directions response: {0}")]
    MalformedResponse(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Missing required environment variable
    #[error("Missing required configuration key: {0}")]
    MissingKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Validation errors for caller-supplied trigger fields.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required field missing from the request
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Field present but unparseable
    #[error("Invalid value for '{field}': {message}")]
    InvalidField { field: String, message: String },

    /// Unknown IANA timezone name
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    /// Window end precedes window start on the same day
    #[error("Window end {end} is earlier than window start {start}; midnight-crossing windows are not supported")]
    WindowOrder { start: String, end: String },
}

impl From<rusqlite::Error> for RegistryError {
    fn from(err: rusqlite::Error) -> Self {
        RegistryError::QueryFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
