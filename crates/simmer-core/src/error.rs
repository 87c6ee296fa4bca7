//! Core error types for simmer-core.
//!
//! This module defines the error hierarchy using thiserror. Operations that
//! hit a record in a state that forbids them (pausing an absent timer,
//! writing an inconsistent snapshot) fail with [`CoreError::InvalidState`]
//! and are never retried; a cancelled engine loop surfaces as
//! [`CoreError::Cancelled`], which callers treat as a clean exit.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for simmer-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// An operation was attempted against a timer in a state that forbids it.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The engine loop's hosting task was cancelled. Expected during
    /// shutdown; not an error condition.
    #[error("countdown loop cancelled")]
    Cancelled,

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Empty collection
    #[error("Empty collection: {0}")]
    EmptyCollection(String),
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CoreError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        CoreError::Custom(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
