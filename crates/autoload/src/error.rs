//! Error types for module resolution, loading, and registration.

use std::{io, result::Result as StdResult};

use thiserror::Error;

/// Convenient result type for the autoload crate.
pub type Result<T> = StdResult<T, Error>;

/// A module identifier could not be imported.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Failed to import module {identifier}: {message}")]
pub struct ImportError {
    /// Identifier that was requested from the importer.
    pub identifier: String,
    /// Human-readable reason reported by the importer.
    pub message: String,
}

impl ImportError {
    /// Construct an import error for `identifier`.
    pub fn new(identifier: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            message: message.into(),
        }
    }
}

/// The registry refused a definition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Failed to register {name}: {message}")]
pub struct RegistrationError {
    /// Declared name passed to `register`.
    pub name: String,
    /// Human-readable reason reported by the registry.
    pub message: String,
}

impl RegistrationError {
    /// Construct a registration error for `name`.
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Unified error type for the autoloader.
#[derive(Debug, Error)]
pub enum Error {
    /// Dynamic import of a module failed.
    #[error(transparent)]
    Import(#[from] ImportError),

    /// The registry rejected a loaded definition.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// A mutation subscription could not be established.
    #[error("Mutation observer error: {0}")]
    Observe(String),

    /// Invalid or unreadable configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// I/O failure while reading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A single load task failed; carries the declared name for context.
#[derive(Debug, Error)]
#[error("Failed to autoload controller: {name}")]
pub struct LoadFailure {
    /// Declared name as it appeared in the attribute value.
    pub name: String,
    /// Module identifier the name resolved to.
    pub identifier: String,
    /// Underlying import or registration error.
    #[source]
    pub cause: Error,
}
