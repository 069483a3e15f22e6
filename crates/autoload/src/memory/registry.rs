//! In-memory registry recording registrations and logged errors.

use std::collections::HashSet;

use parking_lot::Mutex;
use tracing::{error, trace};

use crate::{Definition, Error, RegistrationError, Registry};

/// One `log_error` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedError {
    /// Top-level message.
    pub message: String,
    /// Rendered causes.
    pub causes: Vec<String>,
}

/// Registry that keeps everything it is handed.
#[derive(Default)]
pub struct MemoryRegistry {
    /// Registrations in call order; re-registration appends.
    registrations: Mutex<Vec<(String, Definition)>>,
    /// Logged failures in call order.
    errors: Mutex<Vec<LoggedError>>,
    /// Names `register` refuses.
    rejected: Mutex<HashSet<String>>,
}

impl MemoryRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse future registrations of `name`.
    pub fn reject(&self, name: impl Into<String>) {
        self.rejected.lock().insert(name.into());
    }

    /// Registered names in call order, duplicates included.
    pub fn registered_names(&self) -> Vec<String> {
        self.registrations
            .lock()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Number of times `name` was registered.
    pub fn registration_count(&self, name: &str) -> usize {
        self.registrations
            .lock()
            .iter()
            .filter(|(n, _)| n == name)
            .count()
    }

    /// Most recent definition registered under `name`.
    pub fn definition(&self, name: &str) -> Option<Definition> {
        self.registrations
            .lock()
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, def)| def.clone())
    }

    /// Logged failures in call order.
    pub fn errors(&self) -> Vec<LoggedError> {
        self.errors.lock().clone()
    }
}

impl Registry for MemoryRegistry {
    fn register(&self, name: &str, definition: Definition) -> Result<(), RegistrationError> {
        if self.rejected.lock().contains(name) {
            return Err(RegistrationError::new(name, "registration rejected"));
        }
        trace!(name, "register");
        self.registrations
            .lock()
            .push((name.to_string(), definition));
        Ok(())
    }

    fn log_error(&self, message: &str, causes: &[&Error]) {
        let causes: Vec<String> = causes.iter().map(|c| c.to_string()).collect();
        error!(causes = ?causes, "{message}");
        self.errors.lock().push(LoggedError {
            message: message.to_string(),
            causes,
        });
    }
}
