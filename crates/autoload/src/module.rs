//! Dynamic import and registry capabilities.

use std::{any::Any, fmt, sync::Arc};

use async_trait::async_trait;

use crate::{Error, ImportError, RegistrationError};

/// Opaque default export of a loaded module. The loader passes it through untouched.
pub type Definition = Arc<dyn Any + Send + Sync>;

/// A successfully imported module.
#[derive(Clone)]
pub struct Module {
    /// Identifier the module was imported under.
    pub identifier: String,
    /// Default export, handed to the registry as-is.
    pub default: Definition,
}

impl Module {
    /// Construct a module from an identifier and its default export.
    pub fn new(identifier: impl Into<String>, default: Definition) -> Self {
        Self {
            identifier: identifier.into(),
            default,
        }
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("identifier", &self.identifier)
            .finish_non_exhaustive()
    }
}

/// Resolves module identifiers to loaded modules.
///
/// This is the only suspension point in a load task.
#[async_trait]
pub trait ModuleImporter: Send + Sync {
    /// Import the module registered under `identifier`.
    async fn import(&self, identifier: &str) -> Result<Module, ImportError>;
}

/// The application object behaviors are registered with.
///
/// Implementations must tolerate concurrent `register` and `log_error`
/// calls in any order, and should treat re-registration of a name as
/// idempotent.
pub trait Registry: Send + Sync {
    /// Register `definition` under the declared `name`.
    fn register(&self, name: &str, definition: Definition) -> Result<(), RegistrationError>;

    /// Report a failure. Must not panic.
    fn log_error(&self, message: &str, causes: &[&Error]);
}
