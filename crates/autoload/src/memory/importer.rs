//! Static module table standing in for a dynamic import mechanism.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::{Definition, ImportError, Module, ModuleImporter};

/// Importer backed by a fixed identifier → definition table.
///
/// Unknown identifiers fail with [`ImportError`]. An identifier can be held
/// with [`StaticImporter::hold`], which parks every import of it until the
/// returned [`Notify`] is signalled once per pending import.
#[derive(Default)]
pub struct StaticImporter {
    /// Importable modules.
    modules: Mutex<HashMap<String, Definition>>,
    /// Gates parking imports of specific identifiers.
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    /// Every identifier requested, in call order.
    requested: Mutex<Vec<String>>,
}

impl StaticImporter {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`StaticImporter::insert`].
    #[must_use]
    pub fn with_module(self, identifier: &str, definition: Definition) -> Self {
        self.insert(identifier, definition);
        self
    }

    /// Make `identifier` importable.
    pub fn insert(&self, identifier: &str, definition: Definition) {
        self.modules
            .lock()
            .insert(identifier.to_string(), definition);
    }

    /// Park imports of `identifier` until the returned gate is notified.
    pub fn hold(&self, identifier: &str) -> Arc<Notify> {
        self.gates
            .lock()
            .entry(identifier.to_string())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }

    /// Identifiers requested so far.
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().clone()
    }
}

#[async_trait]
impl ModuleImporter for StaticImporter {
    async fn import(&self, identifier: &str) -> Result<Module, ImportError> {
        self.requested.lock().push(identifier.to_string());
        let gate = self.gates.lock().get(identifier).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let definition = self.modules.lock().get(identifier).cloned();
        match definition {
            Some(def) => Ok(Module::new(identifier, def)),
            None => Err(ImportError::new(identifier, "module not found")),
        }
    }
}
