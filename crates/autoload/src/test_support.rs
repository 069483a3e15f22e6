//! Minimal test support utilities for `autoload` consumers.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::runtime::Builder;

use crate::{
    Collaborators,
    memory::{MemoryDocument, MemoryRegistry, StaticImporter},
};

/// Run an async test body on a current-thread Tokio runtime and shut it down promptly.
///
/// The loader assumes cooperative, single-threaded scheduling; tests run the
/// same way.
pub fn run_async_test<F>(fut: F)
where
    F: Future<Output = ()>,
{
    struct RuntimeGuard(Option<tokio::runtime::Runtime>);

    impl Drop for RuntimeGuard {
        fn drop(&mut self) {
            if let Some(rt) = self.0.take() {
                rt.shutdown_timeout(Duration::from_millis(50));
            }
        }
    }

    let guard = RuntimeGuard(Some(
        Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("build test runtime"),
    ));

    if let Some(rt) = guard.0.as_ref() {
        rt.block_on(fut);
    }
}

/// In-memory collaborators wired together, with handles kept for inspection.
pub struct Fixture {
    /// Tree and mutation source.
    pub document: Arc<MemoryDocument>,
    /// Module table.
    pub importer: Arc<StaticImporter>,
    /// Registration sink.
    pub registry: Arc<MemoryRegistry>,
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

impl Fixture {
    /// Fresh document, empty importer, empty registry.
    pub fn new() -> Self {
        Self {
            document: Arc::new(MemoryDocument::new()),
            importer: Arc::new(StaticImporter::new()),
            registry: Arc::new(MemoryRegistry::new()),
        }
    }

    /// Collaborators for an [`Autoloader`](crate::Autoloader).
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            document: self.document.clone(),
            mutations: self.document.clone(),
            importer: self.importer.clone(),
            registry: self.registry.clone(),
        }
    }

    /// Make `identifier` importable with its own name as the definition.
    pub fn provide(&self, identifier: &str) {
        self.importer
            .insert(identifier, Arc::new(identifier.to_string()));
    }
}
