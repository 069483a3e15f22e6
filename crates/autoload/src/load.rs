//! Concurrent load of declared behaviors with per-task failure isolation.
//!
//! Every declared name on every element in a batch becomes one task:
//! resolve, import, register. All tasks are polled together and the batch
//! settles when the slowest one does. A failing task is wrapped in a
//! [`LoadFailure`] and reported to the registry; it never short-circuits
//! its siblings.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::{
    AutoloadConfig, Error, LoadFailure, ModuleImporter, NodeRef, Registry,
    resolve::{declared_names, module_identifier},
};

/// Result of a single load task.
#[derive(Debug)]
pub enum LoadOutcome {
    /// The module was imported and registered.
    Registered {
        /// Declared name.
        name: String,
        /// Identifier the module was imported under.
        identifier: String,
    },
    /// Import or registration failed.
    Failed(LoadFailure),
}

impl LoadOutcome {
    /// Declared name this task loaded.
    pub fn name(&self) -> &str {
        match self {
            Self::Registered { name, .. } => name,
            Self::Failed(failure) => &failure.name,
        }
    }

    /// Resolved module identifier.
    pub fn identifier(&self) -> &str {
        match self {
            Self::Registered { identifier, .. } => identifier,
            Self::Failed(failure) => &failure.identifier,
        }
    }

    /// True when the behavior was registered.
    pub fn is_registered(&self) -> bool {
        matches!(self, Self::Registered { .. })
    }
}

/// Where a batch of elements came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOrigin {
    /// Startup discovery.
    Initial,
    /// Delta extracted from a mutation batch.
    Mutation,
}

/// Settled outcomes of one load batch.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Source of the batch.
    pub origin: BatchOrigin,
    /// One outcome per launched task, in declaration order.
    pub outcomes: Arc<[LoadOutcome]>,
}

impl BatchReport {
    /// Declared names that were registered.
    pub fn registered(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.is_registered())
            .map(LoadOutcome::name)
            .collect()
    }

    /// Failed tasks.
    pub fn failures(&self) -> Vec<&LoadFailure> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                LoadOutcome::Failed(failure) => Some(failure),
                LoadOutcome::Registered { .. } => None,
            })
            .collect()
    }
}

/// Resolves, imports, and registers declared behaviors.
#[derive(Clone)]
pub struct Loader {
    /// Dynamic import capability.
    importer: Arc<dyn ModuleImporter>,
    /// Registration target and error sink.
    registry: Arc<dyn Registry>,
    /// Attribute and naming convention.
    cfg: Arc<AutoloadConfig>,
}

impl Loader {
    /// Create a loader over the given importer and registry.
    pub fn new(
        importer: Arc<dyn ModuleImporter>,
        registry: Arc<dyn Registry>,
        cfg: Arc<AutoloadConfig>,
    ) -> Self {
        Self {
            importer,
            registry,
            cfg,
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &AutoloadConfig {
        &self.cfg
    }

    /// Load every behavior declared on `elements` and wait for all of them to settle.
    ///
    /// The declaration is read from each element at call time. Elements that
    /// no longer carry the attribute contribute no tasks.
    pub async fn load_elements(&self, elements: &[NodeRef]) -> Vec<LoadOutcome> {
        let names: Vec<String> = elements
            .iter()
            .filter_map(|el| el.attribute(&self.cfg.attribute))
            .flat_map(|value| {
                declared_names(&value)
                    .into_iter()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect();
        if names.is_empty() {
            return Vec::new();
        }

        let outcomes = join_all(names.into_iter().map(|name| self.load_name(name))).await;

        let failed = outcomes.iter().filter(|o| !o.is_registered()).count();
        info!(
            elements = elements.len(),
            tasks = outcomes.len(),
            failed,
            "autoload batch settled"
        );
        for outcome in &outcomes {
            if let LoadOutcome::Failed(failure) = outcome {
                warn!(
                    name = %failure.name,
                    identifier = %failure.identifier,
                    error = %failure.cause,
                    "autoload failed"
                );
                self.registry
                    .log_error(&failure.to_string(), &[&failure.cause]);
            }
        }
        outcomes
    }

    /// Load a single declared name.
    pub async fn load_name(&self, name: String) -> LoadOutcome {
        let identifier = module_identifier(&name, &self.cfg);
        debug!(name = %name, identifier = %identifier, "importing");
        let result = match self.importer.import(&identifier).await {
            Ok(module) => self
                .registry
                .register(&name, module.default)
                .map_err(Error::from),
            Err(e) => Err(Error::from(e)),
        };
        match result {
            Ok(()) => LoadOutcome::Registered { name, identifier },
            Err(cause) => LoadOutcome::Failed(LoadFailure {
                name,
                identifier,
                cause,
            }),
        }
    }
}
