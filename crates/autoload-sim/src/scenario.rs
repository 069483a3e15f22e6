//! Scenario files: an initial document, a module table, and scripted mutations.

use std::{fs, io, path::Path, sync::Arc};

use autoload::{
    AutoloadConfig, Autoloader, Collaborators,
    memory::{MemoryDocument, MemoryNode, MemoryRegistry, StaticImporter},
};
use ron::error::SpannedError;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Errors produced while loading or running a scenario.
#[derive(Debug, Error)]
pub enum Error {
    /// The scenario file could not be read.
    #[error("Failed to read scenario {path}: {source}")]
    Read {
        /// Scenario path.
        path: String,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// The scenario file is not valid RON for [`Scenario`].
    #[error("Failed to parse scenario: {0}")]
    Parse(#[from] SpannedError),
    /// A step referenced an element index that does not exist yet.
    #[error("Step {step} references unknown element {element}")]
    UnknownElement {
        /// Zero-based step index.
        step: usize,
        /// Element index referenced.
        element: usize,
    },
    /// Loader or configuration failure.
    #[error(transparent)]
    Autoload(#[from] autoload::Error),
}

/// An element to create, with its subtree.
#[derive(Debug, Clone, Deserialize)]
pub struct ElementSpec {
    /// Tag name.
    pub tag: String,
    /// Attributes as `(name, value)` pairs.
    #[serde(default)]
    pub attributes: Vec<(String, String)>,
    /// Child elements.
    #[serde(default)]
    pub children: Vec<Self>,
}

/// One scripted action applied after `enable()`.
#[derive(Debug, Clone, Deserialize)]
pub enum Step {
    /// Insert a new element under `parent` (an element index) or under the body.
    Insert {
        /// Parent element index; `None` means the body.
        #[serde(default)]
        parent: Option<usize>,
        /// Element to insert.
        element: ElementSpec,
    },
    /// Set an attribute on an existing element.
    SetAttribute {
        /// Element index.
        element: usize,
        /// Attribute name.
        name: String,
        /// New value.
        value: String,
    },
    /// Remove an attribute from an existing element.
    RemoveAttribute {
        /// Element index.
        element: usize,
        /// Attribute name.
        name: String,
    },
    /// Deliver queued mutation records as one batch.
    Flush,
    /// Stop watching for mutations.
    Disable,
}

/// A complete scenario.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Loader configuration; defaults apply when absent.
    pub config: Option<AutoloadConfig>,
    /// Identifiers that import successfully.
    pub modules: Vec<String>,
    /// Declared names the registry refuses.
    pub reject: Vec<String>,
    /// Elements present before `enable()`, appended to the body.
    pub document: Vec<ElementSpec>,
    /// Actions applied after `enable()`.
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Parse a scenario from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self, Error> {
        Ok(ron::from_str(text)?)
    }

    /// Load a scenario file.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_ron_str(&text)
    }
}

/// A scenario wired to in-memory collaborators.
pub struct World {
    /// Tree and mutation source.
    pub document: Arc<MemoryDocument>,
    /// Registration sink.
    pub registry: Arc<MemoryRegistry>,
    /// Loader under test.
    pub autoloader: Autoloader,
    /// Every element created so far, in creation order.
    elements: Vec<Arc<MemoryNode>>,
}

impl World {
    /// Build the initial document and collaborators for `scenario`.
    pub fn build(scenario: &Scenario, config: AutoloadConfig) -> Self {
        let document = Arc::new(MemoryDocument::new());
        let importer = Arc::new(StaticImporter::new());
        for ident in &scenario.modules {
            importer.insert(ident, Arc::new(ident.clone()));
        }
        let registry = Arc::new(MemoryRegistry::new());
        for name in &scenario.reject {
            registry.reject(name.clone());
        }
        let autoloader = Autoloader::new(
            Collaborators {
                document: document.clone(),
                mutations: document.clone(),
                importer,
                registry: registry.clone(),
            },
            config,
        );
        let mut world = Self {
            document,
            registry,
            autoloader,
            elements: Vec::new(),
        };
        let body = world.document.body();
        for spec in &scenario.document {
            world.insert(&body, spec);
        }
        world
    }

    /// Create `spec` and its subtree, then attach it under `parent`.
    fn insert(&mut self, parent: &Arc<MemoryNode>, spec: &ElementSpec) {
        let node = self.create(spec);
        self.document.append_child(parent, node);
    }

    /// Create `spec` and its subtree detached, recording every element.
    fn create(&mut self, spec: &ElementSpec) -> Arc<MemoryNode> {
        let attrs: Vec<(&str, &str)> = spec
            .attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let node = self.document.create_element(&spec.tag, &attrs);
        self.elements.push(node.clone());
        for child in &spec.children {
            let child_node = self.create(child);
            self.document.append_child(&node, child_node);
        }
        node
    }

    /// Element at `index`, or an error naming `step`.
    fn element(&self, step: usize, index: usize) -> Result<Arc<MemoryNode>, Error> {
        self.elements
            .get(index)
            .cloned()
            .ok_or(Error::UnknownElement {
                step,
                element: index,
            })
    }

    /// Apply step number `idx`.
    pub fn apply(&mut self, idx: usize, step: &Step) -> Result<(), Error> {
        debug!(step = idx, ?step, "apply");
        match step {
            Step::Insert { parent, element } => {
                let parent = match parent {
                    Some(p) => self.element(idx, *p)?,
                    None => self.document.body(),
                };
                self.insert(&parent, element);
            }
            Step::SetAttribute {
                element,
                name,
                value,
            } => {
                let el = self.element(idx, *element)?;
                self.document.set_attribute(&el, name, value);
            }
            Step::RemoveAttribute { element, name } => {
                let el = self.element(idx, *element)?;
                self.document.remove_attribute(&el, name);
            }
            Step::Flush => {
                self.document.flush();
            }
            Step::Disable => self.autoloader.disable(),
        }
        Ok(())
    }
}
