//! autoload: attribute-driven behavior loading over a live document tree.
//!
//! An element names the behaviors it needs in a declaration attribute
//! (`data-controller="user-list item--row"` by default). The [`Autoloader`]
//! finds every such element at startup, resolves each declared name to a
//! module identifier (`user_list_controller`, `item/row_controller`), imports
//! the modules concurrently, and registers each default export under its
//! declared name. It then watches the tree and loads declarations that
//! appear or change later.
//!
//! The document, mutation feed, importer, and registry are capabilities
//! supplied by the caller via [`Collaborators`]. In-memory implementations
//! live in [`memory`].
//!
//! Failures are isolated per declared name: a failed import or registration
//! is logged to the registry and never affects sibling loads.

mod autoloader;
mod config;
mod delta;
mod dom;
mod error;
mod load;
mod module;
mod resolve;

pub mod memory;
pub mod test_support;

pub use autoloader::{Autoloader, Collaborators};
pub use config::{AutoloadConfig, DEFAULT_ATTRIBUTE, DEFAULT_SUFFIX};
pub use delta::mutation_targets;
pub use dom::{
    AttributeSelector, DocumentTree, MutationBatch, MutationRecord, MutationSource,
    MutationSubscription, Node, NodeKind, NodeRef, ObserveOptions,
};
pub use error::{Error, ImportError, LoadFailure, RegistrationError, Result};
pub use load::{BatchOrigin, BatchReport, LoadOutcome, Loader};
pub use module::{Definition, Module, ModuleImporter, Registry};
pub use resolve::{declared_names, module_identifier};
