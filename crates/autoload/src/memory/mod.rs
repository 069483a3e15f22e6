//! In-memory collaborators for tests and simulation.
//!
//! - [`MemoryDocument`]: tree + mutation source
//! - [`MemoryRegistry`]: records registrations and logged errors
//! - [`StaticImporter`]: identifier table with optional gates

mod document;
mod importer;
mod registry;

pub use document::{MemoryDocument, MemoryNode};
pub use importer::StaticImporter;
pub use registry::{LoggedError, MemoryRegistry};
