//! Core data structures for lockbom.
//!
//! This module contains the foundational types used throughout lockbom:
//! - Identifiers (Purl)
//! - Graph nodes and dependency graphs
//! - Component records and the run-wide registry
//! - Output documents

pub mod component;
pub mod document;
pub mod error;
pub mod graph;
pub mod package;
pub mod purl;
pub mod registry;

pub use component::{ComponentMetadata, ComponentRecord, ComponentType, Scope};
pub use document::OutputDocument;
pub use error::{BomError, Result};
pub use graph::DependencyGraph;
pub use package::{ModuleReference, Package};
pub use purl::Purl;
pub use registry::ComponentRegistry;
