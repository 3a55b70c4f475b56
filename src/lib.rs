//! lockbom - CycloneDX bills of materials from resolved NuGet manifests
//!
//! This crate provides the core library functionality for lockbom:
//! manifest reading, graph building, filtering, external document merging
//! and document composition.

pub mod core;
pub mod ops;
pub mod resolver;
pub mod util;

/// Test fixtures for lockbom unit tests.
///
/// This module is only available when compiling with `--cfg test`.
#[cfg(test)]
pub mod test_support;

pub use core::{
    BomError, ComponentRecord, ComponentRegistry, DependencyGraph, ModuleReference,
    OutputDocument, Package, Purl,
};

pub use resolver::{AssetsManifest, GraphBuilder};
pub use util::context::GlobalContext;
