//! Manifest resolution.
//!
//! Reads the lock artifact a package manager already produced and turns it
//! into a typed dependency graph. Nothing here resolves version constraints;
//! the manifest is taken as the answer. Building a graph is pure - all I/O
//! happens in `AssetsManifest::load`.

pub mod assets;
pub mod builder;
pub mod version;

pub use assets::{AssetsManifest, LibraryEntry, LibraryKind, Target};
pub use builder::GraphBuilder;
pub use version::compare_versions;
