//! High-level operations.
//!
//! This module contains the pipeline stages that run after a manifest has
//! been turned into a graph, and the driver that sequences them.

pub mod compose;
pub mod filter;
pub mod generate;
pub mod merge;

pub use compose::{compose, compose_component, ComposeOptions, SyntheticComponent};
pub use filter::{filter_graph, ExclusionRules};
pub use generate::{generate, GenerateOptions, GenerateReport, WrittenDocument};
pub use merge::{adopt_foreign, merge_foreign, rewrite_identifier, ForeignDocument};
