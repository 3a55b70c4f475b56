//! Error types for the resolution and composition pipeline.
//!
//! Every failure is local to the module or document being processed and
//! aborts the whole run. The only recoverable condition is an identifier
//! collision on external merge, which is renamed automatically and only
//! surfaces here when the rename collides again.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Result alias used by the library layers.
pub type Result<T, E = BomError> = std::result::Result<T, E>;

/// Error raised while turning manifests into BOM documents.
#[derive(Debug, Error, Diagnostic)]
pub enum BomError {
    #[error("configuration error: {message}")]
    #[diagnostic(code(lockbom::config))]
    Configuration {
        message: String,
        path: Option<PathBuf>,
    },

    #[error("failed to parse {what}: {message}")]
    #[diagnostic(code(lockbom::parse))]
    Parse { what: String, message: String },

    #[error("{message} (available targets: {})", display_list(.available))]
    #[diagnostic(
        code(lockbom::resolve::target),
        help("set `framework` in lockbom.toml to one of the available targets")
    )]
    Resolution {
        message: String,
        available: Vec<String>,
    },

    #[error("`{referrer}` depends on `{identifier}`, which is not registered")]
    #[diagnostic(
        code(lockbom::compose::unregistered),
        help("declare the module or component so it is registered before composition")
    )]
    Consistency {
        referrer: String,
        identifier: String,
    },

    #[error("identifier `{identifier}` collides, and its qualified form `{qualified}` is also registered")]
    #[diagnostic(code(lockbom::merge::collision))]
    Collision {
        identifier: String,
        qualified: String,
    },
}

impl BomError {
    /// A configuration error that is not tied to a file.
    pub fn config(message: impl Into<String>) -> Self {
        BomError::Configuration {
            message: message.into(),
            path: None,
        }
    }

    /// A configuration error about a specific file.
    pub fn config_at(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        BomError::Configuration {
            message: format!("{}: {}", message.into(), path.display()),
            path: Some(path),
        }
    }

    pub fn parse(what: impl Into<String>, message: impl ToString) -> Self {
        BomError::Parse {
            what: what.into(),
            message: message.to_string(),
        }
    }
}

fn display_list(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}
