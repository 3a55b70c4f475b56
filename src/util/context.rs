//! Global context for lockbom operations.
//!
//! Provides centralized access to the working directory, the global config
//! location and project config discovery.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::util::config::{global_config_path, CONFIG_FILE_NAME};

/// Global context containing the paths a command runs against.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Global config file (~/.lockbom/config.toml), if a home dir exists
    global_config: Option<PathBuf>,
}

impl GlobalContext {
    /// Create a new GlobalContext from the process environment.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::with_cwd(cwd))
    }

    /// Create a context rooted at `cwd`.
    pub fn with_cwd(cwd: impl Into<PathBuf>) -> Self {
        GlobalContext {
            cwd: cwd.into(),
            global_config: global_config_path(),
        }
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn global_config(&self) -> Option<&Path> {
        self.global_config.as_deref()
    }

    /// Resolve the project config file.
    ///
    /// An explicit path is taken relative to the working directory.
    /// Otherwise `lockbom.toml` is searched from the working directory
    /// upward.
    pub fn find_config(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(self.cwd.join(path));
        }

        let mut current = Some(self.cwd.as_path());
        while let Some(dir) = current {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                return Ok(candidate);
            }
            current = dir.parent();
        }

        anyhow::bail!(
            "could not find `{}` in {} or any parent directory",
            CONFIG_FILE_NAME,
            self.cwd.display()
        )
    }
}
