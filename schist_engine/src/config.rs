//! Engine configuration, read from `schist.toml`.

use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "schist.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory scanned for `*.sk` scripts.
    pub scripts_dir: PathBuf,
    /// Root for script-written files (the `write ... to file` effect).
    pub data_dir: PathBuf,
    /// Worker threads for background effects.
    pub workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        // paths are workspace-root relative, like the sample scripts dir
        Self {
            scripts_dir: PathBuf::from("schist_engine/data/scripts"),
            data_dir: PathBuf::from("schist_engine/data"),
            workers: 2,
        }
    }
}

impl Config {
    /// Load from a TOML file. A missing file is not an error; defaults
    /// apply and a note goes to the log.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for unreadable or malformed files.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("no config at {}; using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}
