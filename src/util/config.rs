//! Distribution configuration file support.
//!
//! A project may carry an optional `slipway.config.json` next to its sources.
//! It is read once by the caller and injected into every `Distribution`
//! through `DistributionOptions`, so the core never touches the filesystem
//! to discover it.
//!
//! Recognized keys:
//! - `buildSharedLibs`: build libraries of the default type as dynamic
//! - `addPkgConfigSearchPaths`: extra directories searched for `.pc` files

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default name of the configuration file, relative to the source root.
pub const CONFIG_FILE_NAME: &str = "slipway.config.json";

/// Build-time configuration for a Distribution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Config {
    /// Build shared libraries by default
    pub build_shared_libs: bool,

    /// Additional paths to search for .pc files
    pub add_pkg_config_search_paths: Vec<PathBuf>,
}

/// Error while reading a configuration file. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file '{}' must have a '.json' extension", path.display())]
    BadExtension { path: PathBuf },

    #[error("failed to read config file '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("config file '{}' is invalid: {source}", path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Config {
    /// Parse configuration from JSON text.
    ///
    /// The document must be an object; unknown keys and wrongly typed
    /// values are errors. Relative search paths are resolved against `base`
    /// when given.
    pub fn from_json_str(contents: &str, base: Option<&Path>) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(contents)?;
        if !value.is_object() {
            return Err(serde::de::Error::custom("expected a JSON object"));
        }
        let mut config: Config = serde_json::from_value(value)?;

        if let Some(base) = base {
            for path in &mut config.add_pkg_config_search_paths {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        }

        Ok(config)
    }

    /// Load configuration from a file.
    ///
    /// Returns `Ok(None)` when the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            return Err(ConfigError::BadExtension {
                path: path.to_path_buf(),
            });
        }

        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config = Config::from_json_str(&contents, path.parent()).map_err(|source| {
            ConfigError::Invalid {
                path: path.to_path_buf(),
                source,
            }
        })?;

        tracing::debug!("loaded config from {}", path.display());
        Ok(Some(config))
    }

    /// Load configuration, falling back to defaults if the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        Ok(Config::load(path)?.unwrap_or_default())
    }
}
