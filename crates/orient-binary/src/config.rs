//! Codec configuration.

use crate::BagPolicy;

/// Limits and policies applied by [`crate::RecordSerializer`].
///
/// With the `config` feature, a configuration can be loaded from TOML:
///
/// ```toml
/// max_depth = 32
///
/// [bag]
/// embedded_threshold = 40
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct CodecConfig {
    /// Deepest nesting of embedded documents and collections accepted.
    pub max_depth: usize,
    /// Representation policy for link bags built client-side.
    pub bag: BagPolicy,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_depth: 64,
            bag: BagPolicy::default(),
        }
    }
}

#[cfg(feature = "config")]
pub use loading::{ConfigError, SchemaFile};

#[cfg(feature = "config")]
mod loading {
    use std::path::Path;

    use serde::Deserialize;
    use thiserror::Error;

    use super::CodecConfig;
    use crate::{GlobalProperties, GlobalProperty};

    /// Configuration loading error.
    #[derive(Error, Debug)]
    pub enum ConfigError {
        #[error("Failed to read config file '{0}': {1}")]
        Io(String, #[source] std::io::Error),

        #[error("Failed to parse config: {0}")]
        Parse(#[from] toml::de::Error),
    }

    fn read(path: &Path) -> Result<String, ConfigError> {
        std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.display().to_string(), e))
    }

    impl CodecConfig {
        /// Load configuration from a TOML file.
        pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
            Self::from_toml(&read(path.as_ref())?)
        }

        /// Parse configuration from a TOML string. Missing keys take defaults.
        pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
            Ok(toml::from_str(content)?)
        }
    }

    /// A global property table saved as TOML:
    ///
    /// ```toml
    /// [[properties]]
    /// id = 0
    /// name = "name"
    /// type = "STRING"
    /// ```
    #[derive(Debug, Deserialize)]
    pub struct SchemaFile {
        #[serde(default)]
        pub properties: Vec<GlobalProperty>,
    }

    impl SchemaFile {
        pub fn from_file(path: impl AsRef<Path>) -> Result<GlobalProperties, ConfigError> {
            Self::from_toml(&read(path.as_ref())?)
        }

        pub fn from_toml(content: &str) -> Result<GlobalProperties, ConfigError> {
            let file: SchemaFile = toml::from_str(content)?;
            Ok(file.properties.into_iter().collect())
        }
    }
}
