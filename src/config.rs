//! Build configuration.
//!
//! Values come from an optional `rstdcx.toml` in the scan root; command line
//! flags are applied on top by the binary.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::emitter::OutputFormat;
use crate::error::{BuildError, Result};

/// Name of the optional configuration file looked up in the scan root
pub const CONFIG_FILE_NAME: &str = "rstdcx.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Output formats that get a `_links_<format>.rst` file
    pub formats: Vec<OutputFormat>,
    /// Paths containing any of these substrings are left out of a folder scan
    pub exclude_substrings: Vec<String>,
    /// File name prefix of generated link files, never followed by includes
    pub link_prefix: String,
    /// Suffix of template sources, tried when a name does not resolve as is
    pub template_suffix: String,
    /// Run `gen` manifests before scanning
    pub run_generators: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            formats: OutputFormat::ALL.to_vec(),
            exclude_substrings: vec!["_links_".to_string(), "index.rest".to_string()],
            link_prefix: "_links_".to_string(),
            template_suffix: ".stpl".to_string(),
            run_generators: true,
        }
    }
}

impl BuildConfig {
    /// Parse a configuration from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self> {
        let config: BuildConfig = toml::from_str(content).map_err(|e| BuildError::Config {
            path: origin.to_path_buf(),
            reason: e.message().to_string(),
        })?;
        config.validate(origin)?;
        Ok(config)
    }

    /// Load a configuration file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(BuildError::Io(e)),
        };
        log::debug!("Loading config from {}", path.display());
        Self::from_toml_str(&content, path)
    }

    /// Load `rstdcx.toml` from the scan root
    pub fn load_from_root(root: &Path) -> Result<Self> {
        Self::load(&root.join(CONFIG_FILE_NAME))
    }

    fn validate(&self, origin: &Path) -> Result<()> {
        if self.link_prefix.is_empty() {
            return Err(BuildError::Config {
                path: origin.to_path_buf(),
                reason: "link_prefix must not be empty".to_string(),
            });
        }
        if self.formats.is_empty() {
            return Err(BuildError::Config {
                path: origin.to_path_buf(),
                reason: "at least one output format is required".to_string(),
            });
        }
        Ok(())
    }

    /// True if the file name ends in `.rest` or `.rest` plus the template suffix
    pub fn is_primary_document(&self, name: &str) -> bool {
        name.ends_with(".rest") || name.ends_with(&format!(".rest{}", self.template_suffix))
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.exclude_substrings
            .iter()
            .any(|s| !s.is_empty() && path.contains(s.as_str()))
    }
}
