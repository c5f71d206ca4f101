//! Configuration
//!
//! Everything has a default, so an empty (or absent) config file is valid.
//!
//! ```toml
//! [renderer]
//! program = "node"
//! script = "katex/cli.js"
//! args = []
//!
//! [cache]
//! path = "math.cache"
//!
//! [expansion]
//! max_substitutions = 1000
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::features::macros::DEFAULT_MAX_SUBSTITUTIONS;
use crate::features::render::KatexRenderer;
use crate::utils::cache::DEFAULT_CACHE_PATH;
use crate::utils::error::ConfigError;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub renderer: RendererConfig,
    pub cache: CacheConfig,
    pub expansion: ExpansionConfig,
}

/// How to start the external renderer
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RendererConfig {
    /// Executable to run
    pub program: String,
    /// Script passed as the first argument; empty runs `program` directly
    pub script: Option<PathBuf>,
    /// Extra arguments placed before `--display-mode`
    pub args: Vec<String>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            program: "node".to_string(),
            script: Some(PathBuf::from("katex/cli.js")),
            args: Vec::new(),
        }
    }
}

impl RendererConfig {
    /// Build the renderer described by this section
    pub fn build(&self) -> KatexRenderer {
        let script = self
            .script
            .clone()
            .filter(|script| !script.as_os_str().is_empty());
        KatexRenderer::new(self.program.clone(), script).with_args(self.args.clone())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_CACHE_PATH),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ExpansionConfig {
    /// Substitutions allowed per macro before the fragment is rejected
    pub max_substitutions: usize,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            max_substitutions: DEFAULT_MAX_SUBSTITUTIONS,
        }
    }
}

impl Config {
    /// Parse a TOML document
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    /// Read and parse a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}
