//! Error handling for mathfrag
//!
//! Three failure classes surface from the pipeline:
//!
//! - [`MalformedInput`]: the fragment itself is broken (unbalanced braces,
//!   malformed `\def`, runaway expansion). Fatal for that fragment.
//! - [`RenderFailure`]: the external engine failed. Fatal for that fragment,
//!   never cached.
//! - [`CacheError`]: the persistent store cannot be opened or flushed. Fatal
//!   for the whole run.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed input: {0}")]
    Malformed(#[from] MalformedInput),

    #[error("renderer failure: {failure}")]
    Render {
        failure: RenderFailure,
        /// The fragment exactly as it was handed to the pipeline
        original: String,
        /// The fully normalized and expanded text sent to the renderer
        transformed: String,
    },

    #[error("cache unavailable: {0}")]
    Cache(#[from] CacheError),
}

/// Errors caused by the content of a fragment
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedInput {
    #[error("no opening brace after `{prefix}` at line {line}, column {column}")]
    MissingOpenBrace {
        prefix: String,
        line: usize,
        column: usize,
    },

    #[error("unbalanced braces: `{prefix}` at line {line}, column {column} is never closed")]
    UnbalancedBraces {
        prefix: String,
        line: usize,
        column: usize,
    },

    #[error("malformed macro definition `{definition}`: {reason}")]
    MalformedDefinition { definition: String, reason: String },

    #[error("macro `{name}` was substituted {limit} times without running out of invocations")]
    ExpansionLimit { name: String, limit: usize },
}

/// Ways the external renderer can fail
#[derive(Debug, Error)]
pub enum RenderFailure {
    #[error("could not start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while talking to the renderer: {0}")]
    Io(#[from] std::io::Error),

    #[error("renderer exited with {status}{}", stderr_suffix(.stderr))]
    ExitStatus { status: ExitStatus, stderr: String },

    #[error("renderer produced invalid UTF-8 output")]
    InvalidUtf8,

    #[error("renderer output does not contain `{marker}`")]
    MissingMarker { marker: &'static str },
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

/// Errors from the persistent fragment cache
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cannot read cache file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache file {} is not a valid cache (delete it to start over): {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot persist cache file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot serialize cache: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Errors while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

// Convenience constructors
impl MalformedInput {
    pub fn definition(definition: impl Into<String>, reason: impl Into<String>) -> Self {
        MalformedInput::MalformedDefinition {
            definition: definition.into(),
            reason: reason.into(),
        }
    }
}

impl Error {
    pub fn render(
        failure: RenderFailure,
        original: impl Into<String>,
        transformed: impl Into<String>,
    ) -> Self {
        Error::Render {
            failure,
            original: original.into(),
            transformed: transformed.into(),
        }
    }

    /// Whether this error only affects the current fragment
    pub fn is_fragment_local(&self) -> bool {
        matches!(self, Error::Malformed(_) | Error::Render { .. })
    }
}
