//! Utility modules
//!
//! This module contains utilities and helpers:
//! - Error types and result types
//! - Fragment cache
//! - Configuration
//! - Diagnostics for the `check` command

pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod error;

// Re-export commonly used items
pub use cache::{CacheStore, FileCache, MemoryCache};
pub use config::Config;
pub use diagnostics::{check_fragment, format_diagnostics, CheckResult, Diagnostic, DiagnosticLevel};
pub use error::{CacheError, ConfigError, Error, MalformedInput, RenderFailure, Result};
