//! # mathfrag
//!
//! Turns LaTeX math fragments into display-mode HTML through an external KaTeX
//! renderer, with a persistent cache in front of it.
//!
//! ## Pipeline
//!
//! - **Normalize**: strip delimiters, rewrite constructs KaTeX rejects, wrap in
//!   `\mathrm{...}`. The result is the cache key.
//! - **Macros**: extract `\def\name#1{body}` definitions and expand every
//!   `\name{arg}` invocation
//! - **Render**: `node katex/cli.js --display-mode` (configurable)
//! - **Patch**: drop the MathML twin and fix up the HTML
//!
//! ## Usage Examples
//!
//! ### Text transforms
//!
//! ```rust
//! use mathfrag::{normalize, prepare};
//!
//! assert_eq!(normalize(r"\(a \hfill b\)"), r"\mathrm{a  b}");
//!
//! let prepared = prepare(r"$\def\p#1{(#1)}\p{x}$", 1000).unwrap();
//! assert_eq!(prepared.expanded(), r"\mathrm{{(x)}}");
//! ```
//!
//! ### Rendering with a cache
//!
//! ```rust,no_run
//! use mathfrag::{FileCache, KatexRenderer, Pipeline};
//!
//! let mut cache = FileCache::open("math.cache")?;
//! let pipeline = Pipeline::new(KatexRenderer::default());
//! let html = pipeline.render(r"\frac{1}{2}", &mut cache)?;
//! println!("{}", html);
//! cache.close()?;
//! # Ok::<(), mathfrag::Error>(())
//! ```

/// Core text pipeline
pub mod core;

/// Data layer - rewrite tables
pub mod data;

/// Feature modules - macros, rendering, patching
pub mod features;

/// Utility modules
pub mod utils;

// Re-export core modules
pub use crate::core::normalize::{apply_rules, normalize};
pub use crate::core::pipeline::{prepare, Pipeline, Prepared, Rendered, Source};
pub use crate::core::scanner;

// Re-export feature modules
pub use crate::features::macros;
pub use crate::features::patch;
pub use crate::features::render;
pub use crate::features::macros::{expand_macros, Expansion, MacroTable};
pub use crate::features::patch::patch_output;
pub use crate::features::render::{KatexRenderer, Renderer};

// Re-export utilities
pub use crate::utils::cache;
pub use crate::utils::cache::{CacheStore, FileCache, MemoryCache};
pub use crate::utils::config;
pub use crate::utils::config::Config;
pub use crate::utils::diagnostics;
pub use crate::utils::error::{CacheError, ConfigError, Error, MalformedInput, RenderFailure, Result};
