//! Feature modules
//!
//! - Macro extraction and expansion (`\def\name#1{...}`)
//! - External renderer invocation
//! - Post-render HTML patching

pub mod macros;
pub mod patch;
pub mod render;

pub use macros::{expand_macros, extract_definitions, Expansion, Macro, MacroTable};
pub use patch::patch_output;
pub use render::{KatexRenderer, Renderer};
