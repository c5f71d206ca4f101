//! Data layer - ordered rewrite tables and fixed output framing

pub mod rules;

pub use rules::{Rule, NORMALIZE_RULES, PATCH_RULES};
