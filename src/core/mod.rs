//! Core text pipeline
//!
//! - `scanner`: balanced-brace scanning shared by every text transform
//! - `normalize`: rewrite raw fragments into canonical form (the cache key)
//! - `pipeline`: normalize → cache → expand → render → patch

pub mod normalize;
pub mod pipeline;
pub mod scanner;

pub use normalize::{apply_rules, normalize};
pub use pipeline::{prepare, Pipeline, Prepared, Rendered, Source};
pub use scanner::{find_balanced, BalancedSpan};
