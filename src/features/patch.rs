//! Post-render HTML fixups
//!
//! The KaTeX build this tool ships with emits a handful of constructs that
//! either break HTML validation or render badly. The patch table in
//! [`crate::data::rules`] corrects them; later patches assume the earlier
//! ones have run.

use crate::data::rules::{apply_all, OUTPUT_MARKER, OUTPUT_PREFIX, OUTPUT_SUFFIX, PATCH_RULES};
use crate::utils::error::RenderFailure;

/// Turn raw renderer output into the final HTML fragment.
///
/// Everything before the `katex-html` tree (the MathML twin and the outer
/// wrappers) is dropped and replaced by fixed framing.
pub fn patch_output(raw: &str) -> Result<String, RenderFailure> {
    let trimmed = raw.trim();
    let start = trimmed.find(OUTPUT_MARKER).ok_or(RenderFailure::MissingMarker {
        marker: OUTPUT_MARKER,
    })?;

    let framed = format!("{}{}{}", OUTPUT_PREFIX, &trimmed[start..], OUTPUT_SUFFIX);
    Ok(apply_all(&PATCH_RULES, &framed))
}
