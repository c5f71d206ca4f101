//! Fragment pipeline
//!
//! normalize → cache lookup → extract/expand macros → render → patch → store
//!
//! The cache is not owned by the pipeline; callers open it, pass it to every
//! call and close it when they are done. Nothing is stored unless the whole
//! chain succeeded.

use tracing::{debug, error};

use crate::core::normalize::{apply_rules, wrap};
use crate::features::macros::{expand_macros, Expansion, DEFAULT_MAX_SUBSTITUTIONS};
use crate::features::patch::patch_output;
use crate::features::render::Renderer;
use crate::utils::cache::CacheStore;
use crate::utils::error::{Error, Result};

/// A fragment after the text transforms, before rendering
#[derive(Debug, Clone)]
pub struct Prepared {
    /// Normalized text; also the cache key
    pub key: String,
    /// Expansion of the rewritten text, before the outer wrap
    pub expansion: Expansion,
    text: String,
}

impl Prepared {
    /// Text handed to the renderer
    pub fn expanded(&self) -> &str {
        &self.text
    }
}

/// Where a rendered fragment came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Renderer,
}

/// A successfully rendered fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub html: String,
    pub source: Source,
}

/// Run the text transforms (normalize, then expand macros) on a fragment.
pub fn prepare(fragment: &str, max_substitutions: usize) -> Result<Prepared> {
    let rewritten = apply_rules(fragment);
    expand_rewritten(&rewritten, max_substitutions)
}

// Macros are expanded before the outer wrap so that an unclosed group in the
// fragment cannot borrow the wrapper's closing brace.
fn expand_rewritten(rewritten: &str, max_substitutions: usize) -> Result<Prepared> {
    let expansion = expand_macros(rewritten, max_substitutions)?;
    Ok(Prepared {
        key: wrap(rewritten),
        text: wrap(&expansion.text),
        expansion,
    })
}

/// Renders fragments through a [`Renderer`], memoized in a [`CacheStore`]
#[derive(Debug, Clone)]
pub struct Pipeline<R> {
    renderer: R,
    max_substitutions: usize,
}

impl<R: Renderer> Pipeline<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            max_substitutions: DEFAULT_MAX_SUBSTITUTIONS,
        }
    }

    /// Cap on substitutions per macro
    pub fn with_max_substitutions(mut self, max_substitutions: usize) -> Self {
        self.max_substitutions = max_substitutions;
        self
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Text transforms only
    pub fn prepare(&self, fragment: &str) -> Result<Prepared> {
        prepare(fragment, self.max_substitutions)
    }

    /// Render one fragment to HTML.
    ///
    /// A renderer failure is returned together with the original and the
    /// transformed input, and leaves the cache untouched.
    pub fn render<C: CacheStore + ?Sized>(&self, fragment: &str, cache: &mut C) -> Result<String> {
        self.render_traced(fragment, cache).map(|rendered| rendered.html)
    }

    /// Like [`Pipeline::render`], also reporting whether the cache answered.
    pub fn render_traced<C: CacheStore + ?Sized>(
        &self,
        fragment: &str,
        cache: &mut C,
    ) -> Result<Rendered> {
        let rewritten = apply_rules(fragment);
        let key = wrap(&rewritten);

        if let Some(html) = cache.get(&key) {
            debug!(key = %key, "cache hit");
            return Ok(Rendered {
                html,
                source: Source::Cache,
            });
        }
        debug!(key = %key, "cache miss");

        let prepared = expand_rewritten(&rewritten, self.max_substitutions)?;
        let html = self
            .renderer
            .render_display(prepared.expanded())
            .and_then(|raw| patch_output(&raw))
            .map_err(|failure| {
                error!(%failure, original = fragment, transformed = %prepared.expanded(), "render failed");
                Error::render(failure, fragment, prepared.expanded())
            })?;

        cache.put(&prepared.key, &html);
        Ok(Rendered {
            html,
            source: Source::Renderer,
        })
    }
}
