//! Fragment normalization
//!
//! Rewrites raw math markup into the form the renderer accepts and wraps it
//! in the outer formatting command. The result doubles as the cache key, so
//! this step must stay a pure function of its input.

use tracing::debug;

use crate::data::rules::{apply_all, NORMALIZE_RULES, OUTER_COMMAND};

/// Apply the substitution table without the outer wrap.
///
/// The table is applied until nothing changes, since one rewrite can expose
/// another (`&amp;amp;`, nested `@{@{}}`). Running this on its own output
/// therefore changes nothing.
pub fn apply_rules(input: &str) -> String {
    let mut current = apply_all(&NORMALIZE_RULES, input);
    loop {
        let next = apply_all(&NORMALIZE_RULES, &current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Wrap rewritten text in the outer formatting command
pub fn wrap(rewritten: &str) -> String {
    format!("{}{{{}}}", OUTER_COMMAND, rewritten)
}

/// Normalize a raw fragment: substitution table, then `\mathrm{...}` wrap.
///
/// ```rust
/// use mathfrag::normalize;
///
/// assert_eq!(normalize(r"\(a &lt; b\)"), r"\mathrm{a < b}");
/// ```
pub fn normalize(input: &str) -> String {
    let normalized = wrap(&apply_rules(input));
    debug!(input_len = input.len(), normalized = %normalized, "normalized fragment");
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strips_delimiters() {
        assert_eq!(normalize(r"\(x^2\)"), r"\mathrm{x^2}");
        assert_eq!(normalize(r"\[x^2\]"), r"\mathrm{x^2}");
    }

    #[test]
    fn test_keeps_escaped_backslash() {
        assert_eq!(
            normalize(r"\begin{aligned}a\\(b)\end{aligned}"),
            r"\mathrm{\begin{aligned}a\\(b)\end{aligned}}"
        );
    }

    #[test]
    fn test_quotes() {
        assert_eq!(normalize("f’(x)"), "\\mathrm{f\\text{’}(x)}");
        assert_eq!(normalize("‘a’"), "\\mathrm{\\text{‘}a\\text{’}}");
    }

    #[test]
    fn test_layout_and_deprecated() {
        assert_eq!(normalize(r"a \hfill b"), r"\mathrm{a  b}");
        assert_eq!(normalize(r"\mbox{=}"), r"\mathrm{\mathrel{=}}");
        assert_eq!(
            normalize(r"\begin{split}x\end{split}"),
            r"\mathrm{\begin{aligned}x\end{aligned}}"
        );
    }

    #[test]
    fn test_entities() {
        assert_eq!(normalize("a &lt; b &gt; c &amp; d"), r"\mathrm{a < b > c & d}");
    }

    #[test]
    fn test_array_spacing() {
        assert_eq!(
            normalize(r"\begin{array}[t]{l@{~}l@{\qquad}r@{}}x\end{array}"),
            r"\mathrm{\begin{array}{llr}x\end{array}}"
        );
        assert_eq!(
            normalize(r"\begin{array}[b]{c@{\qquad\qquad}c}x\end{array}"),
            r"\mathrm{\begin{array}{cc}x\end{array}}"
        );
    }

    #[test]
    fn test_dollars() {
        assert_eq!(normalize("$x + 1$"), r"\mathrm{x + 1}");
        assert_eq!(normalize(r"\$5 + $y$"), r"\mathrm{\$5 + y}");
    }

    #[test]
    fn test_rules_idempotent() {
        let inputs = [
            r"\(x\)",
            r"$a$ \hfill ‘b’ &amp; &lt;c&gt;",
            r"\begin{split}a\\b\end{split}",
            r"\begin{array}[t]{l@{~}r}1&2\end{array}",
            r"\$ and $$",
            r"\\\(",
            "&amp;amp;lt;",
            r"\begin{array}{l@{@{}}r}x\end{array}",
            r"a\\hfill(b",
            r"\h\(fill",
        ];
        for input in inputs {
            let once = apply_rules(input);
            let twice = apply_rules(&once);
            assert_eq!(once, twice, "not idempotent for {:?}", input);
        }
    }

    #[test]
    fn test_rewrites_exposed_by_earlier_rewrites() {
        assert_eq!(normalize("&amp;amp;"), r"\mathrm{&}");
        assert_eq!(
            normalize(r"\begin{array}{l@{@{}}r}x\end{array}"),
            r"\mathrm{\begin{array}{lr}x\end{array}}"
        );
        // removing the delimiter exposes `\hfill`
        assert_eq!(normalize(r"a\h\(fill b"), r"\mathrm{a b}");
    }

    #[test]
    fn test_line_break_before_command_name() {
        let out = normalize(r"a\\hfill(b");
        assert_eq!(out, r"\mathrm{a\\hfill(b}");
        assert!(!out.contains(r"a\("));
    }

    #[test]
    fn test_wrapped_exactly_once() {
        let out = normalize("x");
        assert_eq!(out.matches("\\mathrm{").count(), 1);
        assert!(out.ends_with('}'));
    }
}
