//! Substitution tables
//!
//! Both the input normalizer and the output patcher are driven by ordered
//! rule tables. Each rule rewrites the output of the rule before it; order is
//! significant and must not be changed casually.

use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

/// One rewrite step
#[derive(Debug)]
pub enum Rule {
    /// Replace every occurrence of a literal string
    Literal {
        from: &'static str,
        to: &'static str,
    },
    /// Replace every regex match; `to` may reference capture groups
    Pattern { regex: Regex, to: &'static str },
    /// Replace matches of the `target` alternative, but leave matches of the
    /// `keep` group untouched. Tokenizes protected sequences such as `\\`
    /// in the same left-to-right pass as the rewrite.
    Guarded { regex: Regex, to: &'static str },
}

impl Rule {
    fn literal(from: &'static str, to: &'static str) -> Self {
        Rule::Literal { from, to }
    }

    fn pattern(regex: &str, to: &'static str) -> Self {
        Rule::Pattern {
            regex: Regex::new(regex).unwrap(),
            to,
        }
    }

    fn guarded(keep: &str, target: &str, to: &'static str) -> Self {
        Rule::Guarded {
            regex: Regex::new(&format!("(?P<keep>{})|(?:{})", keep, target)).unwrap(),
            to,
        }
    }

    /// Apply this rule to `input`
    pub fn apply<'a>(&self, input: &'a str) -> Cow<'a, str> {
        match self {
            Rule::Literal { from, to } => {
                if input.contains(from) {
                    Cow::Owned(input.replace(from, to))
                } else {
                    Cow::Borrowed(input)
                }
            }
            Rule::Pattern { regex, to } => regex.replace_all(input, *to),
            Rule::Guarded { regex, to } => regex.replace_all(input, |caps: &Captures| {
                match caps.name("keep") {
                    Some(kept) => kept.as_str().to_string(),
                    None => to.to_string(),
                }
            }),
        }
    }
}

/// Apply a table of rules in order
pub fn apply_all(rules: &[Rule], input: &str) -> String {
    let mut text = input.to_string();
    for rule in rules {
        if let Cow::Owned(rewritten) = rule.apply(&text) {
            text = rewritten;
        }
    }
    text
}

/// Command wrapped around every normalized fragment
pub const OUTER_COMMAND: &str = "\\mathrm";

/// Start of the renderer's HTML tree; everything before it is discarded
pub const OUTPUT_MARKER: &str = "<span class=\"katex-html\"";

/// Framing placed around the patched renderer output
pub const OUTPUT_PREFIX: &str = "<span class=\"katex-display\"><span class=\"katex\">";
pub const OUTPUT_SUFFIX: &str = "</span>";

lazy_static! {
    /// Input rewrites, applied before the fragment is used as a cache key
    pub static ref NORMALIZE_RULES: Vec<Rule> = vec![
        // Math-mode delimiters; escaped backslashes are matched first so that
        // `\\(` keeps both its `\\` and its `(`
        Rule::guarded(r"\\\\", r"\\[()\[\]]", ""),
        // Curly quotes are text-mode glyphs
        Rule::guarded(r"\\text\{’\}", "’", "\\text{’}"),
        Rule::guarded(r"\\text\{‘\}", "‘", "\\text{‘}"),
        // Layout-only; `\\hfill` is a line break followed by letters
        Rule::guarded(r"\\\\", r"\\hfill", ""),
        // Deprecated spellings
        Rule::guarded(r"\\\\", r"\\mbox", "\\mathrel"),
        Rule::guarded(r"\\\\", r"\\begin\{split\}", "\\begin{aligned}"),
        Rule::guarded(r"\\\\", r"\\end\{split\}", "\\end{aligned}"),
        // HTML entities left by the document source; `&amp;` goes first
        Rule::literal("&amp;", "&"),
        Rule::literal("&lt;", "<"),
        Rule::literal("&gt;", ">"),
        // Array placement and column spacing
        Rule::literal("{array}[t]", "{array}"),
        Rule::literal("{array}[b]", "{array}"),
        Rule::literal("@{~}", ""),
        Rule::literal("@{}", ""),
        Rule::literal("@{\\qquad}", ""),
        Rule::literal("@{\\qquad\\qquad}", ""),
        // Bare dollars, but not `\$`
        Rule::pattern(r"(^|[^\\])\$+", "${1}"),
    ];

    /// Output fixups for the KaTeX build this tool targets
    pub static ref PATCH_RULES: Vec<Rule> = vec![
        // The W3C validator rejects negative heights
        Rule::pattern(r"height:-[0-9]*\.?[0-9]+em", "height:0em"),
        // Attribute concatenation bug in links, plus the validator's forced underline
        Rule::literal("<ahref=\"<a", "<a style=\"border-bottom: 0px\" href=\""),
        // Stray fixed-height vlist spans
        Rule::pattern(r#"<span class="vlist" style="height:[0-9.]+em;">"#, r#"<span class="vlist">"#),
        // Bogus italic correction
        Rule::pattern(r#"mathit" style="margin-right:0\.[0-9]+em"#, r#"mathit" style=""#),
        Rule::pattern(r#"mainit" style="margin-right:0\.[0-9]+em"#, r#"mathit" style=""#),
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tables_compile() {
        assert_eq!(NORMALIZE_RULES.len(), 17);
        assert_eq!(PATCH_RULES.len(), 5);
    }

    #[test]
    fn test_literal_rule_borrows_when_absent() {
        let rule = Rule::literal("\\hfill", "");
        assert!(matches!(rule.apply("x + y"), Cow::Borrowed(_)));
        assert_eq!(rule.apply("a\\hfill b"), "a b");
    }

    #[test]
    fn test_guarded_rule_keeps_protected_tokens() {
        let rule = Rule::guarded(r"\\\\", r"\\[()\[\]]", "");
        assert_eq!(rule.apply(r"\(x\)"), "x");
        assert_eq!(rule.apply(r"a\\(b\\)"), r"a\\(b\\)");
        assert_eq!(rule.apply(r"\\\[x\]"), r"\\x");
    }

    #[test]
    fn test_dollar_rule() {
        let rule = &NORMALIZE_RULES[NORMALIZE_RULES.len() - 1];
        assert_eq!(rule.apply("$x$"), "x");
        assert_eq!(rule.apply("a$$b"), "ab");
        assert_eq!(rule.apply(r"\$5"), r"\$5");
        assert_eq!(rule.apply(r"\$$x"), r"\$x");
    }

    #[test]
    fn test_commands_after_line_break_untouched() {
        assert_eq!(apply_all(&NORMALIZE_RULES, r"a\\hfill(b"), r"a\\hfill(b");
        assert_eq!(apply_all(&NORMALIZE_RULES, r"a\\\hfill b"), r"a\\ b");
        assert_eq!(apply_all(&NORMALIZE_RULES, r"\\mbox"), r"\\mbox");
    }

    #[test]
    fn test_apply_all_in_order() {
        // `&amp;lt;` unescapes twice because `&amp;` runs before `&lt;`
        assert_eq!(apply_all(&NORMALIZE_RULES, "a &amp;lt; b"), "a < b");
    }
}
