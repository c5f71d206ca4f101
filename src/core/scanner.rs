//! Balanced-brace scanner
//!
//! Locates a literal prefix and the brace group that follows it. This is the
//! only "parser" in the crate: macro definitions (`\def\name#1{...}`) and
//! macro invocations (`\name{...}`) are both found with it.
//!
//! Offsets are byte offsets taken from `char_indices`, so they always fall on
//! Unicode scalar boundaries and can be used to slice the text directly.

use std::ops::Range;

use crate::utils::error::MalformedInput;

/// A half-open span `[start, end)` from the start of the prefix through the
/// closing brace of the group that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalancedSpan {
    /// Start of the prefix
    pub start: usize,
    /// Offset of the first `{` at or after `start`
    pub open: usize,
    /// One past the matching `}`
    pub end: usize,
}

impl BalancedSpan {
    /// Whole span as a range
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Content strictly between the opening brace and its matching close
    pub fn inner(&self) -> Range<usize> {
        self.open + 1..self.end - 1
    }
}

/// Find the first `prefix` in `text` and the balanced brace group after it.
///
/// Returns `Ok(None)` when the prefix does not occur. A prefix that is not
/// followed by a `{`, or a group still open at end of text, is an error
/// rather than a truncated span.
///
/// ```rust
/// use mathfrag::scanner::find_balanced;
///
/// let span = find_balanced("a{b{c}d}e", "{").unwrap().unwrap();
/// assert_eq!(span.range(), 1..8);
/// ```
pub fn find_balanced(text: &str, prefix: &str) -> Result<Option<BalancedSpan>, MalformedInput> {
    let Some(start) = text.find(prefix) else {
        return Ok(None);
    };

    let mut depth: usize = 0;
    let mut open = None;

    for (offset, c) in text[start..].char_indices() {
        let pos = start + offset;
        match c {
            '{' => {
                if open.is_none() {
                    open = Some(pos);
                }
                depth += 1;
            }
            // Closers ahead of the first opener belong to the surrounding text
            '}' if open.is_some() => {
                depth -= 1;
                if depth == 0 {
                    return Ok(open.map(|open| BalancedSpan {
                        start,
                        open,
                        end: pos + 1,
                    }));
                }
            }
            _ => {}
        }
    }

    let (line, column) = line_and_column(text, start);
    if open.is_none() {
        Err(MalformedInput::MissingOpenBrace {
            prefix: prefix.to_string(),
            line,
            column,
        })
    } else {
        Err(MalformedInput::UnbalancedBraces {
            prefix: prefix.to_string(),
            line,
            column,
        })
    }
}

/// 1-based line and column (in scalars) of a byte offset.
pub fn line_and_column(text: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut column = 1;

    for (i, c) in text.char_indices() {
        if i >= offset {
            break;
        }
        if c == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }

    (line, column)
}

/// Braces that have no partner
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BraceMismatch {
    /// Byte offsets of `}` with no open group
    pub unmatched_close: Vec<usize>,
    /// Byte offsets of `{` never closed, outermost first
    pub unclosed_open: Vec<usize>,
}

impl BraceMismatch {
    pub fn is_balanced(&self) -> bool {
        self.unmatched_close.is_empty() && self.unclosed_open.is_empty()
    }
}

/// Pair up every grouping brace in `text`.
///
/// `\{` and `\}` are literal brace glyphs and are skipped; `\\{` is a line
/// break followed by a group.
pub fn brace_mismatch(text: &str) -> BraceMismatch {
    let mut result = BraceMismatch::default();
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        match c {
            '\\' => {
                escaped = !escaped;
                continue;
            }
            '{' if !escaped => result.unclosed_open.push(i),
            '}' if !escaped => {
                if result.unclosed_open.pop().is_none() {
                    result.unmatched_close.push(i);
                }
            }
            _ => {}
        }
        escaped = false;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_outer_span() {
        let text = "a{b{c}d}e";
        let span = find_balanced(text, "{").unwrap().unwrap();
        assert_eq!(span.range(), 1..8);
        assert_eq!(&text[span.range()], "{b{c}d}");
        assert_eq!(&text[span.inner()], "b{c}d");
    }

    #[test]
    fn test_prefix_not_found() {
        assert_eq!(find_balanced("x + y", "\\def\\").unwrap(), None);
    }

    #[test]
    fn test_span_starts_at_prefix() {
        let text = r"x \foo{a{b}} y";
        let span = find_balanced(text, r"\foo{").unwrap().unwrap();
        assert_eq!(&text[span.range()], r"\foo{a{b}}");
        assert_eq!(&text[span.inner()], "a{b}");
    }

    #[test]
    fn test_definition_span() {
        let text = r"\def\foo#1{(#1)}\foo{x}";
        let span = find_balanced(text, r"\def\").unwrap().unwrap();
        assert_eq!(&text[span.range()], r"\def\foo#1{(#1)}");
        assert_eq!(&text[span.open..span.end], "{(#1)}");
    }

    #[test]
    fn test_unmatched_brace_is_error() {
        let err = find_balanced("a{b{c}d", "{").unwrap_err();
        assert!(matches!(err, MalformedInput::UnbalancedBraces { .. }));
    }

    #[test]
    fn test_missing_open_brace_is_error() {
        let err = find_balanced(r"\def\foo#1", r"\def\").unwrap_err();
        assert!(matches!(err, MalformedInput::MissingOpenBrace { .. }));
    }

    #[test]
    fn test_closer_before_opener_is_ignored() {
        let text = r"\def\x}#1{y}";
        let span = find_balanced(text, r"\def\").unwrap().unwrap();
        assert_eq!(&text[span.range()], text);
    }

    #[test]
    fn test_multibyte_text() {
        let text = "‘α’ \\f{β{γ}}";
        let span = find_balanced(text, "\\f{").unwrap().unwrap();
        assert_eq!(&text[span.range()], "\\f{β{γ}}");
        assert_eq!(&text[span.inner()], "β{γ}");
    }

    #[test]
    fn test_error_position() {
        let err = find_balanced("ab\ncd ’\\g{x", "\\g{").unwrap_err();
        assert_eq!(
            err,
            MalformedInput::UnbalancedBraces {
                prefix: "\\g{".to_string(),
                line: 2,
                column: 5,
            }
        );
    }

    #[test]
    fn test_brace_mismatch() {
        assert!(brace_mismatch("{a}{b}").is_balanced());
        assert_eq!(brace_mismatch("a}b}").unmatched_close, vec![1, 3]);
        assert_eq!(brace_mismatch("{a{b}{").unclosed_open, vec![0, 5]);
        // offsets stay on char boundaries
        assert_eq!(brace_mismatch("α}").unmatched_close, vec![2]);
    }

    #[test]
    fn test_escaped_braces_are_not_groups() {
        assert!(brace_mismatch(r"\left\{ x \right.").is_balanced());
        assert!(brace_mismatch(r"\{a\}").is_balanced());
        assert_eq!(brace_mismatch(r"a\\{b").unclosed_open, vec![3]);
        assert_eq!(brace_mismatch(r"\\\}").unmatched_close, Vec::<usize>::new());
    }
}
