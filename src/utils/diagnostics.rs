//! Fragment diagnostics
//!
//! Runs the text transforms without rendering and reports what would go
//! wrong (or look suspicious) when the fragment is rendered:
//!
//! - Unbalanced braces and environments
//! - Malformed `\def` definitions and runaway macros
//! - Redefined or unused macros
//!
//! ## Example
//!
//! ```rust
//! use mathfrag::diagnostics::check_fragment;
//!
//! let result = check_fragment(r"\frac{1}{2", 1000);
//! assert!(result.has_errors());
//! ```

use std::fmt;

use crate::core::pipeline::prepare;
use crate::core::scanner::{brace_mismatch, line_and_column};
use crate::utils::error::{Error, MalformedInput};

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagnosticLevel {
    Info,
    /// The fragment renders, but probably not as intended
    Warning,
    /// The fragment will be rejected
    Error,
}

impl DiagnosticLevel {
    pub fn label(self) -> &'static str {
        match self {
            DiagnosticLevel::Info => "info",
            DiagnosticLevel::Warning => "warning",
            DiagnosticLevel::Error => "error",
        }
    }

    /// ANSI color used by [`format_diagnostics`]
    fn ansi(self) -> &'static str {
        match self {
            DiagnosticLevel::Info => "34",
            DiagnosticLevel::Warning => "33",
            DiagnosticLevel::Error => "31",
        }
    }
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single diagnostic message
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    /// Line number (1-indexed)
    pub line: Option<usize>,
    /// Column number (1-indexed, in characters)
    pub column: Option<usize>,
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn new(level: DiagnosticLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            line: None,
            column: None,
            suggestion: None,
        }
    }

    pub fn with_location(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(col)) => write!(f, "{}[{}:{}]: {}", self.level, line, col, self.message)?,
            _ => write!(f, "{}: {}", self.level, self.message)?,
        }
        if let Some(ref suggestion) = self.suggestion {
            write!(f, "\n  help: {}", suggestion)?;
        }
        Ok(())
    }
}

/// Check result with summary
#[derive(Debug, Default)]
pub struct CheckResult {
    pub diagnostics: Vec<Diagnostic>,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
}

impl CheckResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, diag: Diagnostic) {
        match diag.level {
            DiagnosticLevel::Error => self.errors += 1,
            DiagnosticLevel::Warning => self.warnings += 1,
            DiagnosticLevel::Info => self.infos += 1,
        }
        self.diagnostics.push(diag);
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        for (count, noun) in [
            (self.errors, "error"),
            (self.warnings, "warning"),
            (self.infos, "note"),
        ] {
            if count > 0 {
                parts.push(format!("{} {}{}", count, noun, if count == 1 { "" } else { "s" }));
            }
        }
        if parts.is_empty() {
            "no issues found".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Check a raw fragment
pub fn check_fragment(input: &str, max_substitutions: usize) -> CheckResult {
    let mut result = CheckResult::new();

    check_brace_balance(input, &mut result);
    check_environment_balance(input, &mut result);

    // Brace errors already explain why preparation would fail
    if result.has_errors() {
        return result;
    }

    match prepare(input, max_substitutions) {
        Ok(prepared) => {
            let expansion = &prepared.expansion;
            for warning in &expansion.warnings {
                result.add(Diagnostic::new(DiagnosticLevel::Warning, warning.clone()));
            }
            if !expansion.macros.is_empty() {
                result.add(Diagnostic::new(
                    DiagnosticLevel::Info,
                    format!(
                        "{} macro{} defined, {} substitution{}",
                        expansion.macros.len(),
                        if expansion.macros.len() == 1 { "" } else { "s" },
                        expansion.total_substitutions(),
                        if expansion.total_substitutions() == 1 { "" } else { "s" }
                    ),
                ));
            }
        }
        Err(Error::Malformed(malformed)) => result.add(malformed_diagnostic(&malformed)),
        Err(other) => result.add(Diagnostic::new(DiagnosticLevel::Error, other.to_string())),
    }

    result
}

fn malformed_diagnostic(malformed: &MalformedInput) -> Diagnostic {
    let diag = Diagnostic::new(DiagnosticLevel::Error, malformed.to_string());
    match malformed {
        MalformedInput::MalformedDefinition { .. } => {
            diag.with_suggestion(r"Definitions must have the form \def\name#1{body}")
        }
        MalformedInput::ExpansionLimit { .. } => {
            diag.with_suggestion("Check whether the macro invokes itself")
        }
        // Positions refer to the normalized text, which the user never sees
        MalformedInput::MissingOpenBrace { .. } | MalformedInput::UnbalancedBraces { .. } => diag,
    }
}

fn check_brace_balance(input: &str, result: &mut CheckResult) {
    let mismatch = brace_mismatch(input);

    for &offset in &mismatch.unmatched_close {
        let (line, col) = line_and_column(input, offset);
        result.add(
            Diagnostic::new(DiagnosticLevel::Error, "unmatched closing brace '}'")
                .with_location(line, col)
                .with_suggestion("Check for missing opening brace"),
        );
    }

    let open = &mismatch.unclosed_open;
    if let Some(&first) = open.first() {
        let (line, col) = line_and_column(input, first);
        result.add(
            Diagnostic::new(
                DiagnosticLevel::Error,
                format!(
                    "{} unclosed brace{}",
                    open.len(),
                    if open.len() == 1 { "" } else { "s" }
                ),
            )
            .with_location(line, col)
            .with_suggestion("Check for missing closing brace '}'"),
        );
    }
}

fn check_environment_balance(input: &str, result: &mut CheckResult) {
    let mut stack: Vec<(&str, usize)> = Vec::new();
    let mut pos = 0;

    while let Some(found) = input[pos..].find('\\') {
        let at = pos + found;
        let rest = &input[at..];

        let (is_begin, keyword_len) = if rest.starts_with(r"\begin{") {
            (true, r"\begin{".len())
        } else if rest.starts_with(r"\end{") {
            (false, r"\end{".len())
        } else {
            pos = at + 1;
            continue;
        };

        let Some(close) = rest[keyword_len..].find('}') else {
            break;
        };
        let name = &rest[keyword_len..keyword_len + close];
        pos = at + keyword_len + close + 1;

        if is_begin {
            stack.push((name, at));
            continue;
        }

        let (line, col) = line_and_column(input, at);
        match stack.pop() {
            Some((open_name, _)) if open_name == name => {}
            Some((open_name, open_at)) => {
                let (open_line, _) = line_and_column(input, open_at);
                result.add(
                    Diagnostic::new(
                        DiagnosticLevel::Error,
                        format!(
                            "mismatched environment: opened '{}' at line {}, closed '{}'",
                            open_name, open_line, name
                        ),
                    )
                    .with_location(line, col)
                    .with_suggestion(format!("Use \\end{{{}}}", open_name)),
                );
            }
            None => {
                result.add(
                    Diagnostic::new(DiagnosticLevel::Error, format!("unmatched \\end{{{}}}", name))
                        .with_location(line, col)
                        .with_suggestion("Check for missing \\begin"),
                );
            }
        }
    }

    for (name, at) in stack {
        let (line, col) = line_and_column(input, at);
        result.add(
            Diagnostic::new(DiagnosticLevel::Error, format!("unclosed environment '{}'", name))
                .with_location(line, col)
                .with_suggestion(format!("Add \\end{{{}}}", name)),
        );
    }
}

/// Format check results for terminal output, one block per diagnostic and
/// a summary line.
pub fn format_diagnostics(result: &CheckResult, use_color: bool) -> String {
    let paint = |code: &str, text: String| {
        if use_color {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        } else {
            text
        }
    };

    let summary_level = result
        .diagnostics
        .iter()
        .map(|d| d.level)
        .filter(|level| *level != DiagnosticLevel::Info)
        .max();
    let summary_code = summary_level.map_or("32", DiagnosticLevel::ansi);

    let mut blocks: Vec<String> = result
        .diagnostics
        .iter()
        .map(|diag| paint(diag.level.ansi(), diag.to_string()))
        .collect();
    blocks.push(paint(summary_code, format!("Summary: {}", result.summary())));
    blocks.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: usize = 1000;

    #[test]
    fn test_clean_fragment() {
        let result = check_fragment(r"\frac{1}{2}", LIMIT);
        assert!(result.is_empty());
        assert_eq!(result.summary(), "no issues found");
    }

    #[test]
    fn test_unclosed_brace_location() {
        let result = check_fragment("x\n\\frac{1}{2", LIMIT);
        assert!(result.has_errors());
        let diag = &result.diagnostics[0];
        assert_eq!(diag.line, Some(2));
        assert_eq!(diag.column, Some(9));
    }

    #[test]
    fn test_unmatched_closing_brace() {
        let result = check_fragment("a}b", LIMIT);
        assert_eq!(result.errors, 1);
        assert_eq!(result.diagnostics[0].column, Some(2));
    }

    #[test]
    fn test_escaped_braces() {
        let result = check_fragment(r"\left\{ x \right.", LIMIT);
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
        assert!(check_fragment(r"\{x", LIMIT).is_empty());
    }

    #[test]
    fn test_colored_summary() {
        let text = format_diagnostics(&check_fragment("x", LIMIT), true);
        assert_eq!(text, "\x1b[32mSummary: no issues found\x1b[0m");
        let text = format_diagnostics(&check_fragment("a}", LIMIT), true);
        assert!(text.starts_with("\x1b[31merror[1:2]"));
    }

    #[test]
    fn test_environments() {
        assert!(!check_fragment(r"\begin{aligned}x\end{aligned}", LIMIT).has_errors());
        assert!(check_fragment(r"\begin{aligned}x", LIMIT).has_errors());
        assert!(check_fragment(r"\begin{aligned}x\end{array}", LIMIT).has_errors());
        assert!(check_fragment(r"x\end{array}", LIMIT).has_errors());
    }

    #[test]
    fn test_malformed_definition() {
        let result = check_fragment(r"\def\x{1}", LIMIT);
        assert!(result.has_errors());
        assert!(result.diagnostics[0].suggestion.is_some());
    }

    #[test]
    fn test_unused_and_redefined_macros() {
        let result = check_fragment(r"\def\a#1{#1}\def\b#1{#1}\def\a#1{#1}\a{x}", LIMIT);
        assert!(!result.has_errors());
        assert_eq!(result.warnings, 2);
        assert_eq!(result.infos, 1);
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.message.contains(r"\b is defined but never used")));
    }

    #[test]
    fn test_runaway_macro() {
        let result = check_fragment(r"\def\r#1{\r{#1}}\r{x}", 20);
        assert!(result.has_errors());
        assert!(result.diagnostics[0].message.contains("20 times"));
    }

    #[test]
    fn test_summary_format() {
        let mut result = CheckResult::new();
        result.add(Diagnostic::new(DiagnosticLevel::Error, "test"));
        result.add(Diagnostic::new(DiagnosticLevel::Warning, "test"));
        result.add(Diagnostic::new(DiagnosticLevel::Warning, "test"));
        assert_eq!(result.summary(), "1 error, 2 warnings");
    }

    #[test]
    fn test_format_without_color() {
        let result = check_fragment("a}", LIMIT);
        let text = format_diagnostics(&result, false);
        assert!(text.contains("error[1:2]: unmatched closing brace"));
        assert!(text.ends_with("Summary: 1 error"));
        assert!(!text.contains('\x1b'));
    }
}
