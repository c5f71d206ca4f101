//! Single-argument macro extraction and expansion
//!
//! Fragments may carry their own shorthand in plain TeX form:
//!
//! ```text
//! \def\abs#1{\left|#1\right|} \abs{x - y}
//! ```
//!
//! Definitions are cut out of the text and every invocation is replaced by
//! the body with `#1` bound to the literal argument. This is not
//! a TeX macro processor: each macro is expanded in one pass, in the order
//! the definitions were found, and bodies are never re-scanned for macros
//! that were already processed.

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::core::scanner::find_balanced;
use crate::utils::error::MalformedInput;

/// Keyword that starts a definition (`\def` followed by the macro's backslash)
pub const DEF_PREFIX: &str = "\\def\\";

/// Parameter marker separating the macro name from its body
pub const PARAM_MARKER: &str = "#1";

/// Default cap on substitutions of a single macro
pub const DEFAULT_MAX_SUBSTITUTIONS: usize = 1000;

/// A macro definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macro {
    /// Macro name including its backslash, e.g. `\abs`
    pub name: String,
    /// Replacement group including its braces, e.g. `{\left|#1\right|}`
    pub body: String,
}

impl Macro {
    pub fn new(name: &str, body: &str) -> Self {
        Self {
            name: name.to_string(),
            body: body.to_string(),
        }
    }

    /// Prefix that starts an invocation of this macro
    pub fn invocation_prefix(&self) -> String {
        format!("{}{{", self.name)
    }

    /// Body with the parameter bound to `argument`
    pub fn apply(&self, argument: &str) -> String {
        self.body.replace(PARAM_MARKER, argument)
    }
}

/// Macros in definition-discovery order
///
/// Redefining a name replaces its body but keeps its original position, so
/// the expansion order is the order in which names were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroTable {
    macros: IndexMap<String, Macro>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a macro, returning the definition it replaced
    pub fn define(&mut self, macro_def: Macro) -> Option<Macro> {
        self.macros.insert(macro_def.name.clone(), macro_def)
    }

    /// Get a macro definition
    pub fn get(&self, name: &str) -> Option<&Macro> {
        self.macros.get(name)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    /// Macros in expansion order
    pub fn iter(&self) -> impl Iterator<Item = &Macro> {
        self.macros.values()
    }

    /// Macro names in expansion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.macros.keys().map(String::as_str)
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Definitions pulled out of a fragment
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Fragment text with every definition removed
    pub text: String,
    /// Collected macros
    pub macros: MacroTable,
    /// Names that were defined more than once
    pub redefined: Vec<String>,
}

/// Remove every `\def\name#1{body}` from `input` and collect the macros.
///
/// A definition without the `#1` marker, with an empty name, or with extra
/// parameter text before the body is an error; zero- and multi-argument
/// macros are not supported.
pub fn extract_definitions(input: &str) -> Result<Extraction, MalformedInput> {
    let mut text = input.to_string();
    let mut macros = MacroTable::new();
    let mut redefined = Vec::new();

    while let Some(span) = find_balanced(&text, DEF_PREFIX)? {
        let definition = &text[span.range()];
        let macro_def = parse_definition(definition)?;
        debug!(name = %macro_def.name, body = %macro_def.body, "found macro definition");

        if let Some(previous) = macros.define(macro_def) {
            warn!(name = %previous.name, "macro redefined, later definition wins");
            redefined.push(previous.name);
        }

        text.replace_range(span.range(), "");
    }

    Ok(Extraction {
        text,
        macros,
        redefined,
    })
}

/// Split a matched definition span into name and body
fn parse_definition(definition: &str) -> Result<Macro, MalformedInput> {
    // The span always starts with `\def\` and ends with the body group
    let after_def = &definition["\\def".len()..];
    let body_start = after_def
        .find('{')
        .ok_or_else(|| MalformedInput::definition(definition, "missing body"))?;
    let head = &after_def[..body_start];
    let body = &after_def[body_start..];

    let Some(marker) = head.find(PARAM_MARKER) else {
        return Err(MalformedInput::definition(
            definition,
            "missing parameter marker `#1`",
        ));
    };

    let name = &head[..marker];
    if name.len() <= 1 {
        return Err(MalformedInput::definition(definition, "empty macro name"));
    }
    if name.contains('#') {
        return Err(MalformedInput::definition(
            definition,
            "parameter marker must be `#1`",
        ));
    }

    let rest = &head[marker + PARAM_MARKER.len()..];
    if !rest.is_empty() {
        return Err(MalformedInput::definition(
            definition,
            format!("only single-argument macros are supported, found `{}`", rest),
        ));
    }

    Ok(Macro::new(name, body))
}

// ============================================================================
// Expansion
// ============================================================================

/// Result of expanding the invocations of a macro table
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    /// Fully expanded text
    pub text: String,
    /// Macros that were applied, in expansion order
    pub macros: MacroTable,
    /// Number of substitutions per macro name, in expansion order
    pub substitutions: IndexMap<String, usize>,
    /// Human-readable notes (redefinitions, unused macros)
    pub warnings: Vec<String>,
}

impl Expansion {
    /// Total number of substitutions performed
    pub fn total_substitutions(&self) -> usize {
        self.substitutions.values().sum()
    }

    /// Macros that were defined but never invoked
    pub fn unused(&self) -> impl Iterator<Item = &str> {
        self.substitutions
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(name, _)| name.as_str())
    }
}

/// Replace every invocation of every macro in `table`, one macro at a time.
///
/// Returns the expanded text and how many substitutions each macro made.
pub fn expand_invocations(
    input: &str,
    table: &MacroTable,
    max_substitutions: usize,
) -> Result<(String, IndexMap<String, usize>), MalformedInput> {
    let mut text = input.to_string();
    let mut counts = IndexMap::with_capacity(table.len());

    for macro_def in table.iter() {
        let prefix = macro_def.invocation_prefix();
        let mut count = 0;

        while let Some(span) = find_balanced(&text, &prefix)? {
            if count == max_substitutions {
                return Err(MalformedInput::ExpansionLimit {
                    name: macro_def.name.clone(),
                    limit: max_substitutions,
                });
            }
            let replacement = macro_def.apply(&text[span.inner()]);
            text.replace_range(span.range(), &replacement);
            count += 1;
        }

        debug!(name = %macro_def.name, count, "expanded macro");
        counts.insert(macro_def.name.clone(), count);
    }

    Ok((text, counts))
}

/// Extract the definitions in `input` and expand their invocations.
///
/// ```rust
/// use mathfrag::macros::{expand_macros, DEFAULT_MAX_SUBSTITUTIONS};
///
/// let out = expand_macros(r"\def\foo#1{(#1)}\foo{x}", DEFAULT_MAX_SUBSTITUTIONS).unwrap();
/// assert_eq!(out.text, "{(x)}");
/// ```
pub fn expand_macros(input: &str, max_substitutions: usize) -> Result<Expansion, MalformedInput> {
    let extraction = extract_definitions(input)?;
    if extraction.macros.is_empty() {
        return Ok(Expansion {
            text: extraction.text,
            ..Default::default()
        });
    }

    let (text, substitutions) =
        expand_invocations(&extraction.text, &extraction.macros, max_substitutions)?;

    let mut warnings: Vec<String> = extraction
        .redefined
        .iter()
        .map(|name| format!("macro {} is defined more than once; the last definition wins", name))
        .collect();
    warnings.extend(
        substitutions
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(name, _)| format!("macro {} is defined but never used", name)),
    );

    Ok(Expansion {
        text,
        macros: extraction.macros,
        substitutions,
        warnings,
    })
}

// ============================================================================
// Tests
// ============================================================================
