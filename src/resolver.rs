//! Generic macro resolution over content strings.
//!
//! This module provides:
//! - The [`MacroResolver`] trait: a pluggable per-macro lookup plus a
//!   provided resolution algorithm over it
//! - [`MapResolver`] for in-memory macro values
//! - [`EnvResolver`] for environment-backed macro values
//! - Inspection helpers ([`contains_macros`], [`macro_names`])
//!
//! Macro references use `%(name)` syntax; `${name}` is accepted as a legacy
//! alias. Values may themselves contain macro references, which are resolved
//! by subsequent passes until the string stops changing.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ResolveError;

/// Upper bound on resolution passes over a single input.
///
/// Macro values referencing each other in a cycle would otherwise rewrite the
/// string forever. Hitting the bound logs a warning and returns the string as
/// resolved so far.
const MAX_PASSES: usize = 32;

/// Placeholder for escaped `%%(` while passes run; won't match the macro pattern.
const ESCAPED_PERCENT: &str = "\x00ESC_PERCENT\x00";
/// Placeholder for escaped `$${` while passes run; won't match the macro pattern.
const ESCAPED_DOLLAR: &str = "\x00ESC_DOLLAR\x00";

/// Regex matching one innermost macro reference in either syntax.
/// Compiled once at startup using LazyLock to avoid recompiling on every pass.
static MACRO_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"%\(([^()]*)\)|\$\{([^{}]*)\}")
        .expect("macro reference regex is a compile-time constant and must be valid")
});

/// A macro-resolution capability: a per-macro lookup plus a provided
/// resolution algorithm that drives it.
///
/// Implementors supply [`macro_value`](Self::macro_value) and optionally the
/// [`keep_unresolved`](Self::keep_unresolved) policy; the provided
/// [`resolve_macros`](Self::resolve_macros) runs the generic algorithm over
/// them. Wrappers that need to pre- or post-process a whole resolution pass
/// (see [`KeyProtectingResolver`](crate::KeyProtectingResolver)) override
/// `resolve_macros` and delegate the scan itself back to [`expand`].
pub trait MacroResolver {
    /// Look up the value for a single macro name.
    ///
    /// Returns `Ok(None)` for unknown macros; what happens to the reference
    /// then is decided by [`keep_unresolved`](Self::keep_unresolved).
    fn macro_value(&mut self, name: &str) -> Result<Option<String>, ResolveError>;

    /// Whether unknown macro references are kept as literal text (`true`,
    /// the default) or dropped from the output (`false`).
    fn keep_unresolved(&self) -> bool {
        true
    }

    /// Resolve every macro reference in `input`, recursively, and return the
    /// resulting string.
    fn resolve_macros(&mut self, input: &str) -> Result<String, ResolveError> {
        expand(self, input)
    }
}

/// Run the generic resolution algorithm over `input` using `resolver` as the
/// per-macro lookup.
///
/// This is the body of the provided [`MacroResolver::resolve_macros`]; it is
/// exposed so that wrapper resolvers overriding `resolve_macros` can still
/// delegate the scan itself while adding their own pre/post processing.
///
/// - Each pass replaces every innermost `%(name)` / `${name}` reference with
///   its looked-up value.
/// - Passes repeat until one changes nothing, so values containing further
///   macro references are resolved inside out.
/// - `%%(` and `$${` escape to literal `%(` and `${` and are never treated
///   as a macro start.
pub fn expand<R: MacroResolver + ?Sized>(
    resolver: &mut R,
    input: &str,
) -> Result<String, ResolveError> {
    if !MACRO_PATTERN.is_match(input) && !input.contains("%%(") && !input.contains("$${") {
        return Ok(input.to_string());
    }

    // Hide escaped delimiters from the passes, restore them at the end
    let mut current = input
        .replace("%%(", ESCAPED_PERCENT)
        .replace("$${", ESCAPED_DOLLAR);

    for pass in 1..=MAX_PASSES {
        let (next, changed) = expand_pass(resolver, &current)?;
        log::trace!(
            "macro resolution pass {pass}: {} -> {} chars",
            current.len(),
            next.len()
        );
        current = next;
        if !changed {
            break;
        }
        if pass == MAX_PASSES {
            log::warn!(
                "macro resolution stopped after {MAX_PASSES} passes; \
                 the input likely contains a macro cycle"
            );
        }
    }

    Ok(current
        .replace(ESCAPED_PERCENT, "%(")
        .replace(ESCAPED_DOLLAR, "${"))
}

/// One left-to-right pass: replace each innermost macro reference.
///
/// Returns the rewritten string and whether anything changed.
fn expand_pass<R: MacroResolver + ?Sized>(
    resolver: &mut R,
    input: &str,
) -> Result<(String, bool), ResolveError> {
    let mut out = String::with_capacity(input.len());
    let mut last = 0;
    let mut changed = false;

    for caps in MACRO_PATTERN.captures_iter(input) {
        let whole = caps.get(0).unwrap();
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();

        out.push_str(&input[last..whole.start()]);
        match resolver.macro_value(name)? {
            Some(value) => {
                if value != whole.as_str() {
                    changed = true;
                }
                out.push_str(&value);
            }
            None if resolver.keep_unresolved() => out.push_str(whole.as_str()),
            None => changed = true,
        }
        last = whole.end();
    }
    out.push_str(&input[last..]);

    Ok((out, changed))
}

/// Check whether `text` contains at least one macro reference.
pub fn contains_macros(text: &str) -> bool {
    MACRO_PATTERN.is_match(text)
}

/// Extract all macro names referenced in `text`, in document order.
///
/// Only innermost references are reported (the name of `%(a%(b))` is not a
/// resolvable name until `%(b)` has been substituted). Duplicates are kept.
pub fn macro_names(text: &str) -> Vec<String> {
    MACRO_PATTERN
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Macro resolver backed by an in-memory map of values.
#[derive(Debug, Clone)]
pub struct MapResolver {
    /// Macro name -> value
    values: HashMap<String, String>,
    /// Policy for unknown macros, see [`MacroResolver::keep_unresolved`]
    keep_unresolved: bool,
}

impl MapResolver {
    /// Create an empty resolver that keeps unknown macros as literal text.
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
            keep_unresolved: true,
        }
    }

    /// Add a macro value.
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Set the unknown-macro policy.
    pub fn with_keep_unresolved(mut self, keep: bool) -> Self {
        self.keep_unresolved = keep;
        self
    }

    /// Add or replace a macro value on an existing resolver.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }
}

impl Default for MapResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl MacroResolver for MapResolver {
    fn macro_value(&mut self, name: &str) -> Result<Option<String>, ResolveError> {
        Ok(self.values.get(name).cloned())
    }

    fn keep_unresolved(&self) -> bool {
        self.keep_unresolved
    }
}

/// Macro resolver backed by process environment variables.
///
/// Unset or non-unicode variables resolve to `None` and are therefore kept
/// as literal text under the default policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvResolver;

impl EnvResolver {
    /// Create an environment-backed resolver.
    pub fn new() -> Self {
        Self
    }
}

impl MacroResolver for EnvResolver {
    fn macro_value(&mut self, name: &str) -> Result<Option<String>, ResolveError> {
        Ok(std::env::var(name).ok())
    }
}
