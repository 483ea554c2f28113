//! Localization-key protection for macro resolution.
//!
//! Content strings mix ordinary macros with localization-key references like
//! `%(key.page.title)`. The key references must survive a full resolution
//! pass untouched: they are meant for a later localization stage, and the
//! generic engine would otherwise consume them as unknown macros or mangle
//! them while expanding surrounding text.
//!
//! [`KeyProtectingResolver`] wraps any [`MacroResolver`] and shields the key
//! references in two passes:
//! 1. During resolution, every `key.`-prefixed lookup is intercepted and
//!    answered with a freshly generated UUID token instead of being forwarded
//!    to the wrapped resolver. The token is recorded in a per-session table.
//!    To the engine the token is inert text: it carries no macro syntax, so
//!    surrounding expansion can wrap, move, or duplicate it freely.
//! 2. After the engine finishes, the output is scanned for the fixed-format
//!    token pattern and every recorded token is replaced with the original
//!    `%(key.<name>)` reference.
//!
//! All other macro names pass through to the wrapped resolver unchanged, so
//! protection is invisible when no key references are present.

use std::collections::HashMap;
use std::mem;
use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use crate::error::ResolveError;
use crate::resolver::{self, MacroResolver};

/// Reserved macro-name prefix identifying localization-key references.
pub const KEY_PREFIX: &str = "key.";

/// Token pattern: the hyphenated lowercase form of a UUID, the fixed-length
/// textual encoding produced by [`Uuid::new_v4`].
/// Compiled once at startup using LazyLock to avoid recompiling on every restore.
static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
        .expect("token regex is a compile-time constant and must be valid")
});

/// Anchored pattern for a string that is exactly one localization-key
/// reference, nothing more.
static KEY_REFERENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^%\(key\.(.*)\)$")
        .expect("key reference regex is a compile-time constant and must be valid")
});

/// Macro resolver wrapper that preserves localization-key references across
/// a resolution pass.
///
/// One value per resolution session: the token table is private mutable
/// state, so construct a wrapper per top-level
/// [`resolve_macros`](MacroResolver::resolve_macros) call chain and discard
/// it afterward. The `&mut self` receiver enforces exclusive use within a
/// session.
#[derive(Debug)]
pub struct KeyProtectingResolver<R> {
    /// The wrapped resolver; receives every non-key lookup verbatim.
    inner: R,
    /// Session token table: generated token -> original key name.
    keys: HashMap<String, String>,
}

impl<R: MacroResolver> KeyProtectingResolver<R> {
    /// Wrap `inner`, leaving its lookup behavior untouched for every macro
    /// name outside the reserved `key.` prefix.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            keys: HashMap::new(),
        }
    }

    /// Unwrap and return the inner resolver.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: MacroResolver> MacroResolver for KeyProtectingResolver<R> {
    /// The override point: intercept `key.`-prefixed names, forward the rest.
    ///
    /// Every name carrying the literal prefix is intercepted; the remainder
    /// of the name is an opaque key, recorded in the session table under a
    /// fresh token that is returned as the macro's value.
    fn macro_value(&mut self, name: &str) -> Result<Option<String>, ResolveError> {
        if let Some(key) = name.strip_prefix(KEY_PREFIX) {
            let token = Uuid::new_v4().to_string();
            log::debug!("protecting localization key '{key}' as {token}");
            self.keys.insert(token.clone(), key.to_string());
            Ok(Some(token))
        } else {
            self.inner.macro_value(name)
        }
    }

    fn keep_unresolved(&self) -> bool {
        self.inner.keep_unresolved()
    }

    /// Resolve `input` fully while preserving localization-key references.
    ///
    /// Runs the generic resolution algorithm with `self` as the lookup, then
    /// restores every token recorded during the pass. The token table lives
    /// for exactly this one session; it is emptied before returning.
    fn resolve_macros(&mut self, input: &str) -> Result<String, ResolveError> {
        let expanded = resolver::expand(self, input)?;
        let keys = mem::take(&mut self.keys);
        Ok(restore_keys(&expanded, &keys))
    }
}

/// Replace every recorded token in `resolved` with its original
/// `%(key.<name>)` reference.
///
/// Restoration is a global scan keyed by exact token value, so a token the
/// engine duplicated into several places is restored at each occurrence.
/// Text that merely resembles the token pattern but is absent from the table
/// is left unmodified.
fn restore_keys(resolved: &str, keys: &HashMap<String, String>) -> String {
    if keys.is_empty() {
        return resolved.to_string();
    }
    TOKEN_PATTERN
        .replace_all(resolved, |caps: &regex::Captures| {
            let token = &caps[0];
            match keys.get(token) {
                Some(key) => {
                    log::debug!("restoring localization key '{key}'");
                    format!("%(key.{key})")
                }
                None => token.to_string(),
            }
        })
        .into_owned()
}

/// Extract the key name from a string that is exactly one localization-key
/// reference.
///
/// Returns `Some("bar")` for `"%(key.bar)"` and `None` for anything else,
/// including strings that merely contain a key reference among other text.
pub fn extract_key(text: &str) -> Option<&str> {
    KEY_REFERENCE_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Resolve `text` with key protection over `inner`, then extract the key
/// name if the fully resolved result is exactly one key reference.
///
/// This answers "which single localization key does this possibly
/// macro-wrapped string refer to" without resolving the key itself: macros
/// around or producing the key reference are expanded by `inner`, the key
/// reference survives protected, and the anchored extraction is applied to
/// the final string.
pub fn extract_key_resolved<R: MacroResolver>(
    text: &str,
    inner: R,
) -> Result<Option<String>, ResolveError> {
    let mut protector = KeyProtectingResolver::new(inner);
    let resolved = protector.resolve_macros(text)?;
    Ok(extract_key(&resolved).map(str::to_owned))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::MapResolver;

    #[test]
    fn test_key_reference_preserved() {
        let mut resolver = KeyProtectingResolver::new(MapResolver::new());

        let result = resolver.resolve_macros("%(key.foo)").unwrap();
        assert_eq!(result, "%(key.foo)");
    }

    #[test]
    fn test_key_prefix_requires_exact_match() {
        // "keyring.foo" does not carry the reserved prefix and is forwarded
        let inner = MapResolver::new().with_value("keyring.foo", "unlocked");
        let mut resolver = KeyProtectingResolver::new(inner);

        let result = resolver.resolve_macros("%(keyring.foo)").unwrap();
        assert_eq!(result, "unlocked");
    }

    #[test]
    fn test_degenerate_empty_key_is_intercepted() {
        let mut resolver = KeyProtectingResolver::new(MapResolver::new());

        let result = resolver.resolve_macros("%(key.)").unwrap();
        assert_eq!(result, "%(key.)");
    }

    #[test]
    fn test_restore_duplicated_token() {
        let mut keys = HashMap::new();
        let token = Uuid::new_v4().to_string();
        keys.insert(token.clone(), "foo".to_string());

        let resolved = format!("a {token} b {token} c");
        assert_eq!(restore_keys(&resolved, &keys), "a %(key.foo) b %(key.foo) c");
    }

    #[test]
    fn test_restore_leaves_unknown_tokens_alone() {
        let mut keys = HashMap::new();
        keys.insert(Uuid::new_v4().to_string(), "foo".to_string());

        let stray = "0123abcd-0000-4000-8000-0123456789ab";
        assert_eq!(restore_keys(stray, &keys), stray);
    }

    #[test]
    fn test_restore_with_empty_table_is_identity() {
        let text = "no tokens were generated for this string";
        assert_eq!(restore_keys(text, &HashMap::new()), text);
    }

    #[test]
    fn test_table_emptied_between_sessions() {
        let mut resolver = KeyProtectingResolver::new(MapResolver::new());

        resolver.resolve_macros("%(key.first)").unwrap();
        assert!(resolver.keys.is_empty());

        let result = resolver.resolve_macros("%(key.second)").unwrap();
        assert_eq!(result, "%(key.second)");
        assert!(resolver.keys.is_empty());
    }

    #[test]
    fn test_extract_key_exact_match() {
        assert_eq!(extract_key("%(key.bar)"), Some("bar"));
        assert_eq!(extract_key("%(key.page.title)"), Some("page.title"));
    }

    #[test]
    fn test_extract_key_rejects_non_references() {
        assert_eq!(extract_key("not a key"), None);
        assert_eq!(extract_key("%(key.bar)x"), None);
        assert_eq!(extract_key("x%(key.bar)"), None);
        assert_eq!(extract_key("%(other.bar)"), None);
        assert_eq!(extract_key(""), None);
    }

    #[test]
    fn test_into_inner_returns_wrapped_resolver() {
        let inner = MapResolver::new().with_value("site", "Example");
        let resolver = KeyProtectingResolver::new(inner);

        let mut unwrapped = resolver.into_inner();
        assert_eq!(
            unwrapped.macro_value("site").unwrap(),
            Some("Example".to_string())
        );
    }
}
