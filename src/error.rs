//! Typed error variants for the keyfence crate.
//!
//! The resolution algorithm itself has no failure modes of its own: unknown
//! macros follow the keep-or-drop policy and malformed references are simply
//! not recognized. The only thing that can fail is a pluggable macro lookup,
//! and such failures pass through the resolution path unchanged.

use thiserror::Error;

/// Errors surfaced by [`MacroResolver`](crate::MacroResolver) implementations.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A pluggable macro lookup failed.
    ///
    /// Produced by custom [`macro_value`](crate::MacroResolver::macro_value)
    /// implementations that need to report I/O or backend failures. The
    /// bundled resolvers never produce this.
    #[error("macro lookup failed for '{name}': {source}")]
    Lookup {
        /// The macro name whose lookup failed.
        name: String,
        /// Underlying error from the lookup backend.
        #[source]
        source: anyhow::Error,
    },
}

impl ResolveError {
    /// Build a [`ResolveError::Lookup`] from a macro name and any error type
    /// convertible into [`anyhow::Error`].
    pub fn lookup(name: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        ResolveError::Lookup {
            name: name.into(),
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_error_display() {
        let err = ResolveError::lookup("user.name", anyhow::anyhow!("backend offline"));
        assert_eq!(
            err.to_string(),
            "macro lookup failed for 'user.name': backend offline"
        );
    }

    #[test]
    fn test_lookup_error_source_preserved() {
        let err = ResolveError::lookup("x", std::io::Error::other("disk gone"));
        let source = std::error::Error::source(&err).expect("source should be set");
        assert_eq!(source.to_string(), "disk gone");
    }
}
