//! Macro substitution for content strings with localization-key protection.
//!
//! This crate provides:
//! - A pluggable macro-resolution engine over `%(name)` syntax (with a
//!   legacy `${name}` alias), resolving recursively through macro-valued
//!   macros
//! - Map- and environment-backed resolvers
//! - Localization-key protection: `%(key.<name>)` references survive a full
//!   resolution pass verbatim instead of being consumed as unknown macros
//! - Key extraction helpers for possibly macro-wrapped strings
//!
//! # Example
//!
//! ```
//! use keyfence::{KeyProtectingResolver, MacroResolver, MapResolver};
//!
//! let inner = MapResolver::new().with_value("site", "Example");
//! let mut resolver = KeyProtectingResolver::new(inner);
//!
//! let out = resolver.resolve_macros("%(site): %(key.greeting)").unwrap();
//! assert_eq!(out, "Example: %(key.greeting)");
//! ```

pub mod error;
pub mod key_protect;
pub mod resolver;

// Re-export main types for convenience
pub use error::ResolveError;
pub use key_protect::{KEY_PREFIX, KeyProtectingResolver, extract_key, extract_key_resolved};
pub use resolver::{EnvResolver, MacroResolver, MapResolver, contains_macros, macro_names};
