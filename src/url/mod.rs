//! URL handling module
//!
//! Canonical URL form, origin derivation, host pattern matching and the
//! SSRF safety guard.

mod canonical;
mod guard;
mod matcher;

pub use canonical::{canonicalize, CanonicalUrl, Origin};
pub use guard::{is_public_ip, Resolver, SafetyGuard, SystemResolver, BUILTIN_BLOCKED_HOSTS};
pub use matcher::matches_host_pattern;
