//! Stub predicate compilation and evaluation.
//!
//! # Module Structure
//!
//! - `compiler` - [`PatternCompiler`] and the executable [`CompiledMatcher`]
//! - `url_matcher` - EQUALS / CONTAINS / REGEX / PATH_TEMPLATE URL checks
//! - `field_matcher` - header and query parameter rules
//! - `body_matcher` - body rules with the ordered parse fallback chain
//! - `regex_cache` - process-wide cache of compiled regexes
//!
//! Compilation never fails. A malformed sub-pattern either matches nothing
//! (URL, regex, JSONPath) or is dropped from the matcher (header/query
//! patterns that are not JSON objects), and a warning is logged.

mod body_matcher;
mod compiler;
mod field_matcher;
mod regex_cache;
mod url_matcher;

pub use body_matcher::{CompiledBodyMatcher, ExpectedJson};
pub use compiler::{CompiledMatcher, PatternCompiler};
pub use field_matcher::{CompiledFieldMatcher, CompiledFieldRule, FieldSource};
pub use regex_cache::{anchor, RegexCache, RegexCacheStats};
pub use url_matcher::CompiledUrlMatcher;

use crate::stub::StubRule;

/// Compile a rule against the process-wide regex cache.
pub fn compile(rule: &StubRule) -> CompiledMatcher {
    PatternCompiler::default().compile(rule)
}
