//! URL pattern compilation.
//!
//! Every URL match type is evaluated against the request path with the
//! query string already stripped. Pattern kinds other than `EQUALS` are
//! lowered to a single anchored regex obtained from the [`RegexCache`].

use super::regex_cache::RegexCache;
use crate::stub::UrlMatchType;
use regex::Regex;
use std::sync::Arc;
use tracing::warn;

/// Compiled URL predicate.
#[derive(Debug, Clone)]
pub enum CompiledUrlMatcher {
    /// Exact path equality.
    Equals(String),
    /// Anchored regex derived from CONTAINS, REGEX or PATH_TEMPLATE.
    Pattern(Arc<Regex>),
    /// The pattern could not be compiled; matches nothing.
    Never,
}

impl CompiledUrlMatcher {
    /// Compile a URL pattern. Never fails: an invalid regex degrades to
    /// [`CompiledUrlMatcher::Never`].
    pub fn compile(pattern: &str, match_type: UrlMatchType, cache: &RegexCache) -> Self {
        let source = match match_type {
            UrlMatchType::Equals => return Self::Equals(strip_query(pattern).to_string()),
            UrlMatchType::Contains => format!(".*{}.*", regex::escape(pattern)),
            UrlMatchType::Regex => pattern.to_string(),
            UrlMatchType::PathTemplate => template_to_regex(pattern),
        };

        match cache.get_full_match(&source) {
            Ok(regex) => Self::Pattern(regex),
            Err(e) => {
                warn!(
                    "Invalid {} url pattern '{}', stub will never match: {}",
                    match_type, pattern, e
                );
                Self::Never
            }
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Equals(expected) => path == expected,
            Self::Pattern(regex) => regex.is_match(path),
            Self::Never => false,
        }
    }
}

fn strip_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(path, _)| path)
}

/// Convert `/users/{id}/orders` into `/users/[^/]+/orders`.
///
/// Literal text between placeholders is escaped. An unclosed `{` is kept as
/// literal text.
fn template_to_regex(template: &str) -> String {
    let mut out = String::with_capacity(template.len() + 8);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}').map(|i| open + i) else {
            break;
        };
        out.push_str(&regex::escape(&rest[..open]));
        out.push_str("[^/]+");
        rest = &rest[close + 1..];
    }
    out.push_str(&regex::escape(rest));
    out
}
