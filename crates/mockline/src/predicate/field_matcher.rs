//! Header and query parameter predicates.
//!
//! Both dimensions share the same declarative shape: a JSON object mapping a
//! field name to one rule object,
//!
//! ```json
//! { "X-Tenant": { "equalTo": "acme" }, "Accept": { "contains": "json" } }
//! ```
//!
//! Rule keys are checked in order `equalTo`, `contains`, `matches`; the first
//! one present wins. A field whose rule has none of them is not checked.

use super::regex_cache::RegexCache;
use crate::request::MatchRequest;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::warn;

/// Which part of the request a field matcher reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    Header,
    Query,
}

impl FieldSource {
    fn label(&self) -> &'static str {
        match self {
            FieldSource::Header => "header",
            FieldSource::Query => "query",
        }
    }
}

/// One compiled field rule.
#[derive(Debug, Clone)]
pub enum CompiledFieldRule {
    EqualTo(String),
    Contains(String),
    /// `None` when the declared regex failed to compile; never matches.
    Matches(Option<Arc<Regex>>),
}

impl CompiledFieldRule {
    fn compile(name: &str, rule: &Map<String, Value>, cache: &RegexCache) -> Option<Self> {
        if let Some(v) = rule.get("equalTo") {
            return Some(Self::EqualTo(scalar_text(v)));
        }
        if let Some(v) = rule.get("contains") {
            return Some(Self::Contains(scalar_text(v)));
        }
        if let Some(v) = rule.get("matches") {
            let pattern = scalar_text(v);
            let compiled = match cache.get_full_match(&pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("Invalid regex '{}' for field '{}': {}", pattern, name, e);
                    None
                }
            };
            return Some(Self::Matches(compiled));
        }
        None
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::EqualTo(expected) => value == expected,
            Self::Contains(needle) => value.contains(needle.as_str()),
            Self::Matches(Some(re)) => re.is_match(value),
            Self::Matches(None) => false,
        }
    }
}

/// All declared field rules for one dimension. Every rule must pass.
#[derive(Debug, Clone)]
pub struct CompiledFieldMatcher {
    source: FieldSource,
    fields: Vec<(String, CompiledFieldRule)>,
}

impl CompiledFieldMatcher {
    /// Compile a raw pattern. Returns `None` when the pattern is blank or is
    /// not a JSON object, in which case the dimension is not checked.
    pub fn compile(raw: Option<&str>, source: FieldSource, cache: &RegexCache) -> Option<Self> {
        let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
        let parsed: Map<String, Value> = match serde_json::from_str(raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!(
                    "Ignoring {} pattern that is not a JSON object: {}",
                    source.label(),
                    raw
                );
                return None;
            }
        };

        let fields = parsed
            .iter()
            .filter_map(|(name, rule)| {
                let rule = rule.as_object()?;
                let compiled = CompiledFieldRule::compile(name, rule, cache)?;
                let name = match source {
                    FieldSource::Header => name.to_ascii_lowercase(),
                    FieldSource::Query => name.clone(),
                };
                Some((name, compiled))
            })
            .collect();

        Some(Self { source, fields })
    }

    pub fn source(&self) -> FieldSource {
        self.source
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// A field passes when any of its values passes. A declared field that
    /// the request does not carry fails.
    pub fn matches(&self, request: &MatchRequest) -> bool {
        self.fields.iter().all(|(name, rule)| {
            let values = match self.source {
                FieldSource::Header => request.header_values(name),
                FieldSource::Query => request.query_values(name),
            };
            values.is_some_and(|values| values.iter().any(|v| rule.matches(v)))
        })
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(raw: &str) -> CompiledFieldMatcher {
        CompiledFieldMatcher::compile(Some(raw), FieldSource::Header, &RegexCache::new()).unwrap()
    }

    fn query(raw: &str) -> CompiledFieldMatcher {
        CompiledFieldMatcher::compile(Some(raw), FieldSource::Query, &RegexCache::new()).unwrap()
    }

    #[test]
    fn test_header_equal_to_is_case_insensitive_on_name() {
        let m = headers(r#"{"X-Tenant": {"equalTo": "acme"}}"#);
        let req = MatchRequest::new("GET", "/").with_header("x-tenant", "acme");
        assert!(m.matches(&req));
        let req = MatchRequest::new("GET", "/").with_header("X-Tenant", "ACME");
        assert!(!m.matches(&req));
    }

    #[test]
    fn test_missing_header_fails() {
        let m = headers(r#"{"Authorization": {"contains": "Bearer"}}"#);
        assert!(!m.matches(&MatchRequest::new("GET", "/")));
    }

    #[test]
    fn test_rule_key_priority() {
        // equalTo wins over matches when both are declared.
        let m = headers(r#"{"X-A": {"matches": ".*", "equalTo": "exact"}}"#);
        let req = MatchRequest::new("GET", "/").with_header("X-A", "other");
        assert!(!m.matches(&req));
    }

    #[test]
    fn test_header_matches_is_full_match() {
        let m = headers(r#"{"Accept": {"matches": "application/.*json"}}"#);
        let req = MatchRequest::new("GET", "/").with_header("Accept", "application/vnd.api+json");
        assert!(m.matches(&req));
        let req = MatchRequest::new("GET", "/").with_header("Accept", "text/html, application/json");
        assert!(!m.matches(&req));
    }

    #[test]
    fn test_unknown_rule_type_is_ignored() {
        let m = headers(r#"{"X-A": {"absent": true}, "X-B": {"equalTo": "1"}}"#);
        assert_eq!(m.len(), 1);
        let req = MatchRequest::new("GET", "/").with_header("X-B", "1");
        assert!(m.matches(&req));
    }

    #[test]
    fn test_invalid_regex_never_matches() {
        let m = headers(r#"{"X-A": {"matches": "("}}"#);
        let req = MatchRequest::new("GET", "/").with_header("X-A", "(");
        assert!(!m.matches(&req));
    }

    #[test]
    fn test_non_object_pattern_is_omitted() {
        let cache = RegexCache::new();
        assert!(CompiledFieldMatcher::compile(Some("not json"), FieldSource::Header, &cache).is_none());
        assert!(CompiledFieldMatcher::compile(Some("[1,2]"), FieldSource::Query, &cache).is_none());
        assert!(CompiledFieldMatcher::compile(Some("  "), FieldSource::Query, &cache).is_none());
        assert!(CompiledFieldMatcher::compile(None, FieldSource::Query, &cache).is_none());
    }

    #[test]
    fn test_query_any_value_may_match() {
        let m = query(r#"{"tag": {"equalTo": "b"}, "page": {"matches": "[0-9]+"}}"#);
        assert!(m.matches(&MatchRequest::new("GET", "/x?tag=a&tag=b&page=3")));
        assert!(!m.matches(&MatchRequest::new("GET", "/x?tag=a&page=3")));
        assert!(!m.matches(&MatchRequest::new("GET", "/x?tag=b&page=three")));
    }

    #[test]
    fn test_query_values_are_decoded_before_matching() {
        let m = query(r#"{"q": {"equalTo": "hello world"}}"#);
        assert!(m.matches(&MatchRequest::new("GET", "/x?q=hello%20world")));
    }

    #[test]
    fn test_non_string_rule_values() {
        let m = query(r#"{"limit": {"equalTo": 10}}"#);
        assert!(m.matches(&MatchRequest::new("GET", "/x?limit=10")));
    }
}
