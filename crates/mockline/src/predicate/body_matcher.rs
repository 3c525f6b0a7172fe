//! Request body predicates.
//!
//! A body pattern is a single JSON rule object whose first recognised key, in
//! order `equalToJson`, `matchesJsonPath`, `contains`, `matches`, selects the
//! check. Operator-supplied body patterns are often hand-typed and not
//! strictly valid JSON, so compilation walks an ordered list of attempts:
//!
//! 1. parse the raw text as a rule object
//! 2. if it does not parse and contains backslashes, double them and parse
//!    again
//! 3. fall back to a literal substring match on the raw text
//!
//! Valid JSON without a recognised key adds no body check. Only a parse
//! failure moves on to the next attempt.

use super::regex_cache::RegexCache;
use regex::Regex;
use serde_json::{Map, Value};
use serde_json_path::JsonPath;
use std::sync::Arc;
use tracing::{debug, warn};

/// Expected document of an `equalToJson` rule.
#[derive(Debug, Clone)]
pub enum ExpectedJson {
    Document(Value),
    /// The expectation was not valid JSON; compare the body text verbatim.
    Literal(String),
}

/// Compiled body predicate.
#[derive(Debug, Clone)]
pub enum CompiledBodyMatcher {
    /// Body parses as JSON and contains the expected document.
    EqualToJson(ExpectedJson),
    /// JSONPath expression selects at least one node. `None` if the
    /// expression was invalid.
    JsonPath(Option<JsonPath>),
    Contains(String),
    /// Full-match regex. `None` if the regex was invalid.
    Matches(Option<Arc<Regex>>),
    /// Raw pattern text used as a substring needle.
    Literal(String),
}

/// Result of parsing a body pattern as a rule object.
#[derive(Debug)]
enum ParsedRule {
    Rule(CompiledBodyMatcher),
    /// Valid JSON carrying none of the rule keys.
    NoRule,
    Invalid,
}

impl CompiledBodyMatcher {
    /// Compile a raw body pattern. Blank patterns yield `None`, meaning the
    /// body is not checked.
    pub fn compile(raw: Option<&str>, cache: &RegexCache) -> Option<Self> {
        let raw = raw.filter(|s| !s.trim().is_empty())?;
        match parse_rule(raw, cache) {
            ParsedRule::Rule(compiled) => Some(compiled),
            ParsedRule::NoRule => {
                debug!("Body pattern has no rule key, body is not checked");
                None
            }
            ParsedRule::Invalid => {
                let retried = match parse_rule_with_escaped_backslashes(raw, cache) {
                    ParsedRule::Rule(compiled) => Some(compiled),
                    ParsedRule::NoRule | ParsedRule::Invalid => None,
                };
                Some(retried.unwrap_or_else(|| {
                    debug!("Body pattern is not a rule object, using literal match");
                    Self::Literal(raw.to_string())
                }))
            }
        }
    }

    /// Short label for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EqualToJson(_) => "equalToJson",
            Self::JsonPath(_) => "matchesJsonPath",
            Self::Contains(_) => "contains",
            Self::Matches(_) => "matches",
            Self::Literal(_) => "literal",
        }
    }

    pub fn matches(&self, body: &str) -> bool {
        match self {
            Self::EqualToJson(ExpectedJson::Document(expected)) => {
                serde_json::from_str::<Value>(body)
                    .is_ok_and(|actual| json_contains(&actual, expected))
            }
            Self::EqualToJson(ExpectedJson::Literal(expected)) => body == expected,
            Self::JsonPath(Some(path)) => serde_json::from_str::<Value>(body)
                .is_ok_and(|actual| !path.query(&actual).is_empty()),
            Self::JsonPath(None) => false,
            Self::Contains(needle) | Self::Literal(needle) => body.contains(needle.as_str()),
            Self::Matches(Some(re)) => re.is_match(body),
            Self::Matches(None) => false,
        }
    }
}

fn parse_rule(raw: &str, cache: &RegexCache) -> ParsedRule {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(rule)) => match extract_rule(&rule, cache) {
            Some(compiled) => ParsedRule::Rule(compiled),
            None => ParsedRule::NoRule,
        },
        Ok(_) => ParsedRule::NoRule,
        Err(_) => ParsedRule::Invalid,
    }
}

/// Only `matches`, then `contains`, are honoured on the retry; anything else
/// ends up as a literal match.
fn parse_rule_with_escaped_backslashes(raw: &str, cache: &RegexCache) -> ParsedRule {
    if !raw.contains('\\') {
        return ParsedRule::Invalid;
    }
    match serde_json::from_str::<Value>(&raw.replace('\\', "\\\\")) {
        Ok(Value::Object(rule)) => {
            let retained: Map<String, Value> = ["matches", "contains"]
                .iter()
                .find_map(|key| rule.get(*key).map(|v| (key.to_string(), v.clone())))
                .into_iter()
                .collect();
            match extract_rule(&retained, cache) {
                Some(compiled) => ParsedRule::Rule(compiled),
                None => ParsedRule::NoRule,
            }
        }
        Ok(_) => ParsedRule::NoRule,
        Err(_) => ParsedRule::Invalid,
    }
}

fn extract_rule(rule: &Map<String, Value>, cache: &RegexCache) -> Option<CompiledBodyMatcher> {
    if let Some(expected) = rule.get("equalToJson") {
        let expected = match expected {
            Value::String(text) => match serde_json::from_str(text) {
                Ok(doc) => ExpectedJson::Document(doc),
                Err(_) => ExpectedJson::Literal(text.clone()),
            },
            doc => ExpectedJson::Document(doc.clone()),
        };
        return Some(CompiledBodyMatcher::EqualToJson(expected));
    }

    if let Some(expr) = rule.get("matchesJsonPath") {
        let expr = text_of(expr);
        let path = match JsonPath::parse(&expr) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Invalid JSONPath '{}' in body pattern: {}", expr, e);
                None
            }
        };
        return Some(CompiledBodyMatcher::JsonPath(path));
    }

    if let Some(needle) = rule.get("contains") {
        return Some(CompiledBodyMatcher::Contains(text_of(needle)));
    }

    if let Some(pattern) = rule.get("matches") {
        let pattern = text_of(pattern);
        let re = match cache.get_full_match(&pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!("Invalid regex '{}' in body pattern: {}", pattern, e);
                None
            }
        };
        return Some(CompiledBodyMatcher::Matches(re));
    }

    None
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Whether `actual` contains everything in `expected`.
///
/// Objects may carry extra members. Arrays are compared ignoring order, and
/// every expected element must match some actual element.
fn json_contains(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(actual), Value::Object(expected)) => expected
            .iter()
            .all(|(key, want)| actual.get(key).is_some_and(|have| json_contains(have, want))),
        (Value::Array(actual), Value::Array(expected)) => expected
            .iter()
            .all(|want| actual.iter().any(|have| json_contains(have, want))),
        (Value::Number(a), Value::Number(b)) => a == b || a.as_f64() == b.as_f64(),
        (a, b) => a == b,
    }
}
