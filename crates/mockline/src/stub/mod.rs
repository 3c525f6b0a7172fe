//! Stub rule data model.
//!
//! A [`StubRule`] is the persisted, declarative description of one canned
//! HTTP response: how to recognise a request (method, URL pattern, optional
//! header/query/body predicates) and what to answer with. Rules are plain
//! value objects; the executable form lives in [`crate::predicate`].

mod raw_text;
mod validation;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

pub use validation::validate;

/// Method value that matches every HTTP method.
pub const ANY_METHOD: &str = "ANY";

/// How a rule's URL pattern is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UrlMatchType {
    /// Path (query stripped) equals the pattern exactly.
    #[default]
    Equals,
    /// Path contains the pattern as a literal substring.
    Contains,
    /// Pattern is a regular expression that must match the whole path.
    Regex,
    /// Pattern uses `{name}` placeholders for single path segments.
    PathTemplate,
}

impl UrlMatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrlMatchType::Equals => "EQUALS",
            UrlMatchType::Contains => "CONTAINS",
            UrlMatchType::Regex => "REGEX",
            UrlMatchType::PathTemplate => "PATH_TEMPLATE",
        }
    }
}

impl fmt::Display for UrlMatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declarative stub rule as stored and exchanged over the admin API.
///
/// Header, query and body patterns are kept as raw text exactly as the
/// operator supplied them. They are only interpreted at compile time, which
/// lets a malformed pattern degrade instead of rejecting the whole rule.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StubRule {
    /// Store-assigned identity, absent until the first save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Stable key used by the match index. Generated once, never changed.
    #[serde(default, rename = "uuid", skip_serializing_if = "Option::is_none")]
    pub external_key: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Lower value wins.
    #[serde(default)]
    pub priority: i32,

    /// HTTP method, or `ANY`.
    #[serde(default)]
    pub method: String,

    #[serde(default, rename = "url")]
    pub url_pattern: String,

    #[serde(default)]
    pub url_match_type: UrlMatchType,

    #[serde(
        default,
        rename = "requestHeadersPattern",
        deserialize_with = "raw_text::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub header_pattern: Option<String>,

    #[serde(
        default,
        rename = "queryParametersPattern",
        deserialize_with = "raw_text::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub query_pattern: Option<String>,

    #[serde(
        default,
        rename = "requestBodyPattern",
        deserialize_with = "raw_text::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub body_pattern: Option<String>,

    #[serde(default, deserialize_with = "raw_text::required")]
    pub response_definition: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_enabled() -> bool {
    true
}

impl StubRule {
    /// Create an enabled rule with an `EQUALS` URL pattern and an empty JSON
    /// object as response.
    pub fn new(name: impl Into<String>, method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
            external_key: None,
            enabled: true,
            priority: 0,
            method: method.into(),
            url_pattern: url.into(),
            url_match_type: UrlMatchType::Equals,
            header_pattern: None,
            query_pattern: None,
            body_pattern: None,
            response_definition: "{}".to_string(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_match_type(mut self, match_type: UrlMatchType) -> Self {
        self.url_match_type = match_type;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.external_key = Some(key.into());
        self
    }

    pub fn with_headers(mut self, pattern: impl Into<String>) -> Self {
        self.header_pattern = Some(pattern.into());
        self
    }

    pub fn with_query(mut self, pattern: impl Into<String>) -> Self {
        self.query_pattern = Some(pattern.into());
        self
    }

    pub fn with_body(mut self, pattern: impl Into<String>) -> Self {
        self.body_pattern = Some(pattern.into());
        self
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response_definition = response.into();
        self
    }

    /// Key under which this rule is held by the match index.
    ///
    /// Rules created through the coordinator always carry an external key.
    /// Rules loaded from hand-edited storage may not, so fall back to the
    /// numeric id, then to the name.
    pub fn index_key(&self) -> Cow<'_, str> {
        match (&self.external_key, self.id) {
            (Some(key), _) => Cow::Borrowed(key.as_str()),
            (None, Some(id)) => Cow::Owned(format!("stub-{id}")),
            (None, None) => Cow::Borrowed(self.name.as_str()),
        }
    }

    /// Uppercased method, as used for index bucketing.
    pub fn normalized_method(&self) -> String {
        self.method.trim().to_ascii_uppercase()
    }

    /// Whether two rules target the same method and URL pattern.
    pub fn same_route(&self, other: &StubRule) -> bool {
        self.normalized_method() == other.normalized_method()
            && self.url_pattern == other.url_pattern
    }
}
