//! Rule compilation: turns a declarative [`StubRule`] into an immutable,
//! executable [`CompiledMatcher`].

use super::body_matcher::CompiledBodyMatcher;
use super::field_matcher::{CompiledFieldMatcher, FieldSource};
use super::regex_cache::RegexCache;
use super::url_matcher::CompiledUrlMatcher;
use crate::request::MatchRequest;
use crate::stub::{StubRule, ANY_METHOD};
use std::sync::Arc;

/// Executable form of one stub rule.
///
/// Built once per rule version and never mutated; any change to the rule
/// produces a fresh matcher.
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    rule: StubRule,
    key: String,
    method: String,
    url: CompiledUrlMatcher,
    headers: Option<CompiledFieldMatcher>,
    query: Option<CompiledFieldMatcher>,
    body: Option<CompiledBodyMatcher>,
}

impl CompiledMatcher {
    /// Source rule this matcher was compiled from.
    pub fn rule(&self) -> &StubRule {
        &self.rule
    }

    /// Match index identity.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Uppercased method, or `ANY`.
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn priority(&self) -> i32 {
        self.rule.priority
    }

    pub fn is_wildcard(&self) -> bool {
        self.method == ANY_METHOD
    }

    pub fn body_matcher(&self) -> Option<&CompiledBodyMatcher> {
        self.body.as_ref()
    }

    /// Method check alone.
    pub fn matches_method(&self, method: &str) -> bool {
        self.is_wildcard() || self.method.eq_ignore_ascii_case(method)
    }

    /// URL check alone, against the query-stripped path.
    pub fn matches_url(&self, path: &str) -> bool {
        self.url.matches(path)
    }

    /// Header, query and body checks. Absent dimensions pass.
    pub fn matches_predicates(&self, request: &MatchRequest) -> bool {
        self.headers.as_ref().is_none_or(|m| m.matches(request))
            && self.query.as_ref().is_none_or(|m| m.matches(request))
            && self.body.as_ref().is_none_or(|m| m.matches(request.body()))
    }

    /// Full evaluation, cheapest checks first.
    pub fn matches(&self, request: &MatchRequest) -> bool {
        self.matches_method(request.method())
            && self.matches_url(request.path())
            && self.matches_predicates(request)
    }
}

/// Compiles stub rules using a shared regex cache.
#[derive(Debug, Clone)]
pub struct PatternCompiler {
    cache: Arc<RegexCache>,
}

impl Default for PatternCompiler {
    fn default() -> Self {
        Self::new(RegexCache::global())
    }
}

impl PatternCompiler {
    pub fn new(cache: Arc<RegexCache>) -> Self {
        Self { cache }
    }

    pub fn regex_cache(&self) -> &Arc<RegexCache> {
        &self.cache
    }

    /// Compile a rule. Never fails: malformed sub-patterns degrade to
    /// never-matching or omitted predicates, each logged at `warn`.
    pub fn compile(&self, rule: &StubRule) -> CompiledMatcher {
        let cache = self.cache.as_ref();
        CompiledMatcher {
            key: rule.index_key().into_owned(),
            method: rule.normalized_method(),
            url: CompiledUrlMatcher::compile(&rule.url_pattern, rule.url_match_type, cache),
            headers: CompiledFieldMatcher::compile(
                rule.header_pattern.as_deref(),
                FieldSource::Header,
                cache,
            ),
            query: CompiledFieldMatcher::compile(
                rule.query_pattern.as_deref(),
                FieldSource::Query,
                cache,
            ),
            body: CompiledBodyMatcher::compile(rule.body_pattern.as_deref(), cache),
            rule: rule.clone(),
        }
    }
}
