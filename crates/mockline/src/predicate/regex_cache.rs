//! Shared cache of compiled regular expressions.
//!
//! Rules are recompiled on every update, toggle and reload, and many rules
//! reuse the same patterns. Compiled regexes are keyed by their exact source
//! text and shared as `Arc<Regex>`. Compile failures are cached as well so a
//! broken pattern is only reported once.

use crate::metrics;
use dashmap::DashMap;
use regex::Regex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::debug;

type CachedRegex = Result<Arc<Regex>, regex::Error>;

/// Concurrent pattern-source to compiled-regex cache.
#[derive(Debug, Default)]
pub struct RegexCache {
    entries: DashMap<String, CachedRegex>,
    /// Entries beyond this bound are compiled but not retained.
    max_entries: Option<usize>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegexCacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl RegexCache {
    /// Unbounded cache.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_entries(max_entries: Option<usize>) -> Self {
        Self {
            max_entries,
            ..Self::default()
        }
    }

    /// Process-wide cache used when no explicit cache is supplied.
    pub fn global() -> Arc<RegexCache> {
        static GLOBAL: OnceLock<Arc<RegexCache>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(RegexCache::new())))
    }

    /// Return the compiled regex for `pattern`, compiling it on first use.
    pub fn get_or_compile(&self, pattern: &str) -> Result<Arc<Regex>, regex::Error> {
        if let Some(entry) = self.entries.get(pattern) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            metrics::record_regex_cache_lookup(true);
            return entry.value().clone();
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::record_regex_cache_lookup(false);

        let compiled = Regex::new(pattern).map(Arc::new);
        let has_room = self
            .max_entries
            .is_none_or(|max| self.entries.len() < max);
        if has_room {
            // Another thread may have raced us here; either result is equivalent.
            self.entries
                .entry(pattern.to_string())
                .or_insert_with(|| compiled.clone());
        } else {
            debug!("Regex cache full, not retaining pattern {}", pattern);
        }
        compiled
    }

    /// Compile `pattern` with whole-input semantics.
    pub fn get_full_match(&self, pattern: &str) -> Result<Arc<Regex>, regex::Error> {
        self.get_or_compile(&anchor(pattern))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> RegexCacheStats {
        RegexCacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Wrap a pattern so it must match the entire input.
pub fn anchor(pattern: &str) -> String {
    format!("^(?:{pattern})$")
}
