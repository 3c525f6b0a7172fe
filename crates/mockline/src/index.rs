//! In-memory serving index of enabled stub rules.
//!
//! # Architecture
//!
//! ```text
//! writers ──► writer lock ──► clone snapshot ──► modify ──► ArcSwap::store
//! readers ─────────────────────────────────────► ArcSwap::load ──► lookup
//! ```
//!
//! The active rule set is an immutable [`Snapshot`] behind an atomically
//! swapped reference. Lookups load the current snapshot without locking and
//! always see a complete rule set. Mutations are serialized by one writer
//! lock and publish a whole new snapshot, so a reload never exposes an empty
//! intermediate state.
//!
//! Within a snapshot, matchers are bucketed by uppercased method; `ANY`
//! rules live in their own bucket and are considered for every request.

use crate::metrics;
use crate::predicate::{CompiledMatcher, PatternCompiler};
use crate::request::MatchRequest;
use crate::stub::{StubRule, ANY_METHOD};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Index entry: a compiled matcher and the order in which it was inserted.
#[derive(Debug, Clone)]
pub struct IndexedMatcher {
    pub matcher: Arc<CompiledMatcher>,
    /// Monotonic insertion sequence; higher means more recently inserted.
    pub sequence: u64,
}

/// Immutable view of the active rule set.
#[derive(Debug, Clone, Default)]
struct Snapshot {
    /// External key → entry.
    by_key: HashMap<String, IndexedMatcher>,
    /// Uppercased method → entries.
    by_method: HashMap<String, Vec<IndexedMatcher>>,
    generation: u64,
}

impl Snapshot {
    fn insert(&mut self, entry: IndexedMatcher) {
        let key = entry.matcher.key().to_string();
        self.remove(&key);
        self.by_method
            .entry(entry.matcher.method().to_string())
            .or_default()
            .push(entry.clone());
        self.by_key.insert(key, entry);
    }

    fn remove(&mut self, key: &str) -> bool {
        let Some(old) = self.by_key.remove(key) else {
            return false;
        };
        let method = old.matcher.method();
        if let Some(bucket) = self.by_method.get_mut(method) {
            bucket.retain(|e| e.matcher.key() != key);
            if bucket.is_empty() {
                self.by_method.remove(method);
            }
        }
        true
    }

    fn candidates<'a>(&'a self, method: &str) -> impl Iterator<Item = &'a IndexedMatcher> + 'a {
        let specific = if method == ANY_METHOD {
            None
        } else {
            self.by_method.get(method)
        };
        specific
            .into_iter()
            .flatten()
            .chain(self.by_method.get(ANY_METHOD).into_iter().flatten())
    }
}

/// Index statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub entries: usize,
    /// Distinct concrete methods, not counting `ANY`.
    pub methods: usize,
    pub wildcard_entries: usize,
    /// Number of snapshots published so far.
    pub generation: u64,
}

/// Concurrent match index.
#[derive(Debug)]
pub struct MatchIndex {
    snapshot: ArcSwap<Snapshot>,
    /// Serializes writers; holds the next insertion sequence.
    writer: Mutex<u64>,
    compiler: PatternCompiler,
}

impl Default for MatchIndex {
    fn default() -> Self {
        Self::new(PatternCompiler::default())
    }
}

impl MatchIndex {
    pub fn new(compiler: PatternCompiler) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(Snapshot::default()),
            writer: Mutex::new(0),
            compiler,
        }
    }

    pub fn compiler(&self) -> &PatternCompiler {
        &self.compiler
    }

    /// Compile and insert an enabled rule, replacing any entry with the same
    /// key. Disabled rules are ignored.
    pub fn add(&self, rule: &StubRule) {
        if !rule.enabled {
            debug!("Skipping disabled stub '{}'", rule.name);
            return;
        }
        let matcher = Arc::new(self.compiler.compile(rule));

        let mut sequence = self.writer.lock();
        *sequence += 1;
        let mut next = Snapshot::clone(&self.snapshot.load());
        next.insert(IndexedMatcher {
            matcher,
            sequence: *sequence,
        });
        self.publish(next, "add");
        debug!("Indexed stub '{}' ({})", rule.name, rule.index_key());
    }

    /// Remove the entry for `key`. Unknown keys are a no-op.
    pub fn remove(&self, key: &str) -> bool {
        let _guard = self.writer.lock();
        let current = self.snapshot.load();
        if !current.by_key.contains_key(key) {
            return false;
        }
        let mut next = Snapshot::clone(&current);
        next.remove(key);
        self.publish(next, "remove");
        debug!("Removed stub {} from index", key);
        true
    }

    /// Replace the whole rule set. Rules are compiled off to the side and
    /// published in one swap; insertion order follows `rules`.
    pub fn reload(&self, rules: &[StubRule]) {
        let compiled: Vec<Arc<CompiledMatcher>> = rules
            .iter()
            .filter(|r| r.enabled)
            .map(|r| Arc::new(self.compiler.compile(r)))
            .collect();

        let mut sequence = self.writer.lock();
        let mut next = Snapshot {
            generation: self.snapshot.load().generation,
            ..Snapshot::default()
        };
        for matcher in compiled {
            *sequence += 1;
            next.insert(IndexedMatcher {
                matcher,
                sequence: *sequence,
            });
        }
        let entries = next.by_key.len();
        self.publish(next, "reload");
        debug!("Reloaded index with {} active stubs", entries);
    }

    /// Find the single rule that applies to `request`.
    ///
    /// Candidates are the request method's bucket plus `ANY`. Among those
    /// whose URL and predicates all match, the lowest priority wins and ties
    /// go to the most recently inserted entry.
    pub fn lookup(&self, request: &MatchRequest) -> Option<Arc<CompiledMatcher>> {
        let snapshot = self.snapshot.load();
        snapshot
            .candidates(request.method())
            .filter(|e| e.matcher.matches_url(request.path()))
            .filter(|e| e.matcher.matches_predicates(request))
            .min_by_key(|e| (e.matcher.priority(), Reverse(e.sequence)))
            .map(|e| Arc::clone(&e.matcher))
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.snapshot.load().by_key.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<Arc<CompiledMatcher>> {
        self.snapshot
            .load()
            .by_key
            .get(key)
            .map(|e| Arc::clone(&e.matcher))
    }

    /// Keys of all active entries, unordered.
    pub fn keys(&self) -> Vec<String> {
        self.snapshot.load().by_key.keys().cloned().collect()
    }

    pub fn stats(&self) -> IndexStats {
        let snapshot = self.snapshot.load();
        IndexStats {
            entries: snapshot.by_key.len(),
            methods: snapshot
                .by_method
                .keys()
                .filter(|m| m.as_str() != ANY_METHOD)
                .count(),
            wildcard_entries: snapshot.by_method.get(ANY_METHOD).map_or(0, Vec::len),
            generation: snapshot.generation,
        }
    }

    /// Must be called with the writer lock held.
    fn publish(&self, mut next: Snapshot, operation: &str) {
        next.generation += 1;
        metrics::set_index_entries(next.by_key.len());
        metrics::record_index_mutation(operation);
        self.snapshot.store(Arc::new(next));
    }
}

/// Cheaply cloneable handle to a shared index.
pub type SharedMatchIndex = Arc<MatchIndex>;
