//! Store and index synchronization.
//!
//! [`SyncCoordinator`] is the only writer of both the [`StubStore`] and the
//! [`MatchIndex`]. Every mutating operation validates first, persists second
//! and touches the index only once the store has accepted the change, all
//! under one coordinator-wide writer lock. Two concurrent writers therefore
//! cannot apply their store and index steps in different orders, and after
//! any operation returns the index holds exactly the enabled rules of the
//! store.
//!
//! Lookups go straight to the index and never take the writer lock.

use crate::error::EngineError;
use crate::index::MatchIndex;
use crate::metrics;
use crate::store::StubStore;
use crate::stub::{self, StubRule};
use chrono::Utc;
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Stub counts reported by the admin API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StubStatistics {
    pub total_stubs: usize,
    pub enabled_stubs: usize,
    pub disabled_stubs: usize,
}

pub struct SyncCoordinator {
    store: Arc<dyn StubStore>,
    index: Arc<MatchIndex>,
    write_lock: Mutex<()>,
    running: AtomicBool,
}

impl SyncCoordinator {
    pub fn new(store: Arc<dyn StubStore>, index: Arc<MatchIndex>) -> Self {
        Self {
            store,
            index,
            write_lock: Mutex::new(()),
            running: AtomicBool::new(false),
        }
    }

    pub fn index(&self) -> &Arc<MatchIndex> {
        &self.index
    }

    pub fn store(&self) -> &Arc<dyn StubStore> {
        &self.store
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Load every stored rule into the index and start accepting writes and
    /// traffic. Returns the number of active (enabled) stubs.
    pub fn start(&self) -> Result<usize, EngineError> {
        let _guard = self.write_lock.lock();
        let active = self.reload_locked()?;
        self.running.store(true, Ordering::Release);
        info!("Stub engine started with {} active stubs", active);
        Ok(active)
    }

    /// Stop accepting writes and traffic. The index is left as is.
    pub fn stop(&self) {
        let _guard = self.write_lock.lock();
        self.running.store(false, Ordering::Release);
        info!("Stub engine stopped");
    }

    pub fn create(&self, rule: StubRule) -> Result<StubRule, EngineError> {
        track("create", || {
            let _guard = self.lock_running()?;
            let known = self.store.load_all()?;
            self.create_locked(rule, &known)
        })
    }

    /// Create several rules, skipping any whose method and URL pattern match
    /// an already stored rule or an earlier rule of the same batch.
    pub fn create_batch(&self, rules: Vec<StubRule>) -> Result<Vec<StubRule>, EngineError> {
        track("create_batch", || {
            for rule in &rules {
                stub::validate(rule)?;
            }

            let _guard = self.lock_running()?;
            let mut known = self.store.load_all()?;
            let mut created = Vec::with_capacity(rules.len());
            for rule in rules {
                if known.iter().any(|existing| existing.same_route(&rule)) {
                    info!(
                        "Skipping duplicate stub '{}' ({} {})",
                        rule.name, rule.method, rule.url_pattern
                    );
                    continue;
                }
                let saved = self.create_locked(rule, &known)?;
                known.push(saved.clone());
                created.push(saved);
            }
            Ok(created)
        })
    }

    /// Replace the fields of an existing rule. The external key and creation
    /// time are preserved.
    pub fn update(&self, id: i64, changes: StubRule) -> Result<StubRule, EngineError> {
        track("update", || {
            let _guard = self.lock_running()?;
            let existing = self.load_existing(id)?;

            let mut rule = changes;
            rule.id = existing.id;
            rule.external_key = existing.external_key.clone();
            rule.created_at = existing.created_at;
            rule.updated_at = Some(Utc::now());
            stub::validate(&rule)?;

            let saved = self.store.save(rule)?;
            // Store first, then index. `add` replaces by key in a single
            // publish; an explicit remove is only needed when the key changes
            // or the rule is now disabled.
            let old_key = existing.index_key();
            if !saved.enabled || saved.index_key() != old_key {
                self.index.remove(&old_key);
            }
            self.index.add(&saved);
            info!("Updated stub {} '{}'", id, saved.name);
            Ok(saved)
        })
    }

    /// Delete a rule from the store, then from the index.
    pub fn delete(&self, id: i64) -> Result<(), EngineError> {
        track("delete", || {
            let _guard = self.lock_running()?;
            let existing = self.load_existing(id)?;

            if !self.store.delete(id)? {
                warn!("Stub {} vanished from the store before deletion", id);
            }
            self.index.remove(&existing.index_key());
            info!("Deleted stub {} '{}'", id, existing.name);
            Ok(())
        })
    }

    /// Flip the enabled flag and add or remove the rule from the index.
    pub fn toggle(&self, id: i64) -> Result<StubRule, EngineError> {
        track("toggle", || {
            let _guard = self.lock_running()?;
            let mut rule = self.load_existing(id)?;
            rule.enabled = !rule.enabled;
            rule.updated_at = Some(Utc::now());

            let saved = self.store.save(rule)?;
            if saved.enabled {
                self.index.add(&saved);
            } else {
                self.index.remove(&saved.index_key());
            }
            info!(
                "Stub {} '{}' is now {}",
                id,
                saved.name,
                if saved.enabled { "enabled" } else { "disabled" }
            );
            Ok(saved)
        })
    }

    /// Rebuild the index from the store. Returns the number of active stubs.
    pub fn reload_all(&self) -> Result<usize, EngineError> {
        track("reload", || {
            let _guard = self.lock_running()?;
            self.reload_locked()
        })
    }

    pub fn get(&self, id: i64) -> Result<StubRule, EngineError> {
        self.load_existing(id)
    }

    pub fn list(&self) -> Result<Vec<StubRule>, EngineError> {
        Ok(self.store.load_all()?)
    }

    /// Rules whose name contains `keyword`, ignoring case. A blank keyword
    /// returns every rule.
    pub fn search(&self, keyword: &str) -> Result<Vec<StubRule>, EngineError> {
        let needle = keyword.trim().to_lowercase();
        let rules = self.store.load_all()?;
        if needle.is_empty() {
            return Ok(rules);
        }
        Ok(rules
            .into_iter()
            .filter(|r| r.name.to_lowercase().contains(&needle))
            .collect())
    }

    pub fn statistics(&self) -> Result<StubStatistics, EngineError> {
        let total = self.store.count_all()?;
        let enabled = self.store.count_enabled()?;
        Ok(StubStatistics {
            total_stubs: total,
            enabled_stubs: enabled,
            disabled_stubs: total.saturating_sub(enabled),
        })
    }

    /// Take the writer lock and check the running flag while holding it.
    fn lock_running(&self) -> Result<MutexGuard<'_, ()>, EngineError> {
        let guard = self.write_lock.lock();
        if self.is_running() {
            Ok(guard)
        } else {
            Err(EngineError::NotRunning)
        }
    }

    fn load_existing(&self, id: i64) -> Result<StubRule, EngineError> {
        self.store.load_by_id(id)?.ok_or(EngineError::NotFound(id))
    }

    /// Must be called with the writer lock held. `known` is the current
    /// store content, used for the uuid uniqueness check.
    fn create_locked(
        &self,
        mut rule: StubRule,
        known: &[StubRule],
    ) -> Result<StubRule, EngineError> {
        stub::validate(&rule)?;

        match &rule.external_key {
            Some(key) => {
                let taken = known
                    .iter()
                    .any(|r| r.external_key.as_deref() == Some(key.as_str()));
                if taken {
                    return Err(EngineError::Validation(format!(
                        "uuid '{key}' is already used by another stub"
                    )));
                }
            }
            None => rule.external_key = Some(Uuid::new_v4().to_string()),
        }

        let now = Utc::now();
        rule.id = None;
        rule.created_at = Some(now);
        rule.updated_at = Some(now);

        let saved = self.store.save(rule)?;
        self.index.add(&saved);
        info!(
            "Created stub {:?} '{}' ({} {})",
            saved.id, saved.name, saved.method, saved.url_pattern
        );
        Ok(saved)
    }

    /// Must be called with the writer lock held.
    fn reload_locked(&self) -> Result<usize, EngineError> {
        let rules = self.store.load_all()?;
        self.index.reload(&rules);
        let active = self.index.len();
        info!("Reloaded {} stubs ({} active)", rules.len(), active);
        Ok(active)
    }
}

fn track<T>(
    operation: &str,
    op: impl FnOnce() -> Result<T, EngineError>,
) -> Result<T, EngineError> {
    let result = op();
    if let Err(e) = &result {
        warn!("Stub {} failed: {}", operation, e);
    }
    metrics::record_admin_operation(operation, result.is_ok());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::{PatternCompiler, RegexCache};
    use crate::request::MatchRequest;
    use crate::store::InMemoryStubStore;

    fn coordinator() -> SyncCoordinator {
        let index = Arc::new(MatchIndex::new(PatternCompiler::new(Arc::new(
            RegexCache::new(),
        ))));
        let coordinator = SyncCoordinator::new(Arc::new(InMemoryStubStore::new()), index);
        coordinator.start().unwrap();
        coordinator
    }

    fn matches(c: &SyncCoordinator, method: &str, url: &str) -> Option<String> {
        c.index()
            .lookup(&MatchRequest::new(method, url))
            .map(|m| m.rule().name.clone())
    }

    #[test]
    fn test_create_assigns_identity_and_indexes() {
        let c = coordinator();
        let saved = c.create(StubRule::new("users", "GET", "/api/users")).unwrap();
        assert!(saved.id.is_some());
        assert!(saved.external_key.is_some());
        assert!(saved.created_at.is_some());
        assert_eq!(matches(&c, "GET", "/api/users").as_deref(), Some("users"));
    }

    #[test]
    fn test_create_disabled_is_stored_but_not_indexed() {
        let c = coordinator();
        c.create(StubRule::new("off", "GET", "/off").with_enabled(false))
            .unwrap();
        assert_eq!(c.statistics().unwrap().total_stubs, 1);
        assert!(c.index().is_empty());
    }

    #[test]
    fn test_create_rejects_invalid_rule() {
        let c = coordinator();
        let err = c
            .create(StubRule::new("", "GET", "/x"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(c.statistics().unwrap().total_stubs, 0);
        assert!(c.index().is_empty());
    }

    #[test]
    fn test_create_rejects_duplicate_key() {
        let c = coordinator();
        c.create(StubRule::new("a", "GET", "/a").with_key("k")).unwrap();
        let err = c
            .create(StubRule::new("b", "GET", "/b").with_key("k"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(c.index().len(), 1);
    }

    #[test]
    fn test_update_preserves_key_and_moves_route() {
        let c = coordinator();
        let created = c.create(StubRule::new("v1", "GET", "/old")).unwrap();
        let id = created.id.unwrap();

        let updated = c.update(id, StubRule::new("v2", "POST", "/new")).unwrap();
        assert_eq!(updated.external_key, created.external_key);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(c.index().len(), 1);
        assert!(matches(&c, "GET", "/old").is_none());
        assert_eq!(matches(&c, "POST", "/new").as_deref(), Some("v2"));
    }

    #[test]
    fn test_update_to_disabled_removes_from_index() {
        let c = coordinator();
        let id = c.create(StubRule::new("a", "GET", "/a")).unwrap().id.unwrap();
        c.update(id, StubRule::new("a", "GET", "/a").with_enabled(false))
            .unwrap();
        assert!(c.index().is_empty());
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let c = coordinator();
        let err = c.update(99, StubRule::new("a", "GET", "/a")).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(99)));
    }

    #[test]
    fn test_delete() {
        let c = coordinator();
        let id = c.create(StubRule::new("a", "GET", "/a")).unwrap().id.unwrap();
        c.delete(id).unwrap();
        assert!(matches(&c, "GET", "/a").is_none());
        assert!(matches!(c.get(id), Err(EngineError::NotFound(_))));
        assert!(matches!(c.delete(id), Err(EngineError::NotFound(_))));
    }

    #[test]
    fn test_toggle_round_trip() {
        let c = coordinator();
        let id = c.create(StubRule::new("a", "GET", "/a")).unwrap().id.unwrap();

        let off = c.toggle(id).unwrap();
        assert!(!off.enabled);
        assert!(matches(&c, "GET", "/a").is_none());

        let on = c.toggle(id).unwrap();
        assert!(on.enabled);
        assert_eq!(matches(&c, "GET", "/a").as_deref(), Some("a"));
    }

    #[test]
    fn test_toggle_leaves_other_rules_alone() {
        let c = coordinator();
        let a = c.create(StubRule::new("a", "GET", "/a")).unwrap().id.unwrap();
        c.create(StubRule::new("b", "GET", "/b")).unwrap();
        c.toggle(a).unwrap();
        assert_eq!(matches(&c, "GET", "/b").as_deref(), Some("b"));
        assert_eq!(c.index().len(), 1);
    }

    #[test]
    fn test_create_batch_skips_duplicates() {
        let c = coordinator();
        c.create(StubRule::new("existing", "GET", "/a")).unwrap();
        let created = c
            .create_batch(vec![
                StubRule::new("dup-existing", "get", "/a"),
                StubRule::new("new", "GET", "/b"),
                StubRule::new("dup-in-batch", "GET", "/b"),
                StubRule::new("other-method", "POST", "/b"),
            ])
            .unwrap();
        let names: Vec<_> = created.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["new", "other-method"]);
        assert_eq!(c.statistics().unwrap().total_stubs, 3);
    }

    #[test]
    fn test_create_batch_validates_everything_first() {
        let c = coordinator();
        let err = c
            .create_batch(vec![
                StubRule::new("ok", "GET", "/a"),
                StubRule::new("bad", "GET", "/b").with_response("nope"),
            ])
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(c.statistics().unwrap().total_stubs, 0);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let c = coordinator();
        c.create(StubRule::new("User lookup", "GET", "/u")).unwrap();
        c.create(StubRule::new("orders", "GET", "/o")).unwrap();
        let found = c.search("USER").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "User lookup");
        assert_eq!(c.search("").unwrap().len(), 2);
    }

    #[test]
    fn test_statistics() {
        let c = coordinator();
        c.create(StubRule::new("a", "GET", "/a")).unwrap();
        c.create(StubRule::new("b", "GET", "/b").with_enabled(false))
            .unwrap();
        assert_eq!(
            c.statistics().unwrap(),
            StubStatistics {
                total_stubs: 2,
                enabled_stubs: 1,
                disabled_stubs: 1,
            }
        );
    }

    #[test]
    fn test_start_loads_existing_rules() {
        let store = Arc::new(InMemoryStubStore::with_rules(vec![
            StubRule::new("a", "GET", "/a").with_key("a"),
            StubRule::new("b", "GET", "/b").with_key("b").with_enabled(false),
        ])
        .unwrap());
        let c = SyncCoordinator::new(store, Arc::new(MatchIndex::default()));
        assert_eq!(c.start().unwrap(), 1);
        assert!(c.index().contains("a"));
    }

    #[test]
    fn test_writes_rejected_when_stopped() {
        let c = coordinator();
        let id = c.create(StubRule::new("a", "GET", "/a")).unwrap().id.unwrap();
        c.stop();
        assert!(matches!(
            c.create(StubRule::new("b", "GET", "/b")),
            Err(EngineError::NotRunning)
        ));
        assert!(matches!(c.toggle(id), Err(EngineError::NotRunning)));
        assert!(matches!(c.reload_all(), Err(EngineError::NotRunning)));
        // Reads still work.
        assert_eq!(c.list().unwrap().len(), 1);
    }

    #[test]
    fn test_update_in_place_publishes_once() {
        let c = coordinator();
        let id = c.create(StubRule::new("v1", "GET", "/a")).unwrap().id.unwrap();
        let before = c.index().stats().generation;

        c.update(id, StubRule::new("v2", "GET", "/a")).unwrap();
        assert_eq!(c.index().stats().generation, before + 1);
        assert_eq!(matches(&c, "GET", "/a").as_deref(), Some("v2"));
    }

    #[test]
    fn test_updates_never_hide_unchanged_route() {
        let c = Arc::new(coordinator());
        let id = c.create(StubRule::new("v0", "GET", "/stable")).unwrap().id.unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let reader = {
            let c = Arc::clone(&c);
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    assert!(matches(&c, "GET", "/stable").is_some());
                }
            })
        };

        for round in 1..200 {
            c.update(id, StubRule::new(format!("v{round}"), "GET", "/stable"))
                .unwrap();
        }
        stop.store(true, Ordering::Relaxed);
        reader.join().unwrap();
    }

    #[test]
    fn test_stop_while_writer_waits_rejects_write() {
        let c = Arc::new(coordinator());
        let guard = c.write_lock.lock();

        let writer = {
            let c = Arc::clone(&c);
            std::thread::spawn(move || c.create(StubRule::new("late", "GET", "/late")))
        };
        std::thread::sleep(std::time::Duration::from_millis(50));
        c.running.store(false, Ordering::Release);
        drop(guard);

        assert!(matches!(writer.join().unwrap(), Err(EngineError::NotRunning)));
        assert_eq!(c.statistics().unwrap().total_stubs, 0);
        assert!(c.index().is_empty());
    }

    #[test]
    fn test_create_batch_rejects_uuid_taken_earlier_in_batch() {
        let c = coordinator();
        let err = c
            .create_batch(vec![
                StubRule::new("a", "GET", "/a").with_key("shared"),
                StubRule::new("b", "GET", "/b").with_key("shared"),
            ])
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(c.index().len(), 1);
    }
}
