//! Persisted stub storage.
//!
//! The engine consumes storage through the [`StubStore`] trait. Two
//! backends ship with the crate:
//!
//! - [`InMemoryStubStore`]: process-local, for tests and throwaway servers
//! - [`FileStubStore`]: the same table, written to a JSON file on every change
//!
//! The trait is synchronous. Engine operations are short and the coordinator
//! holds a writer lock across the store call and the index update, which
//! would be awkward to bridge across `.await` points.

mod file;
mod inmemory;

use crate::config::{StorageBackend, StorageConfig};
use crate::stub::StubRule;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub use file::FileStubStore;
pub use inmemory::InMemoryStubStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The write conflicts with the current stored state.
    #[error("Storage conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Backend-agnostic stub persistence.
pub trait StubStore: Send + Sync {
    /// Every stored rule, ordered by id.
    fn load_all(&self) -> Result<Vec<StubRule>, StoreError>;

    fn load_by_id(&self, id: i64) -> Result<Option<StubRule>, StoreError>;

    /// Insert or replace a rule. A rule without id receives a fresh one;
    /// a rule with an id that is not stored is a [`StoreError::Conflict`].
    fn save(&self, rule: StubRule) -> Result<StubRule, StoreError>;

    /// Remove a rule. Returns whether it existed.
    fn delete(&self, id: i64) -> Result<bool, StoreError>;

    fn count_all(&self) -> Result<usize, StoreError>;

    fn count_enabled(&self) -> Result<usize, StoreError>;
}

/// Id-ordered rule table shared by the bundled backends.
#[derive(Debug, Default, Clone)]
pub(crate) struct StubTable {
    rules: BTreeMap<i64, StubRule>,
    next_id: i64,
}

impl StubTable {
    /// Build a table from previously stored rules. Rules keep their ids in
    /// any order; rules without id are numbered after the highest one.
    /// Duplicate ids are a [`StoreError::Conflict`].
    pub(crate) fn from_rules(rules: Vec<StubRule>) -> Result<Self, StoreError> {
        let mut table = StubTable::default();
        let (with_id, without_id): (Vec<_>, Vec<_>) =
            rules.into_iter().partition(|r| r.id.is_some());

        for rule in with_id {
            let id = rule.id.unwrap_or_default();
            if table.rules.contains_key(&id) {
                warn!("Duplicate stub id {} in loaded rules", id);
                return Err(StoreError::Conflict(format!("duplicate stub id {id}")));
            }
            table.next_id = table.next_id.max(id);
            table.rules.insert(id, rule);
        }
        for rule in without_id {
            table.save(rule)?;
        }
        Ok(table)
    }

    pub(crate) fn all(&self) -> Vec<StubRule> {
        self.rules.values().cloned().collect()
    }

    pub(crate) fn get(&self, id: i64) -> Option<StubRule> {
        self.rules.get(&id).cloned()
    }

    pub(crate) fn save(&mut self, mut rule: StubRule) -> Result<StubRule, StoreError> {
        match rule.id {
            Some(id) if self.rules.contains_key(&id) => {}
            Some(id) if id > self.next_id => {
                // Imported rule carrying its own id.
                self.next_id = id;
            }
            Some(id) => {
                return Err(StoreError::Conflict(format!(
                    "stub {id} does not exist in the store"
                )))
            }
            None => {
                self.next_id += 1;
                rule.id = Some(self.next_id);
            }
        }
        let id = rule.id.unwrap_or_default();
        self.rules.insert(id, rule.clone());
        Ok(rule)
    }

    pub(crate) fn delete(&mut self, id: i64) -> bool {
        self.rules.remove(&id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.rules.len()
    }

    pub(crate) fn enabled(&self) -> usize {
        self.rules.values().filter(|r| r.enabled).count()
    }
}

/// Open the store selected by configuration.
pub fn open(config: &StorageConfig) -> Result<Arc<dyn StubStore>, StoreError> {
    match config.backend {
        StorageBackend::Memory => {
            info!("Using in-memory stub store");
            Ok(Arc::new(InMemoryStubStore::new()))
        }
        StorageBackend::File => {
            info!("Using file stub store at {}", config.path.display());
            Ok(Arc::new(FileStubStore::open(&config.path)?))
        }
    }
}
