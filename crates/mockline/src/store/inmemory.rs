use super::{StoreError, StubStore, StubTable};
use crate::stub::StubRule;
use parking_lot::RwLock;

/// In-memory implementation of StubStore.
///
/// Ids are assigned from a monotonically increasing counter and never reused.
#[derive(Debug, Default)]
pub struct InMemoryStubStore {
    table: RwLock<StubTable>,
}

impl InMemoryStubStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with rules, keeping any ids they carry.
    pub fn with_rules(rules: Vec<StubRule>) -> Result<Self, StoreError> {
        Ok(Self {
            table: RwLock::new(StubTable::from_rules(rules)?),
        })
    }
}

impl StubStore for InMemoryStubStore {
    fn load_all(&self) -> Result<Vec<StubRule>, StoreError> {
        Ok(self.table.read().all())
    }

    fn load_by_id(&self, id: i64) -> Result<Option<StubRule>, StoreError> {
        Ok(self.table.read().get(id))
    }

    fn save(&self, rule: StubRule) -> Result<StubRule, StoreError> {
        self.table.write().save(rule)
    }

    fn delete(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.table.write().delete(id))
    }

    fn count_all(&self) -> Result<usize, StoreError> {
        Ok(self.table.read().len())
    }

    fn count_enabled(&self) -> Result<usize, StoreError> {
        Ok(self.table.read().enabled())
    }
}
