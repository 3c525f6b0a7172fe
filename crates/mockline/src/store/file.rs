use super::{StoreError, StubStore, StubTable};
use crate::stub::StubRule;
use parking_lot::RwLock;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// JSON-file backed StubStore.
///
/// The whole table is held in memory and rewritten to disk after every
/// mutation. Writes go to a sibling temp file which is then renamed over the
/// target, so a crash never leaves a truncated file behind. A failed write
/// rolls the in-memory table back.
#[derive(Debug)]
pub struct FileStubStore {
    path: PathBuf,
    table: RwLock<StubTable>,
}

impl FileStubStore {
    /// Open a store file, creating an empty table if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let table = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let rules: Vec<StubRule> = if content.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&content)?
            };
            info!("Loaded {} stubs from {}", rules.len(), path.display());
            StubTable::from_rules(rules)?
        } else {
            StubTable::default()
        };

        Ok(Self {
            path,
            table: RwLock::new(table),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, table: &StubTable) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&table.all())?;
        let tmp = self.path.with_extension("json.tmp");

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = fs::File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;

        debug!("Persisted {} stubs to {}", table.len(), self.path.display());
        Ok(())
    }

    fn mutate<T>(
        &self,
        op: impl FnOnce(&mut StubTable) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut table = self.table.write();
        let previous = table.clone();
        let result = op(&mut table)?;
        if let Err(e) = self.persist(&table) {
            *table = previous;
            return Err(e);
        }
        Ok(result)
    }
}

impl StubStore for FileStubStore {
    fn load_all(&self) -> Result<Vec<StubRule>, StoreError> {
        Ok(self.table.read().all())
    }

    fn load_by_id(&self, id: i64) -> Result<Option<StubRule>, StoreError> {
        Ok(self.table.read().get(id))
    }

    fn save(&self, rule: StubRule) -> Result<StubRule, StoreError> {
        self.mutate(|table| table.save(rule))
    }

    fn delete(&self, id: i64) -> Result<bool, StoreError> {
        self.mutate(|table| Ok(table.delete(id)))
    }

    fn count_all(&self) -> Result<usize, StoreError> {
        Ok(self.table.read().len())
    }

    fn count_enabled(&self) -> Result<usize, StoreError> {
        Ok(self.table.read().enabled())
    }
}
