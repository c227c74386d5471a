use std::collections::BTreeMap;
use std::error::Error;

use thiserror::Error;

use crate::PersistedGradeEntry;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("grade entry already exists: {module} (#{occurrence_index})")]
    Duplicate {
        module: String,
        occurrence_index: u32,
    },
    #[error("grade entry not found: {module} (#{occurrence_index})")]
    NotFound {
        module: String,
        occurrence_index: u32,
    },
    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn Error + Send + Sync>),
}

impl PersistenceError {
    pub fn backend(err: impl Error + Send + Sync + 'static) -> Self {
        PersistenceError::Backend(Box::new(err))
    }
}

/// Record storage keyed by `(module, occurrence_index)`.
///
/// Implementations enforce uniqueness of the key: inserting an existing key
/// fails instead of overwriting.
pub trait GradeStore {
    fn count(&self) -> Result<usize, PersistenceError>;

    fn find(
        &self,
        module: &str,
        occurrence_index: u32,
    ) -> Result<Option<PersistedGradeEntry>, PersistenceError>;

    fn insert(&mut self, entry: &PersistedGradeEntry) -> Result<(), PersistenceError>;

    fn update(
        &mut self,
        module: &str,
        occurrence_index: u32,
        grade: &str,
        updated_at: &str,
    ) -> Result<(), PersistenceError>;

    /// Remembers when the last complete check finished.
    fn record_check(&mut self, _at: &str) -> Result<(), PersistenceError> {
        Ok(())
    }
}

/// In-memory store, used for dry runs and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<(String, u32), PersistedGradeEntry>,
    last_check: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: impl IntoIterator<Item = PersistedGradeEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|entry| ((entry.module.clone(), entry.occurrence_index), entry))
            .collect();
        Self {
            entries,
            last_check: None,
        }
    }

    /// Entries ordered by module name, then occurrence index.
    pub fn entries(&self) -> impl Iterator<Item = &PersistedGradeEntry> {
        self.entries.values()
    }

    pub fn last_check(&self) -> Option<&str> {
        self.last_check.as_deref()
    }
}

impl GradeStore for MemoryStore {
    fn count(&self) -> Result<usize, PersistenceError> {
        Ok(self.entries.len())
    }

    fn find(
        &self,
        module: &str,
        occurrence_index: u32,
    ) -> Result<Option<PersistedGradeEntry>, PersistenceError> {
        Ok(self
            .entries
            .get(&(module.to_string(), occurrence_index))
            .cloned())
    }

    fn insert(&mut self, entry: &PersistedGradeEntry) -> Result<(), PersistenceError> {
        let key = (entry.module.clone(), entry.occurrence_index);
        if self.entries.contains_key(&key) {
            return Err(PersistenceError::Duplicate {
                module: entry.module.clone(),
                occurrence_index: entry.occurrence_index,
            });
        }
        self.entries.insert(key, entry.clone());
        Ok(())
    }

    fn update(
        &mut self,
        module: &str,
        occurrence_index: u32,
        grade: &str,
        updated_at: &str,
    ) -> Result<(), PersistenceError> {
        let entry = self
            .entries
            .get_mut(&(module.to_string(), occurrence_index))
            .ok_or_else(|| PersistenceError::NotFound {
                module: module.to_string(),
                occurrence_index,
            })?;
        entry.grade = grade.to_string();
        entry.updated_at = updated_at.to_string();
        Ok(())
    }

    fn record_check(&mut self, at: &str) -> Result<(), PersistenceError> {
        self.last_check = Some(at.to_string());
        Ok(())
    }
}
