use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Mutex,
};

use serde_json::{Map, Value};

use crate::daemon::error::PersistenceError;

use super::persistence::KeyValueStorage;

/// [KeyValueStorage] kept in memory. Can be switched into a failing mode to exercise the
/// recovery paths of its users.
#[derive(Default)]
pub struct MemoryStorage {
    values: Mutex<Map<String, Value>>,
    failing: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of successful `set`/`clear` calls so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Map<String, Value> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Map<String, Value>> {
        // A poisoned map is still a consistent map, every write replaces whole values.
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check(&self) -> Result<(), PersistenceError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(PersistenceError::Unavailable("memory storage set to fail".into()))
        } else {
            Ok(())
        }
    }
}

impl KeyValueStorage for MemoryStorage {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, PersistenceError> {
        self.check()?;
        let values = self.lock();
        Ok(keys
            .iter()
            .filter_map(|key| values.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, values: Map<String, Value>) -> Result<(), PersistenceError> {
        self.check()?;
        self.lock().extend(values);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        self.check()?;
        self.lock().clear();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
