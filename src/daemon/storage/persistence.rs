use std::{future::Future, ops::Deref, path::PathBuf};

use fs4::tokio::AsyncFileExt;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tokio::fs::File;
use tracing::debug;

use crate::{
    daemon::error::PersistenceError,
    fs::operations::{overwrite_contents, read_json_object},
};

pub const ACTIVITY_LOG_KEY: &str = "activityLog";
pub const SETTINGS_KEY: &str = "settings";
pub const LAST_REMINDER_KEY: &str = "lastReminderAt";
pub const LAST_BEDTIME_KEY: &str = "lastBedtime";

const STORAGE_FILE_NAME: &str = "storage.json";

/// Interface for abstracting the persistence service. Values live under stable string keys and
/// are written as a whole, so a reader always sees the last complete value.
pub trait KeyValueStorage {
    /// Returns the stored values for `keys`. Absent keys are missing from the result.
    fn get(
        &self,
        keys: &[&str],
    ) -> impl Future<Output = Result<Map<String, Value>, PersistenceError>>;

    /// Stores every entry of `values`, leaving other keys untouched.
    fn set(
        &self,
        values: Map<String, Value>,
    ) -> impl Future<Output = Result<(), PersistenceError>>;

    /// Removes every key.
    fn clear(&self) -> impl Future<Output = Result<(), PersistenceError>>;
}

impl<T: Deref> KeyValueStorage for T
where
    T::Target: KeyValueStorage,
{
    fn get(
        &self,
        keys: &[&str],
    ) -> impl Future<Output = Result<Map<String, Value>, PersistenceError>> {
        self.deref().get(keys)
    }

    fn set(
        &self,
        values: Map<String, Value>,
    ) -> impl Future<Output = Result<(), PersistenceError>> {
        self.deref().set(values)
    }

    fn clear(&self) -> impl Future<Output = Result<(), PersistenceError>> {
        self.deref().clear()
    }
}

/// Reads and deserializes a single key.
pub async fn load_value<T: DeserializeOwned>(
    storage: &impl KeyValueStorage,
    key: &str,
) -> Result<Option<T>, PersistenceError> {
    let mut values = storage.get(&[key]).await?;
    match values.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => Ok(Some(serde_json::from_value(v)?)),
    }
}

/// Serializes and writes a single key.
pub async fn store_value<T: Serialize + ?Sized>(
    storage: &impl KeyValueStorage,
    key: &str,
    value: &T,
) -> Result<(), PersistenceError> {
    let mut values = Map::new();
    values.insert(key.to_string(), serde_json::to_value(value)?);
    storage.set(values).await
}

/// The main realization of [KeyValueStorage]: a single JSON object in a file. Reads take a
/// shared lock, writes an exclusive one for the whole read-modify-write cycle so that the CLI can
/// inspect the file while the daemon runs.
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&dir)?;

        Ok(Self {
            path: dir.join(STORAGE_FILE_NAME),
        })
    }

    async fn read_all(&self) -> Result<Map<String, Value>, PersistenceError> {
        let mut file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        file.lock_shared()?;
        let result = read_json_object(&mut file).await;
        file.unlock_async().await?;
        Ok(result?)
    }

    async fn update(
        &self,
        change: impl FnOnce(&mut Map<String, Value>),
    ) -> Result<(), PersistenceError> {
        let mut file = File::options()
            .write(true)
            .create(true)
            .read(true)
            .truncate(false)
            .open(&self.path)
            .await?;

        // Semi-safe acquire-release for a file
        file.lock_exclusive()?;
        let result = Self::update_with_file(&mut file, change).await;
        file.unlock_async().await?;
        result
    }

    async fn update_with_file(
        file: &mut File,
        change: impl FnOnce(&mut Map<String, Value>),
    ) -> Result<(), PersistenceError> {
        let mut object = read_json_object(file).await?;
        change(&mut object);
        let buffer = serde_json::to_vec(&object)?;
        overwrite_contents(file, &buffer).await?;
        debug!("Wrote {} bytes of storage", buffer.len());
        Ok(())
    }
}

impl KeyValueStorage for JsonFileStorage {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, PersistenceError> {
        let mut all = self.read_all().await?;
        Ok(keys
            .iter()
            .filter_map(|key| all.remove(*key).map(|v| (key.to_string(), v)))
            .collect())
    }

    async fn set(&self, values: Map<String, Value>) -> Result<(), PersistenceError> {
        self.update(move |object| object.extend(values)).await
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        self.update(|object| object.clear()).await
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use serde_json::{json, Map};
    use tempfile::tempdir;

    use super::{load_value, store_value, JsonFileStorage, KeyValueStorage};

    #[tokio::test]
    async fn test_missing_file_reads_empty() -> Result<()> {
        let dir = tempdir()?;
        let storage = JsonFileStorage::new(dir.path().join("state"))?;

        assert!(storage.get(&["settings"]).await?.is_empty());
        assert_eq!(load_value::<i64>(&storage, "lastReminderAt").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_set_merges_keys() -> Result<()> {
        let dir = tempdir()?;
        let storage = JsonFileStorage::new(dir.path().to_path_buf())?;

        store_value(&storage, "lastBedtime", &10).await?;
        store_value(&storage, "lastReminderAt", &20).await?;
        store_value(&storage, "lastReminderAt", &30).await?;

        let values = storage.get(&["lastBedtime", "lastReminderAt", "absent"]).await?;
        assert_eq!(values.len(), 2);
        assert_eq!(values["lastBedtime"], json!(10));
        assert_eq!(values["lastReminderAt"], json!(30));
        Ok(())
    }

    #[tokio::test]
    async fn test_clear_removes_everything() -> Result<()> {
        let dir = tempdir()?;
        let storage = JsonFileStorage::new(dir.path().to_path_buf())?;

        let mut values = Map::new();
        values.insert("settings".into(), json!({"darkMode": true}));
        values.insert("activityLog".into(), json!([]));
        storage.set(values).await?;
        storage.clear().await?;

        assert!(storage.get(&["settings", "activityLog"]).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_reopened_storage_sees_previous_writes() -> Result<()> {
        let dir = tempdir()?;
        {
            let storage = JsonFileStorage::new(dir.path().to_path_buf())?;
            store_value(&storage, "settings", &json!({"sleepTime": "22:30"})).await?;
        }
        let storage = JsonFileStorage::new(dir.path().to_path_buf())?;
        let settings: Option<serde_json::Value> = load_value(&storage, "settings").await?;
        assert_eq!(settings, Some(json!({"sleepTime": "22:30"})));
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupted_file_is_recovered_on_write() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join("storage.json"), "{\"activityLog\": [")?;
        let storage = JsonFileStorage::new(dir.path().to_path_buf())?;

        assert!(storage.get(&["activityLog"]).await?.is_empty());
        store_value(&storage, "lastBedtime", &1).await?;
        assert_eq!(load_value::<i64>(&storage, "lastBedtime").await?, Some(1));
        Ok(())
    }
}
