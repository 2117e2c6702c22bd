use std::collections::VecDeque;

use tracing::{debug, error, info, warn};

use crate::daemon::error::ValidationError;

use super::{
    entities::{ActivityRecord, RawActivity},
    persistence::{load_value, store_value, KeyValueStorage, ACTIVITY_LOG_KEY},
};

/// Maximum amount of records kept. Older ones are dropped first.
pub const MAX_RETAINED: usize = 1000;

/// The log is saved every `SAVE_EVERY` appends instead of on each one.
pub const SAVE_EVERY: usize = 10;

/// Durable, size-bounded log of activity records in arrival order.
///
/// The in-memory log is the source of truth. Storage only ever receives complete snapshots taken
/// after eviction, so the persisted log is always a suffix of the in-memory one.
pub struct ActivityStore<S> {
    storage: S,
    log: VecDeque<ActivityRecord>,
    max_retained: usize,
    save_every: usize,
    appends_since_save: usize,
    dirty: bool,
}

impl<S: KeyValueStorage> ActivityStore<S> {
    pub fn new(storage: S) -> Self {
        Self::with_limits(storage, MAX_RETAINED, SAVE_EVERY)
    }

    pub fn with_limits(storage: S, max_retained: usize, save_every: usize) -> Self {
        Self {
            storage,
            log: VecDeque::new(),
            max_retained,
            save_every: save_every.max(1),
            appends_since_save: 0,
            dirty: false,
        }
    }

    /// Restores the log from storage. Missing or unreadable data results in an empty log.
    pub async fn load(&mut self) {
        match load_value::<VecDeque<ActivityRecord>>(&self.storage, ACTIVITY_LOG_KEY).await {
            Ok(Some(log)) => {
                self.log = log;
                let evicted = self.evict_overflow();
                if evicted > 0 {
                    warn!("Persisted activity log was over the limit, dropped {evicted} records");
                }
                info!("Loaded {} activity records", self.log.len());
            }
            Ok(None) => {
                info!("No activity log found, starting with an empty one");
                self.log.clear();
            }
            Err(e) => {
                error!("Failed to load activity log, starting with an empty one: {e:?}");
                self.log.clear();
            }
        }
        self.dirty = false;
        self.appends_since_save = 0;
    }

    /// Validates and appends a record. A rejected record leaves the log untouched.
    pub async fn append(&mut self, raw: RawActivity) -> Result<ActivityRecord, ValidationError> {
        let record = ActivityRecord::try_from(raw)
            .inspect_err(|e| warn!("Rejected activity record: {e}"))?;
        debug!("Appending activity {:?}", record);

        self.log.push_back(record.clone());
        self.evict_overflow();
        self.dirty = true;
        self.appends_since_save += 1;

        if self.appends_since_save >= self.save_every {
            self.save().await;
        }
        Ok(record)
    }

    /// Drops records from the front until the log fits. Returns the amount dropped.
    pub fn evict_overflow(&mut self) -> usize {
        let excess = self.log.len().saturating_sub(self.max_retained);
        self.log.drain(..excess);
        excess
    }

    /// Persists the current log if anything changed since the last successful save.
    pub async fn flush(&mut self) {
        if self.dirty {
            self.save().await;
        }
    }

    /// Empties the log and persists the empty state.
    pub async fn clear(&mut self) {
        self.log.clear();
        self.dirty = true;
        self.save().await;
    }

    pub fn records(&self) -> &VecDeque<ActivityRecord> {
        &self.log
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    async fn save(&mut self) {
        // A failed save is retried on the next batch or on flush.
        self.appends_since_save = 0;
        match store_value(&self.storage, ACTIVITY_LOG_KEY, &self.log).await {
            Ok(()) => {
                debug!("Saved {} activity records", self.log.len());
                self.dirty = false;
            }
            Err(e) => {
                error!("Failed to save activity log, keeping it in memory: {e:?}");
            }
        }
    }
}
