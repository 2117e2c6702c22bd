//! Test doubles shared by the daemon tests.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    notification::{Notification, Notifier},
    scheduling::alarms::{AlarmHandle, AlarmService},
};
use crate::utils::clock::Clock;

/// Clock that only moves when told to.
#[derive(Clone)]
pub struct ManualClock(Arc<Mutex<DateTime<Utc>>>);

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self(Arc::new(Mutex::new(start)))
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.0.lock().unwrap() += by;
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn time(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Alarm service recording what is armed, keyed by name.
#[derive(Clone, Default)]
pub struct ManualAlarms(Arc<Mutex<BTreeMap<String, DateTime<Utc>>>>);

impl ManualAlarms {
    pub fn armed(&self) -> BTreeMap<String, DateTime<Utc>> {
        self.0.lock().unwrap().clone()
    }
}

impl AlarmService for ManualAlarms {
    fn create(&mut self, handle: &AlarmHandle) {
        self.0
            .lock()
            .unwrap()
            .insert(handle.name.clone(), handle.fire_at);
    }

    fn cancel(&mut self, name: &str) {
        self.0.lock().unwrap().remove(name);
    }
}

#[derive(Clone, Default)]
pub struct RecordingNotifier(Arc<Mutex<Vec<Notification>>>);

impl RecordingNotifier {
    pub fn delivered(&self) -> Vec<Notification> {
        self.0.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn deliver(&self, notification: Notification) {
        self.0.lock().unwrap().push(notification);
    }
}
