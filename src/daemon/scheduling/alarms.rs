use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{daemon::events::InboundEvent, utils::clock::Clock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmKind {
    Daily,
    Snooze,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmState {
    Scheduled,
    Fired,
    Cleared,
}

/// An outstanding or finished alarm. The name is the identity of an alarm; the timer service
/// only ever sees names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmHandle {
    pub name: String,
    pub kind: AlarmKind,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub fire_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i64>,
    pub state: AlarmState,
}

/// Timer backend. Creating an alarm under an existing name replaces it; cancelling an unknown or
/// already fired alarm does nothing.
#[cfg_attr(test, mockall::automock)]
pub trait AlarmService {
    fn create(&mut self, handle: &AlarmHandle);

    fn cancel(&mut self, name: &str);
}

/// [AlarmService] backed by tokio tasks. A fired alarm comes back to the daemon as
/// [InboundEvent::AlarmFired] on the event channel.
pub struct TokioAlarms {
    events: mpsc::Sender<InboundEvent>,
    clock: Arc<dyn Clock>,
    shutdown: CancellationToken,
    pending: HashMap<String, CancellationToken>,
}

impl TokioAlarms {
    pub fn new(
        events: mpsc::Sender<InboundEvent>,
        clock: Arc<dyn Clock>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            events,
            clock,
            shutdown,
            pending: HashMap::new(),
        }
    }
}

impl AlarmService for TokioAlarms {
    fn create(&mut self, handle: &AlarmHandle) {
        self.cancel(&handle.name);

        // Deadlines already in the past fire right away.
        let delay = (handle.fire_at - self.clock.time())
            .to_std()
            .unwrap_or_default();
        let token = self.shutdown.child_token();
        let name = handle.name.clone();
        let events = self.events.clone();
        let clock = self.clock.clone();
        let cancelled = token.clone();

        debug!("Arming alarm {name} in {delay:?}");
        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {
                    debug!("Alarm {name} was cancelled");
                }
                _ = clock.sleep(delay) => {
                    if let Err(e) = events.send(InboundEvent::AlarmFired(name)).await {
                        warn!("Alarm fired after the event loop stopped: {e}");
                    }
                }
            }
        });

        self.pending.insert(handle.name.clone(), token);
    }

    fn cancel(&mut self, name: &str) {
        if let Some(token) = self.pending.remove(name) {
            token.cancel();
        }
    }
}
