use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::daemon::{
    events::IdleState,
    storage::entities::{ActivityKind, RawActivity},
};

/// Turns an idle-state change into an activity record. Locking the screen is not recorded.
pub fn idle_activity(
    state: IdleState,
    timestamp: Option<i64>,
    now: DateTime<Utc>,
) -> Option<RawActivity> {
    let (kind, label) = match state {
        IdleState::Active => (ActivityKind::IdleReturn, "active"),
        IdleState::Idle => (ActivityKind::IdleStart, "idle"),
        IdleState::Locked => return None,
    };
    let mut raw = RawActivity::new(kind.as_str(), now).with_metadata("idleState", label);
    if let Some(timestamp) = timestamp {
        raw.timestamp = Some(Value::from(timestamp));
    }
    Some(raw)
}
