use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::daemon::error::ValidationError;

/// Kind of an activity record. Anything outside this set is rejected on append.
#[derive(PartialEq, Eq, Hash, Debug, Serialize, Deserialize, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Mouse,
    Keyboard,
    Tab,
    TabSwitch,
    IdleStart,
    IdleReturn,
    App,
    Other,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 8] = [
        ActivityKind::Mouse,
        ActivityKind::Keyboard,
        ActivityKind::Tab,
        ActivityKind::TabSwitch,
        ActivityKind::IdleStart,
        ActivityKind::IdleReturn,
        ActivityKind::App,
        ActivityKind::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Mouse => "mouse",
            ActivityKind::Keyboard => "keyboard",
            ActivityKind::Tab => "tab",
            ActivityKind::TabSwitch => "tab_switch",
            ActivityKind::IdleStart => "idle_start",
            ActivityKind::IdleReturn => "idle_return",
            ActivityKind::App => "app",
            ActivityKind::Other => "other",
        }
    }

    // Statistics group kinds by name fragment, so `tab_switch` is counted as a tab event.

    pub fn is_mouse_like(&self) -> bool {
        self.as_str().contains("mouse")
    }

    pub fn is_keyboard(&self) -> bool {
        self.as_str().contains("keyboard")
    }

    pub fn is_tab_like(&self) -> bool {
        self.as_str().contains("tab")
    }
}

impl Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActivityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownType(s.to_string()))
    }
}

/// A single timestamped input or context-change event, as stored in the activity log.
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct ActivityRecord {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Opaque host data such as `tabId`, `url`, `title`, `idleState` or `position`.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl ActivityRecord {
    pub fn new(kind: ActivityKind, timestamp: DateTime<Utc>, metadata: Map<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            timestamp,
            metadata,
        }
    }
}

/// Activity as delivered by a sensor, before validation. Every field other than `type` and
/// `timestamp` is kept as metadata.
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone, Default)]
pub struct RawActivity {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl RawActivity {
    pub fn new(kind: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: kind.into(),
            timestamp: Some(Value::from(timestamp.timestamp_millis())),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

impl TryFrom<RawActivity> for ActivityRecord {
    type Error = ValidationError;

    fn try_from(
        RawActivity {
            kind,
            timestamp,
            mut metadata,
        }: RawActivity,
    ) -> Result<Self, Self::Error> {
        let kind = kind.parse::<ActivityKind>()?;
        let timestamp = match timestamp {
            Some(value) => parse_timestamp(&value)?,
            None => return Err(ValidationError::InvalidTimestamp("nothing".into())),
        };
        // Identity is assigned here, a sensor supplied id is not trusted to be unique.
        metadata.remove("id");
        Ok(ActivityRecord::new(kind, timestamp, metadata))
    }
}

fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>, ValidationError> {
    let invalid = || ValidationError::InvalidTimestamp(value.to_string());
    let Value::Number(number) = value else {
        return Err(invalid());
    };
    let millis = if let Some(v) = number.as_u64() {
        i64::try_from(v).map_err(|_| invalid())?
    } else {
        match number.as_f64() {
            Some(v) if v.is_finite() && v >= 0. && v.fract() == 0. && v < i64::MAX as f64 => {
                v as i64
            }
            _ => return Err(invalid()),
        }
    };
    DateTime::from_timestamp_millis(millis).ok_or_else(invalid)
}
