//! Inbound events of the daemon and the wire format they arrive in.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;

use super::{
    error::UnknownActionError,
    notification::Notification,
    storage::{
        entities::{ActivityRecord, RawActivity},
        settings::{Settings, SettingsPatch},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdleState {
    Active,
    Idle,
    Locked,
}

/// User-initiated request. Each one is answered with exactly one [Response].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Message {
    GoingToBed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
    Snooze {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<i64>,
    },
    GetActivityData,
    GetSettings,
    UpdateSettings {
        #[serde(default)]
        settings: SettingsPatch,
    },
    ClearData,
}

impl Message {
    /// Interprets a raw message. Anything that is not one of the known actions with a usable
    /// payload is an unknown action.
    pub fn parse(value: Value) -> Result<Message, UnknownActionError> {
        serde_json::from_value(value).map_err(|_| UnknownActionError)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Success { success: bool },
    Data { data: Vec<ActivityRecord> },
    Settings { settings: Settings },
    Error { error: String },
}

impl Response {
    pub fn success() -> Self {
        Response::Success { success: true }
    }
}

impl From<UnknownActionError> for Response {
    fn from(value: UnknownActionError) -> Self {
        Response::Error {
            error: value.to_string(),
        }
    }
}

/// Everything the event loop reacts to. Delivered one at a time over a single channel, so the
/// handlers never run concurrently.
#[derive(Debug)]
pub enum InboundEvent {
    Activity(RawActivity),
    IdleState {
        state: IdleState,
        timestamp: Option<i64>,
    },
    AlarmFired(String),
    Message {
        message: Result<Message, UnknownActionError>,
        reply: oneshot::Sender<Response>,
    },
}

/// One line of the inbound feed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedLine {
    Activity(RawActivity),
    Idle {
        state: IdleState,
        #[serde(default)]
        timestamp: Option<i64>,
    },
    Message {
        message: Value,
    },
}

/// One line of the outbound stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outbound {
    Response(Response),
    Notification(Notification),
}
