use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Timelike, Utc};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::{
    daemon::{
        collection::idle::idle_activity,
        error::{UnknownActionError, ValidationError},
        events::{IdleState, InboundEvent, Message, Response},
        notification::{Notification, Notifier},
        scheduling::{
            alarms::{AlarmHandle, AlarmKind, AlarmService},
            reminder::ReminderScheduler,
        },
        storage::{
            activity_store::ActivityStore,
            entities::{ActivityRecord, RawActivity},
            persistence::{
                load_value, store_value, KeyValueStorage, LAST_BEDTIME_KEY, LAST_REMINDER_KEY,
            },
            settings::{SettingsPatch, SettingsStore},
        },
    },
    utils::clock::Clock,
};

use super::{
    classifier::{stats_for_today_in, TodayStats},
    module::EventProcessor,
    policy::{PolicyConfig, ReminderDecision, ReminderPolicy},
};

/// The single owner of all reminder state: activity log, settings, cooldown and alarms.
///
/// Every inbound event kind has its own handler. Handlers take `&mut self`, so events are
/// applied one at a time; storage writes may lag behind, the in-memory state is authoritative.
pub struct SleepGuard<S, A, N, Tz: TimeZone> {
    storage: S,
    activity: ActivityStore<S>,
    settings: SettingsStore<S>,
    policy: ReminderPolicy,
    scheduler: ReminderScheduler<A, N>,
    clock: Arc<dyn Clock>,
    timezone: Tz,
}

impl<S, A, N, Tz> SleepGuard<S, A, N, Tz>
where
    S: KeyValueStorage + Clone,
    A: AlarmService,
    N: Notifier,
    Tz: TimeZone,
{
    /// Restores persisted state and arms the daily alarm.
    pub async fn load(
        storage: S,
        alarms: A,
        notifier: N,
        clock: Arc<dyn Clock>,
        timezone: Tz,
        config: PolicyConfig,
    ) -> Self {
        let mut activity = ActivityStore::new(storage.clone());
        activity.load().await;
        let mut settings = SettingsStore::new(storage.clone());
        settings.load().await;

        let last_reminder_at = match load_value::<i64>(&storage, LAST_REMINDER_KEY).await {
            Ok(v) => v.and_then(DateTime::from_timestamp_millis),
            Err(e) => {
                error!("Failed to load last reminder time {e:?}");
                None
            }
        };

        let mut guard = Self {
            storage,
            activity,
            settings,
            policy: ReminderPolicy::new(config).with_last_reminder(last_reminder_at),
            scheduler: ReminderScheduler::new(alarms, notifier),
            clock,
            timezone,
        };
        guard.arm_daily_alarm();
        guard
    }

    pub fn activity(&self) -> &ActivityStore<S> {
        &self.activity
    }

    pub fn settings(&self) -> &SettingsStore<S> {
        &self.settings
    }

    pub fn policy(&self) -> &ReminderPolicy {
        &self.policy
    }

    pub fn scheduler(&self) -> &ReminderScheduler<A, N> {
        &self.scheduler
    }

    pub fn today_stats(&self) -> TodayStats {
        stats_for_today_in(
            self.activity.records(),
            &self.now(),
            &self.policy.config().late_night,
        )
    }

    /// Records an activity and checks whether it is time for a reminder. Records without a
    /// timestamp are stamped with the current time.
    pub async fn on_activity(
        &mut self,
        mut raw: RawActivity,
    ) -> Result<ActivityRecord, ValidationError> {
        if raw.timestamp.is_none() {
            raw.timestamp = Some(Value::from(self.clock.time().timestamp_millis()));
        }
        let record = self.activity.append(raw).await?;
        self.check_late_night_reminder().await;
        Ok(record)
    }

    pub async fn on_idle_state(&mut self, state: IdleState, timestamp: Option<i64>) {
        let Some(raw) = idle_activity(state, timestamp, self.clock.time()) else {
            debug!("Ignoring idle state {state:?}");
            return;
        };
        if let Err(e) = self.on_activity(raw).await {
            warn!("Idle state change was not recorded: {e}");
        }
    }

    pub fn on_alarm(&mut self, name: &str) -> Option<AlarmHandle> {
        let fired = self.scheduler.on_fire(name)?;
        if fired.kind == AlarmKind::Daily {
            if self.settings.get().notifications_enabled {
                self.scheduler.notify(Notification::bedtime());
            }
            self.arm_daily_alarm();
        }
        Some(fired)
    }

    pub async fn on_message(&mut self, message: Result<Message, UnknownActionError>) -> Response {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                warn!("Received a message with an unknown action");
                return e.into();
            }
        };
        debug!("Handling message {:?}", message);

        match message {
            Message::GoingToBed { timestamp } => {
                self.on_going_to_bed(timestamp).await;
                Response::success()
            }
            Message::Snooze { duration } => {
                let now = self.now();
                let handle = self.scheduler.on_snooze_request(duration, &now);
                info!("Snoozed until {}", handle.fire_at);
                Response::success()
            }
            Message::GetActivityData => Response::Data {
                data: self.activity.records().iter().cloned().collect(),
            },
            Message::GetSettings => Response::Settings {
                settings: self.settings.get().clone(),
            },
            Message::UpdateSettings { settings } => {
                self.update_settings(settings).await;
                Response::success()
            }
            Message::ClearData => {
                self.clear_data().await;
                Response::success()
            }
        }
    }

    /// Wipes every persisted value, then writes back the current settings and an empty log.
    pub async fn clear_data(&mut self) {
        if let Err(e) = self.storage.clear().await {
            error!("Failed to clear storage {e:?}");
        }
        self.policy.reset_cooldown();
        self.settings.persist().await;
        self.activity.clear().await;
        info!("Cleared all activity data");
    }

    pub async fn flush(&mut self) {
        self.activity.flush().await;
    }

    async fn on_going_to_bed(&mut self, timestamp: Option<i64>) {
        let bedtime = timestamp.unwrap_or_else(|| self.clock.time().timestamp_millis());
        if let Err(e) = store_value(&self.storage, LAST_BEDTIME_KEY, &bedtime).await {
            error!("Failed to save bedtime {e:?}");
        }
        self.scheduler.on_going_to_bed();
    }

    async fn update_settings(&mut self, patch: SettingsPatch) {
        let previous = self.settings.get().sleep_time.clone();
        let updated = self.settings.set(patch).await;
        if updated.sleep_time != previous {
            self.arm_daily_alarm();
        }
    }

    async fn check_late_night_reminder(&mut self) -> ReminderDecision {
        let now = self.now();
        let decision = self
            .policy
            .evaluate(&now, self.activity.records(), self.settings.get());

        if decision.fires() {
            info!("Late night activity detected, reminding to go to bed");
            self.scheduler.notify(Notification::sleep_reminder());
            let fired_at = now.with_timezone(&Utc).timestamp_millis();
            if let Err(e) = store_value(&self.storage, LAST_REMINDER_KEY, &fired_at).await {
                error!("Failed to save reminder time {e:?}");
            }
        }
        decision
    }

    fn arm_daily_alarm(&mut self) {
        let at = self.settings.get().sleep_time();
        let now = self.now();
        match self.scheduler.schedule_daily(at.hour(), at.minute(), &now) {
            Ok(handle) => info!("Daily sleep reminder set for {}", handle.fire_at),
            Err(e) => error!("Failed to set daily sleep reminder {e}"),
        }
    }

    fn now(&self) -> DateTime<Tz> {
        self.clock.time().with_timezone(&self.timezone)
    }
}

impl<S, A, N, Tz> EventProcessor for SleepGuard<S, A, N, Tz>
where
    S: KeyValueStorage + Clone,
    A: AlarmService,
    N: Notifier,
    Tz: TimeZone,
{
    async fn process_next(&mut self, event: InboundEvent) -> Result<()> {
        match event {
            InboundEvent::Activity(raw) => {
                self.on_activity(raw).await?;
            }
            InboundEvent::IdleState { state, timestamp } => {
                self.on_idle_state(state, timestamp).await;
            }
            InboundEvent::AlarmFired(name) => {
                self.on_alarm(&name);
            }
            InboundEvent::Message { message, reply } => {
                let response = self.on_message(message).await;
                if reply.send(response).is_err() {
                    warn!("Sender of the message is gone, dropping the response");
                }
            }
        }
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        self.flush().await;
        Ok(())
    }
}
