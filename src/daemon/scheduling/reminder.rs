use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use tracing::{debug, info, warn};

use crate::{
    daemon::{
        error::ScheduleError,
        notification::{Notification, Notifier},
    },
    utils::time::next_occurrence,
};

use super::alarms::{AlarmHandle, AlarmKind, AlarmService, AlarmState};

pub const DEFAULT_SNOOZE_MINUTES: i64 = 30;
/// Longest accepted snooze, one day. Longer requests are shortened to it.
pub const MAX_SNOOZE_MINUTES: i64 = 24 * 60;
pub const DAILY_ALARM_NAME: &str = "dailySleepReminder";
const SNOOZE_ALARM_PREFIX: &str = "sleepReminder";

/// Snooze length actually used for a request. Missing and non-positive durations fall back to
/// the default instead of being rejected, anything above a day is cut to a day.
pub fn resolve_snooze_minutes(duration: Option<i64>) -> i64 {
    match duration {
        Some(minutes) if minutes > MAX_SNOOZE_MINUTES => {
            warn!("Snooze of {minutes} minutes is too long, using {MAX_SNOOZE_MINUTES}");
            MAX_SNOOZE_MINUTES
        }
        Some(minutes) if minutes > 0 => minutes,
        _ => DEFAULT_SNOOZE_MINUTES,
    }
}

/// Owns the outstanding alarms: at most one daily alarm and any number of snoozes.
///
/// Alarms move `Scheduled -> Fired` when the timer goes off and `Scheduled -> Cleared` when
/// cancelled; either way they leave the outstanding set. The daily alarm does not re-arm itself,
/// its owner schedules the next one after handling a firing.
pub struct ReminderScheduler<A, N> {
    service: A,
    notifier: N,
    outstanding: BTreeMap<String, AlarmHandle>,
    sequence: u64,
}

impl<A: AlarmService, N: Notifier> ReminderScheduler<A, N> {
    pub fn new(service: A, notifier: N) -> Self {
        Self {
            service,
            notifier,
            outstanding: BTreeMap::new(),
            sequence: 0,
        }
    }

    /// Arms the daily alarm for the next `hours:minutes` local time strictly after `now`,
    /// replacing a previous daily alarm.
    pub fn schedule_daily<Tz: TimeZone>(
        &mut self,
        hours: u32,
        minutes: u32,
        now: &DateTime<Tz>,
    ) -> Result<AlarmHandle, ScheduleError> {
        let at =
            NaiveTime::from_hms_opt(hours, minutes, 0).ok_or(ScheduleError { hours, minutes })?;
        let fire_at = next_occurrence(now, at).with_timezone(&Utc);

        if self.outstanding.remove(DAILY_ALARM_NAME).is_some() {
            self.service.cancel(DAILY_ALARM_NAME);
        }

        Ok(self.arm(AlarmHandle {
            name: DAILY_ALARM_NAME.into(),
            kind: AlarmKind::Daily,
            fire_at,
            created_at: now.with_timezone(&Utc),
            duration_minutes: None,
            state: AlarmState::Scheduled,
        }))
    }

    /// Arms a new snooze alarm. Snoozes never replace each other.
    pub fn schedule_snooze<Tz: TimeZone>(
        &mut self,
        duration_minutes: Option<i64>,
        now: &DateTime<Tz>,
    ) -> AlarmHandle {
        let mut minutes = resolve_snooze_minutes(duration_minutes);
        let created_at = now.with_timezone(&Utc);
        let fire_at = match created_at.checked_add_signed(Duration::minutes(minutes)) {
            Some(fire_at) => fire_at,
            None => {
                warn!("Snooze deadline out of range, using {DEFAULT_SNOOZE_MINUTES} minutes");
                minutes = DEFAULT_SNOOZE_MINUTES;
                created_at
                    .checked_add_signed(Duration::minutes(minutes))
                    .unwrap_or(created_at)
            }
        };
        self.sequence += 1;

        self.arm(AlarmHandle {
            name: format!(
                "{SNOOZE_ALARM_PREFIX}_{}_{}",
                created_at.timestamp_millis(),
                self.sequence
            ),
            kind: AlarmKind::Snooze,
            fire_at,
            created_at,
            duration_minutes: Some(minutes),
            state: AlarmState::Scheduled,
        })
    }

    pub fn on_snooze_request<Tz: TimeZone>(
        &mut self,
        duration_minutes: Option<i64>,
        now: &DateTime<Tz>,
    ) -> AlarmHandle {
        self.schedule_snooze(duration_minutes, now)
    }

    /// Handles a timer going off. Unknown or already cancelled names are ignored.
    pub fn on_fire(&mut self, name: &str) -> Option<AlarmHandle> {
        let Some(mut handle) = self.outstanding.remove(name) else {
            debug!("Ignoring alarm {name}, it is not outstanding");
            return None;
        };
        // Lets the timer service forget the finished alarm.
        self.service.cancel(name);
        handle.state = AlarmState::Fired;
        info!("Alarm {name} fired");

        if handle.kind == AlarmKind::Snooze {
            self.notifier.deliver(Notification::snooze_expired());
        }
        Some(handle)
    }

    /// Cancels every pending snooze, leaving the daily alarm alone, and says good night.
    pub fn on_going_to_bed(&mut self) -> Vec<AlarmHandle> {
        let snoozes = self
            .outstanding
            .values()
            .filter(|handle| handle.kind == AlarmKind::Snooze)
            .map(|handle| handle.name.clone())
            .collect::<Vec<_>>();

        let cancelled = snoozes
            .iter()
            .filter_map(|name| self.cancel(name))
            .collect::<Vec<_>>();
        info!("Going to bed, cancelled {} snooze alarms", cancelled.len());

        self.notifier.deliver(Notification::good_night());
        cancelled
    }

    /// Cancels an outstanding alarm. Returns `None` for unknown or fired alarms.
    pub fn cancel(&mut self, name: &str) -> Option<AlarmHandle> {
        let mut handle = self.outstanding.remove(name)?;
        self.service.cancel(name);
        handle.state = AlarmState::Cleared;
        Some(handle)
    }

    pub fn notify(&self, notification: Notification) {
        self.notifier.deliver(notification);
    }

    pub fn outstanding(&self) -> impl Iterator<Item = &AlarmHandle> {
        self.outstanding.values()
    }

    pub fn daily(&self) -> Option<&AlarmHandle> {
        self.outstanding.get(DAILY_ALARM_NAME)
    }

    pub fn snoozes(&self) -> impl Iterator<Item = &AlarmHandle> {
        self.outstanding
            .values()
            .filter(|handle| handle.kind == AlarmKind::Snooze)
    }

    fn arm(&mut self, handle: AlarmHandle) -> AlarmHandle {
        debug!("Scheduling alarm {:?}", handle);
        self.service.create(&handle);
        self.outstanding.insert(handle.name.clone(), handle.clone());
        handle
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::{ReminderScheduler, DAILY_ALARM_NAME, MAX_SNOOZE_MINUTES};
    use crate::daemon::{
        error::ScheduleError,
        notification::{MockNotifier, Notification},
        scheduling::alarms::{AlarmKind, AlarmState, MockAlarmService},
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 22, 10, 0).unwrap()
    }

    fn permissive_service() -> MockAlarmService {
        let mut service = MockAlarmService::new();
        service.expect_create().return_const(());
        service.expect_cancel().return_const(());
        service
    }

    #[test]
    fn test_snoozes_in_same_millisecond_get_distinct_names() {
        let mut service = MockAlarmService::new();
        service.expect_create().times(2).return_const(());
        service.expect_cancel().times(2).return_const(());
        let mut scheduler = ReminderScheduler::new(service, MockNotifier::new());

        let first = scheduler.schedule_snooze(Some(5), &now());
        let second = scheduler.schedule_snooze(Some(5), &now());

        assert_ne!(first.name, second.name);
        assert_eq!(scheduler.snoozes().count(), 2);

        assert_eq!(
            scheduler.cancel(&first.name).map(|h| h.state),
            Some(AlarmState::Cleared)
        );
        assert!(scheduler.cancel(&second.name).is_some());
        assert_eq!(scheduler.outstanding().count(), 0);
    }

    #[test]
    fn test_daily_alarm_is_replaced() -> anyhow::Result<()> {
        let mut service = MockAlarmService::new();
        service.expect_create().times(2).return_const(());
        service
            .expect_cancel()
            .withf(|name| name == DAILY_ALARM_NAME)
            .times(1)
            .return_const(());
        let mut scheduler = ReminderScheduler::new(service, MockNotifier::new());

        scheduler.schedule_daily(23, 0, &now())?;
        let later = now() + Duration::minutes(20);
        let second = scheduler.schedule_daily(23, 0, &later)?;

        assert_eq!(scheduler.outstanding().count(), 1);
        let daily = scheduler.daily().expect("daily alarm should be scheduled");
        assert_eq!(daily, &second);
        assert_eq!(daily.fire_at, Utc.with_ymd_and_hms(2024, 5, 1, 23, 0, 0).unwrap());
        assert_eq!(daily.created_at, later);
        Ok(())
    }

    #[test]
    fn test_daily_alarm_after_sleep_time_moves_to_tomorrow() -> anyhow::Result<()> {
        let mut scheduler = ReminderScheduler::new(permissive_service(), MockNotifier::new());
        let handle = scheduler.schedule_daily(21, 30, &now())?;
        assert_eq!(handle.fire_at, Utc.with_ymd_and_hms(2024, 5, 2, 21, 30, 0).unwrap());
        assert_eq!(handle.kind, AlarmKind::Daily);
        Ok(())
    }

    #[test]
    fn test_invalid_daily_time_is_rejected() {
        let mut scheduler = ReminderScheduler::new(MockAlarmService::new(), MockNotifier::new());
        assert_eq!(
            scheduler.schedule_daily(24, 0, &now()),
            Err(ScheduleError {
                hours: 24,
                minutes: 0
            })
        );
        assert!(scheduler.daily().is_none());
    }

    #[test]
    fn test_going_to_bed_cancels_only_snoozes() -> anyhow::Result<()> {
        let mut service = MockAlarmService::new();
        service.expect_create().times(3).return_const(());
        service
            .expect_cancel()
            .withf(|name| name != DAILY_ALARM_NAME)
            .times(2)
            .return_const(());
        let mut notifier = MockNotifier::new();
        notifier
            .expect_deliver()
            .withf(|n| *n == Notification::good_night())
            .times(1)
            .return_const(());
        let mut scheduler = ReminderScheduler::new(service, notifier);

        scheduler.schedule_daily(23, 0, &now())?;
        scheduler.schedule_snooze(Some(5), &now());
        scheduler.schedule_snooze(None, &now());

        let cancelled = scheduler.on_going_to_bed();

        assert_eq!(cancelled.len(), 2);
        assert!(cancelled.iter().all(|h| h.state == AlarmState::Cleared));
        assert_eq!(scheduler.snoozes().count(), 0);
        assert!(scheduler.daily().is_some());
        Ok(())
    }

    #[test]
    fn test_zero_snooze_uses_default_duration() {
        let mut scheduler = ReminderScheduler::new(permissive_service(), MockNotifier::new());

        let zero = scheduler.schedule_snooze(Some(0), &now());
        let negative = scheduler.on_snooze_request(Some(-10), &now());
        let absent = scheduler.on_snooze_request(None, &now());

        for handle in [zero, negative, absent] {
            assert_eq!(handle.duration_minutes, Some(30));
            assert_eq!(handle.fire_at, now() + Duration::minutes(30));
        }
    }

    #[test]
    fn test_huge_snooze_is_cut_to_a_day() {
        let mut scheduler = ReminderScheduler::new(permissive_service(), MockNotifier::new());

        let huge = scheduler.on_snooze_request(Some(1_000_000_000_000), &now());
        let max = scheduler.on_snooze_request(Some(i64::MAX), &now());
        let day = scheduler.on_snooze_request(Some(MAX_SNOOZE_MINUTES), &now());

        for handle in [huge, max, day] {
            assert_eq!(handle.duration_minutes, Some(MAX_SNOOZE_MINUTES));
            assert_eq!(handle.fire_at, now() + Duration::days(1));
        }
    }

    #[test]
    fn test_snooze_at_end_of_time_falls_back() {
        let mut scheduler = ReminderScheduler::new(permissive_service(), MockNotifier::new());
        let almost_max = DateTime::<Utc>::MAX_UTC - Duration::minutes(40);

        let handle = scheduler.on_snooze_request(Some(60), &almost_max);

        assert_eq!(handle.duration_minutes, Some(30));
        assert_eq!(handle.fire_at, almost_max + Duration::minutes(30));
    }

    #[test]
    fn test_snooze_firing_notifies_once() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_deliver()
            .withf(|n| *n == Notification::snooze_expired())
            .times(1)
            .return_const(());
        let mut scheduler = ReminderScheduler::new(permissive_service(), notifier);

        let handle = scheduler.schedule_snooze(Some(5), &now());
        let fired = scheduler.on_fire(&handle.name);

        assert_eq!(fired.map(|h| h.state), Some(AlarmState::Fired));
        assert!(scheduler.on_fire(&handle.name).is_none());
        assert!(scheduler.cancel(&handle.name).is_none());
    }

    #[test]
    fn test_daily_firing_does_not_rearm() -> anyhow::Result<()> {
        let mut scheduler = ReminderScheduler::new(permissive_service(), MockNotifier::new());
        scheduler.schedule_daily(23, 0, &now())?;

        let fired = scheduler.on_fire(DAILY_ALARM_NAME);

        assert_eq!(fired.map(|h| h.kind), Some(AlarmKind::Daily));
        assert!(scheduler.daily().is_none());
        Ok(())
    }

    #[test]
    fn test_unknown_alarm_is_ignored() {
        let mut scheduler = ReminderScheduler::new(MockAlarmService::new(), MockNotifier::new());
        assert!(scheduler.on_fire("sleepReminder_1_1").is_none());
        assert!(scheduler.cancel("nothing").is_none());
    }
}
