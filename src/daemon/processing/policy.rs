use chrono::{DateTime, Duration, TimeZone, Utc};
use tracing::debug;

use crate::daemon::storage::{entities::ActivityRecord, settings::Settings};

use super::classifier::{count_since, LateNightWindow};

pub const ACTIVITY_WINDOW_MINUTES: i64 = 30;
/// More than this many records inside the activity window means the user is still engaged.
pub const ACTIVITY_THRESHOLD: usize = 20;
pub const COOLDOWN_MINUTES: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyConfig {
    pub activity_window: Duration,
    pub activity_threshold: usize,
    pub cooldown: Duration,
    pub late_night: LateNightWindow,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            activity_window: Duration::minutes(ACTIVITY_WINDOW_MINUTES),
            activity_threshold: ACTIVITY_THRESHOLD,
            cooldown: Duration::minutes(COOLDOWN_MINUTES),
            late_night: LateNightWindow::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotLateNight,
    NotificationsDisabled,
    LowActivity { recent: usize },
    Cooldown { remaining: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderDecision {
    Fire,
    Skip(SkipReason),
}

impl ReminderDecision {
    pub fn fires(&self) -> bool {
        matches!(self, ReminderDecision::Fire)
    }
}

/// Decides whether a spontaneous late-night reminder should be shown. At most one reminder fires
/// per cooldown window; the cooldown starts the moment [ReminderPolicy::evaluate] returns
/// [ReminderDecision::Fire].
pub struct ReminderPolicy {
    config: PolicyConfig,
    last_reminder_at: Option<DateTime<Utc>>,
}

impl ReminderPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self {
            config,
            last_reminder_at: None,
        }
    }

    pub fn with_last_reminder(mut self, last_reminder_at: Option<DateTime<Utc>>) -> Self {
        self.last_reminder_at = last_reminder_at;
        self
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn last_reminder_at(&self) -> Option<DateTime<Utc>> {
        self.last_reminder_at
    }

    pub fn reset_cooldown(&mut self) {
        self.last_reminder_at = None;
    }

    pub fn evaluate<'a, Tz: TimeZone>(
        &mut self,
        now: &DateTime<Tz>,
        log: impl IntoIterator<Item = &'a ActivityRecord>,
        settings: &Settings,
    ) -> ReminderDecision {
        let decision = self.decide(now, log, settings);
        if decision.fires() {
            self.last_reminder_at = Some(now.with_timezone(&Utc));
        }
        debug!("Reminder evaluation: {:?}", decision);
        decision
    }

    fn decide<'a, Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
        log: impl IntoIterator<Item = &'a ActivityRecord>,
        settings: &Settings,
    ) -> ReminderDecision {
        if !self.config.late_night.contains_moment(now) {
            return ReminderDecision::Skip(SkipReason::NotLateNight);
        }
        if !settings.notifications_enabled {
            return ReminderDecision::Skip(SkipReason::NotificationsDisabled);
        }

        let now = now.with_timezone(&Utc);
        let recent = count_since(log, now - self.config.activity_window);
        if recent <= self.config.activity_threshold {
            return ReminderDecision::Skip(SkipReason::LowActivity { recent });
        }

        match self.last_reminder_at {
            Some(last) if now - last < self.config.cooldown => {
                ReminderDecision::Skip(SkipReason::Cooldown {
                    remaining: self.config.cooldown - (now - last),
                })
            }
            _ => ReminderDecision::Fire,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use serde_json::Map;

    use super::{PolicyConfig, ReminderDecision, ReminderPolicy, SkipReason};
    use crate::daemon::storage::{
        entities::{ActivityKind, ActivityRecord},
        settings::Settings,
    };

    fn burst(end: DateTime<Utc>, amount: usize, spacing: Duration) -> Vec<ActivityRecord> {
        (0..amount)
            .map(|i| ActivityRecord::new(ActivityKind::Mouse, end - spacing * i as i32, Map::new()))
            .collect()
    }

    fn late_evening() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 23, 40, 0).unwrap()
    }

    #[test]
    fn test_fires_on_busy_late_night() {
        let now = late_evening();
        let log = burst(now, 21, Duration::minutes(1));
        let mut policy = ReminderPolicy::new(PolicyConfig::default());

        assert_eq!(
            policy.evaluate(&now, &log, &Settings::default()),
            ReminderDecision::Fire
        );
        assert_eq!(policy.last_reminder_at(), Some(now));
    }

    #[test]
    fn test_cooldown_suppresses_immediate_repeat() {
        let now = late_evening();
        let mut log = burst(now, 21, Duration::minutes(1));
        let mut policy = ReminderPolicy::new(PolicyConfig::default());
        assert!(policy.evaluate(&now, &log, &Settings::default()).fires());

        let later = now + Duration::seconds(20);
        log.extend(burst(later, 1, Duration::zero()));

        assert!(matches!(
            policy.evaluate(&later, &log, &Settings::default()),
            ReminderDecision::Skip(SkipReason::Cooldown { .. })
        ));
        assert_eq!(policy.last_reminder_at(), Some(now));
    }

    #[test]
    fn test_cooldown_expires_after_window() {
        let start = Utc.with_ymd_and_hms(2024, 5, 2, 0, 30, 0).unwrap();
        let end = start + Duration::minutes(31);
        let log = burst(end, 130, Duration::seconds(30));
        let settings = Settings::default();
        let mut policy = ReminderPolicy::new(PolicyConfig::default());

        assert!(policy.evaluate(&start, &log, &settings).fires());
        assert!(!policy
            .evaluate(&(start + Duration::minutes(10)), &log, &settings)
            .fires());
        assert!(policy.evaluate(&end, &log, &settings).fires());
        assert_eq!(policy.last_reminder_at(), Some(end));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let now = late_evening();
        let log = burst(now, 20, Duration::minutes(1));
        let mut policy = ReminderPolicy::new(PolicyConfig::default());

        assert_eq!(
            policy.evaluate(&now, &log, &Settings::default()),
            ReminderDecision::Skip(SkipReason::LowActivity { recent: 20 })
        );
        assert_eq!(policy.last_reminder_at(), None);
    }

    #[test]
    fn test_old_activity_does_not_count() {
        let now = late_evening();
        let log = burst(now - Duration::minutes(31), 50, Duration::seconds(1));
        let mut policy = ReminderPolicy::new(PolicyConfig::default());

        assert_eq!(
            policy.evaluate(&now, &log, &Settings::default()),
            ReminderDecision::Skip(SkipReason::LowActivity { recent: 0 })
        );
    }

    #[test]
    fn test_skips_outside_late_night_and_when_disabled() {
        let evening = Utc.with_ymd_and_hms(2024, 5, 1, 21, 0, 0).unwrap();
        let mut policy = ReminderPolicy::new(PolicyConfig::default());
        assert_eq!(
            policy.evaluate(
                &evening,
                &burst(evening, 40, Duration::seconds(5)),
                &Settings::default()
            ),
            ReminderDecision::Skip(SkipReason::NotLateNight)
        );

        let now = late_evening();
        let settings = Settings {
            notifications_enabled: false,
            ..Default::default()
        };
        assert_eq!(
            policy.evaluate(&now, &burst(now, 40, Duration::seconds(5)), &settings),
            ReminderDecision::Skip(SkipReason::NotificationsDisabled)
        );
    }

    #[test]
    fn test_restored_cooldown_is_respected() {
        let now = late_evening();
        let mut policy = ReminderPolicy::new(PolicyConfig::default())
            .with_last_reminder(Some(now - Duration::minutes(29)));

        assert!(!policy
            .evaluate(&now, &burst(now, 21, Duration::seconds(5)), &Settings::default())
            .fires());

        policy.reset_cooldown();
        assert!(policy
            .evaluate(&now, &burst(now, 21, Duration::seconds(5)), &Settings::default())
            .fires());
    }
}
