//! Pure computations over an activity log snapshot. "Now" is always passed in, and local hours
//! are taken in the timezone of that "now".

use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use serde::Serialize;

use crate::{
    daemon::storage::entities::{ActivityKind, ActivityRecord},
    utils::time::start_of_day,
};

pub const LATE_NIGHT_START_HOUR: u32 = 23;
pub const LATE_NIGHT_END_HOUR: u32 = 5;

/// Range of local hours, both ends inclusive, during which reminders are active. The range wraps
/// around midnight when `start_hour > end_hour`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LateNightWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for LateNightWindow {
    fn default() -> Self {
        Self {
            start_hour: LATE_NIGHT_START_HOUR,
            end_hour: LATE_NIGHT_END_HOUR,
        }
    }
}

impl LateNightWindow {
    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            self.start_hour <= hour && hour <= self.end_hour
        } else {
            hour >= self.start_hour || hour <= self.end_hour
        }
    }

    pub fn contains_moment<Tz: TimeZone>(&self, moment: &DateTime<Tz>) -> bool {
        self.contains(moment.hour())
    }

    fn contains_record<Tz: TimeZone>(&self, record: &ActivityRecord, tz: &Tz) -> bool {
        self.contains_moment(&record.timestamp.with_timezone(tz))
    }
}

/// Whether a local hour is in the default late-night window: 23:00 through 05:59.
pub fn is_late_night(hour: u32) -> bool {
    LateNightWindow::default().contains(hour)
}

/// Number of records strictly newer than `since`.
pub fn count_since<'a>(
    log: impl IntoIterator<Item = &'a ActivityRecord>,
    since: DateTime<Utc>,
) -> usize {
    log.into_iter().filter(|r| r.timestamp > since).count()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayStats {
    pub total: usize,
    pub mouse: usize,
    pub keyboard: usize,
    pub tab: usize,
    pub late_night: usize,
}

/// Counts of today's records, today being the local day `now` falls in.
pub fn stats_for_today<'a, Tz: TimeZone>(
    log: impl IntoIterator<Item = &'a ActivityRecord>,
    now: &DateTime<Tz>,
) -> TodayStats {
    stats_for_today_in(log, now, &LateNightWindow::default())
}

pub fn stats_for_today_in<'a, Tz: TimeZone>(
    log: impl IntoIterator<Item = &'a ActivityRecord>,
    now: &DateTime<Tz>,
    window: &LateNightWindow,
) -> TodayStats {
    let tz = now.timezone();
    let day_start = start_of_day(now).with_timezone(&Utc);

    log.into_iter()
        .filter(|r| r.timestamp >= day_start)
        .fold(TodayStats::default(), |mut stats, record| {
            stats.total += 1;
            stats.mouse += record.kind.is_mouse_like() as usize;
            stats.keyboard += record.kind.is_keyboard() as usize;
            stats.tab += record.kind.is_tab_like() as usize;
            stats.late_night += window.contains_record(record, &tz) as usize;
            stats
        })
}

/// Short-term summary of the whole log.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentStats {
    pub last_minute: usize,
    pub last_hour: usize,
    pub late_night: usize,
}

pub fn recent_stats<'a, Tz: TimeZone>(
    log: impl IntoIterator<Item = &'a ActivityRecord>,
    now: &DateTime<Tz>,
    window: &LateNightWindow,
) -> RecentStats {
    let tz = now.timezone();
    let now = now.with_timezone(&Utc);

    log.into_iter()
        .fold(RecentStats::default(), |mut stats, record| {
            let age = now - record.timestamp;
            stats.last_minute += (age < Duration::minutes(1)) as usize;
            stats.last_hour += (age < Duration::hours(1)) as usize;
            stats.late_night += window.contains_record(record, &tz) as usize;
            stats
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityFilter {
    All,
    LateNight,
    Kind(ActivityKind),
}

impl FromStr for ActivityFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(ActivityFilter::All),
            "late-night" => Ok(ActivityFilter::LateNight),
            other => other
                .parse::<ActivityKind>()
                .map(ActivityFilter::Kind)
                .map_err(|_| anyhow!("Can't parse {other} into an activity filter")),
        }
    }
}

/// Records matching `filter`, in log order. Late-night membership uses hours in `tz`.
pub fn filter_log<'a, Tz: TimeZone>(
    log: impl IntoIterator<Item = &'a ActivityRecord>,
    filter: ActivityFilter,
    window: &LateNightWindow,
    tz: &Tz,
) -> Vec<&'a ActivityRecord> {
    log.into_iter()
        .filter(|record| match filter {
            ActivityFilter::All => true,
            ActivityFilter::LateNight => window.contains_record(record, tz),
            ActivityFilter::Kind(kind) => record.kind == kind,
        })
        .collect()
}
