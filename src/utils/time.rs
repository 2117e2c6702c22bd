use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, NaiveTime, TimeZone};

/// Upper bound on how far a skipped wall-clock time is pushed forward. Real DST gaps are an hour.
const MAX_GAP_HOURS: i64 = 24;

/// Maps a wall-clock time onto the timeline. Ambiguous times take the earlier instant, skipped
/// times move forward an hour at a time until they exist.
pub fn resolve_local<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> DateTime<Tz> {
    let mut candidate = local;
    for _ in 0..MAX_GAP_HOURS {
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(v) => return v,
            LocalResult::Ambiguous(earliest, _) => return earliest,
            LocalResult::None => candidate += Duration::hours(1),
        }
    }
    tz.from_utc_datetime(&local)
}

/// Returns start of the day `moment` falls in, in its own timezone.
pub fn start_of_day<Tz: TimeZone>(moment: &DateTime<Tz>) -> DateTime<Tz> {
    resolve_local(&moment.timezone(), moment.date_naive().and_time(NaiveTime::MIN))
}

/// Next wall-clock occurrence of `at` strictly after `now`: today if it is still ahead,
/// tomorrow otherwise.
pub fn next_occurrence<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = resolve_local(&tz, now.date_naive().and_time(at));
    if today > *now {
        return today;
    }
    match now.date_naive().succ_opt() {
        Some(tomorrow) => resolve_local(&tz, tomorrow.and_time(at)),
        None => today,
    }
}
