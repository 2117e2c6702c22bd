use std::path::PathBuf;

use chrono::Duration;
use clap::{Args, Parser};
use tracing::level_filters::LevelFilter;

use super::processing::{
    classifier::{LateNightWindow, LATE_NIGHT_END_HOUR, LATE_NIGHT_START_HOUR},
    policy::{PolicyConfig, ACTIVITY_THRESHOLD, ACTIVITY_WINDOW_MINUTES, COOLDOWN_MINUTES},
};

/// Upper bound for the activity window and the cooldown, one day.
const MAX_POLICY_MINUTES: i64 = 24 * 60;

#[derive(Parser)]
pub struct DaemonArgs {
    #[arg(long)]
    pub dir: Option<PathBuf>,
    /// Copies logs to stderr. Stdout is reserved for the host protocol.
    #[arg(long = "log-console")]
    pub log_console: bool,
    #[arg(long = "log-filter")]
    pub log: Option<LevelFilter>,
    #[command(flatten)]
    pub policy: PolicyArgs,
}

/// Tuning of the late-night reminder.
#[derive(Args, Debug, Clone)]
pub struct PolicyArgs {
    /// Reminder fires above this many recent records.
    #[arg(long, default_value_t = ACTIVITY_THRESHOLD)]
    pub activity_threshold: usize,
    #[arg(
        long,
        default_value_t = ACTIVITY_WINDOW_MINUTES,
        value_parser = clap::value_parser!(i64).range(1..=MAX_POLICY_MINUTES)
    )]
    pub activity_window_minutes: i64,
    /// Minimal time between two reminders.
    #[arg(
        long,
        default_value_t = COOLDOWN_MINUTES,
        value_parser = clap::value_parser!(i64).range(1..=MAX_POLICY_MINUTES)
    )]
    pub cooldown_minutes: i64,
    #[arg(
        long,
        default_value_t = LATE_NIGHT_START_HOUR,
        value_parser = clap::value_parser!(u32).range(0..24)
    )]
    pub late_night_start: u32,
    #[arg(
        long,
        default_value_t = LATE_NIGHT_END_HOUR,
        value_parser = clap::value_parser!(u32).range(0..24)
    )]
    pub late_night_end: u32,
}

impl PolicyArgs {
    pub fn policy_config(&self) -> PolicyConfig {
        PolicyConfig {
            activity_window: Duration::minutes(self.activity_window_minutes),
            activity_threshold: self.activity_threshold,
            cooldown: Duration::minutes(self.cooldown_minutes),
            late_night: LateNightWindow {
                start_hour: self.late_night_start,
                end_hour: self.late_night_end,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::DaemonArgs;
    use crate::daemon::processing::policy::PolicyConfig;

    #[test]
    fn test_defaults_match_policy() {
        let args = DaemonArgs::parse_from(["sleepguard-daemon"]);
        assert_eq!(args.policy.policy_config(), PolicyConfig::default());
        assert!(!args.log_console);
    }

    #[test]
    fn test_policy_overrides() {
        let args = DaemonArgs::parse_from([
            "sleepguard-daemon",
            "--cooldown-minutes",
            "5",
            "--late-night-start",
            "22",
        ]);
        let config = args.policy.policy_config();
        assert_eq!(config.cooldown, chrono::Duration::minutes(5));
        assert_eq!(config.late_night.start_hour, 22);
        assert_eq!(config.late_night.end_hour, 5);

        assert!(
            DaemonArgs::try_parse_from(["sleepguard-daemon", "--late-night-end", "24"]).is_err()
        );
    }

    #[test]
    fn test_out_of_range_minutes_are_rejected() {
        for (flag, value) in [
            ("--cooldown-minutes", "9223372036854775807"),
            ("--cooldown-minutes", "-5"),
            ("--cooldown-minutes", "0"),
            ("--activity-window-minutes", "1441"),
            ("--activity-window-minutes", "-30"),
        ] {
            assert!(
                DaemonArgs::try_parse_from(["sleepguard-daemon", flag, value]).is_err(),
                "{flag} {value} should be rejected"
            );
        }

        let args =
            DaemonArgs::parse_from(["sleepguard-daemon", "--activity-window-minutes", "1440"]);
        assert_eq!(
            args.policy.policy_config().activity_window,
            chrono::Duration::days(1)
        );
    }
}
