use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Local, TimeZone, Utc};
use clap::Args;

use crate::{
    daemon::{
        processing::classifier::{
            filter_log, recent_stats, stats_for_today_in, ActivityFilter, LateNightWindow,
        },
        storage::{
            entities::ActivityRecord,
            persistence::{
                load_value, JsonFileStorage, ACTIVITY_LOG_KEY, LAST_BEDTIME_KEY, LAST_REMINDER_KEY,
                SETTINGS_KEY,
            },
            settings::{Settings, SettingsStore},
        },
    },
    utils::percentage::count_percentage,
};

/// Everything the daemon persisted, read once. The daemon may keep writing while this is shown.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub log: Vec<ActivityRecord>,
    pub settings: Settings,
    pub last_reminder_at: Option<DateTime<Utc>>,
    pub last_bedtime: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub async fn read(dir: &Path) -> Result<Self> {
        let storage = JsonFileStorage::new(dir.to_path_buf())?;
        Ok(Self {
            log: load_value(&storage, ACTIVITY_LOG_KEY).await?.unwrap_or_default(),
            settings: load_value(&storage, SETTINGS_KEY).await?.unwrap_or_default(),
            last_reminder_at: load_value::<i64>(&storage, LAST_REMINDER_KEY)
                .await?
                .and_then(DateTime::from_timestamp_millis),
            last_bedtime: load_value::<i64>(&storage, LAST_BEDTIME_KEY)
                .await?
                .and_then(DateTime::from_timestamp_millis),
        })
    }
}

#[derive(Debug, Args)]
pub struct ActivityCommand {
    #[arg(
        short,
        long,
        default_value = "all",
        help = "Either \"all\", \"late-night\" or a record type such as \"mouse\" or \"tab_switch\""
    )]
    filter: ActivityFilter,
    #[arg(short = 'n', long, default_value_t = 20, help = "Show only the newest records")]
    limit: usize,
}

pub async fn process_stats_command(dir: &Path) -> Result<()> {
    let snapshot = Snapshot::read(dir).await?;
    for line in stats_lines(&snapshot, &Local::now(), &LateNightWindow::default()) {
        println!("{line}");
    }
    Ok(())
}

pub async fn process_activity_command(dir: &Path, command: ActivityCommand) -> Result<()> {
    let snapshot = Snapshot::read(dir).await?;
    let lines = activity_lines(
        &snapshot.log,
        command.filter,
        command.limit,
        &LateNightWindow::default(),
        &Local,
    );
    if lines.is_empty() {
        println!("No activity recorded");
    }
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

pub async fn process_settings_command(dir: &Path, reset: bool) -> Result<()> {
    let settings = if reset {
        reset_settings(dir).await?
    } else {
        Snapshot::read(dir).await?.settings
    };
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

/// Writes the default settings back. A running daemon keeps its own copy until restarted.
async fn reset_settings(dir: &Path) -> Result<Settings> {
    let mut store = SettingsStore::new(JsonFileStorage::new(dir.to_path_buf())?);
    Ok(store.reset().await.clone())
}

fn stats_lines<Tz: TimeZone>(
    snapshot: &Snapshot,
    now: &DateTime<Tz>,
    window: &LateNightWindow,
) -> Vec<String>
where
    Tz::Offset: std::fmt::Display,
{
    let today = stats_for_today_in(&snapshot.log, now, window);
    let recent = recent_stats(&snapshot.log, now, window);
    let tz = now.timezone();
    let moment = |v: Option<DateTime<Utc>>| {
        v.map(|v| v.with_timezone(&tz).format("%x %H:%M").to_string())
            .unwrap_or_else(|| "never".into())
    };

    let mut lines = vec![format!("Today\t{}", today.total)];
    for (name, count) in [
        ("mouse", today.mouse),
        ("keyboard", today.keyboard),
        ("tab", today.tab),
        ("late night", today.late_night),
    ] {
        lines.push(format!(
            "  {name}\t{count}\t{}",
            count_percentage(count, today.total)
        ));
    }
    lines.push(format!("Last minute\t{}", recent.last_minute));
    lines.push(format!("Last hour\t{}", recent.last_hour));
    lines.push(format!("Late night overall\t{}", recent.late_night));
    lines.push(format!("Last reminder\t{}", moment(snapshot.last_reminder_at)));
    lines.push(format!("Last bedtime\t{}", moment(snapshot.last_bedtime)));
    lines
}

fn activity_lines<Tz: TimeZone>(
    log: &[ActivityRecord],
    filter: ActivityFilter,
    limit: usize,
    window: &LateNightWindow,
    tz: &Tz,
) -> Vec<String>
where
    Tz::Offset: std::fmt::Display,
{
    let matching = filter_log(log, filter, window, tz);
    let skip = matching.len().saturating_sub(limit);
    matching
        .into_iter()
        .skip(skip)
        .map(|record| {
            let time = record.timestamp.with_timezone(tz);
            let details = if record.metadata.is_empty() {
                String::new()
            } else {
                serde_json::Value::Object(record.metadata.clone()).to_string()
            };
            format!("{}\t{}\t{}", time.format("%x %H:%M:%S"), record.kind, details)
                .trim_end()
                .to_string()
        })
        .collect()
}
