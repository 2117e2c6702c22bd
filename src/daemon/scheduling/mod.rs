//! Named one-shot alarms. [reminder::ReminderScheduler] owns the alarm bookkeeping,
//! [alarms::AlarmService] the actual timers.

pub mod alarms;
pub mod reminder;
