//! Late-night activity tracker and sleep reminder.
//!
//! A host feeds activity events to the daemon, which keeps a bounded activity log, decides when
//! the user has been busy too late for too long and manages the bedtime and snooze alarms. The
//! cli inspects what the daemon stored.

pub mod cli;
pub mod daemon;
pub mod fs;
pub mod utils;
