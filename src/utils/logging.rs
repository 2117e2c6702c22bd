use std::{path::PathBuf, sync::LazyLock};

use anyhow::Result;
use tracing::level_filters::LevelFilter;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::{
    fmt::{format::FmtSpan, writer::MakeWriterExt},
    EnvFilter,
};

pub const CLI_PREFIX: &str = "cli";
pub const DAEMON_PREFIX: &str = "daemon";

const KEPT_LOG_FILES: usize = 5;

/// Where and how much to log. Files always get written; the console copy is optional.
#[derive(Debug, Clone)]
pub struct LogOptions {
    pub prefix: &'static str,
    pub dir: PathBuf,
    /// Overrides `RUST_LOG` when set.
    pub level: Option<LevelFilter>,
    /// Mirrors logs to stderr. Stdout is never used, the daemon speaks its protocol there.
    pub console: bool,
}

impl LogOptions {
    pub fn new(prefix: &'static str, app_dir: PathBuf) -> Self {
        Self {
            prefix,
            dir: app_dir.join("logs"),
            level: None,
            console: false,
        }
    }

    pub fn level(mut self, level: Option<LevelFilter>) -> Self {
        self.level = level;
        self
    }

    pub fn console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }

    fn filter(&self) -> EnvFilter {
        let crate_name = env!("CARGO_PKG_NAME").replace('-', "_");
        let level = self
            .level
            .map(|v| v.to_string())
            .unwrap_or_else(|| std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()));
        EnvFilter::try_new(format!("{crate_name}={level}"))
            .unwrap_or_else(|_| EnvFilter::new(format!("{crate_name}=info")))
    }
}

/// Installs the global subscriber with a daily rolling file in [LogOptions::dir].
pub fn enable_logging(options: LogOptions) -> Result<()> {
    let appender = tracing_appender::rolling::Builder::new()
        .rotation(Rotation::DAILY)
        .max_log_files(KEPT_LOG_FILES)
        .filename_prefix(options.prefix)
        .build(&options.dir)?;

    let show_console = options.console;
    let console = std::io::stderr.with_filter(move |_| show_console);

    tracing_subscriber::fmt()
        .with_env_filter(options.filter())
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(console.and(appender))
        .with_ansi(false)
        .init();
    Ok(())
}

pub static TEST_LOGGING: LazyLock<()> = LazyLock::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_test_writer()
        .pretty()
        .try_init();
});
