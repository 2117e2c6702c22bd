pub mod inspect;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use inspect::{
    process_activity_command, process_settings_command, process_stats_command, ActivityCommand,
};
use tracing::level_filters::LevelFilter;

use crate::{
    daemon::{args::PolicyArgs, start_daemon},
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, LogOptions, CLI_PREFIX, DAEMON_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "SleepGuard", version, long_about = None)]
#[command(about = "Tracks late-night activity and reminds you to go to bed", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default uses $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Run the daemon in current console, reading events from stdin")]
    Serve {
        #[command(flatten)]
        policy: PolicyArgs,
    },
    #[command(about = "Show today's activity statistics")]
    Stats {},
    #[command(about = "List recorded activity")]
    Activity {
        #[command(flatten)]
        command: ActivityCommand,
    },
    #[command(about = "Show current settings")]
    Settings {
        #[arg(
            long,
            help = "Restore the default settings. A running daemon picks them up after a restart"
        )]
        reset: bool,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();
    let dir = args.dir.map_or_else(create_application_default_path, Ok)?;

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    let prefix = match args.commands {
        Commands::Serve { .. } => DAEMON_PREFIX,
        _ => CLI_PREFIX,
    };
    enable_logging(
        LogOptions::new(prefix, dir.clone())
            .level(logging_level)
            .console(args.log),
    )?;

    match args.commands {
        Commands::Serve { policy } => start_daemon(dir, policy.policy_config()).await,
        Commands::Stats {} => process_stats_command(&dir).await,
        Commands::Activity { command } => process_activity_command(&dir, command).await,
        Commands::Settings { reset } => process_settings_command(&dir, reset).await,
    }
}
