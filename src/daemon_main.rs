use anyhow::Result;
use clap::Parser;
use sleepguard::{
    daemon::{args::DaemonArgs, start_daemon},
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, LogOptions, DAEMON_PREFIX},
    },
};
use tracing::error;

fn main() -> Result<()> {
    run(DaemonArgs::parse())
}

fn run(args: DaemonArgs) -> Result<()> {
    let app_dir = args.dir.map_or_else(create_application_default_path, Ok)?;
    enable_logging(
        LogOptions::new(DAEMON_PREFIX, app_dir.clone())
            .level(args.log)
            .console(args.log_console),
    )?;
    let config = args.policy.policy_config();

    // Everything runs on one thread, the event loop is the only owner of the state.
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(async move { start_daemon(app_dir, config).await })
        .inspect_err(|e| error!("Daemon failed {e:?}"))
}
