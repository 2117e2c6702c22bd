use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use chrono::{Local, TimeZone};
use collection::feed::InboundFeed;
use events::{InboundEvent, Outbound};
use notification::ChannelNotifier;
use processing::{guard::SleepGuard, policy::PolicyConfig, ProcessingModule};
use scheduling::alarms::TokioAlarms;
use storage::persistence::JsonFileStorage;
use tokio::{
    io::{AsyncBufRead, AsyncWrite, BufReader},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use writer::OutboundWriter;

use crate::utils::clock::{Clock, DefaultClock};

pub mod args;
pub mod collection;
pub mod error;
pub mod events;
pub mod notification;
pub mod processing;
pub mod scheduling;
pub mod shutdown;
pub mod storage;
pub mod writer;

#[cfg(test)]
pub mod test_support;

const EVENT_BUFFER: usize = 64;

/// Represents the starting point for the daemon. The host talks to it over stdin and stdout.
pub async fn start_daemon(dir: PathBuf, config: PolicyConfig) -> Result<()> {
    run_daemon(
        dir,
        config,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        Arc::new(DefaultClock),
        Local,
    )
    .await
}

/// Runs the daemon until the inbound feed ends or a signal arrives. State is kept in
/// `dir/storage.json`.
pub async fn run_daemon<Tz: TimeZone>(
    dir: PathBuf,
    config: PolicyConfig,
    reader: impl AsyncBufRead + Unpin,
    writer: impl AsyncWrite + Unpin,
    clock: Arc<dyn Clock>,
    timezone: Tz,
) -> Result<()> {
    let storage = Arc::new(JsonFileStorage::new(dir)?);
    let shutdown_token = CancellationToken::new();

    let (event_sender, event_receiver) = mpsc::channel::<InboundEvent>(EVENT_BUFFER);
    let (outbound_sender, outbound_receiver) = mpsc::unbounded_channel::<Outbound>();

    let alarms = TokioAlarms::new(event_sender.clone(), clock.clone(), shutdown_token.clone());
    let guard = SleepGuard::load(
        storage,
        alarms,
        ChannelNotifier::new(outbound_sender.clone()),
        clock,
        timezone,
        config,
    )
    .await;
    info!("Daemon started with {} stored activities", guard.activity().len());

    let feed = InboundFeed::new(reader, event_sender, outbound_sender, shutdown_token.clone());
    let processor = ProcessingModule::new(event_receiver, guard, shutdown_token.clone());
    let writer = OutboundWriter::new(writer, outbound_receiver);

    let (_, feed_result, processing_result, writer_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token),
        feed.run(),
        processor.run(),
        writer.run(),
    );

    if let Err(feed_result) = feed_result {
        error!("Inbound feed got an error {:?}", feed_result);
    }

    if let Err(processing_result) = processing_result {
        error!("Processing module got an error {:?}", processing_result);
    }

    if let Err(writer_result) = writer_result {
        error!("Outbound writer got an error {:?}", writer_result);
    }

    info!("Daemon stopped");
    Ok(())
}
