use anyhow::{anyhow, Result};
use futures::StreamExt;
use tokio::{
    io::AsyncBufRead,
    sync::{mpsc, oneshot},
};
use tokio_stream::wrappers::LinesStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::daemon::events::{FeedLine, InboundEvent, Message, Outbound};

/// Reads newline-delimited JSON events from the host and forwards them to the event loop.
/// Message answers are written back in the order the messages arrived.
pub struct InboundFeed<R> {
    lines: LinesStream<R>,
    events: mpsc::Sender<InboundEvent>,
    outbound: mpsc::UnboundedSender<Outbound>,
    shutdown: CancellationToken,
}

impl<R: AsyncBufRead + Unpin> InboundFeed<R> {
    pub fn new(
        reader: R,
        events: mpsc::Sender<InboundEvent>,
        outbound: mpsc::UnboundedSender<Outbound>,
        shutdown: CancellationToken,
    ) -> Self {
        use tokio::io::AsyncBufReadExt;

        Self {
            lines: LinesStream::new(reader.lines()),
            events,
            outbound,
            shutdown,
        }
    }

    /// Executes the feed loop. The host closing its end of the feed shuts the daemon down.
    pub async fn run(mut self) -> Result<()> {
        loop {
            let line = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                line = self.lines.next() => line,
            };

            match line {
                Some(Ok(line)) => self.forward(&line).await?,
                Some(Err(e)) => {
                    error!("Failed to read inbound feed {e:?}");
                    self.shutdown.cancel();
                    return Err(e.into());
                }
                None => {
                    info!("Inbound feed closed");
                    self.shutdown.cancel();
                    return Ok(());
                }
            }
        }
    }

    async fn forward(&mut self, line: &str) -> Result<()> {
        if line.trim().is_empty() {
            return Ok(());
        }
        let parsed = match serde_json::from_str::<FeedLine>(line) {
            Ok(v) => v,
            Err(e) => {
                warn!("Skipping illegal feed line {line:?}: {e}");
                return Ok(());
            }
        };
        debug!("Received {:?}", parsed);

        match parsed {
            FeedLine::Activity(raw) => self.send(InboundEvent::Activity(raw)).await,
            FeedLine::Idle { state, timestamp } => {
                self.send(InboundEvent::IdleState { state, timestamp }).await
            }
            FeedLine::Message { message } => {
                let (reply, response) = oneshot::channel();
                self.send(InboundEvent::Message {
                    message: Message::parse(message),
                    reply,
                })
                .await?;

                match response.await {
                    Ok(response) => {
                        if self.outbound.send(Outbound::Response(response)).is_err() {
                            warn!("Response dropped, outbound channel is closed");
                        }
                    }
                    Err(_) => warn!("Message was dropped without a response"),
                }
                Ok(())
            }
        }
    }

    async fn send(&self, event: InboundEvent) -> Result<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| anyhow!("Event loop stopped accepting events"))
            .inspect_err(|e| error!("Unexpected error during sending {e:?}"))
    }
}
