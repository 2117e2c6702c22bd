use anyhow::Result;
use module::EventProcessor;
use tokio::sync::mpsc::Receiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::events::InboundEvent;

pub mod classifier;
pub mod guard;
pub mod module;
pub mod policy;

/// Represents the event loop. This module is responsible for handing inbound events to the
/// processor one at a time, in arrival order.
pub struct ProcessingModule<Processor> {
    receiver: Receiver<InboundEvent>,
    processor: Processor,
    shutdown: CancellationToken,
}

impl<P: EventProcessor> ProcessingModule<P> {
    pub fn new(
        receiver: Receiver<InboundEvent>,
        processor: P,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            receiver,
            processor,
            shutdown,
        }
    }

    /// Runs until shutdown is requested or every sender is gone. Events already queued at
    /// shutdown are still processed before the processor is finalized.
    pub async fn run(mut self) -> Result<()> {
        loop {
            let event = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                event = self.receiver.recv() => event,
            };
            match event {
                Some(event) => self.process(event).await,
                None => break,
            }
        }

        self.receiver.close();
        while let Some(event) = self.receiver.recv().await {
            self.process(event).await;
        }

        info!("Event loop stopped, finalizing");
        self.processor.finalize().await
    }

    async fn process(&mut self, event: InboundEvent) {
        debug!("Processing event {:?}", event);
        if let Err(e) = self.processor.process_next(event).await {
            error!("Error processing event {e:?}");
        }
    }
}
