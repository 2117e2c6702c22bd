use anyhow::Result;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::mpsc,
};
use tracing::{debug, error};

use super::events::Outbound;

/// Writes responses and notifications to the host, one JSON object per line. Finishes once
/// every sender is gone.
pub struct OutboundWriter<W> {
    writer: W,
    receiver: mpsc::UnboundedReceiver<Outbound>,
}

impl<W: AsyncWrite + Unpin> OutboundWriter<W> {
    pub fn new(writer: W, receiver: mpsc::UnboundedReceiver<Outbound>) -> Self {
        Self { writer, receiver }
    }

    pub async fn run(mut self) -> Result<()> {
        while let Some(item) = self.receiver.recv().await {
            debug!("Writing {:?}", item);
            let mut buffer = serde_json::to_vec(&item)?;
            buffer.push(b'\n');
            self.writer
                .write_all(&buffer)
                .await
                .inspect_err(|e| error!("Failed to write to the host {e:?}"))?;
            self.writer.flush().await?;
        }
        Ok(())
    }
}
