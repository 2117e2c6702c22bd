use std::future::Future;

use anyhow::Result;

use crate::daemon::events::InboundEvent;

/// Represents an event processor: the single owner of the state inbound events act upon.
pub trait EventProcessor {
    fn process_next(&mut self, event: InboundEvent) -> impl Future<Output = Result<()>>;

    /// Called once after the last event, to flush whatever is still only in memory.
    fn finalize(&mut self) -> impl Future<Output = Result<()>>;
}
