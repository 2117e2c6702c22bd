//! Inbound side of the daemon: turns lines from the host into
//! [InboundEvent](super::events::InboundEvent)s.

pub mod feed;
pub mod idle;
