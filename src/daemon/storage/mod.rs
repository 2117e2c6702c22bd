//!  Storage is organized around a [persistence::KeyValueStorage].
//!  The basic idea is:
//!   - Every piece of state lives under a stable key of a single JSON object.
//!   - Values are written whole; the in-memory owner is always the source of truth.
//!   - Reads of persisted data only matter at startup.

pub mod activity_store;
pub mod entities;
pub mod memory;
pub mod persistence;
pub mod settings;
