//! Local state persistence.
//!
//! Identity records are kept in SQLite so a restarted controller recognizes
//! the VMs it already created.

mod store;

pub use store::{IdentityRecord, SqliteIdentityStore, StateStore, StateStoreError};
