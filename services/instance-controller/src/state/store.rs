//! SQLite-based identity store.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use tracing::debug;

use crate::identity::{IdentityStore, InstanceIdentity};

/// Errors from state store operations.
#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("State store lock poisoned")]
    Poisoned,
}

/// Identity row as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    pub instance_name: String,
    pub identity: InstanceIdentity,
    /// Updated timestamp (Unix seconds).
    pub updated_at: i64,
}

/// SQLite state store.
pub struct StateStore {
    conn: Connection,
}

impl StateStore {
    /// Open or create a state store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StateStoreError> {
        let conn = Connection::open(path)?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL;")?;

        let store = Self { conn };
        store.init_schema()?;

        Ok(store)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, StateStoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StateStoreError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS instance_identities (
                instance_name TEXT PRIMARY KEY,
                vmid INTEGER,
                node TEXT NOT NULL DEFAULT '',
                storage TEXT NOT NULL DEFAULT '',
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;

        debug!("State store schema initialized");
        Ok(())
    }

    /// Get the identity record of an instance.
    pub fn get_identity(&self, instance_name: &str) -> Result<Option<IdentityRecord>, StateStoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT instance_name, vmid, node, storage, updated_at
             FROM instance_identities WHERE instance_name = ?1",
        )?;

        stmt.query_row(params![instance_name], |row| {
            Ok(IdentityRecord {
                instance_name: row.get(0)?,
                identity: InstanceIdentity {
                    vmid: row.get(1)?,
                    node: row.get(2)?,
                    storage: row.get(3)?,
                },
                updated_at: row.get(4)?,
            })
        })
        .optional()
        .map_err(Into::into)
    }

    /// Insert or update the identity of an instance.
    pub fn upsert_identity(
        &self,
        instance_name: &str,
        identity: &InstanceIdentity,
    ) -> Result<(), StateStoreError> {
        let now = chrono::Utc::now().timestamp();
        self.conn.execute(
            r#"
            INSERT INTO instance_identities (instance_name, vmid, node, storage, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(instance_name) DO UPDATE SET
                vmid = excluded.vmid,
                node = excluded.node,
                storage = excluded.storage,
                updated_at = excluded.updated_at
            "#,
            params![
                instance_name,
                identity.vmid,
                identity.node,
                identity.storage,
                now,
            ],
        )?;
        Ok(())
    }

    /// Count stored identities that carry a VM ID.
    pub fn count_provisioned(&self) -> Result<i64, StateStoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM instance_identities WHERE vmid IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

/// [`IdentityStore`] backed by a [`StateStore`].
pub struct SqliteIdentityStore {
    store: Mutex<StateStore>,
}

impl SqliteIdentityStore {
    pub fn new(store: StateStore) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    fn with_store<T>(
        &self,
        f: impl FnOnce(&StateStore) -> Result<T, StateStoreError>,
    ) -> Result<T, StateStoreError> {
        let store = self.store.lock().map_err(|_| StateStoreError::Poisoned)?;
        f(&store)
    }
}

#[async_trait]
impl IdentityStore for SqliteIdentityStore {
    async fn load(&self, instance: &str) -> anyhow::Result<InstanceIdentity> {
        let record = self.with_store(|s| s.get_identity(instance))?;
        Ok(record.map(|r| r.identity).unwrap_or_default())
    }

    async fn persist(&self, instance: &str, identity: &InstanceIdentity) -> anyhow::Result<()> {
        self.with_store(|s| s.upsert_identity(instance, identity))?;
        debug!(
            instance = %instance,
            vmid = ?identity.vmid,
            node = %identity.node,
            storage = %identity.storage,
            "Persisted instance identity"
        );
        Ok(())
    }
}
