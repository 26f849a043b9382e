//! Durable mapping store: the bridge's dual index between directory DNs and
//! service-provider GUIDs, plus the authoritative local copy of each
//! provisioned user record.
//!
//! Backed by a single SQLite file with three tables whose names are part of
//! the on-disk contract:
//!
//! - `members` — GUID → JSON-encoded user record
//! - `guids`   — GUID → DN
//! - `dns`     — DN → GUID
//!
//! Every mutation touching more than one table runs in a single write
//! transaction, so readers observe either the pre- or post-mutation state,
//! never an interleaving. The handle is cheap to clone and internally
//! synchronized; the debug endpoint reads through [`MappingStore::list`]
//! while the reconciler writes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use bridge_scim::User;

/// Error raised by mapping-store operations.
///
/// A lookup miss is *not* an error; `guid_for_dn`/`dn_for_guid` return
/// `Ok(None)` for unknown keys and reserve `Err` for I/O failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("open mapping store {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("encode user record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("user record for {dn} carries no service-provider id")]
    MissingGuid { dn: String },
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Handle to the mapping store.
#[derive(Clone)]
pub struct MappingStore {
    conn: Arc<Mutex<Connection>>,
}

impl MappingStore {
    /// Open (creating if absent) the store file at `path`.
    ///
    /// The file is restricted to owner read/write. WAL journaling with full
    /// synchronous writes makes `add`/`delete` durable before they return.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        conn.pragma_update(None, "journal_mode", "wal")?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        conn.busy_timeout(Duration::from_secs(5))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(meta) = std::fs::metadata(path) {
                let mut perms = meta.permissions();
                perms.set_mode(0o600);
                let _ = std::fs::set_permissions(path, perms);
            }
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create the three tables if they do not exist yet. Idempotent.
    pub async fn prepare(&self) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS members (
                guid   TEXT PRIMARY KEY,
                record TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS guids (
                guid TEXT PRIMARY KEY,
                dn   TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS dns (
                dn   TEXT PRIMARY KEY,
                guid TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// GUID bound to `dn`, or `None` when the DN is unknown.
    pub async fn guid_for_dn(&self, dn: &str) -> StoreResult<Option<String>> {
        let conn = self.conn.lock().await;
        let guid = conn
            .query_row("SELECT guid FROM dns WHERE dn = ?1", params![dn], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(guid)
    }

    /// DN bound to `guid`, or `None` when the GUID is unknown.
    pub async fn dn_for_guid(&self, guid: &str) -> StoreResult<Option<String>> {
        let conn = self.conn.lock().await;
        let dn = conn
            .query_row("SELECT dn FROM guids WHERE guid = ?1", params![guid], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(dn)
    }

    /// Bind `dn` to the user's GUID and persist the record, atomically.
    ///
    /// `user.id` must carry the GUID the service provider assigned. Stale
    /// rows left behind by a previous binding of either key are removed in
    /// the same transaction, so a DN maps to at most one GUID and vice
    /// versa at every commit point.
    pub async fn add(&self, dn: &str, user: &User) -> StoreResult<()> {
        if user.id.is_empty() {
            return Err(StoreError::MissingGuid { dn: dn.to_string() });
        }
        let record = serde_json::to_string(user)?;
        let guid = user.id.as_str();

        let mut conn = self.conn.lock().await;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let old_guid: Option<String> = tx
            .query_row("SELECT guid FROM dns WHERE dn = ?1", params![dn], |row| {
                row.get(0)
            })
            .optional()?;
        if let Some(old) = old_guid.filter(|old| old != guid) {
            tx.execute("DELETE FROM members WHERE guid = ?1", params![old])?;
            tx.execute("DELETE FROM guids WHERE guid = ?1", params![old])?;
        }

        let old_dn: Option<String> = tx
            .query_row("SELECT dn FROM guids WHERE guid = ?1", params![guid], |row| {
                row.get(0)
            })
            .optional()?;
        if let Some(old) = old_dn.filter(|old| old != dn) {
            tx.execute("DELETE FROM dns WHERE dn = ?1", params![old])?;
        }

        tx.execute(
            "INSERT OR REPLACE INTO members (guid, record) VALUES (?1, ?2)",
            params![guid, record],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO guids (guid, dn) VALUES (?1, ?2)",
            params![guid, dn],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO dns (dn, guid) VALUES (?1, ?2)",
            params![dn, guid],
        )?;

        tx.commit()?;
        debug!(dn, guid, "mapping recorded");
        Ok(())
    }

    /// Remove the binding and the user record, atomically.
    pub async fn delete(&self, dn: &str, guid: &str) -> StoreResult<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute("DELETE FROM members WHERE guid = ?1", params![guid])?;
        tx.execute("DELETE FROM guids WHERE guid = ?1", params![guid])?;
        tx.execute("DELETE FROM dns WHERE dn = ?1", params![dn])?;

        tx.commit()?;
        debug!(dn, guid, "mapping removed");
        Ok(())
    }

    /// Snapshot of all persisted user records, ordered by GUID.
    pub async fn list(&self) -> StoreResult<Vec<User>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT record FROM members ORDER BY guid")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut users = Vec::new();
        for record in rows {
            users.push(serde_json::from_str(&record?)?);
        }
        Ok(users)
    }
}
