use crate::schema::CATALOG_SCHEMA;
use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

pub struct Db {
    pub conn: Connection,
}

/// One connection shared by concurrent workers. Lock, run the statement,
/// release; never hold the guard across an await point.
pub type SharedDb = Arc<Mutex<Db>>;

impl Db {
    pub fn open_or_create(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening catalog database");
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        apply_pragmas(&conn)?;
        ensure_schema(&conn)?;
        Ok(Db { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_pragmas(&conn)?;
        ensure_schema(&conn)?;
        Ok(Db { conn })
    }

    /// Open an existing catalog for queries. A missing file is an error and
    /// nothing is created or altered on disk.
    pub fn open_read_only(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening catalog database read-only");
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("opening catalog {}", path.display()))?;
        apply_pragmas(&conn)?;
        Ok(Db { conn })
    }

    pub fn into_shared(self) -> SharedDb {
        Arc::new(Mutex::new(self))
    }
}

/// Connection settings shared by file, in-memory and read-only handles.
fn apply_pragmas(conn: &Connection) -> Result<()> {
    // products.vendor_id and vulnerabilities.product_id may hold the 0 sentinel
    conn.pragma_update(None, "foreign_keys", "OFF")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(())
}

/// Create any missing table or index. Existing rows are never altered.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(CATALOG_SCHEMA)?;
    Ok(())
}
