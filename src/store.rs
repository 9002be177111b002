//! Persistence for `messages`.
//!
//! The server only talks to the [`MessageStore`] trait. [`SqliteStore`] is the
//! production backend; every statement is parameterized and commits on its
//! own, so no transaction spans more than one call.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::error::StoreError;

/// A persisted message record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: i64,
    pub text: String,
}

pub trait MessageStore: Send {
    fn list_all(&self) -> Result<Vec<Message>, StoreError>;
    fn insert(&self, text: &str) -> Result<(), StoreError>;
    /// Ids of every record whose text equals `text`, ascending.
    fn find_ids_by_text(&self, text: &str) -> Result<Vec<i64>, StoreError>;
    fn update_text(&self, id: i64, text: &str) -> Result<(), StoreError>;
    fn exists(&self, id: i64) -> Result<bool, StoreError>;
    fn delete(&self, id: i64) -> Result<(), StoreError>;
}

/// Store handle shared by every connection task. The mutex serializes access
/// so a caller can run several store calls as one unit.
pub type SharedStore = Arc<Mutex<dyn MessageStore>>;

pub fn shared<S: MessageStore + 'static>(store: S) -> SharedStore {
    Arc::new(Mutex::new(store))
}

// AUTOINCREMENT keeps ids from being handed out again after the highest row is deleted.
const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS messages (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    text TEXT NOT NULL
)";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(SCHEMA, [])?;
        Ok(Self { conn })
    }
}

impl MessageStore for SqliteStore {
    fn list_all(&self) -> Result<Vec<Message>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT id, text FROM messages ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Message {
                id: row.get(0)?,
                text: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn insert(&self, text: &str) -> Result<(), StoreError> {
        self.conn
            .execute("INSERT INTO messages (text) VALUES (?1)", params![text])?;
        Ok(())
    }

    fn find_ids_by_text(&self, text: &str) -> Result<Vec<i64>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM messages WHERE text = ?1 ORDER BY id")?;
        let ids = stmt.query_map(params![text], |row| row.get(0))?;
        Ok(ids.collect::<Result<Vec<i64>, _>>()?)
    }

    fn update_text(&self, id: i64, text: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE messages SET text = ?1 WHERE id = ?2",
            params![text, id],
        )?;
        Ok(())
    }

    fn exists(&self, id: i64) -> Result<bool, StoreError> {
        let found = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM messages WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM messages WHERE id = ?1", params![id])?;
        Ok(())
    }
}
