//! SQLite-backed box store: at most one box per `(image_id, category)`.

use std::path::Path;

use log::debug;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;

use crate::error::Result;
use crate::geometry::BoxCoords;

/// Surrogate key of a row in `boxes`.
pub type RecordId = i64;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS boxes (
        id INTEGER PRIMARY KEY,
        image_id TEXT NOT NULL,
        category TEXT NOT NULL,
        x1 INTEGER NOT NULL,
        y1 INTEGER NOT NULL,
        x2 INTEGER NOT NULL,
        y2 INTEGER NOT NULL,
        UNIQUE(image_id, category)
    );
";

const SELECT_COLUMNS: &str = "SELECT id, image_id, category, x1, y1, x2, y2 FROM boxes";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BoxRecord {
    pub id: RecordId,
    pub image_id: String,
    pub category: String,
    #[serde(flatten)]
    pub coords: BoxCoords,
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<BoxRecord> {
    Ok(BoxRecord {
        id: row.get(0)?,
        image_id: row.get(1)?,
        category: row.get(2)?,
        coords: BoxCoords {
            x1: row.get(3)?,
            y1: row.get(4)?,
            x2: row.get(5)?,
            y2: row.get(6)?,
        },
    })
}

/// Every call commits on its own; the store is only used from one thread.
pub struct BoxStore {
    conn: Connection,
}

impl BoxStore {
    pub fn open(path: &Path) -> Result<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Inserts the box, or overwrites the coordinates of the existing box for
    /// the same image and category. Returns the id of the surviving row.
    pub fn upsert(&self, image_id: &str, category: &str, coords: BoxCoords) -> Result<RecordId> {
        let c = coords.normalized();
        self.conn.execute(
            "INSERT INTO boxes (image_id, category, x1, y1, x2, y2)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(image_id, category) DO UPDATE SET
                 x1 = excluded.x1, y1 = excluded.y1, x2 = excluded.x2, y2 = excluded.y2",
            params![image_id, category, c.x1, c.y1, c.x2, c.y2],
        )?;
        let id: RecordId = self.conn.query_row(
            "SELECT id FROM boxes WHERE image_id = ?1 AND category = ?2",
            params![image_id, category],
            |row| row.get(0),
        )?;
        debug!(
            "stored box #{id} for {category}/{image_id}: ({}, {}, {}, {})",
            c.x1, c.y1, c.x2, c.y2
        );
        Ok(id)
    }

    pub fn get(&self, image_id: &str, category: &str) -> Result<Option<BoxCoords>> {
        Ok(self.get_record(image_id, category)?.map(|r| r.coords))
    }

    pub fn get_record(&self, image_id: &str, category: &str) -> Result<Option<BoxRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE image_id = ?1 AND category = ?2"),
                params![image_id, category],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Returns whether a row was removed.
    pub fn delete(&self, id: RecordId) -> Result<bool> {
        let removed = self.conn.execute("DELETE FROM boxes WHERE id = ?1", [id])?;
        debug!("deleted box #{id} ({removed} rows)");
        Ok(removed > 0)
    }

    /// All boxes of `category`, ordered by image id.
    pub fn list(&self, category: &str) -> Result<Vec<BoxRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE category = ?1 ORDER BY image_id, id"
        ))?;
        let rows = stmt.query_map([category], record_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// All boxes, ordered by category then image id.
    pub fn list_all(&self) -> Result<Vec<BoxRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_COLUMNS} ORDER BY category, image_id, id"))?;
        let rows = stmt.query_map([], record_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn is_processed(&self, image_id: &str, category: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM boxes WHERE image_id = ?1 AND category = ?2",
                params![image_id, category],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn count(&self, category: &str) -> Result<usize> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM boxes WHERE category = ?1",
            [category],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(n).unwrap_or(0))
    }
}
