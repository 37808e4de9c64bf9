//! SQLite-backed sheet store.

use async_trait::async_trait;
use fs2::FileExt;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use super::{check_address, CellValue, StoreError, TabularStore};

#[derive(Clone)]
pub struct SqliteSheetStore {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSheetStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(&path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;\
             PRAGMA synchronous=NORMAL;\
             CREATE TABLE IF NOT EXISTS sheets (\
               name TEXT PRIMARY KEY,\
               created_at INTEGER NOT NULL\
             );\
             CREATE TABLE IF NOT EXISTS cells (\
               sheet TEXT NOT NULL REFERENCES sheets(name),\
               row INTEGER NOT NULL,\
               col INTEGER NOT NULL,\
               kind TEXT NOT NULL,\
               value TEXT NOT NULL,\
               updated_at INTEGER NOT NULL,\
               PRIMARY KEY (sheet, col, row)\
             );",
        )?;

        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("FOUR_KEYS_DB_PATH") {
            return PathBuf::from(path);
        }
        PathBuf::from(".four_keys.sqlite")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Exclusive advisory lock held for the duration of a run.
    pub fn lock_exclusive(&self) -> Result<StoreLock, StoreError> {
        StoreLock::new(&self.path)
    }

    fn with_conn<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&Connection) -> Result<R, StoreError>,
    {
        let guard = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&guard)
    }

    async fn blocking<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&Connection) -> Result<R, StoreError> + Send + 'static,
        R: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.with_conn(f))
            .await
            .map_err(|e| StoreError::Join(e.to_string()))?
    }
}

fn require_sheet(conn: &Connection, sheet: &str) -> Result<(), StoreError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sheets WHERE name = ?1",
            params![sheet],
            |row| row.get(0),
        )
        .optional()?;
    match found {
        Some(_) => Ok(()),
        None => Err(StoreError::SheetNotFound(sheet.to_string())),
    }
}

fn encode(value: &CellValue) -> Option<(&'static str, String)> {
    match value {
        CellValue::Empty => None,
        CellValue::Text(s) => Some(("text", s.clone())),
        CellValue::Number(n) => Some(("number", n.to_string())),
        CellValue::Bool(b) => Some(("bool", b.to_string())),
        CellValue::Formula(s) => Some(("formula", s.clone())),
    }
}

fn decode(kind: &str, value: String) -> Result<CellValue, StoreError> {
    match kind {
        "text" => Ok(CellValue::Text(value)),
        "formula" => Ok(CellValue::Formula(value)),
        "number" => value
            .parse()
            .map(CellValue::Number)
            .map_err(|_| StoreError::InvalidData(format!("bad number cell: {value}"))),
        "bool" => match value.as_str() {
            "true" => Ok(CellValue::Bool(true)),
            "false" => Ok(CellValue::Bool(false)),
            _ => Err(StoreError::InvalidData(format!("bad bool cell: {value}"))),
        },
        other => Err(StoreError::InvalidData(format!("unknown cell kind: {other}"))),
    }
}

fn write_cell(
    conn: &Connection,
    sheet: &str,
    row: u32,
    column: u32,
    value: &CellValue,
    now: i64,
) -> Result<(), StoreError> {
    match encode(value) {
        None => {
            conn.execute(
                "DELETE FROM cells WHERE sheet = ?1 AND row = ?2 AND col = ?3",
                params![sheet, row, column],
            )?;
        }
        Some((kind, text)) => {
            conn.execute(
                "INSERT INTO cells (sheet, row, col, kind, value, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                 ON CONFLICT(sheet, col, row) DO UPDATE SET \
                    kind = excluded.kind, \
                    value = excluded.value, \
                    updated_at = excluded.updated_at",
                params![sheet, row, column, kind, text, now],
            )?;
        }
    }
    Ok(())
}

#[async_trait]
impl TabularStore for SqliteSheetStore {
    async fn has_sheet(&self, sheet: &str) -> Result<bool, StoreError> {
        let sheet = sheet.to_string();
        self.blocking(move |conn| match require_sheet(conn, &sheet) {
            Ok(()) => Ok(true),
            Err(StoreError::SheetNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        })
        .await
    }

    async fn create_sheet(&self, sheet: &str) -> Result<(), StoreError> {
        let sheet = sheet.to_string();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO sheets (name, created_at) VALUES (?1, ?2)",
                params![sheet, now_epoch()],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_cell(&self, sheet: &str, row: u32, column: u32) -> Result<CellValue, StoreError> {
        check_address(row, column)?;
        let sheet = sheet.to_string();
        self.blocking(move |conn| {
            require_sheet(conn, &sheet)?;
            let found: Option<(String, String)> = conn
                .query_row(
                    "SELECT kind, value FROM cells WHERE sheet = ?1 AND row = ?2 AND col = ?3",
                    params![sheet, row, column],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )
                .optional()?;
            match found {
                Some((kind, value)) => decode(&kind, value),
                None => Ok(CellValue::Empty),
            }
        })
        .await
    }

    async fn get_column(
        &self,
        sheet: &str,
        column: u32,
        from_row: u32,
    ) -> Result<Vec<CellValue>, StoreError> {
        check_address(from_row, column)?;
        let sheet = sheet.to_string();
        self.blocking(move |conn| {
            require_sheet(conn, &sheet)?;
            let mut stmt = conn.prepare(
                "SELECT row, kind, value FROM cells \
                 WHERE sheet = ?1 AND col = ?2 AND row >= ?3 \
                 ORDER BY row",
            )?;
            let mut rows = stmt.query(params![sheet, column, from_row])?;
            let mut values = Vec::new();
            while let Some(r) = rows.next()? {
                let row: u32 = r.get(0)?;
                let kind: String = r.get(1)?;
                let value: String = r.get(2)?;
                let offset = (row - from_row) as usize;
                if values.len() < offset {
                    values.resize(offset, CellValue::Empty);
                }
                values.push(decode(&kind, value)?);
            }
            Ok(values)
        })
        .await
    }

    async fn set_cell(
        &self,
        sheet: &str,
        row: u32,
        column: u32,
        value: CellValue,
    ) -> Result<(), StoreError> {
        check_address(row, column)?;
        let sheet = sheet.to_string();
        let value = value.normalized();
        self.blocking(move |conn| {
            require_sheet(conn, &sheet)?;
            write_cell(conn, &sheet, row, column, &value, now_epoch())
        })
        .await
    }

    async fn set_range(
        &self,
        sheet: &str,
        row: u32,
        column: u32,
        values: Vec<Vec<CellValue>>,
    ) -> Result<(), StoreError> {
        check_address(row, column)?;
        let sheet = sheet.to_string();
        self.blocking(move |conn| {
            require_sheet(conn, &sheet)?;
            let tx = conn.unchecked_transaction()?;
            let now = now_epoch();
            for (dr, cells) in values.into_iter().enumerate() {
                for (dc, value) in cells.into_iter().enumerate() {
                    write_cell(
                        &tx,
                        &sheet,
                        row + dr as u32,
                        column + dc as u32,
                        &value.normalized(),
                        now,
                    )?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }
}

/// Advisory lock on `<db>.lock`, released on drop.
#[derive(Debug)]
pub struct StoreLock {
    _file: std::fs::File,
}

impl StoreLock {
    fn new(db_path: &Path) -> Result<Self, StoreError> {
        let mut lock_path = db_path.to_path_buf();
        lock_path.set_extension("lock");
        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(lock_path)?;
        file.lock_exclusive()?;
        Ok(Self { _file: file })
    }
}

fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
