//! Tabular store: sheets of cells addressed by 1-based (row, column).
//!
//! The store keeps formulas as opaque strings; nothing here evaluates them.

pub mod memory;
pub mod sheet;
pub mod sqlite;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use memory::MemorySheetStore;
pub use sheet::{column_name, Sheet};
pub use sqlite::{SqliteSheetStore, StoreLock};

// =============================================================================
// CELL VALUE
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Expression text including the leading `=`.
    Formula(String),
}

impl CellValue {
    /// An empty text cell is the same as no cell.
    pub fn normalized(self) -> Self {
        match self {
            Self::Text(s) if s.is_empty() => Self::Empty,
            other => other,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view; numeric text is accepted since users type into sheets.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Boolean view; `TRUE`/`FALSE` text is accepted case-insensitively.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Text(s) if s.trim().eq_ignore_ascii_case("true") => Some(true),
            Self::Text(s) if s.trim().eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Text(s) | Self::Formula(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(true) => f.write_str("TRUE"),
            Self::Bool(false) => f.write_str("FALSE"),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Empty)
    }
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sheet not found: {0}")]
    SheetNotFound(String),
    #[error("invalid cell address: row {row}, column {column}")]
    InvalidAddress { row: u32, column: u32 },
    #[error("invalid cell data: {0}")]
    InvalidData(String),
    #[error("serialization error: {0}")]
    Serde(String),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("task join error: {0}")]
    Join(String),
}

// =============================================================================
// TRAIT
// =============================================================================

#[async_trait]
pub trait TabularStore: Send + Sync {
    async fn has_sheet(&self, sheet: &str) -> Result<bool, StoreError>;

    /// Create `sheet` if it does not exist yet.
    async fn create_sheet(&self, sheet: &str) -> Result<(), StoreError>;

    async fn get_cell(&self, sheet: &str, row: u32, column: u32) -> Result<CellValue, StoreError>;

    /// Values of `column` from `from_row` down to the last non-empty row, holes included.
    async fn get_column(
        &self,
        sheet: &str,
        column: u32,
        from_row: u32,
    ) -> Result<Vec<CellValue>, StoreError>;

    /// Write one cell. Writing an empty value clears it.
    async fn set_cell(
        &self,
        sheet: &str,
        row: u32,
        column: u32,
        value: CellValue,
    ) -> Result<(), StoreError>;

    /// Write a rectangle whose top-left corner is (`row`, `column`).
    async fn set_range(
        &self,
        sheet: &str,
        row: u32,
        column: u32,
        values: Vec<Vec<CellValue>>,
    ) -> Result<(), StoreError> {
        for (dr, cells) in values.into_iter().enumerate() {
            for (dc, value) in cells.into_iter().enumerate() {
                self.set_cell(sheet, row + dr as u32, column + dc as u32, value)
                    .await?;
            }
        }
        Ok(())
    }
}

pub(crate) fn check_address(row: u32, column: u32) -> Result<(), StoreError> {
    if row == 0 || column == 0 {
        return Err(StoreError::InvalidAddress { row, column });
    }
    Ok(())
}
