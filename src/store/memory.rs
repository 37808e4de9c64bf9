//! In-process sheet store. Useful for tests and dry runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{check_address, CellValue, StoreError, TabularStore};

type Cells = BTreeMap<(u32, u32), CellValue>;

#[derive(Debug, Default)]
pub struct MemorySheetStore {
    sheets: Mutex<HashMap<String, Cells>>,
    writes: AtomicUsize,
}

impl MemorySheetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set_cell` calls served so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn with_sheets<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut HashMap<String, Cells>) -> Result<R, StoreError>,
    {
        let mut guard = self.sheets.lock().map_err(|_| StoreError::Poisoned)?;
        f(&mut guard)
    }
}

#[async_trait]
impl TabularStore for MemorySheetStore {
    async fn has_sheet(&self, sheet: &str) -> Result<bool, StoreError> {
        self.with_sheets(|sheets| Ok(sheets.contains_key(sheet)))
    }

    async fn create_sheet(&self, sheet: &str) -> Result<(), StoreError> {
        self.with_sheets(|sheets| {
            sheets.entry(sheet.to_string()).or_default();
            Ok(())
        })
    }

    async fn get_cell(&self, sheet: &str, row: u32, column: u32) -> Result<CellValue, StoreError> {
        check_address(row, column)?;
        self.with_sheets(|sheets| {
            let cells = sheets
                .get(sheet)
                .ok_or_else(|| StoreError::SheetNotFound(sheet.to_string()))?;
            Ok(cells.get(&(row, column)).cloned().unwrap_or_default())
        })
    }

    async fn get_column(
        &self,
        sheet: &str,
        column: u32,
        from_row: u32,
    ) -> Result<Vec<CellValue>, StoreError> {
        check_address(from_row, column)?;
        self.with_sheets(|sheets| {
            let cells = sheets
                .get(sheet)
                .ok_or_else(|| StoreError::SheetNotFound(sheet.to_string()))?;
            let in_column: Vec<(u32, &CellValue)> = cells
                .iter()
                .filter(|((row, col), _)| *col == column && *row >= from_row)
                .map(|((row, _), value)| (*row, value))
                .collect();
            let Some(last) = in_column.last().map(|(row, _)| *row) else {
                return Ok(Vec::new());
            };
            let mut values = vec![CellValue::Empty; (last - from_row + 1) as usize];
            for (row, value) in in_column {
                values[(row - from_row) as usize] = value.clone();
            }
            Ok(values)
        })
    }

    async fn set_cell(
        &self,
        sheet: &str,
        row: u32,
        column: u32,
        value: CellValue,
    ) -> Result<(), StoreError> {
        check_address(row, column)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.with_sheets(|sheets| {
            let cells = sheets
                .get_mut(sheet)
                .ok_or_else(|| StoreError::SheetNotFound(sheet.to_string()))?;
            match value.normalized() {
                CellValue::Empty => {
                    cells.remove(&(row, column));
                }
                value => {
                    cells.insert((row, column), value);
                }
            }
            Ok(())
        })
    }
}
