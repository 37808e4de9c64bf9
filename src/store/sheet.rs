//! Named-sheet handle plus A1 notation helpers shared by the sheet layouts.

use super::{CellValue, StoreError, TabularStore};

/// A sheet inside a [`TabularStore`].
#[derive(Clone)]
pub struct Sheet<'a> {
    store: &'a dyn TabularStore,
    name: String,
}

impl<'a> Sheet<'a> {
    /// Open an existing sheet; `None` when it does not exist.
    pub async fn open(
        store: &'a dyn TabularStore,
        name: &str,
    ) -> Result<Option<Sheet<'a>>, StoreError> {
        if !store.has_sheet(name).await? {
            return Ok(None);
        }
        Ok(Some(Self {
            store,
            name: name.to_string(),
        }))
    }

    pub async fn open_or_create(
        store: &'a dyn TabularStore,
        name: &str,
    ) -> Result<Sheet<'a>, StoreError> {
        store.create_sheet(name).await?;
        Ok(Self {
            store,
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn cell(&self, row: u32, column: u32) -> Result<CellValue, StoreError> {
        self.store.get_cell(&self.name, row, column).await
    }

    pub async fn set(
        &self,
        row: u32,
        column: u32,
        value: impl Into<CellValue>,
    ) -> Result<(), StoreError> {
        self.store
            .set_cell(&self.name, row, column, value.into())
            .await
    }

    pub async fn set_values(
        &self,
        row: u32,
        column: u32,
        values: Vec<Vec<CellValue>>,
    ) -> Result<(), StoreError> {
        self.store.set_range(&self.name, row, column, values).await
    }

    /// Column values from `head` to the last non-empty row.
    pub async fn vertical_values(
        &self,
        column: u32,
        head: u32,
    ) -> Result<Vec<CellValue>, StoreError> {
        self.store.get_column(&self.name, column, head.max(1)).await
    }

    /// Absolute reference to a cell of this sheet, e.g. `'Settings'!$E$3`.
    pub fn absolute_ref(&self, row: u32, column: u32) -> String {
        format!(
            "'{}'!${}${}",
            self.name.replace('\'', "''"),
            column_name(column),
            row
        )
    }
}

/// 1-based column number to letters: 1 → `A`, 27 → `AA`.
pub fn column_name(column: u32) -> String {
    let mut n = column;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Relative A1 address, e.g. `B7`.
pub fn a1(row: u32, column: u32) -> String {
    format!("{}{}", column_name(column), row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_names() {
        for (n, name) in [(1, "A"), (12, "L"), (26, "Z"), (27, "AA"), (52, "AZ"), (703, "AAA")] {
            assert_eq!(column_name(n), name);
        }
    }

    #[test]
    fn a1_addresses() {
        assert_eq!(a1(7, 2), "B7");
        assert_eq!(a1(1, 12), "L1");
    }
}
