//! The pull request sheet: one row per pull request, keyed by `{repository}/{number}`.

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::datetime::{lead_time_hours, DisplayZone};
use crate::error::FourKeysError;
use crate::github::PullRequestRecord;
use crate::settings::{HOTFIX_PATTERN_ROW, INCIDENT_PATTERN_ROW, SETTINGS_SHEET, VALUE_COLUMN};
use crate::store::sheet::a1;
use crate::store::{CellValue, Sheet, StoreError, TabularStore};

pub const PULL_REQUESTS_SHEET: &str = "Pull Requests";

pub const HEADER_ROW: u32 = 1;
pub const FIRST_DATA_ROW: u32 = 2;

/// 1-based column numbers (A..L).
pub mod column {
    pub const AUTHOR: u32 = 1;
    pub const BRANCH: u32 = 2;
    pub const BODY: u32 = 3;
    pub const MERGED: u32 = 4;
    pub const FIRST_COMMIT_AT: u32 = 5;
    pub const MERGED_AT: u32 = 6;
    pub const LEAD_TIME_HOURS: u32 = 7;
    pub const REPOSITORY: u32 = 8;
    pub const INCIDENT: u32 = 9;
    pub const HOTFIX: u32 = 10;
    pub const UPDATED_AT: u32 = 11;
    pub const KEY: u32 = 12;
}

pub const COLUMN_COUNT: usize = 12;

pub const HEADERS: [&str; COLUMN_COUNT] = [
    "Member",
    "Branch",
    "PR Body",
    "Merged",
    "First Commit At",
    "Merged At",
    "Lead Time (hours)",
    "Repository",
    "Incident",
    "Hotfix",
    "Updated At",
    "id",
];

pub fn natural_key(repository: &str, number: u64) -> String {
    format!("{repository}/{number}")
}

/// `=REGEXMATCH(B{row}, 'Settings'!$E${pattern_row})`
fn branch_match_formula(row: u32, pattern_row: u32) -> String {
    format!(
        "=REGEXMATCH({}, '{}'!${}${})",
        a1(row, column::BRANCH),
        SETTINGS_SHEET,
        crate::store::column_name(VALUE_COLUMN),
        pattern_row
    )
}

// =============================================================================
// STORED ROW
// =============================================================================

/// One pull request row as it sits in the sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRow {
    /// Sheet row number.
    pub row: u32,
    pub author_login: String,
    pub branch_name: String,
    pub body_text: String,
    pub merged: bool,
    /// Empty when unknown.
    pub first_commit_formatted: String,
    /// Empty when not merged.
    pub merged_at_formatted: String,
    /// `None` when either endpoint is unknown.
    pub lead_time_hours: Option<f64>,
    pub repository_name: String,
    /// Formula text (or the store's evaluated value).
    pub incident_flag: String,
    pub hotfix_flag: String,
    pub updated_at_formatted: String,
    pub natural_key: String,
}

impl StoredRow {
    /// Derive the row for `record` placed at sheet row `row`.
    pub fn from_record(
        repository: &str,
        record: &PullRequestRecord,
        row: u32,
        zone: &DisplayZone,
    ) -> Self {
        let first_commit = record.first_commit_date();
        let merged_at = record.merged_at;

        Self {
            row,
            author_login: record.author_login().to_string(),
            branch_name: record.head_ref_name.clone(),
            body_text: record.body_text.clone(),
            merged: record.merged,
            first_commit_formatted: first_commit.map(|d| zone.format(&d)).unwrap_or_default(),
            merged_at_formatted: merged_at.map(|d| zone.format(&d)).unwrap_or_default(),
            lead_time_hours: lead_time_hours(first_commit, merged_at),
            repository_name: repository.to_string(),
            incident_flag: branch_match_formula(row, INCIDENT_PATTERN_ROW),
            hotfix_flag: branch_match_formula(row, HOTFIX_PATTERN_ROW),
            updated_at_formatted: zone.format(&record.updated_at),
            natural_key: natural_key(repository, record.number),
        }
    }

    /// Cells in column order A..L.
    pub fn cells(&self) -> [(u32, CellValue); COLUMN_COUNT] {
        [
            (column::AUTHOR, self.author_login.as_str().into()),
            (column::BRANCH, self.branch_name.as_str().into()),
            (column::BODY, self.body_text.as_str().into()),
            (column::MERGED, self.merged.into()),
            (column::FIRST_COMMIT_AT, self.first_commit_formatted.as_str().into()),
            (column::MERGED_AT, self.merged_at_formatted.as_str().into()),
            (column::LEAD_TIME_HOURS, self.lead_time_hours.into()),
            (column::REPOSITORY, self.repository_name.as_str().into()),
            (column::INCIDENT, CellValue::Formula(self.incident_flag.clone())),
            (column::HOTFIX, CellValue::Formula(self.hotfix_flag.clone())),
            (column::UPDATED_AT, self.updated_at_formatted.as_str().into()),
            (column::KEY, self.natural_key.as_str().into()),
        ]
    }

    fn from_cells(row: u32, cells: &[CellValue]) -> Self {
        let get = |col: u32| cells.get((col - 1) as usize).cloned().unwrap_or_default();
        let text = |col: u32| get(col).to_string();

        Self {
            row,
            author_login: text(column::AUTHOR),
            branch_name: text(column::BRANCH),
            body_text: text(column::BODY),
            merged: get(column::MERGED).as_bool().unwrap_or(false),
            first_commit_formatted: text(column::FIRST_COMMIT_AT),
            merged_at_formatted: text(column::MERGED_AT),
            lead_time_hours: get(column::LEAD_TIME_HOURS).as_f64(),
            repository_name: text(column::REPOSITORY),
            incident_flag: text(column::INCIDENT),
            hotfix_flag: text(column::HOTFIX),
            updated_at_formatted: text(column::UPDATED_AT),
            natural_key: text(column::KEY),
        }
    }
}

// =============================================================================
// SHEET
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted(u32),
    Updated(u32),
}

impl UpsertOutcome {
    pub fn row(self) -> u32 {
        match self {
            Self::Inserted(row) | Self::Updated(row) => row,
        }
    }
}

pub struct PullRequestsSheet<'a> {
    sheet: Sheet<'a>,
    zone: DisplayZone,
}

impl<'a> PullRequestsSheet<'a> {
    /// Open the existing sheet; a missing sheet is fatal for a sync pass.
    pub async fn open(
        store: &'a dyn TabularStore,
        zone: DisplayZone,
    ) -> Result<PullRequestsSheet<'a>, FourKeysError> {
        let sheet = Sheet::open(store, PULL_REQUESTS_SHEET)
            .await?
            .ok_or_else(|| FourKeysError::MissingSheet(PULL_REQUESTS_SHEET.to_string()))?;
        Ok(Self { sheet, zone })
    }

    /// Create the sheet if needed and write the header row.
    pub async fn initialize(
        store: &'a dyn TabularStore,
        zone: DisplayZone,
    ) -> Result<PullRequestsSheet<'a>, StoreError> {
        let sheet = Sheet::open_or_create(store, PULL_REQUESTS_SHEET).await?;
        let header = HEADERS.iter().map(|h| CellValue::from(*h)).collect();
        sheet.set_values(HEADER_ROW, 1, vec![header]).await?;
        Ok(Self { sheet, zone })
    }

    /// Row that `key` lives in, or the row just after the last non-empty key.
    pub async fn locate(&self, key: &str) -> Result<UpsertOutcome, StoreError> {
        let keys = self
            .sheet
            .vertical_values(column::KEY, FIRST_DATA_ROW)
            .await?;
        let slot = match keys.iter().position(|k| k.as_text() == Some(key)) {
            Some(index) => UpsertOutcome::Updated(FIRST_DATA_ROW + index as u32),
            None => UpsertOutcome::Inserted(FIRST_DATA_ROW + keys.len() as u32),
        };
        Ok(slot)
    }

    /// Insert or update the row for `record`.
    ///
    /// Cells are written one at a time; a failure part way leaves the row partially updated.
    pub async fn upsert(
        &self,
        repository: &str,
        record: &PullRequestRecord,
    ) -> Result<UpsertOutcome, StoreError> {
        let key = natural_key(repository, record.number);
        let outcome = self.locate(&key).await?;
        let row = StoredRow::from_record(repository, record, outcome.row(), &self.zone);

        for (col, value) in row.cells() {
            self.sheet.set(outcome.row(), col, value).await?;
        }

        debug!(key = %key, row = outcome.row(), ?outcome, "upserted pull request");
        Ok(outcome)
    }

    /// Newest `updatedAt` stored for `repository`, or `None` when it has no rows.
    pub async fn latest_updated_at(
        &self,
        repository: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let repositories = self
            .sheet
            .vertical_values(column::REPOSITORY, FIRST_DATA_ROW)
            .await?;
        let updated = self
            .sheet
            .vertical_values(column::UPDATED_AT, FIRST_DATA_ROW)
            .await?;

        let mut latest: Option<DateTime<Utc>> = None;
        for (index, repo) in repositories.iter().enumerate() {
            if repo.as_text() != Some(repository) {
                continue;
            }
            let Some(cell) = updated.get(index).filter(|c| !c.is_empty()) else {
                continue;
            };
            match self.zone.parse(&cell.to_string()) {
                Some(ts) => latest = latest.max(Some(ts)),
                None => warn!(
                    row = FIRST_DATA_ROW + index as u32,
                    value = %cell,
                    "skipping unparseable updated-at cell"
                ),
            }
        }
        Ok(latest)
    }

    /// Every row with a non-empty key, in sheet order.
    pub async fn rows(&self) -> Result<Vec<StoredRow>, StoreError> {
        let mut columns = Vec::with_capacity(COLUMN_COUNT);
        for col in 1..=COLUMN_COUNT as u32 {
            columns.push(self.sheet.vertical_values(col, FIRST_DATA_ROW).await?);
        }

        let keys = &columns[(column::KEY - 1) as usize];
        let mut rows = Vec::new();
        for (index, key) in keys.iter().enumerate() {
            if key.is_empty() {
                continue;
            }
            let cells: Vec<CellValue> = columns
                .iter()
                .map(|values| values.get(index).cloned().unwrap_or_default())
                .collect();
            rows.push(StoredRow::from_cells(FIRST_DATA_ROW + index as u32, &cells));
        }
        Ok(rows)
    }

    /// Write every stored row to `path` as JSON lines. Returns the row count.
    pub async fn export_jsonl(&self, path: impl AsRef<Path>) -> Result<usize, StoreError> {
        let rows = self.rows().await?;
        let path = path.as_ref().to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<usize, StoreError> {
            let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
            for row in &rows {
                let line =
                    serde_json::to_string(row).map_err(|e| StoreError::Serde(e.to_string()))?;
                writeln!(file, "{line}")?;
            }
            file.flush()?;
            Ok(rows.len())
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::{Author, Commit, CommitConnection, CommitNode};

    fn record(merged_at: Option<&str>, committed: Option<&str>) -> PullRequestRecord {
        PullRequestRecord {
            number: 42,
            author: Some(Author {
                login: "octocat".into(),
            }),
            head_ref_name: "hotfix/login".into(),
            body_text: "Fix login".into(),
            merged: merged_at.is_some(),
            merged_at: merged_at.map(|s| s.parse().unwrap()),
            commits: CommitConnection {
                nodes: vec![CommitNode {
                    commit: Commit {
                        committed_date: committed.map(|s| s.parse().unwrap()),
                    },
                }],
            },
            updated_at: "2024-01-02T03:04:05Z".parse().unwrap(),
        }
    }

    #[test]
    fn derives_lead_time_and_formatted_dates() {
        let rec = record(Some("2024-01-02T00:00:00Z"), Some("2024-01-01T00:00:00Z"));
        let row = StoredRow::from_record("api", &rec, 5, &DisplayZone::utc());

        assert_eq!(row.natural_key, "api/42");
        assert_eq!(row.lead_time_hours, Some(24.0));
        assert_eq!(row.first_commit_formatted, "2024-01-01 00:00:00");
        assert_eq!(row.merged_at_formatted, "2024-01-02 00:00:00");
        assert_eq!(row.updated_at_formatted, "2024-01-02 03:04:05");
        assert_eq!(row.incident_flag, "=REGEXMATCH(B5, 'Settings'!$E$3)");
        assert_eq!(row.hotfix_flag, "=REGEXMATCH(B5, 'Settings'!$E$4)");
    }

    #[test]
    fn unmerged_record_leaves_merge_fields_empty() {
        let rec = record(None, Some("2024-01-01T00:00:00Z"));
        let row = StoredRow::from_record("api", &rec, 2, &DisplayZone::utc());

        assert!(!row.merged);
        assert_eq!(row.merged_at_formatted, "");
        assert_eq!(row.lead_time_hours, None);

        let cells = row.cells();
        assert_eq!(
            cells[(column::MERGED_AT - 1) as usize].1.clone().normalized(),
            CellValue::Empty
        );
        assert_eq!(cells[(column::LEAD_TIME_HOURS - 1) as usize].1, CellValue::Empty);
    }

    #[test]
    fn missing_commit_date_leaves_first_commit_empty() {
        let rec = record(Some("2024-01-02T00:00:00Z"), None);
        let row = StoredRow::from_record("api", &rec, 2, &DisplayZone::utc());

        assert_eq!(row.first_commit_formatted, "");
        assert_eq!(row.lead_time_hours, None);
    }

    #[test]
    fn cells_follow_header_order() {
        let rec = record(Some("2024-01-02T00:00:00Z"), Some("2024-01-01T00:00:00Z"));
        let row = StoredRow::from_record("api", &rec, 2, &DisplayZone::utc());
        let columns: Vec<u32> = row.cells().iter().map(|(c, _)| *c).collect();
        assert_eq!(columns, (1..=12).collect::<Vec<u32>>());
        assert_eq!(HEADERS[(column::KEY - 1) as usize], "id");
    }
}
