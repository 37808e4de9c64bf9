//! The settings sheet: member inclusion table plus a key/value table of analysis knobs.
//!
//! Layout: `A1:B1` member header with members listed from row 2, `D1:E1` key/value header
//! with one setting per row from row 2. Values are read from column `E`.

use std::collections::HashSet;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::FourKeysError;
use crate::metrics::RankThresholds;
use crate::store::{CellValue, Sheet, StoreError, TabularStore};

pub const SETTINGS_SHEET: &str = "Settings";

pub const MEMBER_COLUMN: u32 = 1;
pub const INCLUDED_COLUMN: u32 = 2;
pub const KEY_COLUMN: u32 = 4;
pub const VALUE_COLUMN: u32 = 5;

pub const WINDOW_ROW: u32 = 2;
pub const INCIDENT_PATTERN_ROW: u32 = 3;
pub const HOTFIX_PATTERN_ROW: u32 = 4;
/// First of three rows (Elite, High, Medium).
pub const DEPLOY_FREQUENCY_ROW: u32 = 5;
pub const LEAD_TIME_ROW: u32 = 8;
pub const CHANGE_FAILURE_RATE_ROW: u32 = 11;
pub const TIME_TO_RESTORE_ROW: u32 = 14;

pub const DEFAULT_WINDOW_DAYS: u32 = 28;
/// Longest accepted window (about a century).
pub const MAX_WINDOW_DAYS: u32 = 36_500;
pub const DEFAULT_INCIDENT_PATTERN: &str = "hotfix|revert";
pub const DEFAULT_HOTFIX_PATTERN: &str = "hotfix";

pub const DEFAULT_DEPLOY_FREQUENCY: RankThresholds =
    RankThresholds::new(0.4285714286, 0.1428571429, 0.03333333333);
pub const DEFAULT_LEAD_TIME: RankThresholds = RankThresholds::new(24.0, 168.0, 720.0);
pub const DEFAULT_CHANGE_FAILURE_RATE: RankThresholds = RankThresholds::new(0.15, 0.3, 0.45);
pub const DEFAULT_TIME_TO_RESTORE: RankThresholds = RankThresholds::new(24.0, 168.0, 720.0);

fn default_rows() -> Vec<(String, CellValue)> {
    let mut rows: Vec<(String, CellValue)> = vec![
        ("Moving average window (days)".into(), f64::from(DEFAULT_WINDOW_DAYS).into()),
        ("Restore/revert PR branch pattern (regex)".into(), DEFAULT_INCIDENT_PATTERN.into()),
        ("Hotfix PR branch pattern (regex)".into(), DEFAULT_HOTFIX_PATTERN.into()),
    ];
    let tables = [
        ("Deployment frequency", "merges per day, at least", DEFAULT_DEPLOY_FREQUENCY),
        ("Lead time", "hours, at most", DEFAULT_LEAD_TIME),
        ("Change failure rate", "ratio, at most", DEFAULT_CHANGE_FAILURE_RATE),
        ("Time to restore", "hours, at most", DEFAULT_TIME_TO_RESTORE),
    ];
    for (metric, unit, thresholds) in tables {
        for (rank, value) in [
            ("Elite", thresholds.elite),
            ("High", thresholds.high),
            ("Medium", thresholds.medium),
        ] {
            rows.push((format!("{metric} {rank} ({unit})"), value.into()));
        }
    }
    rows
}

/// Create the settings sheet and fill in defaults for every setting that is still blank.
pub async fn initialize(store: &dyn TabularStore) -> Result<(), StoreError> {
    let sheet = Sheet::open_or_create(store, SETTINGS_SHEET).await?;

    sheet
        .set_values(
            1,
            MEMBER_COLUMN,
            vec![vec!["Member".into(), "Included (TRUE/FALSE)".into()]],
        )
        .await?;
    sheet
        .set_values(1, KEY_COLUMN, vec![vec!["Key".into(), "Value".into()]])
        .await?;

    for (offset, (label, value)) in default_rows().into_iter().enumerate() {
        let row = WINDOW_ROW + offset as u32;
        sheet.set(row, KEY_COLUMN, label).await?;
        if sheet.cell(row, VALUE_COLUMN).await?.is_empty() {
            sheet.set(row, VALUE_COLUMN, value).await?;
        } else {
            debug!(row, "keeping existing setting");
        }
    }
    Ok(())
}

// =============================================================================
// LOADED SETTINGS
// =============================================================================

/// Analysis settings as read from the sheet, with defaults for blank or malformed cells.
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub window_days: u32,
    pub incident_pattern: Regex,
    pub hotfix_pattern: Regex,
    pub deploy_frequency: RankThresholds,
    pub lead_time: RankThresholds,
    pub change_failure_rate: RankThresholds,
    pub time_to_restore: RankThresholds,
    /// Authors whose inclusion cell is `FALSE`.
    pub excluded_members: HashSet<String>,
}

impl AnalysisSettings {
    /// Settings with the given window and patterns and default thresholds.
    pub fn new(
        window_days: u32,
        incident_pattern: &str,
        hotfix_pattern: &str,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            window_days,
            incident_pattern: Regex::new(incident_pattern)?,
            hotfix_pattern: Regex::new(hotfix_pattern)?,
            deploy_frequency: DEFAULT_DEPLOY_FREQUENCY,
            lead_time: DEFAULT_LEAD_TIME,
            change_failure_rate: DEFAULT_CHANGE_FAILURE_RATE,
            time_to_restore: DEFAULT_TIME_TO_RESTORE,
            excluded_members: HashSet::new(),
        })
    }

    pub async fn load(store: &dyn TabularStore) -> Result<Self, FourKeysError> {
        let sheet = Sheet::open(store, SETTINGS_SHEET)
            .await?
            .ok_or_else(|| FourKeysError::MissingSheet(SETTINGS_SHEET.to_string()))?;

        let window_days = match number_setting(&sheet, WINDOW_ROW).await? {
            Some(days) if (1.0..=f64::from(MAX_WINDOW_DAYS)).contains(&days) => {
                days.round() as u32
            }
            Some(days) => {
                warn!(
                    days,
                    max = MAX_WINDOW_DAYS,
                    "window must be between one day and the maximum, using default"
                );
                DEFAULT_WINDOW_DAYS
            }
            None => DEFAULT_WINDOW_DAYS,
        };

        Ok(Self {
            window_days,
            incident_pattern: pattern_setting(
                &sheet,
                INCIDENT_PATTERN_ROW,
                DEFAULT_INCIDENT_PATTERN,
            )
            .await?,
            hotfix_pattern: pattern_setting(&sheet, HOTFIX_PATTERN_ROW, DEFAULT_HOTFIX_PATTERN)
                .await?,
            deploy_frequency: thresholds_setting(
                &sheet,
                DEPLOY_FREQUENCY_ROW,
                DEFAULT_DEPLOY_FREQUENCY,
            )
            .await?,
            lead_time: thresholds_setting(&sheet, LEAD_TIME_ROW, DEFAULT_LEAD_TIME).await?,
            change_failure_rate: thresholds_setting(
                &sheet,
                CHANGE_FAILURE_RATE_ROW,
                DEFAULT_CHANGE_FAILURE_RATE,
            )
            .await?,
            time_to_restore: thresholds_setting(
                &sheet,
                TIME_TO_RESTORE_ROW,
                DEFAULT_TIME_TO_RESTORE,
            )
            .await?,
            excluded_members: excluded_members(&sheet).await?,
        })
    }

    pub fn is_included(&self, author: &str) -> bool {
        !self.excluded_members.contains(author)
    }
}

async fn number_setting(sheet: &Sheet<'_>, row: u32) -> Result<Option<f64>, StoreError> {
    let cell = sheet.cell(row, VALUE_COLUMN).await?;
    if cell.is_empty() {
        return Ok(None);
    }
    match cell.as_f64() {
        Some(value) if value.is_finite() => Ok(Some(value)),
        _ => {
            warn!(
                cell = %sheet.absolute_ref(row, VALUE_COLUMN),
                value = %cell,
                "ignoring non-numeric setting"
            );
            Ok(None)
        }
    }
}

async fn pattern_setting(
    sheet: &Sheet<'_>,
    row: u32,
    default: &str,
) -> Result<Regex, FourKeysError> {
    let cell = sheet.cell(row, VALUE_COLUMN).await?;
    let pattern = match cell.as_text() {
        Some(text) if !text.trim().is_empty() => text.trim().to_string(),
        _ => default.to_string(),
    };
    Regex::new(&pattern).map_err(|source| FourKeysError::InvalidPattern {
        cell: sheet.absolute_ref(row, VALUE_COLUMN),
        source,
    })
}

async fn thresholds_setting(
    sheet: &Sheet<'_>,
    first_row: u32,
    default: RankThresholds,
) -> Result<RankThresholds, StoreError> {
    Ok(RankThresholds::new(
        number_setting(sheet, first_row).await?.unwrap_or(default.elite),
        number_setting(sheet, first_row + 1).await?.unwrap_or(default.high),
        number_setting(sheet, first_row + 2).await?.unwrap_or(default.medium),
    ))
}

async fn excluded_members(sheet: &Sheet<'_>) -> Result<HashSet<String>, StoreError> {
    let members = sheet.vertical_values(MEMBER_COLUMN, 2).await?;
    let included = sheet.vertical_values(INCLUDED_COLUMN, 2).await?;

    let mut excluded = HashSet::new();
    for (index, member) in members.iter().enumerate() {
        let Some(name) = member.as_text().map(str::trim).filter(|n| !n.is_empty()) else {
            continue;
        };
        let flag = included.get(index).cloned().unwrap_or_default();
        if flag.as_bool() == Some(false) {
            excluded.insert(name.to_string());
        }
    }
    Ok(excluded)
}
