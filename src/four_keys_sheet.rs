//! The four keys report sheet: two header rows, then one row per report date.

use chrono::NaiveDate;
use tracing::info;

use crate::datetime::{format_date, DisplayZone};
use crate::error::FourKeysError;
use crate::metrics::{compute_four_keys, report_dates, FourKeysReport};
use crate::pull_requests::PullRequestsSheet;
use crate::settings::AnalysisSettings;
use crate::store::{CellValue, Sheet, StoreError, TabularStore};

pub const FOUR_KEYS_SHEET: &str = "Four Keys";
pub const FIRST_REPORT_ROW: u32 = 3;

const HEADER: [[&str; 9]; 2] = [
    [
        "Date",
        "Deployment frequency",
        "",
        "Lead time for changes",
        "",
        "Change failure rate",
        "",
        "Time to restore",
        "",
    ],
    [
        "",
        "Per day",
        "Rank",
        "Hours",
        "Rank",
        "Ratio",
        "Rank",
        "Hours",
        "Rank",
    ],
];

pub async fn initialize(store: &dyn TabularStore) -> Result<(), StoreError> {
    let sheet = Sheet::open_or_create(store, FOUR_KEYS_SHEET).await?;
    let rows = HEADER
        .iter()
        .map(|row| row.iter().map(|h| CellValue::from(*h)).collect())
        .collect();
    sheet.set_values(1, 1, rows).await
}

fn report_cells(report: &FourKeysReport) -> Vec<CellValue> {
    vec![
        format_date(report.date).into(),
        report.deployment_frequency.into(),
        report.deployment_frequency_rank.to_string().into(),
        report.lead_time_hours.into(),
        report.lead_time_rank.to_string().into(),
        report.change_failure_rate.into(),
        report.change_failure_rate_rank.to_string().into(),
        report.time_to_restore_hours.into(),
        report.time_to_restore_rank.to_string().into(),
    ]
}

/// Overwrite the report block starting at row 3.
pub async fn write_reports(
    store: &dyn TabularStore,
    reports: &[FourKeysReport],
) -> Result<(), FourKeysError> {
    let sheet = Sheet::open(store, FOUR_KEYS_SHEET)
        .await?
        .ok_or_else(|| FourKeysError::MissingSheet(FOUR_KEYS_SHEET.to_string()))?;
    let rows = reports.iter().map(report_cells).collect();
    sheet.set_values(FIRST_REPORT_ROW, 1, rows).await?;
    Ok(())
}

/// Compute the report for the five dates ending at `today` and write it.
pub async fn generate_report(
    store: &dyn TabularStore,
    zone: DisplayZone,
    today: NaiveDate,
) -> Result<Vec<FourKeysReport>, FourKeysError> {
    let settings = AnalysisSettings::load(store).await?;
    let rows = PullRequestsSheet::open(store, zone).await?.rows().await?;

    let reports: Vec<FourKeysReport> = report_dates(today)
        .into_iter()
        .map(|date| compute_four_keys(&rows, &settings, date))
        .collect();

    write_reports(store, &reports).await?;
    info!(
        rows = rows.len(),
        dates = reports.len(),
        window_days = settings.window_days,
        "wrote four keys report"
    );
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySheetStore;

    #[tokio::test]
    async fn writes_header_and_report_rows() {
        let store = MemorySheetStore::new();
        initialize(&store).await.unwrap();

        let report = FourKeysReport {
            date: NaiveDate::from_ymd_opt(2024, 2, 15).unwrap(),
            deploys: 2,
            incidents: 0,
            hotfixes: 0,
            deployment_frequency: 0.5,
            deployment_frequency_rank: crate::metrics::Rank::Elite,
            lead_time_hours: 12.0,
            lead_time_rank: crate::metrics::Rank::Elite,
            change_failure_rate: 0.0,
            change_failure_rate_rank: crate::metrics::Rank::Elite,
            time_to_restore_hours: 0.0,
            time_to_restore_rank: crate::metrics::Rank::Elite,
        };
        write_reports(&store, &[report]).await.unwrap();

        let sheet = Sheet::open(&store, FOUR_KEYS_SHEET).await.unwrap().unwrap();
        assert_eq!(sheet.cell(1, 2).await.unwrap(), CellValue::from("Deployment frequency"));
        assert_eq!(sheet.cell(2, 3).await.unwrap(), CellValue::from("Rank"));
        assert_eq!(sheet.cell(3, 1).await.unwrap(), CellValue::from("2024-02-15"));
        assert_eq!(sheet.cell(3, 2).await.unwrap(), CellValue::Number(0.5));
        assert_eq!(sheet.cell(3, 9).await.unwrap(), CellValue::from("Elite"));
    }

    #[tokio::test]
    async fn write_without_sheet_is_fatal() {
        let store = MemorySheetStore::new();
        let err = write_reports(&store, &[]).await.unwrap_err();
        assert!(matches!(err, FourKeysError::MissingSheet(_)));
    }
}
