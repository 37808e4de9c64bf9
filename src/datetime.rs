//! Timestamp rendering for sheet cells.
//!
//! Every timestamp the sync writes uses the fixed `YYYY-MM-DD HH:MM:SS` layout in
//! the display zone (local time unless configured otherwise). The same layout is
//! parsed back when the watermark and the metrics read stored rows.

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};

/// Layout of every timestamp cell.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Layout of report date cells.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Zone that sheet timestamps are rendered in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayZone {
    /// The host's local time zone.
    #[default]
    Local,
    /// A fixed UTC offset.
    Fixed(FixedOffset),
}

impl DisplayZone {
    pub fn utc() -> Self {
        Self::Fixed(Utc.fix())
    }

    /// Render `ts` as `YYYY-MM-DD HH:MM:SS` in this zone.
    pub fn format(&self, ts: &DateTime<Utc>) -> String {
        match self {
            Self::Local => ts.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string(),
            Self::Fixed(offset) => ts.with_timezone(offset).format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    /// Parse a cell written by [`DisplayZone::format`] back into an instant.
    ///
    /// Ambiguous local times (DST fold) resolve to the earlier instant.
    pub fn parse(&self, cell: &str) -> Option<DateTime<Utc>> {
        let naive = parse_naive(cell)?;
        match self {
            Self::Local => Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
            Self::Fixed(offset) => offset
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }

    /// Today's date in this zone.
    pub fn today(&self) -> NaiveDate {
        match self {
            Self::Local => Local::now().date_naive(),
            Self::Fixed(offset) => Utc::now().with_timezone(offset).date_naive(),
        }
    }
}

/// Parse a timestamp cell without attaching a zone.
pub fn parse_naive(cell: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(cell.trim(), TIMESTAMP_FORMAT).ok()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Hours between the first commit and the merge, if both are known.
///
/// `None` means "unknown"; it is never collapsed to zero.
pub fn lead_time_hours(
    first_commit: Option<DateTime<Utc>>,
    merged_at: Option<DateTime<Utc>>,
) -> Option<f64> {
    match (first_commit, merged_at) {
        (Some(first), Some(merged)) => {
            Some((merged - first).num_milliseconds() as f64 / 3_600_000.0)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn formats_with_zero_padding() {
        let ts = utc("2024-03-05T04:07:09Z");
        assert_eq!(DisplayZone::utc().format(&ts), "2024-03-05 04:07:09");
    }

    #[test]
    fn formats_in_fixed_offset() {
        let jst = DisplayZone::Fixed(FixedOffset::east_opt(9 * 3600).unwrap());
        let ts = utc("2023-12-31T20:00:00Z");
        assert_eq!(jst.format(&ts), "2024-01-01 05:00:00");
        assert_eq!(jst.parse("2024-01-01 05:00:00"), Some(ts));
    }

    #[test]
    fn lead_time_is_exact_hours() {
        let first = utc("2024-01-01T00:00:00Z");
        let merged = utc("2024-01-02T00:00:00Z");
        assert_eq!(lead_time_hours(Some(first), Some(merged)), Some(24.0));
        assert_eq!(
            lead_time_hours(Some(first), Some(utc("2024-01-01T00:30:00Z"))),
            Some(0.5)
        );
    }

    #[test]
    fn lead_time_unknown_without_both_endpoints() {
        let first = utc("2024-01-01T00:00:00Z");
        assert_eq!(lead_time_hours(Some(first), None), None);
        assert_eq!(lead_time_hours(None, Some(first)), None);
    }

    #[test]
    fn rejects_other_layouts() {
        assert!(parse_naive("2024-01-01T00:00:00Z").is_none());
        assert!(parse_naive("").is_none());
        assert!(parse_naive(" 2024-01-01 00:00:00 ").is_some());
    }
}
