//! Four keys metrics computed over stored pull request rows.

use std::fmt;

use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::datetime::parse_naive;
use crate::pull_requests::StoredRow;
use crate::settings::AnalysisSettings;

/// Spacing between report dates.
pub const REPORT_INTERVAL_DAYS: u64 = 14;
/// Number of report rows, oldest first.
pub const REPORT_ROWS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rank {
    Elite,
    High,
    Medium,
    Low,
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Elite => "Elite",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        })
    }
}

/// Elite/High/Medium boundaries; anything beyond `medium` is Low.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankThresholds {
    pub elite: f64,
    pub high: f64,
    pub medium: f64,
}

impl RankThresholds {
    pub const fn new(elite: f64, high: f64, medium: f64) -> Self {
        Self {
            elite,
            high,
            medium,
        }
    }

    /// Higher is better.
    pub fn rank_at_least(&self, value: f64) -> Rank {
        if value >= self.elite {
            Rank::Elite
        } else if value >= self.high {
            Rank::High
        } else if value >= self.medium {
            Rank::Medium
        } else {
            Rank::Low
        }
    }

    /// Lower is better.
    pub fn rank_at_most(&self, value: f64) -> Rank {
        if value <= self.elite {
            Rank::Elite
        } else if value <= self.high {
            Rank::High
        } else if value <= self.medium {
            Rank::Medium
        } else {
            Rank::Low
        }
    }
}

/// One report row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FourKeysReport {
    pub date: NaiveDate,
    pub deploys: usize,
    pub incidents: usize,
    pub hotfixes: usize,
    /// Merges per day.
    pub deployment_frequency: f64,
    pub deployment_frequency_rank: Rank,
    pub lead_time_hours: f64,
    pub lead_time_rank: Rank,
    /// Incident merges per non-incident merge.
    pub change_failure_rate: f64,
    pub change_failure_rate_rank: Rank,
    pub time_to_restore_hours: f64,
    pub time_to_restore_rank: Rank,
}

/// Metrics for merges in `[report_date - window, report_date)`.
///
/// Rows without a parseable merge time or by an excluded author are skipped.
pub fn compute_four_keys(
    rows: &[StoredRow],
    settings: &AnalysisSettings,
    report_date: NaiveDate,
) -> FourKeysReport {
    let end: NaiveDateTime = report_date.and_time(chrono::NaiveTime::MIN);
    // No lower bound when the window reaches past the earliest representable date.
    let start = end.checked_sub_days(Days::new(u64::from(settings.window_days)));

    let mut deploys = 0usize;
    let mut deploy_hours = 0.0;
    let mut incidents = 0usize;
    let mut hotfixes = 0usize;
    let mut hotfix_hours = 0.0;

    for row in rows {
        let Some(merged_at) = parse_naive(&row.merged_at_formatted) else {
            continue;
        };
        if start.is_some_and(|start| merged_at < start)
            || merged_at >= end
            || !settings.is_included(&row.author_login)
        {
            continue;
        }
        let hours = row.lead_time_hours.unwrap_or(0.0);

        if settings.incident_pattern.is_match(&row.branch_name) {
            incidents += 1;
        } else {
            deploys += 1;
            deploy_hours += hours;
        }
        if settings.hotfix_pattern.is_match(&row.branch_name) {
            hotfixes += 1;
            hotfix_hours += hours;
        }
    }

    let deployment_frequency = deploys as f64 / f64::from(settings.window_days.max(1));
    let (lead_time_hours, change_failure_rate) = if deploys > 0 {
        (deploy_hours / deploys as f64, incidents as f64 / deploys as f64)
    } else {
        (0.0, 0.0)
    };
    let time_to_restore_hours = if hotfixes > 0 {
        hotfix_hours / hotfixes as f64
    } else {
        0.0
    };

    FourKeysReport {
        date: report_date,
        deploys,
        incidents,
        hotfixes,
        deployment_frequency,
        deployment_frequency_rank: settings.deploy_frequency.rank_at_least(deployment_frequency),
        lead_time_hours,
        lead_time_rank: settings.lead_time.rank_at_most(lead_time_hours),
        change_failure_rate,
        change_failure_rate_rank: settings.change_failure_rate.rank_at_most(change_failure_rate),
        time_to_restore_hours,
        time_to_restore_rank: settings.time_to_restore.rank_at_most(time_to_restore_hours),
    }
}

/// `today - 14k` days for k = 4..=0.
pub fn report_dates(today: NaiveDate) -> Vec<NaiveDate> {
    (0..REPORT_ROWS)
        .rev()
        .filter_map(|k| today.checked_sub_days(Days::new(REPORT_INTERVAL_DAYS * k)))
        .collect()
}
