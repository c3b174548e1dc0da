//! Analytics over analysis records
//!
//! One query builder backs every analytics endpoint; the monthly and
//! summary views differ only in how they fold the matching records.

use super::types::{AnalysisStatus, ImageAnalysisRecord};
use chrono::{Datelike, TimeZone, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Owner + optional date-range filter shared by the analytics views
#[derive(Debug, Clone)]
pub struct AnalysisQuery {
    owner: String,
    from_millis: Option<u64>,
    to_millis: Option<u64>,
}

impl AnalysisQuery {
    pub fn for_owner(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            from_millis: None,
            to_millis: None,
        }
    }

    /// Inclusive lower bound on `created_at`
    pub fn from(mut self, from_millis: Option<u64>) -> Self {
        self.from_millis = from_millis;
        self
    }

    /// Inclusive upper bound on `created_at`
    pub fn to(mut self, to_millis: Option<u64>) -> Self {
        self.to_millis = to_millis;
        self
    }

    pub fn matches(&self, record: &ImageAnalysisRecord) -> bool {
        record.owner == self.owner
            && self.from_millis.map_or(true, |f| record.created_at >= f)
            && self.to_millis.map_or(true, |t| record.created_at <= t)
    }
}

/// Per-month upload counts and score average
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyBucket {
    /// Calendar month as "YYYY-MM" (UTC)
    pub month: String,
    pub uploads: u64,
    pub completed: u64,
    /// Mean score across completed records in the month, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_score: Option<f64>,
}

/// Status breakdown over a set of records
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub total: u64,
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_score: Option<f64>,
}

/// Group records into calendar-month buckets, oldest month first
pub fn monthly_buckets(records: &[ImageAnalysisRecord]) -> Vec<MonthlyBucket> {
    // BTreeMap keeps months sorted
    let mut months: BTreeMap<String, (u64, u64, u64)> = BTreeMap::new();

    for record in records {
        let key = month_key(record.created_at);
        let entry = months.entry(key).or_insert((0, 0, 0));
        entry.0 += 1;
        if let Some(result) = &record.result {
            entry.1 += 1;
            entry.2 += result.score as u64;
        }
    }

    months
        .into_iter()
        .map(|(month, (uploads, completed, score_sum))| MonthlyBucket {
            month,
            uploads,
            completed,
            average_score: (completed > 0).then(|| score_sum as f64 / completed as f64),
        })
        .collect()
}

/// Fold records into a status breakdown with an overall score average
pub fn summarize(records: &[ImageAnalysisRecord]) -> StatusSummary {
    let mut summary = StatusSummary {
        total: records.len() as u64,
        pending: 0,
        processing: 0,
        completed: 0,
        failed: 0,
        average_score: None,
    };
    let mut score_sum = 0u64;

    for record in records {
        match record.status {
            AnalysisStatus::Pending => summary.pending += 1,
            AnalysisStatus::Processing => summary.processing += 1,
            AnalysisStatus::Completed => summary.completed += 1,
            AnalysisStatus::Failed => summary.failed += 1,
        }
        if let Some(result) = &record.result {
            score_sum += result.score as u64;
        }
    }

    if summary.completed > 0 {
        summary.average_score = Some(score_sum as f64 / summary.completed as f64);
    }
    summary
}

fn month_key(millis: u64) -> String {
    let dt = Utc
        .timestamp_millis_opt(millis as i64)
        .single()
        .unwrap_or_else(|| Utc.timestamp_millis_opt(0).unwrap());
    format!("{:04}-{:02}", dt.year(), dt.month())
}
