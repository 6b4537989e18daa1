use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::report::{ReportRecord, ReportStatus};
use crate::time_window::is_within_last_days_at;

pub const TRIAGE_WINDOW_DAYS: i64 = 2;

#[derive(Error, Debug, PartialEq)]
pub enum TransitionError {
    #[error("cannot move report from {from} to {to}")]
    Illegal {
        from: &'static str,
        to: &'static str,
    },
}

/// Officials move reports forward only: new -> under_review -> approved/rejected,
/// with a direct decision allowed on new reports.
pub fn transition(from: ReportStatus, to: ReportStatus) -> Result<ReportStatus, TransitionError> {
    use ReportStatus::*;
    match (from, to) {
        (New, UnderReview) | (New, Approved) | (New, Rejected) => Ok(to),
        (UnderReview, Approved) | (UnderReview, Rejected) => Ok(to),
        _ => Err(TransitionError::Illegal {
            from: from.as_str(),
            to: to.as_str(),
        }),
    }
}

/// Reports submitted in the last two days.
pub fn recent_reports_at(reports: &[ReportRecord], now: DateTime<Utc>) -> Vec<&ReportRecord> {
    reports
        .iter()
        .filter(|r| match r.created_at {
            Some(ts) => is_within_last_days_at(ts, TRIAGE_WINDOW_DAYS, now),
            None => false,
        })
        .collect()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatusCounts {
    pub total: usize,
    pub pending: usize,
    pub reviewing: usize,
    pub approved: usize,
    pub rejected: usize,
}

pub fn status_counts(reports: &[&ReportRecord]) -> StatusCounts {
    let mut counts = StatusCounts {
        total: reports.len(),
        ..Default::default()
    };
    for r in reports {
        match r.status {
            ReportStatus::New => counts.pending += 1,
            ReportStatus::UnderReview => counts.reviewing += 1,
            ReportStatus::Approved => counts.approved += 1,
            ReportStatus::Rejected => counts.rejected += 1,
        }
    }
    counts
}

/// Official dashboard filters over the recent view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriageQuery {
    pub search: Option<String>,
    pub status: Option<ReportStatus>,
}

impl TriageQuery {
    pub fn matches(&self, report: &ReportRecord) -> bool {
        if let Some(status) = self.status {
            if report.status != status {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(term) => {
                let term = term.to_lowercase();
                [
                    &report.event_type,
                    &report.description,
                    &report.user_name,
                    &report.user_email,
                ]
                .iter()
                .any(|field| field.to_lowercase().contains(&term))
            }
            None => true,
        }
    }
}

/// What an official sees: the filtered recent reports and the counts over
/// the whole recent view.
#[derive(Debug, Clone, PartialEq)]
pub struct TriageView {
    pub report_ids: Vec<String>,
    pub counts: StatusCounts,
}

pub fn triage_view_at(reports: &[ReportRecord], query: &TriageQuery, now: DateTime<Utc>) -> TriageView {
    let recent = recent_reports_at(reports, now);
    let counts = status_counts(&recent);
    let report_ids = recent
        .into_iter()
        .filter(|r| query.matches(r))
        .map(|r| r.id.clone())
        .collect();
    TriageView { report_ids, counts }
}
