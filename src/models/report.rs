use chrono::{DateTime, Utc};

use super::alert::Severity;
use crate::geo::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportStatus {
    New,
    UnderReview,
    Approved,
    Rejected,
}

impl ReportStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Some(ReportStatus::New),
            // older dashboards wrote "reviewing"
            "under_review" | "reviewing" => Some(ReportStatus::UnderReview),
            "approved" => Some(ReportStatus::Approved),
            "rejected" => Some(ReportStatus::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::New => "new",
            ReportStatus::UnderReview => "under_review",
            ReportStatus::Approved => "approved",
            ReportStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRecord {
    pub id: String,
    pub event_type: String,
    pub description: String,
    pub user_name: String,
    pub user_email: String,
    pub location: Option<GeoPoint>,
    pub created_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub status: ReportStatus,
    pub severity: Severity,
    pub alert_issued: bool,
}
