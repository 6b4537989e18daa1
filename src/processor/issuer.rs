use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::alert::{AlertRecord, Severity};
use crate::models::report::{ReportRecord, ReportStatus};

/// Issued alerts never cover less than this.
pub const MIN_ALERT_RADIUS_KM: f64 = 15.0;

#[derive(Error, Debug, PartialEq)]
pub enum IssueError {
    #[error("report {0} is not approved")]
    NotApproved(String),
    #[error("report {0} has no usable location")]
    MissingLocation(String),
}

#[derive(Debug, Clone)]
pub struct AlertRequest {
    pub alert_type: Option<String>,
    pub severity: Option<Severity>,
    pub message: Option<String>,
    pub radius_km: Option<f64>,
    pub issued_by: String,
}

pub fn issue_alert(
    report: &ReportRecord,
    request: AlertRequest,
    now: DateTime<Utc>,
) -> Result<AlertRecord, IssueError> {
    if report.status != ReportStatus::Approved {
        return Err(IssueError::NotApproved(report.id.clone()));
    }
    let location = report
        .location
        .filter(|p| p.is_valid())
        .ok_or_else(|| IssueError::MissingLocation(report.id.clone()))?;

    let alert_type = request.alert_type.unwrap_or_else(|| "warning".to_string());
    let message = request.message.unwrap_or_else(|| {
        format!(
            "Alert: {} reported at {:.4}, {:.4}. Please exercise caution in the area.",
            report.event_type, location.lat, location.lng
        )
    });
    // f64::max ignores NaN, so a garbage radius collapses to the minimum.
    let radius_km = request
        .radius_km
        .unwrap_or(MIN_ALERT_RADIUS_KM)
        .max(MIN_ALERT_RADIUS_KM);

    Ok(AlertRecord {
        id: Uuid::new_v4().to_string(),
        title: format!("{} Alert", alert_type),
        message,
        alert_type,
        location,
        radius_km,
        severity: request.severity.unwrap_or(report.severity),
        issued_by: request.issued_by,
        issued_at: Some(now),
        active: true,
    })
}
