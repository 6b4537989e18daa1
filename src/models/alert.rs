use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// Radius applied when an alert document does not carry one.
pub const DEFAULT_ALERT_RADIUS_KM: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Case-insensitive, so both `"HIGH"` and the form value `"high"` decode.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Some(Severity::Low),
            "MEDIUM" => Some(Severity::Medium),
            "HIGH" => Some(Severity::High),
            "CRITICAL" => Some(Severity::Critical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertRecord {
    pub id: String,
    pub title: String,
    pub message: String,
    pub alert_type: String,
    pub location: GeoPoint,
    pub radius_km: f64,
    pub severity: Severity,
    pub issued_by: String,
    pub issued_at: Option<DateTime<Utc>>,
    pub active: bool,
}
