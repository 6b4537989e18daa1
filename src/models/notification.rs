use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::alert::Severity;
use crate::geo::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "user")]
    Citizen,
    Official,
    Analyst,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "citizen" | "user" => Some(Role::Citizen),
            "official" => Some(Role::Official),
            "analyst" => Some(Role::Analyst),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Citizen => "citizen",
            Role::Official => "official",
            Role::Analyst => "analyst",
        }
    }

    /// Only analysts and officials have a notification feed.
    pub fn receives_notifications(&self) -> bool {
        matches!(self, Role::Analyst | Role::Official)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: String,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub priority: Severity,
    pub target_roles: Vec<Role>,
    pub timestamp: Option<DateTime<Utc>>,
    pub read: bool,
    pub location: Option<GeoPoint>,
    pub location_error: Option<String>,
}
