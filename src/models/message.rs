use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

use super::alert::{AlertRecord, Severity, DEFAULT_ALERT_RADIUS_KM};
use super::notification::{Notification, Role};
use super::report::{ReportRecord, ReportStatus};
use crate::geo::GeoPoint;

/// Change events published by the document store bridge.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    SessionStarted {
        user_id: String,
        role: Role,
    },
    SessionEnded {
        user_id: String,
    },
    LocationFix {
        user_id: String,
        #[serde(default, deserialize_with = "parse_f64_option")]
        lat: Option<f64>,
        #[serde(default, deserialize_with = "parse_f64_option")]
        lng: Option<f64>,
        #[serde(default)]
        error: Option<String>,
    },
    AlertsSnapshot {
        documents: Vec<Document>,
    },
    ReportsSnapshot {
        documents: Vec<Document>,
    },
    NotificationsSnapshot {
        documents: Vec<Document>,
    },
    AlertDismissed {
        user_id: String,
        alert_id: String,
    },
    AlertIssued {
        report_id: String,
        issued_by: String,
        #[serde(default)]
        alert_type: Option<String>,
        #[serde(default)]
        severity: Option<String>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default, deserialize_with = "parse_f64_option")]
        radius_km: Option<f64>,
    },
    ReportReviewed {
        report_id: String,
        status: String,
        #[serde(default)]
        reviewer: Option<String>,
    },
    SosRaised {
        user_id: String,
        #[serde(default)]
        user_name: Option<String>,
        #[serde(default)]
        user_email: Option<String>,
        #[serde(default, deserialize_with = "parse_f64_option")]
        lat: Option<f64>,
        #[serde(default, deserialize_with = "parse_f64_option")]
        lng: Option<f64>,
    },
    NotificationsPurge {
        role: Role,
    },
    NotificationRead {
        notification_id: String,
    },
    AnalystQuery {
        user_id: String,
        #[serde(default)]
        search: Option<String>,
        #[serde(default)]
        severity: Option<String>,
        #[serde(default)]
        alert_filter: Option<String>,
    },
    OfficialQuery {
        user_id: String,
        #[serde(default)]
        search: Option<String>,
        #[serde(default)]
        status: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Deserialize)]
struct WireLocation {
    #[serde(default, deserialize_with = "parse_f64_option")]
    lat: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    lng: Option<f64>,
}

impl WireLocation {
    fn point(&self) -> Option<GeoPoint> {
        Some(GeoPoint::new(self.lat?, self.lng?))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlertDocument {
    title: Option<String>,
    message: Option<String>,
    alert_type: Option<String>,
    location: Option<WireLocation>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    radius_km: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    radius_meters: Option<f64>,
    // Legacy field, read as kilometres.
    #[serde(default, deserialize_with = "parse_f64_option")]
    radius: Option<f64>,
    severity: Option<String>,
    issued_by: Option<String>,
    #[serde(default)]
    issued_at: Value,
    active: Option<bool>,
}

impl AlertDocument {
    fn into_record(self, id: String) -> Option<AlertRecord> {
        let location = self.location.as_ref().and_then(WireLocation::point)?;
        let radius_km = self
            .radius_km
            .or(self.radius_meters.map(|m| m / 1000.0))
            .or(self.radius)
            .unwrap_or(DEFAULT_ALERT_RADIUS_KM);

        Some(AlertRecord {
            id,
            title: self.title.unwrap_or_else(|| "Emergency Alert".to_string()),
            message: self.message.unwrap_or_default(),
            alert_type: self.alert_type.unwrap_or_else(|| "GENERAL".to_string()),
            location,
            radius_km,
            severity: self
                .severity
                .as_deref()
                .and_then(Severity::parse)
                .unwrap_or_default(),
            issued_by: self
                .issued_by
                .unwrap_or_else(|| "Emergency Services".to_string()),
            issued_at: timestamp_from_value(&self.issued_at),
            active: self.active.unwrap_or(false),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportDocument {
    event_type: Option<String>,
    description: Option<String>,
    user_name: Option<String>,
    user_email: Option<String>,
    location: Option<WireLocation>,
    #[serde(default)]
    created_at: Value,
    #[serde(default)]
    approved_at: Value,
    #[serde(default)]
    updated_at: Value,
    status: Option<String>,
    severity: Option<String>,
    alert_issued: Option<bool>,
}

impl ReportDocument {
    fn into_record(self, id: String) -> Option<ReportRecord> {
        let status = match self.status.as_deref() {
            Some(s) => ReportStatus::parse(s)?,
            None => ReportStatus::New,
        };
        // Reports approved before approvedAt existed only carry updatedAt.
        let approved_at = timestamp_from_value(&self.approved_at)
            .or_else(|| timestamp_from_value(&self.updated_at));

        Some(ReportRecord {
            id,
            event_type: self.event_type.unwrap_or_else(|| "other".to_string()),
            description: self.description.unwrap_or_default(),
            user_name: self.user_name.unwrap_or_default(),
            user_email: self.user_email.unwrap_or_default(),
            location: self.location.as_ref().and_then(WireLocation::point),
            created_at: timestamp_from_value(&self.created_at),
            approved_at,
            status,
            severity: self
                .severity
                .as_deref()
                .and_then(Severity::parse)
                .unwrap_or_default(),
            alert_issued: self.alert_issued.unwrap_or(false),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationDocument {
    #[serde(rename = "type")]
    kind: Option<String>,
    title: Option<String>,
    message: Option<String>,
    priority: Option<String>,
    #[serde(default)]
    target_roles: Vec<String>,
    #[serde(default)]
    timestamp: Value,
    read: Option<bool>,
    location: Option<WireLocation>,
    location_error: Option<String>,
}

impl NotificationDocument {
    fn into_record(self, id: String) -> Option<Notification> {
        Some(Notification {
            id,
            kind: self.kind.unwrap_or_else(|| "GENERAL".to_string()),
            title: self.title.unwrap_or_else(|| "Notification".to_string()),
            message: self.message.unwrap_or_default(),
            priority: self
                .priority
                .as_deref()
                .and_then(Severity::parse)
                .unwrap_or_default(),
            target_roles: self
                .target_roles
                .iter()
                .filter_map(|r| Role::parse(r))
                .collect(),
            timestamp: timestamp_from_value(&self.timestamp),
            read: self.read.unwrap_or(false),
            location: self.location.as_ref().and_then(WireLocation::point),
            location_error: self.location_error,
        })
    }
}

pub fn alerts_from_documents(documents: Vec<Document>) -> Vec<AlertRecord> {
    decode_documents::<AlertDocument, _, _>(documents, "alert", AlertDocument::into_record)
}

pub fn reports_from_documents(documents: Vec<Document>) -> Vec<ReportRecord> {
    decode_documents::<ReportDocument, _, _>(documents, "report", ReportDocument::into_record)
}

pub fn notifications_from_documents(documents: Vec<Document>) -> Vec<Notification> {
    decode_documents::<NotificationDocument, _, _>(
        documents,
        "notification",
        NotificationDocument::into_record,
    )
}

/// Decodes each document on its own; a corrupt one is logged and dropped.
fn decode_documents<T, R, F>(documents: Vec<Document>, collection: &str, convert: F) -> Vec<R>
where
    T: DeserializeOwned,
    F: Fn(T, String) -> Option<R>,
{
    documents
        .into_iter()
        .filter_map(|doc| {
            if doc.id.trim().is_empty() {
                warn!("Skipping {} document without id", collection);
                return None;
            }
            let parsed = match serde_json::from_value::<T>(doc.data) {
                Ok(p) => p,
                Err(e) => {
                    warn!("Skipping malformed {} document {}: {}", collection, doc.id, e);
                    return None;
                }
            };
            let record = convert(parsed, doc.id.clone());
            if record.is_none() {
                warn!("Skipping incomplete {} document {}", collection, doc.id);
            }
            record
        })
        .collect()
}

/// Accepts RFC 3339 strings, epoch milliseconds, and `{seconds, nanoseconds}`
/// objects. Anything else yields `None`.
pub fn timestamp_from_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        Value::Object(map) => {
            let seconds = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))?
                .as_i64()?;
            let nanos = map
                .get("nanoseconds")
                .or_else(|| map.get("_nanoseconds"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            Utc.timestamp_opt(seconds, u32::try_from(nanos).ok()?).single()
        }
        _ => None,
    }
}

fn parse_f64_option<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrFloat {
        String(String),
        Float(f64),
    }

    let v: Option<StringOrFloat> = Option::deserialize(deserializer)?;
    match v {
        Some(StringOrFloat::Float(f)) => Ok(Some(f)),
        Some(StringOrFloat::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                Ok(None)
            } else {
                s.parse::<f64>().map(Some).map_err(serde::de::Error::custom)
            }
        }
        None => Ok(None),
    }
}
