use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::alert_matcher::{match_alerts, visible_alerts};
use super::issuer::{issue_alert, AlertRequest};
use super::notifications::{feed_for_role, sos_notification, stale_for_role_at, unread_count};
use super::report_filter::{filter_reports_at, refine, ReportQuery};
use super::session::UserSession;
use super::triage::{transition, triage_view_at, StatusCounts, TriageQuery};
use crate::geo::GeoPoint;
use crate::models::alert::{AlertRecord, Severity};
use crate::models::message::{
    alerts_from_documents, notifications_from_documents, reports_from_documents, FeedEvent,
};
use crate::models::notification::{Notification, Role};
use crate::models::report::{ReportRecord, ReportStatus};

pub const DEFAULT_SESSION_IDLE_HOURS: i64 = 24;

/// Writes the persistence layer has to carry out after an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    DeliverAlert {
        user_id: String,
        alert_id: String,
        severity: Severity,
        distance_km: f64,
        delivered_at: DateTime<Utc>,
    },
    RecordDismissal {
        alert_id: String,
        user_id: String,
        dismissed_at: DateTime<Utc>,
    },
    PublishAlert {
        report_id: String,
        alert: AlertRecord,
    },
    UpdateReportStatus {
        report_id: String,
        status: ReportStatus,
        reviewer: Option<String>,
        updated_at: DateTime<Utc>,
        approved_at: Option<DateTime<Utc>>,
    },
    PublishNotification(Notification),
    MarkNotificationRead {
        notification_id: String,
        read_at: DateTime<Utc>,
    },
    DeleteNotifications {
        notification_ids: Vec<String>,
    },
    RefreshAnalystFeed {
        user_id: String,
        report_ids: Vec<String>,
        refreshed_at: DateTime<Utc>,
    },
    RefreshTriageFeed {
        user_id: String,
        report_ids: Vec<String>,
        counts: StatusCounts,
        refreshed_at: DateTime<Utc>,
    },
    UpdateUnreadCount {
        user_id: String,
        role: Role,
        total: usize,
        unread: usize,
        updated_at: DateTime<Utc>,
    },
}

/// Latest snapshots plus the open sessions. Every event is reduced against
/// this state into a list of effects.
#[derive(Debug)]
pub struct FeedState {
    alerts: Vec<AlertRecord>,
    reports: Vec<ReportRecord>,
    notifications: Vec<Notification>,
    sessions: HashMap<String, UserSession>,
    retention_days: i64,
    session_idle: Duration,
}

impl FeedState {
    pub fn new(retention_days: i64) -> Self {
        Self {
            alerts: Vec::new(),
            reports: Vec::new(),
            notifications: Vec::new(),
            sessions: HashMap::new(),
            retention_days,
            session_idle: Duration::hours(DEFAULT_SESSION_IDLE_HOURS),
        }
    }

    /// Sessions without activity for longer than `hours` are dropped.
    pub fn with_session_idle_hours(mut self, hours: i64) -> Self {
        if let Some(idle) = Duration::try_hours(hours).filter(|d| *d > Duration::zero()) {
            self.session_idle = idle;
        }
        self
    }

    pub fn session(&self, user_id: &str) -> Option<&UserSession> {
        self.sessions.get(user_id)
    }

    pub fn apply(&mut self, event: FeedEvent) -> Vec<Effect> {
        self.apply_at(event, Utc::now())
    }

    pub fn apply_at(&mut self, event: FeedEvent, now: DateTime<Utc>) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.expire_idle(now);

        match event {
            FeedEvent::SessionStarted { user_id, role } => {
                let session = self
                    .sessions
                    .entry(user_id.clone())
                    .or_insert_with(|| UserSession::new(user_id.clone(), role, now));
                if session.role != role {
                    info!(
                        "Session for {} switched from {} to {}",
                        user_id,
                        session.role.as_str(),
                        role.as_str()
                    );
                    session.role = role;
                    session.reset_published();
                } else {
                    info!("Session started for {} as {}", user_id, role.as_str());
                }
                session.touch(now);
                evaluate(session, &self.alerts, &self.reports, now, &mut effects);
                refresh_unread(session, &self.notifications, now, &mut effects);
            }
            FeedEvent::SessionEnded { user_id } => {
                if self.sessions.remove(&user_id).is_some() {
                    info!("Session ended for {}", user_id);
                }
            }
            FeedEvent::LocationFix {
                user_id,
                lat,
                lng,
                error,
            } => {
                let Some(session) = self.sessions.get_mut(&user_id) else {
                    warn!("Location fix for unknown session {}, skipping", user_id);
                    return effects;
                };
                session.touch(now);
                if let Some(e) = error {
                    debug!("Location unavailable for {}: {}", user_id, e);
                }
                let fix = match (lat, lng) {
                    (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
                    _ => None,
                };
                if session.apply_fix(fix).is_none() {
                    debug!("No location for {}, proximity alerts suppressed", user_id);
                }
                evaluate(session, &self.alerts, &self.reports, now, &mut effects);
            }
            FeedEvent::AlertsSnapshot { documents } => {
                self.alerts = alerts_from_documents(documents);
                info!("Alerts snapshot: {} usable documents", self.alerts.len());
                // Deliveries of alerts that left the snapshot or went inactive are forgotten
                let live: HashSet<&str> = self
                    .alerts
                    .iter()
                    .filter(|a| a.active)
                    .map(|a| a.id.as_str())
                    .collect();
                for session in self.sessions.values_mut() {
                    session.retain_delivered(|id| live.contains(id));
                }
                self.evaluate_all(now, &mut effects);
            }
            FeedEvent::ReportsSnapshot { documents } => {
                self.reports = reports_from_documents(documents);
                info!("Reports snapshot: {} usable documents", self.reports.len());
                self.evaluate_all(now, &mut effects);
            }
            FeedEvent::NotificationsSnapshot { documents } => {
                self.notifications = notifications_from_documents(documents);
                info!(
                    "Notifications snapshot: {} usable documents",
                    self.notifications.len()
                );
                self.refresh_unread_all(now, &mut effects);
            }
            FeedEvent::AlertDismissed { user_id, alert_id } => {
                match self.sessions.get_mut(&user_id) {
                    Some(session) => {
                        session.touch(now);
                        session.dismiss(&alert_id);
                    }
                    None => debug!("Dismissal from {} without an open session", user_id),
                }
                effects.push(Effect::RecordDismissal {
                    alert_id,
                    user_id,
                    dismissed_at: now,
                });
            }
            FeedEvent::AlertIssued {
                report_id,
                issued_by,
                alert_type,
                severity,
                message,
                radius_km,
            } => {
                let Some(report) = self.reports.iter_mut().find(|r| r.id == report_id) else {
                    warn!("Alert issued for unknown report {}, skipping", report_id);
                    return effects;
                };
                let request = AlertRequest {
                    alert_type,
                    severity: severity.as_deref().and_then(Severity::parse),
                    message,
                    radius_km,
                    issued_by,
                };
                let alert = match issue_alert(report, request, now) {
                    Ok(a) => a,
                    Err(e) => {
                        warn!("Cannot issue alert: {}", e);
                        return effects;
                    }
                };
                report.alert_issued = true;
                info!(
                    "Issued alert {} for report {} ({} km)",
                    alert.id, report_id, alert.radius_km
                );
                self.alerts.push(alert.clone());
                effects.push(Effect::PublishAlert { report_id, alert });
                self.evaluate_all(now, &mut effects);
            }
            FeedEvent::ReportReviewed {
                report_id,
                status,
                reviewer,
            } => {
                let Some(next) = ReportStatus::parse(&status) else {
                    warn!("Unknown report status '{}' for {}", status, report_id);
                    return effects;
                };
                let Some(report) = self.reports.iter_mut().find(|r| r.id == report_id) else {
                    warn!("Review for unknown report {}, skipping", report_id);
                    return effects;
                };
                let next = match transition(report.status, next) {
                    Ok(s) => s,
                    Err(e) => {
                        warn!("Rejected review of {}: {}", report_id, e);
                        return effects;
                    }
                };
                report.status = next;
                let approved_at = (next == ReportStatus::Approved).then_some(now);
                if approved_at.is_some() {
                    report.approved_at = approved_at;
                }
                effects.push(Effect::UpdateReportStatus {
                    report_id,
                    status: next,
                    reviewer,
                    updated_at: now,
                    approved_at,
                });
                self.evaluate_all(now, &mut effects);
            }
            FeedEvent::SosRaised {
                user_id,
                user_name,
                user_email,
                lat,
                lng,
            } => {
                let location = match (lat, lng) {
                    (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
                    _ => None,
                };
                let notification =
                    sos_notification(user_name.as_deref(), user_email.as_deref(), location, now);
                warn!("SOS raised by {}: {}", user_id, notification.message);
                self.notifications.push(notification.clone());
                effects.push(Effect::PublishNotification(notification));
                self.refresh_unread_all(now, &mut effects);
            }
            FeedEvent::NotificationsPurge { role } => {
                let stale = stale_for_role_at(&self.notifications, role, self.retention_days, now);
                if stale.is_empty() {
                    info!(
                        "No {} notifications older than {} days",
                        role.as_str(),
                        self.retention_days
                    );
                    return effects;
                }
                info!("Clearing {} old {} notifications", stale.len(), role.as_str());
                self.notifications.retain(|n| !stale.contains(&n.id));
                effects.push(Effect::DeleteNotifications {
                    notification_ids: stale,
                });
                self.refresh_unread_all(now, &mut effects);
            }
            FeedEvent::NotificationRead { notification_id } => {
                if notification_id.trim().is_empty() {
                    warn!("Notification read without an id, skipping");
                    return effects;
                }
                if let Some(n) = self
                    .notifications
                    .iter_mut()
                    .find(|n| n.id == notification_id)
                {
                    n.read = true;
                }
                effects.push(Effect::MarkNotificationRead {
                    notification_id,
                    read_at: now,
                });
                self.refresh_unread_all(now, &mut effects);
            }
            FeedEvent::AnalystQuery {
                user_id,
                search,
                severity,
                alert_filter,
            } => {
                let Some(session) = self.sessions.get_mut(&user_id) else {
                    warn!("Analyst query for unknown session {}, skipping", user_id);
                    return effects;
                };
                session.touch(now);
                session.query = ReportQuery {
                    search,
                    severity: severity.as_deref().and_then(Severity::parse),
                    alert_issued: match alert_filter.as_deref() {
                        Some("issued") => Some(true),
                        Some("not_issued") | Some("not-issued") => Some(false),
                        _ => None,
                    },
                };
                evaluate(session, &self.alerts, &self.reports, now, &mut effects);
            }
            FeedEvent::OfficialQuery {
                user_id,
                search,
                status,
            } => {
                let Some(session) = self.sessions.get_mut(&user_id) else {
                    warn!("Official query for unknown session {}, skipping", user_id);
                    return effects;
                };
                session.touch(now);
                // "all" and unknown statuses clear the filter
                session.triage_query = TriageQuery {
                    search,
                    status: status.as_deref().and_then(ReportStatus::parse),
                };
                evaluate(session, &self.alerts, &self.reports, now, &mut effects);
            }
        }

        effects
    }

    /// Reverts the session bookkeeping behind effects whose write failed, so
    /// the next evaluation emits them again.
    pub fn rollback(&mut self, effects: &[Effect]) {
        for effect in effects {
            match effect {
                Effect::DeliverAlert {
                    user_id, alert_id, ..
                } => {
                    if let Some(session) = self.sessions.get_mut(user_id) {
                        session.forget_delivery(alert_id);
                    }
                }
                Effect::RefreshAnalystFeed { user_id, .. }
                | Effect::RefreshTriageFeed { user_id, .. }
                | Effect::UpdateUnreadCount { user_id, .. } => {
                    if let Some(session) = self.sessions.get_mut(user_id) {
                        session.reset_published();
                    }
                }
                _ => {}
            }
        }
    }

    fn expire_idle(&mut self, now: DateTime<Utc>) {
        let idle = self.session_idle;
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_idle(now, idle));
        let expired = before - self.sessions.len();
        if expired > 0 {
            info!("Expired {} idle sessions", expired);
        }
    }

    fn evaluate_all(&mut self, now: DateTime<Utc>, effects: &mut Vec<Effect>) {
        for session in self.sessions.values_mut() {
            evaluate(session, &self.alerts, &self.reports, now, effects);
        }
    }

    fn refresh_unread_all(&mut self, now: DateTime<Utc>, effects: &mut Vec<Effect>) {
        for session in self.sessions.values_mut() {
            refresh_unread(session, &self.notifications, now, effects);
        }
    }
}

/// Re-derives what one session should see from the current snapshots.
fn evaluate(
    session: &mut UserSession,
    alerts: &[AlertRecord],
    reports: &[ReportRecord],
    now: DateTime<Utc>,
    effects: &mut Vec<Effect>,
) {
    let matched = match_alerts(session.location(), alerts);
    for m in visible_alerts(matched, session.dismissed()) {
        if session.mark_delivered(&m.alert.id) {
            effects.push(Effect::DeliverAlert {
                user_id: session.user_id.clone(),
                alert_id: m.alert.id.clone(),
                severity: m.alert.severity,
                distance_km: m.distance_km,
                delivered_at: now,
            });
        }
    }

    match session.role {
        Role::Analyst => {
            let view = refine(filter_reports_at(reports, session.location(), now), &session.query);
            let report_ids: Vec<String> = view.iter().map(|r| r.id.clone()).collect();
            if session.update_feed(&report_ids) {
                effects.push(Effect::RefreshAnalystFeed {
                    user_id: session.user_id.clone(),
                    report_ids,
                    refreshed_at: now,
                });
            }
        }
        Role::Official => {
            let view = triage_view_at(reports, &session.triage_query, now);
            if session.update_triage(&view) {
                debug!("Triage counts for {}: {:?}", session.user_id, view.counts);
                effects.push(Effect::RefreshTriageFeed {
                    user_id: session.user_id.clone(),
                    report_ids: view.report_ids,
                    counts: view.counts,
                    refreshed_at: now,
                });
            }
        }
        Role::Citizen => {}
    }
}

fn refresh_unread(
    session: &mut UserSession,
    notifications: &[Notification],
    now: DateTime<Utc>,
    effects: &mut Vec<Effect>,
) {
    if !session.role.receives_notifications() {
        return;
    }
    let feed = feed_for_role(notifications, session.role);
    let unread = unread_count(&feed);
    if session.update_unread(feed.len(), unread) {
        effects.push(Effect::UpdateUnreadCount {
            user_id: session.user_id.clone(),
            role: session.role,
            total: feed.len(),
            unread,
            updated_at: now,
        });
    }
}
