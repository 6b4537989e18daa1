use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use crate::geo::GeoPoint;
use crate::models::notification::Role;

use super::report_filter::ReportQuery;
use super::triage::{TriageQuery, TriageView};

/// Per-user state for one client session. Dropped on logout or when idle.
#[derive(Debug, Clone)]
pub struct UserSession {
    pub user_id: String,
    pub role: Role,
    pub query: ReportQuery,
    pub triage_query: TriageQuery,
    location: Option<GeoPoint>,
    dismissed: HashSet<String>,
    delivered: HashSet<String>,
    last_feed: Option<Vec<String>>,
    last_triage: Option<TriageView>,
    last_unread: Option<(usize, usize)>,
    last_seen: DateTime<Utc>,
}

impl UserSession {
    pub fn new(user_id: impl Into<String>, role: Role, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            query: ReportQuery::default(),
            triage_query: TriageQuery::default(),
            location: None,
            dismissed: HashSet::new(),
            delivered: HashSet::new(),
            last_feed: None,
            last_triage: None,
            last_unread: None,
            last_seen: now,
        }
    }

    pub fn location(&self) -> Option<GeoPoint> {
        self.location
    }

    /// A valid fix replaces the cached position; a failed one falls back to it.
    pub fn apply_fix(&mut self, fix: Option<GeoPoint>) -> Option<GeoPoint> {
        if let Some(p) = fix.filter(GeoPoint::is_valid) {
            self.location = Some(p);
        }
        self.location
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_seen {
            self.last_seen = now;
        }
    }

    pub fn is_idle(&self, now: DateTime<Utc>, idle: Duration) -> bool {
        now.signed_duration_since(self.last_seen) > idle
    }

    pub fn dismissed(&self) -> &HashSet<String> {
        &self.dismissed
    }

    pub fn dismiss(&mut self, alert_id: &str) -> bool {
        self.dismissed.insert(alert_id.to_string())
    }

    /// True the first time an alert is handed to this session.
    pub fn mark_delivered(&mut self, alert_id: &str) -> bool {
        self.delivered.insert(alert_id.to_string())
    }

    pub fn is_delivered(&self, alert_id: &str) -> bool {
        self.delivered.contains(alert_id)
    }

    /// Undoes a delivery whose write never committed.
    pub fn forget_delivery(&mut self, alert_id: &str) -> bool {
        self.delivered.remove(alert_id)
    }

    pub fn retain_delivered<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.delivered.retain(|id| keep(id));
    }

    /// Records the analyst feed and reports whether it differs from the last one.
    pub fn update_feed(&mut self, report_ids: &[String]) -> bool {
        if self.last_feed.as_deref() == Some(report_ids) {
            return false;
        }
        self.last_feed = Some(report_ids.to_vec());
        true
    }

    pub fn update_triage(&mut self, view: &TriageView) -> bool {
        if self.last_triage.as_ref() == Some(view) {
            return false;
        }
        self.last_triage = Some(view.clone());
        true
    }

    pub fn update_unread(&mut self, total: usize, unread: usize) -> bool {
        if self.last_unread == Some((total, unread)) {
            return false;
        }
        self.last_unread = Some((total, unread));
        true
    }

    /// Forgets what was last published so the next evaluation emits it again.
    pub fn reset_published(&mut self) {
        self.last_feed = None;
        self.last_triage = None;
        self.last_unread = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::triage::StatusCounts;

    #[test]
    fn test_failed_fix_keeps_cached_location() {
        let mut s = UserSession::new("u1", Role::Citizen, Utc::now());
        assert_eq!(s.apply_fix(None), None);

        let home = GeoPoint::new(15.4909, 73.8278);
        assert_eq!(s.apply_fix(Some(home)), Some(home));
        assert_eq!(s.apply_fix(None), Some(home));
        assert_eq!(s.apply_fix(Some(GeoPoint::new(f64::NAN, 1.0))), Some(home));
    }

    #[test]
    fn test_dismiss_and_deliver_are_idempotent() {
        let mut s = UserSession::new("u1", Role::Citizen, Utc::now());
        assert!(s.dismiss("a1"));
        assert!(!s.dismiss("a1"));
        assert!(s.dismissed().contains("a1"));
        assert!(s.mark_delivered("a2"));
        assert!(!s.mark_delivered("a2"));

        assert!(s.forget_delivery("a2"));
        assert!(s.mark_delivered("a2"));
    }

    #[test]
    fn test_retain_delivered() {
        let mut s = UserSession::new("u1", Role::Citizen, Utc::now());
        s.mark_delivered("live");
        s.mark_delivered("retired");
        s.retain_delivered(|id| id == "live");
        assert!(s.is_delivered("live"));
        assert!(!s.is_delivered("retired"));
    }

    #[test]
    fn test_feed_change_detection() {
        let mut s = UserSession::new("u2", Role::Analyst, Utc::now());
        let ids = vec!["r1".to_string()];
        assert!(s.update_feed(&ids));
        assert!(!s.update_feed(&ids));
        assert!(s.update_feed(&[]));

        assert!(s.update_unread(3, 1));
        assert!(!s.update_unread(3, 1));

        let view = TriageView {
            report_ids: ids.clone(),
            counts: StatusCounts::default(),
        };
        assert!(s.update_triage(&view));
        assert!(!s.update_triage(&view));

        s.reset_published();
        assert!(s.update_feed(&[]));
        assert!(s.update_unread(3, 1));
        assert!(s.update_triage(&view));
    }

    #[test]
    fn test_idle_detection() {
        let start = Utc::now();
        let mut s = UserSession::new("u3", Role::Citizen, start);
        let idle = Duration::hours(24);
        assert!(!s.is_idle(start + Duration::hours(24), idle));
        assert!(s.is_idle(start + Duration::hours(25), idle));

        s.touch(start + Duration::hours(20));
        assert!(!s.is_idle(start + Duration::hours(25), idle));
        // An older timestamp never rewinds activity.
        s.touch(start);
        assert!(!s.is_idle(start + Duration::hours(25), idle));
    }
}
