use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::geo::GeoPoint;
use crate::models::alert::Severity;
use crate::models::notification::{Notification, Role};

pub const DEFAULT_RETENTION_DAYS: i64 = 5;
pub const MAX_RETENTION_DAYS: i64 = 3650;
pub const SOS_KIND: &str = "SOS_EMERGENCY";

/// Notifications addressed to `role`, newest first.
pub fn feed_for_role(notifications: &[Notification], role: Role) -> Vec<&Notification> {
    if !role.receives_notifications() {
        return Vec::new();
    }
    let mut feed: Vec<&Notification> = notifications
        .iter()
        .filter(|n| n.target_roles.contains(&role))
        .collect();
    feed.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    feed
}

pub fn unread_count(feed: &[&Notification]) -> usize {
    feed.iter().filter(|n| !n.read).count()
}

/// Ids of the role's notifications older than the retention window.
/// Undated notifications are kept, and a window that is not positive or does
/// not fit the clock selects nothing.
pub fn stale_for_role_at(
    notifications: &[Notification],
    role: Role,
    retention_days: i64,
    now: DateTime<Utc>,
) -> Vec<String> {
    if retention_days <= 0 {
        return Vec::new();
    }
    let Some(cutoff) = Duration::try_days(retention_days).and_then(|w| now.checked_sub_signed(w))
    else {
        return Vec::new();
    };
    notifications
        .iter()
        .filter(|n| n.target_roles.contains(&role))
        .filter(|n| matches!(n.timestamp, Some(ts) if ts < cutoff))
        .map(|n| n.id.clone())
        .collect()
}

pub fn sos_notification(
    user_name: Option<&str>,
    user_email: Option<&str>,
    location: Option<GeoPoint>,
    now: DateTime<Utc>,
) -> Notification {
    let name = user_name.filter(|s| !s.trim().is_empty()).unwrap_or("Unknown User");
    let email = user_email.unwrap_or("no email");
    let location = location.filter(GeoPoint::is_valid);

    let (message, location_error) = match location {
        Some(p) => (
            format!(
                "Emergency SOS triggered by {} ({}) at coordinates {:.4}, {:.4}",
                name, email, p.lat, p.lng
            ),
            None,
        ),
        None => (
            format!(
                "Emergency SOS triggered by {} ({}) - Location unavailable",
                name, email
            ),
            Some("Unable to get location".to_string()),
        ),
    };

    Notification {
        id: Uuid::new_v4().to_string(),
        kind: SOS_KIND.to_string(),
        title: "CRITICAL: Emergency SOS Activated".to_string(),
        message,
        priority: Severity::Critical,
        target_roles: vec![Role::Analyst, Role::Official],
        timestamp: Some(now),
        read: false,
        location,
        location_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(id: &str, roles: Vec<Role>, age_days: i64, read: bool) -> Notification {
        Notification {
            id: id.to_string(),
            kind: "REPORT".to_string(),
            title: id.to_string(),
            message: String::new(),
            priority: Severity::Medium,
            target_roles: roles,
            timestamp: Some(Utc::now() - Duration::days(age_days)),
            read,
            location: None,
            location_error: None,
        }
    }

    #[test]
    fn test_feed_is_role_targeted_and_sorted() {
        let all = vec![
            notification("old", vec![Role::Analyst], 3, true),
            notification("official-only", vec![Role::Official], 0, false),
            notification("new", vec![Role::Analyst, Role::Official], 1, false),
        ];
        let feed = feed_for_role(&all, Role::Analyst);
        let ids: Vec<&str> = feed.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);
        assert_eq!(unread_count(&feed), 1);
    }

    #[test]
    fn test_citizens_get_no_feed() {
        let all = vec![notification("n", vec![Role::Citizen, Role::Analyst], 0, false)];
        assert!(feed_for_role(&all, Role::Citizen).is_empty());
    }

    #[test]
    fn test_stale_selection() {
        let now = Utc::now();
        let mut undated = notification("undated", vec![Role::Official], 0, false);
        undated.timestamp = None;
        let all = vec![
            notification("six-days", vec![Role::Official], 6, false),
            notification("four-days", vec![Role::Official], 4, false),
            notification("analyst-six-days", vec![Role::Analyst], 6, false),
            undated,
        ];
        assert_eq!(
            stale_for_role_at(&all, Role::Official, DEFAULT_RETENTION_DAYS, now),
            vec!["six-days".to_string()]
        );
    }

    #[test]
    fn test_sos_with_and_without_location() {
        let now = Utc::now();
        let located = sos_notification(
            Some("Ravi"),
            Some("ravi@example.com"),
            Some(GeoPoint::new(13.0827, 80.2707)),
            now,
        );
        assert_eq!(located.priority, Severity::Critical);
        assert_eq!(located.target_roles, vec![Role::Analyst, Role::Official]);
        assert!(located.message.ends_with("at coordinates 13.0827, 80.2707"));
        assert!(located.location_error.is_none());

        let blind = sos_notification(None, None, None, now);
        assert!(blind.message.contains("Unknown User"));
        assert!(blind.message.ends_with("Location unavailable"));
        assert_eq!(blind.location_error.as_deref(), Some("Unable to get location"));
    }

    #[test]
    fn test_bad_retention_selects_nothing() {
        let now = Utc::now();
        let mut sos = sos_notification(Some("Ravi"), None, None, now);
        sos.timestamp = Some(now - Duration::minutes(1));
        let all = vec![sos, notification("month-old", vec![Role::Official], 30, false)];

        assert!(stale_for_role_at(&all, Role::Official, -1, now).is_empty());
        assert!(stale_for_role_at(&all, Role::Official, 0, now).is_empty());
        assert!(stale_for_role_at(&all, Role::Official, i64::MAX / 1000, now).is_empty());
        assert!(stale_for_role_at(&all, Role::Official, i64::MAX, now).is_empty());
        assert_eq!(
            stale_for_role_at(&all, Role::Official, MAX_RETENTION_DAYS, now),
            Vec::<String>::new()
        );
        assert_eq!(
            stale_for_role_at(&all, Role::Official, 7, now),
            vec!["month-old".to_string()]
        );
    }
}
