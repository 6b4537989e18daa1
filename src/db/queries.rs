pub const INSERT_ALERT_DELIVERY: &str = r#"
INSERT INTO alert_deliveries (delivery_id, alert_id, user_id, severity, distance_km, delivered_at)
VALUES ($1, $2, $3, $4, $5, $6)
ON CONFLICT (alert_id, user_id) DO NOTHING;
"#;

pub const UPSERT_ALERT_DISMISSAL: &str = r#"
INSERT INTO alert_dismissals (alert_id, user_id, dismissed_at)
VALUES ($1, $2, $3)
ON CONFLICT (alert_id, user_id) DO UPDATE
SET dismissed_at = EXCLUDED.dismissed_at;
"#;

pub const INSERT_EMERGENCY_ALERT: &str = r#"
INSERT INTO emergency_alerts (
    alert_id, report_id, title, message, alert_type, severity, lat, lng, radius_km, issued_by, issued_at, active
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
ON CONFLICT (alert_id) DO NOTHING;
"#;

pub const UPDATE_REPORT_ALERT_ISSUED: &str = r#"
UPDATE reports
SET alert_issued = true,
    alert_issued_at = $2,
    alert_issued_by = $3
WHERE report_id = $1;
"#;

pub const UPDATE_REPORT_STATUS: &str = r#"
UPDATE reports
SET status = $2,
    updated_by = $3,
    updated_at = $4,
    approved_at = COALESCE($5, approved_at)
WHERE report_id = $1;
"#;

pub const INSERT_NOTIFICATION: &str = r#"
INSERT INTO notifications (
    notification_id, kind, title, message, priority, target_roles, timestamp, read, lat, lng, location_error
) VALUES ($1, $2, $3, $4, $5, $6, $7, false, $8, $9, $10)
ON CONFLICT (notification_id) DO NOTHING;
"#;

pub const MARK_NOTIFICATION_READ: &str = r#"
UPDATE notifications
SET read = true,
    read_at = $2
WHERE notification_id = $1;
"#;

pub const DELETE_NOTIFICATIONS: &str = r#"
DELETE FROM notifications WHERE notification_id = ANY($1);
"#;

pub const UPSERT_ANALYST_FEED: &str = r#"
INSERT INTO analyst_feeds (user_id, report_ids, refreshed_at)
VALUES ($1, $2, $3)
ON CONFLICT (user_id) DO UPDATE
SET report_ids = EXCLUDED.report_ids,
    refreshed_at = EXCLUDED.refreshed_at;
"#;

pub const UPSERT_TRIAGE_FEED: &str = r#"
INSERT INTO triage_feeds (user_id, report_ids, total, pending, reviewing, approved, rejected, refreshed_at)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
ON CONFLICT (user_id) DO UPDATE
SET report_ids = EXCLUDED.report_ids,
    total = EXCLUDED.total,
    pending = EXCLUDED.pending,
    reviewing = EXCLUDED.reviewing,
    approved = EXCLUDED.approved,
    rejected = EXCLUDED.rejected,
    refreshed_at = EXCLUDED.refreshed_at;
"#;

pub const UPSERT_NOTIFICATION_BADGE: &str = r#"
INSERT INTO notification_badges (user_id, role, total, unread, updated_at)
VALUES ($1, $2, $3, $4, $5)
ON CONFLICT (user_id) DO UPDATE
SET role = EXCLUDED.role,
    total = EXCLUDED.total,
    unread = EXCLUDED.unread,
    updated_at = EXCLUDED.updated_at;
"#;
