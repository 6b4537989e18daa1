use std::collections::HashSet;

use crate::geo::{distance_km, is_within_radius, GeoPoint};
use crate::models::alert::AlertRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct MatchedAlert<'a> {
    pub alert: &'a AlertRecord,
    pub distance_km: f64,
}

/// Active alerts whose radius covers `user_location`, newest first.
///
/// Without a location nothing matches; that is the normal state for a user
/// who denied geolocation and has no cached position.
pub fn match_alerts(user_location: Option<GeoPoint>, alerts: &[AlertRecord]) -> Vec<MatchedAlert<'_>> {
    let user = match user_location {
        Some(p) if p.is_valid() => p,
        _ => return Vec::new(),
    };

    let mut matched: Vec<MatchedAlert<'_>> = alerts
        .iter()
        .filter(|a| a.active)
        .filter(|a| a.radius_km.is_finite() && a.radius_km > 0.0)
        .filter(|a| is_within_radius(&a.location, &user, a.radius_km))
        .map(|a| MatchedAlert {
            alert: a,
            distance_km: distance_km(&a.location, &user),
        })
        .collect();

    // None sorts before Some, so undated alerts end up last.
    matched.sort_by(|a, b| b.alert.issued_at.cmp(&a.alert.issued_at));
    matched
}

pub fn visible_alerts<'a>(
    matched: Vec<MatchedAlert<'a>>,
    dismissed: &HashSet<String>,
) -> Vec<MatchedAlert<'a>> {
    matched
        .into_iter()
        .filter(|m| !dismissed.contains(&m.alert.id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::alert::Severity;
    use chrono::{Duration, Utc};

    fn alert(id: &str, lat: f64, lng: f64, radius_km: f64, age_minutes: i64) -> AlertRecord {
        AlertRecord {
            id: id.to_string(),
            title: "Storm surge".to_string(),
            message: String::new(),
            alert_type: "warning".to_string(),
            location: GeoPoint::new(lat, lng),
            radius_km,
            severity: Severity::High,
            issued_by: "analyst@corsair.test".to_string(),
            issued_at: Some(Utc::now() - Duration::minutes(age_minutes)),
            active: true,
        }
    }

    const MARINA: GeoPoint = GeoPoint {
        lat: 25.2048,
        lng: 55.2708,
    };

    #[test]
    fn test_no_location_matches_nothing() {
        let alerts = vec![alert("a", 25.2048, 55.2708, 15.0, 1)];
        assert!(match_alerts(None, &alerts).is_empty());
    }

    #[test]
    fn test_inactive_alert_is_excluded_even_in_range() {
        let mut a = alert("a", 25.1972, 55.2744, 15.0, 1);
        a.active = false;
        assert!(match_alerts(Some(MARINA), &[a]).is_empty());
    }

    #[test]
    fn test_radius_and_order() {
        let alerts = vec![
            alert("old-near", 25.1972, 55.2744, 15.0, 60),
            alert("far", 24.4539, 54.3773, 15.0, 5),
            alert("new-near", 25.2100, 55.2800, 5.0, 1),
            alert("zero-radius", 25.2048, 55.2708, 0.0, 1),
        ];
        let matched = match_alerts(Some(MARINA), &alerts);
        let ids: Vec<&str> = matched.iter().map(|m| m.alert.id.as_str()).collect();
        assert_eq!(ids, vec!["new-near", "old-near"]);
        assert!(matched[1].distance_km < 1.0);
    }

    #[test]
    fn test_corrupt_alert_location_is_skipped() {
        let alerts = vec![
            alert("nan", f64::NAN, 55.2708, 15.0, 1),
            alert("ok", 25.1972, 55.2744, 15.0, 2),
        ];
        let matched = match_alerts(Some(MARINA), &alerts);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].alert.id, "ok");
    }

    #[test]
    fn test_dismissed_alerts_are_hidden() {
        let alerts = vec![
            alert("a", 25.1972, 55.2744, 15.0, 1),
            alert("b", 25.2000, 55.2700, 15.0, 2),
        ];
        let dismissed: HashSet<String> = ["a".to_string()].into_iter().collect();
        let visible = visible_alerts(match_alerts(Some(MARINA), &alerts), &dismissed);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].alert.id, "b");
    }
}
