use chrono::{DateTime, Utc};

use crate::geo::{is_within_radius, GeoPoint};
use crate::models::alert::Severity;
use crate::models::report::{ReportRecord, ReportStatus};
use crate::time_window::is_within_last_days_at;

pub const ANALYST_RADIUS_KM: f64 = 100.0;
pub const ANALYST_WINDOW_DAYS: i64 = 2;

/// Approved reports an analyst should review: approved within the last two
/// days and, when the analyst's position is known, within 100 km of it.
/// Newest approval first.
pub fn filter_reports(reports: &[ReportRecord], user_location: Option<GeoPoint>) -> Vec<&ReportRecord> {
    filter_reports_at(reports, user_location, Utc::now())
}

pub fn filter_reports_at(
    reports: &[ReportRecord],
    user_location: Option<GeoPoint>,
    now: DateTime<Utc>,
) -> Vec<&ReportRecord> {
    let mut filtered: Vec<&ReportRecord> = reports
        .iter()
        .filter(|r| r.status == ReportStatus::Approved)
        .filter(|r| match r.approved_at {
            Some(ts) => is_within_last_days_at(ts, ANALYST_WINDOW_DAYS, now),
            None => false,
        })
        .filter(|r| match user_location {
            // No position: radius check is skipped, not failed.
            None => true,
            Some(user) => r
                .location
                .map(|loc| is_within_radius(&loc, &user, ANALYST_RADIUS_KM))
                .unwrap_or(false),
        })
        .collect();

    filtered.sort_by(|a, b| b.approved_at.cmp(&a.approved_at));
    filtered
}

/// Dashboard refinements applied on top of the radius/time view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportQuery {
    pub search: Option<String>,
    pub severity: Option<Severity>,
    pub alert_issued: Option<bool>,
}

impl ReportQuery {
    pub fn matches(&self, report: &ReportRecord) -> bool {
        if let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let term = term.to_lowercase();
            let hit = report.description.to_lowercase().contains(&term)
                || report.event_type.to_lowercase().contains(&term)
                || report.user_name.to_lowercase().contains(&term);
            if !hit {
                return false;
            }
        }
        if let Some(severity) = self.severity {
            if report.severity != severity {
                return false;
            }
        }
        if let Some(issued) = self.alert_issued {
            if report.alert_issued != issued {
                return false;
            }
        }
        true
    }
}

pub fn refine<'a>(reports: Vec<&'a ReportRecord>, query: &ReportQuery) -> Vec<&'a ReportRecord> {
    reports.into_iter().filter(|r| query.matches(r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{distance_km, EARTH_RADIUS_KM};
    use chrono::Duration;

    const KOCHI: GeoPoint = GeoPoint {
        lat: 9.9312,
        lng: 76.2673,
    };

    /// A point `km` due north of Kochi.
    fn north_of_kochi(km: f64) -> GeoPoint {
        GeoPoint::new(KOCHI.lat + (km / EARTH_RADIUS_KM).to_degrees(), KOCHI.lng)
    }

    fn report(id: &str, location: GeoPoint, approved_at: Option<DateTime<Utc>>) -> ReportRecord {
        ReportRecord {
            id: id.to_string(),
            event_type: "high_waves".to_string(),
            description: "Waves crossing the sea wall".to_string(),
            user_name: "Anu".to_string(),
            user_email: "anu@example.com".to_string(),
            location: Some(location),
            created_at: approved_at,
            approved_at,
            status: ReportStatus::Approved,
            severity: Severity::Medium,
            alert_issued: false,
        }
    }

    #[test]
    fn test_radius_boundary() {
        let now = Utc::now();
        let reports = vec![
            report("edge", north_of_kochi(100.0 * (1.0 - 1e-12)), Some(now)),
            report("outside", north_of_kochi(100.01), Some(now)),
        ];
        let ids: Vec<&str> = filter_reports_at(&reports, Some(KOCHI), now)
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["edge"]);
    }

    #[test]
    fn test_exactly_100_km_is_included() {
        let analyst = GeoPoint::new(0.0, 0.0);
        // Walk the ulps around the analytic longitude until the computed
        // distance is exactly the radius.
        let start = (ANALYST_RADIUS_KM / EARTH_RADIUS_KM).to_degrees().to_bits();
        let lng = (start - 2_000..start + 2_000)
            .map(f64::from_bits)
            .find(|lng| distance_km(&analyst, &GeoPoint::new(0.0, *lng)) == ANALYST_RADIUS_KM)
            .expect("a longitude exactly 100 km east of the origin");

        let now = Utc::now();
        let reports = vec![report("edge", GeoPoint::new(0.0, lng), Some(now))];
        assert_eq!(filter_reports_at(&reports, Some(analyst), now).len(), 1);
    }

    #[test]
    fn test_window_boundary() {
        let now = Utc::now();
        let reports = vec![
            report("exact", KOCHI, Some(now - Duration::days(2))),
            report("late", KOCHI, Some(now - Duration::days(2) - Duration::minutes(1))),
            report("undated", KOCHI, None),
        ];
        let ids: Vec<&str> = filter_reports_at(&reports, Some(KOCHI), now)
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["exact"]);
    }

    #[test]
    fn test_unapproved_reports_never_returned() {
        let now = Utc::now();
        let mut reports = Vec::new();
        for status in [ReportStatus::New, ReportStatus::UnderReview, ReportStatus::Rejected] {
            let mut r = report(status.as_str(), KOCHI, Some(now));
            r.status = status;
            reports.push(r);
        }
        assert!(filter_reports_at(&reports, Some(KOCHI), now).is_empty());
        assert!(filter_reports_at(&reports, None, now).is_empty());
    }

    #[test]
    fn test_missing_location_skips_radius_only() {
        let now = Utc::now();
        let reports = vec![
            report("far", north_of_kochi(900.0), Some(now - Duration::hours(1))),
            report("stale", KOCHI, Some(now - Duration::days(3))),
            report("recent", KOCHI, Some(now)),
        ];
        let ids: Vec<&str> = filter_reports_at(&reports, None, now)
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["recent", "far"]);
    }

    #[test]
    fn test_report_without_location_excluded_when_radius_applies() {
        let now = Utc::now();
        let mut r = report("nowhere", KOCHI, Some(now));
        r.location = None;
        assert!(filter_reports_at(&[r.clone()], Some(KOCHI), now).is_empty());
        assert_eq!(filter_reports_at(&[r], None, now).len(), 1);
    }

    #[test]
    fn test_refinements() {
        let now = Utc::now();
        let mut flooded = report("flood", KOCHI, Some(now));
        flooded.event_type = "flooding".to_string();
        flooded.severity = Severity::Critical;
        flooded.alert_issued = true;
        let waves = report("waves", KOCHI, Some(now));
        let reports = vec![flooded, waves];
        let view = filter_reports_at(&reports, Some(KOCHI), now);

        let by_search = ReportQuery {
            search: Some("FLOOD".to_string()),
            ..Default::default()
        };
        assert_eq!(refine(view.clone(), &by_search).len(), 1);

        let not_issued = ReportQuery {
            alert_issued: Some(false),
            ..Default::default()
        };
        let refined = refine(view.clone(), &not_issued);
        assert_eq!(refined.len(), 1);
        assert_eq!(refined[0].id, "waves");

        let critical = ReportQuery {
            severity: Some(Severity::Critical),
            ..Default::default()
        };
        assert_eq!(refine(view, &critical)[0].id, "flood");
    }
}
