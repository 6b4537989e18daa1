use chrono::{DateTime, Duration, Utc};

/// True when `timestamp` falls inside the trailing `days` window ending now.
///
/// The clock is read on every call so a record slides out of the window as
/// soon as it crosses the cutoff.
pub fn is_within_last_days(timestamp: DateTime<Utc>, days: i64) -> bool {
    is_within_last_days_at(timestamp, days, Utc::now())
}

pub fn is_within_last_days_at(timestamp: DateTime<Utc>, days: i64, now: DateTime<Utc>) -> bool {
    timestamp >= now - Duration::days(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_inside() {
        assert!(is_within_last_days(Utc::now(), 2));
    }

    #[test]
    fn test_three_days_ago_is_outside() {
        assert!(!is_within_last_days(Utc::now() - Duration::days(3), 2));
    }

    #[test]
    fn test_just_inside_boundary() {
        let ts = Utc::now() - Duration::days(2) + Duration::seconds(1);
        assert!(is_within_last_days(ts, 2));
    }

    #[test]
    fn test_boundary_rolls_forward_with_clock() {
        let now = Utc::now();
        let approved = now - Duration::days(2);
        assert!(is_within_last_days_at(approved, 2, now));
        assert!(!is_within_last_days_at(approved, 2, now + Duration::seconds(1)));
    }
}
