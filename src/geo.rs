use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Error, Debug, PartialEq)]
pub enum CoordinateError {
    #[error("latitude out of range: {0}")]
    Latitude(f64),
    #[error("longitude out of range: {0}")]
    Longitude(f64),
}

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn try_new(lat: f64, lng: f64) -> Result<Self, CoordinateError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::Latitude(lat));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(CoordinateError::Longitude(lng));
        }
        Ok(Self { lat, lng })
    }

    pub fn is_valid(&self) -> bool {
        Self::try_new(self.lat, self.lng).is_ok()
    }
}

/// Great-circle distance in kilometres (Haversine).
pub fn distance_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    // Rounding can push h slightly outside [0, 1] near antipodes.
    let h = h.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Inclusive radius check. Invalid points are never inside.
pub fn is_within_radius(center: &GeoPoint, point: &GeoPoint, radius_km: f64) -> bool {
    if !center.is_valid() || !point.is_valid() || radius_km.is_nan() {
        return false;
    }
    distance_km(center, point) <= radius_km
}
