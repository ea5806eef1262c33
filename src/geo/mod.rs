//! Distance math and address resolution.

mod geocoder;

pub use geocoder::*;

use crate::models::{Address, GeoPoint, Location};

/// Mean Earth radius used for great-circle distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points in kilometres.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Latitude/longitude rectangle enclosing a circle, used as a cheap SQL pre-filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn around(center: GeoPoint, radius_km: f64) -> Self {
        let d_lat = (radius_km / EARTH_RADIUS_KM).to_degrees();
        let min_lat = (center.latitude - d_lat).max(-90.0);
        let max_lat = (center.latitude + d_lat).min(90.0);

        // Near the poles the longitude span covers everything.
        let cos_lat = center.latitude.to_radians().cos();
        let (min_lng, max_lng) = if max_lat >= 90.0 || min_lat <= -90.0 || cos_lat < 1e-6 {
            (-180.0, 180.0)
        } else {
            let d_lng = (radius_km / (EARTH_RADIUS_KM * cos_lat)).to_degrees();
            if d_lng >= 180.0 {
                (-180.0, 180.0)
            } else {
                (center.longitude - d_lng, center.longitude + d_lng)
            }
        };

        Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        }
    }

    /// Whether the longitude range crosses the antimeridian.
    pub fn wraps(&self) -> bool {
        self.min_lng < -180.0 || self.max_lng > 180.0
    }
}

/// Settle where an entity is.
///
/// An explicit point wins. Otherwise the address is geocoded. Geocoder failures are logged and
/// leave the location empty so the caller's write still goes through.
pub async fn resolve_location(
    geocoder: &dyn Geocoder,
    explicit: Option<GeoPoint>,
    address: &Address,
) -> Option<Location> {
    if let Some(point) = explicit {
        return Some(point.into());
    }
    if address.is_blank() {
        return None;
    }

    let line = address.one_line();
    match geocoder.geocode(&line).await {
        Ok(Some(found)) => Some(found.into_location()),
        Ok(None) => {
            tracing::warn!("Geocoder found no match for {:?}", line);
            None
        }
        Err(e) => {
            tracing::warn!("Geocoding failed for {:?}: {}", line, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_distance() {
        // London to Paris is roughly 344 km.
        let london = GeoPoint::new(51.5074, -0.1278);
        let paris = GeoPoint::new(48.8566, 2.3522);
        let d = haversine_km(london, paris);
        assert!((d - 343.5).abs() < 2.0, "got {}", d);
        assert_eq!(haversine_km(london, london), 0.0);
    }

    #[test]
    fn test_bounding_box_contains_radius() {
        let center = GeoPoint::new(40.0, -74.0);
        let bbox = BoundingBox::around(center, 30.0);
        assert!(bbox.min_lat < 40.0 && bbox.max_lat > 40.0);
        // A point 29 km due north is inside the box.
        let north = GeoPoint::new(40.0 + (29.0 / EARTH_RADIUS_KM).to_degrees(), -74.0);
        assert!(north.latitude <= bbox.max_lat);
        assert!(!bbox.wraps());
    }

    #[test]
    fn test_bounding_box_near_antimeridian() {
        let bbox = BoundingBox::around(GeoPoint::new(0.0, 179.9), 50.0);
        assert!(bbox.wraps());
    }

    #[test]
    fn test_bounding_box_at_pole() {
        let bbox = BoundingBox::around(GeoPoint::new(89.9, 10.0), 50.0);
        assert_eq!((bbox.min_lng, bbox.max_lng), (-180.0, 180.0));
    }

    #[tokio::test]
    async fn test_resolve_location_prefers_explicit_point() {
        let geocoder = StaticGeocoder::default();
        let address = Address {
            address: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            zipcode: "62701".to_string(),
        };
        let loc = resolve_location(&geocoder, Some(GeoPoint::new(1.0, 2.0)), &address)
            .await
            .unwrap();
        assert_eq!(loc.point(), GeoPoint::new(1.0, 2.0));
    }

    #[tokio::test]
    async fn test_resolve_location_swallows_failures() {
        let geocoder = StaticGeocoder::failing();
        let address = Address {
            address: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            zipcode: "62701".to_string(),
        };
        assert!(resolve_location(&geocoder, None, &address).await.is_none());
    }

    #[tokio::test]
    async fn test_resolve_location_uses_geocoder() {
        let address = Address {
            address: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            zipcode: "62701".to_string(),
        };
        let geocoder =
            StaticGeocoder::default().with_entry(&address.one_line(), GeoPoint::new(39.8, -89.6));
        let loc = resolve_location(&geocoder, None, &address).await.unwrap();
        assert_eq!(loc.point(), GeoPoint::new(39.8, -89.6));
        assert!(loc.formatted_address.is_some());
    }
}
