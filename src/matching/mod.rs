//! Donor matching for new blood requests.

use crate::compat::{compatible_donors, is_compatible};
use crate::db::Repository;
use crate::errors::AppError;
use crate::geo::haversine_km;
use crate::models::{AvailabilityStatus, BloodType, Donor, GeoPoint};

/// A donor selected for a request, with their distance from it.
#[derive(Debug, Clone)]
pub struct MatchedDonor {
    pub donor: Donor,
    pub distance_km: f64,
}

/// Apply the exact match predicates to pre-filtered candidates, nearest first.
pub fn select_matches(
    candidates: Vec<Donor>,
    recipient: BloodType,
    origin: GeoPoint,
    radius_km: f64,
    exclude_user: Option<&str>,
) -> Vec<MatchedDonor> {
    let mut matches: Vec<MatchedDonor> = candidates
        .into_iter()
        .filter(|d| is_compatible(d.blood_type, recipient))
        .filter(|d| d.is_active && d.availability_status == AvailabilityStatus::Available)
        .filter(|d| exclude_user != Some(d.user_id.as_str()))
        .filter_map(|donor| {
            let distance_km = haversine_km(origin, donor.location.as_ref()?.point());
            (distance_km <= radius_km).then_some(MatchedDonor { donor, distance_km })
        })
        .collect();

    matches.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    matches
}

/// Compatible, available donors within `radius_km` of `origin`.
pub async fn find_matching_donors(
    repo: &Repository,
    recipient: BloodType,
    origin: GeoPoint,
    radius_km: f64,
    exclude_user: Option<&str>,
) -> Result<Vec<MatchedDonor>, AppError> {
    let types: Vec<BloodType> = compatible_donors(recipient).into_iter().collect();
    let candidates = repo.find_donor_candidates(&types, origin, radius_km).await?;
    let found = candidates.len();

    let matches = select_matches(candidates, recipient, origin, radius_km, exclude_user);
    tracing::debug!(
        blood_type = %recipient,
        candidates = found,
        matched = matches.len(),
        "Donor matching complete"
    );
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;

    use crate::models::{Address, Location};

    fn donor(user_id: &str, blood_type: BloodType, point: Option<GeoPoint>) -> Donor {
        let now = Utc::now();
        Donor {
            id: format!("donor-{}", user_id),
            user_id: user_id.to_string(),
            blood_type,
            age: 30,
            address: Address::default(),
            location: point.map(Location::from),
            last_donation: None,
            emergency_available: false,
            is_available: true,
            availability_status: AvailabilityStatus::Available,
            medical_conditions: vec![],
            donation_history: vec![],
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    const ORIGIN: GeoPoint = GeoPoint {
        latitude: 40.0,
        longitude: -74.0,
    };

    #[test]
    fn test_incompatible_excluded_regardless_of_distance() {
        let candidates = vec![
            donor("b-neg-at-origin", BloodType::BNegative, Some(ORIGIN)),
            donor("o-neg-nearby", BloodType::ONegative, Some(GeoPoint::new(40.1, -74.0))),
        ];
        let matches = select_matches(candidates, BloodType::APositive, ORIGIN, 30.0, None);

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].donor.user_id, "o-neg-nearby");
    }

    #[test]
    fn test_radius_cooldown_and_requester_excluded() {
        let mut cooling = donor("cooling", BloodType::APositive, Some(ORIGIN));
        cooling.availability_status = AvailabilityStatus::Cooldown;
        let mut inactive = donor("inactive", BloodType::APositive, Some(ORIGIN));
        inactive.is_active = false;

        let candidates = vec![
            donor("far", BloodType::APositive, Some(GeoPoint::new(41.0, -74.0))),
            donor("unplaced", BloodType::APositive, None),
            donor("requester", BloodType::APositive, Some(ORIGIN)),
            cooling,
            inactive,
        ];
        let matches = select_matches(
            candidates,
            BloodType::APositive,
            ORIGIN,
            30.0,
            Some("requester"),
        );
        assert!(matches.is_empty());
    }

    #[test]
    fn test_sorted_by_distance() {
        let candidates = vec![
            donor("mid", BloodType::OPositive, Some(GeoPoint::new(40.1, -74.0))),
            donor("near", BloodType::APositive, Some(GeoPoint::new(40.01, -74.0))),
            donor("edge", BloodType::ONegative, Some(GeoPoint::new(40.2, -74.0))),
        ];
        let matches = select_matches(candidates, BloodType::APositive, ORIGIN, 30.0, None);
        let users: Vec<_> = matches.iter().map(|m| m.donor.user_id.as_str()).collect();
        assert_eq!(users, vec!["near", "mid", "edge"]);
        assert!(matches[0].distance_km < 2.0);
    }
}
