//! Donor API endpoints.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::Utc;

use super::{blood_type_field, point_field, query_point, radius_field, success, ApiResult};
use crate::auth::{ensure, Action, Actor, Resource};
use crate::compat::compatible_donors;
use crate::db::DonorFilter;
use crate::errors::{AppError, FieldErrors};
use crate::geo::resolve_location;
use crate::models::{
    BloodType, DonationRecord, Donor, DonorFields, DonorQuery, RecordDonationRequest,
    UpdateAvailabilityRequest, UpdateLastDonationRequest, UpsertDonorRequest,
};
use crate::AppState;

const MIN_DONOR_AGE: i64 = 18;
const MAX_DONOR_AGE: i64 = 65;

/// GET /api/donors - List donors, optionally by blood type and distance.
pub async fn list_donors(
    State(state): State<AppState>,
    Query(query): Query<DonorQuery>,
) -> ApiResult<Vec<Donor>> {
    let mut errors = FieldErrors::new();

    let mut blood_types: Option<Vec<BloodType>> = None;
    if let Some(label) = query.blood_type.as_deref().filter(|s| !s.trim().is_empty()) {
        blood_types = blood_type_field(&mut errors, "bloodType", label).map(|t| vec![t]);
    }
    if let Some(label) = query.compatible_with.as_deref().filter(|s| !s.trim().is_empty()) {
        if let Some(recipient) = blood_type_field(&mut errors, "compatibleWith", label) {
            let eligible = compatible_donors(recipient);
            blood_types = Some(match blood_types {
                Some(types) => types.into_iter().filter(|t| eligible.contains(t)).collect(),
                None => eligible.into_iter().collect(),
            });
        }
    }
    errors.into_result()?;

    let within = match query_point(query.lat, query.lng)? {
        Some(center) => {
            let radius = query.distance.unwrap_or(state.config.match_radius_km);
            Some((center, radius_field(radius, "distance")?))
        }
        None if query.distance.is_some() => {
            return Err(AppError::invalid(
                "distance",
                "A distance search needs lat and lng",
            ));
        }
        None => None,
    };

    let donors = state
        .repo
        .list_donors(&DonorFilter {
            blood_types,
            within,
        })
        .await?;
    success(donors)
}

/// GET /api/donors/me - The caller's donor profile.
pub async fn get_my_donor(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<Donor> {
    success(own_profile(&state, &actor).await?)
}

/// GET /api/donors/{id} - Get a single donor.
pub async fn get_donor(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Donor> {
    match state.repo.get_donor(&id).await? {
        Some(donor) => success(donor),
        None => Err(AppError::NotFound("Donor not found".to_string())),
    }
}

/// POST /api/donors - Create or update the caller's donor profile.
pub async fn upsert_donor(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<UpsertDonorRequest>,
) -> ApiResult<Donor> {
    // Keyed by the caller; no other profile is reachable here.
    let existing = state.repo.get_donor_by_user(&actor.user_id).await?;

    let mut errors = FieldErrors::new();
    let blood_type = blood_type_field(&mut errors, "bloodType", &request.blood_type);

    let age = request.age.or(existing.as_ref().map(|d| d.age));
    match age {
        None => errors.push("age", "Age is required"),
        Some(age) if !(MIN_DONOR_AGE..=MAX_DONOR_AGE).contains(&age) => errors.push(
            "age",
            format!(
                "Donors must be between {} and {} years old",
                MIN_DONOR_AGE, MAX_DONOR_AGE
            ),
        ),
        Some(_) => {}
    }

    // A new profile needs a full address; an update may omit it to keep the stored one.
    if existing.is_none() || !request.address.is_blank() {
        errors.require("address", &request.address.address, "Address is required");
        errors.require("city", &request.address.city, "City is required");
        errors.require("state", &request.address.state, "State is required");
        errors.require("zipcode", &request.address.zipcode, "Zipcode is required");
    }
    point_field(&mut errors, "location", request.location);
    if request.last_donation.is_some_and(|d| d > Utc::now()) {
        errors.push("lastDonation", "Last donation cannot be in the future");
    }
    errors.into_result()?;

    let (Some(blood_type), Some(age)) = (blood_type, age) else {
        return Err(AppError::Internal("Donor validation incomplete".to_string()));
    };

    let address = if request.address.is_blank() {
        existing
            .as_ref()
            .map(|d| d.address.clone())
            .unwrap_or_default()
    } else {
        request.address.clone()
    };

    // Re-geocode only when the address moved or nothing was resolved before.
    let stored_location = existing.as_ref().and_then(|d| d.location.clone());
    let address_changed = existing.as_ref().map_or(true, |d| d.address != address);
    let location = if request.location.is_some() || address_changed || stored_location.is_none()
    {
        resolve_location(state.geocoder.as_ref(), request.location, &address).await
    } else {
        stored_location
    };

    let fields = DonorFields {
        blood_type,
        age,
        address,
        location,
        last_donation: request
            .last_donation
            .or(existing.as_ref().and_then(|d| d.last_donation)),
        emergency_available: request
            .emergency_available
            .or(existing.as_ref().map(|d| d.emergency_available))
            .unwrap_or(false),
        is_available: request
            .is_available
            .or(existing.as_ref().map(|d| d.is_available))
            .unwrap_or(true),
        medical_conditions: request
            .medical_conditions
            .clone()
            .or(existing.as_ref().map(|d| d.medical_conditions.clone()))
            .unwrap_or_default(),
        donation_history: existing
            .as_ref()
            .map(|d| d.donation_history.clone())
            .unwrap_or_default(),
    };

    let donor = match existing {
        Some(donor) => {
            let updated = state.repo.update_donor(&donor.id, &fields).await?;
            tracing::info!(donor_id = %updated.id, "Donor profile updated");
            updated
        }
        None => {
            let created = state.repo.create_donor(&actor.user_id, &fields).await?;
            tracing::info!(donor_id = %created.id, user_id = %actor.user_id, "Donor profile created");
            created
        }
    };
    success(donor)
}

/// DELETE /api/donors - Delete the caller's donor profile.
pub async fn delete_my_donor(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<()> {
    let donor = own_profile(&state, &actor).await?;
    state.repo.delete_donor(&donor.id).await?;
    tracing::info!(donor_id = %donor.id, "Donor profile removed");
    success(())
}

/// DELETE /api/donors/{id} - Delete a donor profile (owner or admin).
pub async fn delete_donor(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let donor = state
        .repo
        .get_donor(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Donor not found".to_string()))?;

    ensure(
        &actor,
        Action::ModifyDonorProfile,
        Resource::Donor {
            user_id: &donor.user_id,
        },
        "Not allowed to delete this donor profile",
    )?;

    state.repo.delete_donor(&donor.id).await?;
    tracing::info!(donor_id = %donor.id, by = %actor.user_id, "Donor profile removed");
    success(())
}

/// PATCH /api/donors/availability - Toggle the caller's availability flags.
pub async fn update_availability(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<UpdateAvailabilityRequest>,
) -> ApiResult<Donor> {
    if request.is_available.is_none() && request.emergency_available.is_none() {
        return Err(AppError::invalid(
            "isAvailable",
            "Provide isAvailable or emergencyAvailable",
        ));
    }

    let donor = own_profile(&state, &actor).await?;
    let mut fields = DonorFields::from(&donor);
    if let Some(is_available) = request.is_available {
        fields.is_available = is_available;
    }
    if let Some(emergency_available) = request.emergency_available {
        fields.emergency_available = emergency_available;
    }

    success(state.repo.update_donor(&donor.id, &fields).await?)
}

/// PATCH /api/donors/last-donation - Set or clear the caller's last donation date.
pub async fn update_last_donation(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<UpdateLastDonationRequest>,
) -> ApiResult<Donor> {
    if request.last_donation.is_some_and(|d| d > Utc::now()) {
        return Err(AppError::invalid(
            "lastDonation",
            "Last donation cannot be in the future",
        ));
    }

    let donor = own_profile(&state, &actor).await?;
    let mut fields = DonorFields::from(&donor);
    fields.last_donation = request.last_donation;

    success(state.repo.update_donor(&donor.id, &fields).await?)
}

/// POST /api/donors/donations - Log a donation and move `lastDonation` forward.
pub async fn record_donation(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<RecordDonationRequest>,
) -> ApiResult<Donor> {
    let now = Utc::now();
    let date = request.date.unwrap_or(now);
    let units = request.units.unwrap_or(1);

    let mut errors = FieldErrors::new();
    errors.require("hospital", &request.hospital, "Hospital is required");
    if date > now {
        errors.push("date", "Donation date cannot be in the future");
    }
    if units == 0 {
        errors.push("units", "Units must be at least 1");
    }
    errors.into_result()?;

    let donor = own_profile(&state, &actor).await?;
    let mut fields = DonorFields::from(&donor);
    fields.donation_history.push(DonationRecord {
        date,
        hospital: request.hospital.trim().to_string(),
        recipient: request.recipient.clone(),
        units,
    });
    fields.last_donation = Some(match donor.last_donation {
        Some(last) if last > date => last,
        _ => date,
    });

    let updated = state.repo.update_donor(&donor.id, &fields).await?;
    tracing::info!(donor_id = %updated.id, units, "Donation recorded");
    success(updated)
}

async fn own_profile(state: &AppState, actor: &Actor) -> Result<Donor, AppError> {
    state
        .repo
        .get_donor_by_user(&actor.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Donor profile not found".to_string()))
}
