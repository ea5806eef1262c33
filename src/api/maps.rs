//! Geocoding and hospital endpoints.

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{created, point_field, query_point, radius_field, success, ApiResult};
use crate::auth::{ensure, Action, Actor, Resource};
use crate::errors::{AppError, FieldErrors};
use crate::geo::resolve_location;
use crate::models::{
    BloodType, CreateHospitalRequest, Hospital, InventoryEntry, NearbyHospitalsQuery, NewHospital,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct GeocodeQuery {
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodeResponse {
    pub latitude: f64,
    pub longitude: f64,
    pub formatted_address: String,
}

/// GET /api/maps/geocode?address= - Resolve an address to coordinates.
pub async fn geocode_address(
    State(state): State<AppState>,
    Query(query): Query<GeocodeQuery>,
) -> ApiResult<GeocodeResponse> {
    let address = query.address.trim();
    if address.is_empty() {
        return Err(AppError::invalid("address", "Address is required"));
    }

    match state.geocoder.geocode(address).await? {
        Some(found) => success(GeocodeResponse {
            latitude: found.point.latitude,
            longitude: found.point.longitude,
            formatted_address: found.formatted_address,
        }),
        None => Err(AppError::NotFound("Address not found".to_string())),
    }
}

/// GET /api/maps/hospitals?lat=&lng=&radius= - Hospitals near a point, nearest first.
pub async fn nearby_hospitals(
    State(state): State<AppState>,
    Query(query): Query<NearbyHospitalsQuery>,
) -> ApiResult<Vec<Hospital>> {
    let center = query_point(query.lat, query.lng)?.ok_or_else(|| {
        AppError::invalid("lat", "Latitude and longitude are required")
    })?;
    let radius = radius_field(query.radius, "radius")?;

    success(state.repo.hospitals_near(center, radius).await?)
}

/// POST /api/maps/hospitals - Register a hospital (admin only).
pub async fn create_hospital(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(mut request): Json<CreateHospitalRequest>,
) -> ApiResult<Hospital> {
    ensure(
        &actor,
        Action::CreateHospital,
        Resource::Hospitals,
        "Not authorized",
    )?;

    request.name = request.name.trim().to_string();
    request.phone = request.phone.trim().to_string();
    request.email = request.email.trim().to_string();
    request.website = request
        .website
        .map(|w| w.trim().to_string())
        .filter(|w| !w.is_empty());

    let mut errors = FieldErrors::new();
    errors.require("name", &request.name, "Please add a name");
    errors.require("address", &request.address.address, "Please add an address");
    errors.require("city", &request.address.city, "Please add a city");
    errors.require("state", &request.address.state, "Please add a state");
    errors.require("zipcode", &request.address.zipcode, "Please add a zipcode");
    errors.merge(request.validate());
    point_field(&mut errors, "location", request.location);

    let now = Utc::now();
    let mut blood_inventory = Vec::with_capacity(request.blood_inventory.len());
    for (i, line) in request.blood_inventory.iter().enumerate() {
        let field = format!("bloodInventory[{}]", i);
        match BloodType::parse(&line.blood_type) {
            Some(blood_type) if line.units >= 0 => blood_inventory.push(InventoryEntry {
                blood_type,
                units: line.units,
                last_updated: now,
            }),
            Some(_) => errors.push(&field, "Units cannot be negative"),
            None => errors.push(&field, format!("Unknown blood type {:?}", line.blood_type)),
        }
    }
    errors.into_result()?;

    let location = resolve_location(state.geocoder.as_ref(), request.location, &request.address)
        .await
        .ok_or_else(|| AppError::BadRequest("Invalid address".to_string()))?;

    let new = NewHospital {
        user_id: request.user_id.unwrap_or_else(|| actor.user_id.clone()),
        name: request.name,
        address: request.address,
        phone: request.phone,
        email: request.email,
        website: request.website,
        location,
        blood_inventory,
        emergency_available: request.emergency_available.unwrap_or(true),
    };

    let hospital = state.repo.create_hospital(&new).await?;
    tracing::info!(hospital_id = %hospital.id, name = %hospital.name, "Hospital registered");
    created(hospital)
}
