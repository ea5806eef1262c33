//! Blood request API endpoints.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::Utc;

use super::{blood_type_field, created, point_field, success, ApiResult};
use crate::auth::{ensure, Action, Actor, Resource};
use crate::db::RequestFilter;
use crate::errors::{AppError, FieldErrors};
use crate::geo::resolve_location;
use crate::lifecycle::{append_note, expires_at_for, is_closing_status, status_for_units};
use crate::matching::find_matching_donors;
use crate::models::{
    BloodRequest, BloodType, CloseRequestBody, CreateBloodRequest, NewBloodRequest,
    RecordUnitsRequest, RequestQuery, RequestStatus, RequestType, RespondRequest, ResponseStatus,
    UpdateStatusRequest, Urgency,
};
use crate::notify::{fan_out, NotificationTemplate};
use crate::AppState;

/// POST /api/requests - Create a request and notify matching donors.
pub async fn create_request(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateBloodRequest>,
) -> ApiResult<BloodRequest> {
    let mut errors = FieldErrors::new();

    let request_type = match request.request_type.as_deref() {
        None | Some("") => Some(RequestType::default()),
        Some(label) => {
            let parsed = RequestType::parse(label);
            if parsed.is_none() {
                errors.push("requestType", "Request type must be hospital or patient");
            }
            parsed
        }
    };
    match request_type {
        Some(RequestType::Hospital) => {
            let has_hospital = request
                .hospital_id
                .as_deref()
                .or(request.hospital_name.as_deref())
                .is_some_and(|h| !h.trim().is_empty());
            if !has_hospital {
                errors.push("hospitalName", "Hospital is required for hospital requests");
            }
        }
        Some(RequestType::Patient) => {
            errors.require(
                "patientName",
                request.patient_name.as_deref().unwrap_or_default(),
                "Patient name is required",
            );
        }
        None => {}
    }

    let blood_type = blood_type_field(&mut errors, "bloodType", &request.blood_type);

    let urgency = if request.urgency.trim().is_empty() {
        errors.push("urgency", "Urgency level is required");
        None
    } else {
        let parsed = Urgency::parse(&request.urgency);
        if parsed.is_none() {
            errors.push("urgency", "Urgency must be critical, urgent or scheduled");
        }
        parsed
    };

    match request.units_needed {
        None => errors.push("unitsNeeded", "Number of units is required"),
        Some(units) if units < 1 => errors.push("unitsNeeded", "At least one unit is required"),
        Some(_) => {}
    }
    errors.require("contactName", &request.contact_name, "Contact name is required");
    errors.require(
        "contactNumber",
        &request.contact_number,
        "Contact number is required",
    );
    point_field(&mut errors, "location", request.location);
    errors.into_result()?;

    let (Some(request_type), Some(blood_type), Some(urgency), Some(units_needed)) =
        (request_type, blood_type, urgency, request.units_needed)
    else {
        return Err(AppError::Internal("Request validation incomplete".to_string()));
    };

    let now = Utc::now();
    let location = resolve_location(state.geocoder.as_ref(), request.location, &request.address).await;

    let new = NewBloodRequest {
        request_type,
        requested_by: actor.user_id.clone(),
        hospital_id: request.hospital_id.clone(),
        hospital_name: request.hospital_name.clone(),
        patient_name: request.patient_name.clone(),
        blood_type,
        units_needed,
        urgency,
        address: request.address.clone(),
        location,
        contact_name: request.contact_name.trim().to_string(),
        contact_number: request.contact_number.trim().to_string(),
        additional_info: request.additional_info.clone(),
        notes: request.notes.clone().unwrap_or_default(),
        required_by: request.required_by,
        expires_at: expires_at_for(urgency, now),
    };
    let saved = state.repo.create_request(&new).await?;
    tracing::info!(
        request_id = %saved.id,
        blood_type = %saved.blood_type,
        urgency = saved.urgency.as_str(),
        "Blood request created"
    );

    let Some(origin) = saved.location.as_ref().map(|l| l.point()) else {
        tracing::warn!(request_id = %saved.id, "Request has no location, skipping donor matching");
        return created(saved);
    };

    let matches = find_matching_donors(
        &state.repo,
        saved.blood_type,
        origin,
        state.config.match_radius_km,
        Some(&actor.user_id),
    )
    .await?;

    let donor_ids: Vec<String> = matches.iter().map(|m| m.donor.id.clone()).collect();
    let user_ids: Vec<String> = matches.iter().map(|m| m.donor.user_id.clone()).collect();

    state
        .repo
        .add_notified_donors(&saved.id, &donor_ids, now)
        .await?;
    fan_out(
        &state.repo,
        &user_ids,
        &NotificationTemplate::new_request(&saved),
        state.config.notification_ttl(),
        now,
    )
    .await?;
    tracing::info!(request_id = %saved.id, matched = donor_ids.len(), "Donors notified");

    let saved = load_request(&state, &saved.id).await?;
    created(saved)
}

/// GET /api/requests - List requests, newest first.
pub async fn list_requests(
    State(state): State<AppState>,
    Query(query): Query<RequestQuery>,
) -> ApiResult<Vec<BloodRequest>> {
    let mut errors = FieldErrors::new();
    let mut filter = RequestFilter::default();

    if let Some(label) = non_blank(&query.status) {
        filter.status = RequestStatus::parse(label);
        if filter.status.is_none() {
            errors.push("status", format!("Unknown status {:?}", label));
        }
    }
    if let Some(label) = non_blank(&query.blood_type) {
        filter.blood_type = BloodType::parse(label);
        if filter.blood_type.is_none() {
            errors.push("bloodType", format!("Unknown blood type {:?}", label));
        }
    }
    if let Some(label) = non_blank(&query.urgency) {
        filter.urgency = Urgency::parse(label);
        if filter.urgency.is_none() {
            errors.push("urgency", format!("Unknown urgency {:?}", label));
        }
    }
    errors.into_result()?;

    success(state.repo.list_requests(&filter).await?)
}

/// GET /api/requests/{id} - Get a single request.
pub async fn get_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<BloodRequest> {
    success(load_request(&state, &id).await?)
}

/// PATCH /api/requests/{id}/status - Set the status directly.
pub async fn update_request_status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> ApiResult<BloodRequest> {
    let status = RequestStatus::parse(&request.status)
        .ok_or_else(|| AppError::invalid("status", format!("Unknown status {:?}", request.status)))?;

    let existing = load_request(&state, &id).await?;
    ensure(
        &actor,
        Action::UpdateRequestStatus,
        Resource::Request {
            requested_by: &existing.requested_by,
        },
        "Not authorized to update this request",
    )?;

    let updated = state.repo.update_request_status(&id, status).await?;
    tracing::info!(request_id = %id, status = status.as_str(), "Request status updated");
    success(updated)
}

/// PATCH /api/requests/{id}/units - Record units received so far.
pub async fn record_units(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(request): Json<RecordUnitsRequest>,
) -> ApiResult<BloodRequest> {
    if request.units_received < 0 {
        return Err(AppError::invalid(
            "unitsReceived",
            "Units received cannot be negative",
        ));
    }

    let existing = load_request(&state, &id).await?;
    ensure(
        &actor,
        Action::RecordUnits,
        Resource::Request {
            requested_by: &existing.requested_by,
        },
        "Not authorized to update this request",
    )?;

    let status = status_for_units(
        existing.status,
        existing.units_needed,
        request.units_received,
    );
    let updated = state
        .repo
        .record_units(&id, request.units_received, status)
        .await?;
    tracing::info!(
        request_id = %id,
        units_received = request.units_received,
        status = status.as_str(),
        "Units recorded"
    );
    success(updated)
}

/// POST /api/requests/{id}/respond - Accept or decline a request as a donor.
pub async fn respond_to_request(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(request): Json<RespondRequest>,
) -> ApiResult<BloodRequest> {
    let response = match ResponseStatus::parse(&request.response) {
        Some(status @ (ResponseStatus::Accepted | ResponseStatus::Declined)) => status,
        _ => {
            return Err(AppError::invalid(
                "response",
                "Response must be accepted or declined",
            ))
        }
    };

    let existing = load_request(&state, &id).await?;
    let donor = state
        .repo
        .get_donor_by_user(&actor.user_id)
        .await?
        .ok_or_else(|| AppError::BadRequest("Donor profile not found".to_string()))?;

    let now = Utc::now();
    state
        .repo
        .upsert_response(&id, &donor.id, response, now)
        .await?;
    tracing::info!(
        request_id = %id,
        donor_id = %donor.id,
        response = response.as_str(),
        "Donor responded"
    );

    fan_out(
        &state.repo,
        std::slice::from_ref(&existing.requested_by),
        &NotificationTemplate::donor_response(&existing, response == ResponseStatus::Accepted),
        state.config.notification_ttl(),
        now,
    )
    .await?;

    success(load_request(&state, &id).await?)
}

/// PATCH /api/requests/{id}/close - Close as fulfilled or cancelled.
pub async fn close_request(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(request): Json<CloseRequestBody>,
) -> ApiResult<BloodRequest> {
    let status = RequestStatus::parse(&request.status)
        .filter(|s| is_closing_status(*s))
        .ok_or_else(|| AppError::invalid("status", "Status must be fulfilled or cancelled"))?;

    let existing = load_request(&state, &id).await?;
    ensure(
        &actor,
        Action::CloseRequest,
        Resource::Request {
            requested_by: &existing.requested_by,
        },
        "Not authorized to close this request",
    )?;

    let now = Utc::now();
    let notes = append_note(&existing.notes, request.note.as_deref().unwrap_or_default());
    let closed = state.repo.close_request(&id, status, &notes, now).await?;
    tracing::info!(request_id = %id, status = status.as_str(), "Request closed");

    let accepted_users = state
        .repo
        .donor_user_ids(&closed.accepted_donor_ids())
        .await?;
    fan_out(
        &state.repo,
        &accepted_users,
        &NotificationTemplate::request_closed(&closed),
        state.config.notification_ttl(),
        now,
    )
    .await?;

    success(closed)
}

async fn load_request(state: &AppState, id: &str) -> Result<BloodRequest, AppError> {
    state
        .repo
        .get_request(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Blood request not found".to_string()))
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
