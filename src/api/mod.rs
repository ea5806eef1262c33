//! REST API module.
//!
//! Contains all API routes and handlers. Every handler returns [`ApiResult`], so success and
//! failure share the JSON envelopes.

mod compatibility;
mod donors;
mod maps;
mod notifications;
mod requests;

pub use compatibility::*;
pub use donors::*;
pub use maps::*;
pub use notifications::*;
pub use requests::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::{AppError, FieldErrors};
use crate::models::{BloodType, GeoPoint};

/// Success response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
            status: StatusCode::OK,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(data))
}

/// Create a 201 response for a newly stored resource.
pub fn created<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse {
        status: StatusCode::CREATED,
        ..ApiResponse::new(data)
    })
}

/// Parse a required blood type label, recording a field error when it is missing or unknown.
fn blood_type_field(errors: &mut FieldErrors, field: &str, label: &str) -> Option<BloodType> {
    if label.trim().is_empty() {
        errors.push(field, "Blood type is required");
        return None;
    }
    let parsed = BloodType::parse(label);
    if parsed.is_none() {
        errors.push(field, format!("Unknown blood type {:?}", label));
    }
    parsed
}

/// Validate an explicitly supplied coordinate.
fn point_field(errors: &mut FieldErrors, field: &str, point: Option<GeoPoint>) {
    if let Some(point) = point {
        if !point.is_valid() {
            errors.push(field, "Coordinates are out of range");
        }
    }
}

/// Combine `lat`/`lng` query parameters into a point.
fn query_point(lat: Option<f64>, lng: Option<f64>) -> Result<Option<GeoPoint>, AppError> {
    match (lat, lng) {
        (None, None) => Ok(None),
        (Some(lat), Some(lng)) => {
            let point = GeoPoint::new(lat, lng);
            if point.is_valid() {
                Ok(Some(point))
            } else {
                Err(AppError::invalid("lat", "Coordinates are out of range"))
            }
        }
        _ => Err(AppError::invalid(
            "lat",
            "Both lat and lng are required for a location search",
        )),
    }
}

fn radius_field(radius: f64, field: &str) -> Result<f64, AppError> {
    if radius.is_finite() && radius > 0.0 {
        Ok(radius)
    } else {
        Err(AppError::invalid(field, "Radius must be a positive number"))
    }
}
