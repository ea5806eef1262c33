//! Compatibility lookup endpoint.

use std::collections::BTreeSet;

use axum::extract::Query;
use serde::{Deserialize, Serialize};

use super::{success, ApiResult};
use crate::compat::{compatible_donors_for_label, compatible_recipients_for_label};
use crate::errors::AppError;
use crate::models::BloodType;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityQuery {
    #[serde(default)]
    pub blood_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityResponse {
    pub blood_type: String,
    /// Groups this type can receive from.
    pub can_receive_from: BTreeSet<BloodType>,
    /// Groups this type can donate to.
    pub can_donate_to: BTreeSet<BloodType>,
}

/// GET /api/compatibility?bloodType= - Both directions for one blood type.
///
/// An unknown label yields empty sets rather than an error.
pub async fn get_compatibility(
    Query(query): Query<CompatibilityQuery>,
) -> ApiResult<CompatibilityResponse> {
    let label = query.blood_type.trim();
    if label.is_empty() {
        return Err(AppError::invalid("bloodType", "Blood type is required"));
    }

    success(CompatibilityResponse {
        blood_type: label.to_string(),
        can_receive_from: compatible_donors_for_label(label),
        can_donate_to: compatible_recipients_for_label(label),
    })
}
