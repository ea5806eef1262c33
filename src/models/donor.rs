//! Donor profile model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Address, BloodType, GeoPoint, Location};

/// Eligibility of a donor to be matched against new requests.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AvailabilityStatus {
    Available,
    Unavailable,
    Cooldown,
}

impl AvailabilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AvailabilityStatus::Available => "available",
            AvailabilityStatus::Unavailable => "unavailable",
            AvailabilityStatus::Cooldown => "cooldown",
        }
    }
}

/// A single past donation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DonationRecord {
    pub date: DateTime<Utc>,
    pub hospital: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(default = "default_units")]
    pub units: u32,
}

fn default_units() -> u32 {
    1
}

/// A registered blood donor. One profile per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Donor {
    pub id: String,
    pub user_id: String,
    pub blood_type: BloodType,
    pub age: i64,
    #[serde(flatten)]
    pub address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_donation: Option<DateTime<Utc>>,
    pub emergency_available: bool,
    pub is_available: bool,
    /// Derived from the fields above each time the donor is loaded.
    pub availability_status: AvailabilityStatus,
    pub medical_conditions: Vec<String>,
    pub donation_history: Vec<DonationRecord>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating or replacing the caller's donor profile.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertDonorRequest {
    #[serde(default)]
    pub blood_type: String,
    #[serde(default)]
    pub age: Option<i64>,
    #[serde(flatten)]
    pub address: Address,
    /// Skips geocoding when supplied.
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub last_donation: Option<DateTime<Utc>>,
    #[serde(default)]
    pub emergency_available: Option<bool>,
    #[serde(default)]
    pub is_available: Option<bool>,
    #[serde(default)]
    pub medical_conditions: Option<Vec<String>>,
}

/// Request body for toggling availability flags.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAvailabilityRequest {
    #[serde(default)]
    pub is_available: Option<bool>,
    #[serde(default)]
    pub emergency_available: Option<bool>,
}

/// Request body for setting the last donation date.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLastDonationRequest {
    pub last_donation: Option<DateTime<Utc>>,
}

/// Query parameters for listing donors.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorQuery {
    #[serde(default)]
    pub blood_type: Option<String>,
    /// Recipient blood type; restricts to donors who can give to it.
    #[serde(default)]
    pub compatible_with: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    /// Radius in kilometres around (`lat`, `lng`).
    #[serde(default)]
    pub distance: Option<f64>,
}

/// Validated profile fields written on create or update.
#[derive(Debug, Clone)]
pub struct DonorFields {
    pub blood_type: BloodType,
    pub age: i64,
    pub address: Address,
    pub location: Option<Location>,
    pub last_donation: Option<DateTime<Utc>>,
    pub emergency_available: bool,
    pub is_available: bool,
    pub medical_conditions: Vec<String>,
    pub donation_history: Vec<DonationRecord>,
}

impl From<&Donor> for DonorFields {
    fn from(donor: &Donor) -> Self {
        Self {
            blood_type: donor.blood_type,
            age: donor.age,
            address: donor.address.clone(),
            location: donor.location.clone(),
            last_donation: donor.last_donation,
            emergency_available: donor.emergency_available,
            is_available: donor.is_available,
            medical_conditions: donor.medical_conditions.clone(),
            donation_history: donor.donation_history.clone(),
        }
    }
}

/// Request body for logging a completed donation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDonationRequest {
    /// Defaults to now.
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub hospital: String,
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default)]
    pub units: Option<u32>,
}
