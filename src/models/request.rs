//! Blood request model and its embedded donor responses.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{Address, BloodType, GeoPoint, Location};

/// Who the blood is requested for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Hospital,
    #[default]
    Patient,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Hospital => "hospital",
            RequestType::Patient => "patient",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hospital" => Some(RequestType::Hospital),
            "patient" => Some(RequestType::Patient),
            _ => None,
        }
    }
}

/// Priority tier. Determines how long a request stays open.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Critical,
    Urgent,
    Scheduled,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Critical => "critical",
            Urgency::Urgent => "urgent",
            Urgency::Scheduled => "scheduled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Some(Urgency::Critical),
            "urgent" => Some(Urgency::Urgent),
            "scheduled" => Some(Urgency::Scheduled),
            _ => None,
        }
    }

    /// Time from creation until the request expires.
    pub fn expiry_window(&self) -> Duration {
        match self {
            Urgency::Critical => Duration::hours(4),
            Urgency::Urgent => Duration::hours(24),
            Urgency::Scheduled => Duration::days(7),
        }
    }
}

/// Lifecycle status of a request.
///
/// `pending` and `in_progress` are accepted on input for clients of the older status set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[serde(alias = "pending")]
    Active,
    #[serde(alias = "in_progress")]
    Partial,
    Fulfilled,
    Expired,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Active => "active",
            RequestStatus::Partial => "partial",
            RequestStatus::Fulfilled => "fulfilled",
            RequestStatus::Expired => "expired",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" | "pending" => Some(RequestStatus::Active),
            "partial" | "in_progress" => Some(RequestStatus::Partial),
            "fulfilled" => Some(RequestStatus::Fulfilled),
            "expired" => Some(RequestStatus::Expired),
            "cancelled" => Some(RequestStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether the request still accepts donations.
    pub fn is_open(&self) -> bool {
        matches!(self, RequestStatus::Active | RequestStatus::Partial)
    }
}

/// A donor's standing on a particular request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Notified,
    Accepted,
    Declined,
    Donated,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Notified => "notified",
            ResponseStatus::Accepted => "accepted",
            ResponseStatus::Declined => "declined",
            ResponseStatus::Donated => "donated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "notified" => Some(ResponseStatus::Notified),
            "accepted" => Some(ResponseStatus::Accepted),
            "declined" => Some(ResponseStatus::Declined),
            "donated" => Some(ResponseStatus::Donated),
            _ => None,
        }
    }
}

/// One donor's entry on a request. Unique per (request, donor).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorResponse {
    pub donor_id: String,
    pub status: ResponseStatus,
    pub notified_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<DateTime<Utc>>,
}

/// A request for blood raised by a hospital or on behalf of a patient.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BloodRequest {
    pub id: String,
    pub request_type: RequestType,
    pub requested_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hospital_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hospital_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<String>,
    pub blood_type: BloodType,
    pub units_needed: i64,
    pub units_received: i64,
    pub urgency: Urgency,
    #[serde(flatten)]
    pub address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    pub contact_name: String,
    pub contact_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<String>,
    pub notes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_by: Option<DateTime<Utc>>,
    pub status: RequestStatus,
    pub expires_at: DateTime<Utc>,
    /// Computed on read; nothing transitions a request to `expired` on its own.
    pub is_expired: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    pub donors: Vec<DonorResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BloodRequest {
    /// Donor ids whose response is `accepted`.
    pub fn accepted_donor_ids(&self) -> Vec<String> {
        self.donors
            .iter()
            .filter(|d| d.status == ResponseStatus::Accepted)
            .map(|d| d.donor_id.clone())
            .collect()
    }
}

/// Request body for creating a blood request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBloodRequest {
    #[serde(default)]
    pub request_type: Option<String>,
    #[serde(default)]
    pub hospital_id: Option<String>,
    #[serde(default, alias = "hospital")]
    pub hospital_name: Option<String>,
    #[serde(default)]
    pub patient_name: Option<String>,
    #[serde(default)]
    pub blood_type: String,
    #[serde(default, alias = "units")]
    pub units_needed: Option<i64>,
    #[serde(default, alias = "urgencyLevel")]
    pub urgency: String,
    #[serde(flatten)]
    pub address: Address,
    /// Skips geocoding when supplied.
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub contact_name: String,
    #[serde(default, alias = "contactPhone")]
    pub contact_number: String,
    #[serde(default)]
    pub additional_info: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub required_by: Option<DateTime<Utc>>,
}

/// Validated fields for inserting a request.
#[derive(Debug, Clone)]
pub struct NewBloodRequest {
    pub request_type: RequestType,
    pub requested_by: String,
    pub hospital_id: Option<String>,
    pub hospital_name: Option<String>,
    pub patient_name: Option<String>,
    pub blood_type: BloodType,
    pub units_needed: i64,
    pub urgency: Urgency,
    pub address: Address,
    pub location: Option<Location>,
    pub contact_name: String,
    pub contact_number: String,
    pub additional_info: Option<String>,
    pub notes: String,
    pub required_by: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

/// Query parameters for listing requests.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub blood_type: Option<String>,
    #[serde(default)]
    pub urgency: Option<String>,
}

/// Request body for a direct status change.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub status: String,
}

/// Request body for recording received units.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordUnitsRequest {
    pub units_received: i64,
}

/// Request body for a donor's answer to a request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondRequest {
    #[serde(default)]
    pub response: String,
}

/// Request body for closing a request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseRequestBody {
    #[serde(default)]
    pub status: String,
    #[serde(default, alias = "notes")]
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_status_aliases() {
        let pending: RequestStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(pending, RequestStatus::Active);
        let in_progress: RequestStatus = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(in_progress, RequestStatus::Partial);
        assert_eq!(RequestStatus::parse("in_progress"), Some(RequestStatus::Partial));
        assert_eq!(
            serde_json::to_string(&RequestStatus::Active).unwrap(),
            "\"active\""
        );
    }

    #[test]
    fn test_urgency_windows() {
        assert_eq!(Urgency::Critical.expiry_window(), Duration::hours(4));
        assert_eq!(Urgency::Urgent.expiry_window(), Duration::hours(24));
        assert_eq!(Urgency::Scheduled.expiry_window(), Duration::days(7));
        assert_eq!(Urgency::parse("URGENT"), Some(Urgency::Urgent));
        assert_eq!(Urgency::parse("low"), None);
    }

    #[test]
    fn test_parse_ignores_case_and_whitespace() {
        assert_eq!(RequestType::parse(" Hospital"), Some(RequestType::Hospital));
        assert_eq!(RequestType::parse("PATIENT"), Some(RequestType::Patient));
        assert_eq!(ResponseStatus::parse("Accepted "), Some(ResponseStatus::Accepted));
        assert_eq!(ResponseStatus::parse("DECLINED"), Some(ResponseStatus::Declined));
        assert_eq!(RequestStatus::parse(" Fulfilled"), Some(RequestStatus::Fulfilled));
        assert_eq!(ResponseStatus::parse("maybe"), None);
    }

    #[test]
    fn test_open_statuses() {
        assert!(RequestStatus::Active.is_open());
        assert!(RequestStatus::Partial.is_open());
        assert!(!RequestStatus::Fulfilled.is_open());
        assert!(!RequestStatus::Cancelled.is_open());
        assert!(!RequestStatus::Expired.is_open());
    }
}
