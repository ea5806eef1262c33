//! Hospital model.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{Address, BloodType, GeoPoint, Location};

/// Ten digits, optionally preceded by a 1-3 digit country code.
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\+[0-9]{1,3}[- ]?)?[0-9]{10}$").expect("phone pattern compiles")
});

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9_]+([.-]?[A-Za-z0-9_]+)*@[A-Za-z0-9_]+([.-]?[A-Za-z0-9_]+)*(\.[A-Za-z0-9_]{2,3})+$",
    )
    .expect("email pattern compiles")
});

static WEBSITE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://(www\.)?[-a-zA-Z0-9@:%._+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b([-a-zA-Z0-9()@:%_+.~#?&/=]*)$",
    )
    .expect("website pattern compiles")
});

/// Units of one blood type held by a hospital.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryEntry {
    pub blood_type: BloodType,
    #[serde(default)]
    pub units: i64,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hospital {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(flatten)]
    pub address: Address,
    pub phone: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    pub location: Location,
    pub blood_inventory: Vec<InventoryEntry>,
    pub emergency_available: bool,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

/// Inventory line supplied when registering a hospital.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryInput {
    pub blood_type: String,
    #[serde(default)]
    pub units: i64,
}

/// Request body for registering a hospital.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateHospitalRequest {
    #[serde(default)]
    #[validate(length(max = 100, message = "Name cannot be more than 100 characters"))]
    pub name: String,
    #[serde(flatten)]
    pub address: Address,
    #[serde(default)]
    #[validate(regex(path = *PHONE_RE, message = "Please add a valid phone number"))]
    pub phone: String,
    #[serde(default)]
    #[validate(regex(path = *EMAIL_RE, message = "Please add a valid email"))]
    pub email: String,
    #[serde(default)]
    #[validate(regex(path = *WEBSITE_RE, message = "Please use a valid URL with HTTP or HTTPS"))]
    pub website: Option<String>,
    /// Owning user; defaults to the caller.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Skips geocoding when supplied.
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub blood_inventory: Vec<InventoryInput>,
    #[serde(default)]
    pub emergency_available: Option<bool>,
}

/// Query parameters for the nearby-hospital search.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyHospitalsQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// Radius in kilometres.
    #[serde(default = "default_radius")]
    pub radius: f64,
}

fn default_radius() -> f64 {
    10.0
}

/// Validated hospital fields for insertion.
#[derive(Debug, Clone)]
pub struct NewHospital {
    pub user_id: String,
    pub name: String,
    pub address: Address,
    pub phone: String,
    pub email: String,
    pub website: Option<String>,
    pub location: Location,
    pub blood_inventory: Vec<InventoryEntry>,
    pub emergency_available: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(phone: &str, email: &str, website: Option<&str>) -> CreateHospitalRequest {
        serde_json::from_value(serde_json::json!({
            "name": "General",
            "address": "1 Main St",
            "city": "Springfield",
            "state": "IL",
            "zipcode": "62701",
            "phone": phone,
            "email": email,
            "website": website,
        }))
        .unwrap()
    }

    fn rejected_fields(request: &CreateHospitalRequest) -> Vec<String> {
        match request.validate() {
            Ok(()) => vec![],
            Err(errors) => {
                let mut fields: Vec<String> =
                    errors.field_errors().keys().map(|k| k.to_string()).collect();
                fields.sort();
                fields
            }
        }
    }

    #[test]
    fn test_phone_formats() {
        for phone in ["5551234567", "+15551234567", "+91-5551234567", "+44 5551234567"] {
            assert!(rejected_fields(&request(phone, "desk@general.org", None)).is_empty(), "{phone}");
        }
        for phone in ["555123456", "+1234-5551234567", "+1  5551234567", "555-123-4567", ""] {
            assert_eq!(
                rejected_fields(&request(phone, "desk@general.org", None)),
                vec!["phone"],
                "{phone}"
            );
        }
    }

    #[test]
    fn test_email_formats() {
        for email in ["desk@general.org", "er.team@city-hospital.co.uk", "a_b-c@x.io"] {
            assert!(rejected_fields(&request("5551234567", email, None)).is_empty(), "{email}");
        }
        for email in [
            ".a@b.com",
            "a..b@c.com",
            "a@..com",
            "no-at-sign.org",
            "a@b",
            "desk@general.museum",
        ] {
            assert_eq!(
                rejected_fields(&request("5551234567", email, None)),
                vec!["email"],
                "{email}"
            );
        }
    }

    #[test]
    fn test_website_and_name_length() {
        let ok = ["https://general.org/about", "http://www.city-hospital.com"];
        for site in ok {
            assert!(rejected_fields(&request("5551234567", "a@b.org", Some(site))).is_empty());
        }
        for site in ["ftp://general.org", "https://localhost", "general.org"] {
            assert_eq!(
                rejected_fields(&request("5551234567", "a@b.org", Some(site))),
                vec!["website"],
                "{site}"
            );
        }

        let mut long = request("5551234567", "a@b.org", None);
        long.name = "x".repeat(101);
        assert_eq!(rejected_fields(&long), vec!["name"]);
        long.name = "x".repeat(100);
        assert!(rejected_fields(&long).is_empty());
    }
}
