//! Rules for deriving donor availability and request status.
//!
//! All functions here are pure. Callers pass `now` so results are reproducible.

use chrono::{DateTime, Duration, Utc};

use crate::models::{AvailabilityStatus, RequestStatus, Urgency};

/// Minimum gap between whole-blood donations.
pub const DEFAULT_COOLDOWN_DAYS: i64 = 56;

/// Donor availability as of `now`.
///
/// A donation inside the cooldown window always wins. Past it, the donor is available if they
/// are flagged for emergencies or have opted in themselves.
pub fn derive_availability(
    last_donation: Option<DateTime<Utc>>,
    emergency_available: bool,
    is_available: bool,
    now: DateTime<Utc>,
    cooldown: Duration,
) -> AvailabilityStatus {
    if let Some(last) = last_donation {
        if now.signed_duration_since(last) < cooldown {
            return AvailabilityStatus::Cooldown;
        }
    }

    if emergency_available || is_available {
        AvailabilityStatus::Available
    } else {
        AvailabilityStatus::Unavailable
    }
}

pub fn expires_at_for(urgency: Urgency, created_at: DateTime<Utc>) -> DateTime<Utc> {
    created_at + urgency.expiry_window()
}

/// Status after recording `units_received` against `units_needed`.
pub fn status_for_units(
    current: RequestStatus,
    units_needed: i64,
    units_received: i64,
) -> RequestStatus {
    if units_received >= units_needed {
        RequestStatus::Fulfilled
    } else if units_received > 0 {
        RequestStatus::Partial
    } else {
        current
    }
}

/// An open request past its expiry time.
pub fn is_expired(status: RequestStatus, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    status.is_open() && now > expires_at
}

/// Statuses a request may be closed with.
pub fn is_closing_status(status: RequestStatus) -> bool {
    matches!(status, RequestStatus::Fulfilled | RequestStatus::Cancelled)
}

/// Append a closing note on its own line.
pub fn append_note(existing: &str, note: &str) -> String {
    let note = note.trim();
    if note.is_empty() {
        existing.to_string()
    } else if existing.is_empty() {
        note.to_string()
    } else {
        format!("{}\n{}", existing, note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cooldown() -> Duration {
        Duration::days(DEFAULT_COOLDOWN_DAYS)
    }

    #[test]
    fn test_recent_donation_forces_cooldown() {
        let now = Utc::now();
        let last = now - Duration::days(10);
        assert_eq!(
            derive_availability(Some(last), false, true, now, cooldown()),
            AvailabilityStatus::Cooldown
        );
        assert_eq!(
            derive_availability(Some(last), true, true, now, cooldown()),
            AvailabilityStatus::Cooldown
        );
    }

    #[test]
    fn test_cooldown_elapsed() {
        let now = Utc::now();
        let last = now - Duration::days(60);
        assert_eq!(
            derive_availability(Some(last), false, true, now, cooldown()),
            AvailabilityStatus::Available
        );
        assert_eq!(
            derive_availability(Some(last), true, false, now, cooldown()),
            AvailabilityStatus::Available
        );
        assert_eq!(
            derive_availability(Some(last), false, false, now, cooldown()),
            AvailabilityStatus::Unavailable
        );
    }

    #[test]
    fn test_cooldown_boundary_is_exclusive() {
        let now = Utc::now();
        let last = now - cooldown();
        assert_eq!(
            derive_availability(Some(last), false, true, now, cooldown()),
            AvailabilityStatus::Available
        );
    }

    #[test]
    fn test_never_donated() {
        let now = Utc::now();
        assert_eq!(
            derive_availability(None, false, true, now, cooldown()),
            AvailabilityStatus::Available
        );
        assert_eq!(
            derive_availability(None, false, false, now, cooldown()),
            AvailabilityStatus::Unavailable
        );
    }

    #[test]
    fn test_status_for_units() {
        assert_eq!(
            status_for_units(RequestStatus::Active, 3, 3),
            RequestStatus::Fulfilled
        );
        assert_eq!(
            status_for_units(RequestStatus::Active, 3, 5),
            RequestStatus::Fulfilled
        );
        assert_eq!(
            status_for_units(RequestStatus::Active, 3, 1),
            RequestStatus::Partial
        );
        assert_eq!(
            status_for_units(RequestStatus::Cancelled, 3, 0),
            RequestStatus::Cancelled
        );
    }

    #[test]
    fn test_expiry() {
        let created = Utc::now();
        let expires = expires_at_for(Urgency::Critical, created);
        assert_eq!(expires - created, Duration::hours(4));
        assert!(!is_expired(RequestStatus::Active, expires, created));
        assert!(is_expired(
            RequestStatus::Active,
            expires,
            expires + Duration::seconds(1)
        ));
        assert!(!is_expired(
            RequestStatus::Fulfilled,
            expires,
            expires + Duration::days(1)
        ));
    }

    #[test]
    fn test_append_note() {
        assert_eq!(append_note("", "done"), "done");
        assert_eq!(append_note("first", "second"), "first\nsecond");
        assert_eq!(append_note("first", "  "), "first");
    }

    #[test]
    fn test_closing_statuses() {
        assert!(is_closing_status(RequestStatus::Fulfilled));
        assert!(is_closing_status(RequestStatus::Cancelled));
        assert!(!is_closing_status(RequestStatus::Active));
        assert!(!is_closing_status(RequestStatus::Expired));
    }
}
