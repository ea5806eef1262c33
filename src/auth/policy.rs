//! Authorization decisions, kept in one place.

use super::Actor;
use crate::errors::AppError;

/// Something an actor is trying to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    UpdateRequestStatus,
    RecordUnits,
    CloseRequest,
    ReadNotification,
    ModifyNotification,
    CreateHospital,
    ModifyDonorProfile,
}

/// The thing being acted on, reduced to the facts a decision needs.
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    Request { requested_by: &'a str },
    Notification { recipient: &'a str },
    Donor { user_id: &'a str },
    Hospitals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

pub fn authorize(actor: &Actor, action: Action, resource: Resource<'_>) -> Decision {
    let allowed = match (action, resource) {
        (
            Action::UpdateRequestStatus | Action::RecordUnits | Action::CloseRequest,
            Resource::Request { requested_by },
        ) => actor.user_id == requested_by || actor.is_admin(),
        (
            Action::ReadNotification | Action::ModifyNotification,
            Resource::Notification { recipient },
        ) => actor.user_id == recipient,
        (Action::ModifyDonorProfile, Resource::Donor { user_id }) => {
            actor.user_id == user_id || actor.is_admin()
        }
        (Action::CreateHospital, Resource::Hospitals) => actor.is_admin(),
        _ => false,
    };

    if allowed {
        Decision::Allow
    } else {
        Decision::Deny
    }
}

/// [`authorize`] as a `Result`, with a 401 carrying `message` on deny.
pub fn ensure(
    actor: &Actor,
    action: Action,
    resource: Resource<'_>,
    message: &str,
) -> Result<(), AppError> {
    match authorize(actor, action, resource) {
        Decision::Allow => Ok(()),
        Decision::Deny => {
            tracing::warn!(
                user_id = %actor.user_id,
                action = ?action,
                "Authorization denied"
            );
            Err(AppError::Unauthorized(message.to_string()))
        }
    }
}
