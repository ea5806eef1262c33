//! In-app notification model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    BloodRequest,
    DonorResponse,
    RequestUpdate,
    RequestClosed,
    RequestFulfilled,
    DonationReminder,
    ThankYou,
    System,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::BloodRequest => "blood_request",
            NotificationType::DonorResponse => "donor_response",
            NotificationType::RequestUpdate => "request_update",
            NotificationType::RequestClosed => "request_closed",
            NotificationType::RequestFulfilled => "request_fulfilled",
            NotificationType::DonationReminder => "donation_reminder",
            NotificationType::ThankYou => "thank_you",
            NotificationType::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "blood_request" => Some(NotificationType::BloodRequest),
            "donor_response" => Some(NotificationType::DonorResponse),
            "request_update" => Some(NotificationType::RequestUpdate),
            "request_closed" => Some(NotificationType::RequestClosed),
            "request_fulfilled" => Some(NotificationType::RequestFulfilled),
            "donation_reminder" => Some(NotificationType::DonationReminder),
            "thank_you" => Some(NotificationType::ThankYou),
            "system" => Some(NotificationType::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    High,
    #[default]
    Medium,
    Low,
}

impl NotificationPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationPriority::High => "high",
            NotificationPriority::Medium => "medium",
            NotificationPriority::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "high" => Some(NotificationPriority::High),
            "medium" => Some(NotificationPriority::Medium),
            "low" => Some(NotificationPriority::Low),
            _ => None,
        }
    }
}

/// Kind of entity a notification points at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RelatedModel {
    BloodRequest,
    Donor,
    Hospital,
}

impl RelatedModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelatedModel::BloodRequest => "BloodRequest",
            RelatedModel::Donor => "Donor",
            RelatedModel::Hospital => "Hospital",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BloodRequest" => Some(RelatedModel::BloodRequest),
            "Donor" => Some(RelatedModel::Donor),
            "Hospital" => Some(RelatedModel::Hospital),
            _ => None,
        }
    }
}

/// Reference from a notification to the entity that triggered it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RelatedRef {
    pub related_to: String,
    pub on_model: RelatedModel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(flatten)]
    pub related: Option<RelatedRef>,
    pub priority: NotificationPriority,
    pub read: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A notification ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: String,
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub related: Option<RelatedRef>,
    pub priority: NotificationPriority,
    pub expires_at: DateTime<Utc>,
}
