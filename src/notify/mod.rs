//! In-app notification fan-out.
//!
//! One template is expanded into a notification per recipient and written in a single batch.
//! Delivery is pull-based: clients list their notifications through the API.

use chrono::{DateTime, Duration, Utc};

use crate::db::Repository;
use crate::errors::AppError;
use crate::models::{
    BloodRequest, NewNotification, NotificationPriority, NotificationType, RelatedModel,
    RelatedRef, RequestStatus, Urgency,
};

/// Content shared by every recipient of a fan-out.
#[derive(Debug, Clone)]
pub struct NotificationTemplate {
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub priority: NotificationPriority,
    pub related: Option<RelatedRef>,
}

impl NotificationTemplate {
    /// Sent to each matched donor when a request is created.
    pub fn new_request(request: &BloodRequest) -> Self {
        let place = request
            .hospital_name
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or(request.address.city.as_str());

        Self {
            kind: NotificationType::BloodRequest,
            title: format!("Urgent: {} blood needed", request.blood_type),
            message: format!(
                "{} {} unit(s) of {} blood needed at {}. Can you help?",
                urgency_label(request.urgency),
                request.units_needed,
                request.blood_type,
                place
            ),
            priority: priority_for(request.urgency),
            related: Some(request_ref(request)),
        }
    }

    /// Sent to the requester when a donor answers.
    pub fn donor_response(request: &BloodRequest, accepted: bool) -> Self {
        let (title, verb) = if accepted {
            ("A donor accepted your request", "accepted")
        } else {
            ("A donor declined your request", "declined")
        };

        Self {
            kind: NotificationType::DonorResponse,
            title: title.to_string(),
            message: format!(
                "A donor has {} your request for {} blood.",
                verb, request.blood_type
            ),
            priority: if accepted {
                NotificationPriority::High
            } else {
                NotificationPriority::Medium
            },
            related: Some(request_ref(request)),
        }
    }

    /// Sent to accepted donors when the requester closes the request.
    pub fn request_closed(request: &BloodRequest) -> Self {
        let message = match request.status {
            RequestStatus::Fulfilled => format!(
                "The request for {} blood has been fulfilled. Thank you for offering to help!",
                request.blood_type
            ),
            _ => format!(
                "The request for {} blood has been cancelled. No further action is needed.",
                request.blood_type
            ),
        };

        Self {
            kind: NotificationType::RequestClosed,
            title: format!("Blood request {}", request.status.as_str()),
            message,
            priority: NotificationPriority::Medium,
            related: Some(request_ref(request)),
        }
    }
}

fn request_ref(request: &BloodRequest) -> RelatedRef {
    RelatedRef {
        related_to: request.id.clone(),
        on_model: RelatedModel::BloodRequest,
    }
}

fn urgency_label(urgency: Urgency) -> &'static str {
    match urgency {
        Urgency::Critical => "Critical:",
        Urgency::Urgent => "Urgent:",
        Urgency::Scheduled => "Scheduled:",
    }
}

fn priority_for(urgency: Urgency) -> NotificationPriority {
    match urgency {
        Urgency::Critical | Urgency::Urgent => NotificationPriority::High,
        Urgency::Scheduled => NotificationPriority::Medium,
    }
}

/// Expand `template` for each recipient. Duplicate recipients get a single copy.
pub fn build_batch(
    recipients: &[String],
    template: &NotificationTemplate,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Vec<NewNotification> {
    let mut seen = std::collections::HashSet::new();
    recipients
        .iter()
        .filter(|user_id| seen.insert(user_id.as_str()))
        .map(|user_id| NewNotification {
            user_id: user_id.clone(),
            kind: template.kind,
            title: template.title.clone(),
            message: template.message.clone(),
            related: template.related.clone(),
            priority: template.priority,
            expires_at: now + ttl,
        })
        .collect()
}

/// Write one notification per recipient. Returns how many were written.
pub async fn fan_out(
    repo: &Repository,
    recipients: &[String],
    template: &NotificationTemplate,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<usize, AppError> {
    if recipients.is_empty() {
        return Ok(0);
    }

    let batch = build_batch(recipients, template, ttl, now);
    let written = repo.insert_notifications(&batch).await?;
    tracing::info!(
        kind = template.kind.as_str(),
        recipients = written,
        "Notifications sent"
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    use crate::db::init_database;

    fn template() -> NotificationTemplate {
        NotificationTemplate {
            kind: NotificationType::System,
            title: "Maintenance".to_string(),
            message: "Back soon".to_string(),
            priority: NotificationPriority::Low,
            related: None,
        }
    }

    #[test]
    fn test_build_batch_dedupes_and_sets_expiry() {
        let now = Utc::now();
        let recipients = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        let batch = build_batch(&recipients, &template(), Duration::days(30), now);

        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].user_id, "a");
        assert_eq!(batch[1].user_id, "b");
        assert!(batch.iter().all(|n| n.expires_at == now + Duration::days(30)));
    }

    #[tokio::test]
    async fn test_fan_out_writes_one_per_recipient() {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("notify.sqlite")).await.unwrap();
        let repo = Repository::new(pool);

        let recipients = vec!["a".to_string(), "b".to_string()];
        let written = fan_out(&repo, &recipients, &template(), Duration::days(30), Utc::now())
            .await
            .unwrap();
        assert_eq!(written, 2);
        assert_eq!(repo.list_notifications("a", 50).await.unwrap().len(), 1);
        assert_eq!(repo.list_notifications("b", 50).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fan_out_empty_is_noop() {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("notify.sqlite")).await.unwrap();
        let repo = Repository::new(pool);

        let written = fan_out(&repo, &[], &template(), Duration::days(30), Utc::now())
            .await
            .unwrap();
        assert_eq!(written, 0);
    }
}
