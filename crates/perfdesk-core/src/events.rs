use serde::{Deserialize, Serialize};

use crate::types::{AdminRating, Feedback, Goal, NotificationKind, PerformanceMetric};

/// Domain events raised after a primary write has landed.
///
/// Events carry just enough context for the notification dispatcher to
/// find recipients and compose a message without re-reading the record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum DomainEvent {
    /// A goal was created for an employee.
    GoalAssigned {
        goal_id: String,
        employee_id: String,
        title: String,
    },

    /// Feedback was written about an employee.
    FeedbackGiven {
        feedback_id: String,
        employee_id: String,
        reviewer_name: Option<String>,
    },

    /// An employee asked the admins for feedback.
    FeedbackRequested {
        feedback_id: String,
        employee_id: Option<String>,
        requested_by: Option<String>,
        /// Category with the request prefix already stripped.
        topic: String,
    },

    /// A performance metric was recorded for an employee.
    MetricUpdated {
        metric_id: String,
        employee_id: String,
        metric: String,
        value: f64,
    },

    /// An admin received a leadership rating.
    RatingGiven { rating_id: String, admin_id: String },
}

impl DomainEvent {
    pub fn goal_assigned(goal: &Goal) -> Self {
        DomainEvent::GoalAssigned {
            goal_id: goal.id.clone(),
            employee_id: goal.employee_id.clone(),
            title: goal.title.clone(),
        }
    }

    /// Classify a new feedback record. Returns `None` for direct feedback
    /// that names no employee, since nobody can be told about it.
    pub fn from_feedback(feedback: &Feedback, request_prefix: &str) -> Option<Self> {
        if let Some(topic) = feedback.category.strip_prefix(request_prefix) {
            return Some(DomainEvent::FeedbackRequested {
                feedback_id: feedback.id.clone(),
                employee_id: feedback.employee_id.clone(),
                requested_by: feedback.requested_by.clone(),
                topic: topic.to_string(),
            });
        }
        feedback
            .employee_id
            .as_ref()
            .map(|employee_id| DomainEvent::FeedbackGiven {
                feedback_id: feedback.id.clone(),
                employee_id: employee_id.clone(),
                reviewer_name: feedback.reviewer_name.clone(),
            })
    }

    pub fn metric_updated(metric: &PerformanceMetric) -> Self {
        DomainEvent::MetricUpdated {
            metric_id: metric.id.clone(),
            employee_id: metric.employee_id.clone(),
            metric: metric.metric.clone(),
            value: metric.value,
        }
    }

    pub fn rating_given(rating: &AdminRating) -> Self {
        DomainEvent::RatingGiven {
            rating_id: rating.id.clone(),
            admin_id: rating.admin_id.clone(),
        }
    }

    /// The notification kind this event produces.
    pub fn notification_kind(&self) -> NotificationKind {
        match self {
            DomainEvent::GoalAssigned { .. } => NotificationKind::Goal,
            DomainEvent::FeedbackGiven { .. } => NotificationKind::Feedback,
            DomainEvent::FeedbackRequested { .. } => NotificationKind::Request,
            DomainEvent::MetricUpdated { .. } => NotificationKind::Review,
            DomainEvent::RatingGiven { .. } => NotificationKind::Rating,
        }
    }

    /// The `(relatedItemId, relatedItemType)` pair stamped on notifications.
    pub fn related_item(&self) -> (&str, &'static str) {
        match self {
            DomainEvent::GoalAssigned { goal_id, .. } => (goal_id.as_str(), "goal"),
            DomainEvent::FeedbackGiven { feedback_id, .. }
            | DomainEvent::FeedbackRequested { feedback_id, .. } => (feedback_id.as_str(), "feedback"),
            DomainEvent::MetricUpdated { metric_id, .. } => (metric_id.as_str(), "metric"),
            DomainEvent::RatingGiven { rating_id, .. } => (rating_id.as_str(), "adminRating"),
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::GoalAssigned { .. } => "goal_assigned",
            DomainEvent::FeedbackGiven { .. } => "feedback_given",
            DomainEvent::FeedbackRequested { .. } => "feedback_requested",
            DomainEvent::MetricUpdated { .. } => "metric_updated",
            DomainEvent::RatingGiven { .. } => "rating_given",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn feedback(category: &str, employee_id: Option<&str>) -> Feedback {
        Feedback {
            id: "f1".into(),
            employee_id: employee_id.map(String::from),
            category: category.into(),
            content: None,
            rating: None,
            reviewer_id: None,
            reviewer_name: Some("Dana".into()),
            requested_by: Some("Sam".into()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_request_feedback_classification() {
        let event = DomainEvent::from_feedback(&feedback("request-peer", Some("e1")), "request-")
            .unwrap();
        match &event {
            DomainEvent::FeedbackRequested { topic, requested_by, .. } => {
                assert_eq!(topic, "peer");
                assert_eq!(requested_by.as_deref(), Some("Sam"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(event.notification_kind(), NotificationKind::Request);
        assert_eq!(event.related_item(), ("f1", "feedback"));
    }

    #[test]
    fn test_direct_feedback_classification() {
        let event = DomainEvent::from_feedback(&feedback("performance", Some("e1")), "request-")
            .unwrap();
        assert!(matches!(event, DomainEvent::FeedbackGiven { .. }));
        assert_eq!(event.notification_kind(), NotificationKind::Feedback);
    }

    #[test]
    fn test_direct_feedback_without_employee_has_no_event() {
        assert!(DomainEvent::from_feedback(&feedback("performance", None), "request-").is_none());
    }

    #[test]
    fn test_kind_and_related_item_mapping() {
        let rating = DomainEvent::RatingGiven {
            rating_id: "r1".into(),
            admin_id: "a1".into(),
        };
        assert_eq!(rating.notification_kind(), NotificationKind::Rating);
        assert_eq!(rating.related_item(), ("r1", "adminRating"));
        assert_eq!(rating.name(), "rating_given");

        let metric = DomainEvent::MetricUpdated {
            metric_id: "m1".into(),
            employee_id: "e1".into(),
            metric: "quality".into(),
            value: 87.5,
        };
        assert_eq!(metric.notification_kind(), NotificationKind::Review);
        assert_eq!(metric.related_item(), ("m1", "metric"));
    }
}
