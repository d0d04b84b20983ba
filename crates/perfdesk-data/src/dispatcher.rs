//! Notification fan-out.
//!
//! The dispatcher turns a [`DomainEvent`] into one notification record per
//! recipient. It is a best-effort side channel: recipient lookups and
//! notification writes may fail, and every such failure is logged and
//! recorded in the returned [`DispatchReport`], but `dispatch` itself never
//! fails. The write that raised the event stands regardless.

use futures_util::future::join_all;
use perfdesk_core::config::NotificationConfig;
use perfdesk_core::types::collections::{EMPLOYEES, USERS};
use perfdesk_core::types::{NewNotification, Notification};
use perfdesk_core::DomainEvent;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::repository::NotificationRepository;
use crate::resolver::Resolver;

/// Outcome of one dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    /// Short event name, empty when nothing was dispatched.
    pub event: &'static str,
    /// Accounts a notification was addressed to.
    pub recipients: Vec<String>,
    /// Notifications that were written.
    pub delivered: Vec<Notification>,
    pub failures: Vec<DispatchFailure>,
}

/// A side-effect failure. `user_id` is `None` when recipients could not be
/// resolved at all.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchFailure {
    pub user_id: Option<String>,
    pub reason: String,
}

impl DispatchReport {
    fn for_event(event: &DomainEvent) -> Self {
        Self {
            event: event.name(),
            ..Self::default()
        }
    }

    pub fn attempted(&self) -> usize {
        self.recipients.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct NotificationDispatcher {
    resolver: Resolver,
    notifications: NotificationRepository,
    config: NotificationConfig,
}

impl NotificationDispatcher {
    pub fn new(resolver: Resolver, config: NotificationConfig) -> Self {
        Self {
            notifications: NotificationRepository::new(resolver.clone()),
            resolver,
            config,
        }
    }

    pub fn config(&self) -> &NotificationConfig {
        &self.config
    }

    /// Notify everyone `event` concerns. All notification writes are issued
    /// together and awaited together; one failing does not stop the rest.
    pub async fn dispatch(&self, event: &DomainEvent) -> DispatchReport {
        let mut report = DispatchReport::for_event(event);
        if !self.config.enabled {
            debug!(event = event.name(), "Notifications disabled");
            return report;
        }

        let notices = match self.compose(event).await {
            Ok(notices) => notices,
            Err(e) => {
                error!(event = event.name(), error = %e, "Failed to resolve notification recipients");
                report.failures.push(DispatchFailure {
                    user_id: None,
                    reason: e.to_string(),
                });
                return report;
            }
        };
        if notices.is_empty() {
            debug!(event = event.name(), "No recipients");
            return report;
        }

        report.recipients = notices.iter().map(|n| n.user_id.clone()).collect();
        let results = join_all(notices.into_iter().map(|notice| {
            let user_id = notice.user_id.clone();
            async move { (user_id, self.notifications.create(notice).await) }
        }))
        .await;

        for (user_id, result) in results {
            match result {
                Ok(notification) => report.delivered.push(notification),
                Err(e) => {
                    error!(event = event.name(), %user_id, error = %e, "Failed to create notification");
                    report.failures.push(DispatchFailure {
                        user_id: Some(user_id),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            event = event.name(),
            delivered = report.delivered.len(),
            failed = report.failures.len(),
            "Notifications dispatched"
        );
        report
    }

    /// Resolve recipients and build one notification for each.
    async fn compose(&self, event: &DomainEvent) -> Result<Vec<NewNotification>> {
        let (recipients, title, message): (Vec<String>, &str, String) = match event {
            DomainEvent::GoalAssigned { employee_id, title, .. } => (
                self.employee_account(employee_id).await?.into_iter().collect(),
                "New Goal Assigned",
                format!("A new goal has been assigned to you: {title}"),
            ),
            DomainEvent::FeedbackGiven {
                employee_id,
                reviewer_name,
                ..
            } => (
                self.employee_account(employee_id).await?.into_iter().collect(),
                "New Feedback",
                format!(
                    "You've received new feedback from {}",
                    reviewer_name.as_deref().unwrap_or("your manager")
                ),
            ),
            DomainEvent::FeedbackRequested {
                employee_id,
                requested_by,
                topic,
                ..
            } => {
                let requester = self.requester_name(employee_id.as_deref(), requested_by.as_deref()).await;
                (
                    self.admin_accounts().await?,
                    "New Feedback Request",
                    format!("{requester} has requested {topic} feedback"),
                )
            }
            DomainEvent::MetricUpdated {
                employee_id,
                metric,
                value,
                ..
            } => (
                self.employee_account(employee_id).await?.into_iter().collect(),
                "Performance Update",
                format!("Your {metric} performance has been updated to {value}%"),
            ),
            DomainEvent::RatingGiven { admin_id, .. } => (
                self.admin_account(admin_id).await?.into_iter().collect(),
                "New Leadership Rating",
                "You received new feedback on your leadership".to_string(),
            ),
            _ => {
                debug!(event = event.name(), "No notification rule");
                return Ok(Vec::new());
            }
        };

        let kind = event.notification_kind();
        let (item_id, item_type) = event.related_item();
        Ok(recipients
            .into_iter()
            .map(|user_id| NewNotification::unread(user_id, kind, title, message.clone()).related_to(item_id, item_type))
            .collect())
    }

    /// The account linked to an employee, if any.
    async fn employee_account(&self, employee_id: &str) -> Result<Option<String>> {
        let account = self
            .resolver
            .get(EMPLOYEES, employee_id)
            .await?
            .as_ref()
            .and_then(|employee| employee.get("userId"))
            .and_then(Value::as_str)
            .filter(|user_id| !user_id.is_empty())
            .map(str::to_string);
        if account.is_none() {
            debug!(%employee_id, "Employee has no linked account");
        }
        Ok(account)
    }

    /// An admin is addressed by their account id; the account must exist.
    async fn admin_account(&self, admin_id: &str) -> Result<Option<String>> {
        let exists = self.resolver.get(USERS, admin_id).await?.is_some();
        if !exists {
            debug!(%admin_id, "Rated admin has no account");
        }
        Ok(exists.then(|| admin_id.to_string()))
    }

    /// Every account holding the admin role. Accounts are few, so this is a
    /// plain scan rather than an indexed query.
    async fn admin_accounts(&self) -> Result<Vec<String>> {
        let admins = self
            .resolver
            .scan_where(USERS, "role", &json!(self.config.admin_role))
            .await?;
        Ok(admins
            .iter()
            .filter_map(|user| user.get("id").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    /// Who to name in a feedback request. Lookup failures only cost the
    /// name, never the notification.
    async fn requester_name(&self, employee_id: Option<&str>, requested_by: Option<&str>) -> String {
        if let Some(employee_id) = employee_id {
            match self.resolver.get(EMPLOYEES, employee_id).await {
                Ok(Some(employee)) => {
                    if let Some(name) = employee.get("name").and_then(Value::as_str).filter(|n| !n.is_empty()) {
                        return name.to_string();
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(%employee_id, error = %e, "Could not look up requester"),
            }
        }
        requested_by
            .filter(|name| !name.is_empty())
            .unwrap_or("An employee")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perfdesk_core::types::NotificationKind;
    use perfdesk_store::MemoryStore;
    use std::sync::Arc;

    fn dispatcher(seed: Value) -> (NotificationDispatcher, NotificationRepository) {
        let store = MemoryStore::from_json(seed)
            .with_indexes([("notifications", "userId")])
            .unwrap();
        let resolver = Resolver::new(Arc::new(store));
        (
            NotificationDispatcher::new(resolver.clone(), NotificationConfig::default()),
            NotificationRepository::new(resolver),
        )
    }

    #[tokio::test]
    async fn test_goal_notifies_linked_account() {
        let (dispatcher, notifications) = dispatcher(json!({
            "employees": {"e1": {"name": "Ada", "userId": "u1"}}
        }));
        let report = dispatcher
            .dispatch(&DomainEvent::GoalAssigned {
                goal_id: "g1".into(),
                employee_id: "e1".into(),
                title: "Ship v2".into(),
            })
            .await;

        assert_eq!(report.event, "goal_assigned");
        assert_eq!(report.recipients, vec!["u1"]);
        assert!(report.is_clean());

        let stored = notifications.for_user("u1").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].kind, NotificationKind::Goal);
        assert_eq!(stored[0].title, "New Goal Assigned");
        assert_eq!(stored[0].message, "A new goal has been assigned to you: Ship v2");
        assert_eq!(stored[0].related_item_id.as_deref(), Some("g1"));
        assert_eq!(stored[0].related_item_type.as_deref(), Some("goal"));
        assert!(!stored[0].read);
    }

    #[tokio::test]
    async fn test_unlinked_employee_gets_nothing() {
        let (dispatcher, _) = dispatcher(json!({"employees": {"e1": {"name": "Ada"}}}));
        let report = dispatcher
            .dispatch(&DomainEvent::MetricUpdated {
                metric_id: "m1".into(),
                employee_id: "e1".into(),
                metric: "quality".into(),
                value: 87.0,
            })
            .await;
        assert_eq!(report.attempted(), 0);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_metric_message() {
        let (dispatcher, notifications) = dispatcher(json!({
            "employees": {"e1": {"name": "Ada", "userId": "u1"}}
        }));
        dispatcher
            .dispatch(&DomainEvent::MetricUpdated {
                metric_id: "m1".into(),
                employee_id: "e1".into(),
                metric: "quality".into(),
                value: 87.5,
            })
            .await;
        let stored = notifications.for_user("u1").await.unwrap();
        assert_eq!(stored[0].kind, NotificationKind::Review);
        assert_eq!(stored[0].message, "Your quality performance has been updated to 87.5%");
    }

    #[tokio::test]
    async fn test_request_names_requester() {
        let (dispatcher, notifications) = dispatcher(json!({
            "users": {
                "a1": {"role": "admin"},
                "a2": {"role": "admin"},
                "u9": {"role": "employee"}
            },
            "employees": {"e1": {"name": "Grace"}}
        }));
        let report = dispatcher
            .dispatch(&DomainEvent::FeedbackRequested {
                feedback_id: "f1".into(),
                employee_id: Some("e1".into()),
                requested_by: Some("ignored".into()),
                topic: "review".into(),
            })
            .await;
        assert_eq!(report.recipients, vec!["a1", "a2"]);
        assert_eq!(report.delivered.len(), 2);

        let stored = notifications.for_user("a2").await.unwrap();
        assert_eq!(stored[0].kind, NotificationKind::Request);
        assert_eq!(stored[0].message, "Grace has requested review feedback");
        assert!(notifications.for_user("u9").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_requester_name_fallbacks() {
        let (dispatcher, _) = dispatcher(json!({}));
        assert_eq!(dispatcher.requester_name(Some("missing"), Some("Sam")).await, "Sam");
        assert_eq!(dispatcher.requester_name(None, None).await, "An employee");
    }

    #[tokio::test]
    async fn test_rating_requires_admin_account() {
        let (dispatcher, _) = dispatcher(json!({"users": {"a1": {"role": "admin"}}}));
        let rated = dispatcher
            .dispatch(&DomainEvent::RatingGiven {
                rating_id: "r1".into(),
                admin_id: "a1".into(),
            })
            .await;
        assert_eq!(rated.delivered.len(), 1);
        assert_eq!(rated.delivered[0].related_item_type.as_deref(), Some("adminRating"));

        let unknown = dispatcher
            .dispatch(&DomainEvent::RatingGiven {
                rating_id: "r2".into(),
                admin_id: "ghost".into(),
            })
            .await;
        assert_eq!(unknown.attempted(), 0);
    }

    #[tokio::test]
    async fn test_disabled_dispatches_nothing() {
        let store = MemoryStore::from_json(json!({"employees": {"e1": {"name": "Ada", "userId": "u1"}}}));
        let config = NotificationConfig {
            enabled: false,
            ..NotificationConfig::default()
        };
        let dispatcher = NotificationDispatcher::new(Resolver::new(Arc::new(store)), config);
        let report = dispatcher
            .dispatch(&DomainEvent::GoalAssigned {
                goal_id: "g1".into(),
                employee_id: "e1".into(),
                title: "t".into(),
            })
            .await;
        assert_eq!(report.event, "goal_assigned");
        assert_eq!(report.attempted(), 0);
        assert!(report.delivered.is_empty());
    }
}
