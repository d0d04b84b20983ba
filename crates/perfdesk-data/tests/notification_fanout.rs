//! Integration tests for notification fan-out: who gets notified, and how
//! side-effect failures stay apart from primary-write failures.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use perfdesk_core::types::{NewAdminRating, NewFeedback, NewGoal, NewMetric, NotificationKind};
use perfdesk_data::DataError;
use perfdesk_store::{MemoryStore, StoreError};
use serde_json::json;

use common::{indexed_store, service_over, FaultyStore};

fn goal_for(employee_id: &str) -> NewGoal {
    NewGoal {
        employee_id: employee_id.into(),
        title: "Reduce churn".into(),
        target_date: "2024-12-31".into(),
        ..NewGoal::default()
    }
}

fn admins(count: usize) -> serde_json::Value {
    let mut users = serde_json::Map::new();
    for i in 0..count {
        users.insert(format!("admin{i}"), json!({"role": "admin", "name": format!("Admin {i}")}));
    }
    users.insert("staff".into(), json!({"role": "employee"}));
    json!({
        "users": users,
        "employees": {"e1": {"name": "Lin", "userId": "staff"}}
    })
}

// =============================================================================
// Recipient resolution
// =============================================================================

#[tokio::test]
async fn test_goal_for_linked_employee_notifies_once() {
    let service = service_over(Arc::new(indexed_store(json!({
        "employees": {"e1": {"name": "Ada", "userId": "u1"}}
    }))));

    let created = service.goals().create_reported(goal_for("e1")).await.unwrap();
    assert_eq!(created.notifications.delivered.len(), 1);

    let inbox = service.notifications().for_user("u1").await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationKind::Goal);
    assert_eq!(inbox[0].related_item_id.as_deref(), Some(created.record.id.as_str()));
    assert!(!inbox[0].read);
}

#[tokio::test]
async fn test_goal_for_unlinked_employee_notifies_nobody() {
    let store = indexed_store(json!({"employees": {"e1": {"name": "Ada"}}}));
    let service = service_over(Arc::new(store.clone()));

    let goal = service.goals().create(goal_for("e1")).await.unwrap();
    assert_eq!(service.goals().get(&goal.id).await.unwrap(), Some(goal));
    assert!(store.export().unwrap().get("notifications").is_none());
}

#[tokio::test]
async fn test_goal_for_unknown_employee_still_succeeds() {
    let service = service_over(Arc::new(indexed_store(json!({}))));
    let created = service.goals().create_reported(goal_for("ghost")).await.unwrap();
    assert_eq!(created.notifications.attempted(), 0);
    assert!(created.notifications.is_clean());
}

#[tokio::test]
async fn test_request_notifies_every_admin() {
    let store = indexed_store(admins(3));
    let service = service_over(Arc::new(store.clone()));

    let created = service
        .feedback()
        .create_reported(NewFeedback {
            employee_id: Some("e1".into()),
            category: "request-review".into(),
            ..NewFeedback::default()
        })
        .await
        .unwrap();
    assert_eq!(created.notifications.delivered.len(), 3);

    for admin in ["admin0", "admin1", "admin2"] {
        let inbox = service.notifications().for_user(admin).await.unwrap();
        assert_eq!(inbox.len(), 1, "{admin}");
        assert_eq!(inbox[0].kind, NotificationKind::Request);
        assert_eq!(inbox[0].message, "Lin has requested review feedback");
        assert_eq!(inbox[0].related_item_type.as_deref(), Some("feedback"));
    }
    assert!(service.notifications().for_user("staff").await.unwrap().is_empty());

    // One record per recipient, each with its own key.
    let tree = store.export().unwrap();
    assert_eq!(tree["notifications"].as_object().map(|n| n.len()), Some(3));
}

#[tokio::test]
async fn test_request_with_no_admins() {
    let service = service_over(Arc::new(indexed_store(json!({"users": {"u1": {"role": "employee"}}}))));
    let created = service
        .feedback()
        .create_reported(NewFeedback {
            category: "request-peer".into(),
            requested_by: Some("Kim".into()),
            ..NewFeedback::default()
        })
        .await
        .unwrap();
    assert_eq!(created.notifications.attempted(), 0);
}

#[tokio::test]
async fn test_admin_role_comes_from_config() {
    let store = indexed_store(json!({"users": {
        "a1": {"role": "admin"},
        "m1": {"role": "manager"}
    }}));
    let config = perfdesk_core::config::NotificationConfig {
        admin_role: "manager".into(),
        ..Default::default()
    };
    let service = perfdesk_data::DataService::new(Arc::new(store), config);
    let created = service
        .feedback()
        .create_reported(NewFeedback {
            category: "request-growth".into(),
            requested_by: Some("Kim".into()),
            ..NewFeedback::default()
        })
        .await
        .unwrap();
    assert_eq!(created.notifications.recipients, vec!["m1"]);
    assert_eq!(created.notifications.delivered[0].message, "Kim has requested growth feedback");
}

// =============================================================================
// Failure isolation
// =============================================================================

#[tokio::test]
async fn test_one_failed_recipient_does_not_stop_the_rest() {
    let store = FaultyStore::new(indexed_store(admins(4)));
    store.fail_notifications_for("admin2");
    let service = service_over(store.clone());

    let created = service
        .feedback()
        .create_reported(NewFeedback {
            employee_id: Some("e1".into()),
            category: "request-review".into(),
            ..NewFeedback::default()
        })
        .await
        .unwrap();

    let report = &created.notifications;
    assert_eq!(report.attempted(), 4);
    assert_eq!(report.delivered.len(), 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].user_id.as_deref(), Some("admin2"));

    // The feedback itself landed.
    assert!(service.feedback().get(&created.record.id).await.unwrap().is_some());
    for admin in ["admin0", "admin1", "admin3"] {
        assert_eq!(service.notifications().for_user(admin).await.unwrap().len(), 1);
    }
    assert!(service.notifications().for_user("admin2").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_recipients_do_not_fail_the_write() {
    let store = FaultyStore::new(indexed_store(json!({"users": {"a1": {"role": "admin"}}})));
    store.fail_writes_to("notifications");
    let service = service_over(store.clone());

    let created = service
        .ratings()
        .create_reported(NewAdminRating {
            admin_id: "a1".into(),
            employee_id: "e1".into(),
            rating: Some(4.0),
            ..NewAdminRating::default()
        })
        .await
        .unwrap();
    assert!(!created.notifications.is_clean());
    assert_eq!(service.ratings().by_admin("a1").await.unwrap(), vec![created.record]);
}

#[tokio::test]
async fn test_recipient_lookup_failure_does_not_fail_the_write() {
    let store = FaultyStore::new(indexed_store(json!({
        "employees": {"e1": {"name": "Ada", "userId": "u1"}}
    })));
    let service = service_over(store.clone());

    // Reads fail, writes still go through.
    store.offline.store(true, Ordering::SeqCst);
    let created = service.goals().create_reported(goal_for("e1")).await.unwrap();
    store.offline.store(false, Ordering::SeqCst);

    let report = &created.notifications;
    assert_eq!(report.attempted(), 0);
    assert!(report.delivered.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].user_id.is_none());
    assert!(report.failures[0].reason.contains("offline"));

    assert_eq!(service.goals().get(&created.record.id).await.unwrap(), Some(created.record.clone()));
    assert!(service.notifications().for_user("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_lookup_failure_does_not_fail_the_request() {
    let store = FaultyStore::new(indexed_store(admins(2)));
    let service = service_over(store.clone());

    store.offline.store(true, Ordering::SeqCst);
    let created = service
        .feedback()
        .create_reported(NewFeedback {
            employee_id: Some("e1".into()),
            category: "request-review".into(),
            ..NewFeedback::default()
        })
        .await
        .unwrap();
    store.offline.store(false, Ordering::SeqCst);

    assert_eq!(created.notifications.failures.len(), 1);
    assert!(created.notifications.failures[0].user_id.is_none());
    assert!(service.feedback().get(&created.record.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_primary_failure_fails_and_skips_notifications() {
    let store = FaultyStore::new(indexed_store(json!({
        "employees": {"e1": {"name": "Ada", "userId": "u1"}}
    })));
    store.fail_writes_to("performanceMetrics");
    let service = service_over(store.clone());

    let err = service
        .metrics()
        .create(NewMetric {
            employee_id: "e1".into(),
            metric: "quality".into(),
            value: 90.0,
            ..NewMetric::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::Store(StoreError::PermissionDenied(_))));
    assert!(service.notifications().for_user("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_fanout_works_without_indexes() {
    let service = service_over(Arc::new(MemoryStore::from_json(json!({
        "employees": {"e1": {"name": "Ada", "userId": "u1"}}
    }))));
    service
        .metrics()
        .create(NewMetric {
            employee_id: "e1".into(),
            metric: "velocity".into(),
            value: 75.0,
            ..NewMetric::default()
        })
        .await
        .unwrap();

    let inbox = service.notifications().for_user("u1").await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationKind::Review);
    assert_eq!(inbox[0].message, "Your velocity performance has been updated to 75%");
}
