use std::sync::Arc;

use futures_util::future::join_all;
use perfdesk_core::types::{collections::NOTIFICATIONS, NewNotification, Notification};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::codec;
use crate::error::{LogFailure, Result};
use crate::resolver::Resolver;
use crate::subscription::{Callback, Subscription};

use super::{insert, typed};

/// Per-recipient notification records.
#[derive(Clone)]
pub struct NotificationRepository {
    resolver: Resolver,
}

impl NotificationRepository {
    pub fn new(resolver: Resolver) -> Self {
        Self { resolver }
    }

    pub async fn create(&self, notification: NewNotification) -> Result<Notification> {
        insert(&self.resolver, NOTIFICATIONS, |id, now| notification.into_record(id, now)).await
    }

    /// A user's notifications, newest first.
    pub async fn for_user(&self, user_id: &str) -> Result<Vec<Notification>> {
        let records = self.resolver.find_where(NOTIFICATIONS, "userId", &json!(user_id)).await?;
        let mut notifications: Vec<Notification> = codec::decode_list(NOTIFICATIONS, records);
        newest_first(&mut notifications);
        Ok(notifications)
    }

    pub async fn mark_read(&self, notification_id: &str) -> Result<()> {
        let path = format!("{NOTIFICATIONS}/{notification_id}");
        self.resolver
            .store()
            .merge_update(&path, codec::single_field("read", Value::Bool(true)))
            .await
            .log_failure(|| format!("Mark {path} read"))
    }

    /// Mark every unread notification of `user_id` as read and return how
    /// many were updated. Records already read are left alone, so a repeat
    /// call issues no writes.
    pub async fn mark_all_read(&self, user_id: &str) -> Result<usize> {
        let unread: Vec<String> = self
            .for_user(user_id)
            .await?
            .into_iter()
            .filter(|n| !n.read)
            .map(|n| n.id)
            .collect();
        if unread.is_empty() {
            debug!(%user_id, "No unread notifications");
            return Ok(0);
        }

        let results = join_all(unread.iter().map(|id| self.mark_read(id))).await;
        let mut updated = 0;
        let mut first_error = None;
        for result in results {
            match result {
                Ok(()) => updated += 1,
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => {
                info!(%user_id, updated, "Notifications marked read");
                Ok(updated)
            }
        }
    }

    /// Follow a user's notifications, newest first.
    pub fn subscribe_for_user(
        &self,
        user_id: &str,
        on_update: Callback<Vec<Notification>>,
    ) -> Result<Subscription> {
        let sorted: Callback<Vec<Notification>> = Arc::new(move |mut notifications: Vec<Notification>| {
            newest_first(&mut notifications);
            on_update(notifications);
        });
        self.resolver
            .subscribe_where(NOTIFICATIONS, "userId", json!(user_id), typed(NOTIFICATIONS, sorted))
    }
}

fn newest_first(notifications: &mut [Notification]) {
    notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
