use std::sync::Arc;

use perfdesk_core::types::{collections::GOALS, Goal, GoalUpdate, NewGoal};
use perfdesk_core::DomainEvent;
use serde_json::json;

use crate::codec;
use crate::dispatcher::NotificationDispatcher;
use crate::error::{LogFailure, Result};
use crate::resolver::Resolver;
use crate::subscription::{Callback, Subscription};

use super::{insert, typed, Created};

#[derive(Clone)]
pub struct GoalRepository {
    resolver: Resolver,
    dispatcher: Arc<NotificationDispatcher>,
}

impl GoalRepository {
    pub fn new(resolver: Resolver, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self { resolver, dispatcher }
    }

    pub async fn list(&self) -> Result<Vec<Goal>> {
        let records = self.resolver.all(GOALS).await?;
        Ok(codec::decode_list(GOALS, records))
    }

    pub async fn get(&self, goal_id: &str) -> Result<Option<Goal>> {
        self.resolver
            .get(GOALS, goal_id)
            .await?
            .map(|value| codec::decode(GOALS, goal_id, value))
            .transpose()
    }

    pub async fn for_employee(&self, employee_id: &str) -> Result<Vec<Goal>> {
        let records = self.resolver.find_where(GOALS, "employeeId", &json!(employee_id)).await?;
        Ok(codec::decode_list(GOALS, records))
    }

    /// Create a goal and notify the employee's account.
    pub async fn create(&self, goal: NewGoal) -> Result<Goal> {
        Ok(self.create_reported(goal).await?.record)
    }

    /// Like [`create`](Self::create), also returning the dispatch report.
    pub async fn create_reported(&self, goal: NewGoal) -> Result<Created<Goal>> {
        let record = insert(&self.resolver, GOALS, |id, now| goal.into_record(id, now)).await?;
        let notifications = self.dispatcher.dispatch(&DomainEvent::goal_assigned(&record)).await;
        Ok(Created { record, notifications })
    }

    pub async fn update(&self, goal_id: &str, update: GoalUpdate) -> Result<()> {
        let path = format!("{GOALS}/{goal_id}");
        let partial = update.into_partial(chrono::Utc::now())?;
        self.resolver
            .store()
            .merge_update(&path, partial)
            .await
            .log_failure(|| format!("Update {path}"))
    }

    /// Remove a goal. Notifications that point at it are kept.
    pub async fn delete(&self, goal_id: &str) -> Result<()> {
        let path = format!("{GOALS}/{goal_id}");
        self.resolver
            .store()
            .delete(&path)
            .await
            .log_failure(|| format!("Delete {path}"))
    }

    pub fn subscribe_for_employee(&self, employee_id: &str, on_update: Callback<Vec<Goal>>) -> Result<Subscription> {
        self.resolver
            .subscribe_where(GOALS, "employeeId", json!(employee_id), typed(GOALS, on_update))
    }
}
