use std::sync::Arc;

use perfdesk_core::types::{collections::FEEDBACKS, Feedback, FeedbackUpdate, NewFeedback};
use perfdesk_core::DomainEvent;
use serde_json::json;
use tracing::debug;

use crate::codec;
use crate::dispatcher::{DispatchReport, NotificationDispatcher};
use crate::error::{LogFailure, Result};
use crate::resolver::Resolver;
use crate::subscription::{Callback, Subscription};

use super::{insert, typed, Created};

/// Feedback records. A category starting with the configured request
/// prefix marks a request to the admins rather than feedback given.
#[derive(Clone)]
pub struct FeedbackRepository {
    resolver: Resolver,
    dispatcher: Arc<NotificationDispatcher>,
}

impl FeedbackRepository {
    pub fn new(resolver: Resolver, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self { resolver, dispatcher }
    }

    pub async fn list(&self) -> Result<Vec<Feedback>> {
        let records = self.resolver.all(FEEDBACKS).await?;
        Ok(codec::decode_list(FEEDBACKS, records))
    }

    pub async fn get(&self, feedback_id: &str) -> Result<Option<Feedback>> {
        self.resolver
            .get(FEEDBACKS, feedback_id)
            .await?
            .map(|value| codec::decode(FEEDBACKS, feedback_id, value))
            .transpose()
    }

    pub async fn for_employee(&self, employee_id: &str) -> Result<Vec<Feedback>> {
        let records = self
            .resolver
            .find_where(FEEDBACKS, "employeeId", &json!(employee_id))
            .await?;
        Ok(codec::decode_list(FEEDBACKS, records))
    }

    pub async fn create(&self, feedback: NewFeedback) -> Result<Feedback> {
        Ok(self.create_reported(feedback).await?.record)
    }

    /// Create feedback, then notify the employee's account, or every admin
    /// when the record is a request.
    pub async fn create_reported(&self, feedback: NewFeedback) -> Result<Created<Feedback>> {
        let record = insert(&self.resolver, FEEDBACKS, |id, now| feedback.into_record(id, now)).await?;
        let prefix = &self.dispatcher.config().request_prefix;
        let notifications = match DomainEvent::from_feedback(&record, prefix) {
            Some(event) => self.dispatcher.dispatch(&event).await,
            None => {
                debug!(feedback_id = %record.id, "Feedback names no employee, nobody to notify");
                DispatchReport::default()
            }
        };
        Ok(Created { record, notifications })
    }

    pub async fn update(&self, feedback_id: &str, update: FeedbackUpdate) -> Result<()> {
        let path = format!("{FEEDBACKS}/{feedback_id}");
        let partial = update.into_partial()?;
        self.resolver
            .store()
            .merge_update(&path, partial)
            .await
            .log_failure(|| format!("Update {path}"))
    }

    pub async fn delete(&self, feedback_id: &str) -> Result<()> {
        let path = format!("{FEEDBACKS}/{feedback_id}");
        self.resolver
            .store()
            .delete(&path)
            .await
            .log_failure(|| format!("Delete {path}"))
    }

    pub fn subscribe_for_employee(
        &self,
        employee_id: &str,
        on_update: Callback<Vec<Feedback>>,
    ) -> Result<Subscription> {
        self.resolver.subscribe_where(
            FEEDBACKS,
            "employeeId",
            json!(employee_id),
            typed(FEEDBACKS, on_update),
        )
    }
}
