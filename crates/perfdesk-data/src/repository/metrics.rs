use std::sync::Arc;

use perfdesk_core::types::{collections::METRICS, NewMetric, PerformanceMetric};
use perfdesk_core::DomainEvent;
use serde_json::json;

use crate::codec;
use crate::dispatcher::NotificationDispatcher;
use crate::error::Result;
use crate::resolver::Resolver;
use crate::subscription::{Callback, Subscription};

use super::{insert, typed, Created};

#[derive(Clone)]
pub struct MetricRepository {
    resolver: Resolver,
    dispatcher: Arc<NotificationDispatcher>,
}

impl MetricRepository {
    pub fn new(resolver: Resolver, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self { resolver, dispatcher }
    }

    pub async fn for_employee(&self, employee_id: &str) -> Result<Vec<PerformanceMetric>> {
        let records = self.resolver.find_where(METRICS, "employeeId", &json!(employee_id)).await?;
        Ok(codec::decode_list(METRICS, records))
    }

    pub async fn create(&self, metric: NewMetric) -> Result<PerformanceMetric> {
        Ok(self.create_reported(metric).await?.record)
    }

    /// Record a metric and tell the employee's account about it.
    pub async fn create_reported(&self, metric: NewMetric) -> Result<Created<PerformanceMetric>> {
        let record = insert(&self.resolver, METRICS, |id, now| metric.into_record(id, now)).await?;
        let notifications = self.dispatcher.dispatch(&DomainEvent::metric_updated(&record)).await;
        Ok(Created { record, notifications })
    }

    pub fn subscribe_for_employee(
        &self,
        employee_id: &str,
        on_update: Callback<Vec<PerformanceMetric>>,
    ) -> Result<Subscription> {
        self.resolver
            .subscribe_where(METRICS, "employeeId", json!(employee_id), typed(METRICS, on_update))
    }
}
