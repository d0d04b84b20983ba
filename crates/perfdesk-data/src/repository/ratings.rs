use std::sync::Arc;

use perfdesk_core::types::{collections::ADMIN_RATINGS, AdminRating, NewAdminRating};
use perfdesk_core::DomainEvent;
use serde_json::json;

use crate::codec;
use crate::dispatcher::NotificationDispatcher;
use crate::error::Result;
use crate::resolver::Resolver;

use super::{insert, Created};

/// Leadership ratings given to admins by employees.
#[derive(Clone)]
pub struct RatingRepository {
    resolver: Resolver,
    dispatcher: Arc<NotificationDispatcher>,
}

impl RatingRepository {
    pub fn new(resolver: Resolver, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self { resolver, dispatcher }
    }

    pub async fn create(&self, rating: NewAdminRating) -> Result<AdminRating> {
        Ok(self.create_reported(rating).await?.record)
    }

    pub async fn create_reported(&self, rating: NewAdminRating) -> Result<Created<AdminRating>> {
        let record = insert(&self.resolver, ADMIN_RATINGS, |id, now| rating.into_record(id, now)).await?;
        let notifications = self.dispatcher.dispatch(&DomainEvent::rating_given(&record)).await;
        Ok(Created { record, notifications })
    }

    pub async fn by_admin(&self, admin_id: &str) -> Result<Vec<AdminRating>> {
        let records = self.resolver.find_where(ADMIN_RATINGS, "adminId", &json!(admin_id)).await?;
        Ok(codec::decode_list(ADMIN_RATINGS, records))
    }

    pub async fn for_employee(&self, employee_id: &str) -> Result<Vec<AdminRating>> {
        let records = self
            .resolver
            .find_where(ADMIN_RATINGS, "employeeId", &json!(employee_id))
            .await?;
        Ok(codec::decode_list(ADMIN_RATINGS, records))
    }
}
