//! One entry point over all repositories, sharing a store and dispatcher.

use std::sync::Arc;

use perfdesk_core::config::NotificationConfig;
use perfdesk_core::types::Notification;
use perfdesk_store::Store;

use crate::demo;
use crate::dispatcher::NotificationDispatcher;
use crate::error::Result;
use crate::repository::{
    EmployeeRepository, FeedbackRepository, GoalRepository, MetricRepository, NotificationRepository,
    RatingRepository, UserRepository,
};
use crate::resolver::Resolver;

#[derive(Clone)]
pub struct DataService {
    resolver: Resolver,
    dispatcher: Arc<NotificationDispatcher>,
    users: UserRepository,
    employees: EmployeeRepository,
    goals: GoalRepository,
    feedback: FeedbackRepository,
    metrics: MetricRepository,
    notifications: NotificationRepository,
    ratings: RatingRepository,
}

impl DataService {
    pub fn new(store: Arc<dyn Store>, config: NotificationConfig) -> Self {
        let resolver = Resolver::new(store);
        let dispatcher = Arc::new(NotificationDispatcher::new(resolver.clone(), config));
        Self {
            users: UserRepository::new(resolver.clone()),
            employees: EmployeeRepository::new(resolver.clone()),
            goals: GoalRepository::new(resolver.clone(), Arc::clone(&dispatcher)),
            feedback: FeedbackRepository::new(resolver.clone(), Arc::clone(&dispatcher)),
            metrics: MetricRepository::new(resolver.clone(), Arc::clone(&dispatcher)),
            notifications: NotificationRepository::new(resolver.clone()),
            ratings: RatingRepository::new(resolver.clone(), Arc::clone(&dispatcher)),
            resolver,
            dispatcher,
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    pub fn users(&self) -> &UserRepository {
        &self.users
    }

    pub fn employees(&self) -> &EmployeeRepository {
        &self.employees
    }

    pub fn goals(&self) -> &GoalRepository {
        &self.goals
    }

    pub fn feedback(&self) -> &FeedbackRepository {
        &self.feedback
    }

    pub fn metrics(&self) -> &MetricRepository {
        &self.metrics
    }

    pub fn notifications(&self) -> &NotificationRepository {
        &self.notifications
    }

    pub fn ratings(&self) -> &RatingRepository {
        &self.ratings
    }

    pub async fn generate_demo_notifications(&self, user_id: &str) -> Result<Vec<Notification>> {
        demo::generate_demo_notifications(&self.notifications, user_id).await
    }
}
