//! Per-entity repositories over the store.
//!
//! Each repository owns one collection. Creates mint a push key, write the
//! full record and, where the entity has a notification rule, hand a
//! [`DomainEvent`](perfdesk_core::DomainEvent) to the dispatcher once the
//! write has landed. Updates are merges, never overwrites.

mod employees;
mod feedback;
mod goals;
mod metrics;
mod notifications;
mod ratings;
mod users;

pub use employees::EmployeeRepository;
pub use feedback::FeedbackRepository;
pub use goals::GoalRepository;
pub use metrics::MetricRepository;
pub use notifications::NotificationRepository;
pub use ratings::RatingRepository;
pub use users::UserRepository;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::codec;
use crate::dispatcher::DispatchReport;
use crate::error::{LogFailure, Result};
use crate::resolver::Resolver;
use crate::subscription::Callback;

/// A freshly created record together with what happened to its
/// notifications. The record is durable whatever the report says.
#[derive(Debug, Clone)]
pub struct Created<T> {
    pub record: T,
    pub notifications: DispatchReport,
}

/// Mint a key in `collection`, build the record for it and write it.
pub(crate) async fn insert<T, F>(resolver: &Resolver, collection: &str, build: F) -> Result<T>
where
    T: Serialize,
    F: FnOnce(String, DateTime<Utc>) -> perfdesk_core::Result<T>,
{
    let key = resolver.store().generate_key(collection);
    let record = build(key.clone(), Utc::now())?;
    let path = format!("{collection}/{key}");
    resolver
        .store()
        .write(&path, codec::encode(&record)?)
        .await
        .log_failure(|| format!("Create {path}"))?;
    debug!(%collection, %key, "Record created");
    Ok(record)
}

/// Adapt a typed callback to the raw record lists the resolver delivers.
pub(crate) fn typed<T>(collection: &'static str, on_update: Callback<Vec<T>>) -> Callback<Vec<Value>>
where
    T: DeserializeOwned + 'static,
{
    Arc::new(move |records: Vec<Value>| on_update(codec::decode_list(collection, records)))
}
