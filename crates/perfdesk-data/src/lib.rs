//! Perfdesk data crate - the data-access layer for the performance app.
//!
//! Repositories per entity sit on a [`Resolver`] that prefers indexed
//! equality queries and degrades to collection scans when an index is
//! missing. Creates that concern someone raise a domain event, and the
//! [`NotificationDispatcher`] fans it out to the affected accounts as a
//! best-effort side channel.

pub mod codec;
pub mod demo;
pub mod dispatcher;
pub mod error;
pub mod repository;
pub mod resolver;
pub mod service;
pub mod subscription;

pub use dispatcher::{DispatchFailure, DispatchReport, NotificationDispatcher};
pub use error::{DataError, Result};
pub use repository::Created;
pub use resolver::Resolver;
pub use service::DataService;
pub use subscription::{Callback, Subscription};
