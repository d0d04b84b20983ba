//! The store capability.
//!
//! This is the whole surface the data layer needs from a hosted real-time
//! tree store: reads, equality queries, writes, merges, deletes, key
//! generation and change listeners.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{Result, StoreError};

/// Callback receiving the current view of a listened location, or `None`
/// when nothing is there.
pub type OnChange = Arc<dyn Fn(Option<Value>) + Send + Sync>;

/// Callback receiving the error that terminated a listener.
pub type OnError = Arc<dyn Fn(StoreError) + Send + Sync>;

/// What a listener watches.
#[derive(Debug, Clone, PartialEq)]
pub enum ListenTarget {
    /// Everything at and below a path.
    Path(String),
    /// Children of `path` whose `field` equals `value`.
    Query {
        path: String,
        field: String,
        value: Value,
    },
}

impl ListenTarget {
    pub fn path(&self) -> &str {
        match self {
            ListenTarget::Path(path) => path,
            ListenTarget::Query { path, .. } => path,
        }
    }
}

/// Owned registration of a listener.
///
/// `cancel` is idempotent. Dropping the handle cancels it too, so a
/// listener never outlives the value that owns it.
pub struct ListenerHandle {
    cancel: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl ListenerHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Mutex::new(Some(Box::new(cancel))),
        }
    }

    /// A handle with nothing left to cancel.
    pub fn inert() -> Self {
        Self {
            cancel: Mutex::new(None),
        }
    }

    pub fn cancel(&self) {
        let cancel = match self.cancel.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        match self.cancel.lock() {
            Ok(slot) => slot.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("active", &self.is_active())
            .finish()
    }
}

/// A hierarchical key-value store with push-based listeners.
#[async_trait]
pub trait Store: Send + Sync {
    /// Read everything at `path`.
    async fn read(&self, path: &str) -> Result<Option<Value>>;

    /// Read the children of `path` whose `field` equals `value`, using a
    /// server-side index. Fails with [`StoreError::IndexNotDefined`] when
    /// the field is not indexed. A query that matches nothing is `None`.
    async fn read_filtered(&self, path: &str, field: &str, value: &Value) -> Result<Option<Value>>;

    /// Replace whatever is at `path`.
    async fn write(&self, path: &str, record: Value) -> Result<()>;

    /// Set only the named children of `path`. `null` children are removed.
    async fn merge_update(&self, path: &str, partial: Map<String, Value>) -> Result<()>;

    /// Remove `path` and everything below it.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Mint a fresh, unique child key for `collection`.
    fn generate_key(&self, collection: &str) -> String;

    /// Register a listener. `on_change` fires with the initial view and
    /// after every change to it. A listener that fails is removed by the
    /// store and reported once through `on_error`.
    fn subscribe(
        &self,
        target: ListenTarget,
        on_change: OnChange,
        on_error: OnError,
    ) -> Result<ListenerHandle>;
}
