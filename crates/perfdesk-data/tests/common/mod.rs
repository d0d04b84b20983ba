//! Shared helpers for the data-layer integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use perfdesk_core::config::NotificationConfig;
use perfdesk_data::DataService;
use perfdesk_store::{ListenTarget, ListenerHandle, MemoryStore, OnChange, OnError, Result, Store, StoreError};
use serde_json::{Map, Value};

/// A [`MemoryStore`] wrapper that counts calls and fails chosen writes.
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    /// Notification writes addressed to these accounts fail.
    failing_recipients: Mutex<HashSet<String>>,
    /// Every write under these collections fails.
    failing_collections: Mutex<HashSet<String>>,
    /// Query listeners are refused at registration.
    pub refuse_query_listeners: AtomicBool,
    /// Every read fails as if the backend were down.
    pub offline: AtomicBool,
    pub writes: AtomicUsize,
    pub merges: AtomicUsize,
    pub filtered_reads: AtomicUsize,
    pub full_reads: AtomicUsize,
}

impl FaultyStore {
    pub fn new(inner: MemoryStore) -> Arc<Self> {
        Arc::new(Self {
            inner,
            ..Self::default()
        })
    }

    pub fn fail_notifications_for(&self, user_id: &str) {
        self.failing_recipients.lock().unwrap().insert(user_id.to_string());
    }

    pub fn fail_writes_to(&self, collection: &str) {
        self.failing_collections.lock().unwrap().insert(collection.to_string());
    }

    pub fn merges(&self) -> usize {
        self.merges.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("backend offline".to_string()));
        }
        Ok(())
    }

    fn check_write(&self, path: &str, record: Option<&Value>) -> Result<()> {
        let collection = path.split('/').next().unwrap_or_default();
        if self.failing_collections.lock().unwrap().contains(collection) {
            return Err(StoreError::PermissionDenied(path.to_string()));
        }
        if collection == "notifications" {
            let recipient = record.and_then(|r| r.get("userId")).and_then(Value::as_str);
            if let Some(user_id) = recipient {
                if self.failing_recipients.lock().unwrap().contains(user_id) {
                    return Err(StoreError::Unavailable(format!("write to {path} dropped")));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Store for FaultyStore {
    async fn read(&self, path: &str) -> Result<Option<Value>> {
        self.full_reads.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        self.inner.read(path).await
    }

    async fn read_filtered(&self, path: &str, field: &str, value: &Value) -> Result<Option<Value>> {
        self.filtered_reads.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        self.inner.read_filtered(path, field, value).await
    }

    async fn write(&self, path: &str, record: Value) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check_write(path, Some(&record))?;
        self.inner.write(path, record).await
    }

    async fn merge_update(&self, path: &str, partial: Map<String, Value>) -> Result<()> {
        self.merges.fetch_add(1, Ordering::SeqCst);
        self.check_write(path, None)?;
        self.inner.merge_update(path, partial).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.check_write(path, None)?;
        self.inner.delete(path).await
    }

    fn generate_key(&self, collection: &str) -> String {
        self.inner.generate_key(collection)
    }

    fn subscribe(&self, target: ListenTarget, on_change: OnChange, on_error: OnError) -> Result<ListenerHandle> {
        if let ListenTarget::Query { path, field, .. } = &target {
            if self.refuse_query_listeners.load(Ordering::SeqCst) {
                return Err(StoreError::IndexNotDefined {
                    path: path.clone(),
                    field: field.clone(),
                });
            }
        }
        self.inner.subscribe(target, on_change, on_error)
    }
}

/// All default index rules.
pub const INDEXES: [(&str, &str); 7] = [
    ("employees", "userId"),
    ("goals", "employeeId"),
    ("feedbacks", "employeeId"),
    ("performanceMetrics", "employeeId"),
    ("notifications", "userId"),
    ("adminRatings", "adminId"),
    ("adminRatings", "employeeId"),
];

pub fn indexed_store(seed: Value) -> MemoryStore {
    MemoryStore::from_json(seed).with_indexes(INDEXES).unwrap()
}

pub fn service_over(store: Arc<dyn Store>) -> DataService {
    DataService::new(store, NotificationConfig::default())
}

/// Collects every value a subscription delivers.
pub fn recorder<T: Send + 'static>() -> (Arc<Mutex<Vec<T>>>, Arc<dyn Fn(T) + Send + Sync>) {
    let seen: Arc<Mutex<Vec<T>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, Arc::new(move |value: T| sink.lock().unwrap().push(value)))
}

pub fn ids(records: &[Value]) -> Vec<String> {
    let mut ids: Vec<String> = records
        .iter()
        .filter_map(|r| r.get("id").and_then(Value::as_str).map(str::to_string))
        .collect();
    ids.sort();
    ids
}
