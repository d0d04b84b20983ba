//! Query-with-fallback resolver.
//!
//! Equality lookups prefer the store's indexed query. When the store
//! reports that the field is not indexed, the resolver reads the whole
//! collection and filters it locally instead, for one-shot reads and for
//! subscriptions alike. Both paths yield the same records, keyed and
//! ordered the same way.

use std::sync::{Arc, Weak};

use perfdesk_store::{ListenTarget, OnChange, OnError, Store, StoreError};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::codec::{keyed, keyed_where};
use crate::error::{LogFailure, Result};
use crate::subscription::{Callback, Shared, Subscription, FALLBACK, PRIMARY};

#[derive(Clone)]
pub struct Resolver {
    store: Arc<dyn Store>,
}

impl Resolver {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    // =========================================================================
    // One-shot reads
    // =========================================================================

    /// One record, with its key injected as `id`.
    pub async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        let path = format!("{collection}/{key}");
        let snapshot = self
            .store
            .read(&path)
            .await
            .log_failure(|| format!("Read {path}"))?;
        Ok(snapshot.and_then(|value| crate::codec::with_id(key.to_string(), value)))
    }

    /// Every record in `collection`.
    pub async fn all(&self, collection: &str) -> Result<Vec<Value>> {
        let snapshot = self
            .store
            .read(collection)
            .await
            .log_failure(|| format!("Read {collection}"))?;
        Ok(keyed(snapshot))
    }

    /// Records in `collection` whose `field` equals `value`.
    ///
    /// An unindexed field is not an error: the lookup degrades to
    /// [`scan_where`](Self::scan_where). Any other store failure is logged
    /// and returned.
    pub async fn find_where(&self, collection: &str, field: &str, value: &Value) -> Result<Vec<Value>> {
        match self.store.read_filtered(collection, field, value).await {
            Ok(snapshot) => Ok(keyed(snapshot)),
            Err(e) if e.is_index_not_defined() => {
                log_missing_index(collection, field, &e);
                self.scan_where(collection, field, value).await
            }
            Err(e) => {
                error!(%collection, %field, error = %e, "Indexed query failed");
                Err(e.into())
            }
        }
    }

    /// The fallback scan: read all of `collection` and filter locally.
    pub async fn scan_where(&self, collection: &str, field: &str, value: &Value) -> Result<Vec<Value>> {
        let snapshot = self
            .store
            .read(collection)
            .await
            .log_failure(|| format!("Scan {collection} by {field}"))?;
        let records = keyed_where(snapshot, field, value);
        debug!(%collection, %field, matched = records.len(), "Collection scan");
        Ok(records)
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Follow the records in `collection` whose `field` equals `value`.
    ///
    /// `on_update` receives the full matching set after every change. If
    /// the indexed listener is refused or later fails, the subscription
    /// moves to a collection listener with local filtering and keeps
    /// feeding the same callback. The indexed listener is always retired
    /// before the fallback is registered.
    pub fn subscribe_where(
        &self,
        collection: &str,
        field: &str,
        value: Value,
        on_update: Callback<Vec<Value>>,
    ) -> Result<Subscription> {
        let shared = Shared::new();
        let switch = Arc::new(FallbackSwitch {
            store: Arc::downgrade(&self.store),
            shared: Arc::clone(&shared),
            collection: collection.to_string(),
            field: field.to_string(),
            value: value.clone(),
            on_update: Arc::clone(&on_update),
        });

        let on_change: OnChange = {
            let shared = Arc::clone(&shared);
            Arc::new(move |snapshot: Option<Value>| {
                shared.deliver(PRIMARY, || on_update(keyed(snapshot)));
            })
        };
        let on_error: OnError = {
            let switch = Arc::clone(&switch);
            Arc::new(move |e: StoreError| switch.engage(&e))
        };

        let target = ListenTarget::Query {
            path: collection.to_string(),
            field: field.to_string(),
            value,
        };
        match self.store.subscribe(target, on_change, on_error) {
            Ok(handle) => shared.install_primary(handle),
            Err(e) if e.is_index_not_defined() => switch.engage(&e),
            Err(e) => {
                error!(%collection, %field, error = %e, "Failed to register listener");
                return Err(e.into());
            }
        }
        Ok(Subscription::new(shared))
    }

    /// Follow every record in `collection`.
    pub fn subscribe_all(&self, collection: &str, on_update: Callback<Vec<Value>>) -> Result<Subscription> {
        self.subscribe_path(collection, Arc::new(move |snapshot: Option<Value>| on_update(keyed(snapshot))))
    }

    /// Follow one record. `None` is delivered while it does not exist.
    pub fn subscribe_record(
        &self,
        collection: &str,
        key: &str,
        on_update: Callback<Option<Value>>,
    ) -> Result<Subscription> {
        let owned_key = key.to_string();
        self.subscribe_path(
            &format!("{collection}/{key}"),
            Arc::new(move |snapshot: Option<Value>| {
                on_update(snapshot.and_then(|value| crate::codec::with_id(owned_key.clone(), value)));
            }),
        )
    }

    fn subscribe_path(&self, path: &str, deliver: Callback<Option<Value>>) -> Result<Subscription> {
        let shared = Shared::new();
        let on_change: OnChange = {
            let shared = Arc::clone(&shared);
            Arc::new(move |snapshot: Option<Value>| {
                shared.deliver(PRIMARY, || deliver(snapshot));
            })
        };
        let on_error: OnError = {
            let shared = Arc::clone(&shared);
            let path = path.to_string();
            Arc::new(move |e: StoreError| {
                error!(%path, error = %e, "Listener terminated");
                shared.listener_lost(PRIMARY);
            })
        };
        let handle = self
            .store
            .subscribe(ListenTarget::Path(path.to_string()), on_change, on_error)
            .log_failure(|| format!("Listen {path}"))?;
        shared.install_primary(handle);
        Ok(Subscription::new(shared))
    }
}

/// Everything needed to move a query subscription onto the fallback scan.
/// Holds the store weakly: the switch itself lives inside one of the
/// store's listeners.
struct FallbackSwitch {
    store: Weak<dyn Store>,
    shared: Arc<Shared>,
    collection: String,
    field: String,
    value: Value,
    on_update: Callback<Vec<Value>>,
}

impl FallbackSwitch {
    fn engage(&self, cause: &StoreError) {
        if cause.is_index_not_defined() {
            log_missing_index(&self.collection, &self.field, cause);
        } else {
            warn!(
                collection = %self.collection,
                field = %self.field,
                error = %cause,
                "Indexed listener failed, switching to collection scan"
            );
        }

        let Some(store) = self.store.upgrade() else {
            return;
        };
        if !self.shared.begin_fallback() {
            return;
        }

        let on_change: OnChange = {
            let shared = Arc::clone(&self.shared);
            let field = self.field.clone();
            let value = self.value.clone();
            let on_update = Arc::clone(&self.on_update);
            Arc::new(move |snapshot: Option<Value>| {
                shared.deliver(FALLBACK, || on_update(keyed_where(snapshot, &field, &value)));
            })
        };
        let on_error: OnError = {
            let shared = Arc::clone(&self.shared);
            let collection = self.collection.clone();
            Arc::new(move |e: StoreError| {
                error!(%collection, error = %e, "Fallback listener terminated");
                shared.listener_lost(FALLBACK);
            })
        };

        match store.subscribe(ListenTarget::Path(self.collection.clone()), on_change, on_error) {
            Ok(handle) => self.shared.install_fallback(handle),
            Err(e) => error!(
                collection = %self.collection,
                error = %e,
                "Failed to register fallback listener"
            ),
        }
    }
}

/// Tell the operator which `.indexOn` rule would avoid the scan.
fn log_missing_index(collection: &str, field: &str, cause: &StoreError) {
    let rule = format!("\"{collection}\": {{ \".indexOn\": \"{field}\" }}");
    warn!(
        %collection,
        %field,
        %rule,
        error = %cause,
        "Index missing, falling back to collection scan"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use perfdesk_store::MemoryStore;
    use serde_json::json;
    use std::sync::Mutex;

    fn seeded(indexed: bool) -> Resolver {
        let store = MemoryStore::from_json(json!({
            "goals": {
                "g1": {"employeeId": "e1", "title": "Ship"},
                "g2": {"employeeId": "e2", "title": "Hire"},
                "g3": {"employeeId": "e1", "title": "Train"},
                "g4": {"title": "Orphan"}
            }
        }));
        if indexed {
            store.add_index("goals", "employeeId").unwrap();
        }
        Resolver::new(Arc::new(store))
    }

    fn ids(records: &[Value]) -> Vec<String> {
        records.iter().map(|r| r["id"].as_str().unwrap().to_string()).collect()
    }

    #[tokio::test]
    async fn test_find_where_indexed() {
        let records = seeded(true).find_where("goals", "employeeId", &json!("e1")).await.unwrap();
        assert_eq!(ids(&records), vec!["g1", "g3"]);
    }

    #[tokio::test]
    async fn test_find_where_falls_back_without_index() {
        let records = seeded(false).find_where("goals", "employeeId", &json!("e1")).await.unwrap();
        assert_eq!(ids(&records), vec!["g1", "g3"]);
    }

    #[tokio::test]
    async fn test_find_where_no_matches_and_empty_collection() {
        let resolver = seeded(true);
        assert!(resolver.find_where("goals", "employeeId", &json!("e9")).await.unwrap().is_empty());
        assert!(resolver.find_where("feedbacks", "employeeId", &json!("e1")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_injects_id() {
        let record = seeded(false).get("goals", "g2").await.unwrap().unwrap();
        assert_eq!(record, json!({"employeeId": "e2", "title": "Hire", "id": "g2"}));
        assert!(seeded(false).get("goals", "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_path_propagates() {
        let err = seeded(false).all("goals#").await.unwrap_err();
        assert!(matches!(err, crate::DataError::Store(StoreError::InvalidPath { .. })));
    }

    #[tokio::test]
    async fn test_unindexed_subscription_delivers_filtered_view() {
        let resolver = seeded(false);
        let seen: Arc<Mutex<Vec<Vec<String>>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let subscription = resolver
            .subscribe_where(
                "goals",
                "employeeId",
                json!("e1"),
                Arc::new(move |records: Vec<Value>| sink.lock().unwrap().push(ids(&records))),
            )
            .unwrap();

        assert!(subscription.is_degraded());
        assert!(subscription.is_listening());
        assert_eq!(seen.lock().unwrap().clone(), vec![vec!["g1".to_string(), "g3".to_string()]]);
    }

    #[tokio::test]
    async fn test_record_subscription_sees_creation() {
        let resolver = seeded(false);
        let seen: Arc<Mutex<Vec<Option<Value>>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let _subscription = resolver
            .subscribe_record("goals", "g9", Arc::new(move |record: Option<Value>| sink.lock().unwrap().push(record)))
            .unwrap();

        resolver.store().write("goals/g9", json!({"title": "New"})).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].is_none());
        assert_eq!(seen[1], Some(json!({"title": "New", "id": "g9"})));
    }
}
