//! In-process real-time store.
//!
//! Holds the whole tree as one JSON value behind a `RwLock` and behaves
//! like the hosted backend in the ways the data layer can observe:
//! - nulls and empty objects are never stored,
//! - equality queries only run against declared indexes,
//! - listeners get their initial view on registration and then one
//!   callback per change that actually alters their view,
//! - an unindexed query listener is errored out and dropped.
//!
//! Callbacks always run after every internal lock has been released, so a
//! callback may freely read, write or subscribe again.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::error::{Result, StoreError};
use crate::path;
use crate::push_id::PushIdGenerator;
use crate::store::{ListenTarget, ListenerHandle, OnChange, OnError, Store};

/// A listened location with its path pre-split.
struct Watch {
    segments: Vec<String>,
    filter: Option<(Vec<String>, Value)>,
}

impl Watch {
    fn compile(target: &ListenTarget) -> Result<Self> {
        let segments = owned(path::segments(target.path())?);
        let filter = match target {
            ListenTarget::Path(_) => None,
            ListenTarget::Query { field, value, .. } => {
                Some((owned(path::segments(field)?), value.clone()))
            }
        };
        Ok(Self { segments, filter })
    }

    fn view(&self, tree: &Value) -> Option<Value> {
        let segments = borrowed(&self.segments);
        match &self.filter {
            None => get(tree, &segments).filter(|v| !is_empty(v)).cloned(),
            Some((field, value)) => query(tree, &segments, &borrowed(field), value),
        }
    }

    fn index_key(&self) -> Option<(String, String)> {
        self.filter
            .as_ref()
            .map(|(field, _)| (self.segments.join("/"), field.join("/")))
    }
}

struct Listener {
    watch: Watch,
    on_change: OnChange,
    on_error: OnError,
    last: Option<Value>,
    active: Arc<AtomicBool>,
}

struct Delivery {
    on_change: OnChange,
    view: Option<Value>,
    active: Arc<AtomicBool>,
}

struct Inner {
    tree: RwLock<Value>,
    indexes: RwLock<HashSet<(String, String)>>,
    listeners: Mutex<BTreeMap<u64, Listener>>,
    next_listener: AtomicU64,
    keys: PushIdGenerator,
}

/// Thread-safe in-memory store. Clones share the same tree.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// An empty store with no declared indexes.
    pub fn new() -> Self {
        Self::from_json(Value::Object(Map::new()))
    }

    /// A store seeded from a JSON export of the whole tree.
    pub fn from_json(tree: Value) -> Self {
        Self {
            inner: Arc::new(Inner {
                tree: RwLock::new(normalize(tree).unwrap_or_else(empty_object)),
                indexes: RwLock::new(HashSet::new()),
                listeners: Mutex::new(BTreeMap::new()),
                next_listener: AtomicU64::new(1),
                keys: PushIdGenerator::new(),
            }),
        }
    }

    /// Declare indexes up front.
    pub fn with_indexes<I, C, F>(self, rules: I) -> Result<Self>
    where
        I: IntoIterator<Item = (C, F)>,
        C: AsRef<str>,
        F: AsRef<str>,
    {
        for (collection, field) in rules {
            self.add_index(collection.as_ref(), field.as_ref())?;
        }
        Ok(self)
    }

    /// Declare an index on `field` for children of `collection`.
    pub fn add_index(&self, collection: &str, field: &str) -> Result<()> {
        let key = index_key(collection, field)?;
        debug!(collection = %key.0, field = %key.1, "Index declared");
        self.indexes_mut()?.insert(key);
        Ok(())
    }

    /// Remove an index. Live query listeners that depended on it are
    /// errored out, the way a rules change terminates them on the backend.
    pub fn drop_index(&self, collection: &str, field: &str) -> Result<usize> {
        let key = index_key(collection, field)?;
        self.indexes_mut()?.remove(&key);
        let error = StoreError::IndexNotDefined {
            path: key.0.clone(),
            field: key.1.clone(),
        };
        self.terminate_where(|watch| watch.index_key().as_ref() == Some(&key), error)
    }

    /// Error out every listener at or below `path`.
    pub fn interrupt_listeners(&self, path: &str, error: StoreError) -> Result<usize> {
        let target = owned(path::segments(path)?);
        self.terminate_where(
            |watch| watch.segments.starts_with(&target),
            error,
        )
    }

    /// Number of live listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners().map(|l| l.len()).unwrap_or(0)
    }

    /// The whole tree as JSON.
    pub fn export(&self) -> Result<Value> {
        Ok(self.tree()?.clone())
    }

    /// Replace the whole tree.
    pub fn import(&self, tree: Value) -> Result<()> {
        *self.tree_mut()? = normalize(tree).unwrap_or_else(empty_object);
        self.notify(&[])
    }

    fn is_indexed(&self, watch: &Watch) -> Result<bool> {
        match watch.index_key() {
            Some(key) => Ok(self.indexes()?.contains(&key)),
            None => Ok(true),
        }
    }

    fn apply(&self, path: &str, value: Option<Value>) -> Result<()> {
        let segments = path::segments(path)?;
        {
            let mut tree = self.tree_mut()?;
            set_at(&mut tree, &segments, value);
        }
        self.notify(&segments)
    }

    /// Recompute every listener on the changed branch and deliver the views
    /// that moved.
    fn notify(&self, changed: &[&str]) -> Result<()> {
        let deliveries = {
            let mut listeners = self.listeners()?;
            let tree = self.tree()?;
            let mut deliveries = Vec::new();
            for listener in listeners.values_mut() {
                if !path::overlaps(&borrowed(&listener.watch.segments), changed) {
                    continue;
                }
                let view = listener.watch.view(&tree);
                if view != listener.last {
                    listener.last = view.clone();
                    deliveries.push(Delivery {
                        on_change: Arc::clone(&listener.on_change),
                        view,
                        active: Arc::clone(&listener.active),
                    });
                }
            }
            deliveries
        };

        trace!(path = %changed.join("/"), deliveries = deliveries.len(), "Change applied");
        for delivery in deliveries {
            if delivery.active.load(Ordering::SeqCst) {
                (delivery.on_change)(delivery.view);
            }
        }
        Ok(())
    }

    fn terminate_where(&self, matches: impl Fn(&Watch) -> bool, error: StoreError) -> Result<usize> {
        let terminated: Vec<Listener> = {
            let mut listeners = self.listeners()?;
            let ids: Vec<u64> = listeners
                .iter()
                .filter(|(_, l)| matches(&l.watch))
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| listeners.remove(id)).collect()
        };

        for listener in &terminated {
            listener.active.store(false, Ordering::SeqCst);
            (listener.on_error)(error.clone());
        }
        Ok(terminated.len())
    }

    fn tree(&self) -> Result<RwLockReadGuard<'_, Value>> {
        self.inner.tree.read().map_err(|e| poisoned("tree", e))
    }

    fn tree_mut(&self) -> Result<RwLockWriteGuard<'_, Value>> {
        self.inner.tree.write().map_err(|e| poisoned("tree", e))
    }

    fn indexes(&self) -> Result<RwLockReadGuard<'_, HashSet<(String, String)>>> {
        self.inner.indexes.read().map_err(|e| poisoned("index", e))
    }

    fn indexes_mut(&self) -> Result<RwLockWriteGuard<'_, HashSet<(String, String)>>> {
        self.inner.indexes.write().map_err(|e| poisoned("index", e))
    }

    fn listeners(&self) -> Result<MutexGuard<'_, BTreeMap<u64, Listener>>> {
        self.inner.listeners.lock().map_err(|e| poisoned("listener", e))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn read(&self, path: &str) -> Result<Option<Value>> {
        let segments = path::segments(path)?;
        let tree = self.tree()?;
        Ok(get(&tree, &segments).filter(|v| !is_empty(v)).cloned())
    }

    async fn read_filtered(&self, path: &str, field: &str, value: &Value) -> Result<Option<Value>> {
        let watch = Watch::compile(&ListenTarget::Query {
            path: path.to_string(),
            field: field.to_string(),
            value: value.clone(),
        })?;
        if !self.is_indexed(&watch)? {
            return Err(StoreError::IndexNotDefined {
                path: watch.segments.join("/"),
                field: field.to_string(),
            });
        }
        let tree = self.tree()?;
        Ok(watch.view(&tree))
    }

    async fn write(&self, path: &str, record: Value) -> Result<()> {
        self.apply(path, normalize(record))
    }

    async fn merge_update(&self, path: &str, partial: Map<String, Value>) -> Result<()> {
        if partial.is_empty() {
            return Ok(());
        }
        let base = path::segments(path)?;
        let mut changes = Vec::with_capacity(partial.len());
        for (key, value) in partial {
            let mut full = owned(base.clone());
            full.extend(owned(path::segments(&key)?));
            changes.push((full, normalize(value)));
        }
        {
            let mut tree = self.tree_mut()?;
            for (full, value) in changes {
                set_at(&mut tree, &borrowed(&full), value);
            }
        }
        self.notify(&base)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.apply(path, None)
    }

    fn generate_key(&self, _collection: &str) -> String {
        self.inner.keys.generate()
    }

    fn subscribe(
        &self,
        target: ListenTarget,
        on_change: OnChange,
        on_error: OnError,
    ) -> Result<ListenerHandle> {
        let watch = Watch::compile(&target)?;

        if let Some((path, field)) = watch.index_key() {
            if !self.is_indexed(&watch)? {
                debug!(%path, %field, "Query listener on unindexed field rejected");
                on_error(StoreError::IndexNotDefined { path, field });
                return Ok(ListenerHandle::inert());
            }
        }

        let id = self.inner.next_listener.fetch_add(1, Ordering::SeqCst);
        let active = Arc::new(AtomicBool::new(true));
        let initial = {
            let mut listeners = self.listeners()?;
            let tree = self.tree()?;
            let view = watch.view(&tree);
            listeners.insert(
                id,
                Listener {
                    watch,
                    on_change: Arc::clone(&on_change),
                    on_error,
                    last: view.clone(),
                    active: Arc::clone(&active),
                },
            );
            view
        };
        debug!(listener = id, path = %target.path(), "Listener registered");

        on_change(initial);

        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        Ok(ListenerHandle::new(move || {
            active.store(false, Ordering::SeqCst);
            if let Some(inner) = inner.upgrade() {
                if let Ok(mut listeners) = inner.listeners.lock() {
                    listeners.remove(&id);
                }
            }
            trace!(listener = id, "Listener cancelled");
        }))
    }
}

// =============================================================================
// Tree helpers
// =============================================================================

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Drop nulls and empty objects, the way the backend never stores them.
fn normalize(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let cleaned: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| normalize(v).map(|v| (k, v)))
                .collect();
            if cleaned.is_empty() {
                None
            } else {
                Some(Value::Object(cleaned))
            }
        }
        other => Some(other),
    }
}

fn get<'a>(root: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(root, |node, segment| node.as_object()?.get(*segment))
}

fn query(root: &Value, segments: &[&str], field: &[&str], value: &Value) -> Option<Value> {
    let children = get(root, segments)?.as_object()?;
    let matched: Map<String, Value> = children
        .iter()
        .filter(|(_, child)| get(child, field) == Some(value))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if matched.is_empty() {
        None
    } else {
        Some(Value::Object(matched))
    }
}

/// Set or remove the node at `segments`, creating parents on the way down
/// and pruning parents left empty on the way back up.
fn set_at(node: &mut Value, segments: &[&str], value: Option<Value>) {
    let Some((head, rest)) = segments.split_first() else {
        *node = value.unwrap_or_else(empty_object);
        return;
    };

    if !node.is_object() {
        if value.is_none() {
            return;
        }
        *node = empty_object();
    }
    let Value::Object(map) = node else {
        return;
    };

    if rest.is_empty() {
        match value {
            Some(value) => {
                map.insert(head.to_string(), value);
            }
            None => {
                map.remove(*head);
            }
        }
        return;
    }

    if value.is_none() && !map.contains_key(*head) {
        return;
    }
    let child = map.entry(head.to_string()).or_insert_with(empty_object);
    set_at(child, rest, value);
    if is_empty(child) {
        map.remove(*head);
    }
}

fn index_key(collection: &str, field: &str) -> Result<(String, String)> {
    Ok((
        path::segments(collection)?.join("/"),
        path::segments(field)?.join("/"),
    ))
}

fn owned(segments: Vec<&str>) -> Vec<String> {
    segments.into_iter().map(String::from).collect()
}

fn borrowed(segments: &[String]) -> Vec<&str> {
    segments.iter().map(String::as_str).collect()
}

fn poisoned<E: std::fmt::Display>(what: &str, err: E) -> StoreError {
    StoreError::Backend(format!("{what} lock poisoned: {err}"))
}
