//! In-process realtime store
//!
//! Keeps the whole tree as one JSON value with insertion-ordered objects
//! and pushes full snapshots to every subscriber whose path overlaps a
//! write. Optionally writes the tree through to [`Storage`] after every
//! change, so the next process that opens the same storage starts from
//! this tree. The tree is read once at open; a store does not see writes
//! made by other processes while it is running.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, trace};
use ulid::Generator;

use super::{RealtimeStore, StorePath};
use crate::error::{LetmeaskError, LetmeaskResult};
use crate::storage::Storage;
use crate::sync::Subscription;

struct Subscriber {
    id: u64,
    path: StorePath,
    tx: mpsc::UnboundedSender<Value>,
}

struct Inner {
    /// Whole tree. Lock order: `tree` before `subscribers`.
    tree: Mutex<Value>,
    subscribers: Mutex<Vec<Subscriber>>,
    next_subscriber_id: AtomicU64,
    keys: Mutex<Generator>,
    storage: Option<Storage>,
}

/// Realtime store held in memory.
///
/// Cloning is cheap and every clone shares the same tree.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store that lives only as long as this process
    pub fn new() -> Self {
        Self::with_tree(Value::Object(Map::new()), None)
    }

    /// Create a store whose tree is loaded from, and written through to,
    /// `storage`.
    pub fn open(storage: Storage) -> LetmeaskResult<Self> {
        let tree = storage
            .load_tree()?
            .unwrap_or_else(|| Value::Object(Map::new()));
        debug!("Loaded store tree from storage");
        Ok(Self::with_tree(tree, Some(storage)))
    }

    fn with_tree(tree: Value, storage: Option<Storage>) -> Self {
        Self {
            inner: Arc::new(Inner {
                tree: Mutex::new(tree),
                subscribers: Mutex::new(Vec::new()),
                next_subscriber_id: AtomicU64::new(1),
                keys: Mutex::new(Generator::new()),
                storage,
            }),
        }
    }

    /// Replace the value at `path`. Writing `Value::Null` removes it.
    ///
    /// Used to seed rooms and to apply moderation changes (answered,
    /// highlighted) that this crate only ever observes.
    pub fn set(&self, path: &StorePath, value: Value) -> LetmeaskResult<()> {
        self.write(path, value)
    }

    /// Current value at `path`
    pub fn value_at(&self, path: &StorePath) -> Option<Value> {
        lookup(&self.inner.tree.lock(), path).cloned()
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.inner.subscribers.lock();
        subscribers.retain(|s| !s.tx.is_closed());
        subscribers.len()
    }

    fn next_key(&self) -> LetmeaskResult<String> {
        self.inner
            .keys
            .lock()
            .generate()
            .map(|ulid| ulid.to_string())
            .map_err(|e| LetmeaskError::StoreWrite(format!("key generation failed: {}", e)))
    }

    fn write(&self, path: &StorePath, value: Value) -> LetmeaskResult<()> {
        let mut tree = self.inner.tree.lock();

        let mut updated = tree.clone();
        if value.is_null() {
            remove(&mut updated, path);
        } else {
            insert(&mut updated, path, value);
        }

        if let Some(storage) = &self.inner.storage {
            storage
                .save_tree(&updated)
                .map_err(|e| LetmeaskError::StoreWrite(e.to_string()))?;
        }
        *tree = updated;

        let mut subscribers = self.inner.subscribers.lock();
        subscribers.retain(|subscriber| {
            if !subscriber.path.overlaps(path) {
                return !subscriber.tx.is_closed();
            }
            let snapshot = lookup(&tree, &subscriber.path).cloned().unwrap_or(Value::Null);
            trace!(path = %subscriber.path, id = subscriber.id, "Pushing snapshot");
            subscriber.tx.send(snapshot).is_ok()
        });

        Ok(())
    }
}

#[async_trait]
impl RealtimeStore for MemoryStore {
    fn subscribe(&self, path: &StorePath) -> Subscription<Value> {
        let id = self.inner.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let (tx, subscription) = Subscription::channel(move || {
            if let Some(inner) = weak.upgrade() {
                inner.subscribers.lock().retain(|s| s.id != id);
                debug!(id, "Store subscription released");
            }
        });

        let tree = self.inner.tree.lock();
        let snapshot = lookup(&tree, path).cloned().unwrap_or(Value::Null);
        let _ = tx.send(snapshot);
        self.inner.subscribers.lock().push(Subscriber {
            id,
            path: path.clone(),
            tx,
        });
        debug!(%path, id, "Store subscription registered");

        subscription
    }

    async fn append(&self, path: &StorePath, value: Value) -> LetmeaskResult<String> {
        let key = self.next_key()?;
        self.write(&path.child(&key), value)?;
        debug!(%path, %key, "Appended child");
        Ok(key)
    }

    async fn get(&self, path: &StorePath) -> LetmeaskResult<Option<Value>> {
        Ok(self.value_at(path))
    }
}

fn lookup<'a>(tree: &'a Value, path: &StorePath) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(tree, |node, segment| node.as_object()?.get(segment))
}

fn insert(tree: &mut Value, path: &StorePath, value: Value) {
    let mut node = tree;
    for segment in path.segments() {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            return;
        };
        node = map.entry(segment.clone()).or_insert(Value::Null);
    }
    *node = value;
}

fn remove(tree: &mut Value, path: &StorePath) {
    let Some((last, parents)) = path.segments().split_last() else {
        *tree = Value::Object(Map::new());
        return;
    };

    let mut node = tree;
    for segment in parents {
        node = match node.as_object_mut().and_then(|map| map.get_mut(segment)) {
            Some(child) => child,
            None => return,
        };
    }
    if let Some(map) = node.as_object_mut() {
        map.shift_remove(last);
    }
}
