//! Document store abstraction.
//!
//! The floor's state lives in named collections of schemaless JSON documents.
//! Engine code talks to the [`DocumentStore`] trait only; two backends ship:
//! - [`FileStore`]: one JSON database file shared by every `ft` process
//! - [`MemoryStore`]: in-process, for tests and embedding
//!
//! # Database layout
//!
//! ```text
//! .floor/
//!   db.json        # { "<collection>": { "<id>": { ...fields } } }
//!   db.json.lock   # fs2 lock held for every write
//!   actor          # persisted session actor
//!   role           # persisted session role
//! ```

mod file;
mod memory;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ulid::Generator;

use crate::error::{Error, Result};

pub use file::{FileStore, Watch};
pub use memory::MemoryStore;

/// Named collections of the floor database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Tasks,
    ArchivedTasks,
    Parts,
    Workplaces,
    MissingReasons,
    PartRequests,
    BreakSchedules,
    SystemBreaks,
    BomItems,
    BomRequests,
    Roles,
    Permissions,
    Notifications,
    Users,
}

impl Collection {
    pub const ALL: [Collection; 14] = [
        Collection::Tasks,
        Collection::ArchivedTasks,
        Collection::Parts,
        Collection::Workplaces,
        Collection::MissingReasons,
        Collection::PartRequests,
        Collection::BreakSchedules,
        Collection::SystemBreaks,
        Collection::BomItems,
        Collection::BomRequests,
        Collection::Roles,
        Collection::Permissions,
        Collection::Notifications,
        Collection::Users,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Tasks => "tasks",
            Collection::ArchivedTasks => "archived_tasks",
            Collection::Parts => "parts",
            Collection::Workplaces => "workplaces",
            Collection::MissingReasons => "missing_reasons",
            Collection::PartRequests => "part_requests",
            Collection::BreakSchedules => "break_schedules",
            Collection::SystemBreaks => "system_breaks",
            Collection::BomItems => "bom_items",
            Collection::BomRequests => "bom_requests",
            Collection::Roles => "roles",
            Collection::Permissions => "permissions",
            Collection::Notifications => "notifications",
            Collection::Users => "users",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Collection::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown collection '{s}'")))
    }
}

/// Field map of a single document.
pub type Fields = serde_json::Map<String, Value>;

/// A stored document: its id plus its fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(flatten)]
    pub data: Fields,
}

impl Document {
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Decode the fields into a typed record.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.data.clone()))?)
    }
}

/// Serialize a typed record into document fields.
pub fn encode<T: Serialize>(value: &T) -> Result<Fields> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::OperationFailed(format!(
            "document must serialize to an object, got {other}"
        ))),
    }
}

/// One mutation inside a batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Create a document; the store assigns the id unless one is given.
    Insert {
        collection: Collection,
        id: Option<String>,
        data: Fields,
    },
    /// Create or fully replace a document.
    Set {
        collection: Collection,
        id: String,
        data: Fields,
    },
    /// Shallow-merge into an existing document; `null` removes a field.
    Update {
        collection: Collection,
        id: String,
        patch: Fields,
    },
    Delete { collection: Collection, id: String },
}

impl WriteOp {
    pub fn collection(&self) -> Collection {
        match self {
            WriteOp::Insert { collection, .. }
            | WriteOp::Set { collection, .. }
            | WriteOp::Update { collection, .. }
            | WriteOp::Delete { collection, .. } => *collection,
        }
    }
}

/// Callback receiving a full collection snapshot.
pub type Listener = Arc<dyn Fn(&[Document]) + Send + Sync>;

/// Repository interface over the floor database.
///
/// Single-document writes are atomic; [`DocumentStore::batch`] is atomic
/// across documents and collections.
pub trait DocumentStore: Send + Sync {
    /// All documents of a collection, ordered by id (creation order).
    fn list(&self, collection: Collection) -> Result<Vec<Document>>;

    fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>>;

    /// Apply all operations or none. Returns the affected id of each op.
    fn batch(&self, ops: Vec<WriteOp>) -> Result<Vec<String>>;

    /// Invoke `listener` now and after every committed write to `collection`.
    fn subscribe(&self, collection: Collection, listener: Listener) -> Result<Subscription>;

    fn insert(&self, collection: Collection, data: Fields) -> Result<String> {
        single_id(self.batch(vec![WriteOp::Insert {
            collection,
            id: None,
            data,
        }])?)
    }

    fn set(&self, collection: Collection, id: &str, data: Fields) -> Result<()> {
        self.batch(vec![WriteOp::Set {
            collection,
            id: id.to_string(),
            data,
        }])?;
        Ok(())
    }

    fn update(&self, collection: Collection, id: &str, patch: Fields) -> Result<()> {
        self.batch(vec![WriteOp::Update {
            collection,
            id: id.to_string(),
            patch,
        }])?;
        Ok(())
    }

    fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        self.batch(vec![WriteOp::Delete {
            collection,
            id: id.to_string(),
        }])?;
        Ok(())
    }

    /// Fetch a document that must exist.
    fn require(&self, collection: Collection, id: &str) -> Result<Document> {
        self.get(collection, id)?
            .ok_or_else(|| Error::DocumentNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })
    }
}

fn single_id(ids: Vec<String>) -> Result<String> {
    ids.into_iter()
        .next()
        .ok_or_else(|| Error::OperationFailed("store returned no id for insert".to_string()))
}

/// Whole-database value, as persisted by [`FileStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct Database {
    collections: BTreeMap<Collection, BTreeMap<String, Fields>>,
}

impl Database {
    pub(crate) fn list(&self, collection: Collection) -> Vec<Document> {
        self.collections
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| Document {
                        id: id.clone(),
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn get(&self, collection: Collection, id: &str) -> Option<Document> {
        self.collections
            .get(&collection)
            .and_then(|docs| docs.get(id))
            .map(|data| Document {
                id: id.to_string(),
                data: data.clone(),
            })
    }

    /// Apply `ops` to a copy and return it; `self` is untouched on error.
    pub(crate) fn apply(
        &self,
        ops: Vec<WriteOp>,
        ids: &mut Generator,
    ) -> Result<(Database, Vec<String>)> {
        let mut next = self.clone();
        let mut affected = Vec::with_capacity(ops.len());

        for op in ops {
            match op {
                WriteOp::Insert {
                    collection,
                    id,
                    data,
                } => {
                    let id = match id {
                        Some(id) => id,
                        None => new_id(ids)?,
                    };
                    let docs = next.collections.entry(collection).or_default();
                    if docs.contains_key(&id) {
                        return Err(Error::OperationFailed(format!(
                            "document {collection}/{id} already exists"
                        )));
                    }
                    docs.insert(id.clone(), strip_nulls(data));
                    affected.push(id);
                }
                WriteOp::Set {
                    collection,
                    id,
                    data,
                } => {
                    next.collections
                        .entry(collection)
                        .or_default()
                        .insert(id.clone(), strip_nulls(data));
                    affected.push(id);
                }
                WriteOp::Update {
                    collection,
                    id,
                    patch,
                } => {
                    let doc = next
                        .collections
                        .get_mut(&collection)
                        .and_then(|docs| docs.get_mut(&id))
                        .ok_or_else(|| Error::DocumentNotFound {
                            collection: collection.to_string(),
                            id: id.clone(),
                        })?;
                    for (key, value) in patch {
                        if value.is_null() {
                            doc.remove(&key);
                        } else {
                            doc.insert(key, value);
                        }
                    }
                    affected.push(id);
                }
                WriteOp::Delete { collection, id } => {
                    let removed = next
                        .collections
                        .get_mut(&collection)
                        .and_then(|docs| docs.remove(&id));
                    if removed.is_none() {
                        return Err(Error::DocumentNotFound {
                            collection: collection.to_string(),
                            id,
                        });
                    }
                    affected.push(id);
                }
            }
        }

        Ok((next, affected))
    }
}

fn new_id(ids: &mut Generator) -> Result<String> {
    ids.generate()
        .map(|ulid| ulid.to_string().to_lowercase())
        .map_err(|e| Error::OperationFailed(format!("id generation failed: {e}")))
}

fn strip_nulls(mut data: Fields) -> Fields {
    data.retain(|_, value| !value.is_null());
    data
}

/// Live subscription handle; dropping it unsubscribes.
pub struct Subscription {
    registry: Weak<Registry>,
    id: u64,
}

impl Subscription {
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

/// Listener bookkeeping shared by both backends.
#[derive(Default)]
pub(crate) struct Registry {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Collection, Listener)>>,
}

impl Registry {
    pub(crate) fn add(
        self: &Arc<Self>,
        collection: Collection,
        listener: Listener,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries().push((id, collection, listener));
        Subscription {
            registry: Arc::downgrade(self),
            id,
        }
    }

    fn remove(&self, id: u64) {
        self.entries().retain(|(entry_id, _, _)| *entry_id != id);
    }

    /// Deliver fresh snapshots for every touched collection.
    pub(crate) fn notify(&self, db: &Database, touched: &[Collection]) {
        // Listeners run outside the registry lock so they may resubscribe.
        let targets: Vec<(Collection, Listener)> = self
            .entries()
            .iter()
            .filter(|(_, collection, _)| touched.contains(collection))
            .map(|(_, collection, listener)| (*collection, Arc::clone(listener)))
            .collect();

        for (collection, listener) in targets {
            let snapshot = db.list(collection);
            listener(&snapshot);
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, Vec<(u64, Collection, Listener)>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub(crate) fn touched_collections(ops: &[WriteOp]) -> Vec<Collection> {
    let mut touched: Vec<Collection> = ops.iter().map(WriteOp::collection).collect();
    touched.sort();
    touched.dedup();
    touched
}

/// Build a field map from `(key, value)` pairs.
pub fn fields<I, K>(pairs: I) -> Fields
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}
