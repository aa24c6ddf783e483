use std::sync::{Arc, Mutex, MutexGuard};

use ulid::Generator;

use super::{
    touched_collections, Collection, Database, Document, DocumentStore, Listener, Registry,
    Subscription, WriteOp,
};
use crate::error::Result;

/// In-process store. Clones share the same database.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    registry: Arc<Registry>,
}

struct State {
    db: Database,
    ids: Generator,
}

impl Default for State {
    fn default() -> Self {
        Self {
            db: Database::default(),
            ids: Generator::new(),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DocumentStore for MemoryStore {
    fn list(&self, collection: Collection) -> Result<Vec<Document>> {
        Ok(self.state().db.list(collection))
    }

    fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        Ok(self.state().db.get(collection, id))
    }

    fn batch(&self, ops: Vec<WriteOp>) -> Result<Vec<String>> {
        let touched = touched_collections(&ops);
        let snapshot = {
            let mut state = self.state();
            let State { db, ids } = &mut *state;
            let (next, affected) = db.apply(ops, ids)?;
            *db = next;
            tracing::debug!(ops = affected.len(), "memory store batch committed");
            (db.clone(), affected)
        };
        self.inner.registry.notify(&snapshot.0, &touched);
        Ok(snapshot.1)
    }

    fn subscribe(&self, collection: Collection, listener: Listener) -> Result<Subscription> {
        let current = self.list(collection)?;
        listener(&current);
        Ok(self.inner.registry.add(collection, listener))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fields;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn subscribers_see_initial_and_subsequent_snapshots() {
        let store = MemoryStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let last_len = Arc::new(AtomicUsize::new(usize::MAX));

        let sub = {
            let calls = Arc::clone(&calls);
            let last_len = Arc::clone(&last_len);
            store
                .subscribe(
                    Collection::Parts,
                    Arc::new(move |docs: &[Document]| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        last_len.store(docs.len(), Ordering::SeqCst);
                    }),
                )
                .unwrap()
        };
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(last_len.load(Ordering::SeqCst), 0);

        store
            .insert(Collection::Parts, fields([("value", json!("A-100"))]))
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(last_len.load(Ordering::SeqCst), 1);

        // Writes to other collections do not wake this listener.
        store
            .insert(Collection::Workplaces, fields([("name", json!("W1"))]))
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        drop(sub);
        store
            .insert(Collection::Parts, fields([("value", json!("A-200"))]))
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn clones_share_state() {
        let store = MemoryStore::new();
        let other = store.clone();
        let id = store
            .insert(Collection::Tasks, fields([("text", json!("x"))]))
            .unwrap();
        assert!(other.get(Collection::Tasks, &id).unwrap().is_some());
        other.delete(Collection::Tasks, &id).unwrap();
        assert!(store.list(Collection::Tasks).unwrap().is_empty());
    }
}
