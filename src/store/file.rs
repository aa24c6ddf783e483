use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use ulid::Generator;

use super::{
    touched_collections, Collection, Database, Document, DocumentStore, Listener, Registry,
    Subscription, WriteOp,
};
use crate::error::{Error, Result};
use crate::lock::{self, FileLock};

const WATCH_DEBOUNCE_MS: u64 = 150;
const WATCH_POLL_MS: u64 = 250;

/// Store backed by a single JSON database file.
///
/// Writers take the file lock, re-read the database, apply their batch and
/// replace the file atomically, so concurrent processes serialize cleanly.
#[derive(Clone)]
pub struct FileStore {
    path: PathBuf,
    lock_timeout_ms: u64,
    ids: Arc<Mutex<Generator>>,
    registry: Arc<Registry>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>, lock_timeout_ms: u64) -> Self {
        Self {
            path: path.into(),
            lock_timeout_ms,
            ids: Arc::new(Mutex::new(Generator::new())),
            registry: Arc::new(Registry::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write an empty database if none exists yet.
    pub fn init(&self) -> Result<bool> {
        let _lock = FileLock::acquire(lock::lock_path_for(&self.path), self.lock_timeout_ms)?;
        if self.path.exists() {
            return Ok(false);
        }
        self.write(&Database::default())?;
        Ok(true)
    }

    fn load(&self) -> Result<Database> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Database::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Database::default()),
            Err(err) => Err(Error::Io(err)),
        }
    }

    fn write(&self, db: &Database) -> Result<()> {
        let data = serde_json::to_vec_pretty(db)?;
        lock::write_atomic(&self.path, &data)
    }

    fn ids(&self) -> MutexGuard<'_, Generator> {
        self.ids.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Deliver snapshots of `collection` whenever another process rewrites
    /// the database file. The returned handle stops watching when dropped.
    pub fn watch(&self, collection: Collection, listener: Listener) -> Result<Watch> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let (event_tx, event_rx) = mpsc::channel();
        let mut watcher: RecommendedWatcher =
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
                let _ = event_tx.send(res);
            })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let store = self.clone();
        let db_name = self.path.file_name().map(|name| name.to_os_string());

        listener(&store.list(collection)?);

        let handle = thread::spawn(move || {
            // Keep the watcher alive for the lifetime of the thread.
            let _watcher = watcher;
            let debounce = Duration::from_millis(WATCH_DEBOUNCE_MS);
            let mut pending: Option<Instant> = None;

            while !thread_stop.load(Ordering::SeqCst) {
                let timeout = pending
                    .map(|deadline| deadline.saturating_duration_since(Instant::now()))
                    .unwrap_or(Duration::from_millis(WATCH_POLL_MS))
                    .min(Duration::from_millis(WATCH_POLL_MS));

                match event_rx.recv_timeout(timeout) {
                    Ok(Ok(event)) => {
                        let relevant = event
                            .paths
                            .iter()
                            .any(|p| p.file_name().map(|n| n.to_os_string()) == db_name);
                        if relevant {
                            pending = Some(Instant::now() + debounce);
                        }
                    }
                    Ok(Err(err)) => {
                        tracing::warn!(error = %err, "store watch error");
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        if pending.is_some_and(|deadline| Instant::now() >= deadline) {
                            pending = None;
                            match store.list(collection) {
                                Ok(docs) => listener(&docs),
                                Err(err) => {
                                    tracing::warn!(error = %err, "store reload failed")
                                }
                            }
                        }
                    }
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        Ok(Watch {
            stop,
            handle: Some(handle),
        })
    }
}

impl DocumentStore for FileStore {
    fn list(&self, collection: Collection) -> Result<Vec<Document>> {
        Ok(self.load()?.list(collection))
    }

    fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        Ok(self.load()?.get(collection, id))
    }

    fn batch(&self, ops: Vec<WriteOp>) -> Result<Vec<String>> {
        let touched = touched_collections(&ops);
        let (next, affected) = {
            let _lock =
                FileLock::acquire(lock::lock_path_for(&self.path), self.lock_timeout_ms)?;
            let db = self.load()?;
            let (next, affected) = db.apply(ops, &mut self.ids())?;
            self.write(&next)?;
            (next, affected)
        };
        tracing::debug!(
            path = %self.path.display(),
            ops = affected.len(),
            "store batch committed"
        );
        self.registry.notify(&next, &touched);
        Ok(affected)
    }

    fn subscribe(&self, collection: Collection, listener: Listener) -> Result<Subscription> {
        listener(&self.list(collection)?);
        Ok(self.registry.add(collection, listener))
    }
}

/// Handle for a running [`FileStore::watch`].
pub struct Watch {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Watch {
    /// Block until the watch thread exits (it only exits once stopped).
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Watch {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fields;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn writes_persist_across_instances() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".floor").join("db.json");
        let store = FileStore::open(&path, 1000);
        assert!(store.init().unwrap());
        assert!(!store.init().unwrap());

        let id = store
            .insert(Collection::Parts, fields([("value", json!("P-7"))]))
            .unwrap();

        let reopened = FileStore::open(&path, 1000);
        let doc = reopened.get(Collection::Parts, &id).unwrap().unwrap();
        assert_eq!(doc.str_field("value"), Some("P-7"));
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::open(temp.path().join("db.json"), 1000);
        assert!(store.list(Collection::Tasks).unwrap().is_empty());
    }

    #[test]
    fn batch_is_all_or_nothing_on_disk() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::open(temp.path().join("db.json"), 1000);
        let id = store
            .insert(Collection::Tasks, fields([("text", json!("keep"))]))
            .unwrap();

        let result = store.batch(vec![
            WriteOp::Delete {
                collection: Collection::Tasks,
                id: id.clone(),
            },
            WriteOp::Update {
                collection: Collection::Tasks,
                id: "nope".to_string(),
                patch: fields([("text", json!("x"))]),
            },
        ]);
        assert!(result.is_err());
        assert!(store.get(Collection::Tasks, &id).unwrap().is_some());
    }

    #[test]
    fn concurrent_writers_do_not_lose_inserts() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("db.json");

        let handles: Vec<_> = (0..6)
            .map(|n| {
                let path = path.clone();
                thread::spawn(move || {
                    // Separate instances model separate processes.
                    let store = FileStore::open(path, 5000);
                    for i in 0..5 {
                        store
                            .insert(Collection::Tasks, fields([("n", json!(n * 10 + i))]))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let store = FileStore::open(&path, 1000);
        assert_eq!(store.list(Collection::Tasks).unwrap().len(), 30);
    }

    #[test]
    fn watch_delivers_writes_from_another_instance() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".floor").join("db.json");
        let watched = FileStore::open(&path, 1000);
        watched.init().unwrap();

        let (tx, rx) = mpsc::channel::<Vec<String>>();
        let tx = Mutex::new(tx);
        let listener: Listener = Arc::new(move |docs: &[Document]| {
            let ids = docs.iter().map(|d| d.id.clone()).collect();
            let _ = tx.lock().unwrap().send(ids);
        });
        let watch = watched.watch(Collection::Tasks, listener).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), Vec::<String>::new());

        // Unrelated files in the same directory are ignored.
        std::fs::write(temp.path().join(".floor").join("actor"), "eva").unwrap();

        let writer = FileStore::open(&path, 1000);
        let id = writer
            .insert(Collection::Tasks, fields([("text", json!("from elsewhere"))]))
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = false;
        while let Some(left) = deadline.checked_duration_since(Instant::now()) {
            match rx.recv_timeout(left) {
                Ok(ids) if ids.contains(&id) => {
                    seen = true;
                    break;
                }
                Ok(_) => continue,
                Err(_) => break,
            }
        }
        assert!(seen, "listener never saw the inserted task");

        // Dropping joins the thread, which releases the listener and its sender.
        drop(watch);
        loop {
            match rx.recv_timeout(Duration::from_secs(1)) {
                Ok(_) => continue,
                Err(err) => {
                    assert_eq!(err, mpsc::RecvTimeoutError::Disconnected);
                    break;
                }
            }
        }
    }
}
