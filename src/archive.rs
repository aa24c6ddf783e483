//! Moves old closed tasks from `tasks` to `archived_tasks`.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;

use crate::config::ArchiveConfig;
use crate::error::{Error, Result};
use crate::store::{Collection, Document, DocumentStore, WriteOp};
use crate::task::record::{from_millis, to_millis};

pub const NOTHING_TO_ARCHIVE: &str = "Nothing to archive";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveReport {
    pub moved: usize,
    pub batches: usize,
    pub message: String,
}

/// Whether a closed task's document is due for archiving.
///
/// Closed tasks without `completedAt` are always due.
pub fn is_due(doc: &Document, cutoff: DateTime<Utc>) -> bool {
    let done = doc.data.get("isDone").and_then(|v| v.as_bool()) == Some(true);
    if !done {
        return false;
    }
    match doc
        .data
        .get("completedAt")
        .and_then(|v| v.as_i64())
        .and_then(from_millis)
    {
        Some(completed_at) => completed_at < cutoff,
        None => true,
    }
}

pub struct Archiver<'a> {
    store: &'a dyn DocumentStore,
    config: &'a ArchiveConfig,
}

impl<'a> Archiver<'a> {
    pub fn new(store: &'a dyn DocumentStore, config: &'a ArchiveConfig) -> Self {
        Self { store, config }
    }

    /// Documents the next run would move.
    pub fn candidates(&self, now: DateTime<Utc>) -> Result<Vec<Document>> {
        let cutoff = Duration::try_hours(self.config.retention_hours)
            .and_then(|retention| now.checked_sub_signed(retention))
            .ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "archive.retention_hours {} is out of range",
                    self.config.retention_hours
                ))
            })?;
        Ok(self
            .store
            .list(Collection::Tasks)?
            .into_iter()
            .filter(|doc| doc.data.get("isDone").and_then(|v| v.as_bool()) == Some(true))
            .take(self.config.fetch_limit)
            .filter(|doc| is_due(doc, cutoff))
            .collect())
    }

    /// Copy each due task into the archive and delete it from the live
    /// set, one atomic batch per chunk. A failing chunk stops the run;
    /// chunks already committed stay committed.
    pub fn run(&self, now: DateTime<Utc>) -> Result<ArchiveReport> {
        let due = self.candidates(now)?;
        if due.is_empty() {
            tracing::info!("archive run found nothing to move");
            return Ok(ArchiveReport {
                moved: 0,
                batches: 0,
                message: NOTHING_TO_ARCHIVE.to_string(),
            });
        }

        let archived_at = json!(to_millis(now));
        let mut moved = 0;
        let mut batches = 0;

        for chunk in due.chunks(self.config.batch_size.max(1)) {
            let mut ops = Vec::with_capacity(chunk.len() * 2);
            for doc in chunk {
                let mut data = doc.data.clone();
                data.insert("archivedAt".to_string(), archived_at.clone());
                ops.push(WriteOp::Set {
                    collection: Collection::ArchivedTasks,
                    id: doc.id.clone(),
                    data,
                });
                ops.push(WriteOp::Delete {
                    collection: Collection::Tasks,
                    id: doc.id.clone(),
                });
            }
            self.store.batch(ops)?;
            moved += chunk.len();
            batches += 1;
            tracing::info!(batch = batches, count = chunk.len(), "archive batch committed");
        }

        Ok(ArchiveReport {
            moved,
            batches,
            message: format!("Archived {moved} tasks"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{fields, MemoryStore};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    fn add(store: &MemoryStore, done: bool, completed_hours_ago: Option<i64>) -> String {
        let mut data = fields([("text", json!("t")), ("isDone", json!(done))]);
        if let Some(hours) = completed_hours_ago {
            data.insert(
                "completedAt".to_string(),
                json!(to_millis(now() - Duration::hours(hours))),
            );
        }
        store.insert(Collection::Tasks, data).unwrap()
    }

    #[test]
    fn cutoff_selects_old_and_undated_closed_tasks() {
        let store = MemoryStore::new();
        let old = add(&store, true, Some(25));
        let _recent = add(&store, true, Some(1));
        let undated = add(&store, true, None);
        let _open = add(&store, false, Some(100));

        let config = ArchiveConfig::default();
        let archiver = Archiver::new(&store, &config);
        let mut ids: Vec<String> = archiver
            .candidates(now())
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        ids.sort();
        let mut expected = vec![old, undated];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[test]
    fn run_moves_in_batches_and_stamps_archived_at() {
        let store = MemoryStore::new();
        for _ in 0..7 {
            add(&store, true, Some(48));
        }
        add(&store, false, None);

        let config = ArchiveConfig {
            batch_size: 3,
            ..ArchiveConfig::default()
        };
        let report = Archiver::new(&store, &config).run(now()).unwrap();
        assert_eq!(report.moved, 7);
        assert_eq!(report.batches, 3);

        assert_eq!(store.list(Collection::Tasks).unwrap().len(), 1);
        let archived = store.list(Collection::ArchivedTasks).unwrap();
        assert_eq!(archived.len(), 7);
        assert!(archived
            .iter()
            .all(|d| d.data.get("archivedAt") == Some(&json!(to_millis(now())))));
    }

    #[test]
    fn empty_run_reports_nothing_to_archive() {
        let store = MemoryStore::new();
        add(&store, true, Some(2));
        let config = ArchiveConfig::default();
        let report = Archiver::new(&store, &config).run(now()).unwrap();
        assert_eq!(report.moved, 0);
        assert_eq!(report.message, NOTHING_TO_ARCHIVE);
    }

    #[test]
    fn fetch_limit_bounds_a_single_run() {
        let store = MemoryStore::new();
        for _ in 0..5 {
            add(&store, true, None);
        }
        let config = ArchiveConfig {
            fetch_limit: 2,
            ..ArchiveConfig::default()
        };
        let report = Archiver::new(&store, &config).run(now()).unwrap();
        assert_eq!(report.moved, 2);
        assert_eq!(store.list(Collection::Tasks).unwrap().len(), 3);
    }

    #[test]
    fn oversized_retention_is_a_config_error() {
        let store = MemoryStore::new();
        add(&store, true, Some(48));
        let config = ArchiveConfig {
            retention_hours: i64::MAX,
            ..ArchiveConfig::default()
        };
        let err = Archiver::new(&store, &config).run(now()).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert_eq!(store.list(Collection::Tasks).unwrap().len(), 1);
    }
}
