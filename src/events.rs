//! Event output for external integrations.
//!
//! Every mutation can be mirrored as one JSON line to stdout or a file.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::task::lifecycle::Change;

pub const EVENT_SCHEMA_VERSION: &str = "floortask.event.v1";

#[derive(Debug, Clone)]
pub enum EventDestination {
    Stdout,
    File(PathBuf),
}

impl EventDestination {
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        raw.and_then(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return None;
            }
            if trimmed == "-" {
                return Some(EventDestination::Stdout);
            }
            Some(EventDestination::File(PathBuf::from(trimmed)))
        })
    }

    pub fn open(&self) -> Result<EventSink> {
        match self {
            EventDestination::Stdout => Ok(EventSink::stdout()),
            EventDestination::File(path) => EventSink::file(path),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TaskCreated,
    TaskFinished,
    TaskReopened,
    TaskMarkedIncorrect,
    TaskStarted,
    TaskStopped,
    TaskReleased,
    TaskMissingReported,
    TaskMissingCleared,
    TaskBlocked,
    TaskUnblocked,
    TaskEdited,
    TaskNoted,
    TaskDeleted,
    BreakStarted,
    BreakEnded,
    TasksArchived,
}

impl EventKind {
    /// The event for a lifecycle change; `None` when nothing changed.
    pub fn for_change(change: Change) -> Option<Self> {
        Some(match change {
            Change::Finished => EventKind::TaskFinished,
            Change::Reopened => EventKind::TaskReopened,
            Change::MarkedIncorrect => EventKind::TaskMarkedIncorrect,
            Change::Started => EventKind::TaskStarted,
            Change::Stopped => EventKind::TaskStopped,
            Change::Released => EventKind::TaskReleased,
            Change::MissingReported => EventKind::TaskMissingReported,
            Change::MissingCleared => EventKind::TaskMissingCleared,
            Change::Blocked => EventKind::TaskBlocked,
            Change::Unblocked => EventKind::TaskUnblocked,
            Change::Edited => EventKind::TaskEdited,
            Change::Noted => EventKind::TaskNoted,
            Change::Unchanged => return None,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub schema_version: &'static str,
    pub event: EventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Event {
    pub fn new(event: EventKind, actor: Option<String>) -> Self {
        Self {
            schema_version: EVENT_SCHEMA_VERSION,
            event,
            timestamp: Utc::now(),
            actor,
            data: None,
        }
    }

    /// Attach a serializable payload to the event.
    pub fn with_data<T: Serialize>(mut self, data: T) -> Result<Self> {
        self.data = Some(serde_json::to_value(data)?);
        Ok(self)
    }
}

/// Event sink that writes JSONL output to a destination.
pub struct EventSink {
    writer: Box<dyn Write + Send>,
}

impl EventSink {
    pub fn stdout() -> Self {
        Self {
            writer: Box::new(std::io::stdout()),
        }
    }

    /// Append to a file, creating it if necessary.
    pub fn file(path: &Path) -> Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            writer: Box::new(file),
        })
    }

    pub fn emit(&mut self, event: &Event) -> Result<()> {
        let serialized = serde_json::to_vec(event)?;
        self.writer.write_all(&serialized)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush().map_err(Error::Io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn file_sink_appends_json_lines() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("events.jsonl");
        let dest = EventDestination::parse(Some(path.to_str().unwrap())).unwrap();

        for kind in [EventKind::TaskCreated, EventKind::TaskFinished] {
            let event = Event::new(kind, Some("eva".to_string()))
                .with_data(json!({ "id": "01abc" }))
                .unwrap();
            dest.open().unwrap().emit(&event).unwrap();
        }

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = raw
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["schema_version"], EVENT_SCHEMA_VERSION);
        assert_eq!(lines[1]["event"], "task_finished");
        assert_eq!(lines[1]["data"]["id"], "01abc");
    }

    #[test]
    fn destination_parsing() {
        assert!(matches!(
            EventDestination::parse(Some("-")),
            Some(EventDestination::Stdout)
        ));
        assert!(EventDestination::parse(Some("  ")).is_none());
        assert!(EventDestination::parse(None).is_none());
    }

    #[test]
    fn unchanged_transitions_emit_nothing() {
        assert_eq!(EventKind::for_change(Change::Unchanged), None);
        assert_eq!(
            EventKind::for_change(Change::MissingReported),
            Some(EventKind::TaskMissingReported)
        );
    }
}
