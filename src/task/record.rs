//! Stored shape of a task and the adapter to and from [`Task`].
//!
//! Documents keep the flat camelCase layout the floor clients have always
//! written (`isDone`, `inProgressBy`, `inventoryHistory`, epoch-ms
//! timestamps). Records written before structured fields existed only carry
//! the slash-delimited `text`; those are recovered positionally here and
//! nowhere else.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::display::parse_quantity_phrase;
use super::{
    Completion, InventoryInterval, MissingReport, Priority, QuantityUnit, Task, TaskKind,
    TaskState,
};
use crate::error::Result;
use crate::store::{self, Document, Fields};

pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_INCORRECTLY_ENTERED: &str = "incorrectly_entered";

/// Fields owned by lifecycle transitions.
const LIFECYCLE_FIELDS: &[&str] = &[
    "isDone",
    "status",
    "completedAt",
    "completionTime",
    "completedBy",
    "isInProgress",
    "inProgressBy",
    "startedAt",
    "isMissing",
    "missingReason",
    "missingReportedBy",
    "isBlocked",
    "inventoryHistory",
];

/// Fields owned by edit and note operations.
const CONTENT_FIELDS: &[&str] = &["text", "priority", "note"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalDocument {
    pub start: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
}

/// Task document as stored in `tasks` and `archived_tasks`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDocument {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workplace: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub quantity: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub quantity_unit: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_minutes",
        skip_serializing_if = "Option::is_none"
    )]
    pub standard_time: Option<u32>,
    #[serde(default)]
    pub is_done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<String>,
    #[serde(default)]
    pub is_in_progress: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_progress_by: Option<String>,
    #[serde(default)]
    pub is_missing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_reported_by: Option<String>,
    #[serde(default)]
    pub is_blocked: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inventory_history: Vec<IntervalDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_ad_hoc: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<i64>,
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_minutes<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64().filter(|v| *v >= 0.0).map(|v| v.round() as u32),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Legacy texts carry the creating client's wall-clock time.
fn local_to_utc(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|at| at.with_timezone(&Utc))
}

pub fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

/// Fields recovered from a slash-delimited legacy text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyFields {
    pub created: Option<NaiveDateTime>,
    pub part_number: Option<String>,
    pub workplace: Option<String>,
    pub quantity: Option<(u32, QuantityUnit)>,
}

/// Positional parse of `DD/MM/YY HH:MM:SS / part / workplace / Počet: qty`.
pub fn parse_legacy_text(text: &str) -> LegacyFields {
    let segments: Vec<&str> = text.split(" / ").map(str::trim).collect();
    let non_empty = |i: usize| {
        segments
            .get(i)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
    };

    let created = segments
        .first()
        .and_then(|s| NaiveDateTime::parse_from_str(s, "%d/%m/%y %H:%M:%S").ok());

    let quantity = segments.get(3).and_then(|segment| {
        let phrase = segment
            .split_once(':')
            .map(|(_, rest)| rest)
            .unwrap_or(segment);
        parse_quantity_phrase(phrase)
    });

    LegacyFields {
        created,
        part_number: if segments.len() >= 3 { non_empty(1) } else { None },
        workplace: if segments.len() >= 3 { non_empty(2) } else { None },
        quantity,
    }
}

impl TaskDocument {
    pub fn into_task(self, id: String) -> Task {
        let needs_legacy = self.created_at.is_none()
            || (!self.is_ad_hoc && (self.part_number.is_none() || self.workplace.is_none()));
        let legacy = if needs_legacy {
            parse_legacy_text(&self.text)
        } else {
            LegacyFields::default()
        };

        let kind = if self.is_ad_hoc {
            TaskKind::AdHoc
        } else {
            let unit = self
                .quantity_unit
                .as_deref()
                .and_then(|u| u.parse().ok())
                .unwrap_or_default();
            let quantity = self
                .quantity
                .as_deref()
                .and_then(|q| q.trim().parse::<u32>().ok());

            if self.part_number.is_some() && self.workplace.is_some() {
                TaskKind::Movement {
                    part_number: self.part_number,
                    workplace: self.workplace,
                    quantity,
                    unit,
                }
            } else {
                let (legacy_quantity, legacy_unit) = match legacy.quantity {
                    Some((q, u)) => (Some(q), u),
                    None => (None, unit),
                };
                TaskKind::Movement {
                    part_number: self.part_number.or(legacy.part_number.clone()),
                    workplace: self.workplace.or(legacy.workplace.clone()),
                    quantity: quantity.or(legacy_quantity),
                    unit: if quantity.is_some() { unit } else { legacy_unit },
                }
            }
        };

        let state = if self.is_done {
            let completion = Completion {
                at: self.completed_at.and_then(from_millis),
                by: self.completed_by,
                display_time: self.completion_time,
            };
            if self.status.as_deref() == Some(STATUS_INCORRECTLY_ENTERED) {
                TaskState::IncorrectlyEntered(completion)
            } else {
                TaskState::Completed(completion)
            }
        } else {
            TaskState::Open {
                in_progress_by: self
                    .is_in_progress
                    .then(|| self.in_progress_by.unwrap_or_default()),
                blocked: self.is_blocked,
            }
        };

        let missing = self.is_missing.then(|| MissingReport {
            reason: self.missing_reason.unwrap_or_default(),
            reported_by: self.missing_reported_by,
        });

        let inventory_history = self
            .inventory_history
            .into_iter()
            .filter_map(|i| {
                Some(InventoryInterval {
                    start: from_millis(i.start)?,
                    end: i.end.and_then(from_millis),
                })
            })
            .collect();

        Task {
            id,
            text: self.text,
            kind,
            standard_time: self.standard_time,
            priority: self
                .priority
                .as_deref()
                .and_then(|p| p.parse::<Priority>().ok())
                .unwrap_or_default(),
            note: self.note.filter(|n| !n.trim().is_empty()),
            created_at: self
                .created_at
                .and_then(from_millis)
                .or_else(|| legacy.created.and_then(local_to_utc)),
            created_by: self.created_by,
            started_at: self.started_at.and_then(from_millis),
            missing,
            inventory_history,
            state,
            archived_at: self.archived_at.and_then(from_millis),
        }
    }

    pub fn from_task(task: &Task) -> Self {
        let (part_number, workplace, quantity, quantity_unit) = match &task.kind {
            TaskKind::Movement {
                part_number,
                workplace,
                quantity,
                unit,
            } => (
                part_number.clone(),
                workplace.clone(),
                quantity.map(|q| q.to_string()),
                Some(unit.as_str().to_string()),
            ),
            TaskKind::AdHoc => (None, None, None, None),
        };

        let mut doc = TaskDocument {
            text: task.text.clone(),
            part_number,
            workplace,
            quantity,
            quantity_unit,
            standard_time: task.standard_time,
            priority: Some(task.priority.as_str().to_string()),
            created_at: task.created_at.map(to_millis),
            created_by: task.created_by.clone(),
            started_at: task.started_at.map(to_millis),
            note: task.note.clone(),
            is_ad_hoc: task.is_ad_hoc(),
            archived_at: task.archived_at.map(to_millis),
            inventory_history: task
                .inventory_history
                .iter()
                .map(|i| IntervalDocument {
                    start: to_millis(i.start),
                    end: i.end.map(to_millis),
                })
                .collect(),
            ..TaskDocument::default()
        };

        if let Some(report) = &task.missing {
            doc.is_missing = true;
            doc.missing_reason = Some(report.reason.clone());
            doc.missing_reported_by = report.reported_by.clone();
        }

        match &task.state {
            TaskState::Open {
                in_progress_by,
                blocked,
            } => {
                doc.is_in_progress = in_progress_by.is_some();
                doc.in_progress_by = in_progress_by.clone();
                doc.is_blocked = *blocked;
            }
            TaskState::Completed(c) | TaskState::IncorrectlyEntered(c) => {
                doc.is_done = true;
                doc.status = Some(
                    if task.is_incorrect() {
                        STATUS_INCORRECTLY_ENTERED
                    } else {
                        STATUS_COMPLETED
                    }
                    .to_string(),
                );
                doc.completed_at = c.at.map(to_millis);
                doc.completed_by = c.by.clone();
                doc.completion_time = c.display_time.clone();
            }
        }

        doc
    }
}

/// Decode a stored task. Malformed documents degrade to placeholders.
pub fn task_from_document(doc: &Document) -> Task {
    let record = doc.decode::<TaskDocument>().unwrap_or_else(|err| {
        tracing::warn!(id = %doc.id, error = %err, "malformed task document, using text only");
        TaskDocument {
            text: doc.str_field("text").unwrap_or_default().to_string(),
            ..TaskDocument::default()
        }
    });
    record.into_task(doc.id.clone())
}

/// Full document for inserting a task.
pub fn task_fields(task: &Task) -> Result<Fields> {
    store::encode(&TaskDocument::from_task(task))
}

/// Patch carrying only lifecycle fields; absent values become deletions.
pub fn lifecycle_patch(task: &Task) -> Result<Fields> {
    select_fields(task, LIFECYCLE_FIELDS)
}

/// Patch carrying only text, priority and note.
pub fn content_patch(task: &Task) -> Result<Fields> {
    select_fields(task, CONTENT_FIELDS)
}

fn select_fields(task: &Task, keys: &[&str]) -> Result<Fields> {
    let mut full = task_fields(task)?;
    Ok(keys
        .iter()
        .map(|key| {
            let value = full.remove(*key).unwrap_or(Value::Null);
            (key.to_string(), value)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(data: Value) -> Document {
        Document {
            id: "t1".to_string(),
            data: data.as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn structured_record_decodes() {
        let task = task_from_document(&doc(json!({
            "text": "x",
            "partNumber": "A-1",
            "workplace": "W2",
            "quantity": "3",
            "quantityUnit": "boxes",
            "standardTime": 12,
            "priority": "URGENT",
            "createdAt": 1_700_000_000_000i64,
            "isDone": false,
            "isInProgress": true,
            "inProgressBy": "jana"
        })));
        assert_eq!(task.part_number(), Some("A-1"));
        assert_eq!(task.priority, Priority::Urgent);
        assert_eq!(task.standard_time, Some(12));
        assert_eq!(task.in_progress_by(), Some("jana"));
        assert!(matches!(
            task.kind,
            TaskKind::Movement {
                quantity: Some(3),
                unit: QuantityUnit::Boxes,
                ..
            }
        ));
    }

    #[test]
    fn legacy_text_fills_missing_fields() {
        let task = task_from_document(&doc(json!({
            "text": "04/03/24 07:05:09 / B-22 / Lisovňa / Počet: Celá paleta",
            "isDone": true,
            "completedAt": 1_700_000_000_000i64
        })));
        assert_eq!(task.part_number(), Some("B-22"));
        assert_eq!(task.workplace(), Some("Lisovňa"));
        assert!(matches!(
            task.kind,
            TaskKind::Movement {
                quantity: Some(1),
                unit: QuantityUnit::Pallet,
                ..
            }
        ));
        assert!(matches!(task.state, TaskState::Completed(_)));
    }

    #[test]
    fn legacy_text_supplies_creation_time() {
        let task = task_from_document(&doc(json!({
            "text": "04/03/24 07:05:09 / B-22 / Lisovna / Počet: 3"
        })));
        let expected = NaiveDateTime::parse_from_str("2024-03-04 07:05:09", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        let created = task.created_at.expect("created from text");
        assert_eq!(created.with_timezone(&Local).naive_local(), expected);

        let stamped = task_from_document(&doc(json!({
            "text": "04/03/24 07:05:09 / B-22 / Lisovna / Počet: 3",
            "createdAt": 1_700_000_000_000i64
        })));
        assert_eq!(stamped.created_at, from_millis(1_700_000_000_000));
    }

    #[test]
    fn garbage_text_yields_placeholders_not_errors() {
        let task = task_from_document(&doc(json!({ "text": "call the forklift" })));
        assert_eq!(task.part_number(), None);
        assert_eq!(task.workplace(), None);
        assert_eq!(task.priority, Priority::Normal);

        let wrong_types = task_from_document(&doc(json!({ "text": "t", "isDone": "yes" })));
        assert_eq!(wrong_types.text, "t");
        assert!(!wrong_types.is_done());
    }

    #[test]
    fn unknown_priority_falls_back_to_normal() {
        let task = task_from_document(&doc(json!({ "text": "t", "priority": "AD_HOC" })));
        assert_eq!(task.priority, Priority::Normal);
    }

    #[test]
    fn incorrect_status_maps_to_variant() {
        let task = task_from_document(&doc(json!({
            "text": "t",
            "isDone": true,
            "status": "incorrectly_entered",
            "completedBy": "eva"
        })));
        assert!(task.is_incorrect());
        assert_eq!(task.completed_by(), Some("eva"));
    }

    #[test]
    fn lifecycle_patch_nulls_cleared_stamps_and_skips_content() {
        let mut task = task_from_document(&doc(json!({
            "text": "t",
            "partNumber": "A",
            "workplace": "W",
            "isDone": true,
            "completedAt": 5,
            "completedBy": "x",
            "completionTime": "7:00:00"
        })));
        task.state = TaskState::default();

        let patch = lifecycle_patch(&task).unwrap();
        assert_eq!(patch.get("isDone"), Some(&json!(false)));
        assert_eq!(patch.get("completedAt"), Some(&Value::Null));
        assert_eq!(patch.get("completedBy"), Some(&Value::Null));
        assert_eq!(patch.get("status"), Some(&Value::Null));
        assert!(!patch.contains_key("text"));
        assert!(!patch.contains_key("partNumber"));
    }
}
