//! Serializable task views for command output.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::clock::Clock;
use crate::task::display::{Descriptor, Locale};
use crate::task::{InventoryInterval, Priority, QuantityUnit, Task, TaskKind};

#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    pub id: String,
    pub text: String,
    pub status: &'static str,
    pub priority: Priority,
    pub ad_hoc: bool,
    pub part: String,
    pub workplace: String,
    pub quantity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<QuantityUnit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard_time: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_progress_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<String>,
    pub missing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_reported_by: Option<String>,
    pub blocked: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inventory_history: Vec<InventoryInterval>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
}

impl TaskView {
    pub fn new(task: &Task, locale: Locale) -> Self {
        let descriptor = Descriptor::of(task, locale);
        let unit = match &task.kind {
            TaskKind::Movement { unit, .. } => Some(*unit),
            TaskKind::AdHoc => None,
        };
        let completion = task.completion();
        Self {
            id: task.id.clone(),
            text: task.text.clone(),
            status: task.status_label(),
            priority: task.priority,
            ad_hoc: task.is_ad_hoc(),
            part: descriptor.part,
            workplace: descriptor.workplace,
            quantity: descriptor.quantity,
            unit,
            standard_time: task.standard_time,
            note: task.note.clone(),
            created_at: task.created_at,
            created_by: task.created_by.clone(),
            started_at: task.started_at,
            in_progress_by: task.in_progress_by().map(str::to_string),
            completed_at: task.completed_at(),
            completed_by: task.completed_by().map(str::to_string),
            completion_time: completion.and_then(|c| c.display_time.clone()),
            missing: task.is_missing(),
            missing_reason: task.missing.as_ref().map(|m| m.reason.clone()),
            missing_reported_by: task.missing.as_ref().and_then(|m| m.reported_by.clone()),
            blocked: task.is_blocked(),
            inventory_history: task.inventory_history.clone(),
            archived_at: task.archived_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskListOutput {
    pub total: usize,
    pub tasks: Vec<TaskView>,
}

/// One line of `ft task list`.
pub fn task_line(task: &Task, locale: Locale, clock: &dyn Clock) -> String {
    let d = Descriptor::of(task, locale);
    let created = task
        .created_at
        .map(|at| clock.to_local(at).format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string());
    let mut line = format!(
        "[{}][{}] {} {} / {} / {} ({created})",
        task.status_label(),
        task.priority,
        short_id(&task.id),
        d.part,
        d.workplace,
        d.quantity
    );
    if let Some(actor) = task.in_progress_by() {
        line.push_str(&format!(" by {actor}"));
    }
    if let Some(note) = &task.note {
        line.push_str(&format!(" [{note}]"));
    }
    line
}

/// Leading part of a ULID; any unique prefix resolves back to the task.
pub fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}
