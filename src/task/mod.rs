//! Floor task domain model.
//!
//! A [`Task`] is one part-movement request (or a free-text ad-hoc job). Its
//! lifecycle is carried by [`TaskState`], so completion stamps only exist on
//! closed tasks and claim/block flags only exist on open ones.
//!
//! Submodules:
//! - [`lifecycle`]: pure state transitions
//! - [`order`]: display ordering
//! - [`display`]: quantity phrasing, legacy text, durations
//! - [`record`]: the stored document shape and legacy parsing

pub mod display;
pub mod lifecycle;
pub mod order;
pub mod record;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    Urgent,
}

impl Priority {
    /// Sort rank; lower sorts first.
    pub fn rank(self) -> u8 {
        match self {
            Priority::Urgent => 0,
            Priority::Normal => 1,
            Priority::Low => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Normal => "NORMAL",
            Priority::Urgent => "URGENT",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Priority::Low),
            "NORMAL" => Ok(Priority::Normal),
            "URGENT" => Ok(Priority::Urgent),
            other => Err(Error::InvalidArgument(format!(
                "unknown priority '{other}' (expected LOW, NORMAL or URGENT)"
            ))),
        }
    }
}

/// Unit the requested quantity is counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantityUnit {
    #[default]
    Pieces,
    Boxes,
    Pallet,
}

impl QuantityUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            QuantityUnit::Pieces => "pieces",
            QuantityUnit::Boxes => "boxes",
            QuantityUnit::Pallet => "pallet",
        }
    }
}

impl FromStr for QuantityUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pieces" | "piece" | "pcs" | "ks" => Ok(QuantityUnit::Pieces),
            "boxes" | "box" => Ok(QuantityUnit::Boxes),
            "pallet" | "pallets" | "paleta" => Ok(QuantityUnit::Pallet),
            other => Err(Error::InvalidArgument(format!(
                "unknown quantity unit '{other}' (expected pieces, boxes or pallet)"
            ))),
        }
    }
}

/// What the task asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    /// Move `quantity` of a part to a workplace. Legacy records may lack
    /// any of the structured fields.
    Movement {
        part_number: Option<String>,
        workplace: Option<String>,
        quantity: Option<u32>,
        unit: QuantityUnit,
    },
    /// Free-text job with no part or workplace.
    AdHoc,
}

/// Completion stamps; always set and cleared together.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Completion {
    pub at: Option<DateTime<Utc>>,
    pub by: Option<String>,
    /// Local `H:MM:SS` shown on the card.
    pub display_time: Option<String>,
}

/// Lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Open {
        in_progress_by: Option<String>,
        blocked: bool,
    },
    Completed(Completion),
    IncorrectlyEntered(Completion),
}

impl Default for TaskState {
    fn default() -> Self {
        TaskState::Open {
            in_progress_by: None,
            blocked: false,
        }
    }
}

/// A missing-inventory report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingReport {
    pub reason: String,
    pub reported_by: Option<String>,
}

/// One inventory-count block; `end` is `None` while the block is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryInterval {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    /// Display text written at creation (or by an edit).
    pub text: String,
    pub kind: TaskKind,
    /// Workplace standard time in minutes, snapshotted at creation.
    pub standard_time: Option<u32>,
    pub priority: Priority,
    pub note: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub missing: Option<MissingReport>,
    pub inventory_history: Vec<InventoryInterval>,
    pub state: TaskState,
    pub archived_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn is_done(&self) -> bool {
        !matches!(self.state, TaskState::Open { .. })
    }

    pub fn is_incorrect(&self) -> bool {
        matches!(self.state, TaskState::IncorrectlyEntered(_))
    }

    pub fn is_missing(&self) -> bool {
        self.missing.is_some()
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self.state, TaskState::Open { blocked: true, .. })
    }

    pub fn in_progress_by(&self) -> Option<&str> {
        match &self.state {
            TaskState::Open {
                in_progress_by: Some(by),
                ..
            } => Some(by.as_str()),
            _ => None,
        }
    }

    pub fn completion(&self) -> Option<&Completion> {
        match &self.state {
            TaskState::Completed(c) | TaskState::IncorrectlyEntered(c) => Some(c),
            TaskState::Open { .. } => None,
        }
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completion().and_then(|c| c.at)
    }

    pub fn completed_by(&self) -> Option<&str> {
        self.completion().and_then(|c| c.by.as_deref())
    }

    pub fn part_number(&self) -> Option<&str> {
        match &self.kind {
            TaskKind::Movement { part_number, .. } => part_number.as_deref(),
            TaskKind::AdHoc => None,
        }
    }

    pub fn workplace(&self) -> Option<&str> {
        match &self.kind {
            TaskKind::Movement { workplace, .. } => workplace.as_deref(),
            TaskKind::AdHoc => None,
        }
    }

    pub fn is_ad_hoc(&self) -> bool {
        matches!(self.kind, TaskKind::AdHoc)
    }

    /// The running inventory block, if any.
    pub fn open_interval(&self) -> Option<&InventoryInterval> {
        self.inventory_history.last().filter(|i| i.end.is_none())
    }

    /// Short status word for listings.
    pub fn status_label(&self) -> &'static str {
        match &self.state {
            TaskState::Open {
                blocked: true, ..
            } => "blocked",
            TaskState::Open {
                in_progress_by: Some(_),
                ..
            } => "in_progress",
            TaskState::Open { .. } => "open",
            TaskState::Completed(_) if self.is_missing() => "missing",
            TaskState::Completed(_) => "completed",
            TaskState::IncorrectlyEntered(_) => "incorrectly_entered",
        }
    }
}

/// Resolve a task id from an exact id or a unique case-insensitive prefix.
pub fn resolve_task_id<'a, I>(ids: I, input: &str) -> Result<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let needle = input.trim().to_ascii_lowercase();
    if needle.is_empty() {
        return Err(Error::InvalidArgument("task id cannot be empty".to_string()));
    }

    let mut matches = Vec::new();
    for id in ids {
        let candidate = id.to_ascii_lowercase();
        if candidate == needle {
            return Ok(id.to_string());
        }
        if candidate.starts_with(&needle) {
            matches.push(id.to_string());
        }
    }

    match matches.len() {
        0 => Err(Error::TaskNotFound(input.to_string())),
        1 => Ok(matches.remove(0)),
        _ => Err(Error::InvalidArgument(format!(
            "ambiguous task id '{input}' (matches {})",
            matches.join(", ")
        ))),
    }
}
