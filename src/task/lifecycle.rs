//! Task state transitions.
//!
//! Every transition is a pure function from the current task to the next one.
//! Nothing here reads a clock or touches the store: callers pass the actor
//! and a [`Moment`], then persist [`super::record::lifecycle_patch`] of the
//! result.

use chrono::{DateTime, NaiveDateTime, Utc};

use super::display::completion_display;
use super::{Completion, InventoryInterval, MissingReport, Priority, Task, TaskState};
use crate::error::{Error, Result};

/// The instant a transition happens, in both stored and local form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Moment {
    pub at: DateTime<Utc>,
    pub local: NaiveDateTime,
}

/// What a transition did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Finished,
    Reopened,
    MarkedIncorrect,
    Started,
    Stopped,
    Released,
    MissingReported,
    MissingCleared,
    Blocked,
    Unblocked,
    Edited,
    Noted,
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub task: Task,
    pub change: Change,
}

impl Transition {
    fn new(task: Task, change: Change) -> Self {
        Self { task, change }
    }
}

fn stamp(actor: &str, moment: Moment) -> Completion {
    Completion {
        at: Some(moment.at),
        by: Some(actor.to_string()),
        display_time: Some(completion_display(moment.local)),
    }
}

/// Close the running inventory interval, if there is one.
fn close_open_interval(history: &mut [InventoryInterval], at: DateTime<Utc>) {
    if let Some(last) = history.last_mut() {
        if last.end.is_none() {
            last.end = Some(at);
        }
    }
}

/// Move an open task to a closed state, dropping claim and block.
fn close(mut task: Task, state: TaskState, moment: Moment) -> Task {
    close_open_interval(&mut task.inventory_history, moment.at);
    task.state = state;
    task
}

/// Flip done/not-done. Reopening keeps `started_at`.
pub fn toggle_finished(task: &Task, actor: &str, moment: Moment) -> Result<Transition> {
    match &task.state {
        TaskState::Open { .. } => Ok(Transition::new(
            close(
                task.clone(),
                TaskState::Completed(stamp(actor, moment)),
                moment,
            ),
            Change::Finished,
        )),
        TaskState::Completed(_) => {
            let mut next = task.clone();
            next.state = TaskState::default();
            Ok(Transition::new(next, Change::Reopened))
        }
        TaskState::IncorrectlyEntered(_) => Err(Error::invalid_transition(
            &task.id,
            "reopen",
            "task was marked as incorrectly entered",
        )),
    }
}

/// One-way close as incorrectly entered.
pub fn mark_incorrect(task: &Task, actor: &str, moment: Moment) -> Result<Transition> {
    if task.is_incorrect() {
        return Err(Error::invalid_transition(
            &task.id,
            "mark incorrect",
            "task is already marked as incorrectly entered",
        ));
    }
    Ok(Transition::new(
        close(
            task.clone(),
            TaskState::IncorrectlyEntered(stamp(actor, moment)),
            moment,
        ),
        Change::MarkedIncorrect,
    ))
}

/// Toggle the in-progress claim; the first start stamps `started_at`.
pub fn set_in_progress(task: &Task, actor: &str, moment: Moment) -> Result<Transition> {
    let TaskState::Open {
        in_progress_by,
        blocked,
    } = &task.state
    else {
        return Err(Error::invalid_transition(&task.id, "start", "task is closed"));
    };

    let mut next = task.clone();
    if in_progress_by.is_some() {
        next.state = TaskState::Open {
            in_progress_by: None,
            blocked: *blocked,
        };
        return Ok(Transition::new(next, Change::Stopped));
    }

    next.state = TaskState::Open {
        in_progress_by: Some(actor.to_string()),
        blocked: *blocked,
    };
    next.started_at.get_or_insert(moment.at);
    Ok(Transition::new(next, Change::Started))
}

/// Drop the claim without finishing. No-op when nobody holds the task.
pub fn release_in_progress(task: &Task) -> Transition {
    match &task.state {
        TaskState::Open {
            in_progress_by: Some(_),
            blocked,
        } => {
            let mut next = task.clone();
            next.state = TaskState::Open {
                in_progress_by: None,
                blocked: *blocked,
            };
            Transition::new(next, Change::Released)
        }
        _ => Transition::new(task.clone(), Change::Unchanged),
    }
}

/// Flip the missing flag. Reporting an open task also finishes it;
/// clearing the report never reopens.
pub fn toggle_missing(
    task: &Task,
    actor: &str,
    reason: Option<&str>,
    default_reason: &str,
    moment: Moment,
) -> Transition {
    let mut next = task.clone();

    if next.missing.is_some() {
        next.missing = None;
        return Transition::new(next, Change::MissingCleared);
    }

    let reason = reason
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(default_reason);
    next.missing = Some(MissingReport {
        reason: reason.to_string(),
        reported_by: Some(actor.to_string()),
    });

    if !next.is_done() {
        next = close(next, TaskState::Completed(stamp(actor, moment)), moment);
    }
    Transition::new(next, Change::MissingReported)
}

/// Toggle the inventory block, opening or closing an interval.
pub fn toggle_block(task: &Task, moment: Moment) -> Result<Transition> {
    let TaskState::Open {
        in_progress_by,
        blocked,
    } = &task.state
    else {
        return Err(Error::invalid_transition(&task.id, "block", "task is closed"));
    };

    let mut next = task.clone();
    // Any stray open interval is closed first so at most one stays open.
    close_open_interval(&mut next.inventory_history, moment.at);

    let change = if *blocked {
        Change::Unblocked
    } else {
        next.inventory_history.push(InventoryInterval {
            start: moment.at,
            end: None,
        });
        Change::Blocked
    };

    next.state = TaskState::Open {
        in_progress_by: in_progress_by.clone(),
        blocked: !*blocked,
    };
    Ok(Transition::new(next, change))
}

/// Rewrite the display text and optionally the priority.
pub fn edit(task: &Task, text: &str, priority: Option<Priority>) -> Result<Transition> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::InvalidArgument("task text cannot be empty".to_string()));
    }
    let mut next = task.clone();
    next.text = text.to_string();
    if let Some(priority) = priority {
        next.priority = priority;
    }
    Ok(Transition::new(next, Change::Edited))
}

/// Set or clear (empty text) the note.
pub fn set_note(task: &Task, text: &str, max_len: usize) -> Result<Transition> {
    let text = text.trim();
    let len = text.chars().count();
    if len > max_len {
        return Err(Error::InvalidArgument(format!(
            "note is {len} characters, limit is {max_len}"
        )));
    }
    let mut next = task.clone();
    next.note = (!text.is_empty()).then(|| text.to_string());
    Ok(Transition::new(next, Change::Noted))
}
