//! Read-only performance statistics over a task set.
//!
//! Execution time is the span between start and completion minus every
//! interruption (inventory blocks and system breaks). Interruptions are
//! merged into a union first, so overlapping coverage counts once.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

use crate::breaks::SystemBreak;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::task::display::PLACEHOLDER;
use crate::task::{Priority, Task};

pub const TOP_N: usize = 5;

/// Which tasks a report covers, by local creation date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    #[default]
    All,
    Today,
    Yesterday,
    /// Since Monday 00:00 of the current week.
    Week,
    Month,
    Custom {
        from: NaiveDate,
        to: Option<NaiveDate>,
    },
}

impl Period {
    /// Whether a task created at `created` (local) falls in the period.
    /// Undated tasks only belong to [`Period::All`].
    pub fn contains(&self, created: Option<NaiveDateTime>, today: NaiveDate) -> bool {
        if *self == Period::All {
            return true;
        }
        let Some(created) = created else {
            return false;
        };
        let day = created.date();
        match *self {
            Period::All => true,
            Period::Today => day == today,
            Period::Yesterday => today.pred_opt() == Some(day),
            Period::Week => {
                let monday =
                    today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
                day >= monday
            }
            Period::Month => day.year() == today.year() && day.month() == today.month(),
            Period::Custom { from, to } => day >= from && to.map_or(true, |to| day <= to),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Period::All => "all",
            Period::Today => "today",
            Period::Yesterday => "yesterday",
            Period::Week => "week",
            Period::Month => "month",
            Period::Custom { .. } => "custom",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Custom { from, to: Some(to) } => write!(f, "{from}..{to}"),
            Period::Custom { from, to: None } => write!(f, "{from}.."),
            other => f.write_str(other.name()),
        }
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Period::All),
            "today" => Ok(Period::Today),
            "yesterday" => Ok(Period::Yesterday),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            other => Err(Error::InvalidArgument(format!(
                "unknown period '{other}' (expected all, today, yesterday, week or month)"
            ))),
        }
    }
}

/// A half-open span in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Span {
    start: i64,
    end: i64,
}

/// Sort, clip to `[lo, hi]` and merge overlapping spans.
fn union(mut spans: Vec<Span>, lo: i64, hi: i64) -> Vec<Span> {
    spans.retain_mut(|span| {
        span.start = span.start.max(lo);
        span.end = span.end.min(hi);
        span.end > span.start
    });
    spans.sort();

    let mut merged: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(last) if span.start <= last.end => last.end = last.end.max(span.end),
            _ => merged.push(span),
        }
    }
    merged
}

/// Milliseconds of `[started, completed]` not covered by any interruption.
/// Open-ended interruptions run until `completed`.
pub fn execution_ms(task: &Task, breaks: &[SystemBreak]) -> Option<i64> {
    let started = task.started_at?.timestamp_millis();
    let completed = task.completed_at()?.timestamp_millis();
    if completed <= started {
        return None;
    }

    let spans = task
        .inventory_history
        .iter()
        .map(|i| (i.start, i.end))
        .chain(breaks.iter().map(|b| (b.start, b.end)))
        .map(|(start, end)| Span {
            start: start.timestamp_millis(),
            end: end.map_or(completed, |e| e.timestamp_millis()),
        })
        .collect();
    let interrupted: i64 = union(spans, started, completed)
        .iter()
        .map(|s| s.end - s.start)
        .sum();

    let net = completed - started - interrupted;
    (net > 0).then_some(net)
}

fn positive_ms(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Option<i64> {
    let ms = (to? - from?).num_milliseconds();
    (ms > 0).then_some(ms)
}

/// `startedAt - createdAt`, when positive.
pub fn reaction_ms(task: &Task) -> Option<i64> {
    positive_ms(task.created_at, task.started_at)
}

/// `completedAt - createdAt` for closed tasks, when positive.
pub fn lead_ms(task: &Task) -> Option<i64> {
    if !task.is_done() {
        return None;
    }
    positive_ms(task.created_at, task.completed_at())
}

#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    total: i64,
    count: i64,
}

impl Mean {
    fn add(&mut self, value: Option<i64>) {
        if let Some(value) = value {
            self.total += value;
            self.count += 1;
        }
    }

    fn value(self) -> i64 {
        if self.count == 0 {
            0
        } else {
            self.total / self.count
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ranked {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerRow {
    pub name: String,
    pub count: usize,
    pub total_execution_ms: i64,
    pub total_standard_minutes: u64,
    pub avg_reaction_ms: i64,
    pub avg_lead_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub period: String,
    pub total: usize,
    pub done: usize,
    pub missing: usize,
    pub urgent_done: usize,
    pub incorrectly_entered: usize,
    /// Rounded percentage of closed tasks among correctly entered ones.
    pub efficiency: u32,
    pub avg_reaction_ms: i64,
    pub avg_lead_ms: i64,
    pub total_execution_ms: i64,
    pub top_parts: Vec<Ranked>,
    pub top_workplaces: Vec<Ranked>,
    pub workers: Vec<WorkerRow>,
}

#[derive(Default)]
struct WorkerAcc {
    count: usize,
    execution: i64,
    standard_minutes: u64,
    reaction: Mean,
    lead: Mean,
}

fn countable(label: Option<&str>) -> Option<&str> {
    label
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != "-" && *v != PLACEHOLDER)
}

/// Occurrence counts that remember first-seen order.
#[derive(Default)]
struct Tally {
    ranked: Vec<Ranked>,
    index: HashMap<String, usize>,
}

impl Tally {
    fn add(&mut self, name: &str) {
        match self.index.get(name) {
            Some(&i) => self.ranked[i].count += 1,
            None => {
                self.index.insert(name.to_string(), self.ranked.len());
                self.ranked.push(Ranked {
                    name: name.to_string(),
                    count: 1,
                });
            }
        }
    }

    /// Highest counts first; ties keep first-seen order (stable sort).
    fn top(self) -> Vec<Ranked> {
        let mut ranked = self.ranked;
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        ranked.truncate(TOP_N);
        ranked
    }
}

/// Build a report for the tasks created in `period`.
pub fn report(tasks: &[Task], breaks: &[SystemBreak], period: Period, clock: &dyn Clock) -> Report {
    let today = clock.local_now().date();
    let selected: Vec<&Task> = tasks
        .iter()
        .filter(|t| period.contains(t.created_at.map(|at| clock.to_local(at)), today))
        .collect();

    let total = selected.len();
    let incorrectly_entered = selected.iter().filter(|t| t.is_incorrect()).count();
    let performance: Vec<&Task> = selected
        .iter()
        .copied()
        .filter(|t| !t.is_incorrect())
        .collect();

    let done = performance.iter().filter(|t| t.is_done()).count();
    let missing = performance.iter().filter(|t| t.is_missing()).count();
    let urgent_done = performance
        .iter()
        .filter(|t| t.is_done() && t.priority == Priority::Urgent)
        .count();
    let efficiency = if performance.is_empty() {
        0
    } else {
        (done as f64 / performance.len() as f64 * 100.0).round() as u32
    };

    let mut parts = Tally::default();
    let mut workplaces = Tally::default();
    let mut reaction = Mean::default();
    let mut lead = Mean::default();
    let mut total_execution_ms = 0;
    let mut workers: BTreeMap<String, WorkerAcc> = BTreeMap::new();

    for task in &performance {
        if let Some(part) = countable(task.part_number()) {
            parts.add(part);
        }
        if let Some(wp) = countable(task.workplace()) {
            workplaces.add(wp);
        }

        reaction.add(reaction_ms(task));
        lead.add(lead_ms(task));

        let Some(worker) = task.completed_by().filter(|_| task.is_done()) else {
            continue;
        };
        let acc = workers.entry(worker.to_string()).or_default();
        acc.count += 1;
        acc.standard_minutes += u64::from(task.standard_time.unwrap_or(0));
        acc.reaction.add(reaction_ms(task));
        acc.lead.add(lead_ms(task));
        if let Some(ms) = execution_ms(task, breaks) {
            acc.execution += ms;
            total_execution_ms += ms;
        }
    }

    let mut worker_rows: Vec<WorkerRow> = workers
        .into_iter()
        .map(|(name, acc)| WorkerRow {
            name,
            count: acc.count,
            total_execution_ms: acc.execution,
            total_standard_minutes: acc.standard_minutes,
            avg_reaction_ms: acc.reaction.value(),
            avg_lead_ms: acc.lead.value(),
        })
        .collect();
    worker_rows.sort_by(|a, b| b.count.cmp(&a.count));

    tracing::debug!(total, done, period = %period, "analytics report built");

    Report {
        period: period.to_string(),
        total,
        done,
        missing,
        urgent_done,
        incorrectly_entered,
        efficiency,
        avg_reaction_ms: reaction.value(),
        avg_lead_ms: lead.value(),
        total_execution_ms,
        top_parts: parts.top(),
        top_workplaces: workplaces.top(),
        workers: worker_rows,
    }
}
