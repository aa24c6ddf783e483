//! Break windows and the break scheduler.
//!
//! A break window is a named daily `[start, end)` range in local time. The
//! scheduler polls the clock and keeps one persisted break instance in
//! `system_breaks` in step with the windows: it opens an instance when the
//! current minute enters a window and closes it when the minute reaches a
//! window's end or leaves every window.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::store::{self, Collection, DocumentStore, WriteOp};
use crate::task::record::{from_millis, to_millis};

/// A configured daily break.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakWindow {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(serialize_with = "serialize_hhmm")]
    pub start: NaiveTime,
    #[serde(serialize_with = "serialize_hhmm")]
    pub end: NaiveTime,
}

fn serialize_hhmm<S: serde::Serializer>(
    time: &NaiveTime,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_hhmm(*time))
}

impl BreakWindow {
    /// Whether `time` falls inside the window. The end is exclusive; a
    /// window whose end is not after its start wraps past midnight.
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start < self.end {
            self.start <= time && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}

/// One observed break occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemBreak {
    pub id: String,
    pub start: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    pub is_active: bool,
}

#[derive(Deserialize)]
struct WindowDoc {
    #[serde(default)]
    name: Option<String>,
    start: String,
    end: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BreakDoc {
    start: i64,
    #[serde(default)]
    end: Option<i64>,
    #[serde(default)]
    is_active: bool,
}

/// Parse `HH:MM`.
pub fn parse_hhmm(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| Error::InvalidArgument(format!("invalid time '{raw}' (expected HH:MM)")))
}

pub fn format_hhmm(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Truncate to the minute; windows are matched at minute granularity.
fn minute_of(local: NaiveDateTime) -> NaiveTime {
    NaiveTime::from_hms_opt(local.hour(), local.minute(), 0).unwrap_or(NaiveTime::MIN)
}

/// Whether any window covers the given local time.
pub fn is_break_time(windows: &[BreakWindow], local: NaiveDateTime) -> bool {
    let minute = minute_of(local);
    windows.iter().any(|w| w.contains(minute))
}

/// What a scheduler tick did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BreakAction {
    Started { r#break: SystemBreak },
    Ended { r#break: SystemBreak },
    Idle { active: bool },
}

/// Combined view used by `ft break status` and the creation gate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakStatus {
    pub active_break: Option<SystemBreak>,
    pub window_active: bool,
    pub matching_windows: Vec<BreakWindow>,
}

impl BreakStatus {
    /// Either signal counts: the persisted flag may lag the clock.
    pub fn is_break(&self) -> bool {
        self.active_break.is_some() || self.window_active
    }
}

#[derive(Clone)]
pub struct BreakScheduler {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    duplicate_guard: Duration,
}

impl BreakScheduler {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, duplicate_guard_secs: i64) -> Self {
        Self {
            store,
            clock,
            duplicate_guard: Duration::try_seconds(duplicate_guard_secs).unwrap_or(Duration::MAX),
        }
    }

    pub fn windows(&self) -> Result<Vec<BreakWindow>> {
        let mut windows: Vec<BreakWindow> = self
            .store
            .list(Collection::BreakSchedules)?
            .iter()
            .filter_map(|doc| {
                let raw = doc.decode::<WindowDoc>().ok()?;
                let window = BreakWindow {
                    id: doc.id.clone(),
                    name: raw.name.filter(|n| !n.trim().is_empty()),
                    start: parse_hhmm(&raw.start).ok()?,
                    end: parse_hhmm(&raw.end).ok()?,
                };
                Some(window)
            })
            .collect();
        windows.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.end.cmp(&b.end)));
        Ok(windows)
    }

    pub fn add_window(&self, name: Option<&str>, start: &str, end: &str) -> Result<BreakWindow> {
        let start = parse_hhmm(start)?;
        let end = parse_hhmm(end)?;
        if start == end {
            return Err(Error::InvalidArgument(
                "break window start and end must differ".to_string(),
            ));
        }
        let name = name.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string);
        let mut data = store::fields([
            ("start", json!(format_hhmm(start))),
            ("end", json!(format_hhmm(end))),
        ]);
        if let Some(name) = &name {
            data.insert("name".to_string(), json!(name));
        }
        let id = self.store.insert(Collection::BreakSchedules, data)?;
        Ok(BreakWindow {
            id,
            name,
            start,
            end,
        })
    }

    pub fn remove_window(&self, id: &str) -> Result<()> {
        self.store.delete(Collection::BreakSchedules, id)
    }

    /// Every recorded break, oldest first.
    pub fn breaks(&self) -> Result<Vec<SystemBreak>> {
        let mut breaks: Vec<SystemBreak> = self
            .store
            .list(Collection::SystemBreaks)?
            .iter()
            .filter_map(|doc| {
                let raw = doc.decode::<BreakDoc>().ok()?;
                Some(SystemBreak {
                    id: doc.id.clone(),
                    start: from_millis(raw.start)?,
                    end: raw.end.and_then(from_millis),
                    is_active: raw.is_active,
                })
            })
            .collect();
        breaks.sort_by_key(|b| b.start);
        Ok(breaks)
    }

    pub fn active_break(&self) -> Result<Option<SystemBreak>> {
        Ok(self.breaks()?.into_iter().rev().find(|b| b.is_active))
    }

    pub fn status(&self) -> Result<BreakStatus> {
        let minute = minute_of(self.clock.local_now());
        let matching_windows: Vec<BreakWindow> = self
            .windows()?
            .into_iter()
            .filter(|w| w.contains(minute))
            .collect();
        Ok(BreakStatus {
            active_break: self.active_break()?,
            window_active: !matching_windows.is_empty(),
            matching_windows,
        })
    }

    /// One scheduler evaluation.
    pub fn tick(&self) -> Result<BreakAction> {
        let now = self.clock.now();
        let minute = minute_of(self.clock.local_now());
        let windows = self.windows()?;
        let breaks = self.breaks()?;

        let in_window = windows.iter().any(|w| w.contains(minute));
        let at_window_end = windows.iter().any(|w| w.end == minute);
        let active: Vec<&SystemBreak> = breaks.iter().filter(|b| b.is_active).collect();

        if let Some(latest) = active.last() {
            if at_window_end || !in_window {
                let ops = active
                    .iter()
                    .map(|b| WriteOp::Update {
                        collection: Collection::SystemBreaks,
                        id: b.id.clone(),
                        patch: store::fields([
                            ("end", json!(to_millis(now))),
                            ("isActive", json!(false)),
                        ]),
                    })
                    .collect();
                self.store.batch(ops)?;
                let ended = SystemBreak {
                    end: Some(now),
                    is_active: false,
                    ..(*latest).clone()
                };
                tracing::info!(id = %ended.id, "break ended");
                return Ok(BreakAction::Ended { r#break: ended });
            }
            return Ok(BreakAction::Idle { active: true });
        }

        if in_window {
            let floor = now.checked_sub_signed(self.duplicate_guard);
            let recent = breaks
                .iter()
                .any(|b| floor.map_or(true, |floor| b.start > floor) && b.start <= now);
            if recent {
                tracing::debug!("break start suppressed by duplicate guard");
                return Ok(BreakAction::Idle { active: false });
            }

            let id = self.store.insert(
                Collection::SystemBreaks,
                store::fields([
                    ("start", json!(to_millis(now))),
                    ("isActive", json!(true)),
                ]),
            )?;
            let started = SystemBreak {
                id,
                start: now,
                end: None,
                is_active: true,
            };
            tracing::info!(id = %started.id, "break started");
            return Ok(BreakAction::Started { r#break: started });
        }

        Ok(BreakAction::Idle { active: false })
    }

    /// Manual override: end the active break whatever the windows say.
    pub fn force_end(&self) -> Result<Option<SystemBreak>> {
        let now = self.clock.now();
        let active: Vec<SystemBreak> = self
            .breaks()?
            .into_iter()
            .filter(|b| b.is_active)
            .collect();
        let Some(latest) = active.last().cloned() else {
            return Ok(None);
        };

        let ops = active
            .into_iter()
            .map(|b| WriteOp::Update {
                collection: Collection::SystemBreaks,
                id: b.id,
                patch: store::fields([("end", json!(to_millis(now))), ("isActive", json!(false))]),
            })
            .collect();
        self.store.batch(ops)?;
        tracing::info!(id = %latest.id, "break ended manually");
        Ok(Some(SystemBreak {
            end: Some(now),
            is_active: false,
            ..latest
        }))
    }

    /// Poll `tick` every `every` until `shutdown` resolves.
    ///
    /// Store I/O runs on the blocking pool. A failed tick is reported to
    /// `on_tick` and polling continues.
    pub async fn run<F, C>(&self, every: StdDuration, shutdown: F, mut on_tick: C) -> Result<()>
    where
        F: Future<Output = ()>,
        C: FnMut(Result<BreakAction>),
    {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("break scheduler stopping");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    let scheduler = self.clone();
                    let result = tokio::task::spawn_blocking(move || scheduler.tick())
                        .await
                        .map_err(|e| Error::OperationFailed(format!("scheduler tick panicked: {e}")))
                        .and_then(|r| r);
                    on_tick(result);
                }
            }
        }
    }
}
