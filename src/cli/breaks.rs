//! ft break command implementations.

use std::time::Duration;

use serde::Serialize;

use crate::actor::STATE_DIR;
use crate::breaks::{format_hhmm, BreakAction, BreakWindow};
use crate::cli::context::{Context, Globals};
use crate::error::{Error, Result};
use crate::events::EventKind;
use crate::lock::FileLock;
use crate::output::{emit_success, HumanOutput};
use crate::permissions;

/// Held for the lifetime of `ft break run` so one poller serves a workspace.
const SCHEDULER_LOCK: &str = "scheduler.lock";

pub struct WindowAddOptions {
    pub start: String,
    pub end: String,
    pub name: Option<String>,
    pub globals: Globals,
}

pub struct RunOptions {
    pub interval_secs: Option<u64>,
    pub globals: Globals,
}

#[derive(Serialize)]
struct WindowListOutput {
    total: usize,
    windows: Vec<BreakWindow>,
}

fn window_line(window: &BreakWindow) -> String {
    let span = format!(
        "{}-{}",
        format_hhmm(window.start),
        format_hhmm(window.end)
    );
    match &window.name {
        Some(name) => format!("{} {span} {name}", window.id),
        None => format!("{} {span}", window.id),
    }
}

pub fn run_window_add(options: WindowAddOptions) -> Result<()> {
    let ctx = Context::load(&options.globals)?;
    ctx.require(permissions::MANAGE_BREAKS)?;
    let window = ctx.engine.break_scheduler().add_window(
        options.name.as_deref(),
        &options.start,
        &options.end,
    )?;

    let mut human = HumanOutput::new("Break window added");
    human.push_summary("ID", window.id.clone());
    human.push_summary(
        "Window",
        format!("{}-{}", format_hhmm(window.start), format_hhmm(window.end)),
    );
    if window.end <= window.start {
        human.push_warning("window ends before it starts; it wraps past midnight");
    }
    emit_success(ctx.output(), "break window", &window, Some(&human))
}

pub fn run_window_list(globals: Globals) -> Result<()> {
    let ctx = Context::load(&globals)?;
    let windows = ctx.engine.break_scheduler().windows()?;

    let mut human = HumanOutput::new("Break windows");
    human.push_summary("Total", windows.len().to_string());
    for window in &windows {
        human.push_detail(window_line(window));
    }
    let output = WindowListOutput {
        total: windows.len(),
        windows,
    };
    emit_success(ctx.output(), "break window", &output, Some(&human))
}

pub fn run_window_rm(id: String, globals: Globals) -> Result<()> {
    let ctx = Context::load(&globals)?;
    ctx.require(permissions::MANAGE_BREAKS)?;
    ctx.engine.break_scheduler().remove_window(&id)?;

    let mut human = HumanOutput::new("Break window removed");
    human.push_summary("ID", id.clone());
    emit_success(
        ctx.output(),
        "break window",
        &serde_json::json!({ "id": id }),
        Some(&human),
    )
}

pub fn run_status(globals: Globals) -> Result<()> {
    let ctx = Context::load(&globals)?;
    let status = ctx.engine.break_scheduler().status()?;

    let header = if status.is_break() {
        "Break in progress"
    } else {
        "No break"
    };
    let mut human = HumanOutput::new(header);
    human.push_summary(
        "Persisted",
        match &status.active_break {
            Some(b) => format!("active since {}", b.start.to_rfc3339()),
            None => "inactive".to_string(),
        },
    );
    human.push_summary("Window", if status.window_active { "open" } else { "closed" });
    for window in &status.matching_windows {
        human.push_detail(window_line(window));
    }
    if status.window_active && status.active_break.is_none() {
        human.push_next_step("ft break tick");
    }
    emit_success(ctx.output(), "break status", &status, Some(&human))
}

fn action_header(action: &BreakAction) -> &'static str {
    match action {
        BreakAction::Started { .. } => "Break started",
        BreakAction::Ended { .. } => "Break ended",
        BreakAction::Idle { active: true } => "Break continues",
        BreakAction::Idle { active: false } => "No break",
    }
}

fn emit_action(ctx: &mut Context, action: &BreakAction) -> Option<String> {
    match action {
        BreakAction::Started { r#break } => ctx.emit(EventKind::BreakStarted, r#break),
        BreakAction::Ended { r#break } => ctx.emit(EventKind::BreakEnded, r#break),
        BreakAction::Idle { .. } => None,
    }
}

pub fn run_tick(globals: Globals) -> Result<()> {
    let mut ctx = Context::load(&globals)?;
    let action = ctx.engine.break_scheduler().tick()?;

    let mut human = HumanOutput::new(action_header(&action));
    if let Some(warning) = emit_action(&mut ctx, &action) {
        human.push_warning(warning);
    }
    emit_success(ctx.output(), "break tick", &action, Some(&human))
}

/// Manual override for privileged roles.
pub fn run_end(globals: Globals) -> Result<()> {
    let mut ctx = Context::load(&globals)?;
    ctx.require(permissions::MANAGE_BREAKS)?;
    let ended = ctx.engine.break_scheduler().force_end()?;

    let mut human = HumanOutput::new(match ended {
        Some(_) => "Break ended",
        None => "No active break",
    });
    if let Some(b) = &ended {
        human.push_summary("ID", b.id.clone());
        if let Some(warning) = ctx.emit(EventKind::BreakEnded, b) {
            human.push_warning(warning);
        }
    }
    emit_success(
        ctx.output(),
        "break end",
        &serde_json::json!({ "ended": ended }),
        Some(&human),
    )
}

/// Poll the scheduler until Ctrl-C. Each state change is reported as it
/// happens; idle ticks are only logged.
pub fn run_loop(options: RunOptions) -> Result<()> {
    let mut ctx = Context::load(&options.globals)?;
    let secs = options
        .interval_secs
        .unwrap_or(ctx.config.breaks.poll_interval_secs);
    if secs == 0 {
        return Err(Error::InvalidArgument(
            "interval must be at least 1 second".to_string(),
        ));
    }
    let lock_path = ctx.root.join(STATE_DIR).join(SCHEDULER_LOCK);
    let guard = FileLock::try_acquire(&lock_path)?
        .ok_or_else(|| Error::SchedulerRunning(lock_path.clone()))?;
    tracing::info!(lock = %guard.path().display(), secs, "break scheduler started");

    let scheduler = ctx.engine.break_scheduler();
    let output = ctx.output();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let shutdown = async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %err, "ctrl-c handler failed");
            }
        };
        scheduler
            .run(Duration::from_secs(secs), shutdown, |result| match result {
                Ok(BreakAction::Idle { active }) => {
                    tracing::debug!(active, "break tick idle");
                }
                Ok(action) => {
                    let mut human = HumanOutput::new(action_header(&action));
                    if let Some(warning) = emit_action(&mut ctx, &action) {
                        human.push_warning(warning);
                    }
                    if let Err(err) = emit_success(output, "break run", &action, Some(&human)) {
                        tracing::warn!(error = %err, "failed to report break action");
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "break tick failed");
                    if !output.quiet && !output.json {
                        eprintln!("warning: break tick failed: {err}");
                    }
                }
            })
            .await
    })
}
