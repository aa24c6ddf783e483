//! ft task command implementations.

use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;

use crate::cli::context::{Context, Globals};
use crate::cli::view::{short_id, task_line, TaskListOutput, TaskView};
use crate::clock::{Clock, SystemClock};
use crate::engine::{CreateOutcome, NewTask};
use crate::error::{Error, Result};
use crate::events::EventKind;
use crate::output::{emit_success, format_human, HumanOutput};
use crate::permissions;
use crate::store::{Collection, Document};
use crate::task::lifecycle::{Change, Transition};
use crate::task::order::sort_tasks;
use crate::task::record::task_from_document;
use crate::task::{Priority, QuantityUnit, Task};

pub struct NewOptions {
    pub part: String,
    pub workplace: String,
    pub quantity: String,
    pub unit: String,
    pub priority: String,
    pub globals: Globals,
}

pub struct AdHocOptions {
    pub description: String,
    pub priority: String,
    pub globals: Globals,
}

pub struct ListOptions {
    pub open: bool,
    pub status: Option<String>,
    pub limit: Option<usize>,
    pub globals: Globals,
}

/// Options for commands that act on a single task.
pub struct TaskOptions {
    pub id: String,
    pub globals: Globals,
}

pub struct MissingOptions {
    pub id: String,
    pub reason: Option<String>,
    pub globals: Globals,
}

pub struct EditOptions {
    pub id: String,
    pub text: String,
    pub priority: Option<String>,
    pub globals: Globals,
}

pub struct NoteOptions {
    pub id: String,
    pub text: Option<String>,
    pub globals: Globals,
}

#[derive(Serialize)]
struct TaskDeletedOutput {
    id: String,
}

#[derive(Serialize)]
struct TaskEventData<'a> {
    id: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    part: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    workplace: Option<&'a str>,
    priority: Priority,
}

impl<'a> TaskEventData<'a> {
    fn of(task: &'a Task) -> Self {
        Self {
            id: &task.id,
            status: task.status_label(),
            part: task.part_number(),
            workplace: task.workplace(),
            priority: task.priority,
        }
    }
}

pub fn run_new(options: NewOptions) -> Result<()> {
    let mut ctx = Context::load(&options.globals)?;
    let input = NewTask {
        part_number: options.part,
        workplace: options.workplace,
        quantity: options.quantity,
        unit: QuantityUnit::from_str(&options.unit)?,
        priority: Priority::from_str(&options.priority)?,
    };
    let outcome = ctx.engine.create_task(&ctx.identity, input)?;
    emit_created(&mut ctx, "task new", outcome)
}

pub fn run_adhoc(options: AdHocOptions) -> Result<()> {
    let mut ctx = Context::load(&options.globals)?;
    let priority = Priority::from_str(&options.priority)?;
    let outcome = ctx
        .engine
        .create_ad_hoc_task(&ctx.identity, &options.description, priority)?;
    emit_created(&mut ctx, "task adhoc", outcome)
}

fn emit_created(ctx: &mut Context, command: &str, outcome: CreateOutcome) -> Result<()> {
    let task = match outcome {
        CreateOutcome::Created { task } => task,
        CreateOutcome::Rejected { reason } => {
            tracing::info!(reason = %reason, actor = %ctx.identity.actor, "task creation rejected");
            return Err(Error::BreakActive);
        }
    };

    let warning = ctx.emit(EventKind::TaskCreated, &TaskEventData::of(&task));
    let locale = ctx.config.tasks.locale;
    let view = TaskView::new(&task, locale);

    let mut human = HumanOutput::new("Task created");
    if let Some(warning) = warning {
        human.push_warning(warning);
    }
    human.push_summary("ID", task.id.clone());
    human.push_summary("Text", task.text.clone());
    human.push_summary("Priority", task.priority.to_string());
    if let Some(minutes) = task.standard_time {
        human.push_summary("Standard time", format!("{minutes} min"));
    }
    human.push_next_step(format!("ft task start {}", short_id(&task.id)));

    emit_success(ctx.output(), command, &view, Some(&human))
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let ctx = Context::load(&options.globals)?;
    let mut tasks = ctx.engine.tasks()?;
    if options.open {
        tasks.retain(|t| !t.is_done());
    }
    if let Some(status) = options.status.as_deref() {
        let status = status.trim().to_ascii_lowercase();
        tasks.retain(|t| t.status_label() == status);
    }
    if let Some(limit) = options.limit {
        if limit == 0 {
            return Err(Error::InvalidArgument("limit must be greater than 0".to_string()));
        }
        tasks.truncate(limit);
    }

    let locale = ctx.config.tasks.locale;
    let clock = ctx.engine.clock();
    let mut human = HumanOutput::new("Tasks");
    human.push_summary("Total", tasks.len().to_string());
    for task in &tasks {
        human.push_detail(task_line(task, locale, clock));
    }

    let output = TaskListOutput {
        total: tasks.len(),
        tasks: tasks.iter().map(|t| TaskView::new(t, locale)).collect(),
    };
    emit_success(ctx.output(), "task list", &output, Some(&human))
}

pub fn run_show(options: TaskOptions) -> Result<()> {
    let ctx = Context::load(&options.globals)?;
    let task = ctx.engine.task(&options.id)?;
    let view = TaskView::new(&task, ctx.config.tasks.locale);

    let mut human = HumanOutput::new(format!("Task {}", task.id));
    human.push_summary("Text", task.text.clone());
    human.push_summary("Status", task.status_label());
    human.push_summary("Priority", task.priority.to_string());
    human.push_summary("Part", view.part.clone());
    human.push_summary("Workplace", view.workplace.clone());
    human.push_summary("Quantity", view.quantity.clone());
    if let Some(by) = &task.created_by {
        human.push_summary("Created by", by.clone());
    }
    if let Some(by) = task.in_progress_by() {
        human.push_summary("In progress by", by);
    }
    if let Some(by) = task.completed_by() {
        let at = view.completion_time.clone().unwrap_or_default();
        human.push_summary("Completed by", format!("{by} {at}").trim().to_string());
    }
    if let Some(missing) = &task.missing {
        human.push_summary("Missing", missing.reason.clone());
    }
    if let Some(note) = &task.note {
        human.push_summary("Note", note.clone());
    }
    for interval in &task.inventory_history {
        let end = interval
            .end
            .map(|e| e.to_rfc3339())
            .unwrap_or_else(|| "running".to_string());
        human.push_detail(format!("blocked {} -> {end}", interval.start.to_rfc3339()));
    }

    emit_success(ctx.output(), "task show", &view, Some(&human))
}

pub fn run_start(options: TaskOptions) -> Result<()> {
    let mut ctx = Context::load(&options.globals)?;
    let transition = ctx.engine.set_in_progress(&ctx.identity, &options.id)?;
    emit_transition(&mut ctx, "task start", transition)
}

pub fn run_release(options: TaskOptions) -> Result<()> {
    let mut ctx = Context::load(&options.globals)?;
    let transition = ctx.engine.release_in_progress(&options.id)?;
    emit_transition(&mut ctx, "task release", transition)
}

pub fn run_finish(options: TaskOptions) -> Result<()> {
    let mut ctx = Context::load(&options.globals)?;
    ctx.require(permissions::FINISH)?;
    let transition = ctx.engine.toggle_finished(&ctx.identity, &options.id)?;
    emit_transition(&mut ctx, "task finish", transition)
}

pub fn run_incorrect(options: TaskOptions) -> Result<()> {
    let mut ctx = Context::load(&options.globals)?;
    ctx.require(permissions::INCORRECT)?;
    let transition = ctx.engine.mark_incorrect(&ctx.identity, &options.id)?;
    emit_transition(&mut ctx, "task incorrect", transition)
}

/// Reporting needs `perm_btn_missing`; clearing a report needs `perm_btn_resolve`.
pub fn run_missing(options: MissingOptions) -> Result<()> {
    let mut ctx = Context::load(&options.globals)?;
    let current = ctx.engine.task(&options.id)?;
    if current.is_missing() {
        ctx.require(permissions::RESOLVE)?;
    } else {
        ctx.require(permissions::MISSING)?;
    }
    let transition =
        ctx.engine
            .toggle_missing(&ctx.identity, &current.id, options.reason.as_deref())?;
    emit_transition(&mut ctx, "task missing", transition)
}

pub fn run_block(options: TaskOptions) -> Result<()> {
    let mut ctx = Context::load(&options.globals)?;
    let transition = ctx.engine.toggle_block(&options.id)?;
    emit_transition(&mut ctx, "task block", transition)
}

pub fn run_edit(options: EditOptions) -> Result<()> {
    let mut ctx = Context::load(&options.globals)?;
    ctx.require(permissions::EDIT)?;
    let priority = options
        .priority
        .as_deref()
        .map(Priority::from_str)
        .transpose()?;
    let transition = ctx.engine.edit_task(&options.id, &options.text, priority)?;
    emit_transition(&mut ctx, "task edit", transition)
}

pub fn run_note(options: NoteOptions) -> Result<()> {
    let mut ctx = Context::load(&options.globals)?;
    ctx.require(permissions::NOTE)?;
    let text = options.text.unwrap_or_default();
    let transition = ctx.engine.set_note(&options.id, &text)?;
    emit_transition(&mut ctx, "task note", transition)
}

pub fn run_delete(options: TaskOptions) -> Result<()> {
    let mut ctx = Context::load(&options.globals)?;
    ctx.require(permissions::DELETE)?;
    let task = ctx.engine.delete_task(&options.id)?;
    let warning = ctx.emit(EventKind::TaskDeleted, &TaskEventData::of(&task));

    let mut human = HumanOutput::new("Task deleted");
    if let Some(warning) = warning {
        human.push_warning(warning);
    }
    human.push_summary("ID", task.id.clone());
    human.push_summary("Text", task.text.clone());

    emit_success(
        ctx.output(),
        "task delete",
        &TaskDeletedOutput { id: task.id },
        Some(&human),
    )
}

fn change_header(change: Change) -> &'static str {
    match change {
        Change::Finished => "Task finished",
        Change::Reopened => "Task reopened",
        Change::MarkedIncorrect => "Task marked incorrectly entered",
        Change::Started => "Task started",
        Change::Stopped => "Task stopped",
        Change::Released => "Task released",
        Change::MissingReported => "Missing inventory reported",
        Change::MissingCleared => "Missing report cleared",
        Change::Blocked => "Task blocked for inventory",
        Change::Unblocked => "Task unblocked",
        Change::Edited => "Task edited",
        Change::Noted => "Note updated",
        Change::Unchanged => "Task unchanged",
    }
}

fn emit_transition(ctx: &mut Context, command: &str, transition: Transition) -> Result<()> {
    let Transition { task, change } = transition;
    let warning = EventKind::for_change(change)
        .and_then(|kind| ctx.emit(kind, &TaskEventData::of(&task)));

    let mut human = HumanOutput::new(change_header(change));
    if let Some(warning) = warning {
        human.push_warning(warning);
    }
    human.push_summary("ID", task.id.clone());
    human.push_summary("Status", task.status_label());
    if let Some(missing) = &task.missing {
        human.push_summary("Reason", missing.reason.clone());
    }
    if let Some(note) = &task.note {
        if change == Change::Noted {
            human.push_summary("Note", note.clone());
        }
    }
    if change == Change::Unchanged {
        human.push_warning("task was not in progress; nothing to release");
    }

    let view = TaskView::new(&task, ctx.config.tasks.locale);
    emit_success(ctx.output(), command, &view, Some(&human))
}

/// Print the sorted live list whenever the task collection changes, until
/// Ctrl-C.
pub fn run_watch(globals: Globals) -> Result<()> {
    let ctx = Context::load(&globals)?;
    let locale = ctx.config.tasks.locale;
    let output = ctx.output();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let listener = Arc::new(move |docs: &[Document]| {
        let mut tasks: Vec<Task> = docs.iter().map(task_from_document).collect();
        sort_tasks(&mut tasks);

        if output.json {
            let snapshot = TaskListOutput {
                total: tasks.len(),
                tasks: tasks.iter().map(|t| TaskView::new(t, locale)).collect(),
            };
            match serde_json::to_string(&snapshot) {
                Ok(line) => println!("{line}"),
                Err(err) => tracing::warn!(error = %err, "failed to encode snapshot"),
            }
            return;
        }
        if output.quiet {
            return;
        }
        let mut human = HumanOutput::new(format!("Tasks ({})", tasks.len()));
        for task in &tasks {
            human.push_detail(task_line(task, locale, clock.as_ref()));
        }
        println!("{}\n", format_human(&human));
    });

    let watch = ctx.store.watch(Collection::Tasks, listener)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(tokio::signal::ctrl_c())?;
    watch.stop();
    Ok(())
}
