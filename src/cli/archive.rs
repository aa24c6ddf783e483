//! ft archive and ft stats command implementations.

use chrono::NaiveDate;
use serde::Serialize;

use crate::analytics::{self, Period, Report};
use crate::archive::Archiver;
use crate::cli::context::{Context, Globals};
use crate::cli::view::{task_line, TaskListOutput, TaskView};
use crate::error::{Error, Result};
use crate::events::EventKind;
use crate::output::{emit_success, HumanOutput};
use crate::permissions;
use crate::task::display::format_duration;

pub struct ListOptions {
    pub limit: Option<usize>,
    pub globals: Globals,
}

pub struct StatsOptions {
    pub period: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub include_archive: bool,
    pub globals: Globals,
}

#[derive(Serialize)]
struct ArchivedEventData {
    moved: usize,
    batches: usize,
}

pub fn run_archive(globals: Globals) -> Result<()> {
    let mut ctx = Context::load(&globals)?;
    ctx.require(permissions::ARCHIVE)?;
    let now = ctx.engine.clock().now();
    let report = Archiver::new(ctx.store(), &ctx.config.archive).run(now)?;

    let mut human = HumanOutput::new(report.message.clone());
    human.push_summary("Moved", report.moved.to_string());
    human.push_summary("Batches", report.batches.to_string());
    if report.moved > 0 {
        let data = ArchivedEventData {
            moved: report.moved,
            batches: report.batches,
        };
        if let Some(warning) = ctx.emit(EventKind::TasksArchived, &data) {
            human.push_warning(warning);
        }
    }
    emit_success(ctx.output(), "archive run", &report, Some(&human))
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let ctx = Context::load(&options.globals)?;
    let mut tasks = ctx.engine.archived_tasks()?;
    if let Some(limit) = options.limit {
        tasks.truncate(limit);
    }

    let locale = ctx.config.tasks.locale;
    let mut human = HumanOutput::new("Archived tasks");
    human.push_summary("Total", tasks.len().to_string());
    for task in &tasks {
        human.push_detail(task_line(task, locale, ctx.engine.clock()));
    }
    let output = TaskListOutput {
        total: tasks.len(),
        tasks: tasks.iter().map(|t| TaskView::new(t, locale)).collect(),
    };
    emit_success(ctx.output(), "archive list", &output, Some(&human))
}

fn parse_date(label: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|err| {
        Error::InvalidArgument(format!("invalid {label} date '{raw}' (expected YYYY-MM-DD): {err}"))
    })
}

fn parse_period(options: &StatsOptions) -> Result<Period> {
    match (&options.from, &options.to) {
        (Some(from), to) => {
            let from = parse_date("from", from)?;
            let to = to.as_deref().map(|t| parse_date("to", t)).transpose()?;
            if to.is_some_and(|to| to < from) {
                return Err(Error::InvalidArgument(
                    "--to must not be before --from".to_string(),
                ));
            }
            Ok(Period::Custom { from, to })
        }
        (None, Some(_)) => Err(Error::InvalidArgument(
            "--to requires --from".to_string(),
        )),
        (None, None) if options.period.trim().eq_ignore_ascii_case("custom") => Err(
            Error::InvalidArgument("custom period requires --from".to_string()),
        ),
        (None, None) => options.period.parse(),
    }
}

pub fn run_stats(options: StatsOptions) -> Result<()> {
    let ctx = Context::load(&options.globals)?;
    ctx.require(permissions::TAB_ANALYTICS)?;
    let period = parse_period(&options)?;

    let mut tasks = ctx.engine.tasks()?;
    if options.include_archive {
        tasks.extend(ctx.engine.archived_tasks()?);
    }
    let breaks = ctx.engine.break_scheduler().breaks()?;
    let report = analytics::report(&tasks, &breaks, period, ctx.engine.clock());

    let human = stats_human(&report);
    emit_success(ctx.output(), "stats", &report, Some(&human))
}

fn ms(value: i64) -> String {
    format_duration(chrono::Duration::milliseconds(value))
}

fn stats_human(report: &Report) -> HumanOutput {
    let mut human = HumanOutput::new(format!("Statistics ({})", report.period));
    human.push_summary("Total", report.total.to_string());
    human.push_summary("Done", report.done.to_string());
    human.push_summary("Missing", report.missing.to_string());
    human.push_summary("Urgent done", report.urgent_done.to_string());
    human.push_summary("Incorrectly entered", report.incorrectly_entered.to_string());
    human.push_summary("Efficiency", format!("{}%", report.efficiency));
    human.push_summary("Avg reaction", ms(report.avg_reaction_ms));
    human.push_summary("Avg lead", ms(report.avg_lead_ms));
    human.push_summary("Execution", ms(report.total_execution_ms));

    for part in &report.top_parts {
        human.push_detail(format!("part {} x{}", part.name, part.count));
    }
    for wp in &report.top_workplaces {
        human.push_detail(format!("workplace {} x{}", wp.name, wp.count));
    }
    for worker in &report.workers {
        human.push_detail(format!(
            "worker {}: {} done, execution {}, standard {} min, reaction {}, lead {}",
            worker.name,
            worker.count,
            ms(worker.total_execution_ms),
            worker.total_standard_minutes,
            ms(worker.avg_reaction_ms),
            ms(worker.avg_lead_ms),
        ));
    }
    human
}
