//! ft part / workplace / reason command implementations.

use serde::Serialize;

use crate::catalog::{Catalog, Entry, PartRequest, RequestOutcome, Workplace};
use crate::cli::context::{read_lines, Context, Globals};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::permissions;

/// Which entry list a command works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Part,
    Reason,
}

impl EntryKind {
    fn noun(self) -> &'static str {
        match self {
            EntryKind::Part => "part",
            EntryKind::Reason => "reason",
        }
    }
}

#[derive(Serialize)]
struct EntryListOutput<T: Serialize> {
    total: usize,
    entries: Vec<T>,
}

#[derive(Serialize)]
struct CountOutput {
    count: usize,
}

#[derive(Serialize)]
struct IdOutput {
    id: String,
}

pub fn run_add(kind: EntryKind, value: String, globals: Globals) -> Result<()> {
    let ctx = Context::load(&globals)?;
    ctx.require(permissions::MANAGE_DB)?;
    let catalog = Catalog::new(ctx.store());
    let id = match kind {
        EntryKind::Part => catalog.add_part(&value)?,
        EntryKind::Reason => catalog.add_missing_reason(&value)?,
    };

    let mut human = HumanOutput::new(format!("Added {}", kind.noun()));
    human.push_summary("ID", id.clone());
    human.push_summary("Value", value.trim().to_string());
    emit_success(
        ctx.output(),
        &format!("{} add", kind.noun()),
        &IdOutput { id },
        Some(&human),
    )
}

pub fn run_rm(kind: EntryKind, id: String, globals: Globals) -> Result<()> {
    let ctx = Context::load(&globals)?;
    ctx.require(permissions::MANAGE_DB)?;
    let catalog = Catalog::new(ctx.store());
    match kind {
        EntryKind::Part => catalog.remove_part(&id)?,
        EntryKind::Reason => catalog.remove_missing_reason(&id)?,
    }

    let mut human = HumanOutput::new(format!("Removed {}", kind.noun()));
    human.push_summary("ID", id.clone());
    emit_success(
        ctx.output(),
        &format!("{} rm", kind.noun()),
        &IdOutput { id },
        Some(&human),
    )
}

pub fn run_list(kind: EntryKind, globals: Globals) -> Result<()> {
    let ctx = Context::load(&globals)?;
    let catalog = Catalog::new(ctx.store());
    let entries: Vec<Entry> = match kind {
        EntryKind::Part => catalog.parts()?,
        EntryKind::Reason => catalog.missing_reasons()?,
    };

    let mut human = HumanOutput::new(match kind {
        EntryKind::Part => "Parts",
        EntryKind::Reason => "Missing reasons",
    });
    human.push_summary("Total", entries.len().to_string());
    for entry in &entries {
        human.push_detail(format!("{} {}", entry.id, entry.value));
    }
    emit_success(
        ctx.output(),
        &format!("{} list", kind.noun()),
        &EntryListOutput {
            total: entries.len(),
            entries,
        },
        Some(&human),
    )
}

pub fn run_part_import(pattern: String, globals: Globals) -> Result<()> {
    let ctx = Context::load(&globals)?;
    ctx.require(permissions::MANAGE_DB)?;
    let lines = read_lines(&pattern)?;
    let count = Catalog::new(ctx.store()).add_parts(lines.iter().map(String::as_str))?;

    let mut human = HumanOutput::new("Parts imported");
    human.push_summary("Added", count.to_string());
    emit_success(ctx.output(), "part import", &CountOutput { count }, Some(&human))
}

pub fn run_part_clear(globals: Globals) -> Result<()> {
    let ctx = Context::load(&globals)?;
    ctx.require(permissions::MANAGE_DB)?;
    let count = Catalog::new(ctx.store()).clear_parts()?;

    let mut human = HumanOutput::new("Parts cleared");
    human.push_summary("Removed", count.to_string());
    emit_success(ctx.output(), "part clear", &CountOutput { count }, Some(&human))
}

/// Outcome enums become policy errors at the command line.
pub(crate) fn request_id(outcome: RequestOutcome, what: &str) -> Result<String> {
    match outcome {
        RequestOutcome::Requested { id } => Ok(id),
        RequestOutcome::AlreadyExists => {
            Err(Error::DuplicateRequest(format!("{what} already exists")))
        }
        RequestOutcome::AlreadyRequested => {
            Err(Error::DuplicateRequest(format!("{what} was already requested")))
        }
    }
}

pub fn run_part_request(part: String, globals: Globals) -> Result<()> {
    let ctx = Context::load(&globals)?;
    let now = ctx.engine.clock().now();
    let outcome = Catalog::new(ctx.store()).request_part(&part, &ctx.identity.actor, now)?;
    let id = request_id(outcome, &format!("part {}", part.trim()))?;

    let mut human = HumanOutput::new("Part requested");
    human.push_summary("ID", id.clone());
    human.push_summary("Part", part.trim().to_string());
    emit_success(ctx.output(), "part request", &IdOutput { id }, Some(&human))
}

pub fn run_part_requests(globals: Globals) -> Result<()> {
    let ctx = Context::load(&globals)?;
    let requests = Catalog::new(ctx.store()).part_requests()?;

    let mut human = HumanOutput::new("Part requests");
    human.push_summary("Total", requests.len().to_string());
    for request in &requests {
        human.push_detail(format!(
            "{} {} (by {})",
            request.id,
            request.part_number,
            request.requested_by.as_deref().unwrap_or("unknown")
        ));
    }
    emit_success(
        ctx.output(),
        "part requests",
        &EntryListOutput {
            total: requests.len(),
            entries: requests,
        },
        Some(&human),
    )
}

pub fn run_part_resolve(id: String, approve: bool, globals: Globals) -> Result<()> {
    let ctx = Context::load(&globals)?;
    ctx.require(permissions::MANAGE_DB)?;
    let catalog = Catalog::new(ctx.store());
    let request: PartRequest = if approve {
        catalog.approve_part_request(&id)?
    } else {
        catalog.reject_part_request(&id)?
    };

    let (header, command) = if approve {
        ("Part request approved", "part approve")
    } else {
        ("Part request rejected", "part reject")
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("Part", request.part_number.clone());
    emit_success(ctx.output(), command, &request, Some(&human))
}

pub fn run_workplace_add(name: String, minutes: Option<u32>, globals: Globals) -> Result<()> {
    let ctx = Context::load(&globals)?;
    ctx.require(permissions::MANAGE_DB)?;
    let id = Catalog::new(ctx.store()).add_workplace(&name, minutes)?;

    let mut human = HumanOutput::new("Added workplace");
    human.push_summary("ID", id.clone());
    human.push_summary("Name", name.trim().to_string());
    human.push_summary("Standard time", format!("{} min", minutes.unwrap_or(0)));
    emit_success(ctx.output(), "workplace add", &IdOutput { id }, Some(&human))
}

pub fn run_workplace_import(pattern: String, globals: Globals) -> Result<()> {
    let ctx = Context::load(&globals)?;
    ctx.require(permissions::MANAGE_DB)?;
    let lines = read_lines(&pattern)?;
    let count = Catalog::new(ctx.store()).add_workplaces(lines.iter().map(String::as_str))?;

    let mut human = HumanOutput::new("Workplaces imported");
    human.push_summary("Added", count.to_string());
    emit_success(ctx.output(), "workplace import", &CountOutput { count }, Some(&human))
}

pub fn run_workplace_rm(id: String, globals: Globals) -> Result<()> {
    let ctx = Context::load(&globals)?;
    ctx.require(permissions::MANAGE_DB)?;
    Catalog::new(ctx.store()).remove_workplace(&id)?;

    let mut human = HumanOutput::new("Removed workplace");
    human.push_summary("ID", id.clone());
    emit_success(ctx.output(), "workplace rm", &IdOutput { id }, Some(&human))
}

pub fn run_workplace_clear(globals: Globals) -> Result<()> {
    let ctx = Context::load(&globals)?;
    ctx.require(permissions::MANAGE_DB)?;
    let count = Catalog::new(ctx.store()).clear_workplaces()?;

    let mut human = HumanOutput::new("Workplaces cleared");
    human.push_summary("Removed", count.to_string());
    emit_success(ctx.output(), "workplace clear", &CountOutput { count }, Some(&human))
}

pub fn run_workplace_list(globals: Globals) -> Result<()> {
    let ctx = Context::load(&globals)?;
    let workplaces: Vec<Workplace> = Catalog::new(ctx.store()).workplaces()?;

    let mut human = HumanOutput::new("Workplaces");
    human.push_summary("Total", workplaces.len().to_string());
    for wp in &workplaces {
        human.push_detail(format!("{} {} ({} min)", wp.id, wp.value, wp.standard_time));
    }
    emit_success(
        ctx.output(),
        "workplace list",
        &EntryListOutput {
            total: workplaces.len(),
            entries: workplaces,
        },
        Some(&human),
    )
}
