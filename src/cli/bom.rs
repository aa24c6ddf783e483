//! ft bom command implementations.

use std::str::FromStr;

use serde::Serialize;

use crate::bom::{Bom, BomItem, BomLine, BomRequest};
use crate::cli::catalog::request_id;
use crate::cli::context::{read_lines, Context, Globals};
use crate::engine::{CreateOutcome, NewTask};
use crate::error::{Error, Result};
use crate::events::EventKind;
use crate::output::{emit_success, HumanOutput};
use crate::permissions;
use crate::task::{Priority, QuantityUnit};

pub struct AddOptions {
    pub parent: String,
    pub child: String,
    pub quantity: f64,
    pub globals: Globals,
}

pub struct ExpandOptions {
    pub parent: String,
    pub quantity: f64,
    pub create: bool,
    pub workplace: Option<String>,
    pub priority: String,
    pub globals: Globals,
}

#[derive(Serialize)]
struct ItemListOutput {
    total: usize,
    items: Vec<BomItem>,
}

#[derive(Serialize)]
struct ExpandOutput {
    parent: String,
    quantity: f64,
    lines: Vec<BomLine>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    created: Vec<String>,
}

#[derive(Serialize)]
struct RequestListOutput {
    total: usize,
    requests: Vec<BomRequest>,
}

#[derive(Serialize)]
struct CreatedEventData<'a> {
    id: &'a str,
    part: &'a str,
    workplace: &'a str,
    parent: &'a str,
}

pub fn run_add(options: AddOptions) -> Result<()> {
    let ctx = Context::load(&options.globals)?;
    ctx.require(permissions::MANAGE_BOM)?;
    let id = Bom::new(ctx.store()).add(&options.parent, &options.child, options.quantity)?;

    let mut human = HumanOutput::new("BOM item added");
    human.push_summary("ID", id.clone());
    human.push_summary(
        "Edge",
        format!(
            "{} -> {} x{}",
            options.parent.trim(),
            options.child.trim(),
            options.quantity
        ),
    );
    emit_success(
        ctx.output(),
        "bom add",
        &serde_json::json!({ "id": id }),
        Some(&human),
    )
}

pub fn run_import(pattern: String, globals: Globals) -> Result<()> {
    let ctx = Context::load(&globals)?;
    ctx.require(permissions::MANAGE_BOM)?;
    let lines = read_lines(&pattern)?;
    let count = Bom::new(ctx.store()).import(lines.iter().map(String::as_str))?;

    let mut human = HumanOutput::new("BOM imported");
    human.push_summary("Added", count.to_string());
    emit_success(
        ctx.output(),
        "bom import",
        &serde_json::json!({ "count": count }),
        Some(&human),
    )
}

pub fn run_rm(id: String, globals: Globals) -> Result<()> {
    let ctx = Context::load(&globals)?;
    ctx.require(permissions::MANAGE_BOM)?;
    Bom::new(ctx.store()).remove(&id)?;

    let mut human = HumanOutput::new("BOM item removed");
    human.push_summary("ID", id.clone());
    emit_success(
        ctx.output(),
        "bom rm",
        &serde_json::json!({ "id": id }),
        Some(&human),
    )
}

pub fn run_list(parent: Option<String>, globals: Globals) -> Result<()> {
    let ctx = Context::load(&globals)?;
    let items = Bom::new(ctx.store()).items(parent.as_deref())?;

    let mut human = HumanOutput::new("BOM items");
    human.push_summary("Total", items.len().to_string());
    for item in &items {
        human.push_detail(format!(
            "{} {} -> {} x{}",
            item.id, item.parent_part, item.child_part, item.quantity
        ));
    }
    emit_success(
        ctx.output(),
        "bom list",
        &ItemListOutput {
            total: items.len(),
            items,
        },
        Some(&human),
    )
}

/// Child quantities for a task are whole pieces, rounded up.
fn whole_pieces(quantity: f64) -> String {
    (quantity.ceil() as u64).max(1).to_string()
}

pub fn run_expand(options: ExpandOptions) -> Result<()> {
    let mut ctx = Context::load(&options.globals)?;
    let lines = Bom::new(ctx.store()).expand(&options.parent, options.quantity)?;

    let mut created = Vec::new();
    let mut warnings = Vec::new();
    if options.create {
        let workplace = options.workplace.clone().ok_or_else(|| {
            Error::InvalidArgument("--create requires --workplace".to_string())
        })?;
        let priority = Priority::from_str(&options.priority)?;
        for line in &lines {
            let input = NewTask {
                part_number: line.child_part.clone(),
                workplace: workplace.clone(),
                quantity: whole_pieces(line.quantity),
                unit: QuantityUnit::Pieces,
                priority,
            };
            let task = match ctx.engine.create_task(&ctx.identity, input)? {
                CreateOutcome::Created { task } => task,
                CreateOutcome::Rejected { .. } => return Err(Error::BreakActive),
            };
            let data = CreatedEventData {
                id: &task.id,
                part: &line.child_part,
                workplace: &workplace,
                parent: options.parent.trim(),
            };
            if let Some(warning) = ctx.emit(EventKind::TaskCreated, &data) {
                warnings.push(warning);
            }
            created.push(task.id.clone());
        }
    }

    let mut human = HumanOutput::new(format!(
        "BOM for {} x{}",
        options.parent.trim(),
        options.quantity
    ));
    human.push_summary("Children", lines.len().to_string());
    if options.create {
        human.push_summary("Tasks created", created.len().to_string());
    }
    for line in &lines {
        human.push_detail(format!("{} x{}", line.child_part, line.quantity));
    }
    for warning in warnings {
        human.push_warning(warning);
    }
    if lines.is_empty() {
        human.push_next_step(format!("ft bom request {}", options.parent.trim()));
    }

    let output = ExpandOutput {
        parent: options.parent.trim().to_string(),
        quantity: options.quantity,
        lines,
        created,
    };
    emit_success(ctx.output(), "bom expand", &output, Some(&human))
}

pub fn run_request(parent: String, globals: Globals) -> Result<()> {
    let ctx = Context::load(&globals)?;
    let now = ctx.engine.clock().now();
    let outcome = Bom::new(ctx.store()).request(&parent, &ctx.identity.actor, now)?;
    let id = request_id(outcome, &format!("BOM for {}", parent.trim()))?;

    let mut human = HumanOutput::new("BOM requested");
    human.push_summary("ID", id.clone());
    human.push_summary("Parent", parent.trim().to_string());
    emit_success(
        ctx.output(),
        "bom request",
        &serde_json::json!({ "id": id }),
        Some(&human),
    )
}

pub fn run_requests(globals: Globals) -> Result<()> {
    let ctx = Context::load(&globals)?;
    let requests = Bom::new(ctx.store()).requests()?;

    let mut human = HumanOutput::new("BOM requests");
    human.push_summary("Total", requests.len().to_string());
    for request in &requests {
        human.push_detail(format!(
            "{} {} (by {})",
            request.id,
            request.parent_part,
            request.requested_by.as_deref().unwrap_or("unknown")
        ));
    }
    emit_success(
        ctx.output(),
        "bom requests",
        &RequestListOutput {
            total: requests.len(),
            requests,
        },
        Some(&human),
    )
}

pub fn run_resolve(id: String, approve: bool, globals: Globals) -> Result<()> {
    let ctx = Context::load(&globals)?;
    ctx.require(permissions::MANAGE_BOM)?;
    let request = Bom::new(ctx.store()).resolve_request(&id)?;

    let (header, command) = if approve {
        ("BOM request approved", "bom approve")
    } else {
        ("BOM request rejected", "bom reject")
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("Parent", request.parent_part.clone());
    if approve {
        human.push_next_step(format!(
            "ft bom add {} <child> <qty>",
            request.parent_part
        ));
    }
    emit_success(ctx.output(), command, &request, Some(&human))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_quantities_round_up() {
        assert_eq!(whole_pieces(1.5), "2");
        assert_eq!(whole_pieces(3.0), "3");
        assert_eq!(whole_pieces(0.2), "1");
    }
}
