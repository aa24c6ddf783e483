//! ft actor command implementation
//!
//! Session identity helpers (set/show/clear).

use crate::actor::{self, Identity};
use crate::cli::context::{discover_root, Globals};
use crate::config::Config;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};

pub struct SetOptions {
    pub name: String,
    pub role: Option<String>,
    pub globals: Globals,
}

#[derive(serde::Serialize)]
struct ActorReport {
    #[serde(flatten)]
    identity: Identity,
    is_default: bool,
}

pub fn run_set(options: SetOptions) -> Result<()> {
    let root = discover_root(options.globals.root.as_deref())?;
    actor::persist_identity(&root, &options.name, options.role.as_deref())?;

    let config = Config::load_from_root(&root)?;
    let identity = actor::resolve_identity(
        &root,
        &config,
        Some(&options.name),
        options.role.as_deref(),
    )?;

    let mut human = HumanOutput::new(format!("ft actor set: {}", identity.actor));
    human.push_summary("actor", identity.actor.clone());
    human.push_summary("role", identity.role.clone());
    human.push_next_step("ft task list");

    emit_success(
        options.globals.output(),
        "actor set",
        &ActorReport {
            identity,
            is_default: false,
        },
        Some(&human),
    )
}

pub fn run_show(globals: Globals) -> Result<()> {
    let root = discover_root(globals.root.as_deref())?;
    let config = Config::load_from_root(&root)?;
    let identity = actor::resolve_identity(
        &root,
        &config,
        globals.actor.as_deref(),
        globals.role.as_deref(),
    )?;
    let is_default = identity.actor == config.actor.default;

    let header = if is_default {
        "ft actor: not set".to_string()
    } else {
        format!("ft actor: {}", identity.actor)
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("actor", identity.actor.clone());
    human.push_summary("role", identity.role.clone());
    if is_default {
        human.push_warning("actor not set; using default");
        human.push_next_step("ft actor set <name>");
    }

    emit_success(
        globals.output(),
        "actor show",
        &ActorReport {
            identity,
            is_default,
        },
        Some(&human),
    )
}

pub fn run_clear(globals: Globals) -> Result<()> {
    let root = discover_root(globals.root.as_deref())?;
    actor::clear_identity(&root)?;

    let human = HumanOutput::new("ft actor: session cleared");
    emit_success(
        globals.output(),
        "actor clear",
        &serde_json::json!({ "cleared": true }),
        Some(&human),
    )
}
