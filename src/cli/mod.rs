//! Command-line interface for ft
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group is implemented in its own submodule.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;

mod actor;
mod archive;
mod bom;
mod breaks;
mod catalog;
pub mod context;
mod init;
mod role;
mod task;
mod view;

use catalog::EntryKind;
use context::Globals;

/// ft - factory-floor task tracking
///
/// Part-movement requests between the warehouse and workplaces, with break
/// windows, archiving, analytics and bills of materials.
#[derive(Parser, Debug)]
#[command(name = "ft")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Workspace root (defaults to the nearest directory holding .floor/)
    #[arg(long, global = true, env = "FT_ROOT")]
    pub root: Option<PathBuf>,

    /// Acting user
    #[arg(long, global = true)]
    pub actor: Option<String>,

    /// Acting role (ADMIN, SUPERVISOR, LEADER, LOGISTICIAN, USER or custom)
    #[arg(long, global = true)]
    pub role: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit JSONL events to a file or '-' for stdout
    #[arg(long, global = true)]
    pub events: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create .floor.toml, .floor/ and an empty store
    Init,

    /// Session identity
    #[command(subcommand)]
    Actor(ActorCommands),

    /// Task requests and their lifecycle
    #[command(subcommand)]
    Task(TaskCommands),

    /// Break windows and the break scheduler
    #[command(subcommand)]
    Break(BreakCommands),

    /// Move old closed tasks to the archive
    #[command(subcommand)]
    Archive(ArchiveCommands),

    /// Performance statistics
    Stats {
        /// all, today, yesterday, week or month
        #[arg(long, default_value = "all")]
        period: String,

        /// Custom period start (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Custom period end, inclusive (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Include archived tasks
        #[arg(long)]
        include_archive: bool,
    },

    /// Part catalog and part requests
    #[command(subcommand)]
    Part(PartCommands),

    /// Workplaces and their standard times
    #[command(subcommand)]
    Workplace(WorkplaceCommands),

    /// Missing-inventory reasons
    #[command(subcommand)]
    Reason(ReasonCommands),

    /// Bills of materials
    #[command(subcommand)]
    Bom(BomCommands),

    /// Roles and permission grants
    #[command(subcommand)]
    Role(RoleCommands),
}

#[derive(Subcommand, Debug)]
pub enum ActorCommands {
    /// Persist the session actor (and optionally role)
    Set {
        name: String,

        /// Role to persist alongside the actor
        #[arg(long = "as", value_name = "ROLE")]
        as_role: Option<String>,
    },
    /// Show the resolved actor and role
    Show,
    /// Forget the persisted session
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Request a part movement to a workplace
    New {
        part: String,
        workplace: String,
        /// Positive whole number
        quantity: String,

        /// pieces, boxes or pallet
        #[arg(long, default_value = "pieces")]
        unit: String,

        /// low, normal or urgent
        #[arg(long, default_value = "normal")]
        priority: String,
    },
    /// Free-text task without part or workplace
    Adhoc {
        description: String,

        #[arg(long, default_value = "normal")]
        priority: String,
    },
    /// List tasks in display order
    List {
        /// Only open tasks
        #[arg(long)]
        open: bool,

        /// open, in_progress, blocked, missing, completed or incorrectly_entered
        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show one task
    Show { id: String },
    /// Take a task in progress, or stop working on it
    Start { id: String },
    /// Stop working on a task without finishing it
    Release { id: String },
    /// Finish an open task, or reopen a completed one
    Finish { id: String },
    /// Close a task as incorrectly entered
    Incorrect { id: String },
    /// Report missing inventory (closes the task), or clear the report
    Missing {
        id: String,

        #[arg(long)]
        reason: Option<String>,
    },
    /// Block for an inventory count, or unblock
    Block { id: String },
    /// Rewrite the task text and optionally its priority
    Edit {
        id: String,
        text: String,

        #[arg(long)]
        priority: Option<String>,
    },
    /// Set the note; omit the text to clear it
    Note { id: String, text: Option<String> },
    /// Delete a task
    Delete { id: String },
    /// Print the live task list on every change until Ctrl-C
    Watch,
}

#[derive(Subcommand, Debug)]
pub enum BreakCommands {
    /// Configured daily break windows
    #[command(subcommand)]
    Window(WindowCommands),
    /// Persisted and window-derived break state
    Status,
    /// Run one scheduler evaluation
    Tick,
    /// Poll the scheduler until Ctrl-C
    Run {
        /// Seconds between ticks (defaults to breaks.poll_interval_secs)
        #[arg(long)]
        interval: Option<u64>,
    },
    /// End the active break now
    End,
}

#[derive(Subcommand, Debug)]
pub enum WindowCommands {
    /// Add a window, e.g. `ft break window add 09:00 09:15 --name Desiata`
    Add {
        start: String,
        end: String,

        #[arg(long)]
        name: Option<String>,
    },
    List,
    Rm { id: String },
}

#[derive(Subcommand, Debug)]
pub enum ArchiveCommands {
    /// Archive closed tasks past the retention window
    Run,
    /// List archived tasks
    List {
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand, Debug)]
pub enum PartCommands {
    Add { value: String },
    /// Import one part per line from files matching a glob, or '-' for stdin
    Import { pattern: String },
    Rm { id: String },
    /// Delete every part
    Clear,
    List,
    /// Ask for a part to be added to the catalog
    Request { part: String },
    /// Pending part requests
    Requests,
    Approve { id: String },
    Reject { id: String },
}

#[derive(Subcommand, Debug)]
pub enum WorkplaceCommands {
    Add {
        name: String,

        /// Standard time in minutes
        #[arg(long)]
        minutes: Option<u32>,
    },
    /// Import `Name;Minutes` lines from files matching a glob, or '-'
    Import { pattern: String },
    Rm { id: String },
    /// Delete every workplace
    Clear,
    List,
}

#[derive(Subcommand, Debug)]
pub enum ReasonCommands {
    Add { value: String },
    Rm { id: String },
    List,
}

#[derive(Subcommand, Debug)]
pub enum BomCommands {
    Add {
        parent: String,
        child: String,
        quantity: f64,
    },
    /// Import `PARENT;CHILD;QTY` lines from files matching a glob, or '-'
    Import { pattern: String },
    Rm { id: String },
    List {
        #[arg(long)]
        parent: Option<String>,
    },
    /// Child quantities for `quantity` of a parent (one level)
    Expand {
        parent: String,

        #[arg(default_value_t = 1.0)]
        quantity: f64,

        /// Create one task per child part
        #[arg(long, requires = "workplace")]
        create: bool,

        #[arg(long)]
        workplace: Option<String>,

        #[arg(long, default_value = "normal")]
        priority: String,
    },
    /// Ask for a BOM to be defined for a parent part
    Request { parent: String },
    Requests,
    Approve { id: String },
    Reject { id: String },
}

#[derive(Subcommand, Debug)]
pub enum RoleCommands {
    Add { name: String },
    Rm { name: String },
    Grant {
        #[arg(value_name = "ROLE")]
        role_name: String,
        permission: String,
    },
    Revoke {
        #[arg(value_name = "ROLE")]
        role_name: String,
        permission: String,
    },
    List,
}

impl Cli {
    fn globals(&self) -> Globals {
        Globals {
            root: self.root.clone(),
            actor: self.actor.clone(),
            role: self.role.clone(),
            json: self.json,
            quiet: self.quiet,
            events: self.events.clone(),
        }
    }

    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let globals = self.globals();
        match self.command {
            Commands::Init => init::run(globals),
            Commands::Actor(cmd) => match cmd {
                ActorCommands::Set { name, as_role } => actor::run_set(actor::SetOptions {
                    name,
                    role: as_role,
                    globals,
                }),
                ActorCommands::Show => actor::run_show(globals),
                ActorCommands::Clear => actor::run_clear(globals),
            },
            Commands::Task(cmd) => run_task(cmd, globals),
            Commands::Break(cmd) => match cmd {
                BreakCommands::Window(cmd) => match cmd {
                    WindowCommands::Add { start, end, name } => {
                        breaks::run_window_add(breaks::WindowAddOptions {
                            start,
                            end,
                            name,
                            globals,
                        })
                    }
                    WindowCommands::List => breaks::run_window_list(globals),
                    WindowCommands::Rm { id } => breaks::run_window_rm(id, globals),
                },
                BreakCommands::Status => breaks::run_status(globals),
                BreakCommands::Tick => breaks::run_tick(globals),
                BreakCommands::Run { interval } => breaks::run_loop(breaks::RunOptions {
                    interval_secs: interval,
                    globals,
                }),
                BreakCommands::End => breaks::run_end(globals),
            },
            Commands::Archive(cmd) => match cmd {
                ArchiveCommands::Run => archive::run_archive(globals),
                ArchiveCommands::List { limit } => {
                    archive::run_list(archive::ListOptions { limit, globals })
                }
            },
            Commands::Stats {
                period,
                from,
                to,
                include_archive,
            } => archive::run_stats(archive::StatsOptions {
                period,
                from,
                to,
                include_archive,
                globals,
            }),
            Commands::Part(cmd) => match cmd {
                PartCommands::Add { value } => catalog::run_add(EntryKind::Part, value, globals),
                PartCommands::Import { pattern } => catalog::run_part_import(pattern, globals),
                PartCommands::Rm { id } => catalog::run_rm(EntryKind::Part, id, globals),
                PartCommands::Clear => catalog::run_part_clear(globals),
                PartCommands::List => catalog::run_list(EntryKind::Part, globals),
                PartCommands::Request { part } => catalog::run_part_request(part, globals),
                PartCommands::Requests => catalog::run_part_requests(globals),
                PartCommands::Approve { id } => catalog::run_part_resolve(id, true, globals),
                PartCommands::Reject { id } => catalog::run_part_resolve(id, false, globals),
            },
            Commands::Workplace(cmd) => match cmd {
                WorkplaceCommands::Add { name, minutes } => {
                    catalog::run_workplace_add(name, minutes, globals)
                }
                WorkplaceCommands::Import { pattern } => {
                    catalog::run_workplace_import(pattern, globals)
                }
                WorkplaceCommands::Rm { id } => catalog::run_workplace_rm(id, globals),
                WorkplaceCommands::Clear => catalog::run_workplace_clear(globals),
                WorkplaceCommands::List => catalog::run_workplace_list(globals),
            },
            Commands::Reason(cmd) => match cmd {
                ReasonCommands::Add { value } => {
                    catalog::run_add(EntryKind::Reason, value, globals)
                }
                ReasonCommands::Rm { id } => catalog::run_rm(EntryKind::Reason, id, globals),
                ReasonCommands::List => catalog::run_list(EntryKind::Reason, globals),
            },
            Commands::Bom(cmd) => match cmd {
                BomCommands::Add {
                    parent,
                    child,
                    quantity,
                } => bom::run_add(bom::AddOptions {
                    parent,
                    child,
                    quantity,
                    globals,
                }),
                BomCommands::Import { pattern } => bom::run_import(pattern, globals),
                BomCommands::Rm { id } => bom::run_rm(id, globals),
                BomCommands::List { parent } => bom::run_list(parent, globals),
                BomCommands::Expand {
                    parent,
                    quantity,
                    create,
                    workplace,
                    priority,
                } => bom::run_expand(bom::ExpandOptions {
                    parent,
                    quantity,
                    create,
                    workplace,
                    priority,
                    globals,
                }),
                BomCommands::Request { parent } => bom::run_request(parent, globals),
                BomCommands::Requests => bom::run_requests(globals),
                BomCommands::Approve { id } => bom::run_resolve(id, true, globals),
                BomCommands::Reject { id } => bom::run_resolve(id, false, globals),
            },
            Commands::Role(cmd) => match cmd {
                RoleCommands::Add { name } => role::run_add(name, globals),
                RoleCommands::Rm { name } => role::run_rm(name, globals),
                RoleCommands::Grant {
                    role_name,
                    permission,
                } => role::run_grant(role_name, permission, true, globals),
                RoleCommands::Revoke {
                    role_name,
                    permission,
                } => role::run_grant(role_name, permission, false, globals),
                RoleCommands::List => role::run_list(globals),
            },
        }
    }
}

fn run_task(cmd: TaskCommands, globals: Globals) -> Result<()> {
    use task::TaskOptions;

    match cmd {
        TaskCommands::New {
            part,
            workplace,
            quantity,
            unit,
            priority,
        } => task::run_new(task::NewOptions {
            part,
            workplace,
            quantity,
            unit,
            priority,
            globals,
        }),
        TaskCommands::Adhoc {
            description,
            priority,
        } => task::run_adhoc(task::AdHocOptions {
            description,
            priority,
            globals,
        }),
        TaskCommands::List {
            open,
            status,
            limit,
        } => task::run_list(task::ListOptions {
            open,
            status,
            limit,
            globals,
        }),
        TaskCommands::Show { id } => task::run_show(TaskOptions { id, globals }),
        TaskCommands::Start { id } => task::run_start(TaskOptions { id, globals }),
        TaskCommands::Release { id } => task::run_release(TaskOptions { id, globals }),
        TaskCommands::Finish { id } => task::run_finish(TaskOptions { id, globals }),
        TaskCommands::Incorrect { id } => task::run_incorrect(TaskOptions { id, globals }),
        TaskCommands::Missing { id, reason } => task::run_missing(task::MissingOptions {
            id,
            reason,
            globals,
        }),
        TaskCommands::Block { id } => task::run_block(TaskOptions { id, globals }),
        TaskCommands::Edit { id, text, priority } => task::run_edit(task::EditOptions {
            id,
            text,
            priority,
            globals,
        }),
        TaskCommands::Note { id, text } => task::run_note(task::NoteOptions {
            id,
            text,
            globals,
        }),
        TaskCommands::Delete { id } => task::run_delete(TaskOptions { id, globals }),
        TaskCommands::Watch => task::run_watch(globals),
    }
}
