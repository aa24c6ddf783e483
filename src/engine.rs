//! Task engine: applies lifecycle transitions to stored tasks.
//!
//! The engine holds no task state of its own. Each operation reads the
//! current document, runs a pure transition from [`crate::task::lifecycle`]
//! and writes back only the fields that transition owns.

use std::sync::Arc;

use crate::actor::Identity;
use crate::breaks::BreakScheduler;
use crate::catalog::Catalog;
use crate::clock::Clock;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::permissions::{self, PermissionTable};
use crate::store::{Collection, DocumentStore};
use crate::task::display::legacy_text;
use crate::task::lifecycle::{self, Change, Moment, Transition};
use crate::task::order::sort_tasks;
use crate::task::record::{content_patch, lifecycle_patch, task_fields, task_from_document};
use crate::task::{resolve_task_id, Priority, QuantityUnit, Task, TaskKind, TaskState};

/// Input for a new part-movement task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub part_number: String,
    pub workplace: String,
    /// Quantity as entered; must be a positive integer.
    pub quantity: String,
    pub unit: QuantityUnit,
    pub priority: Priority,
}

/// Result of a creation attempt.
#[derive(Debug, Clone)]
pub enum CreateOutcome {
    Created { task: Box<Task> },
    Rejected { reason: String },
}

pub const BREAK_REJECTION: &str = "break in progress";

#[derive(Clone)]
pub struct TaskEngine {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    config: Config,
}

impl TaskEngine {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, config: Config) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn break_scheduler(&self) -> BreakScheduler {
        BreakScheduler::new(
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            self.config.breaks.duplicate_guard_secs,
        )
    }

    pub fn permissions(&self) -> Result<PermissionTable> {
        PermissionTable::load(self.store.as_ref())
    }

    fn moment(&self) -> Moment {
        Moment {
            at: self.clock.now(),
            local: self.clock.local_now(),
        }
    }

    /// Live tasks in display order.
    pub fn tasks(&self) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .store
            .list(Collection::Tasks)?
            .iter()
            .map(task_from_document)
            .collect();
        sort_tasks(&mut tasks);
        Ok(tasks)
    }

    pub fn archived_tasks(&self) -> Result<Vec<Task>> {
        Ok(self
            .store
            .list(Collection::ArchivedTasks)?
            .iter()
            .map(task_from_document)
            .collect())
    }

    /// Look a task up by id or unique id prefix.
    pub fn task(&self, id: &str) -> Result<Task> {
        let docs = self.store.list(Collection::Tasks)?;
        let resolved = resolve_task_id(docs.iter().map(|d| d.id.as_str()), id)?;
        docs.iter()
            .find(|d| d.id == resolved)
            .map(task_from_document)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))
    }

    /// Whether task creation is currently blocked for this identity.
    ///
    /// Either the persisted break flag or the window schedule counts.
    /// Holders of `perm_manage_breaks` are never blocked.
    pub fn creation_blocked(&self, identity: &Identity) -> Result<bool> {
        if self
            .permissions()?
            .allows(&identity.role, permissions::MANAGE_BREAKS)
        {
            return Ok(false);
        }
        Ok(self.break_scheduler().status()?.is_break())
    }

    pub fn create_task(&self, identity: &Identity, input: NewTask) -> Result<CreateOutcome> {
        if self.creation_blocked(identity)? {
            tracing::info!(actor = %identity.actor, "task creation rejected during break");
            return Ok(CreateOutcome::Rejected {
                reason: BREAK_REJECTION.to_string(),
            });
        }

        let catalog = Catalog::new(self.store.as_ref());

        let part_number = input.part_number.trim();
        if part_number.is_empty() {
            return Err(Error::InvalidArgument("part number cannot be empty".to_string()));
        }
        let part_number = if self.config.tasks.require_known_part {
            catalog
                .find_part(part_number)?
                .map(|p| p.value)
                .ok_or_else(|| {
                    Error::InvalidArgument(format!(
                        "unknown part '{part_number}' (ask for it with `ft part request`)"
                    ))
                })?
        } else {
            part_number.to_string()
        };

        let workplace = catalog.find_workplace(&input.workplace)?.ok_or_else(|| {
            Error::InvalidArgument(format!("unknown workplace '{}'", input.workplace.trim()))
        })?;

        let quantity = parse_quantity(&input.quantity)?;
        let moment = self.moment();

        let task = Task {
            id: String::new(),
            text: legacy_text(
                moment.local,
                &part_number,
                &workplace.value,
                quantity,
                input.unit,
                self.config.tasks.locale,
            ),
            kind: TaskKind::Movement {
                part_number: Some(part_number),
                workplace: Some(workplace.value),
                quantity: Some(quantity),
                unit: input.unit,
            },
            standard_time: Some(workplace.standard_time),
            priority: input.priority,
            note: None,
            created_at: Some(moment.at),
            created_by: Some(identity.actor.clone()),
            started_at: None,
            missing: None,
            inventory_history: Vec::new(),
            state: TaskState::default(),
            archived_at: None,
        };
        self.insert(task)
    }

    /// Free-text task without part, workplace or quantity.
    pub fn create_ad_hoc_task(
        &self,
        identity: &Identity,
        description: &str,
        priority: Priority,
    ) -> Result<CreateOutcome> {
        if self.creation_blocked(identity)? {
            return Ok(CreateOutcome::Rejected {
                reason: BREAK_REJECTION.to_string(),
            });
        }
        let description = description.trim();
        if description.is_empty() {
            return Err(Error::InvalidArgument(
                "task description cannot be empty".to_string(),
            ));
        }

        let moment = self.moment();
        let task = Task {
            id: String::new(),
            text: description.to_string(),
            kind: TaskKind::AdHoc,
            standard_time: None,
            priority,
            note: None,
            created_at: Some(moment.at),
            created_by: Some(identity.actor.clone()),
            started_at: None,
            missing: None,
            inventory_history: Vec::new(),
            state: TaskState::default(),
            archived_at: None,
        };
        self.insert(task)
    }

    fn insert(&self, mut task: Task) -> Result<CreateOutcome> {
        task.id = self.store.insert(Collection::Tasks, task_fields(&task)?)?;
        tracing::info!(task = %task.id, priority = %task.priority, "task created");
        Ok(CreateOutcome::Created {
            task: Box::new(task),
        })
    }

    fn apply<F>(&self, id: &str, transition: F) -> Result<Transition>
    where
        F: FnOnce(&Task, Moment) -> Result<Transition>,
    {
        let current = self.task(id)?;
        let result = transition(&current, self.moment())?;
        let patch = match result.change {
            Change::Unchanged => return Ok(result),
            Change::Edited | Change::Noted => content_patch(&result.task)?,
            _ => lifecycle_patch(&result.task)?,
        };
        self.store.update(Collection::Tasks, &current.id, patch)?;
        tracing::info!(task = %current.id, change = ?result.change, "task updated");
        Ok(result)
    }

    /// Finish an open task or reopen a completed one.
    ///
    /// Roles in `tasks.claim_required_roles` may only finish a task they
    /// hold in progress themselves.
    pub fn toggle_finished(&self, identity: &Identity, id: &str) -> Result<Transition> {
        let claim_required = self
            .config
            .tasks
            .claim_required_roles
            .iter()
            .any(|r| permissions::normalize_role(r) == identity.role);

        self.apply(id, |task, moment| {
            if claim_required
                && !task.is_done()
                && task.in_progress_by() != Some(identity.actor.as_str())
            {
                return Err(Error::NotClaimed {
                    task_id: task.id.clone(),
                    actor: identity.actor.clone(),
                });
            }
            lifecycle::toggle_finished(task, &identity.actor, moment)
        })
    }

    pub fn mark_incorrect(&self, identity: &Identity, id: &str) -> Result<Transition> {
        self.apply(id, |task, moment| {
            lifecycle::mark_incorrect(task, &identity.actor, moment)
        })
    }

    pub fn set_in_progress(&self, identity: &Identity, id: &str) -> Result<Transition> {
        self.apply(id, |task, moment| {
            lifecycle::set_in_progress(task, &identity.actor, moment)
        })
    }

    pub fn release_in_progress(&self, id: &str) -> Result<Transition> {
        self.apply(id, |task, _| Ok(lifecycle::release_in_progress(task)))
    }

    pub fn toggle_missing(
        &self,
        identity: &Identity,
        id: &str,
        reason: Option<&str>,
    ) -> Result<Transition> {
        let default_reason = self.config.tasks.default_missing_reason.as_str();
        self.apply(id, |task, moment| {
            Ok(lifecycle::toggle_missing(
                task,
                &identity.actor,
                reason,
                default_reason,
                moment,
            ))
        })
    }

    pub fn toggle_block(&self, id: &str) -> Result<Transition> {
        self.apply(id, |task, moment| lifecycle::toggle_block(task, moment))
    }

    pub fn edit_task(
        &self,
        id: &str,
        text: &str,
        priority: Option<Priority>,
    ) -> Result<Transition> {
        self.apply(id, |task, _| lifecycle::edit(task, text, priority))
    }

    pub fn set_note(&self, id: &str, text: &str) -> Result<Transition> {
        let max_len = self.config.tasks.note_max_len;
        self.apply(id, |task, _| lifecycle::set_note(task, text, max_len))
    }

    pub fn delete_task(&self, id: &str) -> Result<Task> {
        let task = self.task(id)?;
        self.store.delete(Collection::Tasks, &task.id)?;
        tracing::info!(task = %task.id, "task deleted");
        Ok(task)
    }
}

fn parse_quantity(raw: &str) -> Result<u32> {
    match raw.trim().parse::<u32>() {
        Ok(quantity) if quantity > 0 => Ok(quantity),
        _ => Err(Error::InvalidArgument(format!(
            "quantity must be a positive whole number, got '{}'",
            raw.trim()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;

    fn engine() -> (TaskEngine, Arc<ManualClock>) {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::at_local("2024-03-04 07:05:09").unwrap());
        let catalog = Catalog::new(store.as_ref());
        catalog.add_part("A-100").unwrap();
        catalog.add_workplace("Line 3", Some(12)).unwrap();
        (
            TaskEngine::new(store, clock.clone(), Config::default()),
            clock,
        )
    }

    fn new_task(quantity: &str) -> NewTask {
        NewTask {
            part_number: "a-100".to_string(),
            workplace: "Line 3".to_string(),
            quantity: quantity.to_string(),
            unit: QuantityUnit::Boxes,
            priority: Priority::Urgent,
        }
    }

    fn created(outcome: CreateOutcome) -> Task {
        match outcome {
            CreateOutcome::Created { task } => *task,
            CreateOutcome::Rejected { reason } => panic!("unexpected rejection: {reason}"),
        }
    }

    #[test]
    fn create_snapshots_workplace_and_formats_text() {
        let (engine, _) = engine();
        let user = Identity::new("jana", "USER");
        let task = created(engine.create_task(&user, new_task("3")).unwrap());

        assert_eq!(task.text, "04/03/24 07:05:09 / A-100 / Line 3 / Počet: 3 boxy");
        assert_eq!(task.standard_time, Some(12));
        assert_eq!(task.part_number(), Some("A-100"));
        assert_eq!(task.created_by.as_deref(), Some("jana"));

        let stored = engine.task(&task.id[..10]).unwrap();
        assert_eq!(stored, task);
    }

    #[test]
    fn create_validates_inputs() {
        let (engine, _) = engine();
        let user = Identity::new("jana", "USER");
        assert!(engine.create_task(&user, new_task("0")).is_err());
        assert!(engine.create_task(&user, new_task("2.5")).is_err());

        let mut unknown = new_task("1");
        unknown.part_number = "Z-1".to_string();
        assert!(matches!(
            engine.create_task(&user, unknown),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn break_blocks_users_but_not_break_managers() {
        let (engine, _) = engine();
        engine
            .break_scheduler()
            .add_window(None, "07:00", "07:30")
            .unwrap();

        let user = Identity::new("jana", "USER");
        let outcome = engine.create_task(&user, new_task("1")).unwrap();
        assert!(matches!(outcome, CreateOutcome::Rejected { .. }));
        assert!(matches!(
            engine.create_ad_hoc_task(&user, "sweep", Priority::Low).unwrap(),
            CreateOutcome::Rejected { .. }
        ));

        let leader = Identity::new("boss", "LEADER");
        created(engine.create_task(&leader, new_task("1")).unwrap());
    }

    #[test]
    fn users_must_claim_before_finishing() {
        let (engine, _) = engine();
        let user = Identity::new("jana", "USER");
        let task = created(engine.create_task(&user, new_task("1")).unwrap());

        assert!(matches!(
            engine.toggle_finished(&user, &task.id),
            Err(Error::NotClaimed { .. })
        ));

        let other = Identity::new("ivan", "USER");
        engine.set_in_progress(&other, &task.id).unwrap();
        assert!(engine.toggle_finished(&user, &task.id).is_err());

        let finished = engine.toggle_finished(&other, &task.id).unwrap();
        assert_eq!(finished.change, Change::Finished);

        let supervisor = Identity::new("eva", "SUPERVISOR");
        let reopened = engine.toggle_finished(&supervisor, &task.id).unwrap();
        assert_eq!(reopened.change, Change::Reopened);
    }

    #[test]
    fn patches_leave_descriptive_fields_alone() {
        let (engine, clock) = engine();
        let lead = Identity::new("boss", "LEADER");
        let task = created(engine.create_task(&lead, new_task("2")).unwrap());

        engine.toggle_block(&task.id).unwrap();
        clock.advance(chrono::Duration::minutes(5));
        engine.toggle_missing(&lead, &task.id, None).unwrap();

        let stored = engine.task(&task.id).unwrap();
        assert!(stored.is_done());
        assert_eq!(stored.missing.as_ref().unwrap().reason, "Other");
        assert_eq!(stored.inventory_history.len(), 1);
        assert!(stored.inventory_history[0].end.is_some());
        assert_eq!(stored.text, task.text);
        assert_eq!(stored.kind, task.kind);
    }

    #[test]
    fn ad_hoc_tasks_order_with_their_priority() {
        let (engine, clock) = engine();
        let lead = Identity::new("boss", "LEADER");
        created(engine.create_task(&lead, new_task("1")).unwrap());
        clock.advance(chrono::Duration::seconds(1));
        let mut low = new_task("1");
        low.priority = Priority::Low;
        created(engine.create_task(&lead, low).unwrap());
        clock.advance(chrono::Duration::seconds(1));
        let adhoc = created(
            engine
                .create_ad_hoc_task(&lead, "clean aisle 4", Priority::Normal)
                .unwrap(),
        );

        let order: Vec<Priority> = engine.tasks().unwrap().iter().map(|t| t.priority).collect();
        assert_eq!(order, [Priority::Urgent, Priority::Normal, Priority::Low]);
        assert!(engine.task(&adhoc.id).unwrap().is_ad_hoc());
    }
}
