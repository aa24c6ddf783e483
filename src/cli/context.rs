//! Shared command context: workspace discovery, store, identity, events.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::actor::{self, Identity, STATE_DIR};
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, CONFIG_FILE};
use crate::engine::TaskEngine;
use crate::error::{Error, Result};
use crate::events::{Event, EventDestination, EventKind, EventSink};
use crate::output::OutputOptions;
use crate::store::{DocumentStore, FileStore};

/// Flags every command accepts.
#[derive(Debug, Clone, Default)]
pub struct Globals {
    pub root: Option<PathBuf>,
    pub actor: Option<String>,
    pub role: Option<String>,
    pub json: bool,
    pub quiet: bool,
    pub events: Option<String>,
}

impl Globals {
    /// Output options for commands that run without a workspace.
    pub fn output(&self) -> OutputOptions {
        OutputOptions {
            json: self.json,
            quiet: self.quiet,
        }
    }
}

pub struct Context {
    pub root: PathBuf,
    pub config: Config,
    pub store: FileStore,
    pub engine: TaskEngine,
    pub identity: Identity,
    events: Option<EventSink>,
    events_to_stdout: bool,
    json: bool,
    quiet: bool,
}

impl Context {
    pub fn load(globals: &Globals) -> Result<Self> {
        let root = discover_root(globals.root.as_deref())?;
        let config = Config::load_from_root(&root)?;
        let identity = actor::resolve_identity(
            &root,
            &config,
            globals.actor.as_deref(),
            globals.role.as_deref(),
        )?;

        let store = FileStore::open(config.store_path(&root), config.store.lock_timeout_ms);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let engine = TaskEngine::new(Arc::new(store.clone()), clock, config.clone());

        let destination = EventDestination::parse(globals.events.as_deref());
        let events = destination.as_ref().map(|dest| dest.open()).transpose()?;
        let events_to_stdout = matches!(destination, Some(EventDestination::Stdout));

        tracing::debug!(root = %root.display(), actor = %identity.actor, role = %identity.role, "context loaded");

        Ok(Self {
            root,
            config,
            store,
            engine,
            identity,
            events,
            events_to_stdout,
            json: globals.json,
            quiet: globals.quiet,
        })
    }

    /// Events on stdout take over the stream, so the envelope is silenced.
    pub fn output(&self) -> OutputOptions {
        OutputOptions {
            json: self.json && !self.events_to_stdout,
            quiet: self.quiet || self.events_to_stdout,
        }
    }

    pub fn store(&self) -> &dyn DocumentStore {
        &self.store
    }

    /// Fail unless the acting role holds `permission`.
    pub fn require(&self, permission: &str) -> Result<()> {
        self.engine
            .permissions()?
            .require(&self.identity.role, permission)
    }

    /// Emit one event when `--events` is set. Returns a warning on failure;
    /// the mutation itself has already been committed.
    pub fn emit<T: Serialize>(&mut self, kind: EventKind, data: &T) -> Option<String> {
        let sink = self.events.as_mut()?;
        let event = match Event::new(kind, Some(self.identity.actor.clone())).with_data(data) {
            Ok(event) => event,
            Err(err) => return Some(format!("event output failed: {err}")),
        };
        if let Err(err) = sink.emit(&event) {
            return Some(format!("event output failed: {err}"));
        }
        None
    }
}

/// The explicit root, or the nearest ancestor of the current directory
/// that holds `.floor/` or `.floor.toml`.
pub fn discover_root(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(root) = explicit {
        if is_workspace(root) {
            return Ok(root.to_path_buf());
        }
        return Err(Error::NotInitialized(root.to_path_buf()));
    }

    let cwd = std::env::current_dir()?;
    cwd.ancestors()
        .find(|dir| is_workspace(dir))
        .map(Path::to_path_buf)
        .ok_or(Error::NotInitialized(cwd))
}

fn is_workspace(dir: &Path) -> bool {
    dir.join(STATE_DIR).is_dir() || dir.join(CONFIG_FILE).is_file()
}

/// Read import lines from stdin (`-`) or every file matching a glob.
pub fn read_lines(pattern: &str) -> Result<Vec<String>> {
    if pattern.trim() == "-" {
        let mut raw = String::new();
        std::io::stdin().read_to_string(&mut raw)?;
        return Ok(raw.lines().map(str::to_string).collect());
    }

    let paths = glob::glob(pattern)
        .map_err(|err| Error::InvalidArgument(format!("invalid pattern '{pattern}': {err}")))?;
    let mut lines = Vec::new();
    let mut matched = 0;
    for entry in paths {
        let path = entry.map_err(|err| Error::Io(err.into()))?;
        if !path.is_file() {
            continue;
        }
        matched += 1;
        let raw = std::fs::read_to_string(&path)?;
        lines.extend(raw.lines().map(str::to_string));
    }
    if matched == 0 {
        return Err(Error::InvalidArgument(format!(
            "no files match '{pattern}'"
        )));
    }
    Ok(lines)
}
