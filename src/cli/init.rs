//! ft init command implementation
//!
//! Creates `.floor.toml`, the `.floor/` state directory and an empty store.

use std::path::{Path, PathBuf};

use crate::actor::STATE_DIR;
use crate::cli::context::Globals;
use crate::config::{Config, CONFIG_FILE};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::store::FileStore;

#[derive(serde::Serialize)]
struct InitReport {
    root: PathBuf,
    store: PathBuf,
    created: InitCreated,
}

#[derive(serde::Serialize)]
struct InitCreated {
    config: bool,
    state_dir: bool,
    store: bool,
}

pub fn run(globals: Globals) -> Result<()> {
    let root = match globals.root.clone() {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    std::fs::create_dir_all(&root)?;

    let created_state_dir = ensure_dir(&root.join(STATE_DIR))?;
    let created_config = ensure_config(&root)?;

    let config = Config::load_from_root(&root)?;
    let store_path = config.store_path(&root);
    if let Some(parent) = store_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let created_store = FileStore::open(&store_path, config.store.lock_timeout_ms).init()?;

    let report = InitReport {
        root: root.clone(),
        store: store_path.clone(),
        created: InitCreated {
            config: created_config,
            state_dir: created_state_dir,
            store: created_store,
        },
    };

    let mut created_items = Vec::new();
    if created_config {
        created_items.push(CONFIG_FILE.to_string());
    }
    if created_state_dir {
        created_items.push(format!("{STATE_DIR}/"));
    }
    if created_store {
        created_items.push(store_path.display().to_string());
    }

    let header = if created_items.is_empty() {
        "ft init: nothing to do".to_string()
    } else {
        "ft init: initialized workspace".to_string()
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("root", root.display().to_string());
    human.push_summary(
        "created",
        if created_items.is_empty() {
            "none".to_string()
        } else {
            created_items.join(", ")
        },
    );
    human.push_next_step("ft actor set <name> --role <role>");
    human.push_next_step("ft workplace add <name> --minutes <n>");
    human.push_next_step("ft part add <part>");

    emit_success(globals.output(), "init", &report, Some(&human))
}

fn ensure_dir(path: &Path) -> Result<bool> {
    if path.is_dir() {
        return Ok(false);
    }
    std::fs::create_dir_all(path)?;
    Ok(true)
}

fn ensure_config(root: &Path) -> Result<bool> {
    let path = root.join(CONFIG_FILE);
    if path.exists() {
        return Ok(false);
    }
    Config::default().save(&path)?;
    Ok(true)
}
