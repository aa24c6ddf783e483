//! Session identity: who is acting, and in which role.
//!
//! Actor resolution order:
//! 1) CLI --actor (explicit)
//! 2) FT_ACTOR environment variable
//! 3) Persisted session value in .floor/actor
//! 4) Config default (actor.default)
//!
//! Role resolution follows the same order with --role, FT_ROLE,
//! .floor/role and actor.default_role.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::permissions::normalize_role;

pub const STATE_DIR: &str = ".floor";
const ACTOR_FILENAME: &str = "actor";
const ROLE_FILENAME: &str = "role";

/// The acting user for one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub actor: String,
    pub role: String,
}

impl Identity {
    pub fn new(actor: impl Into<String>, role: &str) -> Self {
        Self {
            actor: actor.into(),
            role: normalize_role(role),
        }
    }
}

/// Resolve actor and role from flags, environment, session files and config.
pub fn resolve_identity(
    root: &Path,
    config: &Config,
    cli_actor: Option<&str>,
    cli_role: Option<&str>,
) -> Result<Identity> {
    let actor = resolve_value(root, cli_actor, "FT_ACTOR", ACTOR_FILENAME)?
        .unwrap_or_else(|| config.actor.default.clone());
    let role = resolve_value(root, cli_role, "FT_ROLE", ROLE_FILENAME)?
        .unwrap_or_else(|| config.actor.default_role.clone());
    Ok(Identity::new(actor, &role))
}

fn resolve_value(
    root: &Path,
    cli: Option<&str>,
    env_key: &str,
    filename: &str,
) -> Result<Option<String>> {
    if let Some(value) = non_empty(cli) {
        return Ok(Some(value.to_string()));
    }

    if let Ok(env_value) = std::env::var(env_key) {
        if let Some(value) = non_empty(Some(env_value.as_str())) {
            return Ok(Some(value.to_string()));
        }
    }

    load_persisted(root, filename)
}

/// Persist the session actor (and optionally role) under `.floor/`.
pub fn persist_identity(root: &Path, actor: &str, role: Option<&str>) -> Result<()> {
    let actor = non_empty(Some(actor))
        .ok_or_else(|| Error::InvalidArgument("actor name cannot be empty".to_string()))?;

    std::fs::create_dir_all(root.join(STATE_DIR))?;
    std::fs::write(state_path(root, ACTOR_FILENAME), format!("{actor}\n"))?;

    if let Some(role) = role {
        let role = non_empty(Some(role))
            .ok_or_else(|| Error::InvalidArgument("role cannot be empty".to_string()))?;
        std::fs::write(
            state_path(root, ROLE_FILENAME),
            format!("{}\n", normalize_role(role)),
        )?;
    }
    Ok(())
}

/// Forget the persisted session.
pub fn clear_identity(root: &Path) -> Result<()> {
    for name in [ACTOR_FILENAME, ROLE_FILENAME] {
        let path = state_path(root, name);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
    }
    Ok(())
}

fn load_persisted(root: &Path, filename: &str) -> Result<Option<String>> {
    let path = state_path(root, filename);
    if !path.exists() {
        return Ok(None);
    }

    let raw = std::fs::read_to_string(path)?;
    Ok(non_empty(Some(raw.as_str())).map(str::to_string))
}

fn state_path(root: &Path, filename: &str) -> PathBuf {
    root.join(STATE_DIR).join(filename)
}

fn non_empty(input: Option<&str>) -> Option<&str> {
    input.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn cli_beats_persisted_beats_config() {
        let temp = TempDir::new().unwrap();
        let config = Config::default();

        // FT_ACTOR/FT_ROLE are left alone here; the CLI tests cover env.
        let from_config = resolve_identity(temp.path(), &config, None, None).unwrap();
        if std::env::var("FT_ACTOR").is_err() {
            assert_eq!(from_config.actor, "unknown");
        }
        if std::env::var("FT_ROLE").is_err() {
            assert_eq!(from_config.role, "USER");
        }

        persist_identity(temp.path(), "jana", Some("leader")).unwrap();
        let persisted = resolve_identity(temp.path(), &config, None, None).unwrap();
        if std::env::var("FT_ACTOR").is_err() {
            assert_eq!(persisted.actor, "jana");
        }
        if std::env::var("FT_ROLE").is_err() {
            assert_eq!(persisted.role, "LEADER");
        }

        let explicit =
            resolve_identity(temp.path(), &config, Some(" eva "), Some("admin")).unwrap();
        assert_eq!(explicit, Identity::new("eva", "ADMIN"));

        clear_identity(temp.path()).unwrap();
        assert!(load_persisted(temp.path(), ACTOR_FILENAME).unwrap().is_none());
    }

    #[test]
    fn empty_actor_is_rejected() {
        let temp = TempDir::new().unwrap();
        assert!(persist_identity(temp.path(), "   ", None).is_err());
    }
}
