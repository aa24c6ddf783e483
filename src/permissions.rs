//! Roles and the permission grant table.
//!
//! Grants live in the `permissions` collection as `{roleName, permissionName}`
//! pairs. `ADMIN` holds everything regardless of grants. Until the first
//! explicit grant is written, a built-in default table applies.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{Error, Result};
use crate::store::{self, Collection, DocumentStore, WriteOp};

pub const ADMIN: &str = "ADMIN";

/// Roles that always exist and cannot be deleted.
pub const SYSTEM_ROLES: &[&str] = &[ADMIN, "SUPERVISOR", "LEADER", "LOGISTICIAN", "USER"];

pub const TAB_ENTRY: &str = "perm_tab_entry";
pub const TAB_TASKS: &str = "perm_tab_tasks";
pub const TAB_BOM: &str = "perm_tab_bom";
pub const TAB_MISSING: &str = "perm_tab_missing";
pub const TAB_ANALYTICS: &str = "perm_tab_analytics";
pub const TAB_SETTINGS: &str = "perm_tab_settings";
pub const TAB_PERMISSIONS: &str = "perm_tab_permissions";

pub const FINISH: &str = "perm_btn_finish";
pub const EDIT: &str = "perm_btn_edit";
pub const DELETE: &str = "perm_btn_delete";
pub const RESOLVE: &str = "perm_btn_resolve";
pub const MISSING: &str = "perm_btn_missing";
pub const COPY: &str = "perm_btn_copy";
pub const NOTE: &str = "perm_btn_note";
pub const INCORRECT: &str = "perm_btn_incorrect";

pub const MANAGE_USERS: &str = "perm_manage_users";
pub const DELETE_USERS: &str = "perm_delete_users";
pub const MANAGE_DB: &str = "perm_manage_db";
pub const MANAGE_BOM: &str = "perm_manage_bom";
pub const ARCHIVE: &str = "perm_archive";
pub const MANAGE_BREAKS: &str = "perm_manage_breaks";
pub const MANAGE_ROLES: &str = "perm_manage_roles";

pub const ALL_PERMISSIONS: &[&str] = &[
    TAB_ENTRY,
    TAB_TASKS,
    TAB_BOM,
    TAB_MISSING,
    TAB_ANALYTICS,
    TAB_SETTINGS,
    TAB_PERMISSIONS,
    FINISH,
    EDIT,
    DELETE,
    RESOLVE,
    MISSING,
    COPY,
    NOTE,
    INCORRECT,
    MANAGE_USERS,
    DELETE_USERS,
    MANAGE_DB,
    MANAGE_BOM,
    ARCHIVE,
    MANAGE_BREAKS,
    MANAGE_ROLES,
];

const USER_DEFAULTS: &[&str] = &[TAB_ENTRY, TAB_TASKS, TAB_MISSING, FINISH, MISSING, COPY, NOTE];
const LOGISTICIAN_EXTRA: &[&str] = &[TAB_BOM, RESOLVE];
const LEADER_EXTRA: &[&str] = &[TAB_ANALYTICS, EDIT, INCORRECT, MANAGE_BREAKS];
const SUPERVISOR_EXTRA: &[&str] = &[TAB_SETTINGS, DELETE, MANAGE_DB, MANAGE_BOM, ARCHIVE];

fn default_grants() -> BTreeMap<String, BTreeSet<String>> {
    let tiers: [(&str, &[&[&str]]); 4] = [
        ("USER", &[USER_DEFAULTS]),
        ("LOGISTICIAN", &[USER_DEFAULTS, LOGISTICIAN_EXTRA]),
        ("LEADER", &[USER_DEFAULTS, LOGISTICIAN_EXTRA, LEADER_EXTRA]),
        (
            "SUPERVISOR",
            &[USER_DEFAULTS, LOGISTICIAN_EXTRA, LEADER_EXTRA, SUPERVISOR_EXTRA],
        ),
    ];
    tiers
        .iter()
        .map(|(role, groups)| {
            let perms = groups
                .iter()
                .flat_map(|g| g.iter())
                .map(|p| p.to_string())
                .collect();
            (role.to_string(), perms)
        })
        .collect()
}

pub fn normalize_role(role: &str) -> String {
    role.trim().to_uppercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub name: String,
    pub is_system: bool,
    pub permissions: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GrantDoc {
    role_name: String,
    permission_name: String,
}

#[derive(Deserialize)]
struct RoleDoc {
    name: String,
}

/// Effective grants, loaded from the store.
#[derive(Debug, Clone)]
pub struct PermissionTable {
    grants: BTreeMap<String, BTreeSet<String>>,
    defaults: bool,
}

impl PermissionTable {
    pub fn defaults() -> Self {
        Self {
            grants: default_grants(),
            defaults: true,
        }
    }

    pub fn load(store: &dyn DocumentStore) -> Result<Self> {
        let docs = store.list(Collection::Permissions)?;
        if docs.is_empty() {
            return Ok(Self::defaults());
        }
        let mut grants: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for doc in docs {
            if let Ok(grant) = doc.decode::<GrantDoc>() {
                grants
                    .entry(normalize_role(&grant.role_name))
                    .or_default()
                    .insert(grant.permission_name);
            }
        }
        Ok(Self {
            grants,
            defaults: false,
        })
    }

    /// True while no explicit grant has been stored.
    pub fn is_default(&self) -> bool {
        self.defaults
    }

    pub fn allows(&self, role: &str, permission: &str) -> bool {
        let role = normalize_role(role);
        role == ADMIN
            || self
                .grants
                .get(&role)
                .is_some_and(|perms| perms.contains(permission))
    }

    pub fn require(&self, role: &str, permission: &str) -> Result<()> {
        if self.allows(role, permission) {
            Ok(())
        } else {
            Err(Error::PermissionDenied {
                role: normalize_role(role),
                permission: permission.to_string(),
            })
        }
    }

    pub fn granted(&self, role: &str) -> Vec<String> {
        let role = normalize_role(role);
        if role == ADMIN {
            return ALL_PERMISSIONS.iter().map(|p| p.to_string()).collect();
        }
        self.grants
            .get(&role)
            .map(|perms| perms.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// Role administration over a document store.
pub struct Roles<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> Roles<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// System roles first, then custom roles alphabetically.
    pub fn list(&self) -> Result<Vec<Role>> {
        let table = PermissionTable::load(self.store)?;
        let mut custom: Vec<String> = self
            .store
            .list(Collection::Roles)?
            .iter()
            .filter_map(|doc| doc.decode::<RoleDoc>().ok())
            .map(|r| normalize_role(&r.name))
            .filter(|name| !SYSTEM_ROLES.contains(&name.as_str()))
            .collect();
        custom.sort();
        custom.dedup();

        let system = SYSTEM_ROLES.iter().map(|name| (name.to_string(), true));
        Ok(system
            .chain(custom.into_iter().map(|name| (name, false)))
            .map(|(name, is_system)| Role {
                permissions: table.granted(&name),
                name,
                is_system,
            })
            .collect())
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        let name = normalize_role(name);
        Ok(self.list()?.iter().any(|r| r.name == name))
    }

    pub fn add(&self, name: &str) -> Result<String> {
        let name = normalize_role(name);
        if name.is_empty() {
            return Err(Error::InvalidArgument("role name cannot be empty".to_string()));
        }
        if self.exists(&name)? {
            return Err(Error::InvalidArgument(format!("role '{name}' already exists")));
        }
        self.store.insert(
            Collection::Roles,
            store::fields([("name", json!(name)), ("isSystem", json!(false))]),
        )?;
        Ok(name)
    }

    /// Delete a custom role together with its grants.
    pub fn remove(&self, name: &str) -> Result<()> {
        let name = normalize_role(name);
        if SYSTEM_ROLES.contains(&name.as_str()) {
            return Err(Error::InvalidArgument(format!(
                "system role '{name}' cannot be deleted"
            )));
        }

        let mut ops: Vec<WriteOp> = self
            .store
            .list(Collection::Roles)?
            .into_iter()
            .filter(|doc| {
                doc.decode::<RoleDoc>()
                    .is_ok_and(|r| normalize_role(&r.name) == name)
            })
            .map(|doc| WriteOp::Delete {
                collection: Collection::Roles,
                id: doc.id,
            })
            .collect();
        if ops.is_empty() {
            return Err(Error::InvalidArgument(format!("unknown role '{name}'")));
        }
        ops.extend(self.grant_ops_for(&name, None)?);
        self.store.batch(ops)?;
        Ok(())
    }

    pub fn grant(&self, role: &str, permission: &str) -> Result<bool> {
        let role = self.checked_role(role)?;
        let permission = checked_permission(permission)?;
        self.materialize_defaults()?;

        let table = PermissionTable::load(self.store)?;
        if table.allows(&role, permission) {
            return Ok(false);
        }
        self.store.insert(
            Collection::Permissions,
            store::fields([
                ("roleName", json!(role)),
                ("permissionName", json!(permission)),
            ]),
        )?;
        Ok(true)
    }

    pub fn revoke(&self, role: &str, permission: &str) -> Result<bool> {
        let role = self.checked_role(role)?;
        let permission = checked_permission(permission)?;
        if role == ADMIN {
            return Err(Error::InvalidArgument(
                "ADMIN always holds every permission".to_string(),
            ));
        }
        self.materialize_defaults()?;

        let ops = self.grant_ops_for(&role, Some(permission))?;
        if ops.is_empty() {
            return Ok(false);
        }
        self.store.batch(ops)?;
        Ok(true)
    }

    fn checked_role(&self, role: &str) -> Result<String> {
        let role = normalize_role(role);
        if !self.exists(&role)? {
            return Err(Error::InvalidArgument(format!("unknown role '{role}'")));
        }
        Ok(role)
    }

    /// Delete ops for the grants of `role` (optionally one permission).
    fn grant_ops_for(&self, role: &str, permission: Option<&str>) -> Result<Vec<WriteOp>> {
        Ok(self
            .store
            .list(Collection::Permissions)?
            .into_iter()
            .filter(|doc| {
                doc.decode::<GrantDoc>().is_ok_and(|g| {
                    normalize_role(&g.role_name) == role
                        && permission.map_or(true, |p| g.permission_name == p)
                })
            })
            .map(|doc| WriteOp::Delete {
                collection: Collection::Permissions,
                id: doc.id,
            })
            .collect())
    }

    /// Copy the default table into the store so edits start from it.
    fn materialize_defaults(&self) -> Result<()> {
        if !self.store.list(Collection::Permissions)?.is_empty() {
            return Ok(());
        }
        let ops: Vec<WriteOp> = default_grants()
            .into_iter()
            .flat_map(|(role, perms)| {
                perms.into_iter().map(move |perm| WriteOp::Insert {
                    collection: Collection::Permissions,
                    id: None,
                    data: store::fields([
                        ("roleName", json!(role.clone())),
                        ("permissionName", json!(perm)),
                    ]),
                })
            })
            .collect();
        tracing::debug!(grants = ops.len(), "materializing default permission table");
        self.store.batch(ops)?;
        Ok(())
    }
}

fn checked_permission(permission: &str) -> Result<&'static str> {
    let permission = permission.trim();
    ALL_PERMISSIONS
        .iter()
        .copied()
        .find(|p| *p == permission)
        .ok_or_else(|| Error::InvalidArgument(format!("unknown permission '{permission}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn admin_holds_everything() {
        let table = PermissionTable::defaults();
        for perm in ALL_PERMISSIONS {
            assert!(table.allows("admin", perm));
        }
    }

    #[test]
    fn default_table_tiers() {
        let table = PermissionTable::defaults();
        assert!(table.allows("USER", FINISH));
        assert!(!table.allows("USER", DELETE));
        assert!(!table.allows("USER", MANAGE_BREAKS));
        assert!(table.allows("LEADER", MANAGE_BREAKS));
        assert!(table.allows("SUPERVISOR", ARCHIVE));
        assert!(!table.allows("STRANGER", FINISH));
        assert!(matches!(
            table.require("USER", ARCHIVE),
            Err(Error::PermissionDenied { .. })
        ));
    }

    #[test]
    fn first_grant_keeps_defaults() {
        let store = MemoryStore::new();
        let roles = Roles::new(&store);
        assert!(roles.grant("USER", DELETE).unwrap());
        let table = PermissionTable::load(&store).unwrap();
        assert!(!table.is_default());
        assert!(table.allows("USER", DELETE));
        assert!(table.allows("USER", FINISH));
        assert!(!roles.grant("USER", DELETE).unwrap());
    }

    #[test]
    fn revoke_and_unknown_names() {
        let store = MemoryStore::new();
        let roles = Roles::new(&store);
        assert!(roles.revoke("USER", FINISH).unwrap());
        assert!(!PermissionTable::load(&store).unwrap().allows("USER", FINISH));
        assert!(roles.revoke("USER", "perm_fly").is_err());
        assert!(roles.grant("NOBODY", FINISH).is_err());
        assert!(roles.revoke("ADMIN", FINISH).is_err());
    }

    #[test]
    fn custom_roles_can_be_removed_but_system_roles_cannot() {
        let store = MemoryStore::new();
        let roles = Roles::new(&store);
        assert_eq!(roles.add("forklift").unwrap(), "FORKLIFT");
        roles.grant("FORKLIFT", FINISH).unwrap();
        let listed = roles.list().unwrap();
        assert_eq!(listed.last().unwrap().name, "FORKLIFT");
        assert!(!listed.last().unwrap().is_system);

        roles.remove("forklift").unwrap();
        assert!(!roles.exists("FORKLIFT").unwrap());
        assert!(!PermissionTable::load(&store).unwrap().allows("FORKLIFT", FINISH));
        assert!(roles.remove("USER").is_err());
    }
}
