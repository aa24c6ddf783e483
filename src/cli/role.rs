//! ft role command implementations.

use serde::Serialize;

use crate::cli::context::{Context, Globals};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::permissions::{self, Role, Roles};

#[derive(Serialize)]
struct RoleListOutput {
    total: usize,
    /// True while no explicit grant has been written.
    defaults: bool,
    roles: Vec<Role>,
}

#[derive(Serialize)]
struct GrantOutput {
    role: String,
    permission: String,
    changed: bool,
}

pub fn run_add(name: String, globals: Globals) -> Result<()> {
    let ctx = Context::load(&globals)?;
    ctx.require(permissions::MANAGE_ROLES)?;
    let name = Roles::new(ctx.store()).add(&name)?;

    let mut human = HumanOutput::new("Role added");
    human.push_summary("Role", name.clone());
    human.push_next_step(format!("ft role grant {name} <permission>"));
    emit_success(
        ctx.output(),
        "role add",
        &serde_json::json!({ "role": name }),
        Some(&human),
    )
}

pub fn run_rm(name: String, globals: Globals) -> Result<()> {
    let ctx = Context::load(&globals)?;
    ctx.require(permissions::MANAGE_ROLES)?;
    Roles::new(ctx.store()).remove(&name)?;
    let name = permissions::normalize_role(&name);

    let mut human = HumanOutput::new("Role removed");
    human.push_summary("Role", name.clone());
    emit_success(
        ctx.output(),
        "role rm",
        &serde_json::json!({ "role": name }),
        Some(&human),
    )
}

pub fn run_grant(role: String, permission: String, grant: bool, globals: Globals) -> Result<()> {
    let ctx = Context::load(&globals)?;
    ctx.require(permissions::MANAGE_ROLES)?;
    let roles = Roles::new(ctx.store());
    let changed = if grant {
        roles.grant(&role, &permission)?
    } else {
        roles.revoke(&role, &permission)?
    };

    let role = permissions::normalize_role(&role);
    let permission = permission.trim().to_string();
    let (header, command) = match (grant, changed) {
        (true, true) => ("Permission granted", "role grant"),
        (true, false) => ("Permission already granted", "role grant"),
        (false, true) => ("Permission revoked", "role revoke"),
        (false, false) => ("Permission was not granted", "role revoke"),
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("Role", role.clone());
    human.push_summary("Permission", permission.clone());
    emit_success(
        ctx.output(),
        command,
        &GrantOutput {
            role,
            permission,
            changed,
        },
        Some(&human),
    )
}

pub fn run_list(globals: Globals) -> Result<()> {
    let ctx = Context::load(&globals)?;
    let roles = Roles::new(ctx.store()).list()?;
    let defaults = ctx.engine.permissions()?.is_default();

    let mut human = HumanOutput::new("Roles");
    human.push_summary("Total", roles.len().to_string());
    if defaults {
        human.push_summary("Grants", "built-in defaults");
    }
    for role in &roles {
        let marker = if role.is_system { " (system)" } else { "" };
        human.push_detail(format!(
            "{}{marker}: {}",
            role.name,
            role.permissions.join(", ")
        ));
    }
    emit_success(
        ctx.output(),
        "role list",
        &RoleListOutput {
            total: roles.len(),
            defaults,
            roles,
        },
        Some(&human),
    )
}
