mod support;

use predicates::str::contains;

use support::{envelope, ft_cmd, TestWorkspace};

#[test]
fn ft_help_works() {
    ft_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("Factory-floor task tracking"));
}

#[test]
fn subcommand_help_works() {
    let subcommands = [
        "init", "actor", "task", "break", "archive", "stats", "part", "workplace", "reason",
        "bom", "role",
    ];

    for cmd in subcommands {
        ft_cmd().arg(cmd).arg("--help").assert().success();
    }
}

#[test]
fn init_creates_workspace_and_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::bare()?;

    let output = ws.ft().args(["--json", "init"]).output()?;
    assert!(output.status.success());
    let json = envelope(&output.stdout);
    assert_eq!(json["schema_version"], "floortask.v1");
    assert_eq!(json["command"], "init");
    assert_eq!(json["data"]["created"]["config"], true);
    assert_eq!(json["data"]["created"]["store"], true);
    assert!(ws.path().join(".floor.toml").is_file());
    assert!(ws.state_dir().join("db.json").is_file());

    ws.ft()
        .arg("init")
        .assert()
        .success()
        .stdout(contains("nothing to do"));
    Ok(())
}

#[test]
fn commands_outside_a_workspace_exit_with_user_error() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::bare()?;

    let output = ws.ft().args(["--json", "task", "list"]).output()?;
    assert_eq!(output.status.code(), Some(2));
    let json = envelope(&output.stdout);
    assert_eq!(json["status"], "error");
    assert_eq!(json["command"], "task list");
    assert_eq!(json["error"]["kind"], "user_error");
    assert_eq!(json["next_steps"][0], "ft init");
    Ok(())
}

#[test]
fn quiet_suppresses_human_output() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::init()?;
    ws.ft()
        .args(["-q", "task", "list"])
        .assert()
        .success()
        .stdout("");
    Ok(())
}
