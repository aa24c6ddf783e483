mod support;

use chrono::{Duration, Local};
use floortask::lock::FileLock;

use support::{envelope, TestWorkspace};

type TestResult = Result<(), Box<dyn std::error::Error>>;

/// A window covering the current local minute with a margin on both sides.
fn window_around_now() -> (String, String) {
    let now = Local::now().naive_local();
    let start = (now - Duration::minutes(1)).format("%H:%M").to_string();
    let end = (now + Duration::minutes(3)).format("%H:%M").to_string();
    (start, end)
}

/// A window on the opposite side of the clock.
fn window_far_from_now() -> (String, String) {
    let now = Local::now().naive_local();
    let start = (now + Duration::hours(6)).format("%H:%M").to_string();
    let end = (now + Duration::hours(6) + Duration::minutes(15))
        .format("%H:%M")
        .to_string();
    (start, end)
}

#[test]
fn window_management_needs_manage_breaks() -> TestResult {
    let ws = TestWorkspace::init()?;
    let (start, end) = window_far_from_now();

    ws.ft_as("eva", "USER")
        .args(["break", "window", "add", &start, &end])
        .assert()
        .code(3);

    let window = ws.run_json(
        "jana",
        "LEADER",
        &["break", "window", "add", &start, &end, "--name", "Desiata"],
    )?;
    assert_eq!(window["start"], start);
    assert_eq!(window["name"], "Desiata");

    let listed = ws.run_json("eva", "USER", &["break", "window", "list"])?;
    assert_eq!(listed["total"], 1);

    let id = window["id"].as_str().unwrap_or_default().to_string();
    ws.run_json("jana", "LEADER", &["break", "window", "rm", &id])?;
    let listed = ws.run_json("eva", "USER", &["break", "window", "list"])?;
    assert_eq!(listed["total"], 0);
    Ok(())
}

#[test]
fn malformed_window_times_are_rejected() -> TestResult {
    let ws = TestWorkspace::init()?;
    ws.ft_as("jana", "LEADER")
        .args(["break", "window", "add", "25:00", "09:15"])
        .assert()
        .code(2);
    Ok(())
}

#[test]
fn open_window_blocks_task_creation_for_plain_users() -> TestResult {
    let ws = TestWorkspace::init()?;
    ws.seed_catalog("Lisovna 3", 12, "P-100");
    let (start, end) = window_around_now();
    ws.run_json("jana", "LEADER", &["break", "window", "add", &start, &end])?;

    let status = ws.run_json("eva", "USER", &["break", "status"])?;
    assert_eq!(status["windowActive"], true);

    let output = ws
        .ft_as("eva", "USER")
        .args(["task", "new", "P-100", "Lisovna 3", "5"])
        .output()?;
    assert_eq!(output.status.code(), Some(3));
    let json = envelope(&output.stdout);
    assert_eq!(json["error"]["kind"], "policy_blocked");
    assert_eq!(json["next_steps"][0], "ft break status");

    ws.ft_as("eva", "USER")
        .args(["task", "adhoc", "Sweep aisle"])
        .assert()
        .code(3);

    // Holders of perm_manage_breaks are never blocked.
    let task = ws.run_json("jana", "LEADER", &["task", "new", "P-100", "Lisovna 3", "5"])?;
    assert_eq!(task["status"], "open");
    Ok(())
}

#[test]
fn tick_starts_one_break_and_end_closes_it() -> TestResult {
    let ws = TestWorkspace::init()?;
    let (start, end) = window_around_now();
    ws.run_json("jana", "LEADER", &["break", "window", "add", &start, &end])?;

    let started = ws.run_json("eva", "USER", &["break", "tick"])?;
    assert_eq!(started["action"], "started");
    assert_eq!(started["break"]["isActive"], true);

    let again = ws.run_json("eva", "USER", &["break", "tick"])?;
    assert_eq!(again["action"], "idle");
    assert_eq!(again["active"], true);

    ws.ft_as("eva", "USER").args(["break", "end"]).assert().code(3);
    let ended = ws.run_json("jana", "LEADER", &["break", "end"])?;
    assert_eq!(ended["ended"]["isActive"], false);
    assert!(ended["ended"]["end"].is_string());

    let status = ws.run_json("eva", "USER", &["break", "status"])?;
    assert!(status["activeBreak"].is_null());
    Ok(())
}

#[test]
fn tick_outside_any_window_is_idle() -> TestResult {
    let ws = TestWorkspace::init()?;
    let (start, end) = window_far_from_now();
    ws.run_json("jana", "LEADER", &["break", "window", "add", &start, &end])?;

    let idle = ws.run_json("eva", "USER", &["break", "tick"])?;
    assert_eq!(idle["action"], "idle");
    assert_eq!(idle["active"], false);

    let status = ws.run_json("eva", "USER", &["break", "status"])?;
    assert_eq!(status["windowActive"], false);
    Ok(())
}

#[test]
fn second_scheduler_is_refused_while_one_runs() -> TestResult {
    let ws = TestWorkspace::init()?;
    let held = FileLock::acquire(ws.state_dir().join("scheduler.lock"), 1000)?;

    let output = ws
        .ft_as("jana", "LEADER")
        .args(["break", "run", "--interval", "1"])
        .output()?;
    assert_eq!(output.status.code(), Some(3));
    let json = envelope(&output.stdout);
    assert_eq!(json["error"]["kind"], "policy_blocked");
    assert!(json["error"]["details"]["path"]
        .as_str()
        .is_some_and(|p| p.ends_with("scheduler.lock")));

    drop(held);
    Ok(())
}
