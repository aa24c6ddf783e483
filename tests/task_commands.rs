mod support;

use std::fs;

use predicates::str::contains;
use serde_json::Value;

use support::{envelope, TestWorkspace};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn seeded() -> Result<TestWorkspace, Box<dyn std::error::Error>> {
    let ws = TestWorkspace::init()?;
    ws.seed_catalog("Lisovna 3", 12, "P-100");
    Ok(ws)
}

fn new_task(ws: &TestWorkspace, actor: &str, priority: &str) -> Result<Value, Box<dyn std::error::Error>> {
    ws.run_json(
        actor,
        "USER",
        &["task", "new", "P-100", "Lisovna 3", "5", "--priority", priority],
    )
}

#[test]
fn new_task_takes_standard_time_from_workplace() -> TestResult {
    let ws = seeded()?;
    let task = new_task(&ws, "eva", "normal")?;

    assert_eq!(task["status"], "open");
    assert_eq!(task["part"], "P-100");
    assert_eq!(task["workplace"], "Lisovna 3");
    assert_eq!(task["standard_time"], 12);
    assert_eq!(task["priority"], "NORMAL");
    assert_eq!(task["created_by"], "eva");
    assert_eq!(task["ad_hoc"], false);
    Ok(())
}

#[test]
fn unknown_part_or_workplace_is_rejected() -> TestResult {
    let ws = seeded()?;

    let output = ws
        .ft_as("eva", "USER")
        .args(["task", "new", "P-999", "Lisovna 3", "5"])
        .output()?;
    assert_eq!(output.status.code(), Some(2));
    let json = envelope(&output.stdout);
    assert!(json["error"]["message"]
        .as_str()
        .unwrap_or_default()
        .contains("unknown part"));

    ws.ft_as("eva", "USER")
        .args(["task", "new", "P-100", "Nowhere", "5"])
        .assert()
        .code(2);
    ws.ft_as("eva", "USER")
        .args(["task", "new", "P-100", "Lisovna 3", "0"])
        .assert()
        .code(2);
    Ok(())
}

#[test]
fn user_must_claim_before_finishing() -> TestResult {
    let ws = seeded()?;
    let id = new_task(&ws, "eva", "normal")?["id"]
        .as_str()
        .unwrap_or_default()
        .to_string();

    let output = ws
        .ft_as("eva", "USER")
        .args(["task", "finish", &id])
        .output()?;
    assert_eq!(output.status.code(), Some(3));
    let json = envelope(&output.stdout);
    assert_eq!(json["error"]["kind"], "policy_blocked");
    assert_eq!(json["next_steps"][0], format!("ft task start {id}"));

    let started = ws.run_json("eva", "USER", &["task", "start", &id])?;
    assert_eq!(started["status"], "in_progress");
    assert_eq!(started["in_progress_by"], "eva");
    assert!(started["started_at"].is_string());

    let finished = ws.run_json("eva", "USER", &["task", "finish", &id])?;
    assert_eq!(finished["status"], "completed");
    assert_eq!(finished["completed_by"], "eva");
    assert!(finished.get("in_progress_by").is_none());
    Ok(())
}

#[test]
fn leader_finishes_without_claim_and_can_reopen() -> TestResult {
    let ws = seeded()?;
    let id = new_task(&ws, "eva", "normal")?["id"]
        .as_str()
        .unwrap_or_default()
        .to_string();

    let finished = ws.run_json("jana", "LEADER", &["task", "finish", &id])?;
    assert_eq!(finished["status"], "completed");

    let reopened = ws.run_json("jana", "LEADER", &["task", "finish", &id])?;
    assert_eq!(reopened["status"], "open");
    assert!(reopened.get("completed_at").is_none());
    Ok(())
}

#[test]
fn incorrect_is_one_way() -> TestResult {
    let ws = seeded()?;
    let id = new_task(&ws, "eva", "normal")?["id"]
        .as_str()
        .unwrap_or_default()
        .to_string();

    ws.ft_as("eva", "USER")
        .args(["task", "incorrect", &id])
        .assert()
        .code(3);

    let marked = ws.run_json("jana", "LEADER", &["task", "incorrect", &id])?;
    assert_eq!(marked["status"], "incorrectly_entered");

    ws.ft_as("jana", "LEADER")
        .args(["task", "finish", &id])
        .assert()
        .code(2);
    ws.ft_as("jana", "LEADER")
        .args(["task", "incorrect", &id])
        .assert()
        .code(2);
    Ok(())
}

#[test]
fn missing_report_closes_task_and_clearing_needs_resolve() -> TestResult {
    let ws = seeded()?;
    let id = new_task(&ws, "eva", "normal")?["id"]
        .as_str()
        .unwrap_or_default()
        .to_string();

    let reported = ws.run_json(
        "eva",
        "USER",
        &["task", "missing", &id, "--reason", "Not in rack"],
    )?;
    assert_eq!(reported["status"], "missing");
    assert_eq!(reported["missing_reason"], "Not in rack");
    assert_eq!(reported["missing_reported_by"], "eva");
    assert!(reported["completed_at"].is_string());

    // Clearing is a resolve action; plain users lack it.
    ws.ft_as("eva", "USER")
        .args(["task", "missing", &id])
        .assert()
        .code(3);

    let cleared = ws.run_json("karel", "LOGISTICIAN", &["task", "missing", &id])?;
    assert_eq!(cleared["missing"], false);
    assert_eq!(cleared["status"], "completed");
    Ok(())
}

#[test]
fn block_records_inventory_intervals() -> TestResult {
    let ws = seeded()?;
    let id = new_task(&ws, "eva", "normal")?["id"]
        .as_str()
        .unwrap_or_default()
        .to_string();

    let blocked = ws.run_json("eva", "USER", &["task", "block", &id])?;
    assert_eq!(blocked["status"], "blocked");
    assert!(blocked["inventory_history"][0]["end"].is_null());

    let unblocked = ws.run_json("eva", "USER", &["task", "block", &id])?;
    assert_eq!(unblocked["status"], "open");
    assert!(unblocked["inventory_history"][0]["end"].is_string());
    Ok(())
}

#[test]
fn list_orders_urgent_first_and_filters_open() -> TestResult {
    let ws = seeded()?;
    let normal = new_task(&ws, "eva", "normal")?["id"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    let urgent = new_task(&ws, "eva", "urgent")?["id"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    let done = new_task(&ws, "eva", "low")?["id"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    ws.run_json("jana", "LEADER", &["task", "finish", &done])?;

    let listed = ws.run_json("eva", "USER", &["task", "list"])?;
    assert_eq!(listed["total"], 3);
    assert_eq!(listed["tasks"][0]["id"], urgent);
    assert_eq!(listed["tasks"][1]["id"], normal);
    assert_eq!(listed["tasks"][2]["id"], done);

    let open = ws.run_json("eva", "USER", &["task", "list", "--open"])?;
    assert_eq!(open["total"], 2);

    let completed = ws.run_json("eva", "USER", &["task", "list", "--status", "completed"])?;
    assert_eq!(completed["total"], 1);
    Ok(())
}

#[test]
fn ids_resolve_by_unique_prefix() -> TestResult {
    let ws = seeded()?;
    let id = new_task(&ws, "eva", "normal")?["id"]
        .as_str()
        .unwrap_or_default()
        .to_string();

    let shown = ws.run_json("eva", "USER", &["task", "show", &id[..12].to_lowercase()])?;
    assert_eq!(shown["id"], id);

    ws.ft_as("eva", "USER")
        .args(["task", "show", "zzzz"])
        .assert()
        .code(2);
    Ok(())
}

#[test]
fn adhoc_edit_note_and_delete() -> TestResult {
    let ws = seeded()?;
    let task = ws.run_json("jana", "LEADER", &["task", "adhoc", "Sweep aisle 4"])?;
    let id = task["id"].as_str().unwrap_or_default().to_string();
    assert_eq!(task["ad_hoc"], true);
    assert_eq!(task["text"], "Sweep aisle 4");

    let edited = ws.run_json(
        "jana",
        "LEADER",
        &["task", "edit", &id, "Sweep aisle 5", "--priority", "urgent"],
    )?;
    assert_eq!(edited["text"], "Sweep aisle 5");
    assert_eq!(edited["priority"], "URGENT");

    let noted = ws.run_json("eva", "USER", &["task", "note", &id, "broom in locker"])?;
    assert_eq!(noted["note"], "broom in locker");
    let long = "x".repeat(51);
    ws.ft_as("eva", "USER")
        .args(["task", "note", &id, &long])
        .assert()
        .code(2);
    let cleared = ws.run_json("eva", "USER", &["task", "note", &id])?;
    assert!(cleared.get("note").is_none());

    ws.ft_as("eva", "USER")
        .args(["task", "delete", &id])
        .assert()
        .code(3);
    ws.run_json("boss", "SUPERVISOR", &["task", "delete", &id])?;
    let listed = ws.run_json("eva", "USER", &["task", "list"])?;
    assert_eq!(listed["total"], 0);
    Ok(())
}

#[test]
fn events_are_appended_as_json_lines() -> TestResult {
    let ws = seeded()?;
    let events = ws.path().join("events.jsonl");

    ws.ft()
        .args(["--actor", "eva", "--events"])
        .arg(&events)
        .args(["task", "new", "P-100", "Lisovna 3", "2"])
        .assert()
        .success()
        .stdout(contains("Task created"));

    let raw = fs::read_to_string(&events)?;
    let lines: Vec<Value> = raw
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["schema_version"], "floortask.event.v1");
    assert_eq!(lines[0]["event"], "task_created");
    assert_eq!(lines[0]["actor"], "eva");
    assert_eq!(lines[0]["data"]["part"], "P-100");
    Ok(())
}
