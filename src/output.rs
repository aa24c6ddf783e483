//! Shared output formatting for ft CLI commands.

use serde::Serialize;

use crate::error::Result;

pub const SCHEMA_VERSION: &str = "floortask.v1";

/// Command groups whose first positional argument is a subcommand.
const GROUPS: &[&str] = &[
    "actor",
    "task",
    "break",
    "archive",
    "part",
    "workplace",
    "reason",
    "bom",
    "role",
];

/// Global flags that consume the following argument.
const VALUE_FLAGS: &[&str] = &["--root", "--actor", "--role", "--events"];

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone)]
pub struct HumanOutput {
    header: String,
    summary: Vec<(String, String)>,
    details: Vec<String>,
    warnings: Vec<String>,
    next_steps: Vec<String>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            summary: Vec::new(),
            details: Vec::new(),
            warnings: Vec::new(),
            next_steps: Vec::new(),
        }
    }

    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.summary.push((key.into(), value.into()));
    }

    pub fn push_detail(&mut self, value: impl Into<String>) {
        self.details.push(value.into());
    }

    pub fn push_warning(&mut self, value: impl Into<String>) {
        self.warnings.push(value.into());
    }

    pub fn push_next_step(&mut self, value: impl Into<String>) {
        self.next_steps.push(value.into());
    }
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        let warnings = human.map(|h| h.warnings.clone()).unwrap_or_default();
        let next_steps = human.map(|h| h.next_steps.clone()).unwrap_or_default();

        #[derive(Serialize)]
        struct Envelope<'a, T: Serialize> {
            schema_version: &'static str,
            command: &'a str,
            status: &'static str,
            data: &'a T,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            warnings: Vec<String>,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            next_steps: Vec<String>,
        }

        let payload = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "success",
            data,
            warnings,
            next_steps,
        };

        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if options.quiet {
        return Ok(());
    }

    if let Some(human) = human {
        println!("{}", format_human(human));
    }

    Ok(())
}

pub fn emit_error(command: &str, err: &crate::error::Error, json: bool) -> Result<()> {
    let next_steps = error_next_steps(err);
    let hint = next_steps.first().map(|step| step.as_str());
    if json {
        #[derive(Serialize)]
        struct ErrorBody<'a> {
            message: &'a str,
            code: i32,
            kind: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<serde_json::Value>,
        }

        #[derive(Serialize)]
        struct Envelope<'a> {
            schema_version: &'static str,
            command: &'a str,
            status: &'static str,
            error: ErrorBody<'a>,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            next_steps: Vec<String>,
        }

        let payload = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "error",
            error: ErrorBody {
                message: &err.to_string(),
                code: err.exit_code(),
                kind: error_kind(err),
                details: err.details(),
            },
            next_steps: next_steps.clone(),
        };

        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    eprintln!("error: {err}");
    if let Some(hint) = hint {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

pub fn format_human(output: &HumanOutput) -> String {
    let mut lines = Vec::new();
    lines.push(output.header.clone());

    push_summary(&mut lines, &output.summary);
    push_section(&mut lines, "Details", &output.details);
    push_section(&mut lines, "Warnings", &output.warnings);
    push_section(&mut lines, "Next steps", &output.next_steps);

    lines.join("\n")
}

pub fn infer_command_name_from_args() -> String {
    let args: Vec<String> = std::env::args().skip(1).collect();
    command_name(&args)
}

/// Best-effort command name for error envelopes, computed before clap runs.
pub fn command_name(args: &[String]) -> String {
    let mut positionals = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            iter.next();
            continue;
        }
        if arg.starts_with('-') {
            continue;
        }
        positionals.push(arg.as_str());
        let wants_sub = positionals.len() == 1 && GROUPS.contains(&arg.as_str());
        if !wants_sub {
            break;
        }
    }

    if positionals.is_empty() {
        "ft".to_string()
    } else {
        positionals.join(" ")
    }
}

fn error_kind(err: &crate::error::Error) -> &'static str {
    match err.exit_code() {
        2 => "user_error",
        3 => "policy_blocked",
        _ => "operation_failed",
    }
}

fn error_next_steps(err: &crate::error::Error) -> Vec<String> {
    use crate::error::Error;

    match err {
        Error::NotInitialized(_) => vec!["ft init".to_string()],
        Error::InvalidConfig(_) => vec!["fix .floor.toml then retry".to_string()],
        Error::TaskNotFound(_) => vec!["ft task list".to_string()],
        Error::BreakActive => vec!["ft break status".to_string()],
        Error::PermissionDenied { role, .. } => vec![format!("ft role list  # role {role}")],
        Error::NotClaimed { task_id, .. } => vec![format!("ft task start {task_id}")],
        Error::SchedulerRunning(_) => vec!["ft break status".to_string()],
        Error::LockFailed(_) => {
            vec!["retry; another ft process holds the store lock".to_string()]
        }
        _ => Vec::new(),
    }
}

fn push_summary(lines: &mut Vec<String>, summary: &[(String, String)]) {
    if summary.is_empty() {
        return;
    }

    lines.push(String::new());
    lines.push("Summary:".to_string());
    for (key, value) in summary {
        if value.is_empty() {
            lines.push(format!("- {key}"));
        } else {
            lines.push(format!("- {key}: {value}"));
        }
    }
}

fn push_section(lines: &mut Vec<String>, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }

    lines.push(String::new());
    lines.push(format!("{title}:"));
    for item in items {
        lines.push(format!("- {item}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn command_name_skips_global_values() {
        assert_eq!(
            command_name(&args(&["--root", "/tmp/x", "task", "new", "P1", "WP"])),
            "task new"
        );
        assert_eq!(
            command_name(&args(&["--json", "--actor", "anna", "stats", "--period", "week"])),
            "stats"
        );
        assert_eq!(command_name(&args(&["init"])), "init");
        assert_eq!(command_name(&args(&["--json"])), "ft");
    }

    #[test]
    fn human_output_sections() {
        let mut human = HumanOutput::new("Task created");
        human.push_summary("ID", "01ABC");
        human.push_warning("break starts soon");
        human.push_next_step("ft task list");

        let text = format_human(&human);
        assert!(text.starts_with("Task created"));
        assert!(text.contains("Summary:\n- ID: 01ABC"));
        assert!(text.contains("Warnings:\n- break starts soon"));
        assert!(text.contains("Next steps:\n- ft task list"));
        assert!(!text.contains("Details:"));
    }

    #[test]
    fn policy_errors_carry_hints() {
        let err = Error::PermissionDenied {
            role: "USER".to_string(),
            permission: "perm_archive".to_string(),
        };
        assert_eq!(error_kind(&err), "policy_blocked");
        assert_eq!(error_next_steps(&err), vec!["ft role list  # role USER"]);
        assert_eq!(error_kind(&Error::BreakActive), "policy_blocked");
        assert_eq!(
            error_kind(&Error::TaskNotFound("x".to_string())),
            "user_error"
        );
    }
}
