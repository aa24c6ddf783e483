#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

/// An initialized floortask workspace in a temp directory.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    /// Create the directory and run `ft init` in it.
    pub fn init() -> Result<Self, Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let ws = Self { dir };
        ws.ft().arg("init").assert().success();
        Ok(ws)
    }

    /// A temp directory without `ft init`.
    pub fn bare() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn state_dir(&self) -> PathBuf {
        self.dir.path().join(".floor")
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn write_config(&self, contents: &str) -> std::io::Result<PathBuf> {
        self.write_file(".floor.toml", contents)
    }

    /// `ft` rooted at this workspace with a clean identity environment.
    pub fn ft(&self) -> Command {
        let mut cmd = ft_cmd();
        cmd.arg("--root").arg(self.path());
        cmd
    }

    /// `ft --json` acting as `actor` in `role`.
    pub fn ft_as(&self, actor: &str, role: &str) -> Command {
        let mut cmd = self.ft();
        cmd.args(["--json", "--actor", actor, "--role", role]);
        cmd
    }

    /// Run a command as `actor`/`role` and return the success envelope's data.
    pub fn run_json(
        &self,
        actor: &str,
        role: &str,
        args: &[&str],
    ) -> Result<Value, Box<dyn std::error::Error>> {
        let output = self.ft_as(actor, role).args(args).output()?;
        assert!(
            output.status.success(),
            "ft {:?} failed: {}{}",
            args,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let envelope: Value = serde_json::from_slice(&output.stdout)?;
        assert_eq!(envelope["status"], "success");
        Ok(envelope["data"].clone())
    }

    /// Seed one workplace and one part as ADMIN.
    pub fn seed_catalog(&self, workplace: &str, minutes: u32, part: &str) {
        self.ft_as("admin", "ADMIN")
            .args(["workplace", "add", workplace, "--minutes", &minutes.to_string()])
            .assert()
            .success();
        self.ft_as("admin", "ADMIN")
            .args(["part", "add", part])
            .assert()
            .success();
    }
}

pub fn ft_cmd() -> Command {
    let mut cmd = Command::cargo_bin("ft").expect("binary");
    cmd.env_remove("FT_ROOT")
        .env_remove("FT_ACTOR")
        .env_remove("FT_ROLE")
        .env_remove("RUST_LOG");
    cmd
}

/// Parse a JSON envelope from raw stdout.
pub fn envelope(stdout: &[u8]) -> Value {
    serde_json::from_slice(stdout).expect("json envelope")
}
