//! Helpers for driving the `stocktake` binary in integration tests.

#![allow(dead_code)]

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

/// md5 of "password"
pub const PASSWORD_MD5: &str = "5f4dcc3b5aa765d61d8327deb882cf99";

pub fn stocktake_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_stocktake"))
}

/// A temporary stocktake home.
pub struct TestHome {
    pub dir: TempDir,
}

impl TestHome {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp home"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a user store with `alice` / `password` at HQ and DXB.
    pub fn with_alice(self) -> Self {
        let content = format!(
            "username,password_hash,branches\nalice,{},HQ|DXB\nbob,{},\n",
            PASSWORD_MD5, PASSWORD_MD5
        );
        fs::write(self.path().join("users.csv"), content).expect("write users.csv");
        self
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(stocktake_bin());
        cmd.args(args)
            .env("STOCKTAKE_HOME", self.path())
            .env_remove("STOCKTAKE_USERS_FILE")
            .env_remove("STOCKTAKE_SCANS_FILE")
            .env_remove("STOCKTAKE_LOCK_TIMEOUT_MS")
            .env_remove("STOCKTAKE_PASSWORD")
            .env_remove("RUST_LOG");
        cmd
    }

    pub fn run(&self, args: &[&str]) -> Output {
        self.command(args)
            .stdin(Stdio::null())
            .output()
            .expect("failed to execute stocktake CLI")
    }

    pub fn run_with_stdin(&self, args: &[&str], input: &str) -> Output {
        let mut child = self
            .command(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("failed to spawn stocktake CLI");
        child
            .stdin
            .take()
            .expect("stdin piped")
            .write_all(input.as_bytes())
            .expect("write stdin");
        child.wait_with_output().expect("wait for stocktake CLI")
    }

    pub fn run_json<T: DeserializeOwned>(&self, args: &[&str]) -> T {
        let output = self.run(args);
        expect_success(args, &output);
        from_output(&output)
    }

    pub fn run_json_error(&self, args: &[&str]) -> serde_json::Value {
        let output = self.run(args);
        assert!(
            !output.status.success(),
            "command unexpectedly succeeded: {}\nstdout:\n{}\nstderr:\n{}",
            args.join(" "),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        assert_eq!(output.status.code(), Some(1));
        parse_json_output(&output)
    }
}

pub fn expect_success(args: &[&str], output: &Output) {
    assert!(
        output.status.success(),
        "command failed: {}\nstdout:\n{}\nstderr:\n{}",
        args.join(" "),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

pub fn from_output<T: DeserializeOwned>(output: &Output) -> T {
    let value = parse_json_output(output);
    serde_json::from_value(value).unwrap_or_else(|err| {
        panic!(
            "failed to deserialize JSON output: {}\nstdout:\n{}",
            err,
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

pub fn parse_json_output(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json_start = stdout
        .find(|c| c == '{' || c == '[')
        .unwrap_or_else(|| {
            panic!(
                "no JSON payload found in output\nstdout:\n{}\nstderr:\n{}",
                stdout,
                String::from_utf8_lossy(&output.stderr)
            )
        });
    let mut deserializer = serde_json::Deserializer::from_str(&stdout[json_start..]);
    serde_json::Value::deserialize(&mut deserializer).unwrap_or_else(|err| {
        panic!(
            "failed to parse JSON output: {}\nstdout:\n{}\nstderr:\n{}",
            err,
            stdout,
            String::from_utf8_lossy(&output.stderr)
        )
    })
}

#[derive(Debug, Deserialize)]
pub struct ScanRow {
    pub scan_id: u64,
    pub barcode: String,
    pub created_by: String,
    pub branch_code: String,
    pub created_date: String,
}

#[derive(Debug, Deserialize)]
pub struct IngestResult {
    pub branch: String,
    pub accepted: usize,
    pub skipped: usize,
    pub first_id: Option<u64>,
    pub last_id: Option<u64>,
}
