//! CLI integration tests for the folio command-line interface.
//!
//! These tests cover argument parsing, config inspection and the error
//! paths that need no live portfolio service.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A folio command isolated from the user's config and logs.
fn folio(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("folio").unwrap();
    cmd.current_dir(dir.path())
        .env("FOLIO_CONFIG_DIR", dir.path().join("config"))
        .env_remove("FOLIO_SERVER_URL");
    cmd
}

fn write_project_config(dir: &TempDir, toml: &str) {
    std::fs::write(dir.path().join("folio.toml"), toml).unwrap();
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    folio(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("fetch"))
        .stdout(predicate::str::contains("resume"))
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_displays() {
    let dir = TempDir::new().unwrap();
    folio(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("folio"));
}

#[test]
fn test_fetch_help_shows_flags() {
    let dir = TempDir::new().unwrap();
    folio(&dir)
        .args(["fetch", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--session"))
        .stdout(predicate::str::contains("--resource"))
        .stdout(predicate::str::contains("--deferred"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Invalid Input Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_unknown_subcommand_fails() {
    let dir = TempDir::new().unwrap();
    folio(&dir)
        .arg("unknown-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_unknown_resource_rejected() {
    let dir = TempDir::new().unwrap();
    folio(&dir)
        .args(["fetch", "--resource", "gold"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown portfolio resource"));
}

#[test]
fn test_invalid_config_rejected() {
    let dir = TempDir::new().unwrap();
    write_project_config(&dir, "[auth]\nmax_retries = 0\n");
    folio(&dir)
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Config Subcommand Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_config_show_merges_project_file() {
    let dir = TempDir::new().unwrap();
    write_project_config(&dir, "[portfolio]\nnamespace = \"networth\"\n");
    folio(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("folio.toml"))
        .stdout(predicate::str::contains("networth"))
        .stdout(predicate::str::contains("http://localhost:8080/mcp/stream"));
}

#[test]
fn test_server_flag_overrides_config() {
    let dir = TempDir::new().unwrap();
    folio(&dir)
        .args(["--server", "http://example.test/mcp", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("http://example.test/mcp"));
}

#[test]
fn test_config_path_lists_sources() {
    let dir = TempDir::new().unwrap();
    folio(&dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"))
        .stdout(predicate::str::contains("not found"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Fetch / Resume Error Paths
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_resume_without_pending_login_fails() {
    let dir = TempDir::new().unwrap();
    write_project_config(
        &dir,
        &format!("[auth]\nmarker_dir = {:?}\n", dir.path().join("markers")),
    );
    folio(&dir)
        .args(["resume", "--session", "nobody"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no pending login"));
}

#[test]
fn test_fetch_unreachable_server_reports_plainly() {
    let dir = TempDir::new().unwrap();
    folio(&dir)
        .args(["--server", "http://127.0.0.1:9/mcp", "fetch"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not be reached"));
}

#[test]
fn test_malformed_config_is_skipped() {
    let dir = TempDir::new().unwrap();
    write_project_config(&dir, "not valid toml {{{{");
    folio(&dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("project"))
        .stdout(predicate::str::contains("ignored"));
}
