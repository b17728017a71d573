//! Review-command request validation through the binary. None of these cases
//! reach a backend, so no network access is needed.

use assert_cmd::Command;
use predicates::prelude::*;

fn cmd(keys_file: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("review-gate").expect("binary builds");
    cmd.arg("--keys-file").arg(keys_file);
    cmd.env_remove("REVIEW_GATE_API_KEY");
    cmd
}

fn create_key(keys_file: &std::path::Path, developer: &str) -> String {
    let output = cmd(keys_file)
        .args(["keys", "create", developer])
        .assert()
        .success()
        .get_output()
        .clone();
    let stdout = String::from_utf8(output.stdout).expect("utf-8 stdout");
    stdout.lines().last().expect("key line").trim().to_string()
}

#[test]
fn missing_api_key_is_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let keys_file = temp.path().join("keys.json");

    cmd(&keys_file)
        .arg("review")
        .write_stdin("+fn main() {}")
        .assert()
        .failure()
        .stderr(predicate::str::contains("API key is required"));
}

#[test]
fn unknown_api_key_is_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let keys_file = temp.path().join("keys.json");
    create_key(&keys_file, "alice");

    cmd(&keys_file)
        .args(["review", "--api-key", "not-a-key"])
        .write_stdin("+fn main() {}")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid or disabled API key"));
}

#[test]
fn disabled_api_key_is_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let keys_file = temp.path().join("keys.json");
    let key = create_key(&keys_file, "alice");

    cmd(&keys_file)
        .args(["keys", "disable", &key])
        .assert()
        .success();

    cmd(&keys_file)
        .args(["review", "--api-key", &key])
        .write_stdin("+fn main() {}")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid or disabled API key"));
}

#[test]
fn empty_stdin_fails_before_any_dispatch() {
    let temp = tempfile::tempdir().unwrap();
    let keys_file = temp.path().join("keys.json");
    let key = create_key(&keys_file, "alice");

    cmd(&keys_file)
        .args(["review", "--api-key", &key])
        .env("REVIEW_GATE_CONVERSE_API_KEY", "test-secret")
        .env("REVIEW_GATE_OPENROUTER_API_KEY", "test-secret")
        .write_stdin("   \n  ")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no diff provided"));
}

#[test]
fn missing_backend_credentials_surface_the_variable_name() {
    let temp = tempfile::tempdir().unwrap();
    let keys_file = temp.path().join("keys.json");
    let key = create_key(&keys_file, "alice");

    cmd(&keys_file)
        .args(["review", "--api-key", &key])
        .env_remove("REVIEW_GATE_CONVERSE_API_KEY")
        .env_remove("REVIEW_GATE_OPENROUTER_API_KEY")
        .write_stdin("+fn main() {}")
        .assert()
        .failure()
        .stderr(predicate::str::contains("REVIEW_GATE_CONVERSE_API_KEY"));
}

#[test]
fn unreadable_diff_file_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let keys_file = temp.path().join("keys.json");
    let key = create_key(&keys_file, "alice");

    cmd(&keys_file)
        .args(["review", "--api-key", &key])
        .arg(temp.path().join("missing.diff"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read diff"));
}
