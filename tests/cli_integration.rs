//! CLI integration tests driving the compiled binary with mock providers.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const MANIFEST: &str = r#"
[project]
name = "acme"

[settings]
max_retries = 1
backoff_base_ms = 1
backoff_cap_ms = 2

[[service]]
name = "api"
provider = "containers"
image = "registry.example.com/acme/api:1.4.2"
max_instances = 10

[[service]]
name = "frontend"
provider = "pages"
site = "frontend"

[[binding]]
hostname = "api.example.com"
service = "api"
record = "CNAME"
certificate = true

[[binding]]
hostname = "app.example.com"
service = "frontend"
record = "CNAME"
certificate = true
"#;

fn berth(state_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("berth").unwrap();
    cmd.env("BERTH_MOCK_PROVIDERS", "1")
        .env("BERTH_STATE_DIR", state_dir)
        .env_remove("BERTH_MOCK_FAIL_DEPLOY");
    cmd
}

fn write_manifest(dir: &TempDir, text: &str) -> std::path::PathBuf {
    let path = dir.path().join("berth.toml");
    std::fs::write(&path, text).unwrap();
    path
}

#[test]
fn plan_previews_the_operations() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(&dir, MANIFEST);

    berth(dir.path())
        .args(["plan", "-m"])
        .arg(&manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains("deploy/api"))
        .stdout(predicate::str::contains("bind/app.example.com"))
        .stdout(predicate::str::contains("cert/api.example.com"));
}

#[test]
fn invalid_manifest_is_fatal() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(
        &dir,
        r#"
        [project]
        name = "acme"

        [[service]]
        name = "frontend"
        provider = "pages"
        site = "frontend"

        [[binding]]
        hostname = "app.example.com"
        service = "frontend"

        [[binding]]
        hostname = "app.example.com"
        service = "frontend"
        "#,
    );

    berth(dir.path())
        .args(["plan", "-m"])
        .arg(&manifest)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("duplicate hostname"));
}

#[test]
fn unknown_manifest_fields_are_fatal() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(
        &dir,
        r#"
        [project]
        name = "acme"
        api_token = "secret"
        "#,
    );

    berth(dir.path())
        .args(["plan", "-m"])
        .arg(&manifest)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error"));
}

#[test]
fn apply_converges_and_status_reports_the_run() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(&dir, MANIFEST);

    berth(dir.path())
        .args(["apply", "-m"])
        .arg(&manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains("ok      deploy/api"))
        .stdout(predicate::str::contains("0 failed"));

    berth(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("(acme): succeeded"))
        .stdout(predicate::str::contains("ok      cert/api.example.com"));
}

#[test]
fn apply_partial_failure_exits_two_and_cascades() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(&dir, MANIFEST);

    berth(dir.path())
        .env("BERTH_MOCK_FAIL_DEPLOY", "api")
        .args(["apply", "-m"])
        .arg(&manifest)
        .assert()
        .code(2)
        .stdout(predicate::str::contains("failed  deploy/api"))
        .stdout(predicate::str::contains(
            "bind/api.example.com (dependency deploy/api failed)",
        ))
        // The frontend branch still converges.
        .stdout(predicate::str::contains("ok      bind/app.example.com"));

    // A non-succeeded last run makes status exit 1.
    berth(dir.path())
        .arg("status")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("partial failure"));
}

#[test]
fn status_without_a_recorded_run_is_an_error() {
    let dir = TempDir::new().unwrap();

    berth(dir.path())
        .arg("status")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no run recorded"));
}

#[test]
fn quiet_apply_prints_nothing_on_success() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(&dir, MANIFEST);

    berth(dir.path())
        .args(["apply", "--quiet", "-m"])
        .arg(&manifest)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn completion_scripts_generate() {
    let dir = TempDir::new().unwrap();
    berth(dir.path())
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("berth"));
}

#[test]
fn missing_credentials_are_reported_without_mocks() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(&dir, MANIFEST);

    let mut cmd = Command::cargo_bin("berth").unwrap();
    cmd.env("BERTH_STATE_DIR", dir.path())
        .env_remove("BERTH_MOCK_PROVIDERS")
        .env_remove("BERTH_DNS_API_URL")
        .env_remove("BERTH_DNS_TOKEN")
        .args(["plan", "-m"])
        .arg(&manifest)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("BERTH_DNS"));
}
