use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

const PASSING: &str = r#"
name: ci
triggers:
  - kind: push
    branches: [main]
  - kind: pull_request
matrix:
  - name: os
    values: [linux, mac]
steps:
  - name: build
    run: "true"
"#;

const FAILING: &str = r#"
name: ci
triggers:
  - kind: push
    branches: [main]
matrix:
  - name: flavour
    values: [good, bad]
steps:
  - name: check
    run: test "$MATRIXCI_MATRIX_FLAVOUR" = good
"#;

fn matrixci(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("matrixci").expect("binary");
    cmd.current_dir(dir.path())
        .env("MATRIXCI_CONFIG", dir.path().join("config.yaml"))
        .env_remove("RUST_LOG");
    cmd
}

fn workspace(workflow: &str) -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(dir.path().join("matrixci.yaml"), workflow).expect("write workflow");
    dir
}

#[test]
fn validate_reports_job_count() {
    let dir = workspace(PASSING);
    matrixci(&dir)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Workflow \"ci\" is valid"))
        .stdout(predicate::str::contains("Jobs: 2"));
}

#[test]
fn init_writes_a_valid_workflow() {
    let dir = TempDir::new().expect("tempdir");
    matrixci(&dir).arg("init").assert().success();
    assert!(Path::new(&dir.path().join("matrixci.yaml")).exists());
    matrixci(&dir).arg("validate").assert().success();
}

#[test]
fn passing_run_exits_zero() {
    let dir = workspace(PASSING);
    matrixci(&dir)
        .args(["run", "push", "main"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 passed, 0 failed"));
}

#[test]
fn failing_run_exits_one_and_names_the_job() {
    let dir = workspace(FAILING);
    matrixci(&dir)
        .args(["run", "push", "refs/heads/main"])
        .assert()
        .failure()
        .code(predicate::eq(1))
        .stdout(predicate::str::contains("ci (flavour=bad) failed at step check (exit 1)"));
}

#[test]
fn dry_run_does_not_execute_steps() {
    let dir = workspace(
        r#"
name: ci
triggers:
  - kind: push
    branches: [main]
steps:
  - name: touch
    run: touch executed
"#,
    );
    matrixci(&dir)
        .args(["run", "push", "main", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 job(s) planned"));
    assert!(!dir.path().join("executed").exists());
}

#[test]
fn unmatched_event_exits_zero() {
    let dir = workspace(PASSING);
    matrixci(&dir)
        .args(["run", "push", "develop"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No trigger"));
}

#[test]
fn unsupported_event_kind_is_a_configuration_error() {
    let dir = workspace(PASSING);
    matrixci(&dir)
        .args(["run", "cron", "main"])
        .assert()
        .failure()
        .code(predicate::eq(2))
        .stderr(predicate::str::contains("cron"));
}

#[test]
fn empty_axis_is_a_configuration_error() {
    let dir = workspace(
        r#"
name: ci
matrix:
  - name: os
    values: []
steps:
  - name: build
    run: "true"
"#,
    );
    matrixci(&dir)
        .args(["run", "push", "main"])
        .assert()
        .failure()
        .code(predicate::eq(2));
}

#[test]
fn json_output_is_machine_readable() {
    let dir = workspace(PASSING);
    let output = matrixci(&dir)
        .args(["run", "pull_request", "feature/x", "-o", "json"])
        .output()
        .expect("run");
    assert!(output.status.success());

    let run: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(run["overall_status"], "success");
    assert_eq!(run["job_results"].as_array().map(Vec::len), Some(2));
    assert_eq!(run["job_results"][1]["job"]["assignment"][0]["value"], "mac");
}

#[test]
fn config_set_is_persisted() {
    let dir = TempDir::new().expect("tempdir");
    matrixci(&dir)
        .args(["config", "set", "max_parallel", "3"])
        .assert()
        .success();
    matrixci(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("max_parallel: 3"));

    matrixci(&dir)
        .args(["config", "set", "max_parallel", "zero"])
        .assert()
        .failure()
        .code(predicate::eq(2));
}

#[test]
fn schema_describes_the_workflow() {
    let dir = TempDir::new().expect("tempdir");
    matrixci(&dir)
        .arg("schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("WorkflowDefinition"));
}

#[test]
fn config_set_keeps_unreadable_config_intact() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("config.yaml");
    let original = "max_parallel: [not, a, number]\nshell: bash\n";
    std::fs::write(&path, original).expect("write config");

    matrixci(&dir)
        .args(["config", "set", "output_format", "json"])
        .assert()
        .failure()
        .code(predicate::eq(2))
        .stderr(predicate::str::contains("Invalid config file"));

    assert_eq!(std::fs::read_to_string(&path).expect("read config"), original);
}

#[test]
fn config_show_prints_settable_output_format() {
    let dir = TempDir::new().expect("tempdir");
    matrixci(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("output_format: table"));
}

#[test]
fn zero_step_timeout_is_rejected() {
    let dir = workspace(PASSING);
    matrixci(&dir)
        .args(["run", "push", "main", "--step-timeout", "0"])
        .assert()
        .failure()
        .code(predicate::eq(2));
}

#[test]
fn run_help_documents_exit_status() {
    let dir = TempDir::new().expect("tempdir");
    matrixci(&dir)
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Exit status:"))
        .stdout(predicate::str::contains("no trigger matched"));
}
