use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

/// Binary with a clean environment, run from an empty directory so no `.env` is picked up
fn pruner(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ecr-pruner").unwrap();
    cmd.env_clear().current_dir(dir.path());
    cmd
}

#[test]
fn test_help_lists_environment_variables() {
    let dir = tempdir().unwrap();
    pruner(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("TARGET_REPO_REGEX"))
        .stdout(predicate::str::contains("HOLD_TAG_REGEX"))
        .stdout(predicate::str::contains("PROTECT_LATEST"));
}

#[test]
fn test_missing_configuration_reports_every_variable() {
    let dir = tempdir().unwrap();
    pruner(&dir)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration (5 problems)"))
        .stderr(predicate::str::contains("LOGDIR must be set"))
        .stderr(predicate::str::contains("TARGET_REPO_REGEX must be set"))
        .stderr(predicate::str::contains("HOLD_TAG_REGEX must be set"))
        .stderr(predicate::str::contains("AWS_REGION must be set"))
        .stderr(predicate::str::contains("ENV must be set"));
}

#[test]
fn test_invalid_values_are_reported_together() {
    let dir = tempdir().unwrap();
    pruner(&dir)
        .env("LOGDIR", dir.path().join("logs"))
        .env("TARGET_REPO_REGEX", "^shop/ OR (broken")
        .env("HOLD_TAG_REGEX", "release && stable OR keep")
        .env("AWS_REGION", "us-east-1")
        .env("ENV", "staging")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration (3 problems)"))
        .stderr(predicate::str::contains("invalid regex part '(broken'"))
        .stderr(predicate::str::contains("mixes 'OR' and '&&'"))
        .stderr(predicate::str::contains("invalid ENV value 'staging'"));

    // Validation fails before logging starts, so no log directory is created
    assert!(!dir.path().join("logs").exists());
}

#[test]
fn test_command_line_options_fill_in_for_environment() {
    let dir = tempdir().unwrap();
    pruner(&dir)
        .env("LOGDIR", dir.path().join("logs"))
        .env("AWS_REGION", "us-east-1")
        .args(["--target-repo-regex", "^shop/", "--hold-tag-regex", "keep"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration (1 problems)"))
        .stderr(predicate::str::contains("ENV must be set"));
}
