//! Command-line behaviour that needs no network access.

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

/// Binary isolated from the user's config, token and environment.
fn cli(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("gmail-attachments").unwrap();
    cmd.env("GMAIL_ATTACHMENTS_CONFIG", dir.child("none.toml").path())
        .env_remove("SEARCH_QUERY")
        .env_remove("MAX_MESSAGES")
        .env_remove("DOWNLOAD_PATH")
        .env_remove("SUBJECT_PATTERN")
        .env_remove("FILENAME_PATTERN")
        .env_remove("DATE_FROM")
        .env_remove("DATE_TO")
        .env_remove("RUST_LOG")
        .env("GMAIL_CREDENTIALS_FILE", dir.child("credentials.json").path())
        .env("GMAIL_TOKEN_FILE", dir.child("token.json").path());
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    cli(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("auth"))
        .stdout(predicate::str::contains("--filename-pattern"));
}

#[test]
fn test_invalid_subject_pattern_fails_before_auth() {
    let dir = TempDir::new().unwrap();
    cli(&dir)
        .args(["--subject-pattern", "(", "--non-interactive"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
    dir.child("token.json").assert(predicate::path::missing());
}

#[test]
fn test_invalid_date_is_rejected() {
    let dir = TempDir::new().unwrap();
    cli(&dir)
        .args(["config", "--date-from", "2024-13-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("YYYY/MM/DD"));
}

#[test]
fn test_config_prints_effective_settings() {
    let dir = TempDir::new().unwrap();
    cli(&dir)
        .args(["config", "--max-messages", "7", "--subject-pattern", "invoice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("max_messages = 7"))
        .stdout(predicate::str::contains("subject_pattern = \"invoice\""));
}

#[test]
fn test_environment_overrides_config_file() {
    let dir = TempDir::new().unwrap();
    let file = dir.child("config.toml");
    file.write_str("[gmail]\nmax_messages = 3\nsearch_query = \"from:billing\"\n")
        .unwrap();
    cli(&dir)
        .env("MAX_MESSAGES", "12")
        .args(["config", "--config"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("max_messages = 12"))
        .stdout(predicate::str::contains("search_query = \"from:billing\""));
}

#[test]
fn test_explicit_missing_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    cli(&dir)
        .args(["config", "--config"])
        .arg(dir.child("absent.toml").path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("config file not found"));
}

#[test]
fn test_completions_bash() {
    let dir = TempDir::new().unwrap();
    cli(&dir)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gmail-attachments"));
}
