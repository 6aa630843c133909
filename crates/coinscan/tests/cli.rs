//! CLI smoke tests.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_the_subcommands() {
    Command::cargo_bin("coinscan")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("detect")
                .and(predicate::str::contains("calibrate"))
                .and(predicate::str::contains("classify")),
        );
}

#[test]
fn detect_fails_cleanly_on_a_missing_file() {
    Command::cargo_bin("coinscan")
        .unwrap()
        .args(["detect", "--image", "/nonexistent/coins.png"])
        .assert()
        .failure();
}
