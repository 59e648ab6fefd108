//! Argument parsing tests for the wtf binary

mod common;

use common::TestEnv;
use predicates::prelude::*;

#[test]
fn test_help() {
    let env = TestEnv::default();
    env.command()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sql"))
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("setup"));
}

#[test]
fn test_version() {
    let env = TestEnv::default();
    env.command()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_no_args_shows_usage() {
    let env = TestEnv::default();
    env.command()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_sql_help_lists_options() {
    let env = TestEnv::default();
    env.command()
        .args(["sql", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--db"))
        .stdout(predicate::str::contains("--yes"))
        .stdout(predicate::str::contains("--debug"))
        .stdout(predicate::str::contains("--model"))
        .stdout(predicate::str::contains("--transcript"));
}

#[test]
fn test_sql_requires_db() {
    let env = TestEnv::default();
    env.command()
        .args(["sql", "how many customers?"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--db"));
}

#[test]
fn test_sql_requires_request() {
    let env = TestEnv::default();
    env.command()
        .args(["sql", "--db", "shop.db"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("REQUEST"));
}

#[test]
fn test_unknown_subcommand() {
    let env = TestEnv::default();
    env.command()
        .arg("deploy")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}
