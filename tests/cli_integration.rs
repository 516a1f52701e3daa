//! CLI integration tests for Slipway.
//!
//! These tests exercise declaration and error reporting; none of them needs
//! a C compiler.

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the slipway binary command.
fn slipway() -> Command {
    Command::cargo_bin("slipway").unwrap()
}

fn project(build_file: &str) -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("Slipway.toml"), build_file).unwrap();
    tmp
}

fn run_in(dir: &Path, args: &[&str]) -> assert_cmd::assert::Assert {
    slipway().args(args).current_dir(dir).assert()
}

const MATH: &str = r#"
[[distribution]]
name = "math"
version = "1.0.0"

[[distribution.library]]
name = "add"
sources = ["src/add.c"]

[[distribution.executable]]
name = "calc"
sources = ["src/calc.c"]
link_to = ["add"]
"#;

#[test]
fn test_help_lists_commands() {
    slipway()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("test"))
        .stdout(predicate::str::contains("dist"))
        .stdout(predicate::str::contains("compile-commands"));
}

#[test]
fn test_missing_build_file() {
    let tmp = TempDir::new().unwrap();
    run_in(tmp.path(), &["build"])
        .failure()
        .stderr(predicate::str::contains("could not find `Slipway.toml`"));
}

#[test]
fn test_src_dir_flag() {
    let tmp = TempDir::new().unwrap();
    run_in(tmp.path(), &["--src-dir", "nowhere", "build"])
        .failure()
        .stderr(predicate::str::contains("nowhere"));
}

#[test]
fn test_invalid_config_file() {
    let tmp = project(MATH);
    fs::write(
        tmp.path().join("slipway.config.json"),
        r#"{ "buildSharedLibraries": true }"#,
    )
    .unwrap();

    run_in(tmp.path(), &["build"])
        .failure()
        .stderr(predicate::str::contains("slipway.config.json"))
        .stderr(predicate::str::contains("is invalid"));
}

#[test]
fn test_invalid_build_file() {
    let tmp = project("[[distribution]]\nname = \"math\"\n");
    run_in(tmp.path(), &["build"])
        .failure()
        .stderr(predicate::str::contains("failed to parse"));
}

#[test]
fn test_cyclic_libraries() {
    let tmp = project(
        r#"
[[distribution]]
name = "math"
version = "1.0.0"
[[distribution.library]]
name = "a"
sources = ["a.c"]
link_to = ["b"]
[[distribution.library]]
name = "b"
sources = ["b.c"]
link_to = ["a"]
"#,
    );
    run_in(tmp.path(), &["build"])
        .failure()
        .stderr(predicate::str::contains("cyclic library dependency"));
}

#[test]
fn test_duplicate_target() {
    let tmp = project(
        r#"
[[distribution]]
name = "math"
version = "1.0.0"
[[distribution.library]]
name = "add"
sources = ["add.c"]
[[distribution.executable]]
name = "add"
sources = ["main.c"]
"#,
    );
    run_in(tmp.path(), &["build"])
        .failure()
        .stderr(predicate::str::contains(
            "target `add` is already declared in distribution `math`",
        ));
}

#[test]
fn test_unknown_distribution() {
    let tmp = project(MATH);
    run_in(tmp.path(), &["dist", "physics"])
        .failure()
        .stderr(predicate::str::contains("no distribution named `physics`"));
}

#[test]
fn test_missing_source_fails_build() {
    let tmp = project(MATH);
    run_in(tmp.path(), &["build", "math/add.dir/src/add.o"])
        .failure()
        .stderr(predicate::str::contains("src/add.c"));
}
