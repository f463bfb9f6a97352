// TypeTrace - Runtime Type Profiler
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! CLI tests for TypeTrace

use predicates::prelude::*;
use tracing::info;
use typetrace_common::logging;

#[test]
fn test_help_command() {
    logging::ensure_test_logging(None);
    info!("Testing CLI help command");

    let mut cmd = assert_cmd::Command::cargo_bin("typetrace").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Runtime type-profile collection"));
}

#[test]
fn test_version_command() {
    logging::ensure_test_logging(None);
    info!("Running test");
    let mut cmd = assert_cmd::Command::cargo_bin("typetrace").unwrap();
    cmd.arg("--version").assert().success().stdout(predicate::str::contains("typetrace"));
}

#[test]
fn test_instrument_subcommand_help() {
    logging::ensure_test_logging(None);
    info!("Running test");
    let mut cmd = assert_cmd::Command::cargo_bin("typetrace").unwrap();
    cmd.arg("instrument")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Instrument source files"));
}

#[test]
fn test_serve_subcommand_help() {
    logging::ensure_test_logging(None);
    info!("Running test");
    let mut cmd = assert_cmd::Command::cargo_bin("typetrace").unwrap();
    cmd.arg("serve")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Run the collector server"));
}

#[test]
fn test_missing_subcommand() {
    logging::ensure_test_logging(None);
    info!("Running test");
    let mut cmd = assert_cmd::Command::cargo_bin("typetrace").unwrap();
    cmd.assert().failure().stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_instrument_writes_output_tree() {
    logging::ensure_test_logging(None);
    info!("Running test");

    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    std::fs::create_dir_all(&src).unwrap();
    std::fs::write(src.join("app.ts"), "function f(a: number) { return a; }").unwrap();
    std::fs::write(src.join("notes.md"), "not a source file").unwrap();
    let out = dir.path().join("dist");

    let mut cmd = assert_cmd::Command::cargo_bin("typetrace").unwrap();
    cmd.arg("instrument")
        .arg(&src)
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Instrumented 1 file(s)"));

    let instrumented = std::fs::read_to_string(out.join("app.ts")).unwrap();
    assert!(instrumented.contains("twiz(\"f_param_a\", a,"));
    assert!(!out.join("notes.md").exists());
}
