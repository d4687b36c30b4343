// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use yare::parameterized;

use super::{parse_python_minor, pid_alive, read_pid_file, ExitInfo};

#[parameterized(
    py312 = { "Python 3.12.4", Some(12) },
    py310 = { "Python 3.10.0", Some(10) },
    py39 = { "Python 3.9.18", Some(9) },
    python2 = { "Python 2.7.18", None },
    garbage = { "pyenv: version not set", None },
    empty = { "", None },
)]
fn python_version_parsing(raw: &str, expected: Option<u32>) {
    assert_eq!(parse_python_minor(raw), expected);
}

#[test]
fn own_pid_is_alive() {
    assert!(pid_alive(std::process::id()));
}

#[test]
fn absurd_pid_is_dead() {
    // PID far above any real pid_max.
    assert!(!pid_alive(3_999_999));
}

#[test]
fn pid_file_roundtrip() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("daemon.pid");

    assert_eq!(read_pid_file(&path), None);

    std::fs::write(&path, "4242\n").unwrap();
    assert_eq!(read_pid_file(&path), Some(4242));

    std::fs::write(&path, "not-a-pid").unwrap();
    assert_eq!(read_pid_file(&path), None);
}

#[test]
fn exit_info_renders_code_over_signal() {
    assert_eq!(ExitInfo { code: Some(1), signal: None }.to_string(), "exit code 1");
    assert_eq!(ExitInfo { code: None, signal: Some(9) }.to_string(), "signal 9");
    assert_eq!(ExitInfo { code: None, signal: None }.to_string(), "unknown exit");
}
