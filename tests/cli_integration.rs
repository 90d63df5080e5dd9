#![cfg(feature = "md5")]

use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

fn bin() -> String {
    env!("CARGO_BIN_EXE_sdiff").to_string()
}

fn run(args: &[&dyn AsRef<std::ffi::OsStr>]) -> Output {
    let mut cmd = Command::new(bin());
    for a in args {
        cmd.arg(a);
    }
    cmd.output().unwrap()
}

fn stdout_path(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

fn fixture(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let new = dir.join("new.txt");
    let old = dir.join("old.txt");
    std::fs::write(&new, b"The quick brown cat sits on the lazy mat.").unwrap();
    std::fs::write(&old, b"The quick brown fox jumps over the lazy dog.").unwrap();
    (new, old)
}

#[test]
fn cli_create_apply_roundtrip() {
    let dir = tempdir().unwrap();
    let (new, old) = fixture(dir.path());
    let patch = dir.path().join("update.sdiff");
    let output = dir.path().join("rebuilt.txt");

    let out = run(&[&"create", &"--new", &new, &"--old", &old, &patch]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let out = run(&[&"apply", &"--patch", &patch, &"--target", &old, &output]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(std::fs::read(&output).unwrap(), std::fs::read(&new).unwrap());
}

#[test]
fn cli_existing_output_needs_force() {
    let dir = tempdir().unwrap();
    let (new, old) = fixture(dir.path());
    let patch = dir.path().join("update.patch");
    std::fs::write(&patch, b"keep").unwrap();

    let out = run(&[&"create", &"-n", &new, &"-o", &old, &patch]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("use -f to overwrite"));
    assert_eq!(std::fs::read(&patch).unwrap(), b"keep");

    let out = run(&[&"-f", &"create", &"-n", &new, &"-o", &old, &patch]);
    assert!(out.status.success());
    assert_ne!(std::fs::read(&patch).unwrap(), b"keep");
}

#[test]
fn cli_failed_force_keeps_existing_destination() {
    let dir = tempdir().unwrap();
    let (new, old) = fixture(dir.path());
    let missing = dir.path().join("missing.txt");
    let precious = dir.path().join("precious.bin");
    std::fs::write(&precious, b"precious").unwrap();

    // Missing input.
    let out = run(&[&"-f", &"create", &"-n", &missing, &"-o", &old, &precious]);
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(std::fs::read(&precious).unwrap(), b"precious");

    // Wrong base.
    let patch = dir.path().join("p.sdiff");
    assert!(run(&[&"create", &"-n", &new, &"-o", &old, &patch]).status.success());
    let other = dir.path().join("other.txt");
    std::fs::write(&other, b"The quick brown fox jumps over the lazy cat.").unwrap();
    let out = run(&[&"-f", &"apply", &"-p", &patch, &"-t", &other, &precious]);
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(std::fs::read(&precious).unwrap(), b"precious");

    // A verified result does replace it.
    let out = run(&[&"-f", &"apply", &"-p", &patch, &"-t", &old, &precious]);
    assert!(out.status.success());
    assert_eq!(std::fs::read(&precious).unwrap(), std::fs::read(&new).unwrap());
}

#[test]
fn cli_temp_forms_print_paths() {
    let dir = tempdir().unwrap();
    let (new, old) = fixture(dir.path());

    let out = run(&[&"create", &"-n", &new, &"-o", &old]);
    assert!(out.status.success());
    let patch = stdout_path(&out);
    assert!(patch.ends_with(".sdiff"), "{patch}");

    let out = run(&[&"apply", &"-p", &patch, &"-t", &old]);
    assert!(out.status.success());
    let rebuilt = stdout_path(&out);
    assert!(rebuilt.ends_with(".tmp"), "{rebuilt}");
    assert_eq!(std::fs::read(&rebuilt).unwrap(), std::fs::read(&new).unwrap());

    std::fs::remove_file(patch).unwrap();
    std::fs::remove_file(rebuilt).unwrap();
}

#[test]
fn cli_wrong_base_fails_without_output() {
    let dir = tempdir().unwrap();
    let (new, old) = fixture(dir.path());
    let other = dir.path().join("other.txt");
    std::fs::write(&other, b"The quick brown fox jumps over the lazy cat.").unwrap();
    let patch = dir.path().join("p.sdiff");
    let output = dir.path().join("out.txt");

    assert!(run(&[&"create", &"-n", &new, &"-o", &old, &patch]).status.success());
    let out = run(&[&"apply", &"-p", &patch, &"-t", &other, &output]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.starts_with("sdiff: apply:"), "{stderr}");
    assert!(!output.exists());
}

#[test]
fn cli_inspect_lists_commands() {
    let dir = tempdir().unwrap();
    let (new, old) = fixture(dir.path());
    let patch = dir.path().join("p.sdiff");
    assert!(run(&[&"create", &"-n", &new, &"-o", &old, &patch]).status.success());

    let out = run(&[&"inspect", &patch]);
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stdout);
    assert!(text.contains("target length:"));
    assert!(text.contains("EQUAL"));
    assert!(text.contains("INSERT"));
}

#[cfg(feature = "deflate")]
#[test]
fn cli_compression_follows_extension() {
    let dir = tempdir().unwrap();
    let (new, old) = fixture(dir.path());
    let patch = dir.path().join("update.gz");
    let output = dir.path().join("rebuilt.txt");

    assert!(run(&[&"create", &"-n", &new, &"-o", &old, &patch]).status.success());
    assert_eq!(&std::fs::read(&patch).unwrap()[..2], &[0x1F, 0x8B]);

    // Forcing no compression makes the gzip bytes unreadable.
    let out = run(&[&"apply", &"-z", &"none", &"-p", &patch, &"-t", &old, &output]);
    assert_eq!(out.status.code(), Some(1));

    let out = run(&[&"apply", &"-p", &patch, &"-t", &old, &output]);
    assert!(out.status.success());
    assert_eq!(std::fs::read(&output).unwrap(), std::fs::read(&new).unwrap());
}

#[test]
fn cli_json_stats() {
    let dir = tempdir().unwrap();
    let (new, old) = fixture(dir.path());
    let patch = dir.path().join("p.sdiff");

    let out = run(&[&"--json", &"create", &"-n", &new, &"-o", &old, &patch]);
    assert!(out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("\"command\": \"create\""), "{stderr}");
    assert!(stderr.contains("\"new_size\""));
}

#[test]
fn cli_config_works() {
    let out = Command::new(bin()).arg("config").output().unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("DEFAULT_LOOKAHEAD=32"));
}
