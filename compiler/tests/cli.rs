// End-to-end tests for the `pbind` binary.
//
// Writes interface files to the temp directory, runs the compiled binary,
// and checks stdout, stderr, and the exit code.

use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::atomic::{AtomicUsize, Ordering};

fn pbind_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_pbind"))
}

static COUNTER: AtomicUsize = AtomicUsize::new(0);

fn write_temp(prefix: &str, source: &str) -> PathBuf {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!(
        "pbind_{}_{}_{}.pif",
        prefix,
        std::process::id(),
        n
    ));
    std::fs::write(&path, source).unwrap_or_else(|e| panic!("write {}: {}", path.display(), e));
    path
}

fn run(args: &[&str]) -> Output {
    Command::new(pbind_binary())
        .args(args)
        .env_remove("PBIND_DEBUG")
        .output()
        .expect("failed to run pbind")
}

const BRIGHTEN: &str = "\
param gain: float32
image input: uint8[2]
output result: uint8[2]
gain.set_range(0.0, 8.0)
";

#[test]
fn signature_is_default_emit() {
    let path = write_temp("sig", BRIGHTEN);
    let out = run(&[path.to_str().unwrap(), "--name", "brighten"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["function"], "brighten");
    assert_eq!(json["arguments"].as_array().unwrap().len(), 3);
}

#[test]
fn header_uses_file_stem() {
    let path = write_temp("hdr", BRIGHTEN);
    let stem = path.file_stem().unwrap().to_str().unwrap().to_string();
    let out = run(&[path.to_str().unwrap(), "--emit", "header"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(
        stdout.contains(&format!("int {}(float gain, struct pbind_buffer_t *input", stem)),
        "{}",
        stdout
    );
}

#[test]
fn error_diagnostics_exit_1() {
    let path = write_temp("err", "image im: uint8[2]\nim.set_extent(5, 1)\n");
    let out = run(&[path.to_str().unwrap(), "--emit", "constraints"]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains(":2:1:"), "{}", stderr);
    assert!(
        stderr.contains("Can't set the extent of dimension 5 of ImageParam im, which has 2 dimensions"),
        "{}",
        stderr
    );
    assert!(out.stdout.is_empty());
}

#[test]
fn warnings_print_but_succeed() {
    let path = write_temp("warn", "param k: int32\nk.set_range(3, 1)\n");
    let out = run(&[path.to_str().unwrap(), "--emit", "constraints"]);
    assert!(out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Param k has an empty range [3, 1]"), "{}", stderr);
    assert!(String::from_utf8_lossy(&out.stdout).starts_with("param k: int32"));
}

#[test]
fn missing_file_exits_2() {
    let out = run(&["/nonexistent/pbind/missing.pif"]);
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn show_prints_values_when_bound() {
    let path = write_temp("show", "image im: uint8[2]\nim.bind(4, 3)\nshow im.width() * im.height()\n");
    let out = run(&[path.to_str().unwrap(), "--emit", "show"]);
    assert!(out.status.success());
    assert_eq!(
        String::from_utf8_lossy(&out.stdout),
        "(im.extent.0 * im.extent.1) = 12\n"
    );
}

#[test]
fn explicit_name_becomes_c_identifier() {
    let path = write_temp("name", BRIGHTEN);
    let out = run(&[path.to_str().unwrap(), "--emit", "header", "--name", "my fn"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("#define PBIND_MY_FN_H"), "{}", stdout);
    assert!(stdout.contains("int my_fn(float gain"), "{}", stdout);
}

#[test]
fn oversized_bind_is_a_diagnostic() {
    let path = write_temp("huge", "image im: uint8[2]\nim.bind(100000, 100000)\n");
    let out = run(&[path.to_str().unwrap(), "--emit", "show"]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Buffer im_buffer is larger than the maximum"), "{}", stderr);
}
