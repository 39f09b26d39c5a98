//! Integration tests for the CLI binary.
//!
//! Each test writes a map file and a config file into a temporary directory
//! (logs go there too) and runs the built `mapengine` binary against them.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

const MAP: &str = "\
[map]
name = demo
extent = 0 0 10 10
size = 64 64

[layer.POINT]
type = point
connection = data/points

[dataset.points]
connection = data/points
fields = FID, FNAME
feature.0 = 1 1 | 1 | A Point
feature.1 = 5 5 | 2 | Another Point
feature.2 = 9 9 | 3 | A Point
";

/// Writes the map and a config that keeps logs inside `temp`.
fn setup(temp: &TempDir) -> (PathBuf, PathBuf) {
    let map = temp.path().join("demo.ini");
    fs::write(&map, MAP).expect("Failed to write map");

    let config = temp.path().join("config.ini");
    let logs = temp.path().join("logs");
    fs::write(
        &config,
        format!(
            "[workers]\nthreads = 4\ncycles = 5\n[logging]\ndirectory = {}\n",
            logs.display()
        ),
    )
    .expect("Failed to write config");
    (map, config)
}

/// Run a CLI command and capture output.
fn run_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mapengine"))
        .args(args)
        .output()
        .expect("Failed to execute CLI command")
}

/// Assert a command succeeded.
fn assert_success(output: &Output, context: &str) {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        panic!("{} failed:\nstdout: {}\nstderr: {}", context, stdout, stderr);
    }
}

fn path(p: &Path) -> &str {
    p.to_str().expect("temp paths are UTF-8")
}

#[test]
fn test_query_prints_matches_and_writes_image() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let (map, config) = setup(&temp);
    let image = temp.path().join("out.png");

    let output = run_cli(&[
        "query",
        "--map",
        path(&map),
        "--config",
        path(&config),
        "--layer",
        "POINT",
        "--field",
        "FNAME",
        "--value",
        "A Point",
        "--output",
        path(&image),
    ]);
    assert_success(&output, "query");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2 matches"), "stdout: {}", stdout);
    assert!(stdout.contains("FID=3"), "stdout: {}", stdout);
    assert!(image.exists(), "PNG should be written");
}

#[test]
fn test_query_unknown_layer_fails() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let (map, config) = setup(&temp);

    let output = run_cli(&[
        "query",
        "--map",
        path(&map),
        "--config",
        path(&config),
        "--layer",
        "rivers",
        "--index",
        "0",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("rivers"), "stderr: {}", stderr);
}

#[test]
fn test_stress_run_is_clean() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let (map, config) = setup(&temp);

    let output = run_cli(&[
        "stress",
        "--map",
        path(&map),
        "--config",
        path(&config),
        "--layer",
        "POINT",
        "--rect",
        "0,0,6,6",
        "--materialize",
        "--envelope-buffers",
    ]);
    assert_success(&output, "stress");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Cycles completed:  20"), "stdout: {}", stdout);
    assert!(stdout.contains("Buffers skipped:   0"), "stdout: {}", stdout);
}

#[test]
fn test_config_show_reflects_file() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let (_map, config) = setup(&temp);

    let output = run_cli(&["config", "show", "--config", path(&config)]);
    assert_success(&output, "config show");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("threads = 4"), "stdout: {}", stdout);
    assert!(stdout.contains("cycles = 5"), "stdout: {}", stdout);
}
