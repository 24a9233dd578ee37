use httpmock::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const AISN_VARS: &[&str] = &[
    "AISN_MODEL",
    "AISN_OLLAMA_HOST",
    "AISN_OPENAI_API_KEY",
    "AISN_OPENAI_BASE_URL",
    "AISN_OPENAI_MODEL",
    "AISN_TIMEOUT_SECS",
    "AISN_MAX_CHARS",
    "OLLAMA_HOST",
    "OPENAI_API_KEY",
    "RUST_LOG",
];

fn create_screenshot(dir: &Path, name: &str, format: image::ImageFormat) -> PathBuf {
    let path = dir.join(name);
    image::RgbImage::from_pixel(24, 16, image::Rgb([10, 120, 200]))
        .save_with_format(&path, format)
        .unwrap();
    path
}

/// Run `aisn` with a clean environment and an empty home directory.
fn run_aisn(home: &Path, envs: &[(&str, &str)], args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_aisn"));
    for var in AISN_VARS {
        cmd.env_remove(var);
    }
    cmd.env("HOME", home).env("NO_COLOR", "1");
    for (key, value) in envs {
        cmd.env(key, value);
    }
    cmd.args(args).output().unwrap()
}

#[test]
fn test_per_file_failure_still_exits_zero() {
    let home = TempDir::new().unwrap();
    let shots = TempDir::new().unwrap();
    let first = create_screenshot(shots.path(), "first.png", image::ImageFormat::Png);
    let middle = create_screenshot(shots.path(), "middle.jpg", image::ImageFormat::Jpeg);
    let last = create_screenshot(shots.path(), "last.png", image::ImageFormat::Png);

    let server = MockServer::start();
    // JPEG payloads base64-encode to "/9j/", PNG payloads to "iVBORw0KGgo".
    server.mock(|when, then| {
        when.method(POST)
            .path("/api/chat")
            .body_contains("\"images\":[\"/9j/");
        then.status(503).body("model is loading");
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/api/chat")
            .body_contains("\"images\":[\"iVBORw0KGgo");
        then.status(200).json_body(serde_json::json!({
            "message": { "role": "assistant", "content": "kept_going" }
        }));
    });

    let output = run_aisn(
        home.path(),
        &[("AISN_OLLAMA_HOST", server.base_url().as_str())],
        &[
            "--do-rename",
            "--no-ocr",
            first.to_str().unwrap(),
            middle.to_str().unwrap(),
            last.to_str().unwrap(),
        ],
    );

    assert!(
        output.status.success(),
        "status {:?}, stderr: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("middle.jpg"));
    assert!(middle.exists());
    assert!(!first.exists());
    assert!(!last.exists());
    assert!(shots.path().join("kept_going.png").exists());
    assert!(shots.path().join("kept_going-1.png").exists());
}

#[test]
fn test_hosted_mode_without_key_exits_before_touching_files() {
    let home = TempDir::new().unwrap();
    let shots = TempDir::new().unwrap();
    let shot = create_screenshot(shots.path(), "Screenshot.png", image::ImageFormat::Png);
    let before = fs::read(&shot).unwrap();

    let output = run_aisn(
        home.path(),
        &[],
        &["--use-openai", "--do-rename", "--no-ocr", shot.to_str().unwrap()],
    );

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("API key"));
    assert_eq!(fs::read(&shot).unwrap(), before);
    assert_eq!(fs::read_dir(shots.path()).unwrap().count(), 1);
}

#[test]
fn test_missing_arguments_is_usage_error() {
    let home = TempDir::new().unwrap();
    let output = run_aisn(home.path(), &[], &[]);
    assert!(!output.status.success());
}
