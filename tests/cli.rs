//! Drives the compiled `docqa` binary.
//!
//! Only paths that load no models are exercised here, so the suite runs
//! offline: chunk inspection, and the failures that must happen before
//! any model is touched.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn docqa_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("docqa");
    path
}

fn run_docqa(dir: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(docqa_binary())
        .current_dir(dir)
        .args(["--progress", "off"])
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run docqa binary");
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

const CATS: &str = "Cats are mammals. Dogs are mammals too. The sun is a star.";

#[test]
fn test_chunks_on_text_file() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("animals.txt"), CATS).unwrap();

    let (stdout, stderr, success) = run_docqa(
        tmp.path(),
        &["chunks", "animals.txt", "--chunk-size", "30", "--chunk-overlap", "5"],
    );
    assert!(success, "chunks failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("chunk 0"), "{}", stdout);
    assert!(stdout.contains("chunk 2"), "{}", stdout);
    assert!(!stdout.contains("chunk 3"), "{}", stdout);
    assert!(stdout.contains("Cats are mammals."));
    assert!(stderr.contains("3 chunks"), "{}", stderr);
}

#[test]
fn test_chunks_default_size_keeps_short_document_whole() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("notes.md"), CATS).unwrap();

    let (stdout, stderr, success) = run_docqa(tmp.path(), &["chunks", "notes.md"]);
    assert!(success, "stderr={}", stderr);
    assert!(stdout.contains(CATS));
    assert!(stderr.contains("1 chunks"), "{}", stderr);
}

#[test]
fn test_ask_on_empty_file_fails_before_loading_models() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("empty.txt"), "  \n\n ").unwrap();
    // An unreachable embedding backend proves no model was contacted.
    fs::create_dir_all(tmp.path().join("config")).unwrap();
    fs::write(
        tmp.path().join("config/docqa.toml"),
        "[embedding]\nprovider = \"ollama\"\nurl = \"http://127.0.0.1:9\"\nmax_retries = 0\n",
    )
    .unwrap();

    let (stdout, stderr, success) =
        run_docqa(tmp.path(), &["ask", "empty.txt", "What", "is", "this?"]);
    assert!(!success, "ask on empty file should fail: {}", stdout);
    assert!(stderr.contains("document is empty"), "{}", stderr);
    assert!(!stderr.contains("connection error"), "{}", stderr);
}

#[test]
fn test_invalid_pdf_is_extraction_error() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("broken.pdf"), b"not a pdf").unwrap();

    let (_, stderr, success) = run_docqa(tmp.path(), &["chunks", "broken.pdf"]);
    assert!(!success);
    assert!(stderr.contains("text extraction failed"), "{}", stderr);
}

#[test]
fn test_unsupported_extension_is_extraction_error() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("slides.pptx"), b"PK").unwrap();

    let (_, stderr, success) = run_docqa(tmp.path(), &["chunks", "slides.pptx"]);
    assert!(!success);
    assert!(stderr.contains("unsupported content-type"), "{}", stderr);
}

#[test]
fn test_overlap_not_below_size_is_rejected() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("animals.txt"), CATS).unwrap();

    let (_, stderr, success) = run_docqa(
        tmp.path(),
        &["chunks", "animals.txt", "--chunk-size", "10", "--chunk-overlap", "10"],
    );
    assert!(!success);
    assert!(stderr.contains("invalid configuration"), "{}", stderr);
}

#[test]
fn test_explicit_missing_config_is_error() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("animals.txt"), CATS).unwrap();

    let (_, stderr, success) = run_docqa(
        tmp.path(),
        &["--config", "nope.toml", "chunks", "animals.txt"],
    );
    assert!(!success);
    assert!(stderr.contains("nope.toml"), "{}", stderr);
}
