use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

fn corpus_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("corpus");
    path
}

const TWEETS_CSV: &str = "Tweet Text,Likes\n\
\"Hello &amp; welcome! #intro @bob https://t.co/x\",3\n\
https://t.co/only,1\n\
\"Second tweet here \u{1F600}\",5\n";

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    let resources = root.join("resources");
    fs::create_dir_all(&resources).unwrap();
    fs::write(resources.join("tweets.csv"), TWEETS_CSV).unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/corpus.sqlite"

[import]
file_paths = ["resource:tweets.csv"]
resource_dirs = ["{root}/resources"]
batch_size = 1000

[extract]
start_page = 1
large_file_threshold_bytes = 52428800
"#,
        root = root.display()
    );

    let config_path = config_dir.join("corpus.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_corpus(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = corpus_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run corpus binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Single-page PDF with one text line per entry of `lines`.
fn minimal_pdf_with_lines(lines: &[&str]) -> Vec<u8> {
    let mut content = String::from("BT /F1 12 Tf 72 720 Td");
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            content.push_str(" 0 -24 Td");
        }
        content.push_str(&format!(" ({}) Tj", line));
    }
    content.push_str(" ET");

    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            content.len(),
            content
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

fn document_id(stdout: &str) -> String {
    stdout
        .lines()
        .find_map(|l| l.strip_prefix("id:"))
        .map(|id| id.trim().to_string())
        .unwrap_or_else(|| panic!("no id in output: {}", stdout))
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_corpus(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/corpus.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_corpus(&config_path, &["init"]);
    assert!(success1, "First init failed");
    let (_, _, success2) = run_corpus(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_corpus(&tmp.path().join("nope.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"), "stderr: {}", stderr);
}

#[test]
fn test_import_configured_resource() {
    let (_tmp, config_path) = setup_test_env();
    run_corpus(&config_path, &["init"]);

    let (stdout, stderr, success) = run_corpus(&config_path, &["import"]);
    assert!(success, "import failed: stdout={}, stderr={}", stdout, stderr);
    assert!(
        stdout.contains("resource:tweets.csv: read 3, saved 2, skipped 1, errors 0"),
        "unexpected output: {}",
        stdout
    );
    assert!(stdout.contains("total: read 3, saved 2, skipped 1, errors 0"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_import_json_with_overrides() {
    let (_tmp, config_path) = setup_test_env();
    run_corpus(&config_path, &["init"]);

    let (stdout, stderr, success) = run_corpus(
        &config_path,
        &["import", "--batch-size", "1", "--keep-hashtags", "--json"],
    );
    assert!(success, "import failed: {}", stderr);

    let result: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["rows_read"], 3);
    assert_eq!(result["rows_saved"], 2);
    assert_eq!(result["options"]["batch_size"], 1);
    assert_eq!(result["options"]["remove_hashtag"], false);
    assert_eq!(result["options"]["remove_mention"], true);
    assert_eq!(result["files_processed"][0]["error_message"], serde_json::Value::Null);
}

#[test]
fn test_import_bad_source_is_isolated() {
    let (tmp, config_path) = setup_test_env();
    run_corpus(&config_path, &["init"]);
    let missing = tmp.path().join("missing.csv");

    let (stdout, stderr, success) = run_corpus(
        &config_path,
        &["import", missing.to_str().unwrap(), "resource:tweets.csv"],
    );
    assert!(success, "import should continue: stderr={}", stderr);
    assert!(stdout.contains("read 0, saved 0, skipped 0, errors 1"));
    assert!(stdout.contains("error: cannot open source"));
    assert!(stdout.contains("total: read 3, saved 2, skipped 1, errors 1"));
}

#[test]
fn test_import_fail_fast_aborts() {
    let (tmp, config_path) = setup_test_env();
    run_corpus(&config_path, &["init"]);
    let missing = tmp.path().join("missing.csv");

    let (stdout, stderr, success) = run_corpus(
        &config_path,
        &["import", "--fail-fast", missing.to_str().unwrap(), "resource:tweets.csv"],
    );
    assert!(!success);
    assert!(stdout.is_empty(), "no result on abort: {}", stdout);
    assert!(stderr.contains("import aborted"), "stderr: {}", stderr);
}

#[test]
fn test_import_missing_column_counts_errors() {
    let (tmp, config_path) = setup_test_env();
    run_corpus(&config_path, &["init"]);
    let other = tmp.path().join("other.csv");
    fs::write(&other, "body,likes\nhello there,1\nagain,2\n").unwrap();

    let (stdout, _, success) = run_corpus(&config_path, &["import", other.to_str().unwrap()]);
    assert!(success);
    assert!(stdout.contains("read 2, saved 0, skipped 0, errors 2"), "output: {}", stdout);
}

#[test]
fn test_clean_from_stdin() {
    let tmp = TempDir::new().unwrap();
    let mut child = Command::new(corpus_binary())
        .arg("--config")
        .arg(tmp.path().join("unused.toml"))
        .arg("clean")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all("Hello &amp; welcome! #intro @bob https://t.co/x".as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "Hello & welcome!\n");
}

#[test]
fn test_extract_and_query_document() {
    let (tmp, config_path) = setup_test_env();
    run_corpus(&config_path, &["init"]);
    let pdf = tmp.path().join("notes.pdf");
    fs::write(
        &pdf,
        minimal_pdf_with_lines(&["Linear Algebra Notes", "The equation x=y holds. Nothing else does."]),
    )
    .unwrap();

    let (stdout, stderr, success) = run_corpus(&config_path, &["extract", pdf.to_str().unwrap()]);
    assert!(success, "extract failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("status:       COMPLETED"), "output: {}", stdout);
    assert!(stdout.contains("pages:        1"));
    let id = document_id(&stdout);

    // Second run returns the stored record
    let (again, _, success) = run_corpus(&config_path, &["extract", pdf.to_str().unwrap()]);
    assert!(success);
    assert_eq!(document_id(&again), id);

    let (docs, _, _) = run_corpus(&config_path, &["docs", "--status", "completed"]);
    assert!(docs.contains(&id));
    assert_eq!(docs.lines().count(), 1);

    let (chunks, _, success) = run_corpus(&config_path, &["chunks", &id]);
    assert!(success);
    assert!(chunks.contains(&format!("[{}:0]", id)), "chunks: {}", chunks);

    let (hits, _, success) = run_corpus(&config_path, &["search", "equation"]);
    assert!(success);
    assert!(hits.contains("[formula]"), "hits: {}", hits);

    let (shown, _, success) = run_corpus(&config_path, &["show", &id]);
    assert!(success);
    assert!(shown.contains("chunks:"));

    let (deleted, _, success) = run_corpus(&config_path, &["delete", &id]);
    assert!(success);
    assert!(deleted.contains("deleted"));
    let (docs, _, _) = run_corpus(&config_path, &["docs"]);
    assert!(docs.contains("No documents."));
}

#[test]
fn test_extract_missing_and_broken_files() {
    let (tmp, config_path) = setup_test_env();
    run_corpus(&config_path, &["init"]);

    let (_, stderr, success) = run_corpus(
        &config_path,
        &["extract", tmp.path().join("absent.pdf").to_str().unwrap()],
    );
    assert!(!success);
    assert!(stderr.contains("file not found"), "stderr: {}", stderr);

    let broken = tmp.path().join("broken.pdf");
    fs::write(&broken, b"definitely not a pdf").unwrap();
    let (_, stderr, success) = run_corpus(&config_path, &["extract", broken.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("failed to parse document"), "stderr: {}", stderr);

    let (docs, _, _) = run_corpus(&config_path, &["docs", "--status", "failed"]);
    assert!(docs.contains("broken.pdf"));
}

#[test]
fn test_unknown_document_id() {
    let (_tmp, config_path) = setup_test_env();
    run_corpus(&config_path, &["init"]);

    let (_, stderr, success) = run_corpus(&config_path, &["show", "no-such-id"]);
    assert!(!success);
    assert!(stderr.contains("document not found"));
}
