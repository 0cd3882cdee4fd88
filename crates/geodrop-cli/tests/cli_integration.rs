//! CLI Integration Tests
//!
//! These tests verify the CLI commands work correctly end-to-end.
//! They test the "wiring" between the CLI and the core library.

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

const CODENAME: &str = "amber heron quarry tide velvet anchor lantern moss";

/// Temporary data directory plus a config file with cheap KDF parameters.
struct TestEnv {
    data_dir: TempDir,
    config: PathBuf,
}

impl TestEnv {
    fn new() -> Self {
        let data_dir = TempDir::new().unwrap();
        let config = data_dir.path().join("fast-kdf.json");
        fs::write(
            &config,
            r#"{"kdf": {"memory_kib": 8, "iterations": 1, "parallelism": 1}}"#,
        )
        .unwrap();
        Self { data_dir, config }
    }

    /// Environment with a journalist keypair already generated
    fn with_journalist() -> Self {
        let env = Self::new();
        env.cmd()
            .args(["journalist", "keygen"])
            .assert()
            .success();
        env
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("geodrop").expect("Failed to find geodrop binary");
        cmd.arg("--data-dir")
            .arg(self.data_dir.path())
            .arg("--config")
            .arg(&self.config);
        cmd
    }

    fn path(&self, name: &str) -> PathBuf {
        self.data_dir.path().join(name)
    }

    fn stdout(&self, args: &[&str]) -> String {
        let output = self.cmd().args(args).output().unwrap();
        assert!(
            output.status.success(),
            "{:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).unwrap()
    }

    fn create_source(&self, codename: &str) {
        self.cmd()
            .args(["source", "create", "--codename", codename])
            .assert()
            .success()
            .stdout(predicate::str::contains("Codename registered."));
    }

    /// The only source ID listed by `journalist sources`
    fn single_source_id(&self) -> String {
        let output = self.stdout(&["journalist", "sources"]);
        let ids: Vec<&str> = output
            .lines()
            .filter_map(|line| line.strip_prefix("  "))
            .collect();
        assert_eq!(ids.len(), 1, "expected one source in: {}", output);
        ids[0].trim().to_string()
    }
}

/// Extract ID from CLI output (assumes format: "  ID: <id>")
fn extract_id(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.strip_prefix("  ID: "))
        .map(|id| id.trim().to_string())
}

/// Names listed by `journalist submissions`, with their kind
fn submission_names(output: &str) -> Vec<(String, String)> {
    output
        .lines()
        .filter(|line| line.starts_with("  "))
        .filter_map(|line| {
            let mut parts = line.split_whitespace().skip(2);
            Some((parts.next()?.to_string(), parts.next()?.to_string()))
        })
        .collect()
}

// ============================================================================
// Codename Command Tests
// ============================================================================

#[test]
fn test_codename_generate_default_length() {
    let env = TestEnv::new();
    let output = env.stdout(&["codename", "generate"]);
    assert_eq!(output.trim().split(' ').count(), 8);
}

#[test]
fn test_codename_generate_word_bounds() {
    let env = TestEnv::new();
    let output = env.stdout(&["codename", "generate", "--words", "10"]);
    assert_eq!(output.trim().split(' ').count(), 10);

    env.cmd()
        .args(["codename", "generate", "--words", "11"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid codename"));
}

// ============================================================================
// Journalist Key Tests
// ============================================================================

#[test]
fn test_source_commands_need_journalist_key() {
    let env = TestEnv::new();
    env.cmd()
        .args(["source", "create", "--codename", CODENAME])
        .assert()
        .failure()
        .stderr(predicate::str::contains("geodrop journalist keygen"));
}

#[test]
fn test_unreadable_journalist_key_gets_hint() {
    let env = TestEnv::with_journalist();
    fs::write(env.path("journalist.pub.asc"), "not a key").unwrap();
    env.cmd()
        .args(["source", "create", "--codename", CODENAME])
        .assert()
        .failure()
        .stderr(predicate::str::contains("geodrop journalist keygen"));
}

#[test]
fn test_other_startup_failures_skip_key_hint() {
    let env = TestEnv::with_journalist();
    let blocker = env.path("blocker");
    fs::write(&blocker, "").unwrap();
    fs::write(
        &env.config,
        serde_json::json!({
            "kdf": {"memory_kib": 8, "iterations": 1, "parallelism": 1},
            "geodata_dir": blocker.join("geodata"),
        })
        .to_string(),
    )
    .unwrap();

    env.cmd()
        .args(["source", "create", "--codename", CODENAME])
        .assert()
        .failure()
        .stderr(predicate::str::contains("geodrop journalist keygen").not());
}

#[test]
fn test_keygen_writes_keys_once() {
    let env = TestEnv::new();
    env.cmd()
        .args(["journalist", "keygen"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Journalist keypair generated."))
        .stdout(predicate::str::contains("Fingerprint:"));

    let public = fs::read_to_string(env.path("journalist.pub.asc")).unwrap();
    assert!(public.contains("-----BEGIN GEODROP PUBLIC KEY-----"));
    assert!(env.path("journalist.sec.asc").exists());

    // Without --force nothing is replaced
    env.cmd()
        .args(["journalist", "keygen"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--force"));
    assert_eq!(
        fs::read_to_string(env.path("journalist.pub.asc")).unwrap(),
        public
    );
}

#[test]
fn test_export_key() {
    let env = TestEnv::with_journalist();
    let public = fs::read_to_string(env.path("journalist.pub.asc")).unwrap();

    env.cmd()
        .args(["journalist", "export-key"])
        .assert()
        .success()
        .stdout(predicate::str::diff(public.clone()));

    let out = TempDir::new().unwrap();
    env.cmd()
        .args(["journalist", "export-key", "--out"])
        .arg(out.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("application/x-geodrop-key"));
    assert_eq!(
        fs::read_to_string(out.path().join("journalist.asc")).unwrap(),
        public
    );
}

// ============================================================================
// Source Command Tests
// ============================================================================

#[test]
fn test_create_generates_codename() {
    let env = TestEnv::with_journalist();
    let output = env.stdout(&["source", "create"]);
    assert!(output.contains("Your codename:"));
    assert!(output.contains("Codename registered."));

    let codename = output
        .lines()
        .map(str::trim)
        .find(|line| line.split(' ').count() == 8)
        .expect("codename line")
        .to_string();
    env.cmd()
        .args(["source", "login", "--codename", &codename])
        .assert()
        .success()
        .stdout(predicate::str::contains("Welcome back."));
}

#[test]
fn test_login_unknown_codename() {
    let env = TestEnv::with_journalist();
    env.cmd()
        .args(["source", "login", "--codename", "nobody registered this"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No submissions found"));
}

#[test]
fn test_submit_message_and_point() {
    let env = TestEnv::with_journalist();
    env.create_source(CODENAME);

    env.cmd()
        .args(["source", "submit", "--codename", CODENAME])
        .args(["--msg", "gate", "--lat", "40.7N", "--lng", "74.0W"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Thanks! We received your message."))
        .stdout(predicate::str::contains("Thanks! We mapped your point."));

    env.cmd()
        .args(["source", "lookup", "--codename", CODENAME])
        .assert()
        .success()
        .stdout(predicate::str::contains("No replies."))
        .stdout(predicate::str::contains(
            "Map extent: -84.0000,30.7000 .. -64.0000,50.7000",
        ))
        .stdout(predicate::str::contains("[1] gate"));
}

#[test]
fn test_submit_bad_coordinate_stores_nothing() {
    let env = TestEnv::with_journalist();
    env.create_source(CODENAME);

    env.cmd()
        .args(["source", "submit", "--codename", CODENAME])
        .args(["--msg", "lost", "--lat", "95N", "--lng", "10E"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nothing was stored."));

    let id = env.single_source_id();
    env.cmd()
        .args(["journalist", "submissions", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("No submissions."));
}

#[test]
fn test_submit_files() {
    let env = TestEnv::with_journalist();
    env.create_source(CODENAME);

    let uploads = TempDir::new().unwrap();
    let geojson = uploads.path().join("depots.geojson");
    fs::write(
        &geojson,
        r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [10, 50]},
             "properties": {"msg": "depot"}}
        ]}"#,
    )
    .unwrap();
    let notes = uploads.path().join("notes.txt");
    fs::write(&notes, "shipping manifests").unwrap();

    env.cmd()
        .args(["source", "submit", "--codename", CODENAME, "--file"])
        .arg(&geojson)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Thanks! We mapped data from 'depots.geojson'.",
        ));
    env.cmd()
        .args(["source", "submit", "--codename", CODENAME, "--file"])
        .arg(&notes)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Thanks! We stored your document 'notes.txt' for review.",
        ));

    env.cmd()
        .args(["source", "lookup", "--codename", CODENAME])
        .assert()
        .success()
        .stdout(predicate::str::contains("[1] depot"));

    // Documents are only opened to a file
    let id = env.single_source_id();
    let listing = env.stdout(&["journalist", "submissions", &id]);
    let documents: Vec<String> = submission_names(&listing)
        .into_iter()
        .filter(|(kind, _)| kind == "document")
        .map(|(_, name)| name)
        .collect();
    assert_eq!(documents.len(), 2);

    let secret = env.path("journalist.sec.asc");
    env.cmd()
        .args(["journalist", "open", &id, &documents[0], "--secret-key"])
        .arg(&secret)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--out"));

    let out = uploads.path().join("opened.zip");
    env.cmd()
        .args(["journalist", "open", &id, &documents[0], "--secret-key"])
        .arg(&secret)
        .arg("--out")
        .arg(&out)
        .assert()
        .success();
    assert!(fs::read(&out).unwrap().starts_with(b"PK"));
}

#[test]
fn test_delete_unknown_reply() {
    let env = TestEnv::with_journalist();
    env.create_source(CODENAME);

    env.cmd()
        .args(["source", "delete-reply", "--codename", CODENAME, "reply-nope.sealed"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Reply not found"));
}

// ============================================================================
// Reply Loop
// ============================================================================

#[test]
fn test_flag_reply_read_delete() {
    let env = TestEnv::with_journalist();
    env.create_source(CODENAME);
    env.cmd()
        .args(["source", "submit", "--codename", CODENAME])
        .args(["--msg", "the permits were forged"])
        .assert()
        .success();

    let id = env.single_source_id();
    let listing = env.stdout(&["journalist", "submissions", &id]);
    let names = submission_names(&listing);
    assert_eq!(names.len(), 1);
    assert_eq!(names[0].0, "message");

    env.cmd()
        .args(["journalist", "open", &id, &names[0].1, "--secret-key"])
        .arg(env.path("journalist.sec.asc"))
        .assert()
        .success()
        .stdout(predicate::str::contains("the permits were forged"));

    // No reply key until the source looks up after being flagged
    env.cmd()
        .args(["journalist", "reply", &id, "too early"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no reply key yet"));

    env.cmd()
        .args(["journalist", "flag", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Source flagged for reply."));
    env.cmd()
        .args(["source", "lookup", "--codename", CODENAME])
        .assert()
        .success();

    let output = env.stdout(&["journalist", "reply", &id, "Can you share the permit numbers?"]);
    let reply_id = extract_id(&output).expect("reply id");

    env.cmd()
        .args(["source", "lookup", "--codename", CODENAME])
        .assert()
        .success()
        .stdout(predicate::str::contains("Replies (1):"))
        .stdout(predicate::str::contains(reply_id.as_str()))
        .stdout(predicate::str::contains("Can you share the permit numbers?"));

    env.cmd()
        .args(["source", "delete-reply", "--codename", CODENAME, &reply_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reply deleted."));
    env.cmd()
        .args(["source", "lookup", "--codename", CODENAME])
        .assert()
        .success()
        .stdout(predicate::str::contains("No replies."));
}

#[test]
fn test_journalist_rejects_bad_source_ids() {
    let env = TestEnv::with_journalist();

    env.cmd()
        .args(["journalist", "submissions", "not-hex"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid source ID"));

    let unknown = "0".repeat(64);
    env.cmd()
        .args(["journalist", "flag", &unknown])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Source not found"));
}

// ============================================================================
// Story Command Tests
// ============================================================================

#[test]
fn test_story_list_and_map() {
    let env = TestEnv::with_journalist();

    env.cmd()
        .args(["story", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No stories published."));

    let story = env.path("stories").join("river-spill");
    fs::create_dir_all(&story).unwrap();
    fs::write(
        story.join("river-spill.geojson"),
        r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": {"type": "LineString", "coordinates": [[10, 50], [12, 52]]},
             "properties": {"sort_id": 1, "msg": "outflow"}}
        ]}"#,
    )
    .unwrap();

    env.cmd()
        .args(["story", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("river-spill"));
    env.cmd()
        .args(["story", "map", "river-spill"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Map extent: 9.9000,49.9000 .. 12.1000,52.1000"))
        .stdout(predicate::str::contains("[1] outflow"));
}
