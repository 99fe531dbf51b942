//! Concurrency tests for the recall binary.
//!
//! These tests verify that multiple processes can safely:
//! - Append to the WALs simultaneously (file locking)
//! - Read the deck while it is being rewritten
//! - Perform rollup operations without corruption

use assert_cmd::Command;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("recall"))
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn add_cards(data_dir: &Path, count: usize) {
    for i in 0..count {
        cli()
            .arg("add")
            .arg("--front")
            .arg(format!("front {}", i))
            .arg("--back")
            .arg(format!("back {}", i))
            .arg("--id")
            .arg(format!("card_{}", i))
            .arg("--data-dir")
            .arg(data_dir)
            .arg("--at")
            .arg("2024-09-01T10:00:00Z")
            .assert()
            .success();
    }
}

/// Review at `at`, one card per run
fn review_one(data_dir: &Path, at: &str) {
    cli()
        .arg("review")
        .arg("--auto")
        .arg("good")
        .arg("--limit")
        .arg("1")
        .arg("--data-dir")
        .arg(data_dir)
        .arg("--at")
        .arg(at)
        .timeout(Duration::from_secs(10))
        .assert()
        .success();
}

fn assert_jsonl_valid(path: &Path) -> usize {
    let content = std::fs::read_to_string(path).expect("Failed to read WAL");
    let mut valid_count = 0;
    for line in content.lines() {
        if line.is_empty() {
            continue;
        }
        let parsed: Result<serde_json::Value, _> = serde_json::from_str(line);
        assert!(parsed.is_ok(), "WAL contains invalid JSON line: {}", line);
        valid_count += 1;
    }
    valid_count
}

#[test]
fn test_sequential_sessions_all_logged() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    add_cards(&data_dir, 5);

    // Runs with slight delays (more realistic than thundering herd)
    for i in 0..5 {
        thread::sleep(Duration::from_millis(i * 5));
        review_one(&data_dir, "2024-09-01T10:00:00Z");
    }

    let session_count = assert_jsonl_valid(&data_dir.join("wal/sessions.wal"));
    assert_eq!(
        session_count, 5,
        "Expected 5 sessions, got {}",
        session_count
    );
    assert_eq!(assert_jsonl_valid(&data_dir.join("wal/review_events.wal")), 5);
}

#[test]
fn test_concurrent_reads_and_writes() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    add_cards(&data_dir, 4);

    // Readers run while a writer rewrites the deck
    let readers: Vec<_> = (0..4)
        .map(|i| {
            let data_dir = data_dir.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(i * 3));
                cli()
                    .arg("due")
                    .arg("--data-dir")
                    .arg(&data_dir)
                    .arg("--at")
                    .arg("2024-09-01T10:00:00Z")
                    .timeout(Duration::from_secs(10))
                    .assert()
                    .success();
            })
        })
        .collect();

    for _ in 0..4 {
        review_one(&data_dir, "2024-09-01T10:00:00Z");
    }

    for handle in readers {
        handle.join().expect("Reader thread panicked");
    }

    let deck = std::fs::read_to_string(data_dir.join("deck.json")).expect("Failed to read deck");
    let parsed: serde_json::Value = serde_json::from_str(&deck).expect("Deck is invalid JSON");
    let learning = parsed["cards"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|c| c["scheduling"]["state"] == "learning")
        .count();
    assert_eq!(learning, 4);
}

#[test]
fn test_rollup_while_writing() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    add_cards(&data_dir, 5);
    for _ in 0..3 {
        review_one(&data_dir, "2024-09-01T10:00:00Z");
    }

    // Start rollup in background
    let data_dir_rollup = data_dir.clone();
    let rollup_handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(10));
        cli()
            .arg("rollup")
            .arg("--data-dir")
            .arg(&data_dir_rollup)
            .assert()
            .success();
    });

    // Write more events while rollup might be running
    for _ in 0..2 {
        review_one(&data_dir, "2024-09-01T10:00:00Z");
        thread::sleep(Duration::from_millis(5));
    }

    rollup_handle.join().expect("Rollup thread panicked");

    let csv_path = data_dir.join("review_events.csv");
    assert!(csv_path.exists());

    // Every event lands in exactly one of the CSV or the live WAL
    let csv_content = std::fs::read_to_string(&csv_path).expect("Failed to read CSV");
    let csv_rows = csv_content.lines().count().saturating_sub(1);
    let wal_path = data_dir.join("wal/review_events.wal");
    let wal_rows = if wal_path.exists() {
        assert_jsonl_valid(&wal_path)
    } else {
        0
    };
    assert!(csv_rows >= 3);
    assert_eq!(csv_rows + wal_rows, 5);
}

#[test]
fn test_no_wal_corruption_under_load() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    add_cards(&data_dir, 10);

    // Hammer the CLI with concurrent reviews
    let handles: Vec<_> = (0..10)
        .map(|i| {
            let data_dir = data_dir.clone();
            thread::spawn(move || {
                // Small stagger to reduce thundering herd
                thread::sleep(Duration::from_millis(i * 5));
                review_one(&data_dir, "2024-09-01T10:00:00Z");
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    // Give filesystem a moment to settle
    thread::sleep(Duration::from_millis(100));

    // Racing writers may pick the same card, but every line stays whole
    let events = assert_jsonl_valid(&data_dir.join("wal/review_events.wal"));
    let sessions = assert_jsonl_valid(&data_dir.join("wal/sessions.wal"));
    assert_eq!(sessions, 10, "Expected 10 valid sessions in WAL");
    assert_eq!(events, 10);

    let deck = std::fs::read_to_string(data_dir.join("deck.json")).expect("Failed to read deck");
    let parsed: Result<serde_json::Value, _> = serde_json::from_str(&deck);
    assert!(parsed.is_ok(), "Deck file contains invalid JSON");
}
