//! End-to-end CLI tests for the pricewatch binary.
//!
//! Every test runs in its own temp dir so no `pricewatch.toml` or database
//! from the checkout is picked up.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn pricewatch(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("pricewatch").unwrap();
    cmd.current_dir(dir.path()).env_remove("RUST_LOG");
    cmd
}

const CATALOG_JSON: &str = r#"[
  {
    "name": "Pokemon Base Set",
    "cards": [
      { "id": "101:Normal", "card": "Charizard #4", "price": 350.0 },
      { "id": "102:Normal", "card": "Blastoise #2", "price": "$120.00" },
      { "price": 5.0 }
    ]
  },
  {
    "name": "Pokemon Jungle",
    "cards": [{ "card": "Snorlax #11", "price": 40.0 }]
  }
]"#;

// ==================== Basic invocation ====================

#[test]
fn test_binary_help_displays_usage() {
    let dir = TempDir::new().unwrap();
    pricewatch(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Scrape graded card sales"))
        .stdout(predicate::str::contains("resync"))
        .stdout(predicate::str::contains("process"));
}

#[test]
fn test_binary_version_displays_version() {
    let dir = TempDir::new().unwrap();
    pricewatch(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pricewatch"));
}

#[test]
fn test_binary_without_subcommand_fails() {
    let dir = TempDir::new().unwrap();
    pricewatch(&dir)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_binary_invalid_flag_returns_error() {
    let dir = TempDir::new().unwrap();
    pricewatch(&dir)
        .arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_process_rejects_out_of_range_workers() {
    let dir = TempDir::new().unwrap();
    pricewatch(&dir)
        .args(["process", "--workers", "9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("9"));
}

// ==================== Config ====================

#[test]
fn test_config_show_prints_defaults_without_file() {
    let dir = TempDir::new().unwrap();
    pricewatch(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config_file = not found (using defaults)"))
        .stdout(predicate::str::contains("sync.workers = 3"))
        .stdout(predicate::str::contains("pricing.half_life_days = 21"));
}

#[test]
fn test_config_show_reads_local_file_and_db_override() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("pricewatch.toml"),
        "[sync]\nworkers = 2\n\n[pricing]\neligibility_threshold = 25.0\n",
    )
    .unwrap();

    pricewatch(&dir)
        .args(["--db", "other.db", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config_file = loaded"))
        .stdout(predicate::str::contains("sync.workers = 2"))
        .stdout(predicate::str::contains("pricing.eligibility_threshold = 25"))
        .stdout(predicate::str::contains("database.path = other.db"));
}

#[test]
fn test_invalid_config_value_fails() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("pricewatch.toml"), "[sync]\nworkers = 12\n").unwrap();

    pricewatch(&dir)
        .args(["config", "show"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("workers"));
}

#[test]
fn test_missing_explicit_config_fails() {
    let dir = TempDir::new().unwrap();
    pricewatch(&dir)
        .args(["--config", "absent.toml", "config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.toml"));
}

// ==================== Catalog data ====================

#[test]
fn test_import_resync_and_export_round_trip() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("catalog.json"), CATALOG_JSON).unwrap();

    pricewatch(&dir)
        .args(["--db", "cards.db", "import", "catalog.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Imported 3 cards into 2 sets (1 entries skipped)",
        ));

    pricewatch(&dir)
        .args(["--db", "cards.db", "resync", "--threshold", "100"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Queued 2 of 2 eligible cards"));

    pricewatch(&dir)
        .args(["--db", "cards.db", "export", "export.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 3 cards in 2 sets"));

    let exported: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("export.json")).unwrap())
            .unwrap();
    let sets = exported.as_array().unwrap();
    assert_eq!(sets.len(), 2);
    let base = sets
        .iter()
        .find(|set| set["name"] == "Pokemon Base Set")
        .unwrap();
    let charizard = base["cards"]
        .as_array()
        .unwrap()
        .iter()
        .find(|card| card["id"] == "101:Normal")
        .unwrap();
    assert_eq!(charizard["card"], "Charizard #4");
    assert_eq!(charizard["price"], 350.0);
}

#[test]
fn test_process_on_empty_queue_reports_nothing_queued() {
    let dir = TempDir::new().unwrap();
    pricewatch(&dir)
        .args(["--db", "empty.db", "process"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing queued"));
}

#[test]
fn test_scrape_unknown_item_exits_with_failure() {
    let dir = TempDir::new().unwrap();
    pricewatch(&dir)
        .args(["--db", "empty.db", "--no-delay", "scrape", "404:Normal"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("item not found"));
}

#[test]
fn test_import_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    pricewatch(&dir)
        .args(["--db", "cards.db", "import", "missing.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.json"));
}
