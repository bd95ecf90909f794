use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_item(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join("metadata.json"),
        r#"{"title": "My Book", "authors": ["J. Author"], "duration": 3600}"#,
    )
    .unwrap();
    fs::write(dir.join("track1.mp3"), b"audio").unwrap();
}

/// Empty config and a private log file so runs don't depend on the home directory
fn setup(dir: &Path) -> (String, String) {
    let config = dir.join("tidyshelf.toml");
    fs::write(&config, "").unwrap();
    let log = dir.join("session.log");
    (
        config.to_string_lossy().to_string(),
        log.to_string_lossy().to_string(),
    )
}

#[test]
fn help_lists_subcommands() {
    let out = cargo_bin_cmd!("tidyshelf")
        .arg("--help")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8_lossy(&out);
    for sub in ["scan", "apply", "validate", "gen-config"] {
        assert!(text.contains(sub), "help missing '{}'", sub);
    }
}

#[test]
fn gen_config_writes_loadable_toml() {
    let tmp = tempdir().unwrap();
    let (_, log) = setup(tmp.path());
    let output = tmp.path().join("generated.toml");

    cargo_bin_cmd!("tidyshelf")
        .args(["--log-file", &log, "gen-config", "--output"])
        .arg(&output)
        .assert()
        .success();

    let text = fs::read_to_string(&output).unwrap();
    assert!(text.contains("folder_template"));
    assert!(tidyshelf::Config::from_toml_str(&text).is_ok());
}

#[test]
fn validate_reports_metadata_count() {
    let tmp = tempdir().unwrap();
    let (config, log) = setup(tmp.path());
    let lib = tmp.path().join("lib");
    write_item(&lib.join("a"));
    write_item(&lib.join("nested").join("b"));

    cargo_bin_cmd!("tidyshelf")
        .args(["--config", &config, "--log-file", &log, "validate", "--input"])
        .arg(&lib)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 metadata files"));

    cargo_bin_cmd!("tidyshelf")
        .args(["--config", &config, "--log-file", &log, "validate", "--input"])
        .arg(tmp.path().join("missing"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Path does not exist"));
}

#[test]
fn scan_json_prints_plan() {
    let tmp = tempdir().unwrap();
    let (config, log) = setup(tmp.path());
    let lib = tmp.path().join("lib");
    write_item(&lib.join("Old Name (2020)"));

    let out = cargo_bin_cmd!("tidyshelf")
        .args(["--config", &config, "--log-file", &log, "scan", "--json", "--input"])
        .arg(&lib)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let plan: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(plan["stats"]["books"], 1);
    assert_eq!(plan["stats"]["formatted_duration"], "1h 0m");
    assert_eq!(plan["changes_needed"], 1);
    assert_eq!(plan["planned_moves"][0]["old_dir"], "Old Name (2020)");
    assert_eq!(plan["planned_moves"][0]["target_dir"], "J. Author/My Book");
    assert_eq!(
        plan["planned_moves"][0]["file_changes"][0]["new"],
        "My Book - 01.mp3"
    );

    // scanning never touches the library
    assert!(lib.join("Old Name (2020)").join("track1.mp3").exists());
    assert!(!lib.join("tidy_library_log.txt").exists());
}

#[test]
fn scan_rejects_missing_root() {
    let tmp = tempdir().unwrap();
    let (config, log) = setup(tmp.path());

    cargo_bin_cmd!("tidyshelf")
        .args(["--config", &config, "--log-file", &log, "scan", "--input"])
        .arg(tmp.path().join("nowhere"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Operation failed"));
}

#[test]
fn apply_dry_run_leaves_library_alone() {
    let tmp = tempdir().unwrap();
    let (config, log) = setup(tmp.path());
    let lib = tmp.path().join("lib");
    write_item(&lib.join("Old Name (2020)"));

    cargo_bin_cmd!("tidyshelf")
        .args(["--config", &config, "--log-file", &log, "--dry-run", "apply", "--input"])
        .arg(&lib)
        .assert()
        .success()
        .stdout(predicate::str::contains("Tidy (dry run) Summary"));

    assert!(lib.join("Old Name (2020)").join("track1.mp3").exists());
    assert!(!lib.join("J. Author").exists());
    let audit = fs::read_to_string(lib.join("tidy_library_log.txt")).unwrap();
    assert!(audit.contains("dry_run=true"));
}

#[test]
fn apply_with_yes_moves_files() {
    let tmp = tempdir().unwrap();
    let (config, log) = setup(tmp.path());
    let lib = tmp.path().join("lib");
    write_item(&lib.join("Old Name (2020)"));
    write_item(&lib.join("Untouched").join("Copy"));

    // only the first plan entry is applied
    cargo_bin_cmd!("tidyshelf")
        .args(["--config", &config, "--log-file", &log, "apply", "--yes", "--select", "0", "--input"])
        .arg(&lib)
        .assert()
        .success();

    assert!(lib
        .join("J. Author")
        .join("My Book")
        .join("My Book - 01.mp3")
        .is_file());
    assert!(!lib.join("Old Name (2020)").exists());
    assert!(lib.join("Untouched").join("Copy").join("track1.mp3").is_file());

    let session = fs::read_to_string(&log).unwrap();
    assert!(session.contains("Applying 1 planned moves"));
}

#[test]
fn broken_local_config_stops_the_run() {
    let tmp = tempdir().unwrap();
    let (_, log) = setup(tmp.path());
    let lib = tmp.path().join("lib");
    write_item(&lib.join("Old Name (2020)"));
    fs::write(
        tmp.path().join("tidyshelf.toml"),
        "[naming]\nfolder_template = \"{author}/{nope}\"\n",
    )
    .unwrap();

    cargo_bin_cmd!("tidyshelf")
        .current_dir(tmp.path())
        .env("HOME", tmp.path())
        .args(["--log-file", &log, "apply", "--yes", "--input"])
        .arg(&lib)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));

    assert!(lib.join("Old Name (2020)").join("track1.mp3").exists());
    assert!(!lib.join("J. Author").exists());
}
