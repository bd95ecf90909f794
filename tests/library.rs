use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use tempfile::tempdir;
use tidyshelf::config::Config;
use tidyshelf::operations::scan::{self, ScanOptions};
use tidyshelf::report::PlanReport;
use tidyshelf::{BookMove, Executor, LibraryStats, ScanResult};
use walkdir::WalkDir;

const MY_BOOK: &str = r#"{"title": "My Book", "authors": ["J. Author"], "duration": 3600}"#;

fn write_item(dir: &Path, sidecar: &str, files: &[(&str, &str)]) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("metadata.json"), sidecar).unwrap();
    for (name, contents) in files {
        fs::write(dir.join(name), contents).unwrap();
    }
}

fn scan_root(root: &Path) -> ScanResult {
    scan::run(&ScanOptions {
        root: root.to_path_buf(),
        show_progress: false,
        verbose: false,
        config: Config::default(),
    })
    .unwrap()
}

fn apply(root: &Path, moves: &[BookMove], dry_run: bool) -> tidyshelf::operations::ExecutionReport {
    Executor::new(root, Config::default())
        .execute_batch(moves, dry_run, &AtomicBool::new(false), |_| {})
        .unwrap()
}

/// Relative path -> contents for every file under `root`
fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap().to_path_buf();
            (rel, fs::read(e.path()).unwrap())
        })
        .collect()
}

fn contents(snapshot: &BTreeMap<PathBuf, Vec<u8>>, log_name: &str) -> Vec<Vec<u8>> {
    let mut all: Vec<Vec<u8>> = snapshot
        .iter()
        .filter(|(p, _)| p.as_os_str() != log_name)
        .map(|(_, c)| c.clone())
        .collect();
    all.sort();
    all
}

#[test]
fn test_messy_item_is_tidied() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    write_item(&root.join("Old Name (2020)"), MY_BOOK, &[("track1.mp3", "audio")]);

    let result = scan_root(&root);
    assert_eq!(result.stats.books, 1);
    assert_eq!(result.stats.formatted_duration(), "1h 0m");
    assert_eq!(result.moves.len(), 1);

    let planned = &result.moves[0];
    assert!(planned.folder_changed);
    assert_eq!(planned.target_dir, root.join("J. Author").join("My Book"));
    assert_eq!(
        planned.move_plan[0].to,
        root.join("J. Author").join("My Book").join("My Book - 01.mp3")
    );

    let report = apply(&root, &result.moves, false);
    assert_eq!(report.applied, 1);
    assert_eq!(report.errors, 0);

    let book = root.join("J. Author").join("My Book");
    assert!(book.join("My Book - 01.mp3").is_file());
    assert!(book.join("metadata.json").is_file());
    assert!(!root.join("Old Name (2020)").exists());

    let log = fs::read_to_string(root.join("tidy_library_log.txt")).unwrap();
    assert!(log.contains("SESSION START"));
    assert!(log.contains("OK:"));
}

#[test]
fn test_tidy_is_idempotent() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    write_item(
        &root.join("dump").join("stuff"),
        r#"{"title": "Dune", "authors": ["Frank Herbert"], "series": [{"name": "Dune", "sequence": "1"}]}"#,
        &[("b.mp3", "two"), ("a.mp3", "one")],
    );
    write_item(&root.join("Old Name (2020)"), MY_BOOK, &[("track1.mp3", "audio")]);

    let first = scan_root(&root);
    assert_eq!(first.moves.len(), 2);
    apply(&root, &first.moves, false);

    let dune = root.join("Frank Herbert").join("Dune").join("01 - Dune");
    assert_eq!(fs::read_to_string(dune.join("01 - Dune - 01.mp3")).unwrap(), "one");
    assert_eq!(fs::read_to_string(dune.join("01 - Dune - 02.mp3")).unwrap(), "two");

    let second = scan_root(&root);
    assert_eq!(second.stats.books, 2);
    assert!(second.moves.is_empty(), "unexpected moves: {:?}", second.moves);
}

#[test]
fn test_plan_is_deterministic() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    for i in 0..8 {
        write_item(
            &root.join(format!("item {}", i)),
            &format!(r#"{{"title": "Book {}", "authors": ["Author {}"]}}"#, i, i % 3),
            &[("part2.mp3", "b"), ("part10.mp3", "c"), ("part1.mp3", "a")],
        );
    }

    let a = PlanReport::new(&scan_root(&root), None).to_json().unwrap();
    let b = PlanReport::new(&scan_root(&root), None).to_json().unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_no_data_loss_with_duplicates() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    write_item(&root.join("copy one"), MY_BOOK, &[("track1.mp3", "first")]);
    write_item(&root.join("copy two"), MY_BOOK, &[("track1.mp3", "second")]);
    let before = snapshot(&root);

    let result = scan_root(&root);
    assert_eq!(result.moves.len(), 2);
    assert!(result.warnings.iter().any(|w| w.contains("share target")));

    let report = apply(&root, &result.moves, false);
    assert_eq!(report.applied, 2);
    assert_eq!(report.disambiguated.len(), 1);

    let author = root.join("J. Author");
    assert!(author.join("My Book").join("My Book - 01.mp3").is_file());
    assert!(author.join("My Book (1)").join("My Book - 01.mp3").is_file());

    let after = snapshot(&root);
    assert_eq!(
        contents(&before, "tidy_library_log.txt"),
        contents(&after, "tidy_library_log.txt")
    );

    // the disambiguated copy is left where it is from now on
    let again = scan_root(&root);
    assert_eq!(again.stats.books, 2);
    assert!(again.moves.is_empty(), "unexpected moves: {:?}", again.moves);
}

#[test]
fn test_book_filed_inside_another_book_stays_visible() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    write_item(
        &root.join("x1"),
        r#"{"title": "Dune", "authors": ["F"], "size": 5}"#,
        &[("dune.mp3", "dune")],
    );
    write_item(
        &root.join("x2"),
        r#"{"title": "Messiah", "authors": ["F"], "series": "Dune #2", "size": 7}"#,
        &[("messiah.mp3", "messiah")],
    );

    let first = scan_root(&root);
    assert_eq!(first.stats.books, 2);
    assert_eq!(first.moves.len(), 2);
    let report = apply(&root, &first.moves, false);
    assert_eq!(report.applied, 2);

    let dune = root.join("F").join("Dune");
    assert!(dune.join("metadata.json").is_file());
    assert!(dune.join("02 - Messiah").join("metadata.json").is_file());

    let second = scan_root(&root);
    assert_eq!(second.stats, first.stats);
    assert!(second.moves.is_empty(), "unexpected moves: {:?}", second.moves);
}

#[test]
fn test_merge_keeps_canonical_file_names() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    fs::create_dir_all(root.join("J. Author").join("My Book")).unwrap();
    write_item(
        &root.join("old"),
        MY_BOOK,
        &[("a.mp3", "a"), ("My Book - 01.mp3", "b")],
    );

    let result = scan_root(&root);
    assert_eq!(result.moves.len(), 1);
    let report = apply(&root, &result.moves, false);
    assert_eq!(report.applied, 1);
    assert!(report.disambiguated.is_empty());

    let book = root.join("J. Author").join("My Book");
    let mut names: Vec<String> = fs::read_dir(&book)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["My Book - 01.mp3", "My Book - 02.mp3", "metadata.json"]);

    assert!(scan_root(&root).moves.is_empty());
}

#[test]
fn test_existing_item_at_target_is_not_overwritten() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    write_item(
        &root.join("J. Author").join("My Book"),
        MY_BOOK,
        &[("My Book - 01.mp3", "already tidy")],
    );
    write_item(&root.join("incoming"), MY_BOOK, &[("track1.mp3", "new copy")]);

    let result = scan_root(&root);
    assert_eq!(result.moves.len(), 1);
    apply(&root, &result.moves, false);

    let author = root.join("J. Author");
    assert_eq!(
        fs::read_to_string(author.join("My Book").join("My Book - 01.mp3")).unwrap(),
        "already tidy"
    );
    assert_eq!(
        fs::read_to_string(author.join("My Book (1)").join("My Book - 01.mp3")).unwrap(),
        "new copy"
    );
}

#[test]
fn test_dry_run_only_touches_the_log() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    write_item(&root.join("Old Name (2020)"), MY_BOOK, &[("track1.mp3", "audio")]);
    write_item(&root.join("other"), MY_BOOK, &[("track1.mp3", "audio 2")]);
    let before = snapshot(&root);

    let result = scan_root(&root);
    let report = apply(&root, &result.moves, true);
    assert_eq!(report.applied, 2);
    // collisions are resolved the same way a real run would
    assert_eq!(report.disambiguated.len(), 1);

    let mut after = snapshot(&root);
    let log = after.remove(Path::new("tidy_library_log.txt")).unwrap();
    assert_eq!(before, after);
    assert!(String::from_utf8(log).unwrap().contains("dry_run=true"));
}

#[test]
fn test_stats_are_additive_across_partitions() {
    let tmp = tempdir().unwrap();
    let base = tmp.path().canonicalize().unwrap();
    let sidecars = [
        r#"{"title": "A", "authors": ["X"], "narrators": ["N1"], "duration": 100, "size": 10}"#,
        r#"{"title": "B", "authors": ["X", "Y"], "series": "Saga #2", "duration": 200, "size": 20}"#,
        r#"{"title": "C", "authors": ["Z"], "narrators": ["N1", "N2"], "duration": 300.5, "size": 30}"#,
        r#"{"title": "D", "series": {"name": "Saga", "sequence": 3}, "size": 40}"#,
    ];

    for (i, sidecar) in sidecars.iter().enumerate() {
        let part = if i < 2 { "left" } else { "right" };
        write_item(&base.join("whole").join(format!("{}", i)), sidecar, &[]);
        write_item(&base.join(part).join(format!("{}", i)), sidecar, &[]);
    }

    let whole = scan_root(&base.join("whole")).stats;
    let merged: LibraryStats = scan_root(&base.join("left"))
        .stats
        .merge(scan_root(&base.join("right")).stats);

    assert_eq!(whole, merged);
    assert_eq!(whole.books, 4);
    assert_eq!(whole.authors.len(), 3);
    assert_eq!(whole.narrators.len(), 2);
    assert_eq!(whole.series.len(), 1);
    assert_eq!(whole.standalone_count, 2);
    assert_eq!(whole.total_size, 100);
}

#[test]
fn test_failed_move_does_not_stop_batch() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    write_item(&root.join("Old Name (2020)"), MY_BOOK, &[("track1.mp3", "audio")]);

    let mut moves = vec![BookMove::new(
        "Ghost".into(),
        root.join("vanished"),
        root.join("Someone").join("Ghost"),
        Vec::new(),
    )];
    moves.extend(scan_root(&root).moves);

    let report = apply(&root, &moves, false);
    assert_eq!(report.processed, 2);
    assert_eq!(report.applied, 1);
    assert_eq!(report.errors, 1);
    assert_eq!(report.failures[0].0, root.join("vanished"));
    assert!(root.join("J. Author").join("My Book").join("My Book - 01.mp3").is_file());

    let log = fs::read_to_string(root.join("tidy_library_log.txt")).unwrap();
    assert!(log.contains("FAILED:"));
    assert!(log.contains("OK:"));
    assert!(log.contains("errors=1"));
}

#[test]
fn test_unreadable_items_are_skipped() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    write_item(&root.join("good"), MY_BOOK, &[("track1.mp3", "audio")]);
    write_item(&root.join("bad"), "{ not json", &[("track1.mp3", "audio")]);

    let result = scan_root(&root);
    assert_eq!(result.stats.books, 1);
    assert_eq!(result.moves.len(), 1);
    assert_eq!(result.skipped.len(), 1);
    assert!(result.skipped[0].path.ends_with("bad"));
}
