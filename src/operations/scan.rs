use crate::collision::{self, PathKind};
use crate::config::Config;
use crate::error::{TidyError, TidyResult};
use crate::logger;
use crate::metadata::ItemMetadata;
use crate::naming;
use crate::stats::LibraryStats;
use crate::utils;
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub struct ScanOptions {
    pub root: PathBuf,
    pub show_progress: bool,
    pub verbose: bool,
    pub config: Config,
}

/// One media file's planned rename
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileMove {
    pub from: PathBuf,
    pub to: PathBuf,
}

impl FileMove {
    /// Whether the file name itself changes
    pub fn name_changed(&self) -> bool {
        self.from.file_name() != self.to.file_name()
    }
}

/// Planned reorganization of one item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookMove {
    pub title: String,
    pub old_dir: PathBuf,
    pub target_dir: PathBuf,
    pub move_plan: Vec<FileMove>,
    pub folder_changed: bool,
}

impl BookMove {
    pub fn new(title: String, old_dir: PathBuf, target_dir: PathBuf, move_plan: Vec<FileMove>) -> Self {
        let folder_changed = !same_location(&old_dir, &target_dir);
        Self {
            title,
            old_dir,
            target_dir,
            move_plan,
            folder_changed,
        }
    }

    pub fn files_changed(&self) -> usize {
        self.move_plan.iter().filter(|f| f.name_changed()).count()
    }

    /// Nothing to do: folder and every file already canonical
    pub fn is_noop(&self) -> bool {
        !self.folder_changed && self.files_changed() == 0
    }
}

/// Compare resolved locations; falls back to the literal paths when either side
/// does not exist yet
pub fn same_location(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(ca), Ok(cb)) => ca == cb,
        _ => a == b,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedItem {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug)]
pub struct ScanResult {
    pub root: PathBuf,
    pub moves: Vec<BookMove>,
    pub stats: LibraryStats,
    pub skipped: Vec<SkippedItem>,
    pub warnings: Vec<String>,
}

impl ScanResult {
    pub fn print_summary(&self) {
        logger::plain("\nScan Summary:");
        logger::plain(&format!("  Books read: {}", self.stats.books));
        logger::plain(&format!("  Changes needed: {}", self.moves.len()));
        if !self.skipped.is_empty() {
            logger::warning(&format!("  Skipped: {}", self.skipped.len()));
            for item in &self.skipped {
                logger::plain(&format!("    - {}: {}", item.path.display(), item.reason));
            }
        }
        if !self.warnings.is_empty() {
            logger::warning(&format!("  Warnings: {}", self.warnings.len()));
        }
    }
}

enum ItemOutcome {
    Planned {
        metadata: ItemMetadata,
        book_move: Option<BookMove>,
        warnings: Vec<String>,
    },
    Skipped(SkippedItem),
}

impl ItemOutcome {
    fn metadata(&self) -> Option<&ItemMetadata> {
        match self {
            ItemOutcome::Planned { metadata, .. } => Some(metadata),
            ItemOutcome::Skipped(_) => None,
        }
    }
}

/// Scan a library root and plan moves for every item whose layout differs from
/// the canonical one. Read-only.
pub fn run(options: &ScanOptions) -> TidyResult<ScanResult> {
    let config = &options.config;
    config.naming.validate()?;

    if !options.root.is_dir() {
        return Err(TidyError::InvalidRoot {
            path: options.root.clone(),
        });
    }
    let root = options
        .root
        .canonicalize()
        .map_err(|e| TidyError::io(&options.root, e))?;

    logger::stage("Scanning library for items to tidy");
    logger::info(&format!("Library root: {}", root.display()));

    let mut warnings = Vec::new();
    let (items, mut skipped) = discover_items(&root, config, &mut warnings)?;
    logger::info(&format!("Found {} items", items.len()));

    let pb = if options.show_progress {
        ProgressBar::new(items.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40}] {pos}/{len} ({eta}) | Reading metadata...")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░"),
    );

    let work = || -> (Vec<ItemOutcome>, LibraryStats) {
        let outcomes: Vec<ItemOutcome> = items
            .par_iter()
            .progress_with(pb.clone())
            .map(|dir| plan_item(dir, &root, config))
            .collect();

        let stats = outcomes
            .par_iter()
            .filter_map(ItemOutcome::metadata)
            .fold(LibraryStats::new, |mut acc, meta| {
                acc.add(meta);
                acc
            })
            .reduce(LibraryStats::new, LibraryStats::merge);

        (outcomes, stats)
    };

    let (outcomes, stats) = if config.general.threads > 0 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.general.threads)
            .build()
            .map_err(|e| TidyError::ConfigError(format!("Failed to build thread pool: {}", e)))?;
        pool.install(work)
    } else {
        work()
    };
    pb.finish_and_clear();

    let mut moves = Vec::new();
    for outcome in outcomes {
        match outcome {
            ItemOutcome::Planned {
                book_move,
                warnings: item_warnings,
                ..
            } => {
                for w in item_warnings {
                    logger::warning(&w);
                    warnings.push(w);
                }
                if let Some(book_move) = book_move {
                    logger::debug(
                        &format!(
                            "Planned: {} -> {}",
                            book_move.old_dir.display(),
                            book_move.target_dir.display()
                        ),
                        options.verbose,
                    );
                    moves.push(book_move);
                }
            }
            ItemOutcome::Skipped(item) => {
                logger::warning(&format!("Skipping {}: {}", item.path.display(), item.reason));
                skipped.push(item);
            }
        }
    }

    let mut targets: BTreeMap<&Path, usize> = BTreeMap::new();
    for m in &moves {
        *targets.entry(m.target_dir.as_path()).or_insert(0) += 1;
    }
    for (target, count) in targets.into_iter().filter(|(_, c)| *c > 1) {
        let w = format!(
            "{} planned moves share target {}; later ones will be disambiguated",
            count,
            target.display()
        );
        logger::warning(&w);
        warnings.push(w);
    }

    Ok(ScanResult {
        root,
        moves,
        stats,
        skipped,
        warnings,
    })
}

/// Item directories under `root` in lexicographic traversal order, plus the
/// top-level folders in which no item was found.
///
/// Items are descended too: a book filed inside another book's folder (a
/// standalone title that matches a series name) is still an item.
fn discover_items(
    root: &Path,
    config: &Config,
    warnings: &mut Vec<String>,
) -> TidyResult<(Vec<PathBuf>, Vec<SkippedItem>)> {
    fs::read_dir(root).map_err(|e| TidyError::io(root, e))?;

    let mut items = Vec::new();
    let mut skipped = Vec::new();

    for child in child_dirs(root, config, warnings) {
        let before = items.len();
        if utils::has_sidecar(&child, &config.scan.sidecar_name) {
            items.push(child.clone());
        }
        descend(&child, 2, config, &mut items, warnings);
        if items.len() == before {
            skipped.push(SkippedItem {
                reason: TidyError::MissingMetadata { path: child.clone() }.to_string(),
                path: child,
            });
        }
    }

    Ok((items, skipped))
}

fn descend(dir: &Path, depth: usize, config: &Config, items: &mut Vec<PathBuf>, warnings: &mut Vec<String>) {
    if depth > config.scan.max_depth {
        return;
    }
    for child in child_dirs(dir, config, warnings) {
        if utils::has_sidecar(&child, &config.scan.sidecar_name) {
            items.push(child.clone());
        }
        descend(&child, depth + 1, config, items, warnings);
    }
}

/// Visible child directories sorted by name, bounded by `max_children_per_dir`
fn child_dirs(dir: &Path, config: &Config, warnings: &mut Vec<String>) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .map(|e| e.path().to_path_buf())
        .collect();

    if let Some(limit) = config.scan.max_children_per_dir {
        if dirs.len() > limit {
            warnings.push(format!(
                "{} has {} subdirectories; only the first {} are scanned",
                dir.display(),
                dirs.len(),
                limit
            ));
            dirs.truncate(limit);
        }
    }
    dirs
}

/// Media files directly inside an item directory, in track order
pub fn media_files(dir: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .map(|e| e.path().to_path_buf())
        .filter(|p| utils::is_media_file(p, extensions))
        .collect();

    files.sort_by(|a, b| {
        let an = a.file_name().unwrap_or_default().to_string_lossy();
        let bn = b.file_name().unwrap_or_default().to_string_lossy();
        utils::natural_cmp(&an, &bn)
    });
    files
}

fn plan_item(dir: &Path, root: &Path, config: &Config) -> ItemOutcome {
    let skip = |err: TidyError| {
        ItemOutcome::Skipped(SkippedItem {
            path: dir.to_path_buf(),
            reason: err.to_string(),
        })
    };

    let metadata = match ItemMetadata::from_dir(dir, &config.scan) {
        Ok(m) => m,
        Err(e) => return skip(e),
    };

    let files = media_files(dir, &config.scan.media_extensions);
    let names: Vec<String> = files
        .iter()
        .map(|p| p.file_name().unwrap_or_default().to_string_lossy().to_string())
        .collect();

    let canonical = match naming::format_names(&metadata, &names, &config.naming) {
        Ok(c) => c,
        Err(e) => return skip(e),
    };

    let mut target_dir = root.join(&canonical.folder);
    if is_disambiguated_copy(dir, &target_dir, config) {
        target_dir = dir.to_path_buf();
    }
    let move_plan = files
        .into_iter()
        .zip(canonical.files)
        .map(|(from, name)| FileMove {
            from,
            to: target_dir.join(name),
        })
        .collect();

    let book_move = BookMove::new(metadata.title.clone(), dir.to_path_buf(), target_dir, move_plan);
    let warnings = canonical
        .warnings
        .iter()
        .map(|w| format!("{}: {}", dir.display(), w))
        .collect();

    ItemOutcome::Planned {
        metadata,
        book_move: (!book_move.is_noop()).then_some(book_move),
        warnings,
    }
}

/// `dir` already sits at a suffixed variant of `target` (e.g. `My Book (1)`)
/// because another item holds the canonical folder
fn is_disambiguated_copy(dir: &Path, target: &Path, config: &Config) -> bool {
    if dir == target || dir.parent() != target.parent() {
        return false;
    }
    if !utils::has_sidecar(target, &config.scan.sidecar_name) || same_location(dir, target) {
        return false;
    }
    let (Some(name), Some(base)) = (dir.file_name(), target.file_name()) else {
        return false;
    };
    collision::suffix_number(
        &name.to_string_lossy(),
        &base.to_string_lossy(),
        PathKind::Folder,
        &config.naming.collision_suffix,
    )
    .is_some()
}

/// Outcome of checking a path before scanning it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryCheck {
    pub valid: bool,
    pub error: Option<String>,
    pub metadata_files: usize,
    pub is_library: bool,
}

/// Check that `path` is a directory and count sidecars anywhere beneath it
pub fn validate_library(path: &Path, config: &Config) -> LibraryCheck {
    let invalid = |msg: &str| LibraryCheck {
        valid: false,
        error: Some(msg.to_string()),
        metadata_files: 0,
        is_library: false,
    };

    if !path.exists() {
        return invalid("Path does not exist");
    }
    if !path.is_dir() {
        return invalid("Path is not a directory");
    }

    let metadata_files = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_string_lossy() == config.scan.sidecar_name.as_str())
        .count();

    LibraryCheck {
        valid: true,
        error: None,
        metadata_files,
        is_library: metadata_files > 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_item(dir: &Path, sidecar: &str, files: &[&str]) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("metadata.json"), sidecar).unwrap();
        for f in files {
            fs::write(dir.join(f), b"audio").unwrap();
        }
    }

    fn options(root: &Path) -> ScanOptions {
        ScanOptions {
            root: root.to_path_buf(),
            show_progress: false,
            verbose: false,
            config: Config::default(),
        }
    }

    #[test]
    fn test_media_files_natural_order() {
        let tmp = tempdir().unwrap();
        for f in ["track10.mp3", "track2.mp3", "track1.mp3", "cover.jpg", ".hidden.mp3"] {
            fs::write(tmp.path().join(f), b"x").unwrap();
        }
        let names: Vec<String> = media_files(tmp.path(), &Config::default().scan.media_extensions)
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["track1.mp3", "track2.mp3", "track10.mp3"]);
    }

    #[test]
    fn test_invalid_root() {
        let tmp = tempdir().unwrap();
        let file = tmp.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        for root in [file, tmp.path().join("missing")] {
            let err = run(&options(&root)).unwrap_err();
            assert!(matches!(err, TidyError::InvalidRoot { .. }));
        }
    }

    #[test]
    fn test_nested_items_and_skips() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        write_item(
            &root.join("Author").join("Book"),
            r#"{"title": "Book", "authors": ["Author"]}"#,
            &["Book - 01.mp3"],
        );
        fs::create_dir_all(root.join("Empty Folder")).unwrap();
        write_item(&root.join("Broken"), r#"{"authors": ["X"]}"#, &["a.mp3"]);
        fs::create_dir_all(root.join(".trash").join("x")).unwrap();

        let result = run(&options(root)).unwrap();
        assert!(result.moves.is_empty());
        assert_eq!(result.stats.books, 1);
        assert_eq!(result.skipped.len(), 2);
        // Folders without any item are found during discovery, before metadata is read
        assert!(result.skipped[0].path.ends_with("Empty Folder"));
        assert!(result.skipped[0].reason.contains("No metadata sidecar"));
        assert!(result.skipped[1].path.ends_with("Broken"));
        assert!(result.skipped[1].reason.contains("title"));
    }

    #[test]
    fn test_item_inside_item_is_found() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        write_item(&root.join("F").join("Dune"), r#"{"title": "Dune", "authors": ["F"]}"#, &[]);
        write_item(
            &root.join("F").join("Dune").join("02 - Messiah"),
            r#"{"title": "Messiah", "authors": ["F"], "series": "Dune #2"}"#,
            &["02 - Messiah - 01.mp3"],
        );
        fs::write(root.join("F").join("Dune").join("Dune - 01.mp3"), b"x").unwrap();

        let result = run(&options(root)).unwrap();
        assert_eq!(result.stats.books, 2);
        assert!(result.skipped.is_empty());
        assert!(result.moves.is_empty(), "unexpected moves: {:?}", result.moves);
    }

    #[test]
    fn test_suffixed_copy_of_existing_item_stays() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        let sidecar = r#"{"title": "Same", "authors": ["A"]}"#;
        write_item(&root.join("A").join("Same"), sidecar, &["Same - 01.mp3"]);
        write_item(&root.join("A").join("Same (1)"), sidecar, &["Same - 01.mp3"]);
        // no canonical item to collide with, so this one is moved
        write_item(&root.join("A").join("Other (1)"), r#"{"title": "Other", "authors": ["A"]}"#, &[]);

        let result = run(&options(root)).unwrap();
        assert_eq!(result.stats.books, 3);
        assert_eq!(result.moves.len(), 1);
        assert!(result.moves[0].old_dir.ends_with("Other (1)"));
        assert!(result.moves[0].target_dir.ends_with("Other"));
    }

    #[test]
    fn test_progress_bar_keeps_plan_order() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        for name in ["c", "a", "b"] {
            write_item(&root.join(name), &format!(r#"{{"title": "{}"}}"#, name), &["x.mp3"]);
        }
        let mut opts = options(root);
        opts.show_progress = true;

        let result = run(&opts).unwrap();
        let titles: Vec<&str> = result.moves.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_shared_targets_are_warned() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        let sidecar = r#"{"title": "Same", "authors": ["A"]}"#;
        write_item(&root.join("one"), sidecar, &["x.mp3"]);
        write_item(&root.join("two"), sidecar, &["y.mp3"]);

        let result = run(&options(root)).unwrap();
        assert_eq!(result.moves.len(), 2);
        assert_eq!(result.moves[0].target_dir, result.moves[1].target_dir);
        assert!(result.warnings.iter().any(|w| w.contains("share target")));
    }

    #[test]
    fn test_max_children_per_dir_bounds_walk() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        for name in ["a", "b", "c"] {
            write_item(&root.join(name), r#"{"title": "T"}"#, &[]);
        }
        let mut opts = options(root);
        opts.config.scan.max_children_per_dir = Some(2);
        let result = run(&opts).unwrap();
        assert_eq!(result.stats.books, 2);
        assert!(result.warnings.iter().any(|w| w.contains("only the first 2")));
    }

    #[test]
    fn test_validate_library() {
        let tmp = tempdir().unwrap();
        let config = Config::default();
        write_item(&tmp.path().join("A").join("B"), r#"{"title": "B"}"#, &[]);

        let ok = validate_library(tmp.path(), &config);
        assert!(ok.valid && ok.is_library);
        assert_eq!(ok.metadata_files, 1);

        let missing = validate_library(&tmp.path().join("nope"), &config);
        assert!(!missing.valid);
        assert_eq!(missing.error.as_deref(), Some("Path does not exist"));
    }
}
