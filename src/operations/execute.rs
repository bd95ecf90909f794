use crate::audit::{AuditLog, ExecutionLogEntry};
use crate::collision::{CollisionTracker, Disambiguation, PathKind};
use crate::config::Config;
use crate::error::{TidyError, TidyResult};
use crate::logger;
use crate::operations::scan::{same_location, BookMove};
use crate::operations::ExecutionReport;
use crate::utils;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use walkdir::WalkDir;

const TEMP_PREFIX: &str = ".tidy-tmp";

/// Applies planned moves under one library root
#[derive(Debug, Clone)]
pub struct Executor {
    root: PathBuf,
    config: Config,
    verbose: bool,
}

/// What happened (or would happen, in a dry run) for one move
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppliedMove {
    pub final_dir: PathBuf,
    pub folder_moved: bool,
    pub merged: bool,
    pub renamed: Vec<(PathBuf, PathBuf)>,
    pub pruned: Vec<PathBuf>,
}

/// Per-move progress record handed to batch observers
#[derive(Debug, Clone, Serialize)]
pub struct MoveResult {
    pub index: usize,
    pub title: String,
    pub applied: bool,
    pub error: Option<String>,
    pub disambiguated: Vec<Disambiguation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FolderAction {
    Stay,
    Rename,
    Merge,
}

impl Executor {
    pub fn new(root: &Path, config: Config) -> Self {
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        Self {
            root,
            config,
            verbose: false,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Fresh tracker for one batch, using the configured suffix format
    pub fn tracker(&self) -> CollisionTracker {
        CollisionTracker::new(&self.config.naming.collision_suffix)
    }

    /// The library's append-only audit log
    pub fn open_log(&self) -> TidyResult<AuditLog> {
        AuditLog::for_root(&self.root, &self.config.execution.log_file_name)
    }

    /// Apply one move and write exactly one audit entry for it.
    ///
    /// Returns true when the move was applied (or would apply cleanly in a dry
    /// run). A failure only affects this move.
    pub fn execute_move(
        &self,
        book_move: &BookMove,
        log: &AuditLog,
        tracker: &CollisionTracker,
        dry_run: bool,
    ) -> bool {
        self.run_move(book_move, log, tracker, dry_run).is_ok()
    }

    /// Like `execute_move`, keeping the details
    pub fn run_move(
        &self,
        book_move: &BookMove,
        log: &AuditLog,
        tracker: &CollisionTracker,
        dry_run: bool,
    ) -> TidyResult<AppliedMove> {
        let result = self.apply(book_move, tracker, dry_run);

        let entry = match &result {
            Ok(applied) => {
                let text = describe_success(book_move, applied, dry_run);
                logger::debug(&text, self.verbose);
                ExecutionLogEntry::new(text, true)
            }
            Err(e) => {
                let text = format!(
                    "Failed '{}': {}\nsource: {}\ntarget: {}",
                    book_move.title,
                    e,
                    book_move.old_dir.display(),
                    book_move.target_dir.display()
                );
                logger::error(&text);
                ExecutionLogEntry::new(text, false)
            }
        };
        if let Err(e) = log.append(&entry) {
            logger::error(&format!("Failed to write audit log: {}", e));
        }

        result
    }

    fn apply(
        &self,
        book_move: &BookMove,
        tracker: &CollisionTracker,
        dry_run: bool,
    ) -> TidyResult<AppliedMove> {
        let old_dir = &book_move.old_dir;
        if !old_dir.is_dir() {
            return Err(move_failure(
                "locate",
                old_dir,
                &book_move.target_dir,
                io::Error::new(io::ErrorKind::NotFound, "source directory no longer exists"),
            ));
        }

        let sidecar = &self.config.scan.sidecar_name;
        let (final_dir, action) = if book_move.folder_changed {
            let dir = tracker.claim(&book_move.target_dir, PathKind::Folder, |p| {
                folder_taken(p, old_dir, sidecar)
            })?;
            if same_location(&dir, old_dir) {
                (old_dir.clone(), FolderAction::Stay)
            } else if dir.is_dir() {
                (dir, FolderAction::Merge)
            } else {
                (dir, FolderAction::Rename)
            }
        } else {
            tracker.reserve(old_dir);
            (old_dir.clone(), FolderAction::Stay)
        };

        let mut applied = AppliedMove {
            final_dir: final_dir.clone(),
            folder_moved: action != FolderAction::Stay,
            merged: action == FolderAction::Merge,
            ..AppliedMove::default()
        };

        // Step 2: folder
        let relocated = match action {
            FolderAction::Stay => HashMap::new(),
            FolderAction::Rename => {
                if !dry_run {
                    self.move_dir(old_dir, &final_dir)?;
                }
                HashMap::new()
            }
            FolderAction::Merge => {
                let planned: HashSet<PathBuf> =
                    book_move.move_plan.iter().map(|fm| fm.from.clone()).collect();
                self.merge_into(old_dir, &final_dir, &planned, tracker, dry_run)?
            }
        };
        let relocate = |path: &Path| -> PathBuf {
            if let Some(moved) = relocated.get(path) {
                return moved.clone();
            }
            match path.strip_prefix(old_dir) {
                Ok(rel) => final_dir.join(rel),
                Err(_) => path.to_path_buf(),
            }
        };

        // Step 3: files, resolved before anything is renamed so dry and real
        // runs pick the same names
        let pairs: Vec<(PathBuf, PathBuf)> = book_move
            .move_plan
            .iter()
            .filter_map(|fm| {
                let name = fm.to.file_name()?;
                Some((relocate(&fm.from), final_dir.join(name)))
            })
            .collect();
        let vacated: HashSet<PathBuf> = pairs
            .iter()
            .filter(|(current, desired)| current != desired)
            .map(|(current, _)| current.clone())
            .collect();
        let relocated_targets: HashSet<PathBuf> = relocated.values().cloned().collect();

        let occupied = |p: &Path| -> bool {
            if vacated.contains(p) {
                return false;
            }
            if !dry_run {
                return p.exists();
            }
            match action {
                FolderAction::Stay => p.exists(),
                FolderAction::Rename => p
                    .strip_prefix(&final_dir)
                    .map(|rel| old_dir.join(rel).exists())
                    .unwrap_or(false),
                FolderAction::Merge => p.exists() || relocated_targets.contains(p),
            }
        };

        let mut renames = Vec::new();
        for (current, desired) in &pairs {
            if current == desired {
                tracker.reserve(desired);
                continue;
            }
            let resolved = tracker.claim(desired, PathKind::File, &occupied)?;
            if &resolved != current {
                renames.push((current.clone(), resolved));
            }
        }

        if !dry_run {
            self.rename_files(&renames)?;
            if applied.folder_moved && self.config.execution.prune_empty_dirs {
                if let Some(parent) = old_dir.parent() {
                    applied.pruned = utils::prune_empty_dirs(parent, &self.root);
                }
            }
        }
        applied.renamed = renames;

        Ok(applied)
    }

    /// Rename a folder to a path that does not exist yet
    fn move_dir(&self, from: &Path, to: &Path) -> TidyResult<()> {
        if to.exists() {
            return Err(move_failure(
                "move folder",
                from,
                to,
                io::Error::new(io::ErrorKind::AlreadyExists, "destination already exists"),
            ));
        }

        if to.starts_with(from) {
            // Target lives inside the source: step aside through a sibling first
            let parent = from.parent().unwrap_or(&self.root);
            let name = from
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let temp = free_path(parent, &format!("{}-{}", TEMP_PREFIX, name));
            fs::rename(from, &temp).map_err(|e| move_failure("move folder", from, &temp, e))?;
            create_parent(&temp, to)?;
            return fs::rename(&temp, to).map_err(|e| move_failure("move folder", &temp, to, e));
        }

        create_parent(from, to)?;
        match fs::rename(from, to) {
            Ok(()) => Ok(()),
            Err(e) if is_cross_device(&e) => move_across_devices(from, to),
            Err(e) => Err(move_failure("move folder", from, to, e)),
        }
    }

    /// Move every entry of `from` into the existing folder `to`, suffixing clashes.
    ///
    /// Media files in `planned` are renamed right after, so they are not claimed
    /// here; their final names are claimed with the file renames.
    fn merge_into(
        &self,
        from: &Path,
        to: &Path,
        planned: &HashSet<PathBuf>,
        tracker: &CollisionTracker,
        dry_run: bool,
    ) -> TidyResult<HashMap<PathBuf, PathBuf>> {
        let entries: Vec<(PathBuf, bool)> = WalkDir::new(from)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| (e.path().to_path_buf(), e.file_type().is_dir()))
            .collect();

        let mut moved = HashMap::new();
        for (entry, is_dir) in entries {
            let Some(name) = entry.file_name() else {
                continue;
            };
            let dest = if planned.contains(&entry) {
                let direct = to.join(name);
                if direct.symlink_metadata().is_err() && !tracker.is_claimed(&direct) {
                    direct
                } else {
                    free_path(to, &format!("{}-merge-{}", TEMP_PREFIX, name.to_string_lossy()))
                }
            } else {
                let kind = if is_dir { PathKind::Folder } else { PathKind::File };
                tracker.claim(&to.join(name), kind, |p| p.exists())?
            };
            if !dry_run {
                rename_no_clobber("merge", &entry, &dest)?;
            }
            moved.insert(entry, dest);
        }

        if !dry_run {
            fs::remove_dir(from).map_err(|e| move_failure("remove emptied folder", from, to, e))?;
        }
        Ok(moved)
    }

    /// Two-phase rename so names swapped within one item never clash
    fn rename_files(&self, renames: &[(PathBuf, PathBuf)]) -> TidyResult<()> {
        let mut staged: Vec<(PathBuf, PathBuf, PathBuf)> = Vec::with_capacity(renames.len());

        for (idx, (from, to)) in renames.iter().enumerate() {
            let name = from
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let parent = from.parent().unwrap_or(&self.root);
            let temp = free_path(parent, &format!("{}-{}-{}", TEMP_PREFIX, idx, name));
            if let Err(e) = rename_no_clobber("stage", from, &temp) {
                unstage(&staged);
                return Err(e);
            }
            staged.push((from.clone(), temp, to.clone()));
        }

        for i in 0..staged.len() {
            let (_, temp, to) = &staged[i];
            if let Err(e) = rename_no_clobber("rename", temp, to) {
                unstage(&staged[i..]);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Apply moves one after another; a cancellation request stops scheduling
    /// new moves but never interrupts the current one
    pub fn execute_batch<F>(
        &self,
        moves: &[BookMove],
        dry_run: bool,
        cancel: &AtomicBool,
        mut on_progress: F,
    ) -> TidyResult<ExecutionReport>
    where
        F: FnMut(&MoveResult),
    {
        let log = self.open_log()?;
        let tracker = self.tracker();
        let mut report = ExecutionReport::new(moves.len());

        log.marker(&format!(
            "--- SESSION START: {} books (dry_run={}) ---",
            moves.len(),
            dry_run
        ))?;

        for (index, book_move) in moves.iter().enumerate() {
            if cancel.load(Ordering::SeqCst) {
                report.cancelled = true;
                logger::warning("Cancellation requested; no further moves will be started");
                break;
            }

            let before = tracker.disambiguated().len();
            let result = self.run_move(book_move, &log, &tracker, dry_run);
            report.processed += 1;

            let error = match result {
                Ok(_) => {
                    report.applied += 1;
                    None
                }
                Err(e) => {
                    report.add_failure(book_move.old_dir.clone(), e.to_string());
                    Some(e.to_string())
                }
            };

            on_progress(&MoveResult {
                index,
                title: book_move.title.clone(),
                applied: error.is_none(),
                error,
                disambiguated: tracker.disambiguated().split_off(before),
            });
        }

        report.disambiguated = tracker.disambiguated();
        log.marker(&format!(
            "--- SESSION END: applied={} errors={} cancelled={} ---",
            report.applied, report.errors, report.cancelled
        ))?;

        Ok(report)
    }
}

/// A folder target is unusable if something other than a plain folder sits
/// there, if it is another item, or if it lies inside the item being moved
fn folder_taken(path: &Path, old_dir: &Path, sidecar: &str) -> bool {
    if !path.exists() || same_location(path, old_dir) {
        return false;
    }
    !path.is_dir() || utils::has_sidecar(path, sidecar) || path.starts_with(old_dir)
}

fn move_failure(action: &'static str, from: &Path, to: &Path, source: io::Error) -> TidyError {
    TidyError::MoveIoFailure {
        action,
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    }
}

fn create_parent(from: &Path, to: &Path) -> TidyResult<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| move_failure("create directory", from, parent, e))?;
    }
    Ok(())
}

/// Rename that refuses to replace an existing path
fn rename_no_clobber(action: &'static str, from: &Path, to: &Path) -> TidyResult<()> {
    if to.symlink_metadata().is_ok() {
        return Err(move_failure(
            action,
            from,
            to,
            io::Error::new(io::ErrorKind::AlreadyExists, "destination already exists"),
        ));
    }
    fs::rename(from, to).map_err(|e| move_failure(action, from, to, e))
}

/// Put staged files back under their original names, best effort
fn unstage(staged: &[(PathBuf, PathBuf, PathBuf)]) {
    for (original, temp, _) in staged {
        if temp.exists() && !original.exists() {
            if let Err(e) = fs::rename(temp, original) {
                logger::error(&format!(
                    "Could not restore {} from {}: {}",
                    original.display(),
                    temp.display(),
                    e
                ));
            }
        }
    }
}

/// `parent/name`, or `parent/name-N` for the first N that is free
fn free_path(parent: &Path, name: &str) -> PathBuf {
    let candidate = parent.join(name);
    if candidate.symlink_metadata().is_err() {
        return candidate;
    }
    (1..)
        .map(|n| parent.join(format!("{}-{}", name, n)))
        .find(|p| p.symlink_metadata().is_err())
        .unwrap_or(candidate)
}

fn is_cross_device(e: &io::Error) -> bool {
    // EXDEV on unix, ERROR_NOT_SAME_DEVICE on windows
    let code = if cfg!(windows) { 17 } else { 18 };
    e.raw_os_error() == Some(code)
}

fn move_across_devices(from: &Path, to: &Path) -> TidyResult<()> {
    fs::create_dir_all(to).map_err(|e| move_failure("create directory", from, to, e))?;
    let mut options = fs_extra::dir::CopyOptions::new();
    options.content_only = true;
    fs_extra::dir::move_dir(from, to, &options)
        .map(|_| ())
        .map_err(|e| {
            let source = io::Error::new(io::ErrorKind::Other, e.to_string());
            move_failure("move folder across devices", from, to, source)
        })
}

fn describe_success(book_move: &BookMove, applied: &AppliedMove, dry_run: bool) -> String {
    let mut text = if applied.folder_moved {
        format!(
            "{} '{}': {} -> {}{}",
            if dry_run { "DRY RUN: would move" } else { "Moved" },
            book_move.title,
            book_move.old_dir.display(),
            applied.final_dir.display(),
            if applied.merged { " (merged into existing folder)" } else { "" }
        )
    } else {
        format!(
            "{} '{}' in {}",
            if dry_run { "DRY RUN: would rename files of" } else { "Renamed files of" },
            book_move.title,
            applied.final_dir.display()
        )
    };

    for (from, to) in &applied.renamed {
        text.push_str(&format!(
            "\n  {} -> {}",
            from.file_name().unwrap_or_default().to_string_lossy(),
            to.file_name().unwrap_or_default().to_string_lossy()
        ));
    }
    for dir in &applied.pruned {
        text.push_str(&format!("\n  removed empty folder {}", dir.display()));
    }
    text
}
