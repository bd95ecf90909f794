//! Serializable view of a scan, shaped for front ends that review a plan
//! before applying it.

use crate::operations::scan::{BookMove, ScanResult};
use crate::stats::LibraryStats;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct StatsSummary {
    pub books: usize,
    pub authors: usize,
    pub narrators: usize,
    pub series: usize,
    pub standalone_count: usize,
    pub total_duration: f64,
    pub total_size: u64,
    pub formatted_duration: String,
    pub formatted_size: String,
}

impl From<&LibraryStats> for StatsSummary {
    fn from(stats: &LibraryStats) -> Self {
        Self {
            books: stats.books,
            authors: stats.authors.len(),
            narrators: stats.narrators.len(),
            series: stats.series.len(),
            standalone_count: stats.standalone_count,
            total_duration: stats.total_duration,
            total_size: stats.total_size,
            formatted_duration: stats.formatted_duration(),
            formatted_size: stats.formatted_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileChange {
    pub old: String,
    pub new: String,
    pub changed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MoveSummary {
    pub title: String,
    pub old_dir: String,
    pub target_dir: String,
    pub file_changes: Vec<FileChange>,
    pub folder_changed: bool,
}

impl MoveSummary {
    pub fn new(book_move: &BookMove, root: &Path) -> Self {
        Self {
            title: book_move.title.clone(),
            old_dir: relative(&book_move.old_dir, root),
            target_dir: relative(&book_move.target_dir, root),
            file_changes: book_move
                .move_plan
                .iter()
                .map(|fm| FileChange {
                    old: file_name(&fm.from),
                    new: file_name(&fm.to),
                    changed: fm.name_changed(),
                })
                .collect(),
            folder_changed: book_move.folder_changed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub stats: StatsSummary,
    pub changes_needed: usize,
    pub total_planned: usize,
    pub skipped: usize,
    pub warnings: Vec<String>,
    pub planned_moves: Vec<MoveSummary>,
}

impl PlanReport {
    /// `limit` caps how many moves are listed; counts always cover the whole plan
    pub fn new(result: &ScanResult, limit: Option<usize>) -> Self {
        let shown = limit.unwrap_or(result.moves.len());
        Self {
            stats: StatsSummary::from(&result.stats),
            changes_needed: result.moves.len(),
            total_planned: result.moves.len(),
            skipped: result.skipped.len(),
            warnings: result.warnings.clone(),
            planned_moves: result
                .moves
                .iter()
                .take(shown)
                .map(|m| MoveSummary::new(m, &result.root))
                .collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .to_string()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
