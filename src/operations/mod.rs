pub mod batch;
pub mod execute;
pub mod scan;
pub mod tidy;

// Common structures for all operations
use crate::collision::Disambiguation;
use scan::BookMove;
use serde::Serialize;
use std::path::PathBuf;

/// Tally of one execution batch
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionReport {
    pub total: usize,
    pub processed: usize,
    pub applied: usize,
    pub errors: usize,
    pub cancelled: bool,
    pub failures: Vec<(PathBuf, String)>, // (item directory, reason)
    pub disambiguated: Vec<Disambiguation>,
}

impl ExecutionReport {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn add_failure(&mut self, dir: PathBuf, reason: String) {
        self.errors += 1;
        self.failures.push((dir, reason));
    }

    pub fn print_summary(&self, operation_name: &str) {
        use crate::logger;

        logger::plain(&format!("\n{} Summary:", operation_name));
        logger::plain(&format!("  Processed: {}/{}", self.processed, self.total));
        logger::success(&format!("  Applied: {}", self.applied));
        if self.cancelled {
            logger::warning("  Cancelled before all moves were scheduled");
        }
        if !self.disambiguated.is_empty() {
            logger::warning(&format!(
                "  Disambiguated names (review these): {}",
                self.disambiguated.len()
            ));
            for d in &self.disambiguated {
                logger::plain(&format!(
                    "    - {} -> {}",
                    d.requested.display(),
                    d.resolved.display()
                ));
            }
        }
        if self.errors > 0 {
            logger::error(&format!("  Errors: {}", self.errors));
            for (dir, reason) in &self.failures {
                logger::plain(&format!("    - {}: {}", dir.display(), reason));
            }
        }
    }
}

/// Pick plan entries by index; `None` keeps the whole plan, out-of-range
/// indices are ignored
pub fn select_moves(moves: &[BookMove], indices: Option<&[usize]>) -> Vec<BookMove> {
    match indices {
        None => moves.to_vec(),
        Some(indices) => indices
            .iter()
            .filter_map(|&i| moves.get(i).cloned())
            .collect(),
    }
}
