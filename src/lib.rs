// Core library exports for tidyshelf
pub mod audit;
pub mod collision;
pub mod config;
pub mod error;
pub mod logger;
pub mod metadata;
pub mod naming;
pub mod operations;
pub mod report;
pub mod stats;
pub mod utils;

// Re-export commonly used types
pub use collision::CollisionTracker;
pub use config::Config;
pub use error::{TidyError, TidyResult};
pub use operations::execute::Executor;
pub use operations::scan::{BookMove, FileMove, ScanResult};
pub use stats::LibraryStats;
pub use utils::{format_size, format_total_duration};

use std::path::Path;

/// Scan `root` with the config at `config_path` (or the default lookup).
///
/// Pure read; fails with `InvalidRoot` or `ConfigError`, everything per-item
/// ends up in the result's skipped list.
pub fn scan(root: &Path, config_path: Option<&Path>) -> TidyResult<ScanResult> {
    let config = Config::from_optional_path(config_path)?;
    operations::scan::run(&operations::scan::ScanOptions {
        root: root.to_path_buf(),
        show_progress: false,
        verbose: false,
        config,
    })
}
