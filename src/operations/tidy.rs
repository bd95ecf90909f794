use crate::config::Config;
use crate::logger;
use crate::operations::batch::{BatchHandle, BatchState};
use crate::operations::execute::Executor;
use crate::operations::scan::{self, ScanOptions};
use crate::operations::{select_moves, ExecutionReport};
use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

pub struct TidyOptions {
    pub input_dir: PathBuf,
    /// Plan indices to apply; `None` applies the whole plan
    pub selected: Option<Vec<usize>>,
    /// Skip the confirmation prompt
    pub assume_yes: bool,
    pub dry_run: bool,
    pub verbose: bool,
    pub config: Config,
}

/// Scan the library, then apply the (selected) plan on a background batch
pub fn run(options: TidyOptions) -> Result<ExecutionReport> {
    if options.dry_run {
        logger::warning("DRY RUN MODE - No files will be modified");
    }

    let result = scan::run(&ScanOptions {
        root: options.input_dir.clone(),
        show_progress: true,
        verbose: options.verbose,
        config: options.config.clone(),
    })
    .with_context(|| format!("Failed to scan {}", options.input_dir.display()))?;
    result.stats.print();
    result.print_summary();

    let moves = select_moves(&result.moves, options.selected.as_deref());
    if moves.is_empty() {
        logger::success("Library is already tidy - nothing to do");
        return Ok(ExecutionReport::new(0));
    }

    if !options.dry_run && !options.assume_yes {
        logger::warning(&format!(
            "\nAbout to reorganize {} items under {}. Proceed? [y/N]: ",
            moves.len(),
            result.root.display()
        ));
        let mut input = String::new();
        std::io::stdin()
            .read_line(&mut input)
            .context("Failed to read confirmation")?;
        if !input.trim().eq_ignore_ascii_case("y") {
            logger::info("Operation cancelled by user");
            return Ok(ExecutionReport::new(moves.len()));
        }
    }

    logger::stage(&format!("Applying {} planned moves", moves.len()));
    let executor = Executor::new(&result.root, options.config.clone()).verbose(options.verbose);
    let handle = BatchHandle::spawn(executor, moves, options.dry_run);

    let status = handle.status();
    let pb = ProgressBar::new(status.total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40}] {pos}/{len} ({eta}) | {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░"),
    );
    while !handle.is_finished() {
        let status = handle.status();
        pb.set_position(status.processed as u64);
        if let Some(current) = status.current {
            pb.set_message(current);
        }
        thread::sleep(Duration::from_millis(100));
    }
    pb.finish_and_clear();

    let status = handle.join();
    match (status.state, status.report) {
        (BatchState::Failed, _) | (_, None) => {
            bail!(
                "Batch failed: {}",
                status.error.unwrap_or_else(|| "unknown error".to_string())
            )
        }
        (_, Some(report)) => {
            report.print_summary(if options.dry_run { "Tidy (dry run)" } else { "Tidy" });
            Ok(report)
        }
    }
}
