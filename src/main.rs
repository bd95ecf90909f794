use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tidyshelf::config::Config;
use tidyshelf::logger;
use tidyshelf::operations::{scan, tidy};
use tidyshelf::report::PlanReport;

#[derive(Parser)]
#[command(name = "tidyshelf")]
#[command(author, version, about, long_about = None)]
#[command(about = "Reorganize an audiobook library into a canonical folder layout")]
struct Cli {
    /// Path to config file (default: ~/.tidyshelf/tidyshelf.toml or ./tidyshelf.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Dry run - show what would be done without making changes
    #[arg(long, global = true)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Custom log file path (default: ~/.tidyshelf/logs/tidyshelf_TIMESTAMP.log)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a library and show the planned changes (read-only)
    Scan {
        /// Library root
        #[arg(short, long)]
        input: PathBuf,

        /// Print the plan as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Only list the first N planned moves
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Scan and apply the plan (or a selection of it)
    Apply {
        /// Library root
        #[arg(short, long)]
        input: PathBuf,

        /// Comma-separated plan indices to apply (default: all)
        #[arg(long, value_delimiter = ',')]
        select: Option<Vec<usize>>,

        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Check that a path looks like a library
    Validate {
        /// Path to check
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Generate an example configuration file
    GenConfig {
        /// Output path for config file
        #[arg(short, long, default_value = "tidyshelf.toml")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Scan { json: true, .. } = cli.command {
        logger::set_quiet(true);
    }

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)
            .with_context(|| format!("Failed to load config {}", config_path.display()))?
    } else {
        Config::load_or_default().context("Failed to load config")?
    };
    let verbose = cli.verbose || config.general.verbose;

    // Initialize logging
    let log_path = logger::init_logger(cli.log_file, config.general.log_dir.clone())?;
    logger::info(&format!("Log file: {}", log_path.display()));

    let result = match cli.command {
        Commands::Scan { input, json, limit } => {
            let opts = scan::ScanOptions {
                root: input,
                show_progress: !json,
                verbose,
                config,
            };
            let root = opts.root.clone();
            scan::run(&opts)
                .with_context(|| format!("Failed to scan {}", root.display()))
                .and_then(|result| {
                    let report = PlanReport::new(&result, limit);
                    if json {
                        println!("{}", report.to_json()?);
                        return Ok(());
                    }
                    result.stats.print();
                    result.print_summary();
                    for (i, planned) in report.planned_moves.iter().enumerate() {
                        logger::plain(&format!(
                            "  [{}] {} -> {}",
                            i, planned.old_dir, planned.target_dir
                        ));
                        if verbose {
                            for change in planned.file_changes.iter().filter(|c| c.changed) {
                                logger::plain(&format!("        {} -> {}", change.old, change.new));
                            }
                        }
                    }
                    Ok(())
                })
        }

        Commands::Apply { input, select, yes } => {
            let opts = tidy::TidyOptions {
                input_dir: input,
                selected: select,
                assume_yes: yes,
                dry_run: cli.dry_run,
                verbose,
                config,
            };
            tidy::run(opts).and_then(|report| {
                if report.errors > 0 {
                    bail!("{} of {} moves failed", report.errors, report.total);
                }
                Ok(())
            })
        }

        Commands::Validate { input } => {
            let check = scan::validate_library(&input, &config);
            if check.valid && check.is_library {
                logger::success(&format!(
                    "{} looks like a library ({} metadata files)",
                    input.display(),
                    check.metadata_files
                ));
                Ok(())
            } else if check.valid {
                logger::warning(&format!(
                    "{} contains no {} files",
                    input.display(),
                    config.scan.sidecar_name
                ));
                Ok(())
            } else {
                Err(anyhow::anyhow!(
                    "{}: {}",
                    input.display(),
                    check.error.unwrap_or_default()
                ))
            }
        }

        Commands::GenConfig { output } => {
            let example = Config::generate_example();
            std::fs::write(&output, example)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            logger::success(&format!(
                "Generated example config at: {}",
                output.display()
            ));
            Ok(())
        }
    };

    match result {
        Ok(_) => {
            logger::success("\nOperation completed successfully!");
            Ok(())
        }
        Err(e) => {
            logger::error(&format!("\nOperation failed: {}", e));
            Err(e)
        }
    }
}
