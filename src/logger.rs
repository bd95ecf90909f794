use anyhow::Result;
use chrono::Local;
use colored::Colorize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

lazy_static::lazy_static! {
    static ref LOG_FILE: Mutex<Option<std::fs::File>> = Mutex::new(None);
}

static QUIET: AtomicBool = AtomicBool::new(false);
static WRITE_FAILED: AtomicBool = AtomicBool::new(false);

/// Initialize the session log. `log_dir` is used when no explicit path is given.
pub fn init_logger(custom_log_path: Option<PathBuf>, log_dir: Option<PathBuf>) -> Result<PathBuf> {
    let log_path = match custom_log_path {
        Some(path) => path,
        None => get_default_log_path(log_dir)?,
    };

    // Create parent directory if it doesn't exist
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    if let Ok(mut guard) = LOG_FILE.lock() {
        *guard = Some(file);
    }

    log_to_file(&format!(
        "\n{}\nTidyshelf Session: {}\n{}\n",
        "=".repeat(60),
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    ));

    Ok(log_path)
}

/// Keep stdout clean (e.g. for JSON output); errors still reach stderr
pub fn set_quiet(quiet: bool) {
    QUIET.store(quiet, Ordering::Relaxed);
}

fn quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

/// Default: ~/.tidyshelf/logs/tidyshelf_YYYYMMDD_HHMMSS.log
fn get_default_log_path(log_dir: Option<PathBuf>) -> Result<PathBuf> {
    let log_dir = log_dir.unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tidyshelf")
            .join("logs")
    });
    fs::create_dir_all(&log_dir)?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    Ok(log_dir.join(format!("tidyshelf_{}.log", timestamp)))
}

/// Log to file only (detailed). A failed write is reported once on stderr.
pub fn log_to_file(message: &str) {
    if let Ok(mut file_opt) = LOG_FILE.lock() {
        if let Some(file) = file_opt.as_mut() {
            let timestamp = Local::now().format("%H:%M:%S");
            let written = writeln!(file, "[{}] {}", timestamp, message).and_then(|_| file.flush());
            if let Err(e) = written {
                if !WRITE_FAILED.swap(true, Ordering::Relaxed) {
                    eprintln!("{}", format!("Session log write failed: {}", e).red());
                }
            }
        }
    }
}

/// Print success message (green) to console and log
pub fn success(message: &str) {
    if !quiet() {
        println!("{}", message.green());
    }
    log_to_file(&format!("SUCCESS: {}", message));
}

/// Print info message (cyan) to console and log
pub fn info(message: &str) {
    if !quiet() {
        println!("{}", message.cyan());
    }
    log_to_file(&format!("INFO: {}", message));
}

/// Print warning message (yellow) to console and log
pub fn warning(message: &str) {
    if !quiet() {
        println!("{}", message.yellow());
    }
    log_to_file(&format!("WARNING: {}", message));
}

/// Print error message (red) to console and log
pub fn error(message: &str) {
    eprintln!("{}", message.red());
    log_to_file(&format!("ERROR: {}", message));
}

/// Print step/stage message (magenta bold) to console and log
pub fn stage(message: &str) {
    if !quiet() {
        println!("{}", message.bright_magenta().bold());
    }
    log_to_file(&format!("STAGE: {}", message));
}

/// Print plain message to console and log
pub fn plain(message: &str) {
    if !quiet() {
        println!("{}", message);
    }
    log_to_file(message);
}

/// Print verbose/debug message (only to log file, not console unless --verbose)
pub fn debug(message: &str, verbose: bool) {
    if verbose && !quiet() {
        println!("{}", message.dimmed());
    }
    log_to_file(&format!("DEBUG: {}", message));
}
