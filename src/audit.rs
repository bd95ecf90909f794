use crate::error::{TidyError, TidyResult};
use chrono::{DateTime, Local};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One record in the per-library audit log
#[derive(Debug, Clone)]
pub struct ExecutionLogEntry {
    pub timestamp: DateTime<Local>,
    pub action: String,
    pub success: bool,
}

impl ExecutionLogEntry {
    pub fn new(action: impl Into<String>, success: bool) -> Self {
        Self {
            timestamp: Local::now(),
            action: action.into(),
            success,
        }
    }

    /// Rendered block; continuation lines are indented so one entry stays one block
    pub fn render(&self) -> String {
        let status = if self.success { "OK" } else { "FAILED" };
        let mut lines = self.action.lines();
        let mut out = format!(
            "[{}] {}: {}\n",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            status,
            lines.next().unwrap_or_default()
        );
        for line in lines {
            out.push_str("    ");
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// Append-only log file inside a library root. Never truncated.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl AuditLog {
    pub fn open(path: &Path) -> TidyResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| TidyError::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    /// Open `<root>/<file_name>`
    pub fn for_root(root: &Path, file_name: &str) -> TidyResult<Self> {
        Self::open(&root.join(file_name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one entry with a single write call under the file lock
    pub fn append(&self, entry: &ExecutionLogEntry) -> TidyResult<()> {
        self.write_block(&entry.render())
    }

    /// Write a bare timestamped marker line (session start/end)
    pub fn marker(&self, message: &str) -> TidyResult<()> {
        self.write_block(&format!(
            "[{}] {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            message
        ))
    }

    fn write_block(&self, block: &str) -> TidyResult<()> {
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.write_all(block.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| TidyError::io(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    #[test]
    fn test_render_block() {
        let entry = ExecutionLogEntry::new("Moved a -> b\n  renamed x -> y", true);
        let text = entry.render();
        assert!(text.contains("] OK: Moved a -> b\n"));
        assert!(text.ends_with("      renamed x -> y\n"));

        let failed = ExecutionLogEntry::new("boom", false).render();
        assert!(failed.contains("] FAILED: boom"));
    }

    #[test]
    fn test_append_never_truncates() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("tidy_library_log.txt");
        fs::write(&path, "existing line\n").unwrap();

        {
            let log = AuditLog::open(&path).unwrap();
            log.append(&ExecutionLogEntry::new("first", true)).unwrap();
        }
        let log = AuditLog::open(&path).unwrap();
        log.marker("--- SESSION END ---").unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "existing line");
        assert!(lines[1].ends_with("OK: first"));
        assert!(lines[2].ends_with("--- SESSION END ---"));
    }

    #[test]
    fn test_concurrent_entries_do_not_interleave() {
        let tmp = tempdir().unwrap();
        let log = Arc::new(AuditLog::for_root(tmp.path(), "log.txt").unwrap());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    for i in 0..50 {
                        let action = format!("worker {} item {}\nline two {}", t, i, i);
                        log.append(&ExecutionLogEntry::new(action, true)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let text = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 400);
        for pair in lines.chunks(2) {
            assert!(pair[0].contains("OK: worker"));
            assert!(pair[1].starts_with("    line two"));
        }
    }
}
