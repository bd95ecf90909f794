use crate::config::{IllegalCharPolicy, NamingConfig};
use std::cmp::Ordering;
use std::fs;
use std::path::Path;

/// Placeholder used when a name component sanitizes to nothing
pub const PLACEHOLDER_NAME: &str = "_unknown";

/// Characters that are not allowed in file or folder names on common filesystems
pub fn is_illegal_char(c: char) -> bool {
    matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') || (c as u32) < 0x20
}

/// Sanitize a string for use as a single filename/folder component
/// - Replaces or removes illegal characters per the configured policy
/// - Removes control characters
/// - Collapses whitespace runs
/// - Trims spaces and trailing dots
///
/// May return an empty string; callers decide on the placeholder.
pub fn sanitize(s: &str, naming: &NamingConfig) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        if (c as u32) < 0x20 {
            // Tabs and newlines become spaces, other control characters vanish
            if c == '\t' || c == '\n' || c == '\r' {
                result.push(' ');
            }
            continue;
        }
        if is_illegal_char(c) {
            if naming.illegal_chars == IllegalCharPolicy::Replace {
                result.push_str(&naming.replacement);
            }
            continue;
        }
        result.push(c);
    }

    // Collapse multiple spaces (single pass)
    let mut prev_was_space = false;
    result = result
        .chars()
        .filter(|&c| {
            let is_space = c.is_whitespace();
            let keep = !(is_space && prev_was_space);
            prev_was_space = is_space;
            keep
        })
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();

    result
        .trim()
        .trim_end_matches(|c| c == '.' || c == ' ')
        .to_string()
}

/// Clamp a filename component to a maximum length in bytes, on a char boundary
pub fn clamp_component(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].trim_end_matches(|c| c == '.' || c == ' ').to_string()
}

/// Check if a file is a media file by extension
pub fn is_media_file(path: &Path, extensions: &[String]) -> bool {
    match get_extension(path) {
        Some(ext) => extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)),
        None => false,
    }
}

/// Get file extension in lowercase
pub fn get_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
}

/// Split a file name into (stem, extension-with-dot); dotfiles have no extension
pub fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(pos) if pos > 0 => filename.split_at(pos),
        _ => (filename, ""),
    }
}

/// Digit-aware comparison so that `track2` sorts before `track10`
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => break,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let ln = take_digits(&mut left);
                let rn = take_digits(&mut right);
                let lt = ln.trim_start_matches('0');
                let rt = rn.trim_start_matches('0');
                let ord = lt.len().cmp(&rt.len()).then_with(|| lt.cmp(rt));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(l), Some(r)) => {
                let ord = l.to_lowercase().cmp(r.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                left.next();
                right.next();
            }
        }
    }

    // Equal under natural rules: fall back to raw order so the sort is total
    a.cmp(b)
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        chars.next();
    }
    digits
}

/// Render a duration in seconds as `"{h}h {m}m"`
pub fn format_total_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    format!("{}h {}m", hours, minutes)
}

/// Render a byte count in GB with two decimal places
pub fn format_size(bytes: u64) -> String {
    format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
}

/// Whether a directory holds the metadata sidecar
pub fn has_sidecar(dir: &Path, sidecar_name: &str) -> bool {
    dir.join(sidecar_name).is_file()
}

/// Remove `start` and its ancestors while they are empty, stopping at `root`
///
/// Returns the directories that were removed.
pub fn prune_empty_dirs(start: &Path, root: &Path) -> Vec<std::path::PathBuf> {
    let mut removed = Vec::new();
    let mut current = start.to_path_buf();

    while current.starts_with(root) && current != root {
        let is_empty = match fs::read_dir(&current) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => false,
        };
        if !is_empty || fs::remove_dir(&current).is_err() {
            break;
        }
        removed.push(current.clone());
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    removed
}
