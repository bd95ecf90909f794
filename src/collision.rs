use crate::error::{TidyError, TidyResult};
use crate::utils;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    File,
    Folder,
}

/// A claimed path that had to differ from the requested canonical one
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Disambiguation {
    pub requested: PathBuf,
    pub resolved: PathBuf,
}

#[derive(Debug, Default)]
struct TrackerState {
    claimed: HashSet<PathBuf>,
    disambiguated: Vec<Disambiguation>,
}

/// Paths claimed during one execution batch.
///
/// Checking a candidate and claiming it happen under one lock, so concurrent
/// movers can never end up with the same final path.
#[derive(Debug)]
pub struct CollisionTracker {
    state: Mutex<TrackerState>,
    suffix_format: String,
}

impl CollisionTracker {
    /// `suffix_format` must contain `{n}`, e.g. `" ({n})"`
    pub fn new(suffix_format: &str) -> Self {
        Self {
            state: Mutex::new(TrackerState::default()),
            suffix_format: suffix_format.to_string(),
        }
    }

    /// Claim `candidate`, or the first free suffixed variant of it.
    ///
    /// A path is free when nobody in this batch claimed it and `taken_on_disk`
    /// says the filesystem doesn't already hold something unrelated there.
    pub fn claim<F>(&self, candidate: &Path, kind: PathKind, taken_on_disk: F) -> TidyResult<PathBuf>
    where
        F: Fn(&Path) -> bool,
    {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if !state.claimed.contains(candidate) && !taken_on_disk(candidate) {
            state.claimed.insert(candidate.to_path_buf());
            return Ok(candidate.to_path_buf());
        }

        for n in 1..=u32::MAX {
            let alternative = suffixed(candidate, n, kind, &self.suffix_format);
            if state.claimed.contains(&alternative) || taken_on_disk(&alternative) {
                continue;
            }
            state.claimed.insert(alternative.clone());
            state.disambiguated.push(Disambiguation {
                requested: candidate.to_path_buf(),
                resolved: alternative.clone(),
            });
            return Ok(alternative);
        }

        Err(TidyError::CollisionUnresolvable {
            path: candidate.to_path_buf(),
        })
    }

    /// Record a path that stays where it is; returns false if it was already claimed
    pub fn reserve(&self, path: &Path) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.claimed.insert(path.to_path_buf())
    }

    pub fn is_claimed(&self, path: &Path) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.claimed.contains(path)
    }

    pub fn claimed_count(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.claimed.len()
    }

    /// Paths that received a disambiguated name, in claim order
    pub fn disambiguated(&self) -> Vec<Disambiguation> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.disambiguated.clone()
    }
}

/// Insert the numbered suffix before the extension (files) or at the end (folders)
pub fn suffixed(path: &Path, n: u32, kind: PathKind, suffix_format: &str) -> PathBuf {
    let suffix = suffix_format.replace("{n}", &n.to_string());
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let new_name = match kind {
        PathKind::File => {
            let (stem, ext) = utils::split_extension(&name);
            format!("{}{}{}", stem, suffix, ext)
        }
        PathKind::Folder => format!("{}{}", name, suffix),
    };

    match path.parent() {
        Some(parent) => parent.join(new_name),
        None => PathBuf::from(new_name),
    }
}

/// The `n` for which `name` is `base` with the numbered suffix applied, if any
pub fn suffix_number(name: &str, base: &str, kind: PathKind, suffix_format: &str) -> Option<u32> {
    let (prefix, postfix) = suffix_format.split_once("{n}")?;
    let (base_stem, ext) = match kind {
        PathKind::File => utils::split_extension(base),
        PathKind::Folder => (base, ""),
    };
    let digits = name
        .strip_prefix(base_stem)?
        .strip_suffix(ext)?
        .strip_prefix(prefix)?
        .strip_suffix(postfix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|n| *n > 0)
}
