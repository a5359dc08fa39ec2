//! Picks a not-recently-shown image per directory.
//!
//! The seen-list is keyed by directory and survives across runs. Every file
//! in a directory is shown once before any repeats; when a directory runs dry
//! its entries are dropped from the list and the whole pool is eligible again.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
};

use rand::Rng;

use crate::{
    error::{DecodeError, SelectionError},
    info, warn, DEBUG_NAME,
};

/// Total tries per directory before a monitor's tile is skipped.
pub const MAX_ATTEMPTS: usize = 3;

type SeenList = BTreeMap<String, BTreeSet<String>>;

pub struct SelectionCache {
    path: PathBuf,
    seen: SeenList,
}

impl SelectionCache {
    /// Loads the seen-list at `path`. A missing or unreadable file starts empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let seen = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str::<SeenList>(&text).unwrap_or_else(|e| {
                warn!(
                    "[{}][SELECT] Ignoring malformed seen-list {}: {}",
                    DEBUG_NAME,
                    path.display(),
                    e
                );
                SeenList::new()
            }),
            Err(_) => SeenList::new(),
        };

        Self { path, seen }
    }

    #[cfg(test)]
    pub fn seen_count(&self, dir: &Path) -> usize {
        self.seen.get(&dir_key(dir)).map_or(0, BTreeSet::len)
    }

    /// Every file in `dir` that could be an image, sorted by path.
    pub fn eligible_files(&self, dir: &Path) -> Result<Vec<PathBuf>, SelectionError> {
        let entries = fs::read_dir(dir).map_err(|source| SelectionError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| !is_housekeeping_file(path) && path != &self.path)
            .collect();
        files.sort();
        Ok(files)
    }

    /// Unseen files of `dir`. An exhausted directory is reset first.
    pub fn candidates(&mut self, dir: &Path) -> Result<Vec<PathBuf>, SelectionError> {
        let files = self.eligible_files(dir)?;
        if files.is_empty() {
            return Err(SelectionError::Exhausted(dir.to_path_buf()));
        }

        let key = dir_key(dir);
        let unseen: Vec<PathBuf> = match self.seen.get(&key) {
            Some(seen) => files
                .iter()
                .filter(|f| !seen.contains(&file_key(f)))
                .cloned()
                .collect(),
            None => files.clone(),
        };

        if !unseen.is_empty() {
            return Ok(unseen);
        }

        info!(
            "[{}][SELECT] Every image in {} has been shown; starting over",
            DEBUG_NAME,
            dir.display()
        );
        self.seen.remove(&key);
        if let Err(e) = self.persist() {
            warn!("[{}][SELECT] {}", DEBUG_NAME, e);
        }
        Ok(files)
    }

    /// Random candidate of `dir` that is not in `skip`, or `None` when `skip`
    /// covers them all.
    pub fn choose<R: Rng>(
        &mut self,
        dir: &Path,
        skip: &[PathBuf],
        rng: &mut R,
    ) -> Result<Option<PathBuf>, SelectionError> {
        let mut candidates = self.candidates(dir)?;
        candidates.retain(|file| !skip.contains(file));
        if candidates.is_empty() {
            return Ok(None);
        }

        let pick = rng.gen_range(0..candidates.len());
        Ok(Some(candidates.swap_remove(pick)))
    }

    pub fn mark_seen(&mut self, dir: &Path, file: &Path) -> Result<(), SelectionError> {
        self.seen
            .entry(dir_key(dir))
            .or_default()
            .insert(file_key(file));
        self.persist()
    }

    /// Draws random unseen files from `dir` and hands each to `attempt` until
    /// one succeeds or `MAX_ATTEMPTS` are used up. The winner is recorded as
    /// seen straight away.
    pub fn select_with_retry<R, T, F>(
        &mut self,
        dir: &Path,
        rng: &mut R,
        mut attempt: F,
    ) -> Result<(PathBuf, T), SelectionError>
    where
        R: Rng,
        F: FnMut(&Path) -> Result<T, DecodeError>,
    {
        let mut failed: Vec<PathBuf> = Vec::new();

        while failed.len() < MAX_ATTEMPTS {
            let Some(file) = self.choose(dir, &failed, rng)? else {
                break;
            };

            match attempt(&file) {
                Ok(value) => {
                    if let Err(e) = self.mark_seen(dir, &file) {
                        warn!("[{}][SELECT] {}", DEBUG_NAME, e);
                    }
                    return Ok((file, value));
                }
                Err(e) => {
                    warn!(
                        "[{}][SELECT] Attempt {}/{} failed: {}",
                        DEBUG_NAME,
                        failed.len() + 1,
                        MAX_ATTEMPTS,
                        e
                    );
                    failed.push(file);
                }
            }
        }

        Err(SelectionError::AttemptsFailed {
            dir: dir.to_path_buf(),
            attempts: failed.len(),
        })
    }

    fn persist(&self) -> Result<(), SelectionError> {
        let persist_err = |reason: String| SelectionError::Persist {
            path: self.path.clone(),
            reason,
        };

        let text = serde_json::to_string_pretty(&self.seen).map_err(|e| persist_err(e.to_string()))?;

        // Staged beside the target so the rename never crosses filesystems.
        let staged = staging_path(&self.path);
        fs::write(&staged, text).map_err(|e| persist_err(e.to_string()))?;
        fs::rename(&staged, &self.path).map_err(|e| persist_err(e.to_string()))
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Thumbnail databases, shell metadata, editor leftovers and dot-files.
fn is_housekeeping_file(path: &Path) -> bool {
    let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };

    let lower_name = file_name.to_ascii_lowercase();
    lower_name.ends_with(".db")
        || lower_name == "desktop.ini"
        || lower_name.starts_with('.')
        || lower_name.ends_with(".tmp")
        || lower_name.ends_with(".temp")
        || lower_name.ends_with(".bak")
        || lower_name.ends_with(".log")
}

fn dir_key(dir: &Path) -> String {
    dir.components().collect::<PathBuf>().to_string_lossy().into_owned()
}

fn file_key(file: &Path) -> String {
    file.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
