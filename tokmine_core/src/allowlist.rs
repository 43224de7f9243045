use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Upper bound on identifiers read from, or persisted to, an allow-list.
pub const MAX_ALLOW_LIST_ENTRIES: usize = 256;

/// Where the mining driver writes and replay reads by default.
pub const DEFAULT_ALLOW_LIST_PATH: &str = "token_constraint.txt";

/// Failures reading or writing the allow-list file. All of them are fatal
/// for replay, which has no safe default token set.
#[derive(Error, Debug)]
pub enum AllowListError {
    #[error("Failed to read allow-list {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Allow-list {path:?} line {line}: '{content}' is not a token identifier")]
    Corrupt {
        path: PathBuf,
        line: usize,
        content: String,
    },

    #[error("Allow-list {path:?} contains no token identifiers")]
    Empty { path: PathBuf },

    #[error("Failed to write allow-list {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result of offering an identifier to the allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    Added,
    Known,
    /// The list is full; the identifier is not kept.
    OverCapacity,
}

/// The ordered set of token identifiers a tokenizer has been seen to produce.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    ids: BTreeSet<u32>,
}

impl AllowList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the flat file format: one decimal identifier per line.
    ///
    /// Only the first [`MAX_ALLOW_LIST_ENTRIES`] lines are looked at. Blank
    /// lines are skipped; anything else that is not a `u32` is corrupt.
    pub fn parse(text: &str, path: &Path) -> Result<Self, AllowListError> {
        let mut ids = BTreeSet::new();
        for (index, line) in text.lines().take(MAX_ALLOW_LIST_ENTRIES).enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let id = trimmed
                .parse::<u32>()
                .map_err(|_| AllowListError::Corrupt {
                    path: path.to_path_buf(),
                    line: index + 1,
                    content: trimmed.to_string(),
                })?;
            ids.insert(id);
        }
        let total_lines = text.lines().count();
        if total_lines > MAX_ALLOW_LIST_ENTRIES {
            warn!(
                "Allow-list {:?} has {} lines, ignoring everything after line {}",
                path, total_lines, MAX_ALLOW_LIST_ENTRIES
            );
        }
        Ok(Self { ids })
    }

    /// Loads a list for replay: a missing, unreadable, corrupt or empty file
    /// is an error.
    pub fn load(path: &Path) -> Result<Self, AllowListError> {
        let text = fs::read_to_string(path).map_err(|source| AllowListError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let list = Self::parse(&text, path)?;
        if list.is_empty() {
            return Err(AllowListError::Empty {
                path: path.to_path_buf(),
            });
        }
        debug!("Loaded {} token identifiers from {:?}", list.len(), path);
        Ok(list)
    }

    /// Loads a list for mining, starting empty when the file does not exist yet.
    pub fn open_or_empty(path: &Path) -> Result<Self, AllowListError> {
        if !path.exists() {
            debug!("No allow-list at {:?}, starting empty", path);
            return Ok(Self::new());
        }
        let text = fs::read_to_string(path).map_err(|source| AllowListError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    pub fn insert(&mut self, id: u32) -> Insertion {
        if self.ids.contains(&id) {
            Insertion::Known
        } else if self.ids.len() >= MAX_ALLOW_LIST_ENTRIES {
            Insertion::OverCapacity
        } else {
            self.ids.insert(id);
            Insertion::Added
        }
    }

    pub fn contains(&self, id: u32) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &BTreeSet<u32> {
        &self.ids
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.ids.iter().copied()
    }

    pub fn to_text(&self) -> String {
        self.ids.iter().map(|id| format!("{id}\n")).collect()
    }

    /// Replaces the file at `path` atomically with the current identifiers,
    /// ascending.
    pub fn save(&self, path: &Path) -> Result<(), AllowListError> {
        let write_error = |source: io::Error| AllowListError::Write {
            path: path.to_path_buf(),
            source,
        };
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(write_error)?;
        staged
            .write_all(self.to_text().as_bytes())
            .map_err(write_error)?;
        staged.persist(path).map_err(|e| write_error(e.error))?;
        debug!("Wrote {} token identifiers to {:?}", self.len(), path);
        Ok(())
    }
}

impl FromIterator<u32> for AllowList {
    /// Collects identifiers, keeping at most [`MAX_ALLOW_LIST_ENTRIES`].
    fn from_iter<T: IntoIterator<Item = u32>>(iter: T) -> Self {
        let mut list = AllowList::new();
        for id in iter {
            list.insert(id);
        }
        list
    }
}
