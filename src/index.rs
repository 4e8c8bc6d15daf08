// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Index of tracked paths.
//!
//! The __index__ is the listing of absolute paths that the user wants to back
//! up. It is persisted as a JSON array of path strings at a per-user location,
//! read once when a session starts, and written back once when it ends.
//!
//! # Invariant
//!
//! - Paths are always sorted ascending by their raw string form.
//! - No duplicate paths.
//!
//! Insertion keeps the ordering through a linear scan. The index is expected
//! to hold tens of entries, maybe a few hundred, so nothing fancier is needed.

use std::{
    cmp::Ordering,
    fs::{read_to_string, write},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Sorted and deduplicated listing of tracked paths.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PathIndex {
    paths: Vec<PathBuf>,
}

impl PathIndex {
    /// Construct new empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load index from file.
    ///
    /// A missing file yields an empty index. Entries are sorted and
    /// deduplicated on the way in, so a hand edited file cannot break the
    /// ordering invariant.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Read`] if file exists but cannot be read.
    /// - Return [`Error::Deserialize`] if file is not a JSON array of paths.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = match read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no index at {:?}, starting empty", path.display());
                return Ok(Self::new());
            }
            Err(err) => {
                return Err(Error::Read {
                    source: err,
                    index_path: path.into(),
                })
            }
        };

        let entries: Vec<PathBuf> =
            serde_json::from_str(&content).map_err(|err| Error::Deserialize {
                source: err,
                index_path: path.into(),
            })?;

        let mut index = Self::new();
        index.extend(entries);

        Ok(index)
    }

    /// Save index to file.
    ///
    /// Truncates and rewrites the whole file. Creates parent directory of the
    /// index file if it does not exist yet.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Serialize`] if a path cannot be encoded as JSON.
    /// - Return [`Error::Write`] if file or its parent cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content =
            serde_json::to_string_pretty(&self.paths).map_err(|err| Error::Serialize {
                source: err,
                index_path: path.into(),
            })?;

        if let Some(parent) = path.parent() {
            mkdirp::mkdirp(parent).map_err(|err| Error::Write {
                source: err,
                index_path: path.into(),
            })?;
        }

        write(path, content.as_bytes()).map_err(|err| Error::Write {
            source: err,
            index_path: path.into(),
        })?;

        Ok(())
    }

    /// Insert a path.
    ///
    /// Returns `true` if the path was not tracked before.
    pub fn insert(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        let mut at = self.paths.len();
        for (idx, entry) in self.paths.iter().enumerate() {
            match compare(entry, &path) {
                Ordering::Less => continue,
                Ordering::Equal => return false,
                Ordering::Greater => {
                    at = idx;
                    break;
                }
            }
        }

        self.paths.insert(at, path);
        true
    }

    /// Insert a listing of paths.
    pub fn extend(&mut self, paths: impl IntoIterator<Item = impl Into<PathBuf>>) {
        for path in paths {
            self.insert(path);
        }
    }

    /// Remove a path.
    ///
    /// Returns `true` if the path was tracked.
    pub fn remove(&mut self, path: impl AsRef<Path>) -> bool {
        match self.position(path.as_ref()) {
            Some(idx) => {
                self.paths.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Check if path is tracked.
    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.position(path.as_ref()).is_some()
    }

    /// Iterate over tracked paths in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }

    /// Tracked paths as a slice.
    pub fn as_slice(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    fn position(&self, path: &Path) -> Option<usize> {
        self.paths
            .binary_search_by(|entry| compare(entry, path))
            .ok()
    }
}

// Order by raw string form, not by path components.
fn compare(lhs: &Path, rhs: &Path) -> Ordering {
    lhs.as_os_str().cmp(rhs.as_os_str())
}

/// Index persistence error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Index file exists but cannot be read.
    #[error("failed to read index at {:?}", index_path.display())]
    Read {
        #[source]
        source: std::io::Error,
        index_path: PathBuf,
    },

    /// Index file cannot be written.
    #[error("failed to write index at {:?}", index_path.display())]
    Write {
        #[source]
        source: std::io::Error,
        index_path: PathBuf,
    },

    /// Index file does not hold a JSON array of paths.
    #[error("malformed index at {:?}", index_path.display())]
    Deserialize {
        #[source]
        source: serde_json::Error,
        index_path: PathBuf,
    },

    /// Index cannot be encoded as JSON.
    #[error("failed to encode index for {:?}", index_path.display())]
    Serialize {
        #[source]
        source: serde_json::Error,
        index_path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    fn listing(index: &PathIndex) -> Vec<&str> {
        index.iter().map(|path| path.to_str().unwrap()).collect()
    }

    #[test]
    fn insert_is_idempotent() {
        let mut index = PathIndex::new();
        assert!(index.insert("/home/blah/.bashrc"));
        assert!(!index.insert("/home/blah/.bashrc"));
        assert_eq!(listing(&index), vec!["/home/blah/.bashrc"]);
    }

    #[test_case(&["/b", "/a", "/c"], &["/a", "/b", "/c"]; "reversed middle")]
    #[test_case(&["/c", "/b", "/a", "/b"], &["/a", "/b", "/c"]; "descending with duplicate")]
    #[test_case(&["/a/b", "/a-b", "/a"], &["/a", "/a-b", "/a/b"]; "string order over component order")]
    #[test_case(&[], &[]; "empty")]
    #[test]
    fn insert_keeps_sorted_order(input: &[&str], expect: &[&str]) {
        let mut index = PathIndex::new();
        for path in input {
            index.insert(*path);
            let current = listing(&index);
            let mut sorted = current.clone();
            sorted.sort();
            pretty_assertions::assert_eq!(current, sorted);
        }

        pretty_assertions::assert_eq!(listing(&index), expect.to_vec());
    }

    #[test]
    fn remove_tracked_and_untracked() {
        let mut index = PathIndex::new();
        index.extend(["/etc/hosts", "/home/blah/.vimrc"]);

        assert!(index.remove("/etc/hosts"));
        assert!(!index.remove("/etc/hosts"));
        assert!(!index.contains("/etc/hosts"));
        assert_eq!(listing(&index), vec!["/home/blah/.vimrc"]);
    }

    #[test]
    fn load_missing_file_is_empty() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let index = PathIndex::load(dir.path().join("nope.json"))?;
        assert!(index.is_empty());
        Ok(())
    }

    #[test]
    fn load_sorts_hand_edited_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("index.json");
        write(&path, r#"["/z", "/a", "/z"]"#)?;

        let index = PathIndex::load(&path)?;
        assert_eq!(listing(&index), vec!["/a", "/z"]);
        Ok(())
    }

    #[test]
    fn load_rejects_malformed_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("index.json");
        write(&path, r#"{"not": "an array"}"#)?;

        let result = PathIndex::load(&path);
        assert!(matches!(result, Err(Error::Deserialize { .. })));
        Ok(())
    }

    #[test]
    fn save_writes_json_array_and_creates_parent() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("index.json");
        let mut index = PathIndex::new();
        index.extend(["/home/blah/.zshrc", "/etc/hosts"]);
        index.save(&path)?;

        let result = read_to_string(&path)?;
        let expect = indoc! {r#"
            [
              "/etc/hosts",
              "/home/blah/.zshrc"
            ]"#};
        assert_eq!(result, expect);
        assert_eq!(PathIndex::load(&path)?, index);
        Ok(())
    }
}
