// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Registry of tracked paths.
//!
//! The __registry__ is the session object of a snapdot invocation. It loads
//! the index of tracked paths once at startup, runs whatever operations the
//! user asked for, and saves the index once at the end.
//!
//! # Backup And Restore
//!
//! A backup bundles every tracked path into a gzip compressed tar archive.
//! A restore unpacks such an archive back onto the filesystem, and starts
//! tracking every path it restored. Both run through the same phases:
//!
//! ```text
//! IDLE -> VALIDATING -> (FAILED | WRITING/EXTRACTING) -> DONE
//! ```
//!
//! Validation checks every affected path before anything is written. A
//! single path that fails its check aborts the whole operation, naming that
//! path, with no archive written and nothing extracted. Once writing or
//! extraction starts, a failure is fatal but not rolled back.
//!
//! # Registry Root
//!
//! Members of an archive are named relative to the registry root, which is
//! `/` outside of tests. So `/home/blah/.bashrc` is stored as
//! `home/blah/.bashrc`, and restored back to `/home/blah/.bashrc`. Members
//! that would escape the root through `..` are refused during validation.
//!
//! Archives are otherwise trusted. A member symlink pointing elsewhere will be
//! followed by members restored through it.

pub mod access;
pub mod backup;
pub mod inspect;
pub mod materialize;
pub mod member;
pub mod restore;

use crate::{index::PathIndex, registry::member::ArchiveMember};

use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Session over the index of tracked paths.
#[derive(Debug)]
pub struct Registry {
    root: PathBuf,
    index_path: PathBuf,
    index: PathIndex,
}

impl Registry {
    /// Load registry from index file, rooted at `/`.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::Index`] if index file cannot be loaded.
    pub fn load(index_path: impl Into<PathBuf>) -> Result<Self> {
        Self::load_with_root(index_path, "/")
    }

    /// Load registry from index file, rooted at `root`.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::Index`] if index file cannot be loaded.
    #[instrument(skip(index_path, root), level = "debug")]
    pub fn load_with_root(index_path: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Result<Self> {
        let index_path = index_path.into();
        let root = root.into();
        debug!(
            "load index {:?} rooted at {:?}",
            index_path.display(),
            root.display()
        );
        let index = PathIndex::load(&index_path)?;

        Ok(Self {
            root,
            index_path,
            index,
        })
    }

    /// Save index back to the file it was loaded from.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::Index`] if index file cannot be written.
    pub fn save(&self) -> Result<()> {
        debug!("save index {:?}", self.index_path.display());
        Ok(self.index.save(&self.index_path)?)
    }

    /// Current index of tracked paths.
    pub fn index(&self) -> &PathIndex {
        &self.index
    }

    /// Start tracking path.
    ///
    /// Returns `true` if path was not tracked before.
    pub fn add(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        let added = self.index.insert(path.clone());
        if added {
            info!("tracking {:?}", path.display());
        } else {
            warn!("{:?} already tracked", path.display());
        }

        added
    }

    /// Stop tracking path.
    ///
    /// Returns `true` if path was tracked.
    pub fn remove(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let removed = self.index.remove(path);
        if removed {
            info!("no longer tracking {:?}", path.display());
        } else {
            warn!("{:?} is not tracked", path.display());
        }

        removed
    }

    /// Back up every tracked path into archive.
    ///
    /// # Errors
    ///
    /// See [`Registry::backup_paths`].
    pub fn backup(&self, archive: impl AsRef<Path>, bar: &ProgressBar) -> Result<()> {
        self.backup_paths(self.index.as_slice(), archive, bar)
    }

    /// Back up listing of paths into archive.
    ///
    /// Every path is checked for readability first, directories down to their
    /// last entry. The archive is only written once all of them passed.
    /// Directories are archived recursively. A previous archive at the same
    /// location is replaced only by a complete new one.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::PermissionDenied`] naming the first unreadable
    ///   path. No archive is created in this case.
    /// - Return [`RegistryError::Unarchivable`] naming the first socket.
    /// - Return [`RegistryError::OutsideRoot`] for a path outside of root.
    /// - Return [`RegistryError::CreateArchive`] or
    ///   [`RegistryError::WriteArchive`] if writing fails midway.
    #[instrument(skip(self, paths, archive, bar), level = "debug")]
    pub fn backup_paths(
        &self,
        paths: &[PathBuf],
        archive: impl AsRef<Path>,
        bar: &ProgressBar,
    ) -> Result<()> {
        let archive = archive.as_ref();
        info!(
            "back up {} paths into {:?}",
            paths.len(),
            archive.display()
        );

        backup::validate(&self.root, paths)?;

        bar.set_style(progress_style()?);
        bar.set_length(paths.len() as u64);
        backup::write(&self.root, paths, archive, bar)?;
        bar.finish_and_clear();

        Ok(())
    }

    /// Restore archive onto the filesystem.
    ///
    /// Every member target is checked for writability first. Nothing is
    /// extracted unless all of them passed. Each restored path becomes
    /// tracked. Returns restored paths in archive order.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::OpenArchive`] or [`RegistryError::ReadArchive`]
    ///   if archive cannot be read.
    /// - Return [`RegistryError::UnsafeMember`] for a member, or hard link
    ///   source, escaping root.
    /// - Return [`RegistryError::PermissionDenied`] naming the first unwritable
    ///   target. Nothing is extracted in this case.
    /// - Return [`RegistryError::Materialize`] or [`RegistryError::Unpack`] if
    ///   extraction fails midway.
    #[instrument(skip(self, archive, bar), level = "debug")]
    pub fn restore(&mut self, archive: impl AsRef<Path>, bar: &ProgressBar) -> Result<Vec<PathBuf>> {
        let archive = archive.as_ref();
        info!("restore from {:?}", archive.display());

        let members = restore::list_members(archive)?;
        let targets = restore::validate(&self.root, &members)?;

        bar.set_style(progress_style()?);
        bar.set_length(targets.iter().flatten().count() as u64);
        let restored = restore::extract(&self.root, archive, &targets, &mut self.index, bar)?;
        bar.finish_and_clear();

        Ok(restored)
    }

    /// List every member of archive.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::OpenArchive`] or [`RegistryError::ReadArchive`]
    ///   if archive cannot be read.
    pub fn inspect(archive: impl AsRef<Path>) -> Result<Vec<ArchiveMember>> {
        restore::list_members(archive.as_ref())
    }

    /// Extract archive into destination directory without tracking anything.
    ///
    /// Only the destination itself is checked for writability.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::PermissionDenied`] if destination is
    ///   unwritable.
    /// - Return [`RegistryError::OpenArchive`] if archive cannot be opened.
    /// - Return [`RegistryError::Unpack`] if extraction fails.
    #[instrument(skip(archive, destination), level = "debug")]
    pub fn extract(archive: impl AsRef<Path>, destination: impl AsRef<Path>) -> Result<()> {
        info!(
            "extract {:?} into {:?}",
            archive.as_ref().display(),
            destination.as_ref().display()
        );
        restore::extract_to(archive.as_ref(), destination.as_ref())
    }
}

fn progress_style() -> Result<ProgressStyle> {
    Ok(ProgressStyle::with_template(
        "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}] {pos}/{len}",
    )?
    .progress_chars("-Cco."))
}

/// All possible error types for backup and restore.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Path failed its read or write check during validation.
    #[error("permission denied for {:?}", path.display())]
    PermissionDenied { path: PathBuf },

    /// Path holds something tar cannot archive.
    #[error("cannot back up {:?}, sockets cannot be archived", path.display())]
    Unarchivable { path: PathBuf },

    /// Path cannot be named relative to registry root.
    #[error("cannot back up {:?}, it is not below the registry root", path.display())]
    OutsideRoot { path: PathBuf },

    /// Archive member would be restored outside of registry root.
    #[error("refusing archive member {:?} that escapes the registry root", member.display())]
    UnsafeMember { member: PathBuf },

    /// Archive cannot be opened for reading.
    #[error("failed to open archive {:?}", archive.display())]
    OpenArchive {
        #[source]
        source: std::io::Error,
        archive: PathBuf,
    },

    /// Archive cannot be created for writing.
    #[error("failed to create archive {:?}", archive.display())]
    CreateArchive {
        #[source]
        source: std::io::Error,
        archive: PathBuf,
    },

    /// Archive stream is malformed.
    #[error("failed to read archive {:?}", archive.display())]
    ReadArchive {
        #[source]
        source: std::io::Error,
        archive: PathBuf,
    },

    /// Path cannot be appended to archive.
    #[error("failed to write {:?} into archive", path.display())]
    WriteArchive {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Archive member cannot be written to its target.
    #[error("failed to unpack {:?}", path.display())]
    Unpack {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Missing directories or ownership cannot be materialized.
    #[error(transparent)]
    Materialize(#[from] crate::registry::materialize::Error),

    /// Index file manipulation fails.
    #[error(transparent)]
    Index(#[from] crate::index::Error),

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),
}

/// Friendly result alias :3
pub type Result<T, E = RegistryError> = std::result::Result<T, E>;
