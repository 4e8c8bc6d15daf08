// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Directory materialization.
//!
//! Restored members may land in directories that do not exist yet. Those
//! directories are created on demand, and given the owner and group that the
//! archive recorded for the member that needed them. Directories that already
//! exist are left alone.
//!
//! # Ownership Without Privileges
//!
//! Only root can hand files over to another user. When snapdot runs as a
//! regular user, a refused ownership change is logged and skipped, so a user
//! can still restore their own archive. When running as root, every refusal
//! is a hard error.

use nix::{
    errno::Errno,
    unistd::{chown, Gid, Uid},
};
use std::{
    fs::create_dir,
    io::ErrorKind,
    os::unix::fs::lchown,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// Numeric owner and group of a filesystem object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ownership {
    pub uid: u32,
    pub gid: u32,
}

impl Ownership {
    /// Ownership of the current process.
    pub fn current() -> Self {
        Self {
            uid: Uid::effective().as_raw(),
            gid: Gid::effective().as_raw(),
        }
    }
}

/// Ensure directory exists, creating missing ancestors with given ownership.
///
/// Idempotent. Only directories created by this call receive `ownership`.
/// Directories created before a failure remain in place.
///
/// # Errors
///
/// - Return [`Error::CreateDir`] if a directory cannot be created.
/// - Return [`Error::Chown`] if ownership of a created directory cannot be
///   set while running as root.
pub fn ensure_directory(path: impl AsRef<Path>, ownership: Ownership) -> Result<()> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() || path.exists() {
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        ensure_directory(parent, ownership)?;
    }

    match create_dir(path) {
        Ok(()) => debug!("created directory {:?}", path.display()),
        // INVARIANT: Someone else made it first, so its ownership is theirs.
        Err(err) if err.kind() == ErrorKind::AlreadyExists => return Ok(()),
        Err(err) => {
            return Err(Error::CreateDir {
                source: err,
                path: path.into(),
            })
        }
    }

    set_ownership(path, ownership)
}

/// Set owner and group of path, following symlinks.
///
/// # Errors
///
/// - Return [`Error::Chown`] if ownership cannot be changed while running
///   as root.
pub fn set_ownership(path: impl AsRef<Path>, ownership: Ownership) -> Result<()> {
    let path = path.as_ref();
    let result = chown(
        path,
        Some(Uid::from_raw(ownership.uid)),
        Some(Gid::from_raw(ownership.gid)),
    )
    .map_err(std::io::Error::from);
    settle_chown(path, ownership, result)
}

/// Set owner and group of path itself, never following a symlink.
///
/// # Errors
///
/// - Return [`Error::Chown`] if ownership cannot be changed while running
///   as root.
pub fn set_link_ownership(path: impl AsRef<Path>, ownership: Ownership) -> Result<()> {
    let path = path.as_ref();
    let result = lchown(path, Some(ownership.uid), Some(ownership.gid));
    settle_chown(path, ownership, result)
}

fn settle_chown(path: &Path, ownership: Ownership, result: std::io::Result<()>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(err)
            if err.raw_os_error() == Some(Errno::EPERM as i32) && !Uid::effective().is_root() =>
        {
            warn!(
                "cannot give {:?} to {}:{} without root, keeping current owner",
                path.display(),
                ownership.uid,
                ownership.gid
            );
            Ok(())
        }
        Err(err) => Err(Error::Chown {
            source: err,
            path: path.into(),
        }),
    }
}

/// Directory materialization error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Directory cannot be created.
    #[error("failed to create directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Ownership of path cannot be set.
    #[error("failed to set ownership of {:?}", path.display())]
    Chown {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::{
        fs::{create_dir_all, metadata, write},
        os::unix::fs::MetadataExt,
    };

    // Root can prove ownership is applied, everyone else can only prove it
    // does not get in the way.
    fn foreign_or_current() -> Ownership {
        if Uid::effective().is_root() {
            Ownership {
                uid: 4242,
                gid: 4242,
            }
        } else {
            Ownership::current()
        }
    }

    #[test]
    fn ensure_directory_creates_chain_with_ownership() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let existing = dir.path().join("existing");
        create_dir_all(&existing)?;
        let before = metadata(&existing)?;

        let ownership = foreign_or_current();
        let target = existing.join("a").join("b").join("c");
        ensure_directory(&target, ownership)?;

        for created in [
            existing.join("a"),
            existing.join("a").join("b"),
            target.clone(),
        ] {
            let meta = metadata(&created)?;
            assert!(meta.is_dir());
            assert_eq!((meta.uid(), meta.gid()), (ownership.uid, ownership.gid));
        }

        let after = metadata(&existing)?;
        assert_eq!((after.uid(), after.gid()), (before.uid(), before.gid()));
        Ok(())
    }

    #[test]
    fn ensure_directory_is_idempotent() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let target = dir.path().join("a");

        ensure_directory(&target, Ownership::current())?;
        ensure_directory(&target, Ownership::current())?;
        assert!(target.is_dir());
        Ok(())
    }

    #[test]
    fn ensure_directory_under_file_fails() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("plain");
        write(&file, "blah")?;

        let result = ensure_directory(file.join("sub"), Ownership::current());
        assert!(matches!(result, Err(Error::CreateDir { .. })));
        Ok(())
    }
}
