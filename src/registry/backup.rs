// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Archive writing.
//!
//! A backup is a gzip compressed tar stream holding every tracked path,
//! recursively for directories. Each entry keeps the numeric owner, group,
//! and permission bits of the original. Symbolic links are stored as links.
//!
//! Writing happens in two passes. The first pass only checks that every path
//! is readable, walking directories all the way down. The second pass writes
//! into a staging file next to the archive, which replaces the archive only
//! once the stream is complete. A previous archive survives any failure.

use crate::registry::{
    access::{can_list, can_read},
    RegistryError, Result,
};

use flate2::{write::GzEncoder, Compression};
use indicatif::ProgressBar;
use std::{
    io::Write,
    os::unix::fs::FileTypeExt,
    path::{Path, PathBuf},
};
use tar::{Builder, HeaderMode};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Check that every path lies below `root` and can be archived in full.
///
/// Directories are walked without following symlinks. Every directory must
/// be listable, every other entry readable. Symlinks are archived as links,
/// so only the link itself is looked at. Stops at the first failing path.
///
/// # Errors
///
/// - Return [`RegistryError::OutsideRoot`] for a path outside of `root`.
/// - Return [`RegistryError::PermissionDenied`] for an unreadable path, or
///   unlistable directory.
/// - Return [`RegistryError::Unarchivable`] for a socket.
pub(crate) fn validate(root: &Path, paths: &[PathBuf]) -> Result<()> {
    for path in paths {
        member_name(root, path)?;
        check_tree(path)?;
    }

    Ok(())
}

fn check_tree(path: &Path) -> Result<()> {
    let walker = WalkDir::new(path).follow_links(false).follow_root_links(false);
    for entry in walker {
        let entry = entry.map_err(|err| RegistryError::PermissionDenied {
            path: err.path().unwrap_or(path).into(),
        })?;

        let kind = entry.file_type();
        let accessible = if kind.is_symlink() {
            true
        } else if kind.is_dir() {
            can_list(entry.path())
        } else if kind.is_socket() {
            return Err(RegistryError::Unarchivable {
                path: entry.into_path(),
            });
        } else {
            can_read(entry.path())
        };

        if !accessible {
            return Err(RegistryError::PermissionDenied {
                path: entry.into_path(),
            });
        }
    }

    Ok(())
}

/// Write every path into a new archive at `destination`.
///
/// Caller must [`validate`] first. The archive is staged in the directory of
/// `destination`, and only moved over it once finished.
///
/// # Errors
///
/// - Return [`RegistryError::CreateArchive`] if the staging file cannot be
///   created, or cannot replace destination.
/// - Return [`RegistryError::WriteArchive`] if an entry cannot be appended, or
///   the stream cannot be finished.
pub(crate) fn write(
    root: &Path,
    paths: &[PathBuf],
    destination: &Path,
    bar: &ProgressBar,
) -> Result<()> {
    let create = |err: std::io::Error| RegistryError::CreateArchive {
        source: err,
        archive: destination.into(),
    };

    let directory = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let staging = NamedTempFile::new_in(directory).map_err(create)?;
    debug!("stage archive in {:?}", staging.path().display());

    let encoder = GzEncoder::new(staging, Compression::default());
    let mut builder = Builder::new(encoder);
    builder.mode(HeaderMode::Complete);
    builder.follow_symlinks(false);

    for path in paths {
        let name = member_name(root, path)?;
        bar.set_message(path.display().to_string());
        append(&mut builder, path, &name).map_err(|err| RegistryError::WriteArchive {
            source: err,
            path: path.clone(),
        })?;
        info!("backed up {:?}", path.display());
        bar.inc(1);
    }

    let finish = |err: std::io::Error| RegistryError::WriteArchive {
        source: err,
        path: destination.into(),
    };
    let mut staging = builder
        .into_inner()
        .map_err(finish)?
        .finish()
        .map_err(finish)?;
    staging.flush().map_err(finish)?;
    staging.as_file().sync_all().map_err(finish)?;
    staging
        .persist(destination)
        .map_err(|err| create(err.error))?;

    Ok(())
}

fn append<W: Write>(builder: &mut Builder<W>, path: &Path, name: &Path) -> std::io::Result<()> {
    // INVARIANT: A symlink to a directory is archived as the link itself.
    let meta = path.symlink_metadata()?;
    if meta.is_dir() {
        debug!("append directory tree {:?} as {:?}", path.display(), name.display());
        builder.append_dir_all(name, path)
    } else {
        debug!("append {:?} as {:?}", path.display(), name.display());
        builder.append_path_with_name(path, name)
    }
}

/// Name of path inside the archive, relative to `root`.
fn member_name(root: &Path, path: &Path) -> Result<PathBuf> {
    match path.strip_prefix(root) {
        Ok(name) if !name.as_os_str().is_empty() => Ok(name.into()),
        _ => Err(RegistryError::OutsideRoot { path: path.into() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    #[test_case("/", "/home/blah/.bashrc", Some("home/blah/.bashrc"); "system root")]
    #[test_case("/tmp/root", "/tmp/root/etc/hosts", Some("etc/hosts"); "scratch root")]
    #[test_case("/tmp/root", "/etc/hosts", None; "outside scratch root")]
    #[test_case("/", "/", None; "root itself")]
    #[test]
    fn member_name_relative_to_root(root: &str, path: &str, expect: Option<&str>) {
        let result = member_name(Path::new(root), Path::new(path)).ok();
        pretty_assertions::assert_eq!(result, expect.map(PathBuf::from));
    }

    #[test]
    fn check_tree_skips_dangling_symlinks() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("file.txt"), "blah")?;
        std::os::unix::fs::symlink("gone", dir.path().join("dangling"))?;

        assert!(check_tree(dir.path()).is_ok());
        assert!(check_tree(&dir.path().join("dangling")).is_ok());
        Ok(())
    }

    #[test]
    fn check_tree_names_missing_path() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let missing = dir.path().join("missing");

        match check_tree(&missing) {
            Err(RegistryError::PermissionDenied { path }) => assert_eq!(path, missing),
            other => panic!("expected permission failure, got {other:?}"),
        }
        Ok(())
    }
}
