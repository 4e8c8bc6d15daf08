// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Archive reading and restoration.
//!
//! Restoration reads the archive twice. The first read only collects member
//! headers, and checks that every target could be written. The archive is
//! read a second time to extract members in archive order, only after every
//! target passed.
//!
//! Archive order is not trusted to list directories before their contents.
//! Missing parents of every member are materialized with that member's
//! recorded owner and group. Modes of restored directories are applied last,
//! so a read-only directory does not block restoration of its own contents.
//! Modes of everything else are applied after ownership, because changing
//! the owner of a file drops its setuid and setgid bits.
//!
//! Hard link members are linked to their source under the root, never to
//! whatever the tar library would resolve the source against.

use crate::{
    index::PathIndex,
    registry::{
        access::can_write,
        materialize::{ensure_directory, set_link_ownership, set_ownership},
        member::{ArchiveMember, MemberKind},
        RegistryError, Result,
    },
};

use flate2::read::GzDecoder;
use indicatif::ProgressBar;
use std::{
    cmp::Reverse,
    fs::{hard_link, remove_file, set_permissions, File, Permissions},
    io::ErrorKind,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};
use tar::Archive;
use tracing::{debug, info, warn};

/// Open archive as gzip compressed tar stream.
///
/// # Errors
///
/// - Return [`RegistryError::OpenArchive`] if archive cannot be opened.
pub(crate) fn open(archive: &Path) -> Result<Archive<GzDecoder<File>>> {
    let file = File::open(archive).map_err(|err| RegistryError::OpenArchive {
        source: err,
        archive: archive.into(),
    })?;

    Ok(Archive::new(GzDecoder::new(file)))
}

/// Read header information of every member in archive order.
///
/// # Errors
///
/// - Return [`RegistryError::OpenArchive`] if archive cannot be opened.
/// - Return [`RegistryError::ReadArchive`] if archive is malformed.
pub(crate) fn list_members(archive: &Path) -> Result<Vec<ArchiveMember>> {
    let malformed = |err: std::io::Error| RegistryError::ReadArchive {
        source: err,
        archive: archive.into(),
    };

    let mut tarball = open(archive)?;
    let mut members = Vec::new();
    for entry in tarball.entries().map_err(malformed)? {
        let entry = entry.map_err(malformed)?;
        members.push(ArchiveMember::from_entry(&entry).map_err(malformed)?);
    }

    Ok(members)
}

/// Check that every member of archive can be restored under `root`.
///
/// Returns restoration target of each member, or `None` for members naming
/// the root itself, which are skipped.
///
/// # Errors
///
/// - Return [`RegistryError::UnsafeMember`] for a member, or the source of a
///   hard link member, escaping `root`.
/// - Return [`RegistryError::PermissionDenied`] for an unwritable target.
pub(crate) fn validate(root: &Path, members: &[ArchiveMember]) -> Result<Vec<Option<PathBuf>>> {
    let mut targets = Vec::with_capacity(members.len());
    for member in members {
        let unsafe_member = || RegistryError::UnsafeMember {
            member: member.path.clone(),
        };

        let relative = member.relative_path().ok_or_else(unsafe_member)?;
        if member.kind == MemberKind::HardLink && member.link_source().is_none() {
            return Err(unsafe_member());
        }

        if relative.as_os_str().is_empty() {
            warn!("skip member {:?} naming the root itself", member.path.display());
            targets.push(None);
            continue;
        }

        let target = root.join(relative);
        if !can_write(&target, member.kind.is_dir()) {
            return Err(RegistryError::PermissionDenied { path: target });
        }
        targets.push(Some(target));
    }

    Ok(targets)
}

/// Extract every member of archive to its validated target.
///
/// Every restored target is recorded in `index`. Caller must [`validate`]
/// first against the same `root`, and pass its targets.
///
/// # Errors
///
/// - Return [`RegistryError::ReadArchive`] if archive is malformed.
/// - Return [`RegistryError::Materialize`] if a parent cannot be created, or
///   member ownership cannot be applied.
/// - Return [`RegistryError::Unpack`] if a member cannot be written.
pub(crate) fn extract(
    root: &Path,
    archive: &Path,
    targets: &[Option<PathBuf>],
    index: &mut PathIndex,
    bar: &ProgressBar,
) -> Result<Vec<PathBuf>> {
    let malformed = |err: std::io::Error| RegistryError::ReadArchive {
        source: err,
        archive: archive.into(),
    };

    let mut tarball = open(archive)?;
    tarball.set_preserve_permissions(true);
    tarball.set_preserve_mtime(true);
    tarball.set_overwrite(true);

    let mut restored = Vec::with_capacity(targets.len());
    let mut directory_modes = Vec::new();
    let mut entries = tarball.entries().map_err(malformed)?;
    for target in targets {
        let mut entry = entries
            .next()
            .ok_or_else(|| malformed(std::io::ErrorKind::UnexpectedEof.into()))?
            .map_err(malformed)?;

        let Some(target) = target else {
            continue;
        };

        let member = ArchiveMember::from_entry(&entry).map_err(malformed)?;
        bar.set_message(target.display().to_string());
        if let Some(parent) = target.parent() {
            ensure_directory(parent, member.ownership)?;
        }

        let unpack = |err: std::io::Error| RegistryError::Unpack {
            source: err,
            path: target.clone(),
        };

        match member.kind {
            MemberKind::Directory => {
                ensure_directory(target, member.ownership)?;
                set_ownership(target, member.ownership)?;
                directory_modes.push((target.clone(), member.mode));
            }
            MemberKind::Symlink => {
                entry.unpack(target).map_err(unpack)?;
                set_link_ownership(target, member.ownership)?;
            }
            MemberKind::HardLink => {
                let source = member
                    .link_source()
                    .map(|source| root.join(source))
                    .ok_or_else(|| RegistryError::UnsafeMember {
                        member: member.path.clone(),
                    })?;
                link_member(&source, target).map_err(unpack)?;
            }
            _ => {
                entry.unpack(target).map_err(unpack)?;
                set_ownership(target, member.ownership)?;
                set_permissions(target, Permissions::from_mode(member.mode)).map_err(unpack)?;
            }
        }

        if index.insert(target.clone()) {
            debug!("now tracking {:?}", target.display());
        }
        info!("restored {:?}", target.display());
        bar.inc(1);
        restored.push(target.clone());
    }

    // INVARIANT: Deepest directories first, so parents stay traversable.
    directory_modes.sort_by_key(|(directory, _)| Reverse(directory.components().count()));
    for (directory, mode) in directory_modes {
        set_permissions(&directory, Permissions::from_mode(mode)).map_err(|err| {
            RegistryError::Unpack {
                source: err,
                path: directory.clone(),
            }
        })?;
    }

    Ok(restored)
}

// INVARIANT: Source inode already carries its owner, group and mode.
fn link_member(source: &Path, target: &Path) -> std::io::Result<()> {
    debug!("hard link {:?} to {:?}", target.display(), source.display());
    match remove_file(target) {
        Err(err) if err.kind() != ErrorKind::NotFound => return Err(err),
        _ => {}
    }

    hard_link(source, target)
}

/// Extract archive into `destination` as is.
///
/// Leaves all member validation to the tar library, and does not touch the
/// index. Only `destination` itself is checked beforehand.
///
/// # Errors
///
/// - Return [`RegistryError::PermissionDenied`] if destination is unwritable.
/// - Return [`RegistryError::Unpack`] if extraction fails.
pub(crate) fn extract_to(archive: &Path, destination: &Path) -> Result<()> {
    if !can_write(destination, true) {
        return Err(RegistryError::PermissionDenied {
            path: destination.into(),
        });
    }

    let unpack = |err: std::io::Error| RegistryError::Unpack {
        source: err,
        path: destination.into(),
    };

    mkdirp::mkdirp(destination).map_err(unpack)?;
    let mut tarball = open(archive)?;
    tarball.set_preserve_permissions(true);
    tarball.set_preserve_mtime(true);
    tarball.unpack(destination).map_err(unpack)?;

    Ok(())
}
