// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Permission checks.
//!
//! Backup and restore check every affected path up front before touching
//! anything. These checks answer whether the current process could read or
//! write a path right now. They never fail, a path that cannot be checked is
//! simply not accessible.

use nix::unistd::{access, AccessFlags};
use std::path::Path;
use tracing::debug;

/// Check if current process can read an existing path.
pub fn can_read(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    let readable = access(path, AccessFlags::R_OK).is_ok();
    debug!("read check on {:?}: {readable}", path.display());

    readable
}

/// Check if current process can list and traverse an existing directory.
pub fn can_list(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    let listable = access(path, AccessFlags::R_OK | AccessFlags::X_OK).is_ok();
    debug!("list check on {:?}: {listable}", path.display());

    listable
}

/// Check if current process can write to path, or create it.
///
/// An existing path needs write permission, plus traverse permission if it
/// is a directory. A missing path is writable if its nearest existing
/// ancestor can have entries created in it. Existence never follows a
/// trailing symlink, and an existing symlink is replaced rather than written
/// through, so it is checked like a missing path.
pub fn can_write(path: impl AsRef<Path>, is_dir: bool) -> bool {
    let path = path.as_ref();
    let existing = path.symlink_metadata().ok();
    if existing.as_ref().is_some_and(|meta| !meta.file_type().is_symlink()) {
        let flags = if is_dir {
            AccessFlags::W_OK | AccessFlags::X_OK
        } else {
            AccessFlags::W_OK
        };
        let writable = access(path, flags).is_ok();
        debug!("write check on {:?}: {writable}", path.display());
        return writable;
    }

    let ancestor = nearest_existing_ancestor(path);
    let creatable = access(ancestor, AccessFlags::W_OK | AccessFlags::X_OK).is_ok();
    debug!(
        "create check on {:?} through {:?}: {creatable}",
        path.display(),
        ancestor.display()
    );

    creatable
}

// INVARIANT: Terminates at the root, which always exists.
fn nearest_existing_ancestor(path: &Path) -> &Path {
    let mut current = path.parent();
    while let Some(candidate) = current {
        if candidate.as_os_str().is_empty() {
            break;
        }

        if candidate.symlink_metadata().is_ok() {
            return candidate;
        }
        current = candidate.parent();
    }

    if path.is_relative() {
        Path::new(".")
    } else {
        Path::new("/")
    }
}
