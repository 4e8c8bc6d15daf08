// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Archive member representation.
//!
//! Every entry of a snapdot archive is named relative to the filesystem root,
//! so `home/blah/.bashrc` is restored to `/home/blah/.bashrc`. This module
//! turns raw tar headers into [`ArchiveMember`]s, and decides where on disk a
//! member is allowed to land.

use crate::registry::materialize::Ownership;

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    io::{Error as IoError, ErrorKind, Read},
    path::{Component, Path, PathBuf},
};
use tar::{Entry, EntryType};

/// Kind of filesystem object an archive member holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    File,
    Directory,
    Symlink,
    HardLink,
    Other,
}

impl MemberKind {
    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Directory)
    }
}

impl From<EntryType> for MemberKind {
    fn from(kind: EntryType) -> Self {
        match kind {
            EntryType::Regular | EntryType::Continuous => Self::File,
            EntryType::Directory => Self::Directory,
            EntryType::Symlink => Self::Symlink,
            EntryType::Link => Self::HardLink,
            _ => Self::Other,
        }
    }
}

impl Display for MemberKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Self::File => "file",
            Self::Directory => "dir",
            Self::Symlink => "symlink",
            Self::HardLink => "hardlink",
            Self::Other => "other",
        };
        fmt.pad(name)
    }
}

/// Single entry of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMember {
    /// Path as stored in the archive.
    pub path: PathBuf,

    /// Kind of entry.
    pub kind: MemberKind,

    /// Numeric owner and group recorded for the entry.
    pub ownership: Ownership,

    /// Permission bits recorded for the entry.
    pub mode: u32,

    /// Link target for symbolic and hard links.
    pub link_target: Option<PathBuf>,
}

impl ArchiveMember {
    /// Read member information from a tar entry header.
    pub fn from_entry<R: Read>(entry: &Entry<'_, R>) -> std::io::Result<Self> {
        let header = entry.header();
        let kind = MemberKind::from(header.entry_type());
        let link_target = match kind {
            MemberKind::Symlink | MemberKind::HardLink => {
                entry.link_name()?.map(|target| target.into_owned())
            }
            _ => None,
        };

        Ok(Self {
            path: entry.path()?.into_owned(),
            kind,
            ownership: Ownership {
                uid: numeric_id(header.uid()?, "uid")?,
                gid: numeric_id(header.gid()?, "gid")?,
            },
            mode: header.mode()? & 0o7777,
            link_target,
        })
    }

    /// Member path re-anchored relative to the root.
    ///
    /// Strips leading `/` and drops `.` components. Returns `None` if the
    /// member would escape the root through `..` or a path prefix. An empty
    /// result names the root itself.
    pub fn relative_path(&self) -> Option<PathBuf> {
        anchor(&self.path)
    }

    /// Hard link source re-anchored relative to the root.
    ///
    /// Hard link names are archive paths, not paths relative to the link.
    /// Returns `None` if the member is not a hard link, or its source would
    /// escape the root or name the root itself.
    pub fn link_source(&self) -> Option<PathBuf> {
        if self.kind != MemberKind::HardLink {
            return None;
        }

        self.link_target
            .as_deref()
            .and_then(anchor)
            .filter(|source| !source.as_os_str().is_empty())
    }

    /// Where the member lands when restored under `root`.
    ///
    /// Returns `None` for members that cannot be restored safely, see
    /// [`ArchiveMember::relative_path`].
    pub fn target(&self, root: impl AsRef<Path>) -> Option<PathBuf> {
        self.relative_path().map(|relative| root.as_ref().join(relative))
    }
}
fn anchor(path: &Path) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for component in path.components() {
        match component {
            Component::RootDir | Component::CurDir => continue,
            Component::Normal(part) => relative.push(part),
            Component::ParentDir | Component::Prefix(_) => return None,
        }
    }

    Some(relative)
}

fn numeric_id(id: u64, field: &str) -> std::io::Result<u32> {
    u32::try_from(id).map_err(|_| {
        IoError::new(
            ErrorKind::InvalidData,
            format!("{field} {id} in archive header is out of range"),
        )
    })
}
