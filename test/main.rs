// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT


use anyhow::Result;
use flate2::{write::GzEncoder, Compression};
use nix::unistd::Uid;
use snapdot::registry::materialize::Ownership;
use std::{fs::File, path::Path};
use tar::{Builder, EntryType, Header};

/// Hand built archive, for member layouts a backup would never produce.
pub(crate) struct ArchiveFixture {
    builder: Builder<GzEncoder<File>>,
}

impl ArchiveFixture {
    pub(crate) fn new(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        let builder = Builder::new(GzEncoder::new(file, Compression::default()));
        Ok(Self { builder })
    }

    pub(crate) fn file(
        &mut self,
        name: impl AsRef<str>,
        contents: impl AsRef<str>,
        mode: u32,
        ownership: Ownership,
    ) -> Result<&mut Self> {
        let contents = contents.as_ref().as_bytes();
        let mut header = header(EntryType::Regular, mode, ownership);
        header.set_path(name.as_ref())?;
        header.set_size(contents.len() as u64);
        header.set_cksum();
        self.builder.append(&header, contents)?;
        Ok(self)
    }

    pub(crate) fn dir(
        &mut self,
        name: impl AsRef<str>,
        mode: u32,
        ownership: Ownership,
    ) -> Result<&mut Self> {
        let mut header = header(EntryType::Directory, mode, ownership);
        header.set_path(name.as_ref())?;
        header.set_size(0);
        header.set_cksum();
        self.builder.append(&header, std::io::empty())?;
        Ok(self)
    }

    pub(crate) fn symlink(
        &mut self,
        name: impl AsRef<str>,
        target: impl AsRef<str>,
        ownership: Ownership,
    ) -> Result<&mut Self> {
        self.link(EntryType::Symlink, name, target, ownership)
    }

    // Link names may hold `..` and absolute paths, unlike member names.
    pub(crate) fn hard_link(
        &mut self,
        name: impl AsRef<str>,
        source: impl AsRef<str>,
    ) -> Result<&mut Self> {
        self.link(EntryType::Link, name, source, Ownership::current())
    }

    fn link(
        &mut self,
        kind: EntryType,
        name: impl AsRef<str>,
        target: impl AsRef<str>,
        ownership: Ownership,
    ) -> Result<&mut Self> {
        let mut header = header(kind, 0o777, ownership);
        header.set_path(name.as_ref())?;
        header.set_link_name(target.as_ref())?;
        header.set_size(0);
        header.set_cksum();
        self.builder.append(&header, std::io::empty())?;
        Ok(self)
    }

    pub(crate) fn file_with_uid(&mut self, name: impl AsRef<str>, uid: u64) -> Result<&mut Self> {
        let mut header = header(EntryType::Regular, 0o644, Ownership::current());
        header.set_path(name.as_ref())?;
        header.set_uid(uid);
        header.set_size(0);
        header.set_cksum();
        self.builder.append(&header, std::io::empty())?;
        Ok(self)
    }

    // INVARIANT: Bypass path checks of the tar crate, it refuses `..` itself.
    pub(crate) fn raw_file(&mut self, name: &[u8], contents: impl AsRef<str>) -> Result<&mut Self> {
        let contents = contents.as_ref().as_bytes();
        let mut header = header(EntryType::Regular, 0o644, Ownership::current());
        if let Some(gnu) = header.as_gnu_mut() {
            gnu.name[..name.len()].copy_from_slice(name);
        }
        header.set_size(contents.len() as u64);
        header.set_cksum();
        self.builder.append(&header, contents)?;
        Ok(self)
    }

    pub(crate) fn finish(self) -> Result<()> {
        self.builder.into_inner()?.finish()?;
        Ok(())
    }
}

fn header(kind: EntryType, mode: u32, ownership: Ownership) -> Header {
    let mut header = Header::new_gnu();
    header.set_entry_type(kind);
    header.set_mode(mode);
    header.set_uid(ownership.uid as u64);
    header.set_gid(ownership.gid as u64);
    header.set_mtime(1_700_000_000);
    header
}

/// Ownership that differs from the current process when running as root.
///
/// Root can prove ownership is applied, everyone else can only prove it does
/// not get in the way.
pub(crate) fn foreign_or_current() -> Ownership {
    if Uid::effective().is_root() {
        Ownership {
            uid: 4242,
            gid: 4242,
        }
    } else {
        Ownership::current()
    }
}
