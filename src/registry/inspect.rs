// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Archive inspection output.

use crate::registry::member::ArchiveMember;

use nix::unistd::{Gid, Group, Uid, User};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Resolve numeric user id to account name, or the id itself.
pub fn owner_name(uid: u32) -> String {
    match User::from_uid(Uid::from_raw(uid)) {
        Ok(Some(user)) => user.name,
        _ => uid.to_string(),
    }
}

/// Resolve numeric group id to group name, or the id itself.
pub fn group_name(gid: u32) -> String {
    match Group::from_gid(Gid::from_raw(gid)) {
        Ok(Some(group)) => group.name,
        _ => gid.to_string(),
    }
}

/// One line of inspection output for a member.
///
/// Renders as `<kind> <owner>/<group> <mode> <path>`, with ` -> <target>`
/// appended for links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberListing {
    pub kind: String,
    pub owner: String,
    pub group: String,
    pub mode: u32,
    pub path: String,
    pub link_target: Option<String>,
}

impl MemberListing {
    /// Describe member with owner and group resolved to names.
    pub fn new(member: &ArchiveMember) -> Self {
        Self::with_names(
            member,
            owner_name(member.ownership.uid),
            group_name(member.ownership.gid),
        )
    }

    fn with_names(member: &ArchiveMember, owner: String, group: String) -> Self {
        Self {
            kind: member.kind.to_string(),
            owner,
            group,
            mode: member.mode,
            path: member.path.display().to_string(),
            link_target: member
                .link_target
                .as_ref()
                .map(|target| target.display().to_string()),
        }
    }
}

impl Display for MemberListing {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let owner = format!("{}/{}", self.owner, self.group);
        write!(
            fmt,
            "{:<8} {:<17} {:04o} {}",
            self.kind, owner, self.mode, self.path
        )?;
        if let Some(target) = &self.link_target {
            write!(fmt, " -> {target}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{materialize::Ownership, member::MemberKind};
    use pretty_assertions::assert_eq;

    #[test]
    fn unknown_ids_fall_back_to_numbers() {
        // Nobody hands out ids this high.
        assert_eq!(owner_name(3_999_999_999), "3999999999");
        assert_eq!(group_name(3_999_999_999), "3999999999");
    }

    #[test]
    fn root_resolves_to_name() {
        assert_eq!(owner_name(0), "root");
    }

    #[test]
    fn listing_renders_link_target() {
        let member = ArchiveMember {
            path: "home/blah/.vimrc".into(),
            kind: MemberKind::Symlink,
            ownership: Ownership {
                uid: 1000,
                gid: 1000,
            },
            mode: 0o777,
            link_target: Some("dotfiles/vimrc".into()),
        };

        let result = MemberListing::with_names(&member, "blah".into(), "users".into()).to_string();
        assert_eq!(
            result,
            "symlink  blah/users        0777 home/blah/.vimrc -> dotfiles/vimrc"
        );
    }
}
