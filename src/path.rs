// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine per-user locations of the files snapdot reads and writes: the
//! index of tracked paths, and the optional settings file.

use std::path::{Path, PathBuf};

/// Determine default absolute path to the index file.
///
/// Uses XDG Base Directory path `$XDG_DATA_HOME/snapdot/index.json`. Does not
/// check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if data directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_index_file() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|path| path.join("snapdot").join("index.json"))
        .ok_or(NoWayHome)
}

/// Determine default absolute path to the settings file.
///
/// Uses `$XDG_CONFIG_HOME/snapdot/config.toml`.
///
/// # Errors
///
/// - Return [`NoWayHome`] if config directory path cannot be determined.
pub fn default_settings_file() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("snapdot").join("config.toml"))
        .ok_or(NoWayHome)
}

/// Make path absolute against the current working directory.
///
/// Purely lexical. Symlinks are not resolved and the path need not exist.
pub fn absolutize(path: impl AsRef<Path>) -> std::io::Result<PathBuf> {
    std::path::absolute(path.as_ref())
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
