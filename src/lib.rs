// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Snapshot a curated set of configuration files.
//!
//! Snapdot keeps a per-user index of tracked paths, bundles them into a gzip
//! compressed tar archive for backup, and restores or inspects such archives
//! later on. Ownership and permission bits travel with every archived path.

pub mod config;
pub mod index;
pub mod path;
pub mod registry;

pub use index::PathIndex;
pub use registry::{Registry, RegistryError};
